//! Wait-free double buffer for audio-to-control state.
//!
//! The audio context writes whole values into the slot readers are not
//! looking at, then flips the current index. Each slot carries a sequence
//! number (odd while being written) so a reader that raced a second write
//! into the same slot retries instead of returning a torn value.

use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::ptr;
use std::sync::atomic::{fence, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

struct Slot<T> {
    seq: AtomicU64,
    value: UnsafeCell<T>,
}

struct Shared<T> {
    slots: [Slot<T>; 2],
    current: AtomicUsize,
}

// Slot contents are only read through the sequence check and only written
// by the single `Writer`.
unsafe impl<T: Copy + Send> Sync for Shared<T> {}

/// Create a double buffer holding `initial`.
pub fn double_buffer<T: Copy + Send>(initial: T) -> (Writer<T>, Reader<T>) {
    let slot = |value| Slot {
        seq: AtomicU64::new(0),
        value: UnsafeCell::new(value),
    };
    let shared = Arc::new(Shared {
        slots: [slot(initial), slot(initial)],
        current: AtomicUsize::new(0),
    });
    (
        Writer {
            shared: shared.clone(),
        },
        Reader { shared },
    )
}

/// The one writing end. Wait-free and allocation-free.
pub struct Writer<T: Copy + Send> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy + Send> Writer<T> {
    pub fn write(&mut self, value: T) {
        let shared = &*self.shared;
        let next = 1 - shared.current.load(Ordering::Relaxed);
        let slot = &shared.slots[next];

        let seq = slot.seq.load(Ordering::Relaxed);
        slot.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        // SAFETY: only this writer touches slot contents; readers detect the
        // odd sequence number and retry.
        unsafe { ptr::write_volatile(slot.value.get(), value) };
        slot.seq.store(seq.wrapping_add(2), Ordering::Release);

        shared.current.store(next, Ordering::Release);
    }
}

/// A reading end. Cheap to clone.
pub struct Reader<T: Copy + Send> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy + Send> Clone for Reader<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Copy + Send> Reader<T> {
    /// The most recently completed write.
    pub fn read(&self) -> T {
        let shared = &*self.shared;
        loop {
            let slot = &shared.slots[shared.current.load(Ordering::Acquire)];
            let before = slot.seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                spin_loop();
                continue;
            }
            // SAFETY: the value is discarded unless the sequence number shows
            // no write overlapped the copy.
            let value = unsafe { ptr::read_volatile(slot.value.get()) };
            fence(Ordering::Acquire);
            if slot.seq.load(Ordering::Relaxed) == before {
                return value;
            }
        }
    }
}
