//! Single-slot, last-write-wins handoff from the control to the audio context.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Holds at most one value waiting to be picked up.
///
/// Publishing replaces any value that has not been taken yet; taking empties
/// the slot. Neither side blocks.
pub struct HandoffSlot<T> {
    slot: ArcSwapOption<T>,
}

impl<T> HandoffSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
        }
    }

    /// Offer `value`, returning the unconsumed value it displaced.
    pub fn publish(&self, value: Arc<T>) -> Option<Arc<T>> {
        self.slot.swap(Some(value))
    }

    /// Take the pending value, if any.
    pub fn take(&self) -> Option<Arc<T>> {
        self.slot.swap(None)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.load().is_some()
    }
}

impl<T> Default for HandoffSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
