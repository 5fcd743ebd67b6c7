//! Fixed-capacity per-block output buffer.

use heapless::Vec;
use xs_ir::{MidiMessage, SampleIndex, TimedMessage};

/// Maximum number of messages emitted in one block.
pub const OUTPUT_CAPACITY: usize = 1024;

/// Sample-sorted block output that never allocates.
///
/// Messages beyond [`OUTPUT_CAPACITY`] are dropped and counted.
#[derive(Clone, Debug, Default)]
pub struct OutputBuffer {
    events: Vec<TimedMessage, OUTPUT_CAPACITY>,
    dropped: u64,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message after any existing messages at the same sample.
    pub fn add(&mut self, sample: SampleIndex, message: MidiMessage) {
        let pos = self.events.partition_point(|e| e.sample <= sample);
        if self.events.insert(pos, TimedMessage::new(sample, message)).is_err() {
            self.dropped += 1;
        }
    }

    pub fn events(&self) -> &[TimedMessage] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Messages dropped since the buffer was created.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Empty the buffer for the next block. The drop count is kept.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
