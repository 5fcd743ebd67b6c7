//! Snapshots handed between the control and audio contexts.

use arrayvec::ArrayString;

use crate::error::SnapshotError;
use crate::measure::Measure;
use crate::scale::{Scale, TranslateDirection};
use crate::tuning::Tuning;
use crate::{SampleCount, SampleIndex};

/// Number of trigger pads, and of measures in a bank.
pub const PAD_COUNT: usize = 16;

/// Display name of a measure.
pub type MeasureName = ArrayString<32>;

/// One measure per trigger pad, each independently named.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceBank {
    pub measures: [Measure; PAD_COUNT],
    pub names: [MeasureName; PAD_COUNT],
}

impl SequenceBank {
    /// Replace the measure at `pad`.
    pub fn set(&mut self, pad: usize, measure: Measure) {
        if let Some(slot) = self.measures.get_mut(pad) {
            *slot = measure;
        }
    }

    /// Rename the measure at `pad`. Names longer than 32 bytes are cut at a
    /// character boundary.
    pub fn set_name(&mut self, pad: usize, name: &str) {
        let Some(slot) = self.names.get_mut(pad) else {
            return;
        };
        slot.clear();
        for ch in name.chars() {
            if slot.try_push(ch).is_err() {
                break;
            }
        }
    }
}

/// The complete control-owned music description at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct SequencerSnapshot {
    pub bank: SequenceBank,
    pub tuning: Tuning,
    /// Frequency of pitch 0, in Hz
    pub base_frequency: f32,
    /// Scale note pitches are snapped to, `None` = every tuning step
    pub scale: Option<Scale>,
    /// Transposition in tuning steps, applied after scale snapping
    pub key: i32,
    pub translate_direction: TranslateDirection,
}

impl Default for SequencerSnapshot {
    fn default() -> Self {
        Self {
            bank: SequenceBank::default(),
            tuning: Tuning::default(),
            base_frequency: 440.0,
            scale: None,
            key: 0,
            translate_direction: TranslateDirection::Up,
        }
    }
}

impl SequencerSnapshot {
    /// Check the snapshot can be rendered meaningfully.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.tuning.is_empty() {
            return Err(SnapshotError::EmptyTuning);
        }
        if !self.tuning.octave.is_finite() || self.tuning.intervals.iter().any(|c| !c.is_finite()) {
            return Err(SnapshotError::InvalidTuning);
        }
        if !(self.base_frequency.is_finite() && self.base_frequency > 0.0) {
            return Err(SnapshotError::InvalidBaseFrequency(self.base_frequency));
        }
        for (pad, measure) in self.bank.measures.iter().enumerate() {
            let ts = measure.time_signature;
            if ts.numerator == 0 || ts.denominator == 0 {
                return Err(SnapshotError::InvalidTimeSignature { pad });
            }
        }
        if let Some(scale) = &self.scale {
            if scale.intervals.is_empty() || scale.tuning_length == 0 {
                return Err(SnapshotError::InvalidScale);
            }
        }
        Ok(())
    }

    /// Parameters that affect every pad's render (everything but the bank).
    pub fn same_voicing(&self, other: &Self) -> bool {
        self.tuning == other.tuning
            && self.base_frequency == other.base_frequency
            && self.scale == other.scale
            && self.key == other.key
            && self.translate_direction == other.translate_direction
    }
}

/// Host transport state for one block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transport {
    /// Tempo in quarter notes per minute
    pub bpm: f32,
    pub sample_rate: u32,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            sample_rate: 44100,
        }
    }
}

impl Transport {
    pub const fn new(bpm: f32, sample_rate: u32) -> Self {
        Self { bpm, sample_rate }
    }

    /// Returns true if measures rendered at this transport have a length.
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.bpm.is_finite() && self.bpm > 0.0
    }

    /// True when `other` would render differently: sample rate differs, or
    /// tempo differs by more than `tolerance` bpm.
    pub fn differs(&self, other: &Transport, tolerance: f32) -> bool {
        if self.sample_rate != other.sample_rate {
            return true;
        }
        let delta = self.bpm - other.bpm;
        // NaN tempos compare as changed
        !(delta <= tolerance && -delta <= tolerance)
    }
}

/// Playback state published by the audio context for display.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Telemetry {
    pub transport: Transport,
    /// Samples processed since the audio context started
    pub accumulated_sample_count: SampleCount,
    /// Absolute start sample of each currently held pad
    pub trigger_start_times: [Option<SampleIndex>; PAD_COUNT],
    /// Output events dropped because the block buffer was full
    pub dropped_events: u64,
    /// Trigger note-ons dropped for lack of a channel or slice slot
    pub dropped_triggers: u64,
}
