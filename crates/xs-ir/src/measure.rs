//! Measures: a time signature plus a root cell.

use crate::cell::Cell;
use crate::SampleCount;

/// Time signature of a measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    /// Beats per measure
    pub numerator: u32,
    /// Note value of one beat (4 = quarter note)
    pub denominator: u32,
}

impl TimeSignature {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Length of the measure in quarter-note beats.
    pub fn quarter_beats(self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        self.numerator as f64 * 4.0 / self.denominator as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

/// One measure of the sequence bank.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Measure {
    pub time_signature: TimeSignature,
    pub cell: Cell,
}

impl Measure {
    pub fn new(time_signature: TimeSignature, cell: Cell) -> Self {
        Self {
            time_signature,
            cell,
        }
    }

    /// Length of the measure in samples at `bpm` quarter notes per minute.
    ///
    /// Degenerate transports (non-positive tempo, zero sample rate) and zero
    /// denominators give a length of 0.
    pub fn sample_count(&self, sample_rate: u32, bpm: f32) -> SampleCount {
        if sample_rate == 0 || !(bpm.is_finite() && bpm > 0.0) {
            return 0;
        }
        let seconds = self.time_signature.quarter_beats() * 60.0 / bpm as f64;
        // Round half up; positive operand so truncation of +0.5 is exact.
        (seconds * sample_rate as f64 + 0.5) as SampleCount
    }
}
