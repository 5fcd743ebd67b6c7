//! Tunings: cent tables that pitch indices are resolved against.

use alloc::vec::Vec;

/// A tuning as a table of cent offsets plus an octave size.
///
/// Pitches are tuning-step indices, not absolute pitches. Step `p` resolves
/// to `intervals[p mod len] + (p div len) * octave` cents above the base
/// frequency.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuning {
    /// Cent offsets, index 0 = unison
    pub intervals: Vec<f32>,
    /// Cent size of the period the interval table repeats at
    pub octave: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self::equal_division(12, 1200.0)
    }
}

impl Tuning {
    /// Create a tuning from an explicit cent table.
    pub fn new(intervals: Vec<f32>, octave: f32) -> Self {
        Self { intervals, octave }
    }

    /// Equal division of `octave` cents into `steps` steps.
    pub fn equal_division(steps: u32, octave: f32) -> Self {
        let steps = steps.max(1);
        let step = octave / steps as f32;
        Self {
            intervals: (0..steps).map(|i| i as f32 * step).collect(),
            octave,
        }
    }

    /// Number of steps per octave.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Returns true if the interval table is empty.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Cents above the base frequency for a tuning-step index.
    ///
    /// An empty interval table behaves as `[0]`, so every step is one octave.
    pub fn cents(&self, pitch: i32) -> f64 {
        if self.intervals.is_empty() {
            return pitch as f64 * self.octave as f64;
        }
        let len = self.intervals.len() as i32;
        let index = pitch.rem_euclid(len) as usize;
        let octaves = pitch.div_euclid(len);
        self.intervals[index] as f64 + octaves as f64 * self.octave as f64
    }
}
