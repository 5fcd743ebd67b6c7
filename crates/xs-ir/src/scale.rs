//! Scales: subsets of a tuning that note pitches can be snapped onto.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Which way an off-scale pitch moves to reach the scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TranslateDirection {
    #[default]
    Up,
    Down,
}

/// A scale, as step sizes within a tuning of `tuning_length` steps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scale {
    pub name: ArrayString<32>,
    /// Number of tuning steps per octave this scale was written for
    pub tuning_length: usize,
    /// Steps between consecutive scale degrees
    pub intervals: Vec<u8>,
    /// Rotation of `intervals` (0 = first mode)
    pub mode: u8,
}

impl Scale {
    pub fn new(name: &str, tuning_length: usize, intervals: Vec<u8>) -> Self {
        let mut scale = Self {
            name: ArrayString::new(),
            tuning_length,
            intervals,
            mode: 0,
        };
        let _ = scale.name.try_push_str(name);
        scale
    }

    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    /// Pitches inside one octave that belong to the scale, ascending from 0.
    ///
    /// The final entry is the octave itself when the intervals sum to the
    /// tuning length.
    pub fn valid_pitches(&self) -> Vec<i32> {
        let mut result = Vec::with_capacity(self.intervals.len() + 1);
        result.push(0);
        if self.intervals.is_empty() {
            return result;
        }
        let rotate = self.mode as usize % self.intervals.len();
        let rotated = self.intervals[rotate..].iter().chain(&self.intervals[..rotate]);
        let mut acc = 0i32;
        for &step in rotated {
            acc += step as i32;
            result.push(acc);
        }
        result
    }

}

/// Snap `pitch` onto `valid_pitches` (sorted, within one octave).
///
/// Lets callers compute [`Scale::valid_pitches`] once for many pitches.
pub fn map_pitch_to_scale(
    pitch: i32,
    valid_pitches: &[i32],
    tuning_length: usize,
    direction: TranslateDirection,
) -> i32 {
    if tuning_length == 0 || valid_pitches.is_empty() {
        return pitch;
    }
    let len = tuning_length as i32;
    let mut octave_shift = pitch.div_euclid(len);
    let normalized = pitch.rem_euclid(len);

    let mut index = valid_pitches.partition_point(|&p| p < normalized);
    let exact = valid_pitches.get(index) == Some(&normalized);
    if !exact {
        match direction {
            TranslateDirection::Down => {
                if index == 0 {
                    index = valid_pitches.len() - 1;
                    octave_shift -= 1;
                } else {
                    index -= 1;
                }
            }
            TranslateDirection::Up => {
                if index == valid_pitches.len() {
                    index = 0;
                    octave_shift += 1;
                }
            }
        }
    }
    valid_pitches[index] + octave_shift * len
}
