//! Snapshot validation errors.

use core::fmt;

/// Reasons a sequencer snapshot is rejected before rendering.
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotError {
    /// Tuning has no intervals
    EmptyTuning,
    /// Tuning octave or an interval is not finite
    InvalidTuning,
    /// Base frequency is not a finite, positive value
    InvalidBaseFrequency(f32),
    /// A measure's time signature has a zero numerator or denominator
    InvalidTimeSignature { pad: usize },
    /// Scale has no intervals or a zero tuning length
    InvalidScale,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::EmptyTuning => write!(f, "tuning has no intervals"),
            SnapshotError::InvalidTuning => write!(f, "tuning contains a non-finite cent value"),
            SnapshotError::InvalidBaseFrequency(hz) => {
                write!(f, "invalid base frequency: {} Hz", hz)
            }
            SnapshotError::InvalidTimeSignature { pad } => {
                write!(f, "invalid time signature in measure {}", pad)
            }
            SnapshotError::InvalidScale => write!(f, "scale has no intervals or tuning length"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SnapshotError {}
