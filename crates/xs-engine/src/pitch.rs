//! Tuning-step to MIDI note + pitch-bend conversion.
//!
//! A tuning step resolves to a frequency; the frequency is sent as the
//! nearest 12-TET MIDI note plus a pitch bend covering the remainder.

use xs_ir::{Tuning, PITCH_BEND_CENTER};

/// MIDI note number of A4.
const A4_NOTE: f64 = 69.0;

/// Frequency of A4 in Hz.
const A4_HZ: f64 = 440.0;

/// Largest 14-bit pitch-bend value.
const PITCH_BEND_MAX: f64 = 16383.0;

/// A frequency expressed as a MIDI note plus a pitch bend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiPitch {
    pub note: u8,
    /// 14-bit bend, 8192 = center
    pub bend: u16,
}

/// Frequency in Hz of a tuning step above `base_frequency`.
pub fn frequency(tuning: &Tuning, base_frequency: f32, pitch: i32) -> f64 {
    base_frequency as f64 * libm::exp2(tuning.cents(pitch) / 1200.0)
}

/// Convert a frequency to the nearest MIDI note and the bend that reaches it.
///
/// `bend_range` is the synth's bend range in semitones. Notes are clamped
/// to 0-127 and bends to the 14-bit range.
pub fn frequency_to_midi(hz: f64, bend_range: f32) -> MidiPitch {
    if !(hz.is_finite() && hz > 0.0) {
        return MidiPitch {
            note: 0,
            bend: PITCH_BEND_CENTER,
        };
    }
    let exact = A4_NOTE + 12.0 * libm::log2(hz / A4_HZ);
    let note = libm::round(exact).clamp(0.0, 127.0);
    let semitones = exact - note;

    let bend = if bend_range > 0.0 {
        let center = PITCH_BEND_CENTER as f64;
        libm::round(center + semitones / bend_range as f64 * center).clamp(0.0, PITCH_BEND_MAX)
    } else {
        PITCH_BEND_CENTER as f64
    };

    MidiPitch {
        note: note as u8,
        bend: bend as u16,
    }
}
