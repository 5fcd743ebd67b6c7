//! Core data types for the xenseq trigger sequencer.
//!
//! This crate defines the sequence model (tunings, nested cells, measures),
//! the snapshots handed between the control and audio contexts, and the
//! MIDI message types the renderer and trigger engine exchange.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod cell;
mod error;
mod measure;
mod midi;
mod scale;
mod snapshot;
mod tuning;

pub use cell::{Cell, Child, Note, Sequence};
pub use error::SnapshotError;
pub use measure::{Measure, TimeSignature};
pub use midi::{MidiBuffer, MidiMessage, TimedMessage, ALL_NOTES_OFF, PITCH_BEND_CENTER};
pub use scale::{map_pitch_to_scale, Scale, TranslateDirection};
pub use snapshot::{
    MeasureName, SequenceBank, SequencerSnapshot, Telemetry, Transport, PAD_COUNT,
};
pub use tuning::Tuning;

/// Absolute or relative position, in samples.
pub type SampleIndex = u64;

/// A length, in samples.
pub type SampleCount = u64;
