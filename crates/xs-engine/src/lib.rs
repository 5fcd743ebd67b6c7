//! Renderer and real-time trigger engine for the xenseq sequencer.
//!
//! The renderer turns measures into sample-stamped MIDI buffers; the
//! render cache keeps one buffer per pad up to date; the trigger engine
//! plays those buffers back, one host block at a time, in response to
//! incoming trigger notes.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel_pool;
mod config;
mod output;
mod pitch;
mod render;
mod render_cache;
pub mod subrange;
pub mod timeline;
mod trigger;

pub use channel_pool::allocate_channel;
pub use config::EngineConfig;
pub use output::{OutputBuffer, OUTPUT_CAPACITY};
pub use pitch::{frequency, frequency_to_midi, MidiPitch};
pub use render::{render_measure, render_to_midi, RenderParams, RenderedSlot};
pub use render_cache::{RenderCache, RenderedBank, UpdateSummary};
pub use subrange::extract;
pub use timeline::{measure_to_timeline, TimelineEvent, TimedEvent};
pub use trigger::{EngineStats, LiveTrigger, TriggerEngine, MAX_SLICES};
