//! Measure rendering: timeline events bound to MIDI channel 1.

use xs_ir::{
    Measure, MidiBuffer, MidiMessage, SampleCount, Scale, SequencerSnapshot, TranslateDirection,
    Transport, Tuning,
};

use crate::config::EngineConfig;
use crate::timeline::{measure_to_timeline, TimedEvent, TimelineEvent};

/// Channel every rendered buffer is written on before remapping.
pub(crate) const RENDER_CHANNEL: u8 = 1;

/// Everything besides the measure itself that shapes a render.
#[derive(Clone, Copy, Debug)]
pub struct RenderParams<'a> {
    pub tuning: &'a Tuning,
    pub base_frequency: f32,
    pub transport: Transport,
    /// Receiving synth's bend range, in semitones
    pub pitch_bend_range: f32,
    pub scale: Option<&'a Scale>,
    pub key: i32,
    pub translate_direction: TranslateDirection,
}

impl<'a> RenderParams<'a> {
    /// Plain tuning render: no scale, no transposition, 48 semitone bends.
    pub fn new(tuning: &'a Tuning, base_frequency: f32, transport: Transport) -> Self {
        Self {
            tuning,
            base_frequency,
            transport,
            pitch_bend_range: EngineConfig::default().pitch_bend_range,
            scale: None,
            key: 0,
            translate_direction: TranslateDirection::Up,
        }
    }

    /// Parameters for rendering any measure of `snapshot`.
    pub fn from_snapshot(
        snapshot: &'a SequencerSnapshot,
        transport: Transport,
        config: &EngineConfig,
    ) -> Self {
        Self {
            tuning: &snapshot.tuning,
            base_frequency: snapshot.base_frequency,
            transport,
            pitch_bend_range: config.pitch_bend_range,
            scale: snapshot.scale.as_ref(),
            key: snapshot.key,
            translate_direction: snapshot.translate_direction,
        }
    }
}

/// A measure rendered to MIDI, with its loop length.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedSlot {
    pub midi: MidiBuffer,
    /// Loop length in samples; 0 = nothing to play
    pub duration: SampleCount,
}

/// Convert a timeline to a channel-1 MIDI buffer.
pub fn render_to_midi(timeline: &[TimedEvent]) -> MidiBuffer {
    let mut buffer = MidiBuffer::new();
    for e in timeline {
        let message = match e.event {
            TimelineEvent::NoteOn { note, velocity } => {
                MidiMessage::note_on(RENDER_CHANNEL, note, velocity)
            }
            TimelineEvent::NoteOff { note } => MidiMessage::note_off(RENDER_CHANNEL, note),
            TimelineEvent::PitchBend { value } => MidiMessage::pitch_bend(RENDER_CHANNEL, value),
        };
        buffer.add(e.sample, message);
    }
    buffer
}

/// Render one measure. Pure: equal inputs give equal slots.
pub fn render_measure(measure: &Measure, params: &RenderParams<'_>) -> RenderedSlot {
    let transport = params.transport;
    RenderedSlot {
        midi: render_to_midi(&measure_to_timeline(measure, params)),
        duration: measure.sample_count(transport.sample_rate, transport.bpm),
    }
}
