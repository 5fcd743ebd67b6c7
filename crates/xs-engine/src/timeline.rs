//! Measure-to-event scheduling.
//!
//! Walks a measure's cell tree, dividing each window between children by
//! weight, and produces a sample-sorted list of note and pitch-bend events.

use alloc::vec::Vec;
use xs_ir::{map_pitch_to_scale, Cell, Measure, Note, SampleCount, SampleIndex, Sequence};

use crate::pitch::{frequency, frequency_to_midi};
use crate::render::RenderParams;

/// A rendered event before it is bound to a MIDI channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    PitchBend { value: u16 },
}

impl TimelineEvent {
    /// Order among events at the same sample: releases, then bends, then
    /// attacks, so a bend never lands on a still-sounding previous note.
    fn rank(self) -> u8 {
        match self {
            TimelineEvent::NoteOff { .. } => 0,
            TimelineEvent::PitchBend { .. } => 1,
            TimelineEvent::NoteOn { .. } => 2,
        }
    }
}

/// An event at a sample offset from the start of the measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    pub sample: SampleIndex,
    pub event: TimelineEvent,
}

/// Schedule every note of `measure` as sample-stamped events.
///
/// All events fall in `[0, duration)`, where `duration` is the measure's
/// sample count; a note ending on the measure boundary is released on the
/// last sample.
pub fn measure_to_timeline(measure: &Measure, params: &RenderParams<'_>) -> Vec<TimedEvent> {
    let duration = measure.sample_count(params.transport.sample_rate, params.transport.bpm);
    let mut events = Vec::new();
    if duration == 0 {
        return events;
    }

    let scheduler = Scheduler {
        params,
        duration,
        valid_pitches: params.scale.map(|s| s.valid_pitches()),
    };
    scheduler.schedule_cell(&measure.cell, 0.0, duration as f64, &mut events);

    events.sort_by_key(|e| (e.sample, e.event.rank()));
    events
}

struct Scheduler<'a> {
    params: &'a RenderParams<'a>,
    duration: SampleCount,
    valid_pitches: Option<Vec<i32>>,
}

impl Scheduler<'_> {
    fn schedule_cell(&self, cell: &Cell, start: f64, length: f64, events: &mut Vec<TimedEvent>) {
        match cell {
            Cell::Rest => {}
            Cell::Note(note) => self.schedule_note(note, start, length, events),
            Cell::Sequence(seq) => self.schedule_sequence(seq, start, length, events),
        }
    }

    fn schedule_sequence(&self, seq: &Sequence, start: f64, length: f64, events: &mut Vec<TimedEvent>) {
        let mut offset = start;
        for (i, child) in seq.children.iter().enumerate() {
            let child_length = length * seq.share(i);
            self.schedule_cell(&child.cell, offset, child_length, events);
            offset += child_length;
        }
    }

    fn schedule_note(&self, note: &Note, start: f64, length: f64, events: &mut Vec<TimedEvent>) {
        let velocity = libm::round(unit(note.velocity) * 127.0) as u8;
        if velocity == 0 {
            return;
        }

        let end = start + length;
        let on = start + unit(note.delay) * length;
        let off = on + unit(note.gate) * (end - on);

        let last = self.duration - 1;
        let on_sample = to_sample(on);
        let off_sample = to_sample(off).min(last);
        if on_sample >= off_sample {
            return;
        }

        let midi = frequency_to_midi(
            frequency(self.params.tuning, self.params.base_frequency, self.voiced_pitch(note.pitch)),
            self.params.pitch_bend_range,
        );

        events.push(TimedEvent {
            sample: on_sample,
            event: TimelineEvent::PitchBend { value: midi.bend },
        });
        events.push(TimedEvent {
            sample: on_sample,
            event: TimelineEvent::NoteOn {
                note: midi.note,
                velocity,
            },
        });
        events.push(TimedEvent {
            sample: off_sample,
            event: TimelineEvent::NoteOff { note: midi.note },
        });
    }

    /// Scale snapping, then key transposition.
    fn voiced_pitch(&self, pitch: i32) -> i32 {
        let snapped = match &self.valid_pitches {
            Some(valid) => map_pitch_to_scale(
                pitch,
                valid,
                self.params.tuning.len(),
                self.params.translate_direction,
            ),
            None => pitch,
        };
        snapped.saturating_add(self.params.key)
    }
}

/// Clamp a normalized parameter to [0, 1], NaN to 0.
fn unit(x: f32) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0) as f64
    }
}

fn to_sample(position: f64) -> SampleIndex {
    libm::round(position.max(0.0)) as SampleIndex
}
