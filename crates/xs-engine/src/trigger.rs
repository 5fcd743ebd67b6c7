//! TriggerEngine: block-by-block playback of rendered slots.
//!
//! Each incoming trigger note starts its pad's rendered buffer looping on a
//! dedicated output channel until the matching note-off. `step` is the
//! audio-callback entry point and never allocates.

use alloc::sync::Arc;
use heapless::Vec;
use xs_ir::{MidiMessage, SampleCount, SampleIndex, TimedMessage, PAD_COUNT};

use crate::channel_pool::allocate_channel;
use crate::config::EngineConfig;
use crate::output::OutputBuffer;
use crate::render_cache::RenderedBank;
use crate::subrange::{extract, most_recent_note_event, most_recent_pitch_bend};

/// Maximum number of playback slices in one block.
pub const MAX_SLICES: usize = 64;

/// A held pad: its output channel and absolute start sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveTrigger {
    pub channel: u8,
    pub start: SampleIndex,
}

/// Counters for work the engine had to drop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Output messages lost to a full block buffer
    pub dropped_events: u64,
    /// Trigger note-ons ignored for lack of a channel or slice slot
    pub dropped_triggers: u64,
}

/// What a pad has sounding on its output channel right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Voice {
    note: Option<u8>,
    pitch_bend: Option<u16>,
}

/// One pad's playback window within the current block.
#[derive(Clone, Copy, Debug)]
struct Slice {
    pad: usize,
    channel: u8,
    /// Absolute sample the pad was triggered at
    trigger_start: SampleIndex,
    /// Block offset, inclusive
    begin: SampleIndex,
    /// Block offset, exclusive; `None` while the pad is still held
    end: Option<SampleIndex>,
    /// The pad stops at `end` (note-off, re-trigger or all-notes-off)
    is_final: bool,
}

impl Slice {
    fn open(pad: usize, trigger: LiveTrigger, begin: SampleIndex) -> Self {
        Self {
            pad,
            channel: trigger.channel,
            trigger_start: trigger.start,
            begin,
            end: None,
            is_final: false,
        }
    }
}

/// Real-time trigger engine.
///
/// Owns the live pad table and the rendered bank it plays from. The bank is
/// replaced with [`TriggerEngine::install`]; pads that are held across the
/// swap are corrected at the start of the next block.
pub struct TriggerEngine {
    config: EngineConfig,
    bank: Arc<RenderedBank>,
    live: [Option<LiveTrigger>; PAD_COUNT],
    voices: [Voice; PAD_COUNT],
    slices: Vec<Slice, MAX_SLICES>,
    output: OutputBuffer,
    needs_correction: bool,
    dropped_triggers: u64,
}

impl TriggerEngine {
    pub fn new(config: EngineConfig, bank: Arc<RenderedBank>) -> Self {
        Self {
            config,
            bank,
            live: [None; PAD_COUNT],
            voices: [Voice::default(); PAD_COUNT],
            slices: Vec::new(),
            output: OutputBuffer::new(),
            needs_correction: false,
            dropped_triggers: 0,
        }
    }

    /// Swap in a new bank, returning the old one.
    ///
    /// O(1); the returned `Arc` must be dropped somewhere allocation is
    /// allowed.
    pub fn install(&mut self, bank: Arc<RenderedBank>) -> Arc<RenderedBank> {
        if self.live.iter().any(Option::is_some) {
            self.needs_correction = true;
        }
        core::mem::replace(&mut self.bank, bank)
    }

    /// Process one block of `block_len` samples starting at absolute sample
    /// `block_start`.
    ///
    /// `input` offsets are relative to the block and should be sorted.
    /// Trigger-window notes start and stop pads, CC 123 stops every pad,
    /// other notes are consumed and anything else passes through.
    pub fn step(
        &mut self,
        input: &[TimedMessage],
        block_start: SampleIndex,
        block_len: SampleCount,
    ) -> &[TimedMessage] {
        self.output.clear();
        self.slices.clear();
        if block_len == 0 {
            return self.output.events();
        }

        if self.needs_correction {
            self.correct_live_pads(block_start);
            self.needs_correction = false;
        }

        for (pad, trigger) in self.live.iter().enumerate() {
            if let Some(trigger) = trigger {
                // MAX_SLICES >= PAD_COUNT, so seeding cannot fail
                let _ = self.slices.push(Slice::open(pad, *trigger, 0));
            }
        }

        for event in input {
            let offset = event.sample.min(block_len - 1);
            match event.message {
                MidiMessage::NoteOn { note, .. } => {
                    if let Some(pad) = self.config.pad_for_note(note) {
                        self.trigger_on(pad, block_start, offset);
                    }
                }
                MidiMessage::NoteOff { note, .. } => {
                    if let Some(pad) = self.config.pad_for_note(note) {
                        self.trigger_off(pad, offset);
                    }
                }
                message if message.is_all_notes_off() => self.all_off(offset),
                message => self.output.add(offset, message),
            }
        }

        for slice in self.slices.iter_mut() {
            if slice.end.is_none() {
                slice.end = Some(block_len);
            }
        }

        for i in 0..self.slices.len() {
            let slice = self.slices[i];
            self.play_slice(slice, block_start, block_len);
        }

        self.output.events()
    }

    /// Stop every pad, emitting note-offs for anything still sounding.
    pub fn release_all(&mut self) -> &[TimedMessage] {
        self.output.clear();
        for (trigger, voice) in self.live.iter_mut().zip(self.voices.iter_mut()) {
            if let (Some(t), Some(note)) = (trigger.take(), voice.note) {
                self.output.add(0, MidiMessage::note_off(t.channel, note));
            }
            *voice = Voice::default();
        }
        self.needs_correction = false;
        self.output.events()
    }

    /// Output of the last `step` or `release_all`.
    pub fn output(&self) -> &[TimedMessage] {
        self.output.events()
    }

    pub fn live(&self) -> &[Option<LiveTrigger>; PAD_COUNT] {
        &self.live
    }

    /// Absolute start sample of each held pad.
    pub fn trigger_start_times(&self) -> [Option<SampleIndex>; PAD_COUNT] {
        self.live.map(|t| t.map(|t| t.start))
    }

    pub fn bank(&self) -> &Arc<RenderedBank> {
        &self.bank
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            dropped_events: self.output.dropped(),
            dropped_triggers: self.dropped_triggers,
        }
    }

    fn open_slice(&self, pad: usize) -> Option<usize> {
        self.slices
            .iter()
            .rposition(|s| s.pad == pad && s.end.is_none())
    }

    fn close_slice(&mut self, index: usize, offset: SampleIndex) {
        let slice = &mut self.slices[index];
        slice.end = Some(offset.max(slice.begin));
        slice.is_final = true;
    }

    fn trigger_on(&mut self, pad: usize, block_start: SampleIndex, offset: SampleIndex) {
        if self.slices.is_full() {
            self.dropped_triggers += 1;
            return;
        }
        // A re-trigger keeps the pad's channel and restarts from the top
        let open = self.open_slice(pad);
        let channel = match open {
            Some(index) => self.slices[index].channel,
            None => match allocate_channel(&self.live, self.config.reserved_channel) {
                Some(channel) => channel,
                None => {
                    self.dropped_triggers += 1;
                    return;
                }
            },
        };
        if let Some(index) = open {
            self.close_slice(index, offset);
        }

        let trigger = LiveTrigger {
            channel,
            start: block_start + offset,
        };
        self.live[pad] = Some(trigger);
        let _ = self.slices.push(Slice::open(pad, trigger, offset));
    }

    fn trigger_off(&mut self, pad: usize, offset: SampleIndex) {
        if let Some(index) = self.open_slice(pad) {
            self.close_slice(index, offset);
            self.live[pad] = None;
        }
    }

    fn all_off(&mut self, offset: SampleIndex) {
        for index in 0..self.slices.len() {
            if self.slices[index].end.is_none() {
                self.close_slice(index, offset);
            }
        }
        self.live = [None; PAD_COUNT];
    }

    /// Copy the pad's loop into `[begin, end)` of the block, then release
    /// the pad if the slice is its last.
    fn play_slice(&mut self, slice: Slice, block_start: SampleIndex, block_len: SampleCount) {
        let begin = slice.begin;
        let end = slice.end.unwrap_or(block_len);
        let voice = &mut self.voices[slice.pad];
        let rendered = &self.bank.slots[slice.pad];
        let duration = rendered.duration;

        if end > begin && duration > 0 {
            let events = rendered.midi.events();
            let elapsed = (block_start + begin).saturating_sub(slice.trigger_start);
            let mut position = elapsed % duration;
            let mut at = begin;
            let mut remaining = end - begin;
            while remaining > 0 {
                let span = remaining.min(duration);
                if span == duration {
                    // One full lap: the rest of this pass, then the start of the next
                    let tail = duration - position;
                    let rest = extract(events, position, duration, duration);
                    splice(&mut self.output, voice, rest, slice.channel, at);
                    let head = extract(events, 0, position, duration);
                    splice(&mut self.output, voice, head, slice.channel, at + tail);
                } else {
                    let stop = (position + span) % duration;
                    let range = extract(events, position, stop, duration);
                    splice(&mut self.output, voice, range, slice.channel, at);
                }
                at += span;
                remaining -= span;
                position = (position + span) % duration;
            }
        }

        if slice.is_final {
            if let Some(note) = voice.note {
                // The rendered note-off never reached the block
                let at = end.min(block_len - 1);
                self.output.add(at, MidiMessage::note_off(slice.channel, note));
            }
            *voice = Voice::default();
        }
    }

    /// Bring held pads in line with a newly installed bank.
    ///
    /// For each pad the new buffer is read at the pad's current loop
    /// position: a note that should no longer sound is turned off, a note
    /// the old buffer never started is turned on, and the bend is re-sent
    /// whenever it moved, even under an unchanged note.
    fn correct_live_pads(&mut self, block_start: SampleIndex) {
        for (pad, trigger) in self.live.iter().enumerate() {
            let Some(trigger) = trigger else { continue };
            let voice = &mut self.voices[pad];
            let rendered = &self.bank.slots[pad];
            let channel = trigger.channel;

            if rendered.duration == 0 {
                if let Some(note) = voice.note.take() {
                    self.output.add(0, MidiMessage::note_off(channel, note));
                }
                continue;
            }

            let elapsed = block_start.saturating_sub(trigger.start);
            let position = elapsed % rendered.duration;
            let wrap = elapsed >= rendered.duration;
            let events = rendered.midi.events();

            let target = match most_recent_note_event(events, position, wrap) {
                Some(MidiMessage::NoteOn { note, velocity, .. }) => Some((note, velocity)),
                _ => None,
            };
            let bend = most_recent_pitch_bend(events, position, wrap);

            let retrigger = match (voice.note, target) {
                (Some(old), Some((new, _))) => old != new,
                (old, new) => old.is_some() || new.is_some(),
            };
            if retrigger {
                if let Some(old) = voice.note.take() {
                    self.output.add(0, MidiMessage::note_off(channel, old));
                }
            }
            if let Some(value) = bend {
                if voice.pitch_bend != Some(value) {
                    self.output.add(0, MidiMessage::pitch_bend(channel, value));
                    voice.pitch_bend = Some(value);
                }
            }
            if retrigger {
                if let Some((note, velocity)) = target {
                    self.output.add(0, MidiMessage::note_on(channel, note, velocity));
                    voice.note = Some(note);
                }
            }
        }
    }
}

/// Write an extracted range to the output on `channel`, starting at block
/// offset `at`, and track what it leaves sounding.
fn splice(
    output: &mut OutputBuffer,
    voice: &mut Voice,
    range: impl Iterator<Item = TimedMessage>,
    channel: u8,
    at: SampleIndex,
) {
    for event in range {
        let message = event.message.with_channel(channel);
        match message {
            MidiMessage::NoteOn { note, .. } => voice.note = Some(note),
            MidiMessage::NoteOff { note, .. } => {
                if voice.note == Some(note) {
                    voice.note = None;
                }
            }
            MidiMessage::PitchBend { value, .. } => voice.pitch_bend = Some(value),
            MidiMessage::ControlChange { .. } => {}
        }
        output.add(at + event.sample, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderedSlot;
    use alloc::vec::Vec;
    use xs_ir::{MidiBuffer, Transport};

    const PAD0: u8 = 36;

    /// A slot with one note on `note` from `on` to `off`, preceded by a bend.
    fn slot(duration: SampleCount, notes: &[(u8, SampleIndex, SampleIndex)]) -> Arc<RenderedSlot> {
        let mut midi = MidiBuffer::new();
        for &(note, on, off) in notes {
            midi.add(on, MidiMessage::pitch_bend(1, 8000 + note as u16));
            midi.add(on, MidiMessage::note_on(1, note, 100));
            midi.add(off, MidiMessage::note_off(1, note));
        }
        Arc::new(RenderedSlot { midi, duration })
    }

    fn bank_with(pads: &[(usize, Arc<RenderedSlot>)]) -> Arc<RenderedBank> {
        let mut bank = RenderedBank::empty(Transport::default());
        for (pad, slot) in pads {
            bank.slots[*pad] = slot.clone();
        }
        Arc::new(bank)
    }

    fn engine(bank: Arc<RenderedBank>) -> TriggerEngine {
        TriggerEngine::new(EngineConfig::default(), bank)
    }

    fn on(sample: SampleIndex, note: u8) -> TimedMessage {
        TimedMessage::new(sample, MidiMessage::note_on(1, note, 100))
    }

    fn off(sample: SampleIndex, note: u8) -> TimedMessage {
        TimedMessage::new(sample, MidiMessage::note_off(1, note))
    }

    fn notes(events: &[TimedMessage]) -> Vec<(SampleIndex, MidiMessage)> {
        events
            .iter()
            .filter(|e| e.message.is_note_on_or_off())
            .map(|e| (e.sample, e.message))
            .collect()
    }

    #[test]
    fn trigger_plays_pad_on_first_free_channel() {
        let mut engine = engine(bank_with(&[(0, slot(100, &[(60, 10, 50)]))]));
        let out = engine.step(&[on(5, PAD0)], 0, 128);
        assert_eq!(
            notes(out),
            [
                (15, MidiMessage::note_on(2, 60, 100)),
                (55, MidiMessage::note_off(2, 60)),
                (115, MidiMessage::note_on(2, 60, 100)),
            ]
        );
        assert!(out.iter().all(|e| e.message.channel() == 2));
        assert_eq!(engine.live()[0], Some(LiveTrigger { channel: 2, start: 5 }));
    }

    #[test]
    fn loop_is_continuous_across_blocks() {
        let mut engine = engine(bank_with(&[(0, slot(100, &[(60, 0, 40)]))]));
        let mut all = Vec::new();
        let mut input = alloc::vec![on(0, PAD0)];
        for block in 0..5u64 {
            for e in engine.step(&input, block * 64, 64) {
                all.push((block * 64 + e.sample, e.message));
            }
            input.clear();
        }
        let ons: Vec<_> = all
            .iter()
            .filter(|(_, m)| matches!(m, MidiMessage::NoteOn { .. }))
            .map(|(s, _)| *s)
            .collect();
        let offs: Vec<_> = all
            .iter()
            .filter(|(_, m)| matches!(m, MidiMessage::NoteOff { .. }))
            .map(|(s, _)| *s)
            .collect();
        assert_eq!(ons, [0, 100, 200, 300]);
        assert_eq!(offs, [40, 140, 240]);
    }

    #[test]
    fn block_longer_than_loop_repeats_it() {
        let mut engine = engine(bank_with(&[(0, slot(30, &[(60, 0, 10)]))]));
        let out = engine.step(&[on(0, PAD0)], 0, 100);
        let ons = notes(out)
            .into_iter()
            .filter(|(_, m)| matches!(m, MidiMessage::NoteOn { .. }))
            .count();
        assert_eq!(ons, 4);
        assert!(out.windows(2).all(|w| w[0].sample <= w[1].sample));
    }

    #[test]
    fn release_silences_a_note_the_block_cut_short() {
        // Measure lasts 50 samples, trigger held to 100, note rings to the end
        let mut engine = engine(bank_with(&[(0, slot(50, &[(60, 0, 49)]))]));
        let out = engine.step(&[on(0, PAD0), off(75, PAD0)], 0, 128);
        assert_eq!(
            notes(out),
            [
                (0, MidiMessage::note_on(2, 60, 100)),
                (49, MidiMessage::note_off(2, 60)),
                (50, MidiMessage::note_on(2, 60, 100)),
                (75, MidiMessage::note_off(2, 60)),
            ]
        );
        assert_eq!(engine.live()[0], None);
    }

    #[test]
    fn retrigger_keeps_channel_and_restarts() {
        let mut engine = engine(bank_with(&[(0, slot(100, &[(60, 0, 80)]))]));
        engine.step(&[on(0, PAD0)], 0, 64);
        let out = engine.step(&[on(10, PAD0)], 64, 64);
        assert_eq!(
            notes(out),
            [
                (10, MidiMessage::note_off(2, 60)),
                (10, MidiMessage::note_on(2, 60, 100)),
            ]
        );
        assert_eq!(engine.live()[0], Some(LiveTrigger { channel: 2, start: 74 }));
    }

    #[test]
    fn channels_are_exclusive_and_ceiling_drops_sixteenth() {
        let pads: Vec<_> = (0..PAD_COUNT).map(|p| (p, slot(100, &[(60, 0, 50)]))).collect();
        let mut engine = engine(bank_with(&pads));
        let input: Vec<_> = (0..PAD_COUNT as u8).map(|p| on(0, PAD0 + p)).collect();
        engine.step(&input, 0, 64);

        let mut channels: Vec<u8> = engine.live().iter().flatten().map(|t| t.channel).collect();
        assert_eq!(channels.len(), 15);
        channels.sort_unstable();
        channels.dedup();
        assert_eq!(channels, (2..=16).collect::<Vec<u8>>());
        assert_eq!(engine.live()[15], None);
        assert_eq!(engine.stats().dropped_triggers, 1);
    }

    #[test]
    fn freed_channel_is_reused() {
        let mut engine = engine(bank_with(&[]));
        engine.step(&[on(0, PAD0), on(0, PAD0 + 1), on(0, PAD0 + 2)], 0, 64);
        engine.step(&[off(0, PAD0 + 1)], 64, 64);
        engine.step(&[on(0, PAD0 + 5)], 128, 64);
        assert_eq!(engine.live()[5].map(|t| t.channel), Some(3));
    }

    #[test]
    fn orphan_note_off_is_ignored() {
        let mut engine = engine(bank_with(&[(0, slot(100, &[(60, 0, 50)]))]));
        let out = engine.step(&[off(3, PAD0)], 0, 64);
        assert!(out.is_empty());
        assert!(engine.live().iter().all(Option::is_none));
    }

    #[test]
    fn all_notes_off_stops_every_pad() {
        let mut engine = engine(bank_with(&[
            (0, slot(100, &[(60, 0, 90)])),
            (1, slot(100, &[(62, 0, 90)])),
        ]));
        engine.step(&[on(0, PAD0), on(0, PAD0 + 1)], 0, 32);
        let cc = TimedMessage::new(
            4,
            MidiMessage::ControlChange {
                channel: 1,
                controller: xs_ir::ALL_NOTES_OFF,
                value: 0,
            },
        );
        let out = engine.step(&[cc], 32, 32);
        assert_eq!(
            notes(out),
            [(4, MidiMessage::note_off(2, 60)), (4, MidiMessage::note_off(3, 62))]
        );
        assert!(engine.live().iter().all(Option::is_none));
        assert!(engine.step(&[], 64, 32).is_empty());
    }

    #[test]
    fn non_trigger_input_passes_or_is_consumed() {
        let mut engine = engine(bank_with(&[]));
        let cc = MidiMessage::ControlChange {
            channel: 1,
            controller: 7,
            value: 90,
        };
        let bend = MidiMessage::pitch_bend(1, 9000);
        let input = [
            TimedMessage::new(1, cc),
            on(2, 80),
            TimedMessage::new(3, bend),
            off(4, 80),
        ];
        let out = engine.step(&input, 0, 64);
        assert_eq!(out, [TimedMessage::new(1, cc), TimedMessage::new(3, bend)]);
    }

    #[test]
    fn empty_slot_holds_a_channel_but_plays_nothing() {
        let mut engine = engine(bank_with(&[]));
        assert!(engine.step(&[on(0, PAD0)], 0, 64).is_empty());
        assert_eq!(engine.live()[0].map(|t| t.channel), Some(2));
        assert_eq!(engine.trigger_start_times()[0], Some(0));
    }

    #[test]
    fn new_bank_corrects_a_held_pad() {
        let mut engine = engine(bank_with(&[(0, slot(100, &[(60, 0, 90)]))]));
        engine.step(&[on(0, PAD0)], 0, 32);

        let old = engine.install(bank_with(&[(0, slot(100, &[(64, 0, 90)]))]));
        assert_eq!(old.slots[0].duration, 100);
        let out = engine.step(&[], 32, 32);
        assert_eq!(
            out,
            [
                TimedMessage::new(0, MidiMessage::note_off(2, 60)),
                TimedMessage::new(0, MidiMessage::pitch_bend(2, 8064)),
                TimedMessage::new(0, MidiMessage::note_on(2, 64, 100)),
            ]
        );

        // Rendered note-off for the corrected note arrives on schedule
        let out = engine.step(&[], 64, 32);
        assert_eq!(notes(out), [(26, MidiMessage::note_off(2, 64))]);
    }

    #[test]
    fn new_bank_with_silence_turns_note_off() {
        let mut engine = engine(bank_with(&[(0, slot(100, &[(60, 0, 90)]))]));
        engine.step(&[on(0, PAD0)], 0, 32);
        engine.install(bank_with(&[(0, slot(100, &[]))]));
        let out = engine.step(&[], 32, 32);
        assert_eq!(out, [TimedMessage::new(0, MidiMessage::note_off(2, 60))]);
    }

    #[test]
    fn retune_under_a_held_note_resends_only_the_bend() {
        let mut engine = engine(bank_with(&[(0, slot(100, &[(60, 0, 90)]))]));
        engine.step(&[on(0, PAD0)], 0, 32);

        let mut midi = MidiBuffer::new();
        midi.add(0, MidiMessage::pitch_bend(1, 8225));
        midi.add(0, MidiMessage::note_on(1, 60, 100));
        midi.add(90, MidiMessage::note_off(1, 60));
        engine.install(bank_with(&[(0, Arc::new(RenderedSlot { midi, duration: 100 }))]));

        let out = engine.step(&[], 32, 32);
        assert_eq!(out, [TimedMessage::new(0, MidiMessage::pitch_bend(2, 8225))]);
        let out = engine.step(&[], 64, 32);
        assert_eq!(notes(out), [(26, MidiMessage::note_off(2, 60))]);
    }

    #[test]
    fn identical_bank_needs_no_correction() {
        let playing = slot(100, &[(60, 0, 90)]);
        let mut engine = engine(bank_with(&[(0, playing.clone())]));
        engine.step(&[on(0, PAD0)], 0, 32);
        engine.install(bank_with(&[(0, playing)]));
        assert!(engine.step(&[], 32, 32).is_empty());
    }

    #[test]
    fn release_all_turns_off_sounding_notes() {
        let mut engine = engine(bank_with(&[(0, slot(100, &[(60, 0, 90)]))]));
        engine.step(&[on(0, PAD0)], 0, 32);
        let out = engine.release_all();
        assert_eq!(out, [TimedMessage::new(0, MidiMessage::note_off(2, 60))]);
        assert!(engine.live().iter().all(Option::is_none));
    }
}
