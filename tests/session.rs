//! Control/audio session tests, including both halves running on their
//! own threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use xs_ir::{Cell, Measure, MidiMessage, Scale, Sequence, TimeSignature, Tuning};
use xs_master::{session, EngineConfig, SequencerSnapshot, SnapshotError, TimedMessage, Transport};

fn snapshot(shift: i32) -> SequencerSnapshot {
    let mut snapshot = SequencerSnapshot {
        tuning: Tuning::equal_division(22, 1200.0),
        ..SequencerSnapshot::default()
    };
    for pad in 0..xs_ir::PAD_COUNT {
        let cells = (0..8).map(|i| Cell::note(pad as i32 + i * shift, 0.75));
        snapshot
            .bank
            .set(pad, Measure::new(TimeSignature::new(4, 4), Cell::Sequence(Sequence::even(cells))));
    }
    snapshot
}

#[test]
fn scale_and_key_shape_the_published_bank() {
    let mut base = SequencerSnapshot::default();
    base.bank.set(0, Measure::new(TimeSignature::new(4, 4), Cell::note(1, 1.0)));
    let (mut controller, mut audio) =
        session(base.clone(), Transport::default(), EngineConfig::default()).unwrap();

    // C major in 12-EDO, snapping up; pitch 1 lands on 2, then up a fifth
    let mut keyed = base;
    keyed.scale = Some(Scale::new("major", 12, vec![2, 2, 1, 2, 2, 2, 1]));
    keyed.key = 7;
    let summary = controller.publish(keyed).unwrap();
    assert!(summary.full);

    let trigger = TimedMessage::new(0, MidiMessage::note_on(1, 36, 100));
    let out = audio.process_block(Transport::default(), &[trigger], 64);
    assert!(out.contains(&TimedMessage::new(0, MidiMessage::note_on(2, 69 + 9, 127))));
}

#[test]
fn rejected_snapshot_keeps_playing_the_old_bank() {
    let (mut controller, mut audio) =
        session(snapshot(1), Transport::default(), EngineConfig::default()).unwrap();
    let mut bad = snapshot(2);
    bad.base_frequency = f32::NAN;
    assert!(matches!(controller.publish(bad), Err(SnapshotError::InvalidBaseFrequency(_))));

    let trigger = TimedMessage::new(0, MidiMessage::note_on(1, 36, 100));
    let out = audio.process_block(Transport::default(), &[trigger], 64);
    assert!(out.iter().any(|e| matches!(e.message, MidiMessage::NoteOn { channel: 2, .. })));
    assert_eq!(controller.snapshot(), &snapshot(1));
}

#[test]
fn release_all_silences_held_pads() {
    let (_controller, mut audio) =
        session(snapshot(1), Transport::default(), EngineConfig::default()).unwrap();
    let triggers = [
        TimedMessage::new(0, MidiMessage::note_on(1, 36, 100)),
        TimedMessage::new(0, MidiMessage::note_on(1, 40, 100)),
    ];
    audio.process_block(Transport::default(), &triggers, 64);
    let offs = audio
        .release_all()
        .iter()
        .filter(|e| matches!(e.message, MidiMessage::NoteOff { .. }))
        .count();
    assert_eq!(offs, 2);
    assert!(audio.process_block(Transport::default(), &[], 64).is_empty());
}

#[test]
fn threads_exchange_banks_and_telemetry() {
    const BLOCKS: u64 = 20_000;
    const BLOCK_LEN: u64 = 64;

    let (mut controller, mut audio) =
        session(snapshot(1), Transport::default(), EngineConfig::default()).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let audio_done = done.clone();
    let audio_thread = thread::spawn(move || {
        let mut input = Vec::with_capacity(4);
        for block in 0..BLOCKS {
            input.clear();
            let note = 36 + (block / 50 % 16) as u8;
            match block % 50 {
                0 => input.push(TimedMessage::new(3, MidiMessage::note_on(1, note, 90))),
                25 => input.push(TimedMessage::new(9, MidiMessage::note_off(1, note))),
                _ => {}
            }
            let out = audio.process_block(Transport::default(), &input, BLOCK_LEN);
            assert!(out.iter().all(|e| e.message.channel() != 1));
            assert!(out.iter().all(|e| e.sample < BLOCK_LEN));
        }
        audio_done.store(true, Ordering::Release);
        audio.stats()
    });

    let mut shift = 1;
    let mut last_seen = 0;
    while !done.load(Ordering::Acquire) {
        shift = shift % 5 + 1;
        controller.publish(snapshot(shift)).unwrap();
        let telemetry = controller.poll();
        assert!(telemetry.accumulated_sample_count >= last_seen);
        assert_eq!(telemetry.accumulated_sample_count % BLOCK_LEN, 0);
        last_seen = telemetry.accumulated_sample_count;
        thread::yield_now();
    }

    let stats = audio_thread.join().unwrap();
    assert_eq!(stats.dropped_events, 0);
    assert_eq!(stats.dropped_triggers, 0);
    let telemetry = controller.poll();
    assert_eq!(telemetry.accumulated_sample_count, BLOCKS * BLOCK_LEN);
}
