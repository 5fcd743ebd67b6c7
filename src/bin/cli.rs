//! xenseq CLI: offline session playback.
//!
//! Builds a demo bank in an equal-division tuning, holds one pad for a while
//! and prints every MIDI message the engine emits.
//!
//! Usage:
//!   cargo run --bin xs-cli -- --edo 19 --pad 2 --hold 100000
//!   cargo run --bin xs-cli -- --transpose-at 50000 --transpose 3

use clap::Parser;
use tracing::info;
use xs_ir::{Cell, Measure, MidiMessage, Note, Sequence, TimeSignature, Tuning, PAD_COUNT};
use xs_master::{session, EngineConfig, SequencerSnapshot, TimedMessage, Transport};

#[derive(Parser)]
#[command(name = "xs-cli")]
#[command(about = "Play a demo xenseq bank offline and print the MIDI output", long_about = None)]
struct Cli {
    /// Tempo in quarter notes per minute
    #[arg(long, default_value = "120.0")]
    bpm: f32,

    /// Sample rate in Hz
    #[arg(short, long, default_value = "44100")]
    sample_rate: u32,

    /// Host block size in samples
    #[arg(short, long, default_value = "512")]
    block_size: u64,

    /// Pad to trigger (0-15)
    #[arg(short, long, default_value = "0")]
    pad: u8,

    /// How long the pad is held, in samples
    #[arg(long, default_value = "88200")]
    hold: u64,

    /// Steps per octave of the demo tuning
    #[arg(long, default_value = "12")]
    edo: u32,

    /// Publish a transposed bank at this sample
    #[arg(long)]
    transpose_at: Option<u64>,

    /// Tuning steps to transpose by
    #[arg(long, default_value = "1")]
    transpose: i32,
}

/// A different little phrase on every pad.
fn demo_snapshot(edo: u32) -> SequencerSnapshot {
    let mut snapshot = SequencerSnapshot {
        tuning: Tuning::equal_division(edo, 1200.0),
        ..SequencerSnapshot::default()
    };
    for pad in 0..PAD_COUNT {
        let root = pad as i32;
        let cell = Cell::Sequence(Sequence::weighted([
            (1.0, Cell::note(root, 0.9)),
            (1.0, Cell::Note(Note::new(root + 2, 0.7).with_gate(0.5))),
            (0.5, Cell::Rest),
            (
                1.5,
                Cell::Sequence(Sequence::even([
                    Cell::note(root + 4, 0.8),
                    Cell::Note(Note::new(root + 7, 0.6).with_delay(0.25)),
                ])),
            ),
        ]));
        snapshot
            .bank
            .set(pad, Measure::new(TimeSignature::new(4, 4), cell));
        snapshot.bank.set_name(pad, &format!("phrase {}", pad + 1));
    }
    snapshot
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = EngineConfig::default();
    let transport = Transport::new(cli.bpm, cli.sample_rate);
    let snapshot = demo_snapshot(cli.edo);
    let (mut controller, mut audio) = session(snapshot.clone(), transport, config)?;
    info!(edo = cli.edo, bpm = cli.bpm, sample_rate = cli.sample_rate, "session ready");

    let trigger_note = config.trigger_base_note + cli.pad.min(PAD_COUNT as u8 - 1);
    let block = cli.block_size.max(1);
    let release_at = cli.hold;
    let total = release_at + block;
    let mut transposed = false;

    let mut block_start = 0;
    while block_start < total {
        let mut input = Vec::new();
        if block_start == 0 {
            input.push(TimedMessage::new(0, MidiMessage::note_on(1, trigger_note, 100)));
        }
        if (block_start..block_start + block).contains(&release_at) {
            let offset = release_at - block_start;
            input.push(TimedMessage::new(offset, MidiMessage::note_off(1, trigger_note)));
        }

        if let Some(at) = cli.transpose_at {
            if !transposed && at <= block_start {
                let mut edited = snapshot.clone();
                edited.key = cli.transpose;
                controller.publish(edited)?;
                transposed = true;
            }
        }

        for e in audio.process_block(transport, &input, block) {
            println!("{:>9}  {:?}", block_start + e.sample, e.message);
        }
        controller.poll();
        block_start += block;
    }

    let telemetry = controller.poll();
    info!(
        samples = telemetry.accumulated_sample_count,
        dropped_events = telemetry.dropped_events,
        dropped_triggers = telemetry.dropped_triggers,
        "done"
    );
    Ok(())
}
