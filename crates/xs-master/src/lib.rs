//! Control/audio session for the xenseq sequencer.
//!
//! [`session`] splits a sequencer into two halves. The [`Controller`] lives
//! on a control thread: it validates snapshots, renders them, and publishes
//! the rendered bank. The [`AudioProcessor`] lives in the host's audio
//! callback: it picks up the latest bank, runs the trigger engine, and
//! reports playback state back. The audio half never locks, allocates or
//! frees.

mod double_buffer;
mod handoff;

use std::sync::Arc;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, info, trace, warn};
use xs_engine::{RenderCache, RenderedBank, TriggerEngine, UpdateSummary};

pub use double_buffer::{double_buffer, Reader, Writer};
pub use handoff::HandoffSlot;
pub use xs_engine::{EngineConfig, EngineStats};
pub use xs_ir::{
    SampleCount, SampleIndex, SequencerSnapshot, SnapshotError, Telemetry, TimedMessage, Transport,
};

/// Banks the audio side can hand back before the controller collects them.
const RETIRE_CAPACITY: usize = 8;

/// Validate and render `snapshot`, and build the two halves of a session
/// around it.
pub fn session(
    snapshot: SequencerSnapshot,
    transport: Transport,
    config: EngineConfig,
) -> Result<(Controller, AudioProcessor), SnapshotError> {
    snapshot.validate()?;

    let mut cache = RenderCache::new(config);
    cache.update(&snapshot, transport);
    let engine = TriggerEngine::new(config, Arc::new(cache.bank()));

    let pending = Arc::new(HandoffSlot::new());
    let (retire_tx, retire_rx) = HeapRb::<Arc<RenderedBank>>::new(RETIRE_CAPACITY).split();
    let (telemetry_tx, telemetry_rx) = double_buffer(Telemetry {
        transport,
        ..Telemetry::default()
    });

    let controller = Controller {
        cache,
        snapshot,
        transport,
        pending: pending.clone(),
        retired: retire_rx,
        telemetry: telemetry_rx,
    };
    let processor = AudioProcessor {
        engine,
        pending,
        retired: retire_tx,
        telemetry: telemetry_tx,
        sample_count: 0,
        transport,
    };
    Ok((controller, processor))
}

/// Control half of a session.
pub struct Controller {
    cache: RenderCache,
    snapshot: SequencerSnapshot,
    /// Transport the current bank was rendered at
    transport: Transport,
    pending: Arc<HandoffSlot<RenderedBank>>,
    retired: HeapCons<Arc<RenderedBank>>,
    telemetry: Reader<Telemetry>,
}

impl Controller {
    /// Replace the sequencer state.
    ///
    /// Invalid snapshots are rejected and the previous state is kept.
    /// Otherwise changed measures are re-rendered and, if anything changed,
    /// the new bank is handed to the audio side.
    pub fn publish(&mut self, snapshot: SequencerSnapshot) -> Result<UpdateSummary, SnapshotError> {
        if let Err(error) = snapshot.validate() {
            warn!(%error, "rejected sequencer snapshot");
            return Err(error);
        }
        let summary = self.cache.update(&snapshot, self.transport);
        self.snapshot = snapshot;
        if !summary.is_empty() {
            debug!(
                rendered = summary.count(),
                full = summary.full,
                generation = self.cache.generation(),
                "publishing bank"
            );
            self.send_bank();
        }
        self.collect_retired();
        Ok(summary)
    }

    /// Free banks the audio side has finished with, follow host transport
    /// changes, and return the latest telemetry.
    ///
    /// Call regularly from the control thread.
    pub fn poll(&mut self) -> Telemetry {
        self.collect_retired();
        let telemetry = self.telemetry.read();
        let host = telemetry.transport;
        let tolerance = self.cache.config().tempo_tolerance;
        if host.is_valid() && self.transport.differs(&host, tolerance) {
            info!(
                bpm = host.bpm,
                sample_rate = host.sample_rate,
                "host transport changed, re-rendering"
            );
            let summary = self.cache.update(&self.snapshot, host);
            self.transport = self.cache.transport().unwrap_or(host);
            if !summary.is_empty() {
                self.send_bank();
            }
        }
        telemetry
    }

    /// Latest telemetry, without any housekeeping.
    pub fn telemetry(&self) -> Telemetry {
        self.telemetry.read()
    }

    pub fn snapshot(&self) -> &SequencerSnapshot {
        &self.snapshot
    }

    /// Transport the current bank was rendered at.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Whether a bank is waiting for the audio side.
    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    fn send_bank(&mut self) {
        let bank = Arc::new(self.cache.bank());
        if let Some(stale) = self.pending.publish(bank) {
            trace!(generation = stale.generation, "replaced unconsumed bank");
        }
    }

    fn collect_retired(&mut self) {
        let mut freed = 0;
        while self.retired.try_pop().is_some() {
            freed += 1;
        }
        if freed > 0 {
            trace!(freed, "collected retired banks");
        }
    }
}

/// Audio half of a session. Every method is real-time safe.
pub struct AudioProcessor {
    engine: TriggerEngine,
    pending: Arc<HandoffSlot<RenderedBank>>,
    retired: HeapProd<Arc<RenderedBank>>,
    telemetry: Writer<Telemetry>,
    sample_count: SampleCount,
    /// Host transport seen with the last block
    transport: Transport,
}

impl AudioProcessor {
    /// Run one host block.
    ///
    /// `input` offsets are relative to the block. The returned messages are
    /// valid until the next call.
    pub fn process_block(
        &mut self,
        transport: Transport,
        input: &[TimedMessage],
        block_len: SampleCount,
    ) -> &[TimedMessage] {
        self.receive_bank();

        let block_start = self.sample_count;
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| {
            self.engine.step(input, block_start, block_len);
        });
        #[cfg(not(feature = "alloc_check"))]
        self.engine.step(input, block_start, block_len);

        self.sample_count += block_len;
        self.transport = transport;
        self.publish_telemetry();
        self.engine.output()
    }

    /// Stop every pad, e.g. when the host stops or the plugin is bypassed.
    pub fn release_all(&mut self) -> &[TimedMessage] {
        self.engine.release_all();
        self.publish_telemetry();
        self.engine.output()
    }

    /// Samples processed so far.
    pub fn sample_count(&self) -> SampleCount {
        self.sample_count
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    fn receive_bank(&mut self) {
        // Leave the bank pending rather than free the old one here
        if self.retired.is_full() {
            return;
        }
        if let Some(bank) = self.pending.take() {
            let old = self.engine.install(bank);
            let _ = self.retired.try_push(old);
        }
    }

    fn publish_telemetry(&mut self) {
        let stats = self.engine.stats();
        self.telemetry.write(Telemetry {
            transport: self.transport,
            accumulated_sample_count: self.sample_count,
            trigger_start_times: self.engine.trigger_start_times(),
            dropped_events: stats.dropped_events,
            dropped_triggers: stats.dropped_triggers,
        });
    }
}
