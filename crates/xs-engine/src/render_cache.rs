//! Per-pad render cache with change detection.

use alloc::sync::Arc;
use xs_ir::{SequencerSnapshot, Transport, PAD_COUNT};

use crate::config::EngineConfig;
use crate::render::{render_measure, RenderParams, RenderedSlot};

/// An immutable set of rendered slots, one per pad.
///
/// Slots are shared between successive banks, so publishing a bank after
/// a single-measure edit only allocates the one new slot.
#[derive(Clone, Debug)]
pub struct RenderedBank {
    pub slots: [Arc<RenderedSlot>; PAD_COUNT],
    /// Transport the slots were rendered at
    pub transport: Transport,
    /// Increments each time the cache re-renders anything
    pub generation: u64,
}

impl RenderedBank {
    /// A bank where every pad is silent.
    pub fn empty(transport: Transport) -> Self {
        let silent = Arc::new(RenderedSlot::default());
        Self {
            slots: core::array::from_fn(|_| silent.clone()),
            transport,
            generation: 0,
        }
    }
}

/// Which slots an [`RenderCache::update`] call re-rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub rendered: [bool; PAD_COUNT],
    /// A global parameter changed, so every slot was re-rendered
    pub full: bool,
}

impl UpdateSummary {
    pub fn count(&self) -> usize {
        self.rendered.iter().filter(|&&r| r).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Keeps the 16 rendered slots in step with the latest snapshot.
///
/// `update` allocates and renders; call it from the control context only.
#[derive(Debug)]
pub struct RenderCache {
    config: EngineConfig,
    slots: [Arc<RenderedSlot>; PAD_COUNT],
    /// Snapshot and transport the current slots were rendered from
    previous: Option<(SequencerSnapshot, Transport)>,
    generation: u64,
}

impl RenderCache {
    pub fn new(config: EngineConfig) -> Self {
        let empty = RenderedBank::empty(Transport::default());
        Self {
            config,
            slots: empty.slots,
            previous: None,
            generation: 0,
        }
    }

    /// Re-render whatever `snapshot` and `transport` changed.
    ///
    /// A change to tempo (beyond the configured tolerance), sample rate,
    /// tuning, base frequency, scale, key or translate direction re-renders
    /// every slot. Otherwise only measures that differ by value from the
    /// previous snapshot are re-rendered.
    pub fn update(&mut self, snapshot: &SequencerSnapshot, transport: Transport) -> UpdateSummary {
        let full = match &self.previous {
            None => true,
            Some((prev, prev_transport)) => {
                !prev.same_voicing(snapshot) || prev_transport.differs(&transport, self.config.tempo_tolerance)
            }
        };
        // Sub-tolerance tempo drift is measured against the last full render
        let render_transport = match (&self.previous, full) {
            (Some((_, prev_transport)), false) => *prev_transport,
            _ => transport,
        };
        let params = RenderParams::from_snapshot(snapshot, render_transport, &self.config);

        let mut summary = UpdateSummary {
            full,
            ..UpdateSummary::default()
        };
        for (pad, measure) in snapshot.bank.measures.iter().enumerate() {
            let changed = full
                || self
                    .previous
                    .as_ref()
                    .map_or(true, |(prev, _)| prev.bank.measures[pad] != *measure);
            if changed {
                self.slots[pad] = Arc::new(render_measure(measure, &params));
                summary.rendered[pad] = true;
            }
        }

        if !summary.is_empty() {
            self.generation += 1;
        }
        self.previous = Some((snapshot.clone(), render_transport));
        summary
    }

    /// The current slots as a bank ready for handoff.
    pub fn bank(&self) -> RenderedBank {
        RenderedBank {
            slots: self.slots.clone(),
            transport: self.transport().unwrap_or_default(),
            generation: self.generation,
        }
    }

    pub fn slot(&self, pad: usize) -> &RenderedSlot {
        &self.slots[pad]
    }

    /// Transport of the last full render, if any.
    pub fn transport(&self) -> Option<Transport> {
        self.previous.as_ref().map(|(_, t)| *t)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xs_ir::{Cell, Measure, Sequence, TimeSignature, Tuning};

    fn snapshot_with_notes() -> SequencerSnapshot {
        let mut snapshot = SequencerSnapshot::default();
        for pad in 0..PAD_COUNT {
            let cells = (0..4).map(|i| Cell::note(pad as i32 + i, 0.8));
            snapshot
                .bank
                .set(pad, Measure::new(TimeSignature::new(4, 4), Cell::Sequence(Sequence::even(cells))));
        }
        snapshot
    }

    #[test]
    fn first_update_renders_everything() {
        let mut cache = RenderCache::new(EngineConfig::default());
        let summary = cache.update(&snapshot_with_notes(), Transport::default());
        assert!(summary.full);
        assert_eq!(summary.count(), PAD_COUNT);
        assert_eq!(cache.slot(3).duration, 88200);
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn unchanged_snapshot_renders_nothing() {
        let mut cache = RenderCache::new(EngineConfig::default());
        let snapshot = snapshot_with_notes();
        cache.update(&snapshot, Transport::default());
        let before = cache.bank();

        let summary = cache.update(&snapshot, Transport::default());
        assert!(summary.is_empty());
        assert_eq!(cache.generation(), 1);
        for pad in 0..PAD_COUNT {
            assert!(Arc::ptr_eq(&before.slots[pad], &cache.bank().slots[pad]));
        }
    }

    #[test]
    fn only_edited_measure_is_rerendered() {
        let mut cache = RenderCache::new(EngineConfig::default());
        let mut snapshot = snapshot_with_notes();
        cache.update(&snapshot, Transport::default());
        let before = cache.bank();

        snapshot.bank.set(7, Measure::new(TimeSignature::new(3, 4), Cell::note(0, 1.0)));
        snapshot.bank.set_name(2, "renamed only");
        let summary = cache.update(&snapshot, Transport::default());

        assert!(!summary.full);
        assert_eq!(summary.count(), 1);
        assert!(summary.rendered[7]);
        assert_eq!(cache.slot(7).duration, 66150);
        assert!(Arc::ptr_eq(&before.slots[2], &cache.bank().slots[2]));
    }

    #[test]
    fn global_changes_rerender_all() {
        let mut cache = RenderCache::new(EngineConfig::default());
        let mut snapshot = snapshot_with_notes();
        cache.update(&snapshot, Transport::default());

        snapshot.tuning = Tuning::equal_division(17, 1200.0);
        assert!(cache.update(&snapshot, Transport::default()).full);

        snapshot.base_frequency = 432.0;
        assert!(cache.update(&snapshot, Transport::default()).full);

        snapshot.key = 2;
        assert!(cache.update(&snapshot, Transport::default()).full);

        assert!(cache.update(&snapshot, Transport::new(120.0, 48000)).full);
        assert!(cache.update(&snapshot, Transport::new(90.0, 48000)).full);
    }

    #[test]
    fn tempo_jitter_within_tolerance_is_ignored() {
        let mut cache = RenderCache::new(EngineConfig::default());
        let snapshot = snapshot_with_notes();
        cache.update(&snapshot, Transport::new(120.0, 44100));

        assert!(cache.update(&snapshot, Transport::new(120.004, 44100)).is_empty());
        assert!(cache.update(&snapshot, Transport::new(119.996, 44100)).is_empty());
        assert_eq!(cache.transport(), Some(Transport::new(120.0, 44100)));
        assert!(cache.update(&snapshot, Transport::new(120.5, 44100)).full);
    }
}
