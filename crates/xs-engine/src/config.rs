//! Engine configuration.

/// Settings shared by the renderer and the trigger engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// First note of the 16-note trigger window (36 = C1 on most pads)
    pub trigger_base_note: u8,
    /// Output channel kept free for incoming triggers (1-16)
    pub reserved_channel: u8,
    /// Pitch-bend range of the receiving synth, in semitones
    pub pitch_bend_range: f32,
    /// Tempo changes at or below this many bpm do not force a re-render
    pub tempo_tolerance: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_base_note: 36,
            reserved_channel: 1,
            pitch_bend_range: 48.0,
            tempo_tolerance: 0.01,
        }
    }
}

impl EngineConfig {
    pub fn with_trigger_base_note(mut self, note: u8) -> Self {
        // Keep the whole window inside 0-127
        self.trigger_base_note = note.min(127 - 15);
        self
    }

    pub fn with_reserved_channel(mut self, channel: u8) -> Self {
        self.reserved_channel = channel.clamp(1, 16);
        self
    }

    pub fn with_pitch_bend_range(mut self, semitones: f32) -> Self {
        self.pitch_bend_range = semitones;
        self
    }

    pub fn with_tempo_tolerance(mut self, bpm: f32) -> Self {
        self.tempo_tolerance = bpm;
        self
    }

    /// Pad index for an incoming note, if it falls in the trigger window.
    pub fn pad_for_note(&self, note: u8) -> Option<usize> {
        let index = note.checked_sub(self.trigger_base_note)? as usize;
        (index < xs_ir::PAD_COUNT).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_window_is_sixteen_notes() {
        let config = EngineConfig::default();
        assert_eq!(config.pad_for_note(35), None);
        assert_eq!(config.pad_for_note(36), Some(0));
        assert_eq!(config.pad_for_note(51), Some(15));
        assert_eq!(config.pad_for_note(52), None);
    }

    #[test]
    fn builders_clamp_to_midi_ranges() {
        let config = EngineConfig::default()
            .with_trigger_base_note(127)
            .with_reserved_channel(0);
        assert_eq!(config.trigger_base_note, 112);
        assert_eq!(config.reserved_channel, 1);
        assert_eq!(config.pad_for_note(127), Some(15));
    }
}
