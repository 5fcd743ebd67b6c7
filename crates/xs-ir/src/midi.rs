//! MIDI message types exchanged by the renderer and trigger engine.

use alloc::vec::Vec;

use crate::SampleIndex;

/// Controller number of the channel-mode "All Notes Off" message.
pub const ALL_NOTES_OFF: u8 = 123;

/// Pitch-bend value meaning "no bend".
pub const PITCH_BEND_CENTER: u16 = 8192;

/// A channel voice message. Channels are 1-16.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    /// 14-bit bend, 0-16383 with 8192 = center
    PitchBend { channel: u8, value: u16 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiMessage {
    pub const fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    pub const fn note_off(channel: u8, note: u8) -> Self {
        MidiMessage::NoteOff { channel, note }
    }

    pub const fn pitch_bend(channel: u8, value: u16) -> Self {
        MidiMessage::PitchBend { channel, value }
    }

    /// The message's channel.
    pub const fn channel(self) -> u8 {
        match self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::PitchBend { channel, .. }
            | MidiMessage::ControlChange { channel, .. } => channel,
        }
    }

    /// The same message on another channel.
    pub const fn with_channel(self, channel: u8) -> Self {
        match self {
            MidiMessage::NoteOn { note, velocity, .. } => MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            },
            MidiMessage::NoteOff { note, .. } => MidiMessage::NoteOff { channel, note },
            MidiMessage::PitchBend { value, .. } => MidiMessage::PitchBend { channel, value },
            MidiMessage::ControlChange {
                controller, value, ..
            } => MidiMessage::ControlChange {
                channel,
                controller,
                value,
            },
        }
    }

    pub const fn is_note_on_or_off(self) -> bool {
        matches!(self, MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. })
    }

    pub const fn is_all_notes_off(self) -> bool {
        matches!(
            self,
            MidiMessage::ControlChange {
                controller: ALL_NOTES_OFF,
                ..
            }
        )
    }

    /// Decode a raw channel voice message.
    ///
    /// Note-on with velocity 0 decodes as note-off. Returns `None` for
    /// message kinds this crate does not model, or for truncated input.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let channel = (status & 0x0F) + 1;
        let data = |i: usize| bytes.get(i).map(|b| b & 0x7F);
        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: data(1)?,
            }),
            0x90 => {
                let note = data(1)?;
                match data(2)? {
                    0 => Some(MidiMessage::NoteOff { channel, note }),
                    velocity => Some(MidiMessage::NoteOn {
                        channel,
                        note,
                        velocity,
                    }),
                }
            }
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                controller: data(1)?,
                value: data(2)?,
            }),
            0xE0 => {
                let lsb = data(1)? as u16;
                let msb = data(2)? as u16;
                Some(MidiMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                })
            }
            _ => None,
        }
    }

    /// Encode as a raw three-byte channel voice message.
    pub fn to_bytes(self) -> [u8; 3] {
        let ch = self.channel().clamp(1, 16) - 1;
        match self {
            MidiMessage::NoteOn { note, velocity, .. } => [0x90 | ch, note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOff { note, .. } => [0x80 | ch, note & 0x7F, 0],
            MidiMessage::PitchBend { value, .. } => {
                let value = value.min(0x3FFF);
                [0xE0 | ch, (value & 0x7F) as u8, (value >> 7) as u8]
            }
            MidiMessage::ControlChange {
                controller, value, ..
            } => [0xB0 | ch, controller & 0x7F, value & 0x7F],
        }
    }
}

/// A MIDI message stamped with a sample position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimedMessage {
    pub sample: SampleIndex,
    pub message: MidiMessage,
}

impl TimedMessage {
    pub const fn new(sample: SampleIndex, message: MidiMessage) -> Self {
        Self { sample, message }
    }
}

/// A sample-sorted buffer of MIDI messages.
///
/// Messages at the same sample keep their insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MidiBuffer {
    events: Vec<TimedMessage>,
}

impl MidiBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Insert a message, after any existing messages at the same sample.
    pub fn add(&mut self, sample: SampleIndex, message: MidiMessage) {
        let pos = self.events.partition_point(|e| e.sample <= sample);
        self.events.insert(pos, TimedMessage::new(sample, message));
    }

    /// All messages in sample order.
    pub fn events(&self) -> &[TimedMessage] {
        &self.events
    }

    pub fn iter(&self) -> core::slice::Iter<'_, TimedMessage> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl FromIterator<TimedMessage> for MidiBuffer {
    fn from_iter<I: IntoIterator<Item = TimedMessage>>(iter: I) -> Self {
        let mut buffer = MidiBuffer::new();
        for e in iter {
            buffer.add(e.sample, e.message);
        }
        buffer
    }
}

impl<'a> IntoIterator for &'a MidiBuffer {
    type Item = &'a TimedMessage;
    type IntoIter = core::slice::Iter<'a, TimedMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
