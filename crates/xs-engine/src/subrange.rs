//! Half-open sub-range extraction over looping rendered buffers.
//!
//! Everything here borrows the source buffer and allocates nothing, so it
//! is safe to call from the audio callback.

use xs_ir::{MidiMessage, SampleIndex, TimedMessage};

/// Events of a rendered buffer in `[begin, end)`, rebased so `begin` is 0.
///
/// When `begin > end` the range wraps: `[begin, loop_boundary)` is followed
/// by `[0, end)`, the second part shifted by `loop_boundary - begin` so the
/// result reads as one uninterrupted range. `buffer` must be sorted by
/// sample.
pub fn extract(
    buffer: &[TimedMessage],
    begin: SampleIndex,
    end: SampleIndex,
    loop_boundary: SampleIndex,
) -> Subrange<'_> {
    let index_of = |sample: SampleIndex| buffer.partition_point(|e| e.sample < sample);

    if begin <= end {
        let lo = index_of(begin);
        let hi = index_of(end);
        return Subrange {
            head: &buffer[lo..hi],
            head_base: begin,
            tail: &[],
            tail_shift: 0,
        };
    }

    debug_assert!(
        begin < loop_boundary,
        "wrapping range must begin inside the loop ({} >= {})",
        begin,
        loop_boundary
    );
    let lo = index_of(begin);
    let hi = index_of(loop_boundary).max(lo);
    let tail_hi = index_of(end);
    Subrange {
        head: &buffer[lo..hi],
        head_base: begin,
        tail: &buffer[..tail_hi],
        tail_shift: loop_boundary.saturating_sub(begin),
    }
}

/// Iterator returned by [`extract`].
#[derive(Clone, Debug)]
pub struct Subrange<'a> {
    head: &'a [TimedMessage],
    head_base: SampleIndex,
    tail: &'a [TimedMessage],
    tail_shift: SampleIndex,
}

impl Iterator for Subrange<'_> {
    type Item = TimedMessage;

    fn next(&mut self) -> Option<TimedMessage> {
        if let Some((first, rest)) = self.head.split_first() {
            self.head = rest;
            return Some(TimedMessage::new(first.sample - self.head_base, first.message));
        }
        let (first, rest) = self.tail.split_first()?;
        self.tail = rest;
        Some(TimedMessage::new(first.sample + self.tail_shift, first.message))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.head.len() + self.tail.len();
        (len, Some(len))
    }
}

impl ExactSizeIterator for Subrange<'_> {}

/// The last note event strictly before `before`.
///
/// With `wrap`, a buffer with nothing before `before` falls back to its
/// last note event overall, as a loop that has already played through once
/// would have.
pub fn most_recent_note_event(
    buffer: &[TimedMessage],
    before: SampleIndex,
    wrap: bool,
) -> Option<MidiMessage> {
    most_recent(buffer, before, wrap, |m| m.is_note_on_or_off())
}

/// Value of the last pitch bend strictly before `before`, wrapping like
/// [`most_recent_note_event`].
pub fn most_recent_pitch_bend(buffer: &[TimedMessage], before: SampleIndex, wrap: bool) -> Option<u16> {
    match most_recent(buffer, before, wrap, |m| matches!(m, MidiMessage::PitchBend { .. }))? {
        MidiMessage::PitchBend { value, .. } => Some(value),
        _ => None,
    }
}

fn most_recent(
    buffer: &[TimedMessage],
    before: SampleIndex,
    wrap: bool,
    pred: impl Fn(MidiMessage) -> bool,
) -> Option<MidiMessage> {
    let split = buffer.partition_point(|e| e.sample < before);
    let found = buffer[..split].iter().rev().find(|e| pred(e.message));
    let found = match found {
        Some(e) => Some(e),
        None if wrap => buffer[split..].iter().rev().find(|e| pred(e.message)),
        None => None,
    };
    found.map(|e| e.message)
}
