//! The recursive cell tree a measure is built from.

use alloc::vec::Vec;

/// A sounding note inside a cell's time window.
///
/// `velocity`, `delay` and `gate` are fractions in [0, 1] of the enclosing
/// window: `delay` offsets the start, `gate` is the share of the remaining
/// window the note sounds for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    /// Tuning-step index, relative to the base frequency
    pub pitch: i32,
    pub velocity: f32,
    pub delay: f32,
    pub gate: f32,
}

impl Note {
    /// A full-length note with the given pitch and velocity.
    pub const fn new(pitch: i32, velocity: f32) -> Self {
        Self {
            pitch,
            velocity,
            delay: 0.0,
            gate: 1.0,
        }
    }

    pub const fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    pub const fn with_gate(mut self, gate: f32) -> Self {
        self.gate = gate;
        self
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new(0, 0.8)
    }
}

/// A weighted child of a [`Sequence`].
#[derive(Clone, Debug, PartialEq)]
pub struct Child {
    /// Relative share of the parent window
    pub weight: f32,
    pub cell: Cell,
}

/// An ordered list of weighted children.
///
/// Each child receives `weight / sum(weights)` of the parent's window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    pub children: Vec<Child>,
}

impl Sequence {
    /// A sequence where every cell gets an equal share.
    pub fn even(cells: impl IntoIterator<Item = Cell>) -> Self {
        Self {
            children: cells
                .into_iter()
                .map(|cell| Child { weight: 1.0, cell })
                .collect(),
        }
    }

    /// A sequence from explicit `(weight, cell)` pairs.
    pub fn weighted(children: impl IntoIterator<Item = (f32, Cell)>) -> Self {
        Self {
            children: children
                .into_iter()
                .map(|(weight, cell)| Child { weight, cell })
                .collect(),
        }
    }

    /// Sum of usable weights. Negative and non-finite weights count as zero.
    pub fn total_weight(&self) -> f32 {
        self.children.iter().map(|c| usable_weight(c.weight)).sum()
    }

    /// Fraction of the parent window given to child `index`.
    ///
    /// When no child has a usable weight the window is split evenly.
    pub fn share(&self, index: usize) -> f64 {
        let count = self.children.len();
        if index >= count {
            return 0.0;
        }
        let total = self.total_weight();
        if total > 0.0 {
            usable_weight(self.children[index].weight) as f64 / total as f64
        } else {
            1.0 / count as f64
        }
    }
}

fn usable_weight(weight: f32) -> f32 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// A node in a measure's cell tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Cell {
    /// Silence
    #[default]
    Rest,
    Note(Note),
    Sequence(Sequence),
}

impl Cell {
    /// Shorthand for a full-length note.
    pub const fn note(pitch: i32, velocity: f32) -> Self {
        Cell::Note(Note::new(pitch, velocity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_follow_weights() {
        let seq = Sequence::weighted([(1.0, Cell::Rest), (3.0, Cell::Rest)]);
        assert_eq!(seq.share(0), 0.25);
        assert_eq!(seq.share(1), 0.75);
        assert_eq!(seq.share(2), 0.0);
    }

    #[test]
    fn all_zero_weights_split_evenly() {
        let seq = Sequence::weighted([(0.0, Cell::Rest), (0.0, Cell::Rest), (0.0, Cell::Rest), (0.0, Cell::Rest)]);
        for i in 0..4 {
            assert_eq!(seq.share(i), 0.25);
        }
    }

    #[test]
    fn negative_and_nan_weights_are_ignored() {
        let seq = Sequence::weighted([(-2.0, Cell::Rest), (f32::NAN, Cell::Rest), (2.0, Cell::Rest)]);
        assert_eq!(seq.share(0), 0.0);
        assert_eq!(seq.share(1), 0.0);
        assert_eq!(seq.share(2), 1.0);
    }
}
