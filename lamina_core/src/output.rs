// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display output identification and layout.
//!
//! [`OutputId`] is a lightweight handle identifying a specific display.
//! Backends assign these; the core only needs each output's rectangle in the
//! global compositor space, to resolve absolute pointer motion and to track
//! which outputs a surface overlaps ([`OutputMask`]).

use core::fmt;

use kurbo::{Point, Rect};

/// Identifies a specific display output.
///
/// Backends assign output IDs to distinguish multiple displays. Core code
/// passes them through without interpreting the value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OutputId(pub u32);

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputId({})", self.0)
    }
}

/// Maximum number of simultaneously known outputs.
pub const MAX_OUTPUTS: usize = 32;

/// The set of output slots a surface overlaps, one bit per slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutputMask(pub u32);

impl OutputMask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Returns whether slot `slot` is in the set.
    #[must_use]
    pub const fn contains(self, slot: usize) -> bool {
        slot < MAX_OUTPUTS && self.0 & (1 << slot) != 0
    }

    /// Returns whether no slot is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn insert(&mut self, slot: usize) {
        if slot < MAX_OUTPUTS {
            self.0 |= 1 << slot;
        }
    }
}

impl fmt::Debug for OutputMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputMask({:#b})", self.0)
    }
}

/// Rectangles of the known outputs, addressed by slot.
#[derive(Clone, Debug, Default)]
pub(crate) struct OutputLayout {
    slots: Vec<Option<(OutputId, Rect)>>,
}

impl OutputLayout {
    /// Adds or moves an output. Returns `false` if every slot is taken.
    pub(crate) fn insert(&mut self, id: OutputId, rect: Rect) -> bool {
        if let Some(slot) = self.slots.iter_mut().flatten().find(|(o, _)| *o == id) {
            slot.1 = rect;
            return true;
        }
        if let Some(free) = self.slots.iter_mut().find(|s| s.is_none()) {
            *free = Some((id, rect));
            return true;
        }
        if self.slots.len() < MAX_OUTPUTS {
            self.slots.push(Some((id, rect)));
            return true;
        }
        false
    }

    pub(crate) fn remove(&mut self, id: OutputId) -> bool {
        for slot in &mut self.slots {
            if slot.is_some_and(|(o, _)| o == id) {
                *slot = None;
                return true;
            }
        }
        false
    }

    pub(crate) fn rect(&self, id: OutputId) -> Option<Rect> {
        self.slots
            .iter()
            .flatten()
            .find(|(o, _)| *o == id)
            .map(|(_, r)| *r)
    }

    pub(crate) fn slot_of(&self, id: OutputId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.is_some_and(|(o, _)| o == id))
    }

    /// Returns the slots whose rectangle intersects `rect` with non-zero area.
    pub(crate) fn mask_for(&self, rect: Rect) -> OutputMask {
        let mut mask = OutputMask::EMPTY;
        for (slot, entry) in self.slots.iter().enumerate() {
            if let Some((_, output)) = entry {
                if overlaps(*output, rect) {
                    mask.insert(slot);
                }
            }
        }
        mask
    }

    /// Clamps `point` into the bounding box of all outputs.
    ///
    /// With no outputs the point is returned unchanged.
    pub(crate) fn clamp(&self, point: Point) -> Point {
        let mut bounds: Option<Rect> = None;
        for (_, rect) in self.slots.iter().flatten() {
            bounds = Some(bounds.map_or(*rect, |b| b.union(*rect)));
        }
        match bounds {
            Some(b) => Point::new(
                point.x.clamp(b.x0, (b.x1 - 1.0).max(b.x0)),
                point.y.clamp(b.y0, (b.y1 - 1.0).max(b.y0)),
            ),
            None => point,
        }
    }
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_tracks_overlapping_outputs() {
        let mut layout = OutputLayout::default();
        assert!(layout.insert(OutputId(7), Rect::new(0.0, 0.0, 100.0, 100.0)));
        assert!(layout.insert(OutputId(9), Rect::new(100.0, 0.0, 200.0, 100.0)));

        let left = layout.mask_for(Rect::new(10.0, 10.0, 20.0, 20.0));
        assert!(left.contains(0));
        assert!(!left.contains(1));

        let both = layout.mask_for(Rect::new(90.0, 10.0, 110.0, 20.0));
        assert_eq!(both, OutputMask(0b11));

        // Touching edges do not count as overlap.
        let edge = layout.mask_for(Rect::new(200.0, 0.0, 210.0, 10.0));
        assert!(edge.is_empty());
    }

    #[test]
    fn removed_slot_is_reused() {
        let mut layout = OutputLayout::default();
        layout.insert(OutputId(1), Rect::new(0.0, 0.0, 10.0, 10.0));
        layout.insert(OutputId(2), Rect::new(10.0, 0.0, 20.0, 10.0));
        assert!(layout.remove(OutputId(1)));
        layout.insert(OutputId(3), Rect::new(20.0, 0.0, 30.0, 10.0));
        assert_eq!(layout.slot_of(OutputId(3)), Some(0));
        assert_eq!(layout.rect(OutputId(1)), None);
    }

    #[test]
    fn clamp_keeps_pointer_on_screen() {
        let mut layout = OutputLayout::default();
        assert_eq!(layout.clamp(Point::new(-5.0, 5.0)), Point::new(-5.0, 5.0));
        layout.insert(OutputId(0), Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(layout.clamp(Point::new(-5.0, 500.0)), Point::new(0.0, 49.0));
    }
}
