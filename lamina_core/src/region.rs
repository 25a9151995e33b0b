// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle-list regions.
//!
//! A [`Region`] is a set of points represented as a list of axis-aligned
//! rectangles. Rectangles never overlap after [`Region::subtract`], but
//! [`Region::add`] may leave overlaps: the representation is only ever used
//! for containment tests and as conservative damage, where overlap is
//! harmless.

use kurbo::{Affine, Point, Rect, Vec2};

use crate::transform::rectify;

/// A set of points made of axis-aligned rectangles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    rects: Vec<Rect>,
}

/// Builds a rectangle from protocol integers.
#[must_use]
pub fn protocol_rect(x: i32, y: i32, width: i32, height: i32) -> Rect {
    Rect::new(
        f64::from(x),
        f64::from(y),
        f64::from(x) + f64::from(width),
        f64::from(y) + f64::from(height),
    )
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a region covering exactly `rect`.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.add(rect);
        region
    }

    /// The rectangles making up the region.
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Returns whether the region covers no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Adds `rect` to the region. Empty rectangles are ignored.
    pub fn add(&mut self, rect: Rect) {
        let rect = rect.abs();
        if rect.width() > 0.0 && rect.height() > 0.0 {
            self.rects.push(rect);
        }
    }

    /// Adds every rectangle of `other`.
    pub fn union(&mut self, other: &Self) {
        self.rects.extend_from_slice(&other.rects);
    }

    /// Removes `rect` from the region.
    ///
    /// Each stored rectangle overlapping `rect` is split into up to four
    /// pieces (above, below, left and right of the hole).
    pub fn subtract(&mut self, rect: Rect) {
        let hole = rect.abs();
        if hole.width() <= 0.0 || hole.height() <= 0.0 {
            return;
        }
        let mut out = Vec::with_capacity(self.rects.len());
        for r in self.rects.drain(..) {
            if !overlaps(r, hole) {
                out.push(r);
                continue;
            }
            let pieces = [
                Rect::new(r.x0, r.y0, r.x1, hole.y0),
                Rect::new(r.x0, hole.y1, r.x1, r.y1),
                Rect::new(r.x0, hole.y0.max(r.y0), hole.x0, hole.y1.min(r.y1)),
                Rect::new(hole.x1, hole.y0.max(r.y0), r.x1, hole.y1.min(r.y1)),
            ];
            out.extend(
                pieces
                    .into_iter()
                    .filter(|p| p.width() > 0.0 && p.height() > 0.0),
            );
        }
        self.rects = out;
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Returns whether `point` lies in the region.
    ///
    /// Rectangles are half-open: the right and bottom edges are excluded.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        self.rects.iter().any(|r| r.contains(point))
    }

    /// Returns whether every point of `rect` lies in the region.
    #[must_use]
    pub fn covers(&self, rect: Rect) -> bool {
        let mut rest = Self::from_rect(rect);
        for r in &self.rects {
            rest.subtract(*r);
            if rest.is_empty() {
                return true;
            }
        }
        rest.is_empty()
    }

    /// The bounding box of the region, or a zero rectangle when empty.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.rects
            .iter()
            .copied()
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
    }

    /// Returns the region moved by `offset`.
    #[must_use]
    pub fn translate(&self, offset: Vec2) -> Self {
        Self {
            rects: self.rects.iter().map(|r| *r + offset).collect(),
        }
    }

    /// Maps every rectangle through `affine`, replacing each by the bounding
    /// box of its image. The result covers the exact image of the region.
    #[must_use]
    pub fn map_bbox(&self, affine: Affine) -> Self {
        let mut out = Self::new();
        for r in &self.rects {
            out.add(rectify(affine, *r));
        }
        out
    }

    /// Rounds every rectangle outward to integer coordinates.
    #[must_use]
    pub fn expand_to_pixels(&self) -> Self {
        Self {
            rects: self.rects.iter().map(|r| r.expand()).collect(),
        }
    }
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}
