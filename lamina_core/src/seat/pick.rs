// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Finding the surface under a point.

use kurbo::Point;

use crate::Compositor;
use crate::surface::{Surface, SurfaceId};

impl Compositor {
    /// The topmost surface accepting input at `point`, and `point` in that
    /// surface's local coordinates.
    ///
    /// Layers are walked top to bottom, then each mapped surface's tree in
    /// reverse committed stacking order, so a subsurface above its parent
    /// occludes it and one stacked below is occluded by it.
    #[must_use]
    pub fn pick(&self, point: Point) -> Option<(SurfaceId, Point)> {
        self.scene
            .top_to_bottom()
            .find_map(|id| self.pick_tree(id, point))
    }

    fn pick_tree(&self, id: SurfaceId, point: Point) -> Option<(SurfaceId, Point)> {
        let surface = self.surfaces.get(id)?;
        for &entry in surface.committed_order.iter().rev() {
            let hit = if entry == id {
                accepts_input(surface, point).then(|| (id, surface.to_local(point)))
            } else if self.is_subsurface_of(entry, id) {
                self.pick_tree(entry, point)
            } else {
                None
            };
            if hit.is_some() {
                return hit;
            }
        }
        None
    }
}

/// Geometry test, then the exact test in the unit box, then the input
/// region.
fn accepts_input(surface: &Surface, point: Point) -> bool {
    let current = surface.current();
    let Some(matrices) = current.matrices.as_ref() else {
        return false;
    };
    if current.buffer.is_none() || !surface.geometry().contains(point) {
        return false;
    }
    let unit = matrices.global_to_unit(point);
    if unit.x.abs() > 1.0 || unit.y.abs() > 1.0 {
        return false;
    }
    current
        .input
        .as_ref()
        .is_none_or(|region| region.contains(surface.to_local(point)))
}
