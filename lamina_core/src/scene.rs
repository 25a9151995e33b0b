// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layered stacking of shell surfaces.
//!
//! The desktop shell decides where toplevels and popups go; the scene only
//! records its decisions. Surfaces live in one of five [`Layer`]s and are
//! ordered bottom to top within each. Subsurfaces are never in the scene
//! directly: they are reached through their parent's committed stacking.

use kurbo::Point;
use tracing::debug;

use crate::Compositor;
use crate::dirty;
use crate::error::CoreError;
use crate::signal::Signal;
use crate::surface::{RoleKind, SurfaceId};

/// Scene layers, bottom to top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Wallpapers.
    Background,
    /// Desktop widgets below windows.
    Bottom,
    /// Ordinary windows.
    Normal,
    /// Panels above windows.
    Top,
    /// Lock screens, notifications and other overlays.
    Overlay,
}

impl Layer {
    /// Every layer, bottom to top.
    pub const ALL: [Self; 5] = [
        Self::Background,
        Self::Bottom,
        Self::Normal,
        Self::Top,
        Self::Overlay,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Background => 0,
            Self::Bottom => 1,
            Self::Normal => 2,
            Self::Top => 3,
            Self::Overlay => 4,
        }
    }
}

/// Mapped shell surfaces per layer.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    layers: [Vec<SurfaceId>; 5],
}

impl Scene {
    /// The layer holding `id`.
    #[must_use]
    pub fn layer_of(&self, id: SurfaceId) -> Option<Layer> {
        Layer::ALL
            .into_iter()
            .find(|layer| self.layers[layer.index()].contains(&id))
    }

    /// Returns whether `id` is in the scene.
    #[must_use]
    pub fn contains(&self, id: SurfaceId) -> bool {
        self.layer_of(id).is_some()
    }

    /// Surfaces of one layer, bottom to top.
    #[must_use]
    pub fn layer(&self, layer: Layer) -> &[SurfaceId] {
        &self.layers[layer.index()]
    }

    /// All surfaces, bottom to top.
    pub fn bottom_to_top(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.layers.iter().flatten().copied()
    }

    /// All surfaces, top to bottom.
    pub fn top_to_bottom(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.layers.iter().rev().flat_map(|l| l.iter().rev()).copied()
    }

    pub(crate) fn insert(&mut self, layer: Layer, id: SurfaceId) {
        self.remove(id);
        self.layers[layer.index()].push(id);
    }

    pub(crate) fn remove(&mut self, id: SurfaceId) -> bool {
        for layer in &mut self.layers {
            if let Some(pos) = layer.iter().position(|s| *s == id) {
                layer.remove(pos);
                return true;
            }
        }
        false
    }

    pub(crate) fn raise(&mut self, id: SurfaceId) -> bool {
        match self.layer_of(id) {
            Some(layer) => {
                let list = &mut self.layers[layer.index()];
                if list.last() == Some(&id) {
                    return false;
                }
                list.retain(|s| *s != id);
                list.push(id);
                true
            }
            None => false,
        }
    }
}

impl Compositor {
    /// The scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Places a toplevel or popup at the top of `layer`, with its origin at
    /// `position`.
    pub fn map_surface(
        &mut self,
        id: SurfaceId,
        layer: Layer,
        position: Point,
    ) -> Result<(), CoreError> {
        let surface = self.surface_mut(id)?;
        if !matches!(
            surface.role.kind(),
            Some(RoleKind::Toplevel | RoleKind::Popup)
        ) {
            return Err(CoreError::WrongRole {
                surface: id,
                expected: RoleKind::Toplevel,
            });
        }
        surface.base = position;
        self.scene.insert(layer, id);
        self.dirty.mark(id.idx, dirty::STACKING);
        self.update_geometry(id);
        debug!(surface = ?id, ?layer, ?position, "surface mapped into scene");
        self.refocus_pointers();
        Ok(())
    }

    /// Removes a surface from the scene at the shell's request.
    pub fn unmap_surface(&mut self, id: SurfaceId) -> Result<(), CoreError> {
        self.surface_ref(id)?;
        if self.scene.remove(id) {
            self.dirty.mark(id.idx, dirty::STACKING);
            self.close_popup_chains_at(id);
            self.drop_keyboard_focus_in_tree(id);
            self.refocus_pointers();
        }
        Ok(())
    }

    /// Unmaps a surface whose role lost its content or was destroyed.
    pub(crate) fn unmap_internal(&mut self, id: SurfaceId) {
        if let Some(surface) = self.surfaces.get_mut(id) {
            if let crate::surface::Role::Toplevel(shell) | crate::surface::Role::Popup(shell) =
                &mut surface.role
            {
                shell.mapped = false;
            }
        }
        if self.scene.remove(id) {
            self.dirty.mark(id.idx, dirty::STACKING);
        }
        self.signals.push(Signal::SurfaceUnmapped(id));
        debug!(surface = ?id, "surface unmapped");
        self.close_popup_chains_at(id);
        self.drop_keyboard_focus_in_tree(id);
        self.refocus_pointers();
    }

    /// Moves a surface to the top of its layer.
    pub fn raise_surface(&mut self, id: SurfaceId) -> Result<(), CoreError> {
        self.surface_ref(id)?;
        if self.scene.raise(id) {
            self.dirty.mark(id.idx, dirty::STACKING);
            self.refocus_pointers();
        }
        Ok(())
    }

    /// Moves a top-level surface's origin to `position`.
    pub fn set_surface_position(&mut self, id: SurfaceId, position: Point) -> Result<(), CoreError> {
        let surface = self.surface_mut(id)?;
        if surface.role.as_subsurface().is_some() {
            return Err(CoreError::WrongRole {
                surface: id,
                expected: RoleKind::Toplevel,
            });
        }
        surface.base = position;
        self.update_geometry(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Buffer, BufferId};
    use crate::surface::ClientId;
    use crate::test_support::toplevel;

    #[test]
    fn layers_order_before_insertion() {
        let mut c = Compositor::default();
        let panel = c.create_surface(ClientId(1));
        c.make_toplevel(panel).unwrap();
        c.map_surface(panel, Layer::Top, Point::ORIGIN).unwrap();
        let window = toplevel(&mut c, ClientId(2), Buffer::argb(BufferId(1), 4, 4), Point::ORIGIN);
        let wallpaper = c.create_surface(ClientId(3));
        c.make_toplevel(wallpaper).unwrap();
        c.map_surface(wallpaper, Layer::Background, Point::ORIGIN).unwrap();

        let order: Vec<_> = c.scene().bottom_to_top().collect();
        assert_eq!(order, vec![wallpaper, window, panel]);
        let reversed: Vec<_> = c.scene().top_to_bottom().collect();
        assert_eq!(reversed, vec![panel, window, wallpaper]);
    }

    #[test]
    fn raise_within_layer() {
        let mut c = Compositor::default();
        let a = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 4, 4), Point::ORIGIN);
        let b = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(2), 4, 4), Point::ORIGIN);
        assert_eq!(c.scene().layer(Layer::Normal), &[a, b]);
        c.raise_surface(a).unwrap();
        assert_eq!(c.scene().layer(Layer::Normal), &[b, a]);
    }

    #[test]
    fn only_shell_roles_map() {
        let mut c = Compositor::default();
        let s = c.create_surface(ClientId(1));
        assert!(matches!(
            c.map_surface(s, Layer::Normal, Point::ORIGIN),
            Err(CoreError::WrongRole { .. })
        ));
    }

    #[test]
    fn null_attach_unmaps() {
        let mut c = Compositor::default();
        let s = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 4, 4), Point::ORIGIN);
        c.take_signals();
        c.attach(s, None, 0, 0).unwrap();
        c.commit(s).unwrap();
        assert!(!c.scene().contains(s));
        assert!(c.take_signals().contains(&Signal::SurfaceUnmapped(s)));
        assert!(!c.surface(s).unwrap().role().is_mapped());
    }
}
