// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subsurface composition trees.
//!
//! A subsurface is positioned relative to its parent and stacked among its
//! siblings and the parent itself. Each surface keeps two stacking lists of
//! itself and its direct children, bottom to top: the pending list edited by
//! [`Compositor::place_above`] and [`Compositor::place_below`], and the
//! committed list the renderer reads, replaced on the parent's commit.
//!
//! A subsurface in synchronized mode, or with any synchronized ancestor, is
//! *effectively synchronized*: its commits are cached and applied only when
//! the parent's state is applied (see [`crate::surface`]).
//!
//! Parent links are weak. Destroying a parent orphans its children, which
//! keep their role but are no longer shown. The child's geometry depends on
//! its parent's through a dirty-tracker edge on the geometry channel.

use kurbo::{Point, Vec2};
use tracing::{debug, warn};

use crate::Compositor;
use crate::dirty;
use crate::error::{CoreError, ProtocolViolation};
use crate::signal::Signal;
use crate::surface::{Role, RoleKind, SubsurfaceRole, Surface, SurfaceId};

impl Compositor {
    /// Makes `surface` a subsurface of `parent`, placed on top of the
    /// parent's pending stacking order.
    ///
    /// The new subsurface starts in synchronized mode at position `(0, 0)`.
    pub fn create_subsurface(
        &mut self,
        surface: SurfaceId,
        parent: SurfaceId,
    ) -> Result<(), CoreError> {
        self.surface_ref(surface)?;
        self.surface_ref(parent)?;
        if surface == parent || self.is_ancestor(surface, parent) {
            return Err(self.violation(surface, ProtocolViolation::BadParent));
        }
        self.assign_role(surface, Role::Subsurface(SubsurfaceRole::new(parent)))?;

        let parent_surface = self.surface_mut(parent)?;
        parent_surface.pending_order.push(surface);
        let origin = parent_surface.origin();
        self.surface_mut(surface)?.base = origin;
        let linked = self
            .dirty
            .add_dependency(surface.idx, parent.idx, dirty::GEOMETRY)
            .is_ok();
        if !linked {
            warn!(?surface, ?parent, "geometry dependency rejected");
        }
        debug_assert!(linked, "ancestor cycles are refused above");

        self.signals.push(Signal::SubsurfaceCreated { surface, parent });
        debug!(?surface, ?parent, "subsurface created");
        self.update_geometry(surface);
        Ok(())
    }

    /// Ends the subsurface role of `surface`, unlinking it from its parent.
    pub fn destroy_subsurface(&mut self, surface: SurfaceId) -> Result<(), CoreError> {
        let Some(parent) = self.surface_ref(surface)?.role.as_subsurface().map(|sub| sub.parent)
        else {
            return Err(CoreError::WrongRole {
                surface,
                expected: RoleKind::Subsurface,
            });
        };
        self.discard_cache(surface);
        let s = self.surface_mut(surface)?;
        s.role = Role::None;
        s.base = Point::ORIGIN;

        if let Some(parent) = parent {
            self.detach_from_parent(surface, parent);
        }
        self.signals
            .push(Signal::SubsurfaceDestroyed { surface, parent });
        debug!(?surface, ?parent, "subsurface destroyed");
        self.update_geometry(surface);
        self.drop_keyboard_focus_in_tree(surface);
        self.refocus_pointers();
        Ok(())
    }

    /// Sets the subsurface's offset from its parent. Takes effect on the
    /// parent's next applied commit.
    pub fn set_subsurface_position(
        &mut self,
        surface: SurfaceId,
        x: i32,
        y: i32,
    ) -> Result<(), CoreError> {
        let sub = self.subsurface_mut(surface)?;
        sub.pending_position = Some(Vec2::new(f64::from(x), f64::from(y)));
        Ok(())
    }

    /// Moves the subsurface directly above `sibling` in the parent's pending
    /// stacking order. `sibling` is another child of the same parent or the
    /// parent itself.
    pub fn place_above(&mut self, surface: SurfaceId, sibling: SurfaceId) -> Result<(), CoreError> {
        self.restack(surface, sibling, true)
    }

    /// Moves the subsurface directly below `sibling`.
    pub fn place_below(&mut self, surface: SurfaceId, sibling: SurfaceId) -> Result<(), CoreError> {
        self.restack(surface, sibling, false)
    }

    fn restack(
        &mut self,
        surface: SurfaceId,
        sibling: SurfaceId,
        above: bool,
    ) -> Result<(), CoreError> {
        let parent = self.subsurface_mut(surface)?.parent;
        let Some(parent) = parent.filter(|p| {
            sibling != surface && (sibling == *p || self.is_subsurface_of(sibling, *p))
        }) else {
            return Err(self.violation(surface, ProtocolViolation::BadSibling(sibling)));
        };

        let order = &mut self.surface_mut(parent)?.pending_order;
        order.retain(|s| *s != surface);
        let at = order
            .iter()
            .position(|s| *s == sibling)
            .map_or(order.len(), |i| if above { i + 1 } else { i });
        order.insert(at, surface);
        Ok(())
    }

    /// Puts the subsurface in synchronized mode.
    pub fn set_sync(&mut self, surface: SurfaceId) -> Result<(), CoreError> {
        self.subsurface_mut(surface)?.sync = true;
        Ok(())
    }

    /// Puts the subsurface in desynchronized mode.
    ///
    /// If that makes it effectively desynchronized, state it has cached is
    /// applied immediately, and so is that of descendants released along
    /// with it.
    pub fn set_desync(&mut self, surface: SurfaceId) -> Result<(), CoreError> {
        let sub = self.subsurface_mut(surface)?;
        if !sub.sync {
            return Ok(());
        }
        sub.sync = false;
        if !self.is_effectively_sync(surface) {
            self.release_cached(surface);
        }
        Ok(())
    }

    fn release_cached(&mut self, id: SurfaceId) {
        let has_cache = self
            .surfaces
            .get(id)
            .and_then(|s| s.role.as_subsurface())
            .is_some_and(|sub| sub.cached.is_some());
        if has_cache {
            self.flush_cache(id);
            self.commit_sync_children(id);
        }
        let children: Vec<SurfaceId> = match self.surfaces.get(id) {
            Some(s) => s.children().collect(),
            None => return,
        };
        for child in children {
            if self.is_subsurface_of(child, id) && !self.is_effectively_sync(child) {
                self.release_cached(child);
            }
        }
    }

    // -- Queries --

    /// Whether `id` is a subsurface that is synchronized itself or has a
    /// synchronized ancestor.
    #[must_use]
    pub fn is_effectively_sync(&self, id: SurfaceId) -> bool {
        let mut cursor = id;
        loop {
            let Some(sub) = self
                .surfaces
                .get(cursor)
                .and_then(|s| s.role.as_subsurface())
            else {
                return false;
            };
            if sub.sync {
                return true;
            }
            match sub.parent {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    /// The live parent of a subsurface.
    #[must_use]
    pub fn parent_of(&self, id: SurfaceId) -> Option<SurfaceId> {
        self.surfaces
            .get(id)
            .and_then(|s| s.role.as_subsurface())
            .and_then(SubsurfaceRole::parent)
            .filter(|p| self.surfaces.is_alive(*p))
    }

    /// The top of the subsurface tree containing `id`.
    #[must_use]
    pub fn root_of(&self, id: SurfaceId) -> SurfaceId {
        let mut cursor = id;
        while let Some(parent) = self.parent_of(cursor) {
            cursor = parent;
        }
        cursor
    }

    /// Whether `ancestor` is a proper ancestor of `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: SurfaceId, id: SurfaceId) -> bool {
        let mut cursor = id;
        while let Some(parent) = self.parent_of(cursor) {
            if parent == ancestor {
                return true;
            }
            cursor = parent;
        }
        false
    }

    pub(crate) fn is_subsurface_of(&self, child: SurfaceId, parent: SurfaceId) -> bool {
        self.surfaces
            .get(child)
            .and_then(|s| s.role.as_subsurface())
            .is_some_and(|sub| sub.parent == Some(parent))
    }

    fn subsurface_mut(&mut self, surface: SurfaceId) -> Result<&mut SubsurfaceRole, CoreError> {
        self.surface_mut(surface)?
            .role
            .as_subsurface_mut()
            .ok_or(CoreError::WrongRole {
                surface,
                expected: RoleKind::Subsurface,
            })
    }

    // -- Unlinking --

    fn detach_from_parent(&mut self, child: SurfaceId, parent: SurfaceId) {
        self.dirty
            .remove_dependency(child.idx, parent.idx, dirty::GEOMETRY);
        let Some(p) = self.surfaces.get_mut(parent) else {
            return;
        };
        p.pending_order.retain(|s| *s != child);
        let before = p.committed_order.len();
        p.committed_order.retain(|s| *s != child);
        if p.committed_order.len() != before {
            self.dirty.mark(parent.idx, dirty::STACKING);
        }
    }

    /// Clears every subsurface link of a surface leaving the arena.
    pub(crate) fn unlink_subsurfaces(&mut self, id: SurfaceId, surface: &Surface) {
        if let Some(parent) = surface.role.as_subsurface().and_then(SubsurfaceRole::parent) {
            self.detach_from_parent(id, parent);
            self.signals.push(Signal::SubsurfaceDestroyed {
                surface: id,
                parent: Some(parent),
            });
        }

        let mut children: Vec<SurfaceId> = surface
            .pending_order
            .iter()
            .chain(&surface.committed_order)
            .copied()
            .filter(|c| *c != id)
            .collect();
        children.sort();
        children.dedup();
        for child in children {
            let Some(sub) = self
                .surfaces
                .get_mut(child)
                .and_then(|s| s.role.as_subsurface_mut())
            else {
                continue;
            };
            if sub.parent == Some(id) {
                sub.parent = None;
                self.dirty
                    .remove_dependency(child.idx, id.idx, dirty::GEOMETRY);
                self.discard_cache(child);
                debug!(surface = ?child, "subsurface orphaned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Point, Rect};

    use crate::Compositor;
    use crate::buffer::{Buffer, BufferId};
    use crate::error::{CoreError, ProtocolViolation};
    use crate::signal::Signal;
    use crate::surface::{ClientId, SurfaceId};
    use crate::test_support::toplevel;

    fn buffer(id: u64) -> Buffer {
        Buffer::argb(BufferId(id), 10, 10)
    }

    fn child_of(c: &mut Compositor, parent: SurfaceId) -> SurfaceId {
        let child = c.create_surface(ClientId(1));
        c.create_subsurface(child, parent).unwrap();
        child
    }

    #[test]
    fn parent_cycles_are_rejected() {
        let mut c = Compositor::default();
        let a = c.create_surface(ClientId(1));
        let b = child_of(&mut c, a);
        let err = c.create_subsurface(a, b).unwrap_err();
        assert_eq!(
            err,
            CoreError::Protocol {
                surface: a,
                violation: ProtocolViolation::BadParent
            }
        );
        assert!(c.create_subsurface(a, a).is_err());
    }

    #[test]
    fn stacking_applies_on_parent_commit() {
        let mut c = Compositor::default();
        let parent = toplevel(&mut c, ClientId(1), buffer(1), Point::ORIGIN);
        let a = child_of(&mut c, parent);
        let b = child_of(&mut c, parent);
        assert_eq!(c.surface(parent).unwrap().stacking(), &[parent]);
        assert_eq!(c.surface(parent).unwrap().pending_stacking(), &[parent, a, b]);

        c.place_below(b, parent).unwrap();
        c.place_above(a, b).unwrap();
        c.commit(parent).unwrap();
        assert_eq!(c.surface(parent).unwrap().stacking(), &[b, a, parent]);
    }

    #[test]
    fn bad_sibling_is_a_violation() {
        let mut c = Compositor::default();
        let parent = c.create_surface(ClientId(1));
        let other = c.create_surface(ClientId(1));
        let a = child_of(&mut c, parent);
        assert_eq!(
            c.place_above(a, other),
            Err(CoreError::Protocol {
                surface: a,
                violation: ProtocolViolation::BadSibling(other)
            })
        );
        assert!(c.place_above(a, a).is_err());
    }

    #[test]
    fn synchronized_commits_wait_for_parent() {
        let mut c = Compositor::default();
        let parent = toplevel(&mut c, ClientId(1), buffer(1), Point::new(100.0, 100.0));
        let child = child_of(&mut c, parent);
        c.set_subsurface_position(child, 5, 5).unwrap();
        c.attach(child, Some(buffer(2)), 0, 0).unwrap();
        c.commit(child).unwrap();

        let s = c.surface(child).unwrap();
        assert!(s.current().buffer.is_none(), "cached, not applied");
        assert!(s.role().as_subsurface().unwrap().cached().is_some());

        c.commit(parent).unwrap();
        let s = c.surface(child).unwrap();
        assert_eq!(s.current().buffer.map(|b| b.id), Some(BufferId(2)));
        assert_eq!(s.geometry(), Rect::new(105.0, 105.0, 115.0, 115.0));
        assert!(s.role().as_subsurface().unwrap().cached().is_none());
        assert_eq!(c.render_order(), vec![parent, child]);
    }

    #[test]
    fn desync_flushes_cache() {
        let mut c = Compositor::default();
        let parent = toplevel(&mut c, ClientId(1), buffer(1), Point::ORIGIN);
        let child = child_of(&mut c, parent);
        c.attach(child, Some(buffer(2)), 0, 0).unwrap();
        c.commit(child).unwrap();
        assert!(c.surface(child).unwrap().current().buffer.is_none());

        c.set_desync(child).unwrap();
        assert_eq!(
            c.surface(child).unwrap().current().buffer.map(|b| b.id),
            Some(BufferId(2))
        );
        c.attach(child, Some(buffer(3)), 0, 0).unwrap();
        c.commit(child).unwrap();
        assert_eq!(
            c.surface(child).unwrap().current().buffer.map(|b| b.id),
            Some(BufferId(3)),
            "desynchronized commits apply at once"
        );
    }

    #[test]
    fn synchronized_ancestor_wins() {
        let mut c = Compositor::default();
        let root = c.create_surface(ClientId(1));
        let mid = child_of(&mut c, root);
        let leaf = child_of(&mut c, mid);
        c.set_desync(leaf).unwrap();
        assert!(c.is_effectively_sync(leaf), "mid is still synchronized");
        c.set_desync(mid).unwrap();
        assert!(!c.is_effectively_sync(leaf));
        assert!(!c.is_effectively_sync(root));
    }

    #[test]
    fn nested_caches_apply_in_one_parent_commit() {
        let mut c = Compositor::default();
        let root = toplevel(&mut c, ClientId(1), buffer(1), Point::ORIGIN);
        let mid = child_of(&mut c, root);
        let leaf = child_of(&mut c, mid);
        c.attach(leaf, Some(buffer(3)), 0, 0).unwrap();
        c.commit(leaf).unwrap();
        c.attach(mid, Some(buffer(2)), 0, 0).unwrap();
        c.commit(mid).unwrap();
        assert_eq!(c.surface(leaf).unwrap().commit_count(), 0);

        c.commit(root).unwrap();
        assert_eq!(c.surface(mid).unwrap().commit_count(), 1);
        assert_eq!(c.surface(leaf).unwrap().commit_count(), 1);
        assert_eq!(c.render_order(), vec![root, mid, leaf]);
    }

    #[test]
    fn destroying_parent_orphans_children() {
        let mut c = Compositor::default();
        let parent = toplevel(&mut c, ClientId(1), buffer(1), Point::ORIGIN);
        let child = child_of(&mut c, parent);
        c.commit(parent).unwrap();
        c.take_signals();

        c.destroy_surface(parent).unwrap();
        let sub = c.surface(child).unwrap().role().as_subsurface().unwrap().clone();
        assert_eq!(sub.parent(), None);
        assert!(c.is_effectively_sync(child), "an orphan keeps its own mode");
        assert!(c.render_order().is_empty());
    }

    #[test]
    fn destroying_child_leaves_parent_stacking() {
        let mut c = Compositor::default();
        let parent = toplevel(&mut c, ClientId(1), buffer(1), Point::ORIGIN);
        let child = child_of(&mut c, parent);
        c.commit(parent).unwrap();
        c.take_signals();

        c.destroy_surface(child).unwrap();
        assert_eq!(c.surface(parent).unwrap().stacking(), &[parent]);
        assert!(c.take_signals().contains(&Signal::SubsurfaceDestroyed {
            surface: child,
            parent: Some(parent)
        }));
    }

    #[test]
    fn role_destroy_keeps_kind() {
        let mut c = Compositor::default();
        let parent = c.create_surface(ClientId(1));
        let child = child_of(&mut c, parent);
        c.destroy_subsurface(child).unwrap();
        assert_eq!(c.surface(parent).unwrap().pending_stacking(), &[parent]);
        assert!(c.make_toplevel(child).is_err());
        c.create_subsurface(child, parent).unwrap();
    }
}
