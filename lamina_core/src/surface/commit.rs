// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The commit algorithm.
//!
//! A client commit runs in three phases:
//!
//! 1. **Validate.** The view parameters the commit would produce are
//!    resolved (pending over cached over current) and the matrices built.
//!    A failure is a protocol violation and nothing has been touched yet.
//! 2. **Cache or apply.** An effectively synchronized subsurface moves its
//!    pending state into its cache and stops. Anything else applies the
//!    pending view ([`Compositor::apply_commit`]).
//! 3. **Propagate.** Every effectively synchronized child is force-committed
//!    in pre-order, following the committed stacking order. A force-commit
//!    applies the child's cache (or an empty update) without disturbing the
//!    state its client is accumulating.

use core::mem;

use kurbo::Point;
use tracing::{debug, trace, warn};

use crate::Compositor;
use crate::buffer::{Buffer, BufferId};
use crate::dirty;
use crate::error::{CoreError, ProtocolViolation};
use crate::region::Region;
use crate::signal::{ClientEvent, Signal};
use crate::transform::ViewMatrices;

use super::id::SurfaceId;
use super::role::RoleCommit;
use super::store::Texture;
use super::view::{PendingFields, View, resolve_params};

/// The buffer attached in `cached` unless it is also the current one, which
/// is returned by the commit that supersedes it.
fn cached_only_buffer(cached: &View, current: Option<BufferId>) -> Option<BufferId> {
    if !cached.set.contains(PendingFields::BUFFER) {
        return None;
    }
    cached
        .buffer
        .map(|b| b.id)
        .filter(|id| Some(*id) != current)
}

impl Compositor {
    /// Commits the pending state of `id`.
    pub fn commit(&mut self, id: SurfaceId) -> Result<(), CoreError> {
        let sync = self.is_effectively_sync(id);
        let surface = self.surface_ref(id)?;

        let mut stack: Vec<&View> = vec![surface.pending()];
        if sync {
            if let Some(cached) = surface.role.as_subsurface().and_then(|s| s.cached.as_ref()) {
                stack.push(cached);
            }
        }
        stack.push(surface.current());
        if let Some(params) = resolve_params(&stack) {
            if let Err(violation) = ViewMatrices::build(&params, Point::ORIGIN) {
                return Err(self.violation(id, violation));
            }
        }

        if sync {
            self.cache_pending(id);
            trace!(surface = ?id, "commit cached until parent commits");
            return Ok(());
        }
        if let Err(violation) = self.apply_commit(id, None) {
            return Err(self.violation(id, violation));
        }
        self.commit_sync_children(id);
        Ok(())
    }

    /// Force-commits every effectively synchronized child of `id`, depth
    /// first, in committed stacking order.
    pub(crate) fn commit_sync_children(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.get(id) else {
            return;
        };
        let children: Vec<SurfaceId> = surface.children().collect();
        for child in children {
            if !self.is_subsurface_of(child, id) || !self.is_effectively_sync(child) {
                continue;
            }
            self.flush_cache(child);
            self.commit_sync_children(child);
        }
    }

    /// Applies the cached state of a subsurface, or an empty update.
    pub(crate) fn flush_cache(&mut self, id: SurfaceId) {
        let cached = self
            .surfaces
            .get_mut(id)
            .and_then(|s| s.role.as_subsurface_mut())
            .and_then(|sub| sub.cached.take())
            .unwrap_or_default();
        if let Err(violation) = self.apply_commit(id, Some(cached)) {
            // The cache was validated when it was filled; only a later
            // desynchronized commit could have invalidated it.
            let _ = self.violation(id, violation);
        }
    }

    fn cache_pending(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.get_mut(id) else {
            return;
        };
        let pending = mem::take(surface.pending_mut());
        let current = surface.current().buffer.map(|b| b.id);
        let Some(sub) = surface.role.as_subsurface_mut() else {
            return;
        };
        let replaced = match &mut sub.cached {
            Some(cached) => {
                let old = cached_only_buffer(cached, current)
                    .filter(|_| pending.set.contains(PendingFields::BUFFER))
                    .filter(|old| pending.buffer.is_none_or(|b| b.id != *old));
                cached.absorb(pending);
                old
            }
            None => {
                sub.cached = Some(pending);
                None
            }
        };
        if let Some(buffer) = replaced {
            trace!(surface = ?id, ?buffer, "cached buffer superseded");
            self.send(ClientEvent::BufferRelease {
                surface: id,
                buffer,
            });
        }
    }

    /// Drops the cached state of a subsurface that can no longer be
    /// applied, returning a buffer that never became current.
    pub(crate) fn discard_cache(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.get_mut(id) else {
            return;
        };
        let current = surface.current().buffer.map(|b| b.id);
        let Some(cached) = surface
            .role
            .as_subsurface_mut()
            .and_then(|sub| sub.cached.take())
        else {
            return;
        };
        if let Some(buffer) = cached_only_buffer(&cached, current) {
            self.send(ClientEvent::BufferRelease {
                surface: id,
                buffer,
            });
        }
    }

    /// Makes a view current.
    ///
    /// With `staged == None` the pending view is committed. Otherwise
    /// `staged` is committed in its place and the client's pending view is
    /// restored afterwards.
    pub(crate) fn apply_commit(
        &mut self,
        id: SurfaceId,
        staged: Option<View>,
    ) -> Result<(), ProtocolViolation> {
        let Some(surface) = self.surfaces.get(id) else {
            return Ok(());
        };

        // Build the matrices first; nothing below can fail.
        let incoming = staged.as_ref().unwrap_or_else(|| surface.pending());
        let origin = surface.origin() + incoming.offset;
        let matrices = resolve_params(&[incoming, surface.current()])
            .map(|params| ViewMatrices::build(&params, origin))
            .transpose()?;

        let Some(surface) = self.surfaces.get_mut(id) else {
            return Ok(());
        };
        let client_pending = staged.map(|view| mem::replace(surface.pending_mut(), view));

        // Carry persistent fields and unfired frame callbacks forward.
        let mut current = mem::take(surface.current_mut());
        let committed = surface.pending_mut();
        committed.inherit(&current);
        let mut callbacks = mem::take(&mut current.frame_callbacks);
        callbacks.append(&mut committed.frame_callbacks);
        committed.frame_callbacks = callbacks;

        if let Some(m) = &matrices {
            let to_buffer = m.surface_to_buffer_region(&committed.damage);
            let to_surface = m.buffer_to_surface_region(&committed.buffer_damage);
            committed.buffer_damage.union(&to_buffer);
            committed.damage.union(&to_surface);
        }
        committed.matrices = matrices;
        *surface.current_mut() = current;

        surface.slots.rotate();
        match client_pending {
            Some(view) => *surface.pending_mut() = view,
            None => surface.pending_mut().reset_pending(),
        }

        let committed = surface.current();
        let buffer_set = committed.set.contains(PendingFields::BUFFER);
        let buffer = committed.buffer;
        let has_damage = !committed.damage.is_empty();
        let buffer_damage = committed.buffer_damage.clone();
        let offset = committed.offset;
        let superseded = surface.previous().buffer;
        surface.attach_offset += offset;
        surface.commits += 1;

        // Subsurface stacking and positions take effect with this commit.
        if surface.committed_order != surface.pending_order {
            surface.committed_order.clone_from(&surface.pending_order);
            self.dirty.mark(id.idx, dirty::STACKING);
        }
        let children: Vec<SurfaceId> = surface.children().collect();
        for child in children {
            if let Some(sub) = self
                .surfaces
                .get_mut(child)
                .and_then(|s| s.role.as_subsurface_mut())
            {
                if let Some(position) = sub.pending_position.take() {
                    sub.position = position;
                }
            }
        }

        if buffer_set {
            self.realize_texture(id, buffer, &buffer_damage);
            if let Some(old) = superseded {
                if buffer.is_none_or(|b| b.id != old.id) {
                    self.events.push(ClientEvent::BufferRelease {
                        surface: id,
                        buffer: old.id,
                    });
                }
            }
            self.signals.push(Signal::SurfaceBufferCommitted(id));
        }
        if buffer_set || has_damage {
            self.dirty.mark(id.idx, dirty::CONTENT);
        }

        self.update_geometry(id);

        let outcome = self.surfaces.get_mut(id).map(|surface| {
            let view = &surface.views[surface.slots.current];
            surface.role.commit(view)
        });
        match outcome {
            Some(RoleCommit::Mapped) => {
                debug!(surface = ?id, "surface has content, ready to map");
                self.signals.push(Signal::SurfaceMapped(id));
            }
            Some(RoleCommit::Unmapped) => self.unmap_internal(id),
            Some(RoleCommit::Unchanged) | None => {}
        }

        trace!(surface = ?id, buffer_set, "commit applied");
        Ok(())
    }

    /// Brings the surface's texture in line with `buffer`.
    fn realize_texture(&mut self, id: SurfaceId, buffer: Option<Buffer>, damage: &Region) {
        let Some(surface) = self.surfaces.get_mut(id) else {
            return;
        };
        let old = surface.texture;
        let Some(buffer) = buffer else {
            if let Some(old) = surface.texture.take() {
                self.backend.release(old.handle);
                debug!(surface = ?id, texture = ?old.handle, "null attach released texture");
            }
            return;
        };

        if let Some(texture) = old {
            if texture.buffer.is_compatible(&buffer) {
                if self.backend.update(texture.handle, &buffer, damage) {
                    surface.texture = Some(Texture {
                        handle: texture.handle,
                        buffer,
                    });
                    return;
                }
                debug!(surface = ?id, texture = ?texture.handle, "incremental update failed, re-importing");
            }
        }

        match self.backend.import(&buffer, damage) {
            Ok(handle) => {
                surface.texture = Some(Texture { handle, buffer });
                if let Some(old) = old {
                    self.backend.release(old.handle);
                }
            }
            Err(err) => {
                warn!(surface = ?id, buffer = ?buffer.id, %err, "buffer import failed, keeping previous texture");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use kurbo::{Point, Rect};

    use crate::Compositor;
    use crate::buffer::{Buffer, BufferId};
    use crate::config::Config;
    use crate::error::{CoreError, ProtocolViolation};
    use crate::signal::{ClientEvent, Signal};
    use crate::surface::ClientId;
    use crate::surface::SurfaceId;
    use crate::test_support::{ProbeBackend, toplevel};

    fn buffer(id: u64, w: u32, h: u32) -> Buffer {
        Buffer::argb(BufferId(id), w, h)
    }

    #[test]
    fn commit_rotates_views() {
        let mut c = Compositor::default();
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 10, 10)), 0, 0).unwrap();
        c.set_buffer_scale(s, 2).unwrap();
        c.commit(s).unwrap();

        let surface = c.surface(s).unwrap();
        assert_eq!(surface.current().buffer.map(|b| b.id), Some(BufferId(1)));
        assert_eq!(surface.current().scale, 2);
        assert!(surface.pending().set.is_empty());
        assert_eq!(surface.geometry(), Rect::new(0.0, 0.0, 5.0, 5.0));
        assert_eq!(surface.commit_count(), 1);

        // Unset fields survive the next commit.
        c.damage(s, 0, 0, 1, 1).unwrap();
        c.commit(s).unwrap();
        let surface = c.surface(s).unwrap();
        assert_eq!(surface.current().scale, 2);
        assert_eq!(surface.current().buffer.map(|b| b.id), Some(BufferId(1)));
        assert_eq!(surface.previous().scale, 2);
    }

    #[test]
    fn damage_is_converted_both_ways() {
        let mut c = Compositor::default();
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 64, 64)), 0, 0).unwrap();
        c.set_destination_size(s, 128, 128).unwrap();
        c.commit(s).unwrap();
        assert_eq!(c.surface(s).unwrap().geometry(), Rect::new(0.0, 0.0, 128.0, 128.0));

        c.damage(s, 0, 0, 64, 64).unwrap();
        c.damage_buffer(s, 60, 60, 4, 4).unwrap();
        c.commit(s).unwrap();
        let current = c.surface(s).unwrap().current();
        assert!(current.buffer_damage.covers(Rect::new(0.0, 0.0, 32.0, 32.0)));
        assert!(current.damage.covers(Rect::new(120.0, 120.0, 128.0, 128.0)));

        let m = current.matrices.unwrap();
        let corner = m.buffer_to_surface * Point::new(32.0, 32.0);
        assert_relative_eq!(corner.x, 64.0);
        assert_relative_eq!(corner.y, 64.0);
    }

    #[test]
    fn crop_outside_buffer_rejects_commit() {
        let mut c = Compositor::default();
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 10, 10)), 0, 0).unwrap();
        c.set_crop(s, 5.0, 5.0, 10.0, 10.0).unwrap();
        assert_eq!(
            c.commit(s),
            Err(CoreError::Protocol {
                surface: s,
                violation: ProtocolViolation::OutOfBuffer
            })
        );
        let surface = c.surface(s).unwrap();
        assert_eq!(surface.commit_count(), 0, "nothing may change");
        assert!(surface.current().buffer.is_none());
        assert!(surface.pending().buffer.is_some());
    }

    #[test]
    fn compatible_buffer_updates_in_place() {
        let (backend, log) = ProbeBackend::new();
        let mut c = Compositor::new(Config::default(), Box::new(backend));
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 8, 8)), 0, 0).unwrap();
        c.commit(s).unwrap();
        let first = c.surface(s).unwrap().texture().unwrap();

        c.attach(s, Some(buffer(2, 8, 8)), 0, 0).unwrap();
        c.damage_buffer(s, 0, 0, 2, 2).unwrap();
        c.commit(s).unwrap();
        assert_eq!(c.surface(s).unwrap().texture(), Some(first));
        let log = log.borrow();
        assert_eq!(log.imports.len(), 1);
        assert_eq!(log.updates.len(), 1);
        assert!(log.releases.is_empty());
    }

    #[test]
    fn failed_update_falls_back_to_import() {
        let (backend, log) = ProbeBackend::new();
        let mut c = Compositor::new(Config::default(), Box::new(backend));
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 8, 8)), 0, 0).unwrap();
        c.commit(s).unwrap();
        let first = c.surface(s).unwrap().texture().unwrap();

        log.borrow_mut().fail_updates = true;
        c.attach(s, Some(buffer(2, 8, 8)), 0, 0).unwrap();
        c.commit(s).unwrap();
        let second = c.surface(s).unwrap().texture().unwrap();
        assert_ne!(first, second);
        assert_eq!(log.borrow().releases, vec![first]);
    }

    #[test]
    fn failed_import_keeps_previous_texture() {
        let (backend, log) = ProbeBackend::new();
        let mut c = Compositor::new(Config::default(), Box::new(backend));
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 8, 8)), 0, 0).unwrap();
        c.commit(s).unwrap();
        let first = c.surface(s).unwrap().texture().unwrap();

        log.borrow_mut().fail_imports = true;
        c.attach(s, Some(buffer(2, 16, 16)), 0, 0).unwrap();
        assert!(c.commit(s).is_ok(), "import failure is not a commit failure");
        assert_eq!(c.surface(s).unwrap().texture(), Some(first));
        assert!(log.borrow().releases.is_empty());
    }

    #[test]
    fn null_attach_releases_and_returns_buffer() {
        let (backend, log) = ProbeBackend::new();
        let mut c = Compositor::new(Config::default(), Box::new(backend));
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 8, 8)), 0, 0).unwrap();
        c.commit(s).unwrap();
        let handle = c.surface(s).unwrap().texture().unwrap();
        c.take_client_events();

        c.attach(s, None, 0, 0).unwrap();
        c.commit(s).unwrap();
        assert_eq!(c.surface(s).unwrap().texture(), None);
        assert_eq!(log.borrow().releases, vec![handle]);
        assert_eq!(
            c.take_client_events(),
            vec![ClientEvent::BufferRelease {
                surface: s,
                buffer: BufferId(1)
            }]
        );
        assert_eq!(c.surface(s).unwrap().geometry().size(), kurbo::Size::ZERO);
    }

    #[test]
    fn attach_offset_moves_origin() {
        let mut c = Compositor::default();
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 8, 8)), 3, -2).unwrap();
        c.commit(s).unwrap();
        assert_eq!(c.surface(s).unwrap().geometry(), Rect::new(3.0, -2.0, 11.0, 6.0));
        c.attach(s, Some(buffer(2, 8, 8)), 1, 1).unwrap();
        c.commit(s).unwrap();
        assert_eq!(c.surface(s).unwrap().origin(), Point::new(4.0, -1.0));
    }

    #[test]
    fn geometry_signal_only_on_change() {
        let mut c = Compositor::default();
        let s = c.create_surface(ClientId(1));
        c.attach(s, Some(buffer(1, 8, 8)), 0, 0).unwrap();
        c.commit(s).unwrap();
        assert!(c.take_signals().contains(&Signal::SurfaceGeometryDirty(s)));

        c.damage(s, 0, 0, 1, 1).unwrap();
        c.commit(s).unwrap();
        assert!(!c.take_signals().contains(&Signal::SurfaceGeometryDirty(s)));
    }

    fn released(events: &[ClientEvent]) -> Vec<BufferId> {
        events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::BufferRelease { buffer, .. } => Some(*buffer),
                _ => None,
            })
            .collect()
    }

    /// A toplevel showing buffer 1 with a synchronized child.
    fn sync_child(c: &mut Compositor) -> (SurfaceId, SurfaceId) {
        let parent = toplevel(c, ClientId(1), buffer(1, 50, 50), Point::ORIGIN);
        let child = c.create_surface(ClientId(1));
        c.create_subsurface(child, parent).unwrap();
        c.take_client_events();
        (parent, child)
    }

    #[test]
    fn buffer_replaced_in_cache_is_returned() {
        let mut c = Compositor::default();
        let (parent, child) = sync_child(&mut c);

        c.attach(child, Some(buffer(2, 10, 10)), 0, 0).unwrap();
        c.commit(child).unwrap();
        c.attach(child, Some(buffer(3, 10, 10)), 0, 0).unwrap();
        c.commit(child).unwrap();
        assert_eq!(released(&c.take_client_events()), [BufferId(2)]);

        // Reattaching the cached buffer keeps it.
        c.attach(child, Some(buffer(3, 10, 10)), 0, 0).unwrap();
        c.commit(child).unwrap();
        assert!(released(&c.take_client_events()).is_empty());

        c.commit(parent).unwrap();
        let s = c.surface(child).unwrap();
        assert_eq!(s.current().buffer.map(|b| b.id), Some(BufferId(3)));
        assert!(released(&c.take_client_events()).is_empty());

        // A cached null attach returns the cached buffer; the current one
        // is returned when the parent applies it.
        c.attach(child, Some(buffer(4, 10, 10)), 0, 0).unwrap();
        c.commit(child).unwrap();
        c.attach(child, None, 0, 0).unwrap();
        c.commit(child).unwrap();
        assert_eq!(released(&c.take_client_events()), [BufferId(4)]);
        c.commit(parent).unwrap();
        assert_eq!(released(&c.take_client_events()), [BufferId(3)]);
    }

    #[test]
    fn unapplied_cache_is_returned_when_dropped() {
        let mut c = Compositor::default();
        let (_, child) = sync_child(&mut c);
        c.attach(child, Some(buffer(2, 10, 10)), 0, 0).unwrap();
        c.commit(child).unwrap();
        c.destroy_subsurface(child).unwrap();
        assert_eq!(released(&c.take_client_events()), [BufferId(2)]);

        let (parent, child) = sync_child(&mut c);
        c.attach(child, Some(buffer(5, 10, 10)), 0, 0).unwrap();
        c.commit(child).unwrap();
        c.destroy_surface(parent).unwrap();
        assert_eq!(
            c.take_client_events(),
            vec![ClientEvent::BufferRelease {
                surface: child,
                buffer: BufferId(5)
            }],
            "an orphan's cache can never be applied"
        );
        assert!(c.surface(child).unwrap().role().as_subsurface().unwrap().cached().is_none());
    }
}
