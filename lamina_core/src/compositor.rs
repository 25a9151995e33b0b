// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositor context.
//!
//! [`Compositor`] owns every piece of core state: the surface arena, seats,
//! scene, outputs, texture backend, dirty tracker and the outbound queues.
//! Requests from clients, device events and shell operations are all methods
//! on it; they run to completion synchronously and report what happened
//! through [`Signal`]s, [`ClientEvent`]s and [`SceneChanges`].
//!
//! Evaluation for the renderer follows the same drain pattern as the dirty
//! channels in [`dirty`]: [`Compositor::drain_changes`] returns everything
//! that changed since the previous call.

use core::fmt;
use core::mem;

use kurbo::{Rect, Size};
use tracing::{debug, trace, warn};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::backend::{NullBackend, TextureBackend};
use crate::config::Config;
use crate::dirty;
use crate::error::{CoreError, ProtocolViolation};
use crate::output::{OutputId, OutputLayout};
use crate::scene::Scene;
use crate::seat::Seat;
use crate::signal::{ClientEvent, Signal};
use crate::surface::{ClientId, Role, Surface, SurfaceId, SurfaceStore};

/// What changed since the previous [`Compositor::drain_changes`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneChanges {
    /// Surfaces whose geometry changed, including subsurfaces moved along
    /// with their parent.
    pub geometry: Vec<SurfaceId>,
    /// Surfaces whose buffer or damage changed.
    pub content: Vec<SurfaceId>,
    /// Surfaces created since the last drain.
    pub created: Vec<SurfaceId>,
    /// Surfaces destroyed since the last drain. These handles are stale.
    pub destroyed: Vec<SurfaceId>,
    /// Whether [`Compositor::render_order`] changed.
    pub stacking_changed: bool,
}

/// The protocol core of a display compositor.
pub struct Compositor {
    pub(crate) config: Config,
    pub(crate) surfaces: SurfaceStore,
    pub(crate) seats: Vec<Seat>,
    pub(crate) scene: Scene,
    pub(crate) outputs: OutputLayout,
    pub(crate) backend: Box<dyn TextureBackend>,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
    pub(crate) pending_created: Vec<SurfaceId>,
    pub(crate) pending_destroyed: Vec<SurfaceId>,

    // -- Outbound queues --
    pub(crate) signals: Vec<Signal>,
    pub(crate) events: Vec<ClientEvent>,

    pub(crate) next_grab: u64,
}

impl fmt::Debug for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("config", &self.config)
            .field("surfaces", &self.surfaces.len())
            .field("seats", &self.seats.len())
            .field("scene", &self.scene)
            .field("outputs", &self.outputs)
            .field("signals", &self.signals.len())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(Config::default(), Box::new(NullBackend::default()))
    }
}

impl Compositor {
    /// Creates an empty compositor realizing buffers through `backend`.
    #[must_use]
    pub fn new(config: Config, backend: Box<dyn TextureBackend>) -> Self {
        Self {
            config,
            surfaces: SurfaceStore::default(),
            seats: Vec::new(),
            scene: Scene::default(),
            outputs: OutputLayout::default(),
            backend,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            pending_created: Vec::new(),
            pending_destroyed: Vec::new(),
            signals: Vec::new(),
            events: Vec::new(),
            next_grab: 0,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the configuration. Grabs already pushed keep their priority.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    // -- Surfaces --

    /// Creates a role-less surface owned by `client`.
    pub fn create_surface(&mut self, client: ClientId) -> SurfaceId {
        let id = self.surfaces.create(client);
        self.pending_created.push(id);
        self.signals.push(Signal::SurfaceCreated(id));
        debug!(surface = ?id, ?client, "surface created");
        id
    }

    /// Looks up a live surface.
    #[must_use]
    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    /// All live surfaces.
    #[must_use]
    pub fn surfaces(&self) -> &SurfaceStore {
        &self.surfaces
    }

    pub(crate) fn surface_ref(&self, id: SurfaceId) -> Result<&Surface, CoreError> {
        self.surfaces.get(id).ok_or(CoreError::NoSuchSurface(id))
    }

    pub(crate) fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut Surface, CoreError> {
        self.surfaces.get_mut(id).ok_or(CoreError::NoSuchSurface(id))
    }

    /// Destroys a surface.
    ///
    /// The surface leaves the arena first, so its handle is already stale
    /// while weak references are cleared: subsurface links, the scene, seat
    /// focus (without events to the dead surface), grabs bound to it and
    /// popup chains. Its texture is then released and
    /// [`Signal::SurfaceDestroyed`] emitted.
    pub fn destroy_surface(&mut self, id: SurfaceId) -> Result<(), CoreError> {
        let Some(surface) = self.surfaces.remove(id) else {
            return Err(CoreError::NoSuchSurface(id));
        };
        self.unlink_subsurfaces(id, &surface);
        self.dirty.remove_key(id.idx);
        if self.scene.remove(id) {
            self.dirty.mark(id.idx, dirty::STACKING);
        }
        self.forget_surface_in_seats(id);

        if let Some(texture) = surface.texture {
            self.backend.release(texture.handle);
        }
        self.pending_destroyed.push(id);
        if surface.role.is_mapped() {
            self.signals.push(Signal::SurfaceUnmapped(id));
        }
        self.signals.push(Signal::SurfaceDestroyed(id));
        debug!(surface = ?id, "surface destroyed");

        // Pointer focus may now belong to whatever was underneath.
        self.refocus_pointers();
        Ok(())
    }

    /// Destroys every surface owned by `client`.
    pub fn disconnect_client(&mut self, client: ClientId) {
        let owned: Vec<SurfaceId> = self
            .surfaces
            .iter()
            .filter(|s| s.client == client)
            .map(|s| s.id)
            .collect();
        debug!(?client, surfaces = owned.len(), "client disconnected");
        for id in owned {
            // Ids stay valid: destroying one surface never destroys another.
            let _ = self.destroy_surface(id);
        }
    }

    /// Records a protocol violation against the client owning `surface` and
    /// returns the matching error.
    pub(crate) fn violation(&mut self, surface: SurfaceId, violation: ProtocolViolation) -> CoreError {
        if let Some(s) = self.surfaces.get(surface) {
            self.events.push(ClientEvent::ProtocolError {
                client: s.client,
                surface,
                violation,
            });
        }
        warn!(surface = ?surface, %violation, "protocol violation");
        CoreError::Protocol { surface, violation }
    }

    /// Queues an event for a client. Events addressed to a destroyed
    /// surface are dropped.
    pub(crate) fn send(&mut self, event: ClientEvent) {
        if !self.surfaces.is_alive(event.surface()) {
            trace!(?event, "dropping event for destroyed surface");
            return;
        }
        self.events.push(event);
    }

    // -- Geometry --

    /// Recomputes the geometry of `id` from its current matrices and
    /// placement, then repositions its committed subsurfaces.
    pub(crate) fn update_geometry(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.get_mut(id) else {
            return;
        };
        let origin = surface.origin();
        let current = surface.current_mut();
        let geometry = match current.matrices.as_mut() {
            Some(m) => {
                if m.origin != origin {
                    *m = m.with_origin(origin);
                }
                m.geometry()
            }
            None => Rect::from_origin_size(origin, Size::ZERO),
        };
        let old = surface.geometry;
        let children: Vec<SurfaceId> = surface.children().collect();

        if geometry != old {
            surface.geometry = geometry;
            if geometry.origin() == old.origin() {
                self.dirty.mark(id.idx, dirty::GEOMETRY);
            } else {
                self.dirty.mark_with(id.idx, dirty::GEOMETRY, &EagerPolicy);
            }
            self.signals.push(Signal::SurfaceGeometryDirty(id));
            self.refresh_outputs(id);
        }

        for child in children {
            let Some(surface) = self.surfaces.get_mut(child) else {
                continue;
            };
            let Some(sub) = surface.role.as_subsurface() else {
                continue;
            };
            if sub.parent != Some(id) {
                continue;
            }
            surface.base = origin + sub.position;
            self.update_geometry(child);
        }
    }

    pub(crate) fn refresh_outputs(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.get_mut(id) else {
            return;
        };
        let mask = self.outputs.mask_for(surface.geometry);
        if mask != surface.outputs {
            surface.outputs = mask;
            self.signals.push(Signal::SurfaceOutputsChanged {
                surface: id,
                outputs: mask,
            });
        }
    }

    // -- Outputs --

    /// Adds an output, or moves it if already known.
    ///
    /// Returns `false` when the output table is full.
    pub fn add_output(&mut self, output: OutputId, rect: Rect) -> bool {
        if !self.outputs.insert(output, rect) {
            warn!(?output, "too many outputs");
            return false;
        }
        debug!(?output, ?rect, "output added");
        self.refresh_all_outputs();
        true
    }

    /// Removes an output.
    pub fn remove_output(&mut self, output: OutputId) -> bool {
        if !self.outputs.remove(output) {
            return false;
        }
        debug!(?output, "output removed");
        self.refresh_all_outputs();
        true
    }

    /// The rectangle of a known output.
    #[must_use]
    pub fn output_rect(&self, output: OutputId) -> Option<Rect> {
        self.outputs.rect(output)
    }

    fn refresh_all_outputs(&mut self) {
        let ids: Vec<SurfaceId> = self.surfaces.iter().map(|s| s.id).collect();
        for id in ids {
            self.refresh_outputs(id);
        }
    }

    // -- Outbound --

    /// Drains queued collaborator notifications.
    pub fn take_signals(&mut self) -> Vec<Signal> {
        mem::take(&mut self.signals)
    }

    /// Drains queued client events.
    pub fn take_client_events(&mut self) -> Vec<ClientEvent> {
        mem::take(&mut self.events)
    }

    /// Fires every pending frame callback of every mapped surface tree.
    pub fn send_frame_callbacks(&mut self, time: u32) {
        for id in self.render_order() {
            let Some(surface) = self.surfaces.get_mut(id) else {
                continue;
            };
            for callback in mem::take(&mut surface.current_mut().frame_callbacks) {
                self.events.push(ClientEvent::FrameDone {
                    surface: id,
                    callback,
                    time,
                });
            }
        }
    }

    /// Drains all dirty channels.
    pub fn drain_changes(&mut self) -> SceneChanges {
        let geometry: Vec<u32> = self
            .dirty
            .drain(dirty::GEOMETRY)
            .affected()
            .deterministic()
            .run()
            .collect();
        let content: Vec<u32> = self
            .dirty
            .drain(dirty::CONTENT)
            .deterministic()
            .run()
            .collect();
        let stacking: Vec<u32> = self
            .dirty
            .drain(dirty::STACKING)
            .deterministic()
            .run()
            .collect();

        let resolve = |store: &SurfaceStore, idx: Vec<u32>| -> Vec<SurfaceId> {
            let mut ids: Vec<SurfaceId> = idx.into_iter().filter_map(|i| store.id_at(i)).collect();
            ids.sort();
            ids.dedup();
            ids
        };
        SceneChanges {
            geometry: resolve(&self.surfaces, geometry),
            content: resolve(&self.surfaces, content),
            created: mem::take(&mut self.pending_created),
            destroyed: mem::take(&mut self.pending_destroyed),
            stacking_changed: !stacking.is_empty(),
        }
    }

    /// Mapped surfaces bottom to top, each expanded with its subsurfaces in
    /// committed stacking order.
    #[must_use]
    pub fn render_order(&self) -> Vec<SurfaceId> {
        let mut out = Vec::new();
        for id in self.scene.bottom_to_top() {
            self.expand_tree(id, &mut out);
        }
        out
    }

    fn expand_tree(&self, id: SurfaceId, out: &mut Vec<SurfaceId>) {
        let Some(surface) = self.surfaces.get(id) else {
            return;
        };
        for &entry in &surface.committed_order {
            if entry == id {
                out.push(id);
            } else if self.surfaces.get(entry).is_some_and(|c| {
                matches!(&c.role, Role::Subsurface(sub) if sub.parent == Some(id))
            }) {
                self.expand_tree(entry, out);
            }
        }
    }
}
