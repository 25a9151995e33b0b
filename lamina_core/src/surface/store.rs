// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface storage with generational handles.

use kurbo::{Point, Rect, Vec2};

use crate::backend::TextureHandle;
use crate::buffer::Buffer;
use crate::output::OutputMask;

use super::id::{ClientId, SurfaceId};
use super::role::{Role, RoleKind};
use super::view::{SlotRing, View};

/// A texture realized from a buffer, with the buffer layout it was made
/// from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Texture {
    pub(crate) handle: TextureHandle,
    pub(crate) buffer: Buffer,
}

/// A client surface.
#[derive(Debug)]
pub struct Surface {
    pub(crate) id: SurfaceId,
    pub(crate) client: ClientId,

    // -- View ring --
    pub(crate) views: [View; 3],
    pub(crate) slots: SlotRing,

    // -- Role --
    pub(crate) role: Role,
    /// First role ever assigned; survives role destruction.
    pub(crate) role_kind: Option<RoleKind>,

    // -- Subsurface stacking (including the surface itself) --
    pub(crate) pending_order: Vec<SurfaceId>,
    pub(crate) committed_order: Vec<SurfaceId>,

    // -- Placement --
    /// Position assigned by the scene, the parent or the pointer.
    pub(crate) base: Point,
    /// Sum of all committed attach offsets.
    pub(crate) attach_offset: Vec2,
    pub(crate) geometry: Rect,
    pub(crate) outputs: OutputMask,

    pub(crate) texture: Option<Texture>,
    pub(crate) commits: u64,
}

impl Surface {
    fn new(id: SurfaceId, client: ClientId) -> Self {
        Self {
            id,
            client,
            views: <[View; 3]>::default(),
            slots: SlotRing::default(),
            role: Role::None,
            role_kind: None,
            pending_order: vec![id],
            committed_order: vec![id],
            base: Point::ORIGIN,
            attach_offset: Vec2::ZERO,
            geometry: Rect::ZERO,
            outputs: OutputMask::EMPTY,
            texture: None,
            commits: 0,
        }
    }

    /// The surface handle.
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// The owning client.
    #[must_use]
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// State being accumulated for the next commit.
    #[must_use]
    pub fn pending(&self) -> &View {
        &self.views[self.slots.pending]
    }

    /// The committed, visible state.
    #[must_use]
    pub fn current(&self) -> &View {
        &self.views[self.slots.current]
    }

    /// The state the last commit replaced.
    #[must_use]
    pub fn previous(&self) -> &View {
        &self.views[self.slots.previous]
    }

    pub(crate) fn pending_mut(&mut self) -> &mut View {
        &mut self.views[self.slots.pending]
    }

    pub(crate) fn current_mut(&mut self) -> &mut View {
        &mut self.views[self.slots.current]
    }

    /// The active role.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// The role kind this surface is bound to, even if its role object was
    /// destroyed.
    #[must_use]
    pub fn role_kind(&self) -> Option<RoleKind> {
        self.role_kind
    }

    /// Bounding box in global space.
    #[must_use]
    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    /// Global position of the surface-local origin.
    #[must_use]
    pub fn origin(&self) -> Point {
        self.base + self.attach_offset
    }

    /// Outputs this surface overlaps.
    #[must_use]
    pub fn outputs(&self) -> OutputMask {
        self.outputs
    }

    /// The texture realized from the current buffer.
    #[must_use]
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture.map(|t| t.handle)
    }

    /// Number of commits applied to the current view.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Committed stacking of this surface and its subsurfaces, bottom to top.
    #[must_use]
    pub fn stacking(&self) -> &[SurfaceId] {
        &self.committed_order
    }

    /// Pending stacking, applied on the next commit.
    #[must_use]
    pub fn pending_stacking(&self) -> &[SurfaceId] {
        &self.pending_order
    }

    /// Subsurfaces in committed stacking order, bottom to top.
    pub fn children(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.committed_order
            .iter()
            .copied()
            .filter(move |c| *c != self.id)
    }

    /// Converts a global point to surface-local coordinates.
    #[must_use]
    pub fn to_local(&self, point: Point) -> Point {
        point - self.origin().to_vec2()
    }
}

/// Slot storage for all surfaces.
///
/// Destroyed surfaces are recycled via a free list, and generation counters
/// prevent stale handle access.
#[derive(Debug, Default)]
pub struct SurfaceStore {
    slots: Vec<Option<Surface>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
    live: usize,
}

impl SurfaceStore {
    /// Creates a surface owned by `client`.
    pub(crate) fn create(&mut self, client: ClientId) -> SurfaceId {
        let idx = if let Some(idx) = self.free_list.pop() {
            self.generation[idx as usize] += 1;
            idx
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(None);
            self.generation.push(0);
            idx
        };
        let id = SurfaceId {
            idx,
            generation: self.generation[idx as usize],
        };
        self.slots[idx as usize] = Some(Surface::new(id, client));
        self.live += 1;
        id
    }

    /// Removes a surface, returning it if the handle was live.
    pub(crate) fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        if !self.is_alive(id) {
            return None;
        }
        let surface = self.slots[id.idx as usize].take();
        self.free_list.push(id.idx);
        self.live -= 1;
        surface
    }

    /// Returns whether the handle refers to a live surface.
    #[must_use]
    pub fn is_alive(&self, id: SurfaceId) -> bool {
        let idx = id.idx as usize;
        idx < self.slots.len() && self.generation[idx] == id.generation && self.slots[idx].is_some()
    }

    /// Looks up a live surface.
    #[must_use]
    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        if self.is_alive(id) {
            self.slots[id.idx as usize].as_ref()
        } else {
            None
        }
    }

    pub(crate) fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        if self.is_alive(id) {
            self.slots[id.idx as usize].as_mut()
        } else {
            None
        }
    }

    /// The live handle occupying slot `idx`, if any.
    pub(crate) fn id_at(&self, idx: u32) -> Option<SurfaceId> {
        self.slots.get(idx as usize)?.as_ref().map(|s| s.id)
    }

    /// Iterates over live surfaces in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Surface> {
        self.slots.iter().flatten()
    }

    /// Number of live surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns whether no surface is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
