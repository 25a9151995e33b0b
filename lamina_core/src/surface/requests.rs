// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pending-state requests and role assignment.
//!
//! Every request validates its arguments before touching the pending view,
//! so a rejected request leaves the surface exactly as it was.

use kurbo::{Rect, Size, Vec2};
use tracing::{debug, trace};

use crate::Compositor;
use crate::buffer::Buffer;
use crate::error::{CoreError, ProtocolViolation};
use crate::region::{Region, protocol_rect};
use crate::transform::BufferTransform;

use super::id::{CallbackId, SurfaceId};
use super::role::{Role, RoleKind, ShellRole};
use super::view::{PendingFields, View};

impl Compositor {
    fn pending_view(&mut self, id: SurfaceId) -> Result<&mut View, CoreError> {
        Ok(self.surface_mut(id)?.pending_mut())
    }

    /// Checks that `id` is live, then runs `check`; a failed check is
    /// reported as a protocol violation.
    fn validate(
        &mut self,
        id: SurfaceId,
        check: impl FnOnce() -> Result<(), ProtocolViolation>,
    ) -> Result<(), CoreError> {
        self.surface_ref(id)?;
        check().map_err(|violation| self.violation(id, violation))
    }

    /// Attaches `buffer` (or detaches with `None`), moving the surface origin
    /// by `(dx, dy)` on commit.
    pub fn attach(
        &mut self,
        id: SurfaceId,
        buffer: Option<Buffer>,
        dx: i32,
        dy: i32,
    ) -> Result<(), CoreError> {
        self.validate(id, || match buffer {
            Some(b) if b.width == 0 || b.height == 0 => Err(ProtocolViolation::EmptyBuffer),
            _ => Ok(()),
        })?;
        let pending = self.pending_view(id)?;
        pending.buffer = buffer;
        pending.offset = Vec2::new(f64::from(dx), f64::from(dy));
        pending.set |= PendingFields::BUFFER;
        trace!(surface = ?id, buffer = ?buffer.map(|b| b.id), dx, dy, "attach");
        Ok(())
    }

    /// Adds surface-local damage.
    pub fn damage(
        &mut self,
        id: SurfaceId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), CoreError> {
        self.validate(id, || check_size(width, height))?;
        self.pending_view(id)?
            .damage
            .add(protocol_rect(x, y, width, height));
        Ok(())
    }

    /// Adds damage in buffer pixels.
    pub fn damage_buffer(
        &mut self,
        id: SurfaceId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), CoreError> {
        self.validate(id, || check_size(width, height))?;
        self.pending_view(id)?
            .buffer_damage
            .add(protocol_rect(x, y, width, height));
        Ok(())
    }

    /// Requests a [`FrameDone`](crate::signal::ClientEvent::FrameDone) for
    /// the frame after the next commit.
    pub fn frame(&mut self, id: SurfaceId, callback: CallbackId) -> Result<(), CoreError> {
        self.pending_view(id)?.frame_callbacks.push(callback);
        Ok(())
    }

    /// Sets the opaque region; `None` means nothing is opaque.
    pub fn set_opaque_region(
        &mut self,
        id: SurfaceId,
        region: Option<Region>,
    ) -> Result<(), CoreError> {
        let pending = self.pending_view(id)?;
        pending.opaque = region.unwrap_or_default();
        pending.set |= PendingFields::OPAQUE;
        Ok(())
    }

    /// Sets the input region; `None` means the whole surface.
    pub fn set_input_region(
        &mut self,
        id: SurfaceId,
        region: Option<Region>,
    ) -> Result<(), CoreError> {
        let pending = self.pending_view(id)?;
        pending.input = region;
        pending.set |= PendingFields::INPUT;
        Ok(())
    }

    /// Sets the buffer transform from its protocol value `0..=7`.
    pub fn set_buffer_transform(&mut self, id: SurfaceId, transform: i32) -> Result<(), CoreError> {
        let mut parsed = BufferTransform::Normal;
        self.validate(id, || {
            parsed = BufferTransform::try_from(transform)?;
            Ok(())
        })?;
        let pending = self.pending_view(id)?;
        pending.transform = parsed;
        pending.set |= PendingFields::TRANSFORM;
        Ok(())
    }

    /// Sets the integer buffer scale.
    pub fn set_buffer_scale(&mut self, id: SurfaceId, scale: i32) -> Result<(), CoreError> {
        self.validate(id, || {
            if scale < 1 {
                Err(ProtocolViolation::InvalidScale(scale))
            } else {
                Ok(())
            }
        })?;
        let pending = self.pending_view(id)?;
        pending.scale = scale;
        pending.set |= PendingFields::SCALE;
        Ok(())
    }

    /// Sets the source rectangle in surface units. All four values `-1`
    /// unset it.
    pub fn set_crop(
        &mut self,
        id: SurfaceId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), CoreError> {
        let unset = [x, y, width, height].iter().all(|v| *v == -1.0);
        self.validate(id, || {
            if unset || (x >= 0.0 && y >= 0.0 && width > 0.0 && height > 0.0) {
                Ok(())
            } else {
                Err(ProtocolViolation::InvalidCrop)
            }
        })?;
        let pending = self.pending_view(id)?;
        pending.crop = (!unset).then(|| Rect::new(x, y, x + width, y + height));
        pending.set |= PendingFields::CROP;
        Ok(())
    }

    /// Sets the destination size in surface units. `(-1, -1)` unsets it.
    pub fn set_destination_size(
        &mut self,
        id: SurfaceId,
        width: i32,
        height: i32,
    ) -> Result<(), CoreError> {
        let unset = width == -1 && height == -1;
        self.validate(id, || {
            if unset || (width > 0 && height > 0) {
                Ok(())
            } else {
                Err(ProtocolViolation::InvalidDestination)
            }
        })?;
        let pending = self.pending_view(id)?;
        pending.destination = (!unset).then(|| Size::new(f64::from(width), f64::from(height)));
        pending.set |= PendingFields::DESTINATION;
        Ok(())
    }

    // -- Roles --

    /// Gives the surface an active role.
    ///
    /// A surface keeps the kind of its first role forever: it may only take
    /// the same kind again, and only once the previous role object is gone.
    pub fn assign_role(&mut self, id: SurfaceId, role: Role) -> Result<(), CoreError> {
        let surface = self.surface_mut(id)?;
        let Some(requested) = role.kind() else {
            return Ok(());
        };
        if let Some(existing) = surface.role_kind {
            if existing != requested || surface.role.kind().is_some() {
                return Err(CoreError::RoleConflict {
                    surface: id,
                    existing,
                    requested,
                });
            }
        }
        surface.role = role;
        surface.role_kind = Some(requested);
        debug!(surface = ?id, role = ?requested, "role assigned");
        Ok(())
    }

    /// Makes the surface a shell window.
    pub fn make_toplevel(&mut self, id: SurfaceId) -> Result<(), CoreError> {
        self.assign_role(id, Role::Toplevel(ShellRole::default()))
    }

    /// Makes the surface a shell popup.
    pub fn make_popup(&mut self, id: SurfaceId) -> Result<(), CoreError> {
        self.assign_role(id, Role::Popup(ShellRole::default()))
    }

    /// Ends the surface's active role. The surface stays bound to the role
    /// kind and may take it again.
    pub fn clear_role(&mut self, id: SurfaceId) -> Result<(), CoreError> {
        match self.surface_ref(id)?.role.kind() {
            Some(RoleKind::Subsurface) => return self.destroy_subsurface(id),
            Some(RoleKind::Toplevel | RoleKind::Popup) => {
                if self.surface_ref(id)?.role.is_mapped() {
                    self.unmap_internal(id);
                }
                self.close_popup_chains_at(id);
            }
            Some(RoleKind::Cursor) => self.forget_cursor(id),
            Some(RoleKind::DragIcon) | None => {}
        }
        self.surface_mut(id)?.role = Role::None;
        Ok(())
    }
}

fn check_size(width: i32, height: i32) -> Result<(), ProtocolViolation> {
    if width < 0 || height < 0 {
        Err(ProtocolViolation::NegativeSize { width, height })
    } else {
        Ok(())
    }
}
