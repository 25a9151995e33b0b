// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One snapshot of a surface's visible state.

use bitflags::bitflags;
use kurbo::{Rect, Size, Vec2};

use crate::buffer::Buffer;
use crate::region::Region;
use crate::transform::{BufferTransform, ViewMatrices, ViewParams};

use super::id::CallbackId;

bitflags! {
    /// Fields a client explicitly set since its last commit.
    ///
    /// Unset fields are inherited from the current view at commit time.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PendingFields: u8 {
        /// `attach`.
        const BUFFER = 1 << 0;
        /// `set_buffer_transform`.
        const TRANSFORM = 1 << 1;
        /// `set_buffer_scale`.
        const SCALE = 1 << 2;
        /// `set_crop`.
        const CROP = 1 << 3;
        /// `set_destination_size`.
        const DESTINATION = 1 << 4;
        /// `set_opaque_region`.
        const OPAQUE = 1 << 5;
        /// `set_input_region`.
        const INPUT = 1 << 6;
    }
}

/// Buffer, view parameters, damage and regions of a surface at one point in
/// its commit history.
///
/// Each surface holds three views (pending, current and previous). Requests
/// write the pending view; [`commit`](crate::Compositor::commit) turns it
/// into the current one.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    /// Attached buffer, `None` when nothing (or a null buffer) is attached.
    pub buffer: Option<Buffer>,
    /// Attach offset of this commit, in surface units.
    pub offset: Vec2,
    /// Buffer orientation.
    pub transform: BufferTransform,
    /// Buffer scale.
    pub scale: i32,
    /// Source rectangle in surface units.
    pub crop: Option<Rect>,
    /// Destination size in surface units.
    pub destination: Option<Size>,
    /// Damage in surface-local coordinates.
    pub damage: Region,
    /// Damage in buffer pixels.
    pub buffer_damage: Region,
    /// Region the client promises is fully opaque.
    pub opaque: Region,
    /// Region accepting input; `None` means the whole surface.
    pub input: Option<Region>,
    /// Frame callbacks waiting for the next frame.
    pub frame_callbacks: Vec<CallbackId>,
    /// Matrices derived at commit; `None` without a buffer.
    pub matrices: Option<ViewMatrices>,
    /// Which fields were set by the client.
    pub set: PendingFields,
}

impl Default for View {
    fn default() -> Self {
        Self {
            buffer: None,
            offset: Vec2::ZERO,
            transform: BufferTransform::Normal,
            scale: 1,
            crop: None,
            destination: None,
            damage: Region::new(),
            buffer_damage: Region::new(),
            opaque: Region::new(),
            input: None,
            frame_callbacks: Vec::new(),
            matrices: None,
            set: PendingFields::empty(),
        }
    }
}

impl View {
    /// The transform inputs of this view, or `None` without a buffer.
    #[must_use]
    pub fn params(&self) -> Option<ViewParams> {
        self.buffer.map(|buffer| ViewParams {
            buffer_size: buffer.size(),
            transform: self.transform,
            scale: self.scale,
            crop: self.crop,
            destination: self.destination,
        })
    }

    /// Copies every field this view did not set from `current`.
    pub(crate) fn inherit(&mut self, current: &Self) {
        if !self.set.contains(PendingFields::BUFFER) {
            self.buffer = current.buffer;
        }
        if !self.set.contains(PendingFields::TRANSFORM) {
            self.transform = current.transform;
        }
        if !self.set.contains(PendingFields::SCALE) {
            self.scale = current.scale;
        }
        if !self.set.contains(PendingFields::CROP) {
            self.crop = current.crop;
        }
        if !self.set.contains(PendingFields::DESTINATION) {
            self.destination = current.destination;
        }
        if !self.set.contains(PendingFields::OPAQUE) {
            self.opaque.clone_from(&current.opaque);
        }
        if !self.set.contains(PendingFields::INPUT) {
            self.input.clone_from(&current.input);
        }
    }

    /// Folds a newer pending view on top of this one: fields set in `newer`
    /// win, damage and frame callbacks accumulate.
    pub(crate) fn absorb(&mut self, newer: Self) {
        let set = newer.set;
        if set.contains(PendingFields::BUFFER) {
            self.buffer = newer.buffer;
        }
        if set.contains(PendingFields::TRANSFORM) {
            self.transform = newer.transform;
        }
        if set.contains(PendingFields::SCALE) {
            self.scale = newer.scale;
        }
        if set.contains(PendingFields::CROP) {
            self.crop = newer.crop;
        }
        if set.contains(PendingFields::DESTINATION) {
            self.destination = newer.destination;
        }
        if set.contains(PendingFields::OPAQUE) {
            self.opaque = newer.opaque;
        }
        if set.contains(PendingFields::INPUT) {
            self.input = newer.input;
        }
        self.set |= set;
        self.offset += newer.offset;
        self.damage.union(&newer.damage);
        self.buffer_damage.union(&newer.buffer_damage);
        self.frame_callbacks.extend(newer.frame_callbacks);
    }

    /// Clears the per-commit accumulators so the view can collect the next
    /// pending state.
    pub(crate) fn reset_pending(&mut self) {
        self.offset = Vec2::ZERO;
        self.damage.clear();
        self.buffer_damage.clear();
        self.frame_callbacks.clear();
        self.matrices = None;
        self.set = PendingFields::empty();
    }
}

/// Resolves view parameters through a stack of views, newest first. Each
/// field comes from the first view that set it, else from the last (oldest)
/// view.
pub(crate) fn resolve_params(stack: &[&View]) -> Option<ViewParams> {
    let buffer = pick(stack, PendingFields::BUFFER)?.buffer?;
    Some(ViewParams {
        buffer_size: buffer.size(),
        transform: pick(stack, PendingFields::TRANSFORM)?.transform,
        scale: pick(stack, PendingFields::SCALE)?.scale,
        crop: pick(stack, PendingFields::CROP)?.crop,
        destination: pick(stack, PendingFields::DESTINATION)?.destination,
    })
}

fn pick<'a>(stack: &[&'a View], field: PendingFields) -> Option<&'a View> {
    stack
        .iter()
        .copied()
        .find(|v| v.set.contains(field))
        .or_else(|| stack.last().copied())
}

/// Indices of the pending, current and previous view slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SlotRing {
    pub(crate) pending: usize,
    pub(crate) current: usize,
    pub(crate) previous: usize,
}

impl Default for SlotRing {
    fn default() -> Self {
        Self {
            pending: 0,
            current: 1,
            previous: 2,
        }
    }
}

impl SlotRing {
    /// Pending becomes current, current becomes previous and the old
    /// previous slot is recycled as pending.
    pub(crate) fn rotate(&mut self) {
        *self = Self {
            pending: self.previous,
            current: self.pending,
            previous: self.current,
        };
    }
}
