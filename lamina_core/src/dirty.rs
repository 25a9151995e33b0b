// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Lamina uses multi-channel dirty tracking (via [`understory_dirty`]) to
//! tell the renderer which surfaces changed since the last frame. Each
//! channel represents an independent category of change.
//!
//! # Propagation semantics
//!
//! - **Propagating**: [`GEOMETRY`] has dependency edges from each
//!   subsurface to its parent. When a parent's origin moves, it is marked
//!   with [`EagerPolicy`](understory_dirty::EagerPolicy) so that every
//!   descendant, whose position is derived from the parent, drains as well.
//!   A size-only change is marked locally.
//!
//! - **Local-only**: [`CONTENT`] is marked when a commit carried a new buffer
//!   or damage. Only that surface appears in the drain output.
//!
//! - **Structural**: [`STACKING`] is marked when the scene or a committed
//!   subsurface order changes. It asks the renderer to rebuild its
//!   [`render_order`](crate::Compositor::render_order).
//!
//! # Consumption
//!
//! Each [`Compositor::drain_changes`](crate::Compositor::drain_changes) call
//! drains all channels and surfaces the results as
//! [`SceneChanges`](crate::SceneChanges).

use understory_dirty::Channel;

/// Surface geometry (position or size) changed.
pub const GEOMETRY: Channel = Channel::new(0);

/// Surface content (buffer or damage) changed.
pub const CONTENT: Channel = Channel::new(1);

/// Stacking order changed.
pub const STACKING: Channel = Channel::new(2);
