// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface state, subsurface composition and seat input routing for a
//! display compositor.
//!
//! `lamina_core` is the protocol core that sits between a client-proxy layer
//! (which decodes requests from client connections) and the renderer and
//! desktop shell. It tracks what every client surface currently looks like,
//! how surfaces are composed with each other, and which surface receives
//! each input event.
//!
//! # Architecture
//!
//! Everything hangs off one explicit context object, [`Compositor`], which
//! owns the surface arena, the seats, the scene, the outputs and the texture
//! backend:
//!
//! ```text
//!   client requests ──► Compositor::{attach, damage, ..., commit}
//!                              │
//!                              ▼
//!              View ring rotate ─► TextureBackend::{import, update}
//!                              │
//!                              ▼
//!        geometry / output mask ─► Signal queue ─► shell, renderer
//!
//!   device events ──► Compositor::{pointer_motion, keyboard_key, ...}
//!                              │
//!                              ▼
//!              GrabStack head ─► Grab ─► ClientEvent queue ─► clients
//! ```
//!
//! **[`surface`]**: Generational surface handles, the three-slot
//! [`View`](surface::View) ring and the commit algorithm.
//!
//! **[`transform`]** / **[`region`]**: Buffer ↔ surface affine math and
//! conservative damage mapping on `kurbo` geometry.
//!
//! **[`subsurface`]**: Parent/child stacking with pending and committed
//! orderings, and synchronized-commit propagation.
//!
//! **[`scene`]**: Layered stacking of mapped top-level surfaces.
//!
//! **[`seat`]**: Per-device-class focus tracking, serials, picking, and the
//! device-event entry points.
//!
//! **[`grab`]**: Priority-ordered modal input interception and the stock
//! grabs (default, drag-and-drop, popup dismissal, input lock,
//! interactive move/resize).
//!
//! **[`dirty`]**: Dirty channels drained by
//! [`Compositor::drain_changes`].
//!
//! **[`signal`]**: Outbound notifications for collaborators and events for
//! clients.

pub mod backend;
pub mod buffer;
pub mod compositor;
pub mod config;
pub mod dirty;
pub mod error;
pub mod grab;
pub mod output;
pub mod region;
pub mod scene;
pub mod seat;
pub mod signal;
pub mod subsurface;
pub mod surface;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_support;

pub use compositor::{Compositor, SceneChanges};
pub use config::Config;
pub use error::{CoreError, ProtocolViolation};
