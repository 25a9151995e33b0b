// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surfaces and their triple-buffered view state.
//!
//! Every surface holds three [`View`]s addressed through a ring of slot
//! indices:
//!
//! - **pending**: written by client requests ([`attach`], [`damage`],
//!   [`set_buffer_scale`], ...). Nothing else reads it.
//! - **current**: the state the renderer, picking and the shell see.
//! - **previous**: the state the last commit replaced, kept until the next
//!   rotation so its buffer can be released.
//!
//! [`commit`] is the only state transition. It resolves unset pending fields
//! from current, rotates the ring, realizes the buffer through the
//! [`TextureBackend`](crate::backend::TextureBackend), rebuilds the
//! [`ViewMatrices`](crate::transform::ViewMatrices) and geometry, converts
//! damage between surface and buffer space, and runs the role's commit hook.
//!
//! [`attach`]: crate::Compositor::attach
//! [`damage`]: crate::Compositor::damage
//! [`set_buffer_scale`]: crate::Compositor::set_buffer_scale
//! [`commit`]: crate::Compositor::commit

mod commit;
mod id;
mod requests;
mod role;
mod store;
mod view;

pub use id::{CallbackId, ClientId, SurfaceId};
pub use role::{CursorRole, Role, RoleKind, ShellRole, SubsurfaceRole};
pub use store::{Surface, SurfaceStore};
pub use view::{PendingFields, View};
