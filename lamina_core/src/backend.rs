// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for texture realization.
//!
//! The core never touches pixels. When a commit carries a new buffer, the
//! surface asks its [`TextureBackend`] to realize the buffer as a renderer
//! texture:
//!
//! - **Update**: if the surface already owns a texture made from a buffer
//!   with the same size, stride and format, the backend is first asked to
//!   [`update`](TextureBackend::update) that texture in place, restricted to
//!   the commit's buffer-space damage.
//!
//! - **Import**: otherwise, or if the update fails, a full
//!   [`import`](TextureBackend::import) allocates a fresh texture. Whatever
//!   incremental state the failed update left behind is discarded; the new
//!   texture is authoritative.
//!
//! - **Release**: every handle returned by `import` is passed to
//!   [`release`](TextureBackend::release) exactly once, when it is
//!   superseded, when the surface attaches a null buffer, or when the surface
//!   is destroyed.
//!
//! A failed import is not fatal: the surface keeps its previous texture and
//! the commit completes without a visual update.
//!
//! # Frame loop pseudocode
//!
//! ```rust,ignore
//! fn on_frame(time: u32) {
//!     // Renderer: pull what changed since the last frame.
//!     let changes = compositor.drain_changes();
//!     for surface in compositor.render_order() {
//!         renderer.draw(compositor.surface(surface).unwrap());
//!     }
//!     compositor.send_frame_callbacks(time);
//!     proxy.flush(compositor.take_client_events());
//! }
//! ```

use core::fmt;

use thiserror::Error;

use crate::buffer::{Buffer, Format};
use crate::region::Region;

/// A renderer texture realized from a client buffer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(pub u64);

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureHandle({})", self.0)
    }
}

/// Why a backend could not realize a buffer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ImportError {
    /// The backend cannot sample this pixel format.
    #[error("unsupported buffer format {0:?}")]
    UnsupportedFormat(Format),
    /// The backend ran out of texture memory.
    #[error("out of texture memory")]
    OutOfMemory,
    /// Any other backend failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Realizes client buffers as renderer textures.
pub trait TextureBackend {
    /// Allocates a texture holding the full contents of `buffer`.
    ///
    /// `damage_hint` is the buffer-space damage of the commit, which a
    /// backend may use to skip work when it keeps shadow copies.
    fn import(&mut self, buffer: &Buffer, damage_hint: &Region)
    -> Result<TextureHandle, ImportError>;

    /// Uploads the `damage` rectangles of `buffer` into an existing texture.
    ///
    /// Returns `false` if the update could not be completed; the caller then
    /// falls back to [`import`](Self::import).
    fn update(&mut self, handle: TextureHandle, buffer: &Buffer, damage: &Region) -> bool;

    /// Frees a texture. Called exactly once per handle.
    fn release(&mut self, handle: TextureHandle);
}

/// A backend that realizes nothing, for headless use.
///
/// Imports always succeed with fresh handles and updates always succeed.
#[derive(Debug, Default)]
pub struct NullBackend {
    next: u64,
}

impl TextureBackend for NullBackend {
    fn import(&mut self, _: &Buffer, _: &Region) -> Result<TextureHandle, ImportError> {
        self.next += 1;
        Ok(TextureHandle(self.next))
    }

    fn update(&mut self, _: TextureHandle, _: &Buffer, _: &Region) -> bool {
        true
    }

    fn release(&mut self, _: TextureHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferId;

    #[test]
    fn null_backend_hands_out_distinct_handles() {
        let mut backend = NullBackend::default();
        let buffer = Buffer::argb(BufferId(1), 4, 4);
        let a = backend.import(&buffer, &Region::new()).unwrap();
        let b = backend.import(&buffer, &Region::new()).unwrap();
        assert_ne!(a, b, "handles must be unique");
        assert!(backend.update(a, &buffer, &Region::new()));
    }
}
