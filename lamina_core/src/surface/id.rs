// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface and client identity types.

use core::fmt;

/// A handle to a surface in the [`Compositor`](crate::Compositor).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a surface is destroyed and the slot is reused. Every
/// cross-reference between core objects (focus, parents, grabs) is one of
/// these, so a destroyed surface is never reachable through an old handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId {
    /// Slot index into the store.
    pub(crate) idx: u32,
    /// Generation counter; must match the store's generation for this slot.
    pub(crate) generation: u32,
}

impl SurfaceId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceId({}@gen{})", self.idx, self.generation)
    }
}

/// Identifies the client connection that owns a surface.
///
/// Assigned by the client-proxy layer; the core only compares them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub u32);

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

/// A frame callback registered with [`Compositor::frame`](crate::Compositor::frame).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u32);
