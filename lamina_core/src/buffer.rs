// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Client buffers.

use core::fmt;

use kurbo::Size;

/// Identifies a client buffer object.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u64);

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

/// Pixel format code of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Format(pub u32);

impl Format {
    /// 32-bit ARGB, 8 bits per channel.
    pub const ARGB8888: Self = Self(0);
    /// 32-bit RGB with an unused alpha byte.
    pub const XRGB8888: Self = Self(1);
}

/// A client buffer as seen by the core: identity, dimensions and layout.
///
/// The pixel storage stays with the client-proxy layer; backends locate it
/// through [`id`](Self::id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Buffer {
    /// Buffer identity.
    pub id: BufferId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row.
    pub stride: u32,
    /// Pixel format.
    pub format: Format,
}

impl Buffer {
    /// Creates a tightly packed 32-bit ARGB buffer description.
    #[must_use]
    pub const fn argb(id: BufferId, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            stride: width.saturating_mul(4),
            format: Format::ARGB8888,
        }
    }

    /// Size in pixels.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// Returns whether a texture made from `self` can be updated in place
    /// with the contents of `other`.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.stride == other.stride
            && self.format == other.format
    }
}
