// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use thiserror::Error;

use crate::seat::SeatId;
use crate::surface::{RoleKind, SurfaceId};

/// A malformed client request.
///
/// Violations are detected before any state is touched and are terminal for
/// the offending client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// Buffer transform outside `0..=7`.
    #[error("invalid buffer transform {0}")]
    InvalidTransform(i32),
    /// Buffer scale below 1.
    #[error("invalid buffer scale {0}")]
    InvalidScale(i32),
    /// Damage or region rectangle with negative dimensions.
    #[error("negative rectangle size {width}x{height}")]
    NegativeSize {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },
    /// Buffer with a zero dimension.
    #[error("buffer has zero size")]
    EmptyBuffer,
    /// Crop rectangle with negative origin or non-positive size.
    #[error("invalid crop rectangle")]
    InvalidCrop,
    /// Destination size that is not strictly positive.
    #[error("invalid destination size")]
    InvalidDestination,
    /// Crop rectangle extending past the buffer.
    #[error("crop rectangle extends beyond the buffer")]
    OutOfBuffer,
    /// Stacking reference that is neither a sibling nor the parent.
    #[error("{0:?} is neither a sibling nor the parent")]
    BadSibling(SurfaceId),
    /// Subsurface parent that is the surface itself or one of its
    /// descendants.
    #[error("invalid subsurface parent")]
    BadParent,
}

/// Errors returned by [`Compositor`](crate::Compositor) requests.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The request was malformed.
    #[error("protocol violation on {surface:?}: {violation}")]
    Protocol {
        /// Surface the request targeted.
        surface: SurfaceId,
        /// What was wrong with it.
        violation: ProtocolViolation,
    },
    /// The surface already has, or once had, a different role.
    #[error("{surface:?} has role {existing:?}, cannot become {requested:?}")]
    RoleConflict {
        /// Surface the role was requested for.
        surface: SurfaceId,
        /// Its existing role.
        existing: RoleKind,
        /// The requested role.
        requested: RoleKind,
    },
    /// The surface does not have the role the request needs.
    #[error("{surface:?} does not have the {expected:?} role")]
    WrongRole {
        /// Surface the request targeted.
        surface: SurfaceId,
        /// Role the request needs.
        expected: RoleKind,
    },
    /// The surface handle is stale.
    #[error("{0:?} does not exist")]
    NoSuchSurface(SurfaceId),
    /// The seat handle is stale.
    #[error("{0:?} does not exist")]
    NoSuchSeat(SeatId),
}

/// Errors from [`Config::from_toml_str`](crate::Config::from_toml_str).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The text was not valid TOML for a [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
