// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface roles.
//!
//! A role gives a surface its meaning (window, popup, subsurface, cursor
//! image, drag icon) and role-specific commit behavior. The role set is
//! closed, so roles are a tagged union dispatched with `match`.

use kurbo::Vec2;

use super::id::SurfaceId;
use super::view::View;

/// The kind of a role, without its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoleKind {
    /// Shell window.
    Toplevel,
    /// Shell popup.
    Popup,
    /// Child of another surface.
    Subsurface,
    /// Image following the pointer during drag-and-drop.
    DragIcon,
    /// Pointer image.
    Cursor,
}

/// Mapping state shared by toplevels and popups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShellRole {
    pub(crate) mapped: bool,
}

impl ShellRole {
    /// Whether the surface has content and is shown by the shell.
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        self.mapped
    }
}

/// Subsurface link to its parent.
#[derive(Clone, Debug, PartialEq)]
pub struct SubsurfaceRole {
    pub(crate) parent: Option<SurfaceId>,
    pub(crate) sync: bool,
    pub(crate) position: Vec2,
    pub(crate) pending_position: Option<Vec2>,
    pub(crate) cached: Option<View>,
}

impl SubsurfaceRole {
    pub(crate) fn new(parent: SurfaceId) -> Self {
        Self {
            parent: Some(parent),
            sync: true,
            position: Vec2::ZERO,
            pending_position: None,
            cached: None,
        }
    }

    /// The parent surface, or `None` once the parent was destroyed.
    #[must_use]
    pub const fn parent(&self) -> Option<SurfaceId> {
        self.parent
    }

    /// Whether the subsurface itself is in synchronized mode.
    #[must_use]
    pub const fn is_sync(&self) -> bool {
        self.sync
    }

    /// Offset from the parent's origin, as of the parent's last commit.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// State committed by the client but held back until the parent commits.
    #[must_use]
    pub fn cached(&self) -> Option<&View> {
        self.cached.as_ref()
    }
}

/// Pointer image placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorRole {
    /// Offset of the pointer's hot spot from the surface origin.
    pub hotspot: Vec2,
}

/// A surface role with its data.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Role {
    /// No active role.
    #[default]
    None,
    /// Shell window.
    Toplevel(ShellRole),
    /// Shell popup.
    Popup(ShellRole),
    /// Child of another surface.
    Subsurface(SubsurfaceRole),
    /// Drag-and-drop icon.
    DragIcon,
    /// Pointer image.
    Cursor(CursorRole),
}

/// What a role's commit hook observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RoleCommit {
    Unchanged,
    Mapped,
    Unmapped,
}

impl Role {
    /// The role kind, or `None` without an active role.
    #[must_use]
    pub const fn kind(&self) -> Option<RoleKind> {
        match self {
            Self::None => None,
            Self::Toplevel(_) => Some(RoleKind::Toplevel),
            Self::Popup(_) => Some(RoleKind::Popup),
            Self::Subsurface(_) => Some(RoleKind::Subsurface),
            Self::DragIcon => Some(RoleKind::DragIcon),
            Self::Cursor(_) => Some(RoleKind::Cursor),
        }
    }

    /// Whether a toplevel or popup is mapped.
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        match self {
            Self::Toplevel(shell) | Self::Popup(shell) => shell.mapped,
            _ => false,
        }
    }

    /// Subsurface data, if this is a subsurface.
    #[must_use]
    pub const fn as_subsurface(&self) -> Option<&SubsurfaceRole> {
        match self {
            Self::Subsurface(sub) => Some(sub),
            _ => None,
        }
    }

    pub(crate) fn as_subsurface_mut(&mut self) -> Option<&mut SubsurfaceRole> {
        match self {
            Self::Subsurface(sub) => Some(sub),
            _ => None,
        }
    }

    /// Runs the role-specific part of a commit on the newly current view.
    pub(crate) fn commit(&mut self, view: &View) -> RoleCommit {
        match self {
            Self::Toplevel(shell) | Self::Popup(shell) => {
                let has_content = view.buffer.is_some();
                match (shell.mapped, has_content) {
                    (false, true) => {
                        shell.mapped = true;
                        RoleCommit::Mapped
                    }
                    (true, false) => {
                        shell.mapped = false;
                        RoleCommit::Unmapped
                    }
                    _ => RoleCommit::Unchanged,
                }
            }
            // Cursors, drag icons and subsurfaces are positioned by the
            // compositor; their commits carry no role state.
            Self::Subsurface(_) | Self::DragIcon | Self::Cursor(_) | Self::None => {
                RoleCommit::Unchanged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Buffer, BufferId};

    #[test]
    fn toplevel_maps_with_content() {
        let mut role = Role::Toplevel(ShellRole::default());
        let empty = View::default();
        let full = View {
            buffer: Some(Buffer::argb(BufferId(1), 1, 1)),
            ..View::default()
        };
        assert_eq!(role.commit(&empty), RoleCommit::Unchanged);
        assert_eq!(role.commit(&full), RoleCommit::Mapped);
        assert!(role.is_mapped());
        assert_eq!(role.commit(&full), RoleCommit::Unchanged);
        assert_eq!(role.commit(&empty), RoleCommit::Unmapped);
        assert!(!role.is_mapped());
    }

    #[test]
    fn kinds() {
        assert_eq!(Role::None.kind(), None);
        assert_eq!(Role::DragIcon.kind(), Some(RoleKind::DragIcon));
        assert_eq!(
            Role::Cursor(CursorRole {
                hotspot: Vec2::ZERO
            })
            .kind(),
            Some(RoleKind::Cursor)
        );
    }
}
