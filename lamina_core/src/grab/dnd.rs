// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drag-and-drop.

use kurbo::Point;
use tracing::debug;

use crate::Compositor;
use crate::error::CoreError;
use crate::seat::{ButtonState, DeviceClass, DeviceClasses, KeyState, SeatId};
use crate::signal::ClientEvent;
use crate::surface::{Role, SurfaceId};

use super::{
    ButtonEvent, Grab, GrabAction, GrabCapabilities, GrabContext, GrabId, KeyEvent, MotionEvent,
};

/// Evdev code of the escape key.
const KEY_ESC: u32 = 1;

/// Takes the pointer (and optionally the keyboard) for a drag started from
/// `origin`, until the last button is released.
///
/// Instead of pointer events, the surface under the pointer receives drag
/// enter, motion and leave, and finally a drop.
#[derive(Debug)]
pub struct DragGrab {
    origin: SurfaceId,
    icon: Option<SurfaceId>,
    focus: Option<SurfaceId>,
}

impl DragGrab {
    /// The surface the drag started from.
    #[must_use]
    pub fn origin(&self) -> SurfaceId {
        self.origin
    }

    fn retarget(&mut self, cx: &mut GrabContext<'_>, target: Option<(SurfaceId, Point)>, time: u32) {
        let new = target.map(|(s, _)| s);
        if new == self.focus {
            if let Some((surface, location)) = target {
                cx.send(ClientEvent::DragMotion {
                    seat: cx.seat,
                    surface,
                    time,
                    location,
                });
            }
            return;
        }
        self.leave(cx);
        if let Some((surface, location)) = target {
            cx.send(ClientEvent::DragEnter {
                seat: cx.seat,
                surface,
                serial: cx.serial(DeviceClass::Pointer),
                location,
            });
        }
        self.focus = new;
    }

    fn leave(&mut self, cx: &mut GrabContext<'_>) {
        if let Some(surface) = self.focus.take() {
            cx.send(ClientEvent::DragLeave {
                seat: cx.seat,
                surface,
            });
        }
    }

    fn move_icon(&self, cx: &mut GrabContext<'_>, location: Point) {
        let Some(icon) = self.icon else {
            return;
        };
        if let Some(surface) = cx.compositor.surfaces.get_mut(icon) {
            surface.base = location;
            cx.compositor.update_geometry(icon);
        }
    }
}

impl Grab for DragGrab {
    fn capabilities(&self) -> GrabCapabilities {
        GrabCapabilities::ENTER
            | GrabCapabilities::MOTION
            | GrabCapabilities::BUTTON
            | GrabCapabilities::CANCEL
    }

    fn action(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass, action: GrabAction) {
        if class != DeviceClass::Pointer {
            return;
        }
        let location = cx.pointer_location();
        self.move_icon(cx, location);
        if action == GrabAction::Push {
            let target = cx.pick(location);
            self.retarget(cx, target, 0);
        }
    }

    fn enter(
        &mut self,
        cx: &mut GrabContext<'_>,
        class: DeviceClass,
        target: Option<(SurfaceId, Point)>,
    ) {
        // Keyboard focus stays put for the duration of the drag.
        if class == DeviceClass::Pointer {
            self.retarget(cx, target, 0);
        }
    }

    fn motion(&mut self, cx: &mut GrabContext<'_>, event: &MotionEvent) {
        self.move_icon(cx, event.location);
        self.retarget(cx, event.target, event.time);
    }

    fn button(&mut self, cx: &mut GrabContext<'_>, event: &ButtonEvent) {
        if event.state != ButtonState::Released {
            return;
        }
        if cx.seat().is_some_and(|s| !s.pressed_buttons().is_empty()) {
            return;
        }
        if let Some(surface) = self.focus.take() {
            cx.send(ClientEvent::Drop {
                seat: cx.seat,
                surface,
            });
        }
        debug!(seat = ?cx.seat, "drag dropped");
        cx.pop();
    }

    fn key(&mut self, cx: &mut GrabContext<'_>, event: &KeyEvent) {
        if event.key == KEY_ESC && event.state == KeyState::Pressed {
            debug!(seat = ?cx.seat, "drag aborted");
            self.leave(cx);
            cx.pop();
        }
    }

    fn cancel(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass) {
        if class == DeviceClass::Pointer {
            self.leave(cx);
        }
    }

    fn references(&self, surface: SurfaceId) -> bool {
        surface == self.origin || self.icon == Some(surface)
    }
}

impl Compositor {
    /// Starts a drag from `origin`, authorized by the pointer serial of the
    /// button press that began it.
    ///
    /// `icon` takes the drag-icon role and follows the pointer. With
    /// `keyboard`, the keyboard is grabbed too and escape aborts the drag.
    /// Returns `Ok(None)` for a stale serial, with no button held, or while
    /// another drag is running.
    pub fn start_drag(
        &mut self,
        seat: SeatId,
        origin: SurfaceId,
        icon: Option<SurfaceId>,
        serial: u32,
        keyboard: bool,
    ) -> Result<Option<GrabId>, CoreError> {
        let s = self.seat_ref(seat)?;
        let busy = s.drag.is_some();
        let idle = s.pressed_buttons.is_empty();
        self.surface_ref(origin)?;
        if !self.valid_serial(seat, DeviceClass::Pointer, serial) || idle || busy {
            debug!(?seat, serial, idle, busy, "drag refused");
            return Ok(None);
        }
        if let Some(icon) = icon {
            if !matches!(self.surface_ref(icon)?.role, Role::DragIcon) {
                self.assign_role(icon, Role::DragIcon)?;
            }
        }

        let mut classes = DeviceClasses::POINTER;
        if keyboard {
            classes |= DeviceClasses::KEYBOARD;
        }
        self.next_grab += 1;
        let id = GrabId(self.next_grab);
        if let Some(s) = self.seats.get_mut(seat.index()) {
            s.drag = Some((id, icon));
        }
        let grab = DragGrab {
            origin,
            icon,
            focus: None,
        };
        self.install_grab(seat, id, classes, self.config.grabs.drag, Box::new(grab));
        Ok(Some(id))
    }
}
