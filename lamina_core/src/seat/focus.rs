// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focus tracking and the enter/leave protocol.
//!
//! Focus is a weak reference: a tracker may hold the handle of a destroyed
//! surface for a moment, but every event send checks liveness first and
//! [`Compositor::destroy_surface`] clears trackers without sending anything.

use kurbo::{Point, Vec2};
use tracing::{debug, trace};

use crate::Compositor;
use crate::error::CoreError;
use crate::grab::GrabCapabilities;
use crate::signal::{ClientEvent, Signal};
use crate::surface::{CursorRole, Role, SurfaceId};

use super::{DeviceClass, SeatId};

/// Focus and serial state of one device class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FocusTracker {
    pub(crate) focus: Option<SurfaceId>,
    pub(crate) serial: u32,
}

impl FocusTracker {
    /// The focused surface. May be stale until the next device event.
    #[must_use]
    pub const fn focus(&self) -> Option<SurfaceId> {
        self.focus
    }

    /// The last serial issued for this class.
    #[must_use]
    pub const fn serial(&self) -> u32 {
        self.serial
    }

    /// Issues a new serial.
    pub(crate) fn next_serial(&mut self) -> u32 {
        self.serial = self.serial.wrapping_add(1);
        self.serial
    }
}

impl Compositor {
    /// Whether `serial` is the last serial issued for `class` on `seat`.
    ///
    /// Privileged requests (interactive move and resize, drag start, cursor
    /// changes) carry the serial of the input event that triggered them;
    /// anything older is stale.
    #[must_use]
    pub fn valid_serial(&self, seat: SeatId, class: DeviceClass, serial: u32) -> bool {
        self.seat(seat)
            .is_some_and(|s| s.focus(class).serial == serial)
    }

    /// Moves pointer focus to `target` (a surface and a point in its local
    /// space), sending leave and enter, or only motion when the surface does
    /// not change.
    pub(crate) fn pointer_focus_to(
        &mut self,
        seat: SeatId,
        target: Option<(SurfaceId, Point)>,
        time: u32,
    ) {
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return;
        };
        let tracker = &mut s.focus[DeviceClass::Pointer.index()];
        let old = tracker.focus.filter(|f| self.surfaces.is_alive(*f));
        let serial = tracker.serial;
        let new = target.map(|(surface, _)| surface);

        if old == new {
            tracker.focus = new;
            if let Some((surface, location)) = target {
                self.send(ClientEvent::PointerMotion {
                    seat,
                    surface,
                    time,
                    location,
                });
            }
            return;
        }

        tracker.focus = new;
        if let Some(surface) = old {
            self.send(ClientEvent::PointerLeave {
                seat,
                surface,
                serial,
            });
        }
        if let Some((surface, location)) = target {
            self.send(ClientEvent::PointerEnter {
                seat,
                surface,
                serial,
                location,
            });
        }
        self.signals.push(Signal::SeatFocusChanged {
            seat,
            class: DeviceClass::Pointer,
            surface: new,
        });
        debug!(?seat, from = ?old, to = ?new, "pointer focus changed");
    }

    /// Moves keyboard focus, sending leave and enter (with the pressed keys)
    /// followed by the current modifiers.
    pub(crate) fn keyboard_focus_to(&mut self, seat: SeatId, target: Option<SurfaceId>) {
        let target = target.filter(|t| self.surfaces.is_alive(*t));
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return;
        };
        let tracker = &mut s.focus[DeviceClass::Keyboard.index()];
        let old = tracker.focus.filter(|f| self.surfaces.is_alive(*f));
        if old == target {
            tracker.focus = target;
            return;
        }
        tracker.focus = target;
        let serial = tracker.serial;
        let keys = s.pressed_keys.clone();
        let modifiers = s.modifiers;

        if let Some(surface) = old {
            self.send(ClientEvent::KeyboardLeave {
                seat,
                surface,
                serial,
            });
        }
        if let Some(surface) = target {
            self.send(ClientEvent::KeyboardEnter {
                seat,
                surface,
                serial,
                keys,
            });
            self.send(ClientEvent::Modifiers {
                seat,
                surface,
                serial,
                modifiers,
            });
        }
        self.signals.push(Signal::SeatFocusChanged {
            seat,
            class: DeviceClass::Keyboard,
            surface: target,
        });
        debug!(?seat, from = ?old, to = ?target, "keyboard focus changed");
    }

    /// Asks the keyboard's head grab to move focus to `surface`.
    ///
    /// The default grab complies; grabs that own the keyboard (input locks,
    /// popups) may refuse.
    pub fn set_keyboard_focus(
        &mut self,
        seat: SeatId,
        surface: Option<SurfaceId>,
    ) -> Result<(), CoreError> {
        self.seat_ref(seat)?;
        if let Some(surface) = surface {
            self.surface_ref(surface)?;
        }
        let target = surface.map(|s| (s, Point::ORIGIN));
        self.dispatch(seat, DeviceClass::Keyboard, GrabCapabilities::ENTER, |grab, cx| {
            grab.enter(cx, DeviceClass::Keyboard, target);
        });
        Ok(())
    }

    /// Re-picks the surface under the pointer and offers it to the pointer's
    /// head grab. Run after anything that may change what is under the
    /// pointer: mapping, stacking, destruction.
    pub fn refocus_pointer(&mut self, seat: SeatId) {
        let Some(location) = self.seat(seat).map(|s| s.pointer_location) else {
            return;
        };
        let target = self.pick(location);
        trace!(?seat, ?target, "refocusing pointer");
        self.dispatch(seat, DeviceClass::Pointer, GrabCapabilities::ENTER, |grab, cx| {
            grab.enter(cx, DeviceClass::Pointer, target);
        });
    }

    pub(crate) fn refocus_pointers(&mut self) {
        for seat in self.seat_ids() {
            self.refocus_pointer(seat);
        }
    }

    /// Drops keyboard focus held by `id` or any of its subsurfaces.
    pub(crate) fn drop_keyboard_focus_in_tree(&mut self, id: SurfaceId) {
        for seat in self.seat_ids() {
            let Some(focus) = self
                .seat(seat)
                .and_then(|s| s.focus(DeviceClass::Keyboard).focus)
            else {
                continue;
            };
            if focus == id || self.is_ancestor(id, focus) {
                self.keyboard_focus_to(seat, None);
            }
        }
    }

    /// Clears every seat reference to a surface that has just left the
    /// arena. No event is sent to it.
    pub(crate) fn forget_surface_in_seats(&mut self, id: SurfaceId) {
        self.close_popup_chains_at(id);

        for seat in self.seat_ids() {
            let Some(s) = self.seats.get_mut(seat.index()) else {
                continue;
            };
            for class in DeviceClass::ALL {
                let tracker = &mut s.focus[class.index()];
                if tracker.focus == Some(id) {
                    tracker.focus = None;
                    self.signals.push(Signal::SeatFocusChanged {
                        seat,
                        class,
                        surface: None,
                    });
                }
            }
            s.touch_points.retain(|t| t.surface != id);
            if s.cursor.is_some_and(|(cursor, _)| cursor == id) {
                s.cursor = None;
            }

            let bound: Vec<_> = s
                .grabs
                .iter()
                .filter(|slot| slot.grab.as_ref().is_some_and(|g| g.references(id)))
                .map(|slot| slot.id)
                .collect();
            for grab in bound {
                debug!(?seat, ?grab, surface = ?id, "cancelling grab bound to destroyed surface");
                self.cancel_grab(seat, grab);
            }
        }
    }

    // -- Cursor --

    /// Sets the pointer image, authorized by the serial of the pointer's
    /// last enter. A stale serial is ignored.
    ///
    /// `surface` takes the cursor role; `None` hides the cursor.
    pub fn set_cursor(
        &mut self,
        seat: SeatId,
        surface: Option<SurfaceId>,
        hotspot: Vec2,
        serial: u32,
    ) -> Result<(), CoreError> {
        self.seat_ref(seat)?;
        if !self.valid_serial(seat, DeviceClass::Pointer, serial) {
            debug!(?seat, serial, "stale serial, cursor change ignored");
            return Ok(());
        }
        if let Some(id) = surface {
            if let Role::Cursor(cursor) = &mut self.surface_mut(id)?.role {
                cursor.hotspot = hotspot;
            } else {
                self.assign_role(id, Role::Cursor(CursorRole { hotspot }))?;
            }
        }
        if let Some(s) = self.seats.get_mut(seat.index()) {
            s.cursor = surface.map(|id| (id, hotspot));
        }
        self.move_cursor(seat);
        Ok(())
    }

    /// Places the seat's cursor surface at the pointer.
    pub(crate) fn move_cursor(&mut self, seat: SeatId) {
        let Some(s) = self.seats.get(seat.index()) else {
            return;
        };
        let Some((id, hotspot)) = s.cursor else {
            return;
        };
        let location = s.pointer_location;
        if let Some(surface) = self.surfaces.get_mut(id) {
            surface.base = location - hotspot;
            self.update_geometry(id);
        }
    }

    /// Unsets the cursor of every seat showing `id`.
    pub(crate) fn forget_cursor(&mut self, id: SurfaceId) {
        for s in &mut self.seats {
            if s.cursor.is_some_and(|(cursor, _)| cursor == id) {
                s.cursor = None;
            }
        }
    }
}
