// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Popup dismissal.
//!
//! A seat has at most one popup chain: the popups of one client, outermost
//! first, sharing a single [`PopupGrab`]. Pointer and touch input is limited
//! to that client's surfaces; a press anywhere else dismisses the whole
//! chain, innermost popup first.

use kurbo::Point;
use tracing::debug;

use crate::Compositor;
use crate::error::CoreError;
use crate::seat::{ButtonState, DeviceClass, DeviceClasses, SeatId};
use crate::signal::{ClientEvent, Signal};
use crate::surface::{ClientId, RoleKind, SurfaceId};

use super::{
    AxisEvent, ButtonEvent, Grab, GrabAction, GrabCapabilities, GrabContext, GrabId,
    MotionEvent, TouchEvent,
};

/// Open popups of a seat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PopupChain {
    pub(crate) grab: GrabId,
    pub(crate) client: ClientId,
    /// Outermost first.
    pub(crate) surfaces: Vec<SurfaceId>,
}

/// Takes the pointer and touch while a popup chain is open.
#[derive(Debug)]
pub struct PopupGrab {
    client: ClientId,
}

impl PopupGrab {
    fn owns(&self, cx: &GrabContext<'_>, surface: SurfaceId) -> bool {
        cx.compositor
            .surface(surface)
            .is_some_and(|s| s.client() == self.client)
    }

    fn filter(
        &self,
        cx: &GrabContext<'_>,
        target: Option<(SurfaceId, Point)>,
    ) -> Option<(SurfaceId, Point)> {
        target.filter(|(s, _)| self.owns(cx, *s))
    }

    fn owned_touch_target(&self, cx: &GrabContext<'_>, id: i32) -> Option<SurfaceId> {
        cx.seat()
            .and_then(|s| s.touch_target(id))
            .filter(|s| self.owns(cx, *s))
    }

    fn dismiss(cx: &mut GrabContext<'_>) {
        debug!(seat = ?cx.seat, "popup chain dismissed");
        cx.compositor.close_popups_from(cx.seat, 0);
    }
}

impl Grab for PopupGrab {
    fn capabilities(&self) -> GrabCapabilities {
        GrabCapabilities::ENTER
            | GrabCapabilities::MOTION
            | GrabCapabilities::BUTTON
            | GrabCapabilities::AXIS
            | GrabCapabilities::FRAME
            | GrabCapabilities::CANCEL
    }

    fn action(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass, _action: GrabAction) {
        if class == DeviceClass::Pointer {
            let target = self.filter(cx, cx.pick(cx.pointer_location()));
            cx.set_pointer_focus(target, 0);
        }
    }

    fn enter(
        &mut self,
        cx: &mut GrabContext<'_>,
        class: DeviceClass,
        target: Option<(SurfaceId, Point)>,
    ) {
        if class == DeviceClass::Pointer {
            let target = self.filter(cx, target);
            cx.set_pointer_focus(target, 0);
        }
    }

    fn motion(&mut self, cx: &mut GrabContext<'_>, event: &MotionEvent) {
        let target = self.filter(cx, event.target);
        cx.set_pointer_focus(target, event.time);
    }

    fn button(&mut self, cx: &mut GrabContext<'_>, event: &ButtonEvent) {
        match cx.focus(DeviceClass::Pointer) {
            Some(surface) => cx.send(ClientEvent::PointerButton {
                seat: cx.seat,
                surface,
                serial: event.serial,
                time: event.time,
                button: event.button,
                state: event.state,
            }),
            None if event.state == ButtonState::Pressed => Self::dismiss(cx),
            None => {}
        }
    }

    fn axis(&mut self, cx: &mut GrabContext<'_>, event: &AxisEvent) {
        if let Some(surface) = cx.focus(DeviceClass::Pointer) {
            cx.send(ClientEvent::PointerAxis {
                seat: cx.seat,
                surface,
                time: event.time,
                axis: event.axis,
                value: event.value,
                discrete: event.discrete,
                source: event.source,
            });
        }
    }

    fn touch(&mut self, cx: &mut GrabContext<'_>, event: &TouchEvent) {
        match *event {
            TouchEvent::Down {
                time,
                serial,
                id,
                target,
                ..
            } => match self.filter(cx, target) {
                Some((surface, location)) => cx.send(ClientEvent::TouchDown {
                    seat: cx.seat,
                    surface,
                    serial,
                    time,
                    id,
                    location,
                }),
                None => Self::dismiss(cx),
            },
            TouchEvent::Up { time, serial, id } => {
                if let Some(surface) = self.owned_touch_target(cx, id) {
                    cx.send(ClientEvent::TouchUp {
                        seat: cx.seat,
                        surface,
                        serial,
                        time,
                        id,
                    });
                }
            }
            TouchEvent::Motion { time, id, location } => {
                let Some(surface) = self.owned_touch_target(cx, id) else {
                    return;
                };
                let Some(local) = cx.compositor.surface(surface).map(|s| s.to_local(location))
                else {
                    return;
                };
                cx.send(ClientEvent::TouchMotion {
                    seat: cx.seat,
                    surface,
                    time,
                    id,
                    location: local,
                });
            }
        }
    }

    fn frame(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass) {
        let surfaces: Vec<SurfaceId> = match class {
            DeviceClass::Pointer => cx.focus(DeviceClass::Pointer).into_iter().collect(),
            DeviceClass::Touch => {
                let mut bound: Vec<SurfaceId> = cx
                    .seat()
                    .map(|s| s.touch_points.iter().map(|t| t.surface).collect())
                    .unwrap_or_default();
                bound.retain(|s| self.owns(cx, *s));
                bound.sort();
                bound.dedup();
                bound
            }
            DeviceClass::Keyboard => Vec::new(),
        };
        for surface in surfaces {
            let event = if class == DeviceClass::Pointer {
                ClientEvent::PointerFrame {
                    seat: cx.seat,
                    surface,
                }
            } else {
                ClientEvent::TouchFrame {
                    seat: cx.seat,
                    surface,
                }
            };
            cx.send(event);
        }
    }

    fn cancel(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass) {
        if class == DeviceClass::Pointer {
            cx.set_pointer_focus(None, 0);
        }
        Self::dismiss(cx);
    }
}

impl Compositor {
    /// Opens a popup grab for `popup`, authorized by a pointer or touch
    /// serial.
    ///
    /// A popup of the client whose chain is already open nests inside it and
    /// shares its grab. A popup of another client first dismisses the open
    /// chain. Returns `Ok(None)` for a stale serial.
    pub fn popup_grab(
        &mut self,
        seat: SeatId,
        popup: SurfaceId,
        serial: u32,
    ) -> Result<Option<GrabId>, CoreError> {
        self.seat_ref(seat)?;
        let surface = self.surface_ref(popup)?;
        if surface.role.kind() != Some(RoleKind::Popup) {
            return Err(CoreError::WrongRole {
                surface: popup,
                expected: RoleKind::Popup,
            });
        }
        let client = surface.client;
        if !self.valid_serial(seat, DeviceClass::Pointer, serial)
            && !self.valid_serial(seat, DeviceClass::Touch, serial)
        {
            debug!(?seat, serial, "stale serial, popup grab refused");
            return Ok(None);
        }

        let open = self
            .seat(seat)
            .and_then(|s| s.popups.as_ref())
            .map(|chain| (chain.grab, chain.client));
        match open {
            Some((grab, owner)) if owner == client => {
                if let Some(chain) = self.seat_mut(seat)?.popups.as_mut() {
                    if !chain.surfaces.contains(&popup) {
                        chain.surfaces.push(popup);
                    }
                }
                debug!(?seat, surface = ?popup, "popup nested");
                return Ok(Some(grab));
            }
            Some(_) => self.close_popups_from(seat, 0),
            None => {}
        }

        self.next_grab += 1;
        let id = GrabId(self.next_grab);
        self.seat_mut(seat)?.popups = Some(PopupChain {
            grab: id,
            client,
            surfaces: vec![popup],
        });
        self.install_grab(
            seat,
            id,
            DeviceClasses::POINTER | DeviceClasses::TOUCH,
            self.config.grabs.popup,
            Box::new(PopupGrab { client }),
        );
        Ok(Some(id))
    }

    /// Closes `surface` and every popup nested inside it. The grab ends
    /// with the outermost popup.
    pub fn popup_grab_close(&mut self, seat: SeatId, surface: SurfaceId) -> Result<(), CoreError> {
        let at = self
            .seat_ref(seat)?
            .popup_chain()
            .iter()
            .position(|s| *s == surface);
        if let Some(at) = at {
            self.close_popups_from(seat, at);
        }
        Ok(())
    }

    /// Dismisses the popups of `seat`'s chain from `index` inwards,
    /// innermost first, popping the grab once the chain is empty. Popups
    /// already destroyed are dropped without a dismissal signal.
    pub(crate) fn close_popups_from(&mut self, seat: SeatId, index: usize) {
        let Some(chain) = self
            .seats
            .get_mut(seat.index())
            .and_then(|s| s.popups.as_mut())
        else {
            return;
        };
        if index >= chain.surfaces.len() {
            return;
        }
        let closed = chain.surfaces.split_off(index);
        let grab = chain.grab;
        let empty = chain.surfaces.is_empty();

        for surface in closed.into_iter().rev() {
            if self.surfaces.is_alive(surface) {
                self.signals.push(Signal::PopupDismissed(surface));
                debug!(?seat, ?surface, "popup dismissed");
            }
        }
        if empty {
            self.pop_grab(seat, grab);
        }
    }

    /// Closes the popups from `id` inwards in every chain containing it.
    pub(crate) fn close_popup_chains_at(&mut self, id: SurfaceId) {
        for seat in self.seat_ids() {
            let at = self
                .seat(seat)
                .and_then(|s| s.popup_chain().iter().position(|p| *p == id));
            if let Some(at) = at {
                self.close_popups_from(seat, at);
            }
        }
    }
}
