// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exclusive input lock, e.g. for a lock screen.

use kurbo::Point;
use tracing::{debug, trace};

use crate::Compositor;
use crate::error::CoreError;
use crate::seat::{DeviceClass, DeviceClasses, SeatId};
use crate::surface::SurfaceId;

use super::{
    AxisEvent, ButtonEvent, DefaultGrab, Grab, GrabAction, GrabCapabilities, GrabContext, GrabId,
    KeyEvent, MotionEvent, TouchEvent,
};

/// Owns every device class of a seat until [`Compositor::unlock_input`].
///
/// Input only reaches the lock surface and its subsurfaces. The lock holds
/// even if its surface is destroyed; input is then swallowed.
#[derive(Debug)]
pub struct InputLockGrab {
    surface: SurfaceId,
    delivery: DefaultGrab,
}

impl InputLockGrab {
    /// The surface the lock delivers to.
    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn in_lock(&self, cx: &GrabContext<'_>, surface: SurfaceId) -> bool {
        cx.compositor.surfaces.is_alive(surface) && cx.compositor.root_of(surface) == self.surface
    }

    fn filter(
        &self,
        cx: &GrabContext<'_>,
        target: Option<(SurfaceId, Point)>,
    ) -> Option<(SurfaceId, Point)> {
        target.filter(|(s, _)| self.in_lock(cx, *s))
    }
}

impl Grab for InputLockGrab {
    fn capabilities(&self) -> GrabCapabilities {
        GrabCapabilities::all() - GrabCapabilities::CANCEL
    }

    fn action(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass, _action: GrabAction) {
        match class {
            DeviceClass::Pointer => {
                let target = self.filter(cx, cx.pick(cx.pointer_location()));
                cx.set_pointer_focus(target, 0);
            }
            DeviceClass::Keyboard => cx.set_keyboard_focus(Some(self.surface)),
            DeviceClass::Touch => {}
        }
    }

    fn enter(
        &mut self,
        cx: &mut GrabContext<'_>,
        class: DeviceClass,
        target: Option<(SurfaceId, Point)>,
    ) {
        match class {
            DeviceClass::Pointer => {
                let target = self.filter(cx, target);
                cx.set_pointer_focus(target, 0);
            }
            DeviceClass::Keyboard => {
                if target.is_some_and(|(s, _)| self.in_lock(cx, s)) {
                    self.delivery.enter(cx, class, target);
                } else {
                    trace!(seat = ?cx.seat, ?target, "keyboard focus refused while locked");
                }
            }
            DeviceClass::Touch => {}
        }
    }

    fn motion(&mut self, cx: &mut GrabContext<'_>, event: &MotionEvent) {
        let target = self.filter(cx, event.target);
        cx.set_pointer_focus(target, event.time);
    }

    fn button(&mut self, cx: &mut GrabContext<'_>, event: &ButtonEvent) {
        self.delivery.button(cx, event);
    }

    fn key(&mut self, cx: &mut GrabContext<'_>, event: &KeyEvent) {
        self.delivery.key(cx, event);
    }

    fn modifiers(&mut self, cx: &mut GrabContext<'_>, modifiers: u32) {
        self.delivery.modifiers(cx, modifiers);
    }

    fn axis(&mut self, cx: &mut GrabContext<'_>, event: &AxisEvent) {
        self.delivery.axis(cx, event);
    }

    fn touch(&mut self, cx: &mut GrabContext<'_>, event: &TouchEvent) {
        if let TouchEvent::Down { id, target, .. } = *event {
            if self.filter(cx, target).is_none() {
                // Unbound points are ignored until they lift.
                if let Some(s) = cx.compositor.seats.get_mut(cx.seat.index()) {
                    s.touch_points.retain(|t| t.id != id);
                }
                return;
            }
        }
        self.delivery.touch(cx, event);
    }

    fn frame(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass) {
        self.delivery.frame(cx, class);
    }
}

impl Compositor {
    /// Locks all input of `seat` to `surface`, replacing any previous lock.
    pub fn lock_input(&mut self, seat: SeatId, surface: SurfaceId) -> Result<GrabId, CoreError> {
        let previous = self.seat_ref(seat)?.lock;
        self.surface_ref(surface)?;
        if let Some(previous) = previous {
            self.pop_grab(seat, previous);
        }
        self.next_grab += 1;
        let id = GrabId(self.next_grab);
        self.seat_mut(seat)?.lock = Some(id);
        debug!(?seat, ?surface, "input locked");
        let grab = InputLockGrab {
            surface,
            delivery: DefaultGrab::default(),
        };
        self.install_grab(
            seat,
            id,
            DeviceClasses::all(),
            self.config.grabs.input_lock,
            Box::new(grab),
        );
        Ok(id)
    }

    /// Ends the input lock of `seat`. Returns `false` if it was not locked.
    pub fn unlock_input(&mut self, seat: SeatId) -> bool {
        let Some(lock) = self.seat(seat).and_then(|s| s.lock) else {
            return false;
        };
        debug!(?seat, "input unlocked");
        self.pop_grab(seat, lock)
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Point, Vec2};

    use crate::Compositor;
    use crate::buffer::{Buffer, BufferId};
    use crate::scene::Layer;
    use crate::seat::{DeviceClass, KeyState, PointerMotion, SeatId};
    use crate::signal::ClientEvent;
    use crate::surface::{ClientId, SurfaceId};
    use crate::test_support::toplevel;

    /// A window with keyboard focus and an unlocked lock surface beside it.
    fn setup() -> (Compositor, SeatId, SurfaceId, SurfaceId) {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let window = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 100, 100), Point::ORIGIN);
        let lock = c.create_surface(ClientId(2));
        c.make_toplevel(lock).unwrap();
        c.attach(lock, Some(Buffer::argb(BufferId(2), 50, 50)), 0, 0).unwrap();
        c.commit(lock).unwrap();
        c.map_surface(lock, Layer::Overlay, Point::new(200.0, 0.0)).unwrap();
        c.set_keyboard_focus(seat, Some(window)).unwrap();
        c.take_client_events();
        (c, seat, window, lock)
    }

    fn keyboard_focus(c: &Compositor, seat: SeatId) -> Option<SurfaceId> {
        c.seat(seat).unwrap().focus(DeviceClass::Keyboard).focus()
    }

    #[test]
    fn lock_owns_keyboard_and_pointer() {
        let (mut c, seat, window, lock) = setup();
        c.lock_input(seat, lock).unwrap();
        assert!(c.seat(seat).unwrap().is_locked());
        assert_eq!(keyboard_focus(&c, seat), Some(lock));

        c.set_keyboard_focus(seat, Some(window)).unwrap();
        assert_eq!(keyboard_focus(&c, seat), Some(lock), "focus requests are refused");

        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(10.0, 10.0)), 1);
        assert_eq!(c.seat(seat).unwrap().focus(DeviceClass::Pointer).focus(), None);
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(200.0, 0.0)), 2);
        assert_eq!(c.seat(seat).unwrap().focus(DeviceClass::Pointer).focus(), Some(lock));

        c.take_client_events();
        c.keyboard_key(seat, 30, KeyState::Pressed, 3);
        assert_eq!(
            c.take_client_events(),
            vec![ClientEvent::Key {
                seat,
                surface: lock,
                serial: 1,
                time: 3,
                key: 30,
                state: KeyState::Pressed
            }]
        );
    }

    #[test]
    fn unlock_restores_keyboard_focus() {
        let (mut c, seat, window, lock) = setup();
        c.lock_input(seat, lock).unwrap();
        assert!(c.unlock_input(seat));
        assert!(!c.unlock_input(seat));
        assert!(!c.seat(seat).unwrap().is_locked());
        assert_eq!(keyboard_focus(&c, seat), Some(window));
    }

    #[test]
    fn lock_outlives_its_surface() {
        let (mut c, seat, _, lock) = setup();
        c.lock_input(seat, lock).unwrap();
        c.destroy_surface(lock).unwrap();
        assert!(c.seat(seat).unwrap().is_locked());

        c.take_client_events();
        c.keyboard_key(seat, 30, KeyState::Pressed, 1);
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(10.0, 10.0)), 2);
        assert!(c.take_client_events().is_empty(), "input is swallowed");
    }

    #[test]
    fn relocking_replaces_the_lock() {
        let (mut c, seat, _, lock) = setup();
        let first = c.lock_input(seat, lock).unwrap();
        let second = c.lock_input(seat, lock).unwrap();
        assert_ne!(first, second);
        let stack = c.seat(seat).unwrap().grab_stack(DeviceClass::Pointer);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.head(), Some(second));
    }
}
