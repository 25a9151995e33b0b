// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device event ingestion.
//!
//! Each entry point updates the seat's own state first (pointer location,
//! pressed buttons and keys, touch bindings, serials) and then hands the
//! event to the head grab of its class. Seat state is therefore already
//! current when a grab runs.

use kurbo::{Point, Vec2};
use tracing::{trace, warn};

use crate::Compositor;
use crate::grab::{AxisEvent, ButtonEvent, GrabCapabilities, KeyEvent, MotionEvent, TouchEvent};
use crate::output::OutputId;
use crate::signal::ClientEvent;

use super::{Axis, AxisSource, ButtonState, DeviceClass, KeyState, SeatId, TouchPoint};

/// Pointer motion as reported by a device.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerMotion {
    /// Mouse or touchpad delta.
    Relative(Vec2),
    /// Tablet-style position inside an output.
    Absolute {
        /// Output the position is relative to.
        output: OutputId,
        /// Position from the output's top left corner.
        position: Point,
    },
}

impl Compositor {
    /// Moves the pointer. The new position is clamped to the outputs.
    pub fn pointer_motion(&mut self, seat: SeatId, motion: PointerMotion, time: u32) {
        let Some(current) = self.seat(seat).map(|s| s.pointer_location) else {
            return;
        };
        let location = match motion {
            PointerMotion::Relative(delta) => current + delta,
            PointerMotion::Absolute { output, position } => match self.outputs.rect(output) {
                Some(rect) => rect.origin() + position.to_vec2(),
                None => {
                    warn!(?seat, ?output, "absolute motion on unknown output");
                    return;
                }
            },
        };
        let location = self.outputs.clamp(location);
        if let Some(s) = self.seats.get_mut(seat.index()) {
            s.pointer_location = location;
        }
        self.move_cursor(seat);

        let event = MotionEvent {
            time,
            location,
            target: self.pick(location),
        };
        trace!(?seat, ?location, target = ?event.target, "pointer motion");
        self.dispatch(seat, DeviceClass::Pointer, GrabCapabilities::MOTION, |grab, cx| {
            grab.motion(cx, &event);
        });
    }

    /// A pointer button changed state.
    pub fn pointer_button(&mut self, seat: SeatId, button: u32, state: ButtonState, time: u32) {
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return;
        };
        match state {
            ButtonState::Pressed => {
                if !s.pressed_buttons.contains(&button) {
                    s.pressed_buttons.push(button);
                }
            }
            ButtonState::Released => s.pressed_buttons.retain(|b| *b != button),
        }
        let serial = s.focus[DeviceClass::Pointer.index()].next_serial();
        let event = ButtonEvent {
            time,
            serial,
            button,
            state,
        };
        trace!(?seat, button, ?state, serial, "pointer button");
        self.dispatch(seat, DeviceClass::Pointer, GrabCapabilities::BUTTON, |grab, cx| {
            grab.button(cx, &event);
        });
    }

    /// Scrolling.
    pub fn pointer_axis(
        &mut self,
        seat: SeatId,
        axis: Axis,
        value: f64,
        discrete: Option<i32>,
        source: AxisSource,
        time: u32,
    ) {
        let event = AxisEvent {
            time,
            axis,
            value,
            discrete,
            source,
        };
        self.dispatch(seat, DeviceClass::Pointer, GrabCapabilities::AXIS, |grab, cx| {
            grab.axis(cx, &event);
        });
    }

    /// Ends a group of pointer events.
    pub fn pointer_frame(&mut self, seat: SeatId) {
        self.dispatch(seat, DeviceClass::Pointer, GrabCapabilities::FRAME, |grab, cx| {
            grab.frame(cx, DeviceClass::Pointer);
        });
    }

    /// A key changed state.
    pub fn keyboard_key(&mut self, seat: SeatId, key: u32, state: KeyState, time: u32) {
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return;
        };
        match state {
            KeyState::Pressed => {
                if !s.pressed_keys.contains(&key) {
                    s.pressed_keys.push(key);
                }
            }
            KeyState::Released => s.pressed_keys.retain(|k| *k != key),
        }
        let serial = s.focus[DeviceClass::Keyboard.index()].next_serial();
        let event = KeyEvent {
            time,
            serial,
            key,
            state,
        };
        trace!(?seat, key, ?state, serial, "key");
        self.dispatch(seat, DeviceClass::Keyboard, GrabCapabilities::BUTTON, |grab, cx| {
            grab.key(cx, &event);
        });
    }

    /// New keyboard modifier state, as a backend-defined bitmask.
    pub fn keyboard_modifiers(&mut self, seat: SeatId, modifiers: u32) {
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return;
        };
        if s.modifiers == modifiers {
            return;
        }
        s.modifiers = modifiers;
        self.dispatch(seat, DeviceClass::Keyboard, GrabCapabilities::BUTTON, |grab, cx| {
            grab.modifiers(cx, modifiers);
        });
    }

    /// A finger touched down at `location` in global space. The touch point
    /// is bound to the surface under it until it lifts.
    pub fn touch_down(&mut self, seat: SeatId, id: i32, location: Point, time: u32) {
        let location = self.outputs.clamp(location);
        let target = self.pick(location);
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return;
        };
        s.touch_points.retain(|t| t.id != id);
        if let Some((surface, _)) = target {
            s.touch_points.push(TouchPoint { id, surface });
        }
        let serial = s.focus[DeviceClass::Touch.index()].next_serial();
        let event = TouchEvent::Down {
            time,
            serial,
            id,
            location,
            target,
        };
        trace!(?seat, id, ?location, ?target, "touch down");
        self.dispatch(seat, DeviceClass::Touch, GrabCapabilities::BUTTON, |grab, cx| {
            grab.touch(cx, &event);
        });
    }

    /// A finger lifted.
    pub fn touch_up(&mut self, seat: SeatId, id: i32, time: u32) {
        let Some(serial) = self.seat(seat).map(|s| s.focus(DeviceClass::Touch).serial) else {
            return;
        };
        let event = TouchEvent::Up { time, serial, id };
        self.dispatch(seat, DeviceClass::Touch, GrabCapabilities::BUTTON, |grab, cx| {
            grab.touch(cx, &event);
        });
        if let Some(s) = self.seats.get_mut(seat.index()) {
            s.touch_points.retain(|t| t.id != id);
        }
    }

    /// A finger moved to `location` in global space.
    pub fn touch_motion(&mut self, seat: SeatId, id: i32, location: Point, time: u32) {
        let location = self.outputs.clamp(location);
        let event = TouchEvent::Motion { time, id, location };
        self.dispatch(seat, DeviceClass::Touch, GrabCapabilities::MOTION, |grab, cx| {
            grab.touch(cx, &event);
        });
    }

    /// Ends a group of touch events.
    pub fn touch_frame(&mut self, seat: SeatId) {
        self.dispatch(seat, DeviceClass::Touch, GrabCapabilities::FRAME, |grab, cx| {
            grab.frame(cx, DeviceClass::Touch);
        });
    }

    /// The touch sequence was taken over by the compositor. Every bound
    /// surface is told and all touch points are forgotten.
    pub fn touch_cancel(&mut self, seat: SeatId) {
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return;
        };
        let mut surfaces: Vec<_> = s.touch_points.drain(..).map(|t| t.surface).collect();
        surfaces.sort();
        surfaces.dedup();
        for surface in surfaces {
            self.send(ClientEvent::TouchCancel { seat, surface });
        }
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Point, Rect, Vec2};

    use super::*;
    use crate::buffer::{Buffer, BufferId};
    use crate::surface::ClientId;
    use crate::test_support::toplevel;

    #[test]
    fn motion_enters_leaves_and_moves() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(200.0, 200.0)), 0);
        let s = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 50, 50), Point::new(10.0, 10.0));
        c.take_client_events();

        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(-180.0, -180.0)), 1);
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(5.0, 0.0)), 2);
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(100.0, 0.0)), 3);
        assert_eq!(
            c.take_client_events(),
            vec![
                ClientEvent::PointerEnter {
                    seat,
                    surface: s,
                    serial: 0,
                    location: Point::new(10.0, 10.0)
                },
                ClientEvent::PointerMotion {
                    seat,
                    surface: s,
                    time: 2,
                    location: Point::new(15.0, 10.0)
                },
                ClientEvent::PointerLeave {
                    seat,
                    surface: s,
                    serial: 0
                },
            ]
        );
    }

    #[test]
    fn absolute_motion_is_output_relative_and_clamped() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        c.add_output(OutputId(0), Rect::new(0.0, 0.0, 100.0, 100.0));
        c.add_output(OutputId(1), Rect::new(100.0, 0.0, 200.0, 100.0));
        c.pointer_motion(
            seat,
            PointerMotion::Absolute {
                output: OutputId(1),
                position: Point::new(20.0, 30.0),
            },
            0,
        );
        assert_eq!(c.seat(seat).unwrap().pointer_location(), Point::new(120.0, 30.0));
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(500.0, -500.0)), 1);
        assert_eq!(c.seat(seat).unwrap().pointer_location(), Point::new(199.0, 0.0));
    }

    #[test]
    fn buttons_and_axis_go_to_pointer_focus() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let s = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 50, 50), Point::ORIGIN);
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(5.0, 5.0)), 0);
        c.take_client_events();

        c.pointer_button(seat, 0x110, ButtonState::Pressed, 1);
        c.pointer_axis(seat, Axis::Vertical, 10.0, Some(1), AxisSource::Wheel, 2);
        c.pointer_frame(seat);
        let events = c.take_client_events();
        assert_eq!(
            events[0],
            ClientEvent::PointerButton {
                seat,
                surface: s,
                serial: 1,
                time: 1,
                button: 0x110,
                state: ButtonState::Pressed
            }
        );
        assert!(events.contains(&ClientEvent::PointerAxis {
            seat,
            surface: s,
            time: 2,
            axis: Axis::Vertical,
            value: 10.0,
            discrete: Some(1),
            source: AxisSource::Wheel
        }));
        assert_eq!(events.last(), Some(&ClientEvent::PointerFrame { seat, surface: s }));
    }

    #[test]
    fn click_focuses_toplevel() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let s = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 50, 50), Point::ORIGIN);
        let child = c.create_surface(ClientId(1));
        c.create_subsurface(child, s).unwrap();
        c.attach(child, Some(Buffer::argb(BufferId(2), 10, 10)), 0, 0).unwrap();
        c.commit(child).unwrap();
        c.commit(s).unwrap();

        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(5.0, 5.0)), 0);
        assert_eq!(c.seat(seat).unwrap().focus(DeviceClass::Pointer).focus(), Some(child));
        c.pointer_button(seat, 0x110, ButtonState::Pressed, 1);
        assert_eq!(c.seat(seat).unwrap().focus(DeviceClass::Keyboard).focus(), Some(s));
    }

    #[test]
    fn click_to_focus_can_be_disabled() {
        let mut config = crate::Config::default();
        config.input.click_to_focus = false;
        let mut c = Compositor::new(config, Box::new(crate::backend::NullBackend::default()));
        let seat = c.create_seat("seat0");
        let _ = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 50, 50), Point::ORIGIN);
        c.pointer_button(seat, 0x110, ButtonState::Pressed, 1);
        assert_eq!(c.seat(seat).unwrap().focus(DeviceClass::Keyboard).focus(), None);
    }

    #[test]
    fn touch_points_stay_bound() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let a = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 50, 50), Point::ORIGIN);
        let _b = toplevel(&mut c, ClientId(2), Buffer::argb(BufferId(2), 50, 50), Point::new(100.0, 0.0));
        c.take_client_events();

        c.touch_down(seat, 7, Point::new(10.0, 10.0), 1);
        c.touch_motion(seat, 7, Point::new(120.0, 10.0), 2);
        c.touch_frame(seat);
        c.touch_up(seat, 7, 3);
        assert_eq!(
            c.take_client_events(),
            vec![
                ClientEvent::TouchDown {
                    seat,
                    surface: a,
                    serial: 1,
                    time: 1,
                    id: 7,
                    location: Point::new(10.0, 10.0)
                },
                ClientEvent::TouchMotion {
                    seat,
                    surface: a,
                    time: 2,
                    id: 7,
                    location: Point::new(120.0, 10.0)
                },
                ClientEvent::TouchFrame { seat, surface: a },
                ClientEvent::TouchUp {
                    seat,
                    surface: a,
                    serial: 1,
                    time: 3,
                    id: 7
                },
            ]
        );
        assert_eq!(c.seat(seat).unwrap().touch_target(7), None);
    }

    #[test]
    fn touch_cancel_reaches_bound_surfaces() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let a = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 50, 50), Point::ORIGIN);
        c.touch_down(seat, 1, Point::new(1.0, 1.0), 1);
        c.touch_down(seat, 2, Point::new(2.0, 2.0), 1);
        c.take_client_events();
        c.touch_cancel(seat);
        assert_eq!(
            c.take_client_events(),
            vec![ClientEvent::TouchCancel { seat, surface: a }]
        );
        assert_eq!(c.seat(seat).unwrap().touch_target(1), None);
    }
}
