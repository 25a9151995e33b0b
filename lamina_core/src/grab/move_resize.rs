// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interactive move and resize.

use bitflags::bitflags;
use kurbo::{Point, Size};
use tracing::{debug, trace};

use crate::Compositor;
use crate::error::CoreError;
use crate::seat::{ButtonState, DeviceClass, DeviceClasses, SeatId};
use crate::signal::Signal;
use crate::surface::{RoleKind, SurfaceId};

use super::{ButtonEvent, Grab, GrabCapabilities, GrabContext, GrabId, MotionEvent};

bitflags! {
    /// Window edges dragged by an interactive resize.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ResizeEdges: u8 {
        /// Top edge.
        const TOP = 1 << 0;
        /// Bottom edge.
        const BOTTOM = 1 << 1;
        /// Left edge.
        const LEFT = 1 << 2;
        /// Right edge.
        const RIGHT = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Mode {
    Move {
        start_origin: Point,
    },
    Resize {
        edges: ResizeEdges,
        start_size: Size,
    },
}

/// Moves or resizes a toplevel with the pointer until the last button is
/// released. The window gets no pointer events meanwhile.
#[derive(Debug)]
pub struct MoveResizeGrab {
    surface: SurfaceId,
    start_pointer: Point,
    mode: Mode,
}

impl MoveResizeGrab {
    /// The window being moved or resized.
    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }
}

impl Grab for MoveResizeGrab {
    fn capabilities(&self) -> GrabCapabilities {
        GrabCapabilities::MOTION | GrabCapabilities::BUTTON
    }

    fn motion(&mut self, cx: &mut GrabContext<'_>, event: &MotionEvent) {
        let delta = event.location - self.start_pointer;
        match self.mode {
            Mode::Move { start_origin } => {
                if let Err(err) = cx
                    .compositor
                    .set_surface_position(self.surface, start_origin + delta)
                {
                    trace!(%err, "interactive move target gone");
                }
            }
            Mode::Resize { edges, start_size } => {
                let mut width = start_size.width;
                let mut height = start_size.height;
                if edges.contains(ResizeEdges::LEFT) {
                    width -= delta.x;
                } else if edges.contains(ResizeEdges::RIGHT) {
                    width += delta.x;
                }
                if edges.contains(ResizeEdges::TOP) {
                    height -= delta.y;
                } else if edges.contains(ResizeEdges::BOTTOM) {
                    height += delta.y;
                }
                cx.compositor.signals.push(Signal::ResizeRequested {
                    surface: self.surface,
                    edges,
                    size: Size::new(width.max(1.0), height.max(1.0)),
                });
            }
        }
    }

    fn button(&mut self, cx: &mut GrabContext<'_>, event: &ButtonEvent) {
        if event.state == ButtonState::Released
            && cx.seat().is_some_and(|s| s.pressed_buttons().is_empty())
        {
            debug!(seat = ?cx.seat, surface = ?self.surface, "interactive move/resize ended");
            cx.pop();
        }
    }

    fn references(&self, surface: SurfaceId) -> bool {
        surface == self.surface
    }
}

impl Compositor {
    /// Starts moving a toplevel with the pointer, authorized by the serial
    /// of a button press still held.
    ///
    /// Returns `Ok(None)` for a stale serial or when no button is held.
    pub fn start_interactive_move(
        &mut self,
        seat: SeatId,
        surface: SurfaceId,
        serial: u32,
    ) -> Result<Option<GrabId>, CoreError> {
        let start_origin = self.surface_ref(surface)?.base;
        self.start_move_resize(seat, surface, serial, Mode::Move { start_origin })
    }

    /// Starts resizing a toplevel by `edges` with the pointer. The shell is
    /// asked for new sizes through [`Signal::ResizeRequested`].
    ///
    /// Returns `Ok(None)` for a stale serial, when no button is held or
    /// when `edges` is empty.
    pub fn start_interactive_resize(
        &mut self,
        seat: SeatId,
        surface: SurfaceId,
        edges: ResizeEdges,
        serial: u32,
    ) -> Result<Option<GrabId>, CoreError> {
        let start_size = self.surface_ref(surface)?.geometry.size();
        if edges.is_empty() {
            debug!(?seat, ?surface, "resize without edges refused");
            return Ok(None);
        }
        self.start_move_resize(seat, surface, serial, Mode::Resize { edges, start_size })
    }

    fn start_move_resize(
        &mut self,
        seat: SeatId,
        surface: SurfaceId,
        serial: u32,
        mode: Mode,
    ) -> Result<Option<GrabId>, CoreError> {
        let s = self.seat_ref(seat)?;
        let start_pointer = s.pointer_location;
        let idle = s.pressed_buttons.is_empty();
        if self.surface_ref(surface)?.role.kind() != Some(RoleKind::Toplevel) {
            return Err(CoreError::WrongRole {
                surface,
                expected: RoleKind::Toplevel,
            });
        }
        if idle || !self.valid_serial(seat, DeviceClass::Pointer, serial) {
            debug!(?seat, ?surface, serial, idle, "interactive move/resize refused");
            return Ok(None);
        }
        self.next_grab += 1;
        let id = GrabId(self.next_grab);
        let grab = MoveResizeGrab {
            surface,
            start_pointer,
            mode,
        };
        self.install_grab(
            seat,
            id,
            DeviceClasses::POINTER,
            self.config.grabs.move_resize,
            Box::new(grab),
        );
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Point, Size, Vec2};

    use super::ResizeEdges;
    use crate::buffer::{Buffer, BufferId};
    use crate::seat::{ButtonState, DeviceClass, PointerMotion, SeatId};
    use crate::signal::{ClientEvent, Signal};
    use crate::surface::{ClientId, RoleKind, SurfaceId};
    use crate::test_support::toplevel;
    use crate::{Compositor, CoreError};

    const BTN_LEFT: u32 = 0x110;

    /// A 50x50 window at (10, 10) with the left button held over it.
    fn setup() -> (Compositor, SeatId, SurfaceId) {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let w = toplevel(&mut c, ClientId(1), Buffer::argb(BufferId(1), 50, 50), Point::new(10.0, 10.0));
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(20.0, 20.0)), 0);
        c.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 1);
        c.take_client_events();
        c.take_signals();
        (c, seat, w)
    }

    fn resize_requests(signals: Vec<Signal>) -> Vec<Size> {
        signals
            .into_iter()
            .filter_map(|s| match s {
                Signal::ResizeRequested { size, .. } => Some(size),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn move_follows_pointer_until_release() {
        let (mut c, seat, w) = setup();
        let grab = c.start_interactive_move(seat, w, 1).unwrap();
        assert!(grab.is_some());

        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(30.0, 5.0)), 2);
        assert_eq!(c.surface(w).unwrap().origin(), Point::new(40.0, 15.0));
        assert!(
            !c.take_client_events()
                .iter()
                .any(|e| matches!(e, ClientEvent::PointerMotion { .. })),
            "the window sees no motion while moved"
        );

        c.pointer_button(seat, BTN_LEFT, ButtonState::Released, 3);
        assert_eq!(
            c.grab_head(seat, DeviceClass::Pointer),
            Some(c.seat(seat).unwrap().default_grab())
        );
        assert_eq!(c.seat(seat).unwrap().focus(DeviceClass::Pointer).focus(), Some(w));
    }

    #[test]
    fn resize_requests_sizes() {
        let (mut c, seat, w) = setup();
        c.start_interactive_resize(seat, w, ResizeEdges::RIGHT | ResizeEdges::BOTTOM, 1)
            .unwrap();
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(10.0, 20.0)), 2);
        assert_eq!(resize_requests(c.take_signals()), vec![Size::new(60.0, 70.0)]);
        c.pointer_button(seat, BTN_LEFT, ButtonState::Released, 3);

        c.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 4);
        c.start_interactive_resize(seat, w, ResizeEdges::LEFT, 3).unwrap();
        c.pointer_motion(seat, PointerMotion::Relative(Vec2::new(100.0, 0.0)), 5);
        assert_eq!(
            resize_requests(c.take_signals()),
            vec![Size::new(1.0, 50.0)],
            "sizes never collapse below one unit"
        );
    }

    #[test]
    fn refused_without_held_button_or_fresh_serial() {
        let (mut c, seat, w) = setup();
        assert_eq!(c.start_interactive_move(seat, w, 0), Ok(None));
        c.pointer_button(seat, BTN_LEFT, ButtonState::Released, 2);
        assert_eq!(c.start_interactive_move(seat, w, 2), Ok(None));
        assert_eq!(
            c.start_interactive_resize(seat, w, ResizeEdges::empty(), 2),
            Ok(None)
        );

        let cursor = c.create_surface(ClientId(1));
        assert_eq!(
            c.start_interactive_move(seat, cursor, 2),
            Err(CoreError::WrongRole {
                surface: cursor,
                expected: RoleKind::Toplevel
            })
        );
    }

    #[test]
    fn destroying_window_ends_move() {
        let (mut c, seat, w) = setup();
        let grab = c.start_interactive_move(seat, w, 1).unwrap().unwrap();
        c.destroy_surface(w).unwrap();
        assert!(c.seat(seat).unwrap().grab_stack(DeviceClass::Pointer).nodes().iter().all(|n| n.grab != grab));
    }
}
