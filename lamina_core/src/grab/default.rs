// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The permanent pass-through grab.

use kurbo::Point;

use crate::seat::{ButtonState, DeviceClass};
use crate::signal::ClientEvent;
use crate::surface::SurfaceId;

use super::{
    AxisEvent, ButtonEvent, Grab, GrabAction, GrabCapabilities, GrabContext, KeyEvent,
    MotionEvent, TouchEvent,
};

/// Ordinary delivery: pointer focus follows the pointer, keyboard focus is
/// set explicitly or by clicking, and touch points go to the surface they
/// went down on.
///
/// When another grab takes the keyboard, the focus is left and remembered;
/// it is restored once that grab is popped.
#[derive(Debug, Default)]
pub struct DefaultGrab {
    saved_keyboard_focus: Option<SurfaceId>,
}

impl Grab for DefaultGrab {
    fn capabilities(&self) -> GrabCapabilities {
        GrabCapabilities::all()
    }

    fn action(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass, action: GrabAction) {
        if action != GrabAction::Pop {
            return;
        }
        match class {
            DeviceClass::Pointer => {
                let target = cx.pick(cx.pointer_location());
                cx.set_pointer_focus(target, 0);
            }
            DeviceClass::Keyboard => {
                if let Some(saved) = self.saved_keyboard_focus.take() {
                    cx.set_keyboard_focus(Some(saved));
                }
            }
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
            DeviceClass::Pointer => cx.set_pointer_focus(target, 0),
            DeviceClass::Keyboard => cx.set_keyboard_focus(target.map(|(s, _)| s)),
            DeviceClass::Touch => {}
        }
    }

    fn motion(&mut self, cx: &mut GrabContext<'_>, event: &MotionEvent) {
        cx.set_pointer_focus(event.target, event.time);
    }

    fn button(&mut self, cx: &mut GrabContext<'_>, event: &ButtonEvent) {
        let Some(surface) = cx.focus(DeviceClass::Pointer) else {
            return;
        };
        cx.send(ClientEvent::PointerButton {
            seat: cx.seat,
            surface,
            serial: event.serial,
            time: event.time,
            button: event.button,
            state: event.state,
        });
        if event.state == ButtonState::Pressed && cx.compositor.config.input.click_to_focus {
            let root = cx.compositor.root_of(surface);
            let shell = cx
                .compositor
                .surface(root)
                .is_some_and(|s| s.role().is_mapped());
            if shell {
                cx.set_keyboard_focus(Some(root));
            }
        }
    }

    fn key(&mut self, cx: &mut GrabContext<'_>, event: &KeyEvent) {
        if let Some(surface) = cx.focus(DeviceClass::Keyboard) {
            cx.send(ClientEvent::Key {
                seat: cx.seat,
                surface,
                serial: event.serial,
                time: event.time,
                key: event.key,
                state: event.state,
            });
        }
    }

    fn modifiers(&mut self, cx: &mut GrabContext<'_>, modifiers: u32) {
        if let Some(surface) = cx.focus(DeviceClass::Keyboard) {
            cx.send(ClientEvent::Modifiers {
                seat: cx.seat,
                surface,
                serial: cx.serial(DeviceClass::Keyboard),
                modifiers,
            });
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
            } => {
                if let Some((surface, location)) = target {
                    cx.send(ClientEvent::TouchDown {
                        seat: cx.seat,
                        surface,
                        serial,
                        time,
                        id,
                        location,
                    });
                }
            }
            TouchEvent::Up { time, serial, id } => {
                if let Some(surface) = cx.seat().and_then(|s| s.touch_target(id)) {
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
                let Some(surface) = cx.seat().and_then(|s| s.touch_target(id)) else {
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
        match class {
            DeviceClass::Pointer => {
                if let Some(surface) = cx.focus(DeviceClass::Pointer) {
                    cx.send(ClientEvent::PointerFrame {
                        seat: cx.seat,
                        surface,
                    });
                }
            }
            DeviceClass::Touch => {
                for surface in touched_surfaces(cx) {
                    cx.send(ClientEvent::TouchFrame {
                        seat: cx.seat,
                        surface,
                    });
                }
            }
            DeviceClass::Keyboard => {}
        }
    }

    fn cancel(&mut self, cx: &mut GrabContext<'_>, class: DeviceClass) {
        match class {
            DeviceClass::Pointer => cx.set_pointer_focus(None, 0),
            DeviceClass::Keyboard => {
                self.saved_keyboard_focus = cx.focus(DeviceClass::Keyboard);
                cx.set_keyboard_focus(None);
            }
            DeviceClass::Touch => {
                for surface in touched_surfaces(cx) {
                    cx.send(ClientEvent::TouchCancel {
                        seat: cx.seat,
                        surface,
                    });
                }
                if let Some(s) = cx.compositor.seats.get_mut(cx.seat.index()) {
                    s.touch_points.clear();
                }
            }
        }
    }
}

fn touched_surfaces(cx: &GrabContext<'_>) -> Vec<SurfaceId> {
    let mut surfaces: Vec<SurfaceId> = cx
        .seat()
        .map(|s| s.touch_points.iter().map(|t| t.surface).collect())
        .unwrap_or_default();
    surfaces.sort();
    surfaces.dedup();
    surfaces
}
