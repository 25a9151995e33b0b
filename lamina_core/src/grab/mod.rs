// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Modal input interception.
//!
//! Every device class of a seat has a [`GrabStack`]. Its head receives all
//! events of that class; below it, at `i32::MIN`, sits the seat's permanent
//! [`DefaultGrab`], which implements ordinary focus-following delivery.
//!
//! A grab is a [`Grab`] trait object registered once per seat and linked
//! into the stacks of the classes it takes. It advertises a
//! [`GrabCapabilities`] set; events for capabilities it lacks are dropped,
//! never passed to the next grab down.
//!
//! ```text
//!   pointer stack        keyboard stack       touch stack
//!   ┌────────────┐       ┌────────────┐       ┌────────────┐
//!   │ popup  300 │ head  │ default MIN│ head  │ popup  300 │ head
//!   │ move   100 │       └────────────┘       │ default MIN│
//!   │ default MIN│                            └────────────┘
//!   └────────────┘
//! ```
//!
//! Lifecycle:
//!
//! - [`Compositor::push_grab`] inserts a node per class. Where the head
//!   changes, the superseded head is cancelled first, then the new head is
//!   told [`GrabAction::Push`].
//! - [`Compositor::pop_grab`] unlinks every node. Where the head changes,
//!   the new head is told [`GrabAction::Pop`] so it can resynchronize with
//!   the current focus.
//! - [`Compositor::cancel_grab`] cancels, then pops. Destroying a surface a
//!   grab [references](Grab::references) cancels that grab.
//!
//! While a grab method runs, the grab object is taken out of its seat slot
//! and the method receives `&mut Compositor` through a [`GrabContext`]. A
//! grab that pops itself is dropped when the method returns.

mod default;
mod dnd;
mod lock;
mod move_resize;
mod popup;
mod stack;

use core::fmt;

use bitflags::bitflags;
use kurbo::Point;
use tracing::{debug, trace};

use crate::Compositor;
use crate::error::CoreError;
use crate::seat::{
    Axis, AxisSource, ButtonState, DeviceClass, DeviceClasses, KeyState, Seat, SeatId,
};
use crate::signal::{ClientEvent, Signal};
use crate::surface::SurfaceId;

pub use default::DefaultGrab;
pub use dnd::DragGrab;
pub use lock::InputLockGrab;
pub use move_resize::{MoveResizeGrab, ResizeEdges};
pub use popup::PopupGrab;
pub(crate) use popup::PopupChain;
pub use stack::{GrabNode, GrabStack};

/// A handle to a grab registered on a seat.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrabId(pub(crate) u64);

impl fmt::Debug for GrabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrabId({})", self.0)
    }
}

bitflags! {
    /// Events a grab handles.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct GrabCapabilities: u8 {
        /// Focus offers ([`Grab::enter`]).
        const ENTER = 1 << 0;
        /// Pointer and touch motion.
        const MOTION = 1 << 1;
        /// Buttons, keys, modifiers, touch down and up.
        const BUTTON = 1 << 2;
        /// Scrolling.
        const AXIS = 1 << 3;
        /// Frame boundaries.
        const FRAME = 1 << 4;
        /// Cancellation by a grab taking over.
        const CANCEL = 1 << 5;
    }
}

/// Stack changes reported to the grab at the head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrabAction {
    /// The grab was pushed and became the head.
    Push,
    /// The grab above was popped and this grab is the head again.
    Pop,
}

/// Pointer motion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionEvent {
    /// Event time in milliseconds.
    pub time: u32,
    /// Pointer position in global space.
    pub location: Point,
    /// The surface under the pointer and the position in its local space.
    pub target: Option<(SurfaceId, Point)>,
}

/// Pointer button press or release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonEvent {
    /// Event time in milliseconds.
    pub time: u32,
    /// Serial issued for the event.
    pub serial: u32,
    /// Button code.
    pub button: u32,
    /// New state.
    pub state: ButtonState,
}

/// Key press or release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    /// Event time in milliseconds.
    pub time: u32,
    /// Serial issued for the event.
    pub serial: u32,
    /// Key code.
    pub key: u32,
    /// New state.
    pub state: KeyState,
}

/// Scrolling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisEvent {
    /// Event time in milliseconds.
    pub time: u32,
    /// Scroll axis.
    pub axis: Axis,
    /// Scroll distance in surface units.
    pub value: f64,
    /// Wheel clicks, for notched wheels.
    pub discrete: Option<i32>,
    /// Device kind.
    pub source: AxisSource,
}

/// Touch point events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TouchEvent {
    /// A finger touched down.
    Down {
        /// Event time in milliseconds.
        time: u32,
        /// Serial issued for the event.
        serial: u32,
        /// Touch point.
        id: i32,
        /// Position in global space.
        location: Point,
        /// The surface under the point and the position in its local space.
        target: Option<(SurfaceId, Point)>,
    },
    /// A finger lifted.
    Up {
        /// Event time in milliseconds.
        time: u32,
        /// Serial of the touch class.
        serial: u32,
        /// Touch point.
        id: i32,
    },
    /// A finger moved.
    Motion {
        /// Event time in milliseconds.
        time: u32,
        /// Touch point.
        id: i32,
        /// Position in global space.
        location: Point,
    },
}

/// An input grab.
///
/// Every method has a no-op default; only the events named in
/// [`capabilities`](Self::capabilities) are delivered.
pub trait Grab: fmt::Debug {
    /// The events this grab handles.
    fn capabilities(&self) -> GrabCapabilities;

    /// The stack of `class` changed with this grab at its head.
    fn action(&mut self, _cx: &mut GrabContext<'_>, _class: DeviceClass, _action: GrabAction) {}

    /// A new focus target for `class`, after picking or an explicit request.
    fn enter(
        &mut self,
        _cx: &mut GrabContext<'_>,
        _class: DeviceClass,
        _target: Option<(SurfaceId, Point)>,
    ) {
    }

    /// Pointer motion.
    fn motion(&mut self, _cx: &mut GrabContext<'_>, _event: &MotionEvent) {}

    /// Pointer button.
    fn button(&mut self, _cx: &mut GrabContext<'_>, _event: &ButtonEvent) {}

    /// Key press or release.
    fn key(&mut self, _cx: &mut GrabContext<'_>, _event: &KeyEvent) {}

    /// New modifier state.
    fn modifiers(&mut self, _cx: &mut GrabContext<'_>, _modifiers: u32) {}

    /// Scrolling.
    fn axis(&mut self, _cx: &mut GrabContext<'_>, _event: &AxisEvent) {}

    /// Touch point event.
    fn touch(&mut self, _cx: &mut GrabContext<'_>, _event: &TouchEvent) {}

    /// End of a group of events of `class`.
    fn frame(&mut self, _cx: &mut GrabContext<'_>, _class: DeviceClass) {}

    /// A higher-priority grab took over `class`, or the grab is being
    /// cancelled.
    fn cancel(&mut self, _cx: &mut GrabContext<'_>, _class: DeviceClass) {}

    /// Whether the grab depends on `surface`. Destroying such a surface
    /// cancels the grab.
    fn references(&self, _surface: SurfaceId) -> bool {
        false
    }
}

/// The view of the compositor a running grab gets.
#[derive(Debug)]
pub struct GrabContext<'a> {
    /// The compositor.
    pub compositor: &'a mut Compositor,
    /// The seat the grab belongs to.
    pub seat: SeatId,
    /// The running grab.
    pub grab: GrabId,
}

impl GrabContext<'_> {
    /// The seat state.
    #[must_use]
    pub fn seat(&self) -> Option<&Seat> {
        self.compositor.seat(self.seat)
    }

    /// Pointer position in global space.
    #[must_use]
    pub fn pointer_location(&self) -> Point {
        self.seat().map_or(Point::ORIGIN, Seat::pointer_location)
    }

    /// The focused surface of `class`, if still alive.
    #[must_use]
    pub fn focus(&self, class: DeviceClass) -> Option<SurfaceId> {
        self.seat()
            .and_then(|s| s.focus(class).focus())
            .filter(|f| self.compositor.surfaces.is_alive(*f))
    }

    /// The last serial issued for `class`.
    #[must_use]
    pub fn serial(&self, class: DeviceClass) -> u32 {
        self.seat().map_or(0, |s| s.focus(class).serial())
    }

    /// Picks the surface under `point`.
    #[must_use]
    pub fn pick(&self, point: Point) -> Option<(SurfaceId, Point)> {
        self.compositor.pick(point)
    }

    /// Moves pointer focus, sending enter and leave or motion.
    pub fn set_pointer_focus(&mut self, target: Option<(SurfaceId, Point)>, time: u32) {
        self.compositor.pointer_focus_to(self.seat, target, time);
    }

    /// Moves keyboard focus, sending enter and leave.
    pub fn set_keyboard_focus(&mut self, target: Option<SurfaceId>) {
        self.compositor.keyboard_focus_to(self.seat, target);
    }

    /// Queues a client event. Events for destroyed surfaces are dropped.
    pub fn send(&mut self, event: ClientEvent) {
        self.compositor.send(event);
    }

    /// Pops the running grab. It is dropped once the current method returns.
    pub fn pop(&mut self) {
        self.compositor.pop_grab(self.seat, self.grab);
    }
}

/// A grab registered on a seat.
#[derive(Debug)]
pub(crate) struct GrabSlot {
    pub(crate) id: GrabId,
    /// `None` while one of the grab's methods runs.
    pub(crate) grab: Option<Box<dyn Grab>>,
    pub(crate) classes: DeviceClasses,
}

impl Compositor {
    /// Pushes `grab` onto the stacks of `classes`.
    ///
    /// `priority` is clamped above `i32::MIN`, which only the default grab
    /// holds.
    pub fn push_grab(
        &mut self,
        seat: SeatId,
        classes: DeviceClasses,
        priority: i32,
        grab: Box<dyn Grab>,
    ) -> Result<GrabId, CoreError> {
        self.seat_ref(seat)?;
        self.next_grab += 1;
        let id = GrabId(self.next_grab);
        self.install_grab(seat, id, classes, priority.max(i32::MIN + 1), grab);
        Ok(id)
    }

    pub(crate) fn install_grab(
        &mut self,
        seat: SeatId,
        id: GrabId,
        classes: DeviceClasses,
        priority: i32,
        grab: Box<dyn Grab>,
    ) {
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return;
        };
        debug!(?seat, grab = ?id, ?classes, priority, kind = ?grab, "grab pushed");
        s.grabs.push(GrabSlot {
            id,
            grab: Some(grab),
            classes,
        });
        self.signals.push(Signal::SeatGrabPushed {
            seat,
            grab: id,
            classes,
        });

        for class in classes.classes() {
            let Some(s) = self.seats.get_mut(seat.index()) else {
                return;
            };
            // An earlier cancel or push action may already have popped it.
            if s.slot(id).is_none() {
                return;
            }
            let stack = &mut s.stacks[class.index()];
            let old_head = stack.head();
            if !stack.push(id, priority) {
                continue;
            }
            if let Some(old) = old_head {
                if self.has_capability(seat, old, GrabCapabilities::CANCEL) {
                    self.with_grab(seat, old, |grab, cx| grab.cancel(cx, class));
                }
            }
            self.with_grab(seat, id, |grab, cx| grab.action(cx, class, GrabAction::Push));
        }
    }

    /// Removes a grab from every stack it is in.
    ///
    /// Returns `false` for the default grab, which cannot be popped, and for
    /// unknown grabs.
    pub fn pop_grab(&mut self, seat: SeatId, grab: GrabId) -> bool {
        let Some(s) = self.seats.get_mut(seat.index()) else {
            return false;
        };
        if grab == s.default_grab {
            return false;
        }
        let Some(at) = s.grabs.iter().position(|g| g.id == grab) else {
            return false;
        };
        s.grabs.remove(at);

        let mut new_heads = Vec::new();
        for class in DeviceClass::ALL {
            let stack = &mut s.stacks[class.index()];
            if stack.remove(grab) == Some(true) {
                if let Some(head) = stack.head() {
                    new_heads.push((class, head));
                }
            }
        }
        if s.lock == Some(grab) {
            s.lock = None;
        }
        if s.popups.as_ref().is_some_and(|p| p.grab == grab) {
            s.popups = None;
        }
        if s.drag.is_some_and(|(g, _)| g == grab) {
            s.drag = None;
        }
        self.signals.push(Signal::SeatGrabPopped { seat, grab });
        debug!(?seat, ?grab, "grab popped");

        for (class, head) in new_heads {
            self.with_grab(seat, head, |g, cx| g.action(cx, class, GrabAction::Pop));
        }
        true
    }

    /// Cancels a grab in every class it occupies, then pops it.
    pub fn cancel_grab(&mut self, seat: SeatId, grab: GrabId) -> bool {
        let Some(s) = self.seats.get(seat.index()) else {
            return false;
        };
        if grab == s.default_grab {
            return false;
        }
        let Some(classes) = s.slot(grab).map(|slot| slot.classes) else {
            return false;
        };
        if self.has_capability(seat, grab, GrabCapabilities::CANCEL) {
            for class in classes.classes() {
                self.with_grab(seat, grab, |g, cx| g.cancel(cx, class));
            }
        }
        self.pop_grab(seat, grab);
        true
    }

    /// The grab at the head of a class's stack.
    #[must_use]
    pub fn grab_head(&self, seat: SeatId, class: DeviceClass) -> Option<GrabId> {
        self.seat(seat)?.stacks[class.index()].head()
    }

    fn has_capability(&self, seat: SeatId, grab: GrabId, capability: GrabCapabilities) -> bool {
        self.seat(seat)
            .and_then(|s| s.slot(grab))
            .and_then(|slot| slot.grab.as_ref())
            .is_some_and(|g| g.capabilities().contains(capability))
    }

    /// Runs `f` on a grab taken out of its slot, putting it back afterwards
    /// unless it was popped meanwhile.
    pub(crate) fn with_grab<R>(
        &mut self,
        seat: SeatId,
        grab: GrabId,
        f: impl FnOnce(&mut dyn Grab, &mut GrabContext<'_>) -> R,
    ) -> Option<R> {
        let Some(mut boxed) = self
            .seats
            .get_mut(seat.index())
            .and_then(|s| s.slot_mut(grab))
            .and_then(|slot| slot.grab.take())
        else {
            trace!(?seat, ?grab, "grab busy or gone");
            return None;
        };
        let out = {
            let mut cx = GrabContext {
                compositor: self,
                seat,
                grab,
            };
            f(boxed.as_mut(), &mut cx)
        };
        if let Some(slot) = self
            .seats
            .get_mut(seat.index())
            .and_then(|s| s.slot_mut(grab))
        {
            slot.grab = Some(boxed);
        }
        Some(out)
    }

    /// Hands an event to the head grab of `class` if it has `capability`.
    pub(crate) fn dispatch(
        &mut self,
        seat: SeatId,
        class: DeviceClass,
        capability: GrabCapabilities,
        f: impl FnOnce(&mut dyn Grab, &mut GrabContext<'_>),
    ) {
        let Some(head) = self.grab_head(seat, class) else {
            return;
        };
        if !self.has_capability(seat, head, capability) {
            trace!(?seat, ?class, grab = ?head, ?capability, "not handled by head grab");
            return;
        }
        self.with_grab(seat, head, f);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Records every callback it receives.
    #[derive(Debug)]
    struct Probe {
        name: &'static str,
        caps: GrabCapabilities,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Probe {
        fn boxed(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Box<Self> {
            Box::new(Self {
                name,
                caps: GrabCapabilities::all(),
                log: log.clone(),
            })
        }
    }

    impl Grab for Probe {
        fn capabilities(&self) -> GrabCapabilities {
            self.caps
        }

        fn action(&mut self, _: &mut GrabContext<'_>, class: DeviceClass, action: GrabAction) {
            self.log
                .borrow_mut()
                .push(format!("{} {action:?} {class:?}", self.name));
        }

        fn cancel(&mut self, _: &mut GrabContext<'_>, class: DeviceClass) {
            self.log
                .borrow_mut()
                .push(format!("{} cancel {class:?}", self.name));
        }

        fn button(&mut self, cx: &mut GrabContext<'_>, _: &ButtonEvent) {
            self.log.borrow_mut().push(format!("{} button", self.name));
            if self.name == "once" {
                cx.pop();
            }
        }
    }

    #[test]
    fn push_pop_ordering() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = c
            .push_grab(seat, DeviceClasses::POINTER, 10, Probe::boxed("a", &log))
            .unwrap();
        let b = c
            .push_grab(seat, DeviceClasses::POINTER, 20, Probe::boxed("b", &log))
            .unwrap();
        assert_eq!(c.grab_head(seat, DeviceClass::Pointer), Some(b));

        log.borrow_mut().clear();
        assert!(c.pop_grab(seat, b));
        assert_eq!(c.grab_head(seat, DeviceClass::Pointer), Some(a));
        assert_eq!(*log.borrow(), vec!["a Pop Pointer".to_owned()]);
    }

    #[test]
    fn superseded_head_is_cancelled_before_push() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let log = Rc::new(RefCell::new(Vec::new()));
        c.push_grab(seat, DeviceClasses::POINTER, 10, Probe::boxed("a", &log))
            .unwrap();
        c.push_grab(seat, DeviceClasses::POINTER, 20, Probe::boxed("b", &log))
            .unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "a Push Pointer".to_owned(),
                "a cancel Pointer".to_owned(),
                "b Push Pointer".to_owned()
            ]
        );
    }

    #[test]
    fn lower_priority_push_waits() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let log = Rc::new(RefCell::new(Vec::new()));
        let high = c
            .push_grab(seat, DeviceClasses::POINTER, 20, Probe::boxed("high", &log))
            .unwrap();
        log.borrow_mut().clear();
        let low = c
            .push_grab(seat, DeviceClasses::POINTER, 10, Probe::boxed("low", &log))
            .unwrap();
        assert!(log.borrow().is_empty(), "nothing changed at the head");
        assert_eq!(c.grab_head(seat, DeviceClass::Pointer), Some(high));
        c.pop_grab(seat, high);
        assert_eq!(c.grab_head(seat, DeviceClass::Pointer), Some(low));
        assert_eq!(*log.borrow(), vec!["low Pop Pointer".to_owned()]);
    }

    #[test]
    fn default_grab_is_permanent() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let default = c.seat(seat).unwrap().default_grab();
        assert!(!c.pop_grab(seat, default));
        assert!(!c.cancel_grab(seat, default));

        let log = Rc::new(RefCell::new(Vec::new()));
        let g = c
            .push_grab(seat, DeviceClasses::all(), i32::MIN, Probe::boxed("g", &log))
            .unwrap();
        for class in DeviceClass::ALL {
            assert_eq!(c.grab_head(seat, class), Some(g), "clamped above the default");
            let nodes = c.seat(seat).unwrap().grab_stack(class).nodes().to_vec();
            assert_eq!(nodes.last().map(|n| n.grab), Some(default));
        }
    }

    #[test]
    fn grab_may_pop_itself() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let log = Rc::new(RefCell::new(Vec::new()));
        let once = c
            .push_grab(seat, DeviceClasses::POINTER, 5, Probe::boxed("once", &log))
            .unwrap();
        c.pointer_button(seat, 0x110, ButtonState::Pressed, 1);
        assert_ne!(c.grab_head(seat, DeviceClass::Pointer), Some(once));
        assert!(c.seat(seat).unwrap().slot(once).is_none());
        assert!(c.take_signals().contains(&Signal::SeatGrabPopped { seat, grab: once }));
    }

    #[test]
    fn missing_capability_drops_event() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut probe = Probe::boxed("mute", &log);
        probe.caps = GrabCapabilities::MOTION;
        c.push_grab(seat, DeviceClasses::POINTER, 5, probe).unwrap();
        log.borrow_mut().clear();
        c.pointer_button(seat, 0x110, ButtonState::Pressed, 1);
        assert!(log.borrow().is_empty());
        assert_eq!(c.seat(seat).unwrap().pressed_buttons(), &[0x110], "state still tracked");
    }

    #[test]
    fn cancel_grab_cancels_then_pops() {
        let mut c = Compositor::default();
        let seat = c.create_seat("seat0");
        let log = Rc::new(RefCell::new(Vec::new()));
        let g = c
            .push_grab(
                seat,
                DeviceClasses::POINTER | DeviceClasses::KEYBOARD,
                5,
                Probe::boxed("g", &log),
            )
            .unwrap();
        log.borrow_mut().clear();
        assert!(c.cancel_grab(seat, g));
        assert_eq!(
            *log.borrow(),
            vec!["g cancel Pointer".to_owned(), "g cancel Keyboard".to_owned()]
        );
        assert!(!c.pop_grab(seat, g));
    }
}
