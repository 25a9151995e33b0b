// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Seats: input device groups with focus, serials and grab stacks.
//!
//! A seat bundles a pointer, a keyboard and a touchscreen. For each
//! [`DeviceClass`] it keeps a [`FocusTracker`] (focused surface and serial
//! counter) and a [`GrabStack`](crate::grab::GrabStack) whose head receives
//! every device event of that class.
//!
//! Device events enter through the methods in [`input`]; they update seat
//! state (pointer location, pressed buttons and keys, serials) and are then
//! handed to the head grab. Focus changes, enter/leave events and picking are
//! in [`focus`] and [`pick`].

pub mod focus;
pub mod input;
pub mod pick;

use core::fmt;

use bitflags::bitflags;
use kurbo::{Point, Vec2};
use tracing::debug;

use crate::Compositor;
use crate::error::CoreError;
use crate::grab::{DefaultGrab, GrabId, GrabSlot, GrabStack, PopupChain};
use crate::surface::SurfaceId;

pub use focus::FocusTracker;
pub use input::PointerMotion;

/// A handle to a seat.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeatId(pub(crate) u32);

impl SeatId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeatId({})", self.0)
    }
}

/// A class of input device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Mouse or touchpad.
    Pointer,
    /// Keyboard.
    Keyboard,
    /// Touchscreen.
    Touch,
}

impl DeviceClass {
    /// All classes.
    pub const ALL: [Self; 3] = [Self::Pointer, Self::Keyboard, Self::Touch];

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Pointer => 0,
            Self::Keyboard => 1,
            Self::Touch => 2,
        }
    }
}

bitflags! {
    /// A set of device classes.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DeviceClasses: u8 {
        /// [`DeviceClass::Pointer`].
        const POINTER = 1 << 0;
        /// [`DeviceClass::Keyboard`].
        const KEYBOARD = 1 << 1;
        /// [`DeviceClass::Touch`].
        const TOUCH = 1 << 2;
    }
}

impl From<DeviceClass> for DeviceClasses {
    fn from(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Pointer => Self::POINTER,
            DeviceClass::Keyboard => Self::KEYBOARD,
            DeviceClass::Touch => Self::TOUCH,
        }
    }
}

impl DeviceClasses {
    /// The classes in the set.
    pub fn classes(self) -> impl Iterator<Item = DeviceClass> {
        DeviceClass::ALL
            .into_iter()
            .filter(move |c| self.contains(Self::from(*c)))
    }
}

/// Pointer button state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ButtonState {
    /// Button went up.
    Released,
    /// Button went down.
    Pressed,
}

/// Key state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// Key went up.
    Released,
    /// Key went down.
    Pressed,
}

/// Scroll axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Up and down.
    Vertical,
    /// Left and right.
    Horizontal,
}

/// Source of a scroll event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisSource {
    /// Notched wheel.
    Wheel,
    /// Finger on a touchpad.
    Finger,
    /// Continuous device such as a trackball.
    Continuous,
    /// Tilting wheel.
    WheelTilt,
}

/// A touch point and the surface it was bound to at touch-down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TouchPoint {
    pub(crate) id: i32,
    pub(crate) surface: SurfaceId,
}

/// A group of input devices.
#[derive(Debug)]
pub struct Seat {
    pub(crate) id: SeatId,
    pub(crate) name: String,

    // -- Per device class --
    pub(crate) focus: [FocusTracker; 3],
    pub(crate) stacks: [GrabStack; 3],
    pub(crate) grabs: Vec<GrabSlot>,
    pub(crate) default_grab: GrabId,

    // -- Device state --
    pub(crate) pointer_location: Point,
    pub(crate) pressed_buttons: Vec<u32>,
    pub(crate) pressed_keys: Vec<u32>,
    pub(crate) modifiers: u32,
    pub(crate) touch_points: Vec<TouchPoint>,
    pub(crate) cursor: Option<(SurfaceId, Vec2)>,

    // -- Stock grab bookkeeping --
    pub(crate) popups: Option<PopupChain>,
    pub(crate) lock: Option<GrabId>,
    pub(crate) drag: Option<(GrabId, Option<SurfaceId>)>,
}

impl Seat {
    /// The seat handle.
    #[must_use]
    pub fn id(&self) -> SeatId {
        self.id
    }

    /// The seat name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Focus tracker of one device class.
    #[must_use]
    pub fn focus(&self, class: DeviceClass) -> &FocusTracker {
        &self.focus[class.index()]
    }

    /// Grab stack of one device class.
    #[must_use]
    pub fn grab_stack(&self, class: DeviceClass) -> &GrabStack {
        &self.stacks[class.index()]
    }

    /// The permanent pass-through grab.
    #[must_use]
    pub fn default_grab(&self) -> GrabId {
        self.default_grab
    }

    /// Pointer position in global space.
    #[must_use]
    pub fn pointer_location(&self) -> Point {
        self.pointer_location
    }

    /// Pointer buttons currently held.
    #[must_use]
    pub fn pressed_buttons(&self) -> &[u32] {
        &self.pressed_buttons
    }

    /// Keys currently held.
    #[must_use]
    pub fn pressed_keys(&self) -> &[u32] {
        &self.pressed_keys
    }

    /// Last modifier bitmask.
    #[must_use]
    pub fn modifiers(&self) -> u32 {
        self.modifiers
    }

    /// Surface a touch point is bound to.
    #[must_use]
    pub fn touch_target(&self, id: i32) -> Option<SurfaceId> {
        self.touch_points
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.surface)
    }

    /// The cursor surface and its hot spot.
    #[must_use]
    pub fn cursor(&self) -> Option<(SurfaceId, Vec2)> {
        self.cursor
    }

    /// Surfaces of the open popup chain, outermost first.
    #[must_use]
    pub fn popup_chain(&self) -> &[SurfaceId] {
        self.popups.as_ref().map_or(&[], |p| p.surfaces.as_slice())
    }

    /// Whether a drag-and-drop operation is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The icon following the pointer during drag-and-drop.
    #[must_use]
    pub fn drag_icon(&self) -> Option<SurfaceId> {
        self.drag.and_then(|(_, icon)| icon)
    }

    /// Whether an input lock is active.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub(crate) fn slot(&self, grab: GrabId) -> Option<&GrabSlot> {
        self.grabs.iter().find(|s| s.id == grab)
    }

    pub(crate) fn slot_mut(&mut self, grab: GrabId) -> Option<&mut GrabSlot> {
        self.grabs.iter_mut().find(|s| s.id == grab)
    }
}

impl Compositor {
    /// Creates a seat with its permanent default grab.
    pub fn create_seat(&mut self, name: impl Into<String>) -> SeatId {
        let id = SeatId(u32::try_from(self.seats.len()).unwrap_or(u32::MAX));
        self.next_grab += 1;
        let default_grab = GrabId(self.next_grab);
        let name = name.into();
        debug!(seat = ?id, %name, "seat created");
        self.seats.push(Seat {
            id,
            name,
            focus: [FocusTracker::default(); 3],
            stacks: <[GrabStack; 3]>::default(),
            grabs: Vec::new(),
            default_grab,
            pointer_location: Point::ORIGIN,
            pressed_buttons: Vec::new(),
            pressed_keys: Vec::new(),
            modifiers: 0,
            touch_points: Vec::new(),
            cursor: None,
            popups: None,
            lock: None,
            drag: None,
        });
        self.install_grab(
            id,
            default_grab,
            DeviceClasses::all(),
            i32::MIN,
            Box::new(DefaultGrab::default()),
        );
        id
    }

    /// Looks up a seat.
    #[must_use]
    pub fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(id.index())
    }

    /// All seats.
    #[must_use]
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub(crate) fn seat_ref(&self, id: SeatId) -> Result<&Seat, CoreError> {
        self.seats.get(id.index()).ok_or(CoreError::NoSuchSeat(id))
    }

    pub(crate) fn seat_mut(&mut self, id: SeatId) -> Result<&mut Seat, CoreError> {
        self.seats.get_mut(id.index()).ok_or(CoreError::NoSuchSeat(id))
    }

    pub(crate) fn seat_ids(&self) -> Vec<SeatId> {
        self.seats.iter().map(|s| s.id).collect()
    }
}
