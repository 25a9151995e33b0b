// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Outbound notifications.
//!
//! The core never calls out to its collaborators. Everything it wants to say
//! is queued and drained by the dispatch loop:
//!
//! - [`Signal`]s are for the desktop shell, the renderer and other in-process
//!   consumers ([`Compositor::take_signals`](crate::Compositor::take_signals)).
//! - [`ClientEvent`]s are protocol events for the client-proxy layer to encode
//!   and send ([`Compositor::take_client_events`](crate::Compositor::take_client_events)).
//!   Each carries the surface it is addressed to; the proxy resolves the
//!   owning connection. No event is ever queued for a destroyed surface.

use kurbo::{Point, Size};

use crate::buffer::BufferId;
use crate::error::ProtocolViolation;
use crate::grab::{GrabId, ResizeEdges};
use crate::output::OutputMask;
use crate::seat::{Axis, AxisSource, ButtonState, DeviceClass, DeviceClasses, KeyState, SeatId};
use crate::surface::{CallbackId, ClientId, SurfaceId};

/// Notification for in-process collaborators.
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    /// A surface was created.
    SurfaceCreated(SurfaceId),
    /// A surface's geometry changed.
    SurfaceGeometryDirty(SurfaceId),
    /// A commit carried a new (or null) buffer.
    SurfaceBufferCommitted(SurfaceId),
    /// A surface was destroyed. Its handle is already stale.
    SurfaceDestroyed(SurfaceId),
    /// A toplevel or popup gained content and wants to be shown.
    SurfaceMapped(SurfaceId),
    /// A toplevel or popup lost its content or role and left the scene.
    SurfaceUnmapped(SurfaceId),
    /// The set of outputs a surface overlaps changed.
    SurfaceOutputsChanged {
        /// The surface.
        surface: SurfaceId,
        /// Outputs it now overlaps.
        outputs: OutputMask,
    },
    /// A surface became a subsurface of `parent`.
    SubsurfaceCreated {
        /// The child.
        surface: SurfaceId,
        /// Its parent.
        parent: SurfaceId,
    },
    /// A subsurface relation ended.
    SubsurfaceDestroyed {
        /// The former child.
        surface: SurfaceId,
        /// Its parent, if still alive.
        parent: Option<SurfaceId>,
    },
    /// A seat's focus for one device class moved.
    SeatFocusChanged {
        /// The seat.
        seat: SeatId,
        /// Device class whose focus moved.
        class: DeviceClass,
        /// New focus.
        surface: Option<SurfaceId>,
    },
    /// A grab was pushed.
    SeatGrabPushed {
        /// The seat.
        seat: SeatId,
        /// The grab.
        grab: GrabId,
        /// Device classes it intercepts.
        classes: DeviceClasses,
    },
    /// A grab was popped.
    SeatGrabPopped {
        /// The seat.
        seat: SeatId,
        /// The grab.
        grab: GrabId,
    },
    /// A popup was dismissed by its grab and should be closed by the shell.
    ///
    /// Not emitted for a popup that was destroyed; [`Signal::SurfaceDestroyed`]
    /// covers it.
    PopupDismissed(SurfaceId),
    /// An interactive resize wants the surface reconfigured to `size`.
    ResizeRequested {
        /// The surface being resized.
        surface: SurfaceId,
        /// Edges being dragged.
        edges: ResizeEdges,
        /// Requested size in surface units.
        size: Size,
    },
}

/// Protocol event addressed to the client owning `surface`.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// Pointer entered the surface.
    PointerEnter {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Pointer serial.
        serial: u32,
        /// Surface-local position.
        location: Point,
    },
    /// Pointer left the surface.
    PointerLeave {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Pointer serial.
        serial: u32,
    },
    /// Pointer moved within the surface.
    PointerMotion {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Event time in milliseconds.
        time: u32,
        /// Surface-local position.
        location: Point,
    },
    /// Pointer button pressed or released.
    PointerButton {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Pointer serial.
        serial: u32,
        /// Event time in milliseconds.
        time: u32,
        /// Button code.
        button: u32,
        /// New state.
        state: ButtonState,
    },
    /// Scroll.
    PointerAxis {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Event time in milliseconds.
        time: u32,
        /// Scroll axis.
        axis: Axis,
        /// Continuous amount.
        value: f64,
        /// Discrete steps, for wheels.
        discrete: Option<i32>,
        /// Scroll source.
        source: AxisSource,
    },
    /// End of a group of pointer events.
    PointerFrame {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
    },
    /// Keyboard focus entered the surface.
    KeyboardEnter {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Keyboard serial.
        serial: u32,
        /// Keys currently held.
        keys: Vec<u32>,
    },
    /// Keyboard focus left the surface.
    KeyboardLeave {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Keyboard serial.
        serial: u32,
    },
    /// Key pressed or released.
    Key {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Keyboard serial.
        serial: u32,
        /// Event time in milliseconds.
        time: u32,
        /// Key code.
        key: u32,
        /// New state.
        state: KeyState,
    },
    /// Modifier state changed.
    Modifiers {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Keyboard serial.
        serial: u32,
        /// Modifier bitmask.
        modifiers: u32,
    },
    /// New touch point.
    TouchDown {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Touch serial.
        serial: u32,
        /// Event time in milliseconds.
        time: u32,
        /// Touch point id.
        id: i32,
        /// Surface-local position.
        location: Point,
    },
    /// Touch point lifted.
    TouchUp {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Touch serial.
        serial: u32,
        /// Event time in milliseconds.
        time: u32,
        /// Touch point id.
        id: i32,
    },
    /// Touch point moved.
    TouchMotion {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Event time in milliseconds.
        time: u32,
        /// Touch point id.
        id: i32,
        /// Surface-local position.
        location: Point,
    },
    /// End of a group of touch events.
    TouchFrame {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
    },
    /// The compositor took over the touch sequence.
    TouchCancel {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
    },
    /// A drag entered the surface.
    DragEnter {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Pointer serial.
        serial: u32,
        /// Surface-local position.
        location: Point,
    },
    /// A drag left the surface.
    DragLeave {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
    },
    /// A drag moved within the surface.
    DragMotion {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
        /// Event time in milliseconds.
        time: u32,
        /// Surface-local position.
        location: Point,
    },
    /// The drag was dropped on the surface.
    Drop {
        /// Seat.
        seat: SeatId,
        /// Target surface.
        surface: SurfaceId,
    },
    /// The compositor no longer reads `buffer`.
    BufferRelease {
        /// Surface the buffer was attached to.
        surface: SurfaceId,
        /// The released buffer.
        buffer: BufferId,
    },
    /// A frame callback fired.
    FrameDone {
        /// Surface the callback was registered on.
        surface: SurfaceId,
        /// The callback.
        callback: CallbackId,
        /// Frame time in milliseconds.
        time: u32,
    },
    /// The client sent a malformed request; the connection should be closed.
    ProtocolError {
        /// Offending client.
        client: ClientId,
        /// Surface the request targeted.
        surface: SurfaceId,
        /// What was wrong.
        violation: ProtocolViolation,
    },
}

impl ClientEvent {
    /// The surface the event is addressed to.
    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        match self {
            Self::PointerEnter { surface, .. }
            | Self::PointerLeave { surface, .. }
            | Self::PointerMotion { surface, .. }
            | Self::PointerButton { surface, .. }
            | Self::PointerAxis { surface, .. }
            | Self::PointerFrame { surface, .. }
            | Self::KeyboardEnter { surface, .. }
            | Self::KeyboardLeave { surface, .. }
            | Self::Key { surface, .. }
            | Self::Modifiers { surface, .. }
            | Self::TouchDown { surface, .. }
            | Self::TouchUp { surface, .. }
            | Self::TouchMotion { surface, .. }
            | Self::TouchFrame { surface, .. }
            | Self::TouchCancel { surface, .. }
            | Self::DragEnter { surface, .. }
            | Self::DragLeave { surface, .. }
            | Self::DragMotion { surface, .. }
            | Self::Drop { surface, .. }
            | Self::BufferRelease { surface, .. }
            | Self::FrameDone { surface, .. }
            | Self::ProtocolError { surface, .. } => *surface,
        }
    }
}
