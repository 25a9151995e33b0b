// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test harness for `lamina_core`.
//!
//! - [`RecordingBackend`] is a [`TextureBackend`] that logs every call and
//!   can be told to fail, observed through its [`BackendProbe`].
//! - [`Fixture`] bundles a compositor, one seat and a recording backend,
//!   with shortcuts for the surface trees most scenarios start from.
//! - [`init_tracing`] routes core diagnostics to the test output.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use kurbo::{Point, Vec2};
use lamina_core::backend::{ImportError, TextureBackend, TextureHandle};
use lamina_core::buffer::{Buffer, BufferId};
use lamina_core::region::Region;
use lamina_core::scene::Layer;
use lamina_core::seat::{ButtonState, DeviceClass, PointerMotion, SeatId};
use lamina_core::surface::{ClientId, SurfaceId};
use lamina_core::{Compositor, Config, CoreError};
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber writing to the test output.
///
/// The filter comes from `RUST_LOG`, defaulting to `lamina_core=debug`.
/// Calling it more than once is harmless.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lamina_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A call received by a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    /// A buffer was imported as a fresh texture.
    Import {
        /// The buffer.
        buffer: BufferId,
        /// The texture handed out.
        handle: TextureHandle,
    },
    /// An import was refused by failure injection.
    ImportFailed(BufferId),
    /// A texture was updated in place.
    Update {
        /// The texture.
        handle: TextureHandle,
        /// The buffer uploaded into it.
        buffer: BufferId,
        /// Whether the update was reported as successful.
        ok: bool,
    },
    /// A texture was released.
    Release(TextureHandle),
}

#[derive(Debug, Default)]
struct BackendState {
    calls: Vec<BackendCall>,
    next: u64,
    live: BTreeSet<TextureHandle>,
    bad_releases: Vec<TextureHandle>,
    failing_imports: u32,
    failing_updates: bool,
}

/// A texture backend recording every call.
#[derive(Debug)]
pub struct RecordingBackend {
    state: Rc<RefCell<BackendState>>,
}

/// Read and control access to a [`RecordingBackend`] owned by a compositor.
#[derive(Clone, Debug)]
pub struct BackendProbe {
    state: Rc<RefCell<BackendState>>,
}

impl RecordingBackend {
    /// Creates a backend and the probe observing it.
    #[must_use]
    pub fn new() -> (Self, BackendProbe) {
        let state = Rc::new(RefCell::new(BackendState::default()));
        (
            Self {
                state: state.clone(),
            },
            BackendProbe { state },
        )
    }
}

impl TextureBackend for RecordingBackend {
    fn import(&mut self, buffer: &Buffer, _: &Region) -> Result<TextureHandle, ImportError> {
        let mut state = self.state.borrow_mut();
        if state.failing_imports > 0 {
            state.failing_imports -= 1;
            state.calls.push(BackendCall::ImportFailed(buffer.id));
            return Err(ImportError::OutOfMemory);
        }
        state.next += 1;
        let handle = TextureHandle(state.next);
        state.live.insert(handle);
        state.calls.push(BackendCall::Import {
            buffer: buffer.id,
            handle,
        });
        Ok(handle)
    }

    fn update(&mut self, handle: TextureHandle, buffer: &Buffer, _: &Region) -> bool {
        let mut state = self.state.borrow_mut();
        let ok = !state.failing_updates && state.live.contains(&handle);
        state.calls.push(BackendCall::Update {
            handle,
            buffer: buffer.id,
            ok,
        });
        ok
    }

    fn release(&mut self, handle: TextureHandle) {
        let mut state = self.state.borrow_mut();
        if !state.live.remove(&handle) {
            state.bad_releases.push(handle);
        }
        state.calls.push(BackendCall::Release(handle));
    }
}

impl BackendProbe {
    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.borrow().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Textures imported and not yet released.
    #[must_use]
    pub fn live_textures(&self) -> Vec<TextureHandle> {
        self.state.borrow().live.iter().copied().collect()
    }

    /// Releases of handles that were never imported or already released.
    #[must_use]
    pub fn bad_releases(&self) -> Vec<TextureHandle> {
        self.state.borrow().bad_releases.clone()
    }

    /// Makes the next `count` imports fail.
    pub fn fail_imports(&self, count: u32) {
        self.state.borrow_mut().failing_imports = count;
    }

    /// Makes in-place updates fail (or succeed again).
    pub fn fail_updates(&self, fail: bool) {
        self.state.borrow_mut().failing_updates = fail;
    }
}

/// A compositor with one seat and a recording backend.
#[derive(Debug)]
pub struct Fixture {
    /// The compositor under test.
    pub compositor: Compositor,
    /// Its only seat, `seat0`.
    pub seat: SeatId,
    /// Observes the compositor's backend.
    pub backend: BackendProbe,
    next_buffer: u64,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// A fixture with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// A fixture with `config`.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let (backend, probe) = RecordingBackend::new();
        let mut compositor = Compositor::new(config, Box::new(backend));
        let seat = compositor.create_seat("seat0");
        Self {
            compositor,
            seat,
            backend: probe,
            next_buffer: 0,
        }
    }

    /// A fresh ARGB buffer.
    pub fn buffer(&mut self, width: u32, height: u32) -> Buffer {
        self.next_buffer += 1;
        Buffer::argb(BufferId(self.next_buffer), width, height)
    }

    /// Creates a toplevel of `client` showing a `width` x `height` buffer and
    /// maps it at `position` in the normal layer.
    pub fn toplevel(
        &mut self,
        client: ClientId,
        width: u32,
        height: u32,
        position: Point,
    ) -> Result<SurfaceId, CoreError> {
        let buffer = self.buffer(width, height);
        let c = &mut self.compositor;
        let id = c.create_surface(client);
        c.make_toplevel(id)?;
        c.attach(id, Some(buffer), 0, 0)?;
        c.commit(id)?;
        c.map_surface(id, Layer::Normal, position)?;
        Ok(id)
    }

    /// Creates a subsurface of `parent` with content at `(x, y)` and commits
    /// both, so the child is visible when this returns.
    pub fn subsurface(
        &mut self,
        parent: SurfaceId,
        width: u32,
        height: u32,
        x: i32,
        y: i32,
    ) -> Result<SurfaceId, CoreError> {
        let buffer = self.buffer(width, height);
        let c = &mut self.compositor;
        let client = c
            .surface(parent)
            .map(|s| s.client())
            .ok_or(CoreError::NoSuchSurface(parent))?;
        let id = c.create_surface(client);
        c.create_subsurface(id, parent)?;
        c.set_subsurface_position(id, x, y)?;
        c.attach(id, Some(buffer), 0, 0)?;
        c.commit(id)?;
        c.commit(parent)?;
        Ok(id)
    }

    /// Moves the pointer to `point` in global space.
    pub fn pointer_to(&mut self, point: Point, time: u32) {
        let current = self
            .compositor
            .seat(self.seat)
            .map_or(Point::ORIGIN, |s| s.pointer_location());
        let delta: Vec2 = point - current;
        self.compositor
            .pointer_motion(self.seat, PointerMotion::Relative(delta), time);
    }

    /// Presses `button` and returns the serial of the press.
    pub fn press(&mut self, button: u32, time: u32) -> u32 {
        self.compositor
            .pointer_button(self.seat, button, ButtonState::Pressed, time);
        self.pointer_serial()
    }

    /// Releases `button`.
    pub fn release(&mut self, button: u32, time: u32) {
        self.compositor
            .pointer_button(self.seat, button, ButtonState::Released, time);
    }

    /// The last pointer serial of the seat.
    #[must_use]
    pub fn pointer_serial(&self) -> u32 {
        self.compositor
            .seat(self.seat)
            .map_or(0, |s| s.focus(DeviceClass::Pointer).serial())
    }
}
