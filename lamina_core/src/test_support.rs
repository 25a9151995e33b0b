// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Helpers shared by unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::Point;

use crate::Compositor;
use crate::backend::{ImportError, TextureBackend, TextureHandle};
use crate::buffer::{Buffer, BufferId};
use crate::region::Region;
use crate::scene::Layer;
use crate::surface::{ClientId, SurfaceId};

#[derive(Debug, Default)]
pub(crate) struct BackendLog {
    pub(crate) imports: Vec<(BufferId, TextureHandle)>,
    pub(crate) updates: Vec<TextureHandle>,
    pub(crate) releases: Vec<TextureHandle>,
    pub(crate) fail_updates: bool,
    pub(crate) fail_imports: bool,
    next: u64,
}

/// Backend recording every call into a shared log.
#[derive(Debug)]
pub(crate) struct ProbeBackend {
    log: Rc<RefCell<BackendLog>>,
}

impl ProbeBackend {
    pub(crate) fn new() -> (Self, Rc<RefCell<BackendLog>>) {
        let log = Rc::new(RefCell::new(BackendLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl TextureBackend for ProbeBackend {
    fn import(&mut self, buffer: &Buffer, _: &Region) -> Result<TextureHandle, ImportError> {
        let mut log = self.log.borrow_mut();
        if log.fail_imports {
            return Err(ImportError::OutOfMemory);
        }
        log.next += 1;
        let handle = TextureHandle(log.next);
        log.imports.push((buffer.id, handle));
        Ok(handle)
    }

    fn update(&mut self, handle: TextureHandle, _: &Buffer, _: &Region) -> bool {
        let mut log = self.log.borrow_mut();
        log.updates.push(handle);
        !log.fail_updates
    }

    fn release(&mut self, handle: TextureHandle) {
        self.log.borrow_mut().releases.push(handle);
    }
}

/// Creates a mapped toplevel showing `buffer` at `position`.
pub(crate) fn toplevel(
    c: &mut Compositor,
    client: ClientId,
    buffer: Buffer,
    position: Point,
) -> SurfaceId {
    let id = c.create_surface(client);
    c.make_toplevel(id).unwrap();
    c.attach(id, Some(buffer), 0, 0).unwrap();
    c.commit(id).unwrap();
    c.map_surface(id, Layer::Normal, position).unwrap();
    id
}
