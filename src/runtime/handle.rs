use log::warn;

use crate::runtime::context::Context;
use crate::runtime::device::{Device, ObjectKind, RawHandle};

/// Owner of one device-side object handle.
///
/// Exactly one `ResourceHandle` exists per device object; the type is
/// move-only and releasing it requires the owning [Context], so a handle can
/// never be freed from a place where issuing device commands would be unsound.
///
/// Dropping a handle without calling [ResourceHandle::release] does not free
/// the device object. It logs a leak warning, and the handle stays in the
/// context's live registry until [Context::report_leaks] surfaces it.
#[derive(Debug)]
pub struct ResourceHandle {
    raw: RawHandle,
    kind: ObjectKind,
    released: bool,
}

impl ResourceHandle {
    pub(crate) fn new(raw: RawHandle, kind: ObjectKind) -> Self {
        ResourceHandle {
            raw,
            kind,
            released: false,
        }
    }

    /// The raw device handle this wrapper owns.
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// The kind of device object this handle identifies.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Deletes the device object and removes it from the context's live
    /// registry.
    pub fn release<D>(mut self, context: &mut Context<D>)
    where
        D: Device,
    {
        self.released = true;
        context.release_raw(self.kind, self.raw);
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "{:?} handle {} dropped without release; the device object leaks \
                 until the context is torn down",
                self.kind, self.raw
            );
        }
    }
}
