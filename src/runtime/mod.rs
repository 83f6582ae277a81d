//! The device abstraction and the context that owns it.
//!
//! [Device] is the stateful external collaborator every resource in this
//! crate talks to; [Context] wraps a device together with the host-side
//! binding mirror, the counter index pools and the live-handle registry.

mod context;
mod device;
mod emulated;
mod handle;
mod state;

pub use self::context::{BindingDisciplineError, Context, ValidationMode};
pub use self::device::{
    BufferTarget, CounterTarget, Device, DeviceError, IndexedBufferTarget, ObjectKind, RawHandle,
    ShaderSource, ShaderStage, SlotKind, UsageHint,
};
pub use self::emulated::{DeviceCall, EmulatedDevice, EMULATED_INVALID_OPERATION};
pub use self::handle::ResourceHandle;
pub use self::state::BindingState;
