use std::fmt;

use failure::Fail;

use crate::program::UniformValue;
use crate::transform_feedback::FeedbackMode;

/// Opaque non-negative integer identifying a device-side object.
pub type RawHandle = u32;

/// The kinds of device objects this layer allocates and tracks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ObjectKind {
    Buffer,
    Program,
    Query,
}

/// Non-indexed buffer binding targets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferTarget {
    Array,
    ElementArray,
    CopyRead,
    CopyWrite,
    Uniform,
    TransformFeedback,
}

/// Indexed buffer binding targets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IndexedBufferTarget {
    Uniform,
    ShaderStorage,
    TransformFeedback,
}

/// Usage hint passed to the device when buffer storage is specified.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UsageHint {
    StaticDraw,
    DynamicDraw,
    StreamDraw,
    StaticRead,
    DynamicRead,
    StreamRead,
    StaticCopy,
    DynamicCopy,
    StreamCopy,
}

/// Counter targets addressed through the binding-index allocator.
///
/// Some targets support several concurrently active counters addressed by
/// distinct small indices (one per output stream), others support exactly one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CounterTarget {
    SamplesPassed,
    AnySamplesPassed,
    PrimitivesGenerated,
    FeedbackPrimitivesWritten,
    TimeElapsed,
}

impl CounterTarget {
    /// Whether this target supports multiple concurrently active indices.
    pub fn is_indexable(&self) -> bool {
        match self {
            CounterTarget::PrimitivesGenerated => true,
            CounterTarget::FeedbackPrimitivesWritten => true,
            _ => false,
        }
    }
}

/// The program slot categories that can be resolved by name after linking.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SlotKind {
    Uniform,
    Attribute,
    UniformBlock,
    StorageBlock,
    FragOutput,
}

/// A shader stage attached to a program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Source text for one shader stage.
#[derive(Clone, PartialEq, Debug)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    pub source: String,
}

impl ShaderSource {
    pub fn new<S>(stage: ShaderStage, source: S) -> Self
    where
        S: Into<String>,
    {
        ShaderSource {
            stage,
            source: source.into(),
        }
    }
}

/// An error reported by the device itself, as opposed to one detected
/// host-side before any device call was made.
#[derive(Fail, Clone, PartialEq, Debug)]
#[fail(display = "device reported error {} (message: `{}`)", code, message)]
pub struct DeviceError {
    pub code: u32,
    pub message: String,
}

impl DeviceError {
    pub fn new<M>(code: u32, message: M) -> Self
    where
        M: Into<String>,
    {
        DeviceError {
            code,
            message: message.into(),
        }
    }
}

/// The external graphics device this layer manages resources on.
///
/// The device executes commands asynchronously but in submission order; all
/// calls are issued from a single logical thread. The only operations that may
/// force the host to wait are [Device::read_buffer_sub_data] and
/// [Device::counter_result].
///
/// Implementations do not validate arguments; validation happens host-side
/// before a call is issued (see the crate-level documentation on validation
/// mode). [EmulatedDevice](crate::runtime::EmulatedDevice) is a byte-accurate
/// software implementation used for testing and headless runs.
pub trait Device {
    /// Allocates a new device object of the given kind.
    fn create_object(&mut self, kind: ObjectKind) -> RawHandle;

    /// Deletes a device object previously created with [Device::create_object].
    fn delete_object(&mut self, kind: ObjectKind, handle: RawHandle);

    /// Binds a buffer object to `target`, or unbinds the target when `handle`
    /// is `None`.
    fn bind_buffer(&mut self, target: BufferTarget, handle: Option<RawHandle>);

    /// Binds a buffer object to an indexed binding point, optionally
    /// restricted to a byte range `(offset, size)`.
    fn bind_buffer_indexed(
        &mut self,
        target: IndexedBufferTarget,
        index: u32,
        handle: Option<RawHandle>,
        range: Option<(usize, usize)>,
    );

    /// Specifies storage of `size` bytes for the buffer currently bound to
    /// `target`, orphaning any previous contents.
    fn buffer_data(&mut self, target: BufferTarget, size: usize, usage: UsageHint);

    /// Uploads `data` into the buffer currently bound to `target`, starting at
    /// byte `offset`.
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    /// Copies `size` bytes device-side from the buffer bound to the copy-read
    /// target into the buffer bound to the copy-write target.
    fn copy_buffer_sub_data(&mut self, read_offset: usize, write_offset: usize, size: usize);

    /// Returns the size in bytes of the buffer currently bound to `target`.
    fn buffer_size(&mut self, target: BufferTarget) -> usize;

    /// Reads buffer contents back to the host. May force a pipeline sync.
    fn read_buffer_sub_data(&mut self, target: BufferTarget, offset: usize, out: &mut [u8]);

    /// Makes `handle` the active program, or clears the active program.
    fn use_program(&mut self, handle: Option<RawHandle>);

    /// Compiles the given sources and links the program, capturing the listed
    /// varyings (real names and pseudo-keywords, in order) in `mode` if a
    /// transform-feedback layout is present.
    fn link_program(
        &mut self,
        handle: RawHandle,
        sources: &[ShaderSource],
        varyings: &[String],
        mode: Option<FeedbackMode>,
    ) -> Result<(), DeviceError>;

    /// Resolves a named slot of a linked program to its location or index.
    ///
    /// Returns `None` when the slot does not exist in the linked binary, for
    /// instance because the compiler optimized it away.
    fn resolve_slot(&mut self, program: RawHandle, kind: SlotKind, name: &str) -> Option<u32>;

    /// Assigns the binding index of an interface block identified by its
    /// resolved block index.
    fn set_block_binding(&mut self, program: RawHandle, block_index: u32, binding: u32);

    /// Sets the uniform at `location` on the active program.
    fn set_uniform(&mut self, location: u32, value: &UniformValue);

    /// Points the vertex input at `location` to the buffer currently bound to
    /// the array target, with the given byte stride and offset, and enables it.
    fn set_attribute_pointer(&mut self, location: u32, stride: usize, offset: usize, normalized: bool);

    /// Begins the counter `handle` on `target` at binding index `index`.
    fn begin_counter(&mut self, target: CounterTarget, index: u32, handle: RawHandle);

    /// Ends the counter active on `target` at binding index `index`.
    fn end_counter(&mut self, target: CounterTarget, index: u32);

    /// Retrieves a finished counter's value. May force a pipeline sync.
    fn counter_result(&mut self, handle: RawHandle) -> u64;

    /// Returns the handle currently bound to `target`, if any. Debug only.
    fn bound_buffer(&mut self, target: BufferTarget) -> Option<RawHandle>;

    /// Polls and clears the device's sticky error state. Debug only.
    fn poll_error(&mut self) -> Option<DeviceError>;
}

impl fmt::Display for BufferTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for CounterTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
