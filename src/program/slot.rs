use std::fmt;
use std::hash::{Hash, Hasher};

use bytemuck::Pod;
use fnv::FnvHasher;

use crate::buffer::RingBuffer;
use crate::program::uniform::UniformValue;
use crate::program::SlotError;
use crate::runtime::{BufferTarget, Context, Device, IndexedBufferTarget, RawHandle};

/// The name a binding slot was declared under, unique within its program.
#[derive(Clone, Debug)]
pub struct Identifier {
    name: String,
    hash_fnv64: u64,
}

impl Identifier {
    pub(crate) fn new<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        let name = name.into();
        let mut hasher = FnvHasher::default();

        name.hash(&mut hasher);

        let hash_fnv64 = hasher.finish();

        Identifier { name, hash_fnv64 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash_fnv64(&self) -> u64 {
        self.hash_fnv64
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.hash_fnv64 == other.hash_fnv64
    }
}

/// Which kind of interface block a block slot refers to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BlockKind {
    Uniform,
    Storage,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum UniformSlotKind {
    Value,
    Sampler,
}

pub(crate) struct UniformSlotData {
    pub(crate) identifier: Identifier,
    pub(crate) kind: UniformSlotKind,
    pub(crate) location: Option<u32>,
    pub(crate) active: bool,
    pub(crate) recorded: Option<UniformValue>,
}

impl UniformSlotData {
    pub(crate) fn new<N>(name: N, kind: UniformSlotKind) -> Self
    where
        N: Into<String>,
    {
        UniformSlotData {
            identifier: Identifier::new(name),
            kind,
            location: None,
            active: false,
            recorded: None,
        }
    }
}

pub(crate) struct AttributeSlotData {
    pub(crate) identifier: Identifier,
    pub(crate) location: Option<u32>,
    pub(crate) active: bool,
}

impl AttributeSlotData {
    pub(crate) fn new<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        AttributeSlotData {
            identifier: Identifier::new(name),
            location: None,
            active: false,
        }
    }
}

pub(crate) struct BlockSlotData {
    pub(crate) identifier: Identifier,
    pub(crate) kind: BlockKind,
    pub(crate) block_index: Option<u32>,
    pub(crate) binding: Option<u32>,
    pub(crate) active: bool,
}

impl BlockSlotData {
    pub(crate) fn new<N>(name: N, kind: BlockKind) -> Self
    where
        N: Into<String>,
    {
        BlockSlotData {
            identifier: Identifier::new(name),
            kind,
            block_index: None,
            binding: None,
            active: false,
        }
    }
}

pub(crate) struct FragOutputSlotData {
    pub(crate) identifier: Identifier,
    pub(crate) location: Option<u32>,
    pub(crate) active: bool,
}

impl FragOutputSlotData {
    pub(crate) fn new<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        FragOutputSlotData {
            identifier: Identifier::new(name),
            location: None,
            active: false,
        }
    }
}

/// A value uniform slot, obtained from [Program::uniform](crate::program::Program::uniform).
///
/// The last value handed to [Uniform::set] is recorded on the slot whether or
/// not the slot is active, so applications can inspect what a shader would
/// have received even when the compiler optimized the uniform away.
pub struct Uniform<'a> {
    pub(crate) data: &'a mut UniformSlotData,
    pub(crate) program: RawHandle,
}

impl<'a> Uniform<'a> {
    pub fn identifier(&self) -> &Identifier {
        &self.data.identifier
    }

    /// Whether the slot survived linking.
    pub fn is_active(&self) -> bool {
        self.data.active
    }

    pub fn location(&self) -> Option<u32> {
        self.data.location
    }

    /// The last value passed to [Uniform::set], active or not.
    pub fn recorded_value(&self) -> Option<UniformValue> {
        self.data.recorded
    }

    /// Sets the uniform on the device.
    ///
    /// The owning program must currently be the active program. When the slot
    /// is inactive the value is recorded but no device call is issued.
    pub fn set<D, V>(&mut self, context: &mut Context<D>, value: V) -> Result<(), SlotError>
    where
        D: Device,
        V: Into<UniformValue>,
    {
        let value = value.into();

        if context.binding_state().active_program() != Some(self.program) {
            return Err(SlotError::ProgramNotActive {
                identifier: self.data.identifier.clone(),
            });
        }

        self.data.recorded = Some(value);

        if let (true, Some(location)) = (self.data.active, self.data.location) {
            context.device_mut().set_uniform(location, &value);
        }

        Ok(())
    }
}

/// A sampler uniform slot, obtained from
/// [Program::sampler](crate::program::Program::sampler).
pub struct Sampler<'a> {
    pub(crate) data: &'a mut UniformSlotData,
    pub(crate) program: RawHandle,
}

impl<'a> Sampler<'a> {
    pub fn identifier(&self) -> &Identifier {
        &self.data.identifier
    }

    pub fn is_active(&self) -> bool {
        self.data.active
    }

    pub fn location(&self) -> Option<u32> {
        self.data.location
    }

    /// Points the sampler at a texture unit.
    ///
    /// Sampler uniforms carry the unit index as a plain integer.
    pub fn set_unit<D>(&mut self, context: &mut Context<D>, unit: u32) -> Result<(), SlotError>
    where
        D: Device,
    {
        Uniform {
            data: &mut *self.data,
            program: self.program,
        }
        .set(context, unit as i32)
    }
}

/// Describes how a vertex attribute reads from a buffer.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct AttributeBinding {
    /// Byte stride between consecutive elements; the buffer's element size
    /// when `None`.
    pub stride: Option<usize>,
    /// Byte offset of the first element.
    pub offset: usize,
    /// Whether integer data is normalized to `[0, 1]` / `[-1, 1]`.
    pub normalized: bool,
}

impl Default for AttributeBinding {
    fn default() -> Self {
        AttributeBinding {
            stride: None,
            offset: 0,
            normalized: false,
        }
    }
}

/// A vertex attribute slot, obtained from
/// [Program::attribute](crate::program::Program::attribute).
pub struct VertexAttribute<'a> {
    pub(crate) data: &'a mut AttributeSlotData,
}

impl<'a> VertexAttribute<'a> {
    pub fn identifier(&self) -> &Identifier {
        &self.data.identifier
    }

    pub fn is_active(&self) -> bool {
        self.data.active
    }

    pub fn location(&self) -> Option<u32> {
        self.data.location
    }

    /// Points this vertex input at `buffer` with the given layout.
    ///
    /// Does nothing when the slot is inactive; no device call is issued.
    pub fn bind<D, T>(
        &mut self,
        context: &mut Context<D>,
        buffer: &RingBuffer<T>,
        binding: AttributeBinding,
    ) where
        D: Device,
        T: Pod,
    {
        let location = match (self.data.active, self.data.location) {
            (true, Some(location)) => location,
            _ => return,
        };

        buffer.bind(context, BufferTarget::Array);

        let stride = binding.stride.unwrap_or_else(|| buffer.element_size());

        context
            .device_mut()
            .set_attribute_pointer(location, stride, binding.offset, binding.normalized);
    }
}

/// A uniform- or storage-block slot, obtained from
/// [Program::block](crate::program::Program::block).
///
/// Block bindings live in a program-scoped index space; after linking the
/// binding defaults to the block's own resolved index.
pub struct BlockBinding<'a> {
    pub(crate) data: &'a mut BlockSlotData,
    pub(crate) program: RawHandle,
}

impl<'a> BlockBinding<'a> {
    pub fn identifier(&self) -> &Identifier {
        &self.data.identifier
    }

    pub fn kind(&self) -> BlockKind {
        self.data.kind
    }

    pub fn is_active(&self) -> bool {
        self.data.active
    }

    /// The block's resolved declaration index.
    pub fn block_index(&self) -> Option<u32> {
        self.data.block_index
    }

    /// The binding index buffers attach through.
    pub fn binding(&self) -> Option<u32> {
        self.data.binding
    }

    /// Reassigns the binding index this block reads through.
    ///
    /// The index is recorded even when the slot is inactive; the device call
    /// is only issued for active slots.
    pub fn change_binding<D>(&mut self, context: &mut Context<D>, binding: u32)
    where
        D: Device,
    {
        self.data.binding = Some(binding);

        if let (true, Some(block_index)) = (self.data.active, self.data.block_index) {
            context
                .device_mut()
                .set_block_binding(self.program, block_index, binding);
        }
    }

    /// Attaches `buffer` to this block's binding index, optionally restricted
    /// to a range of `size` elements starting at element `offset`.
    ///
    /// Does nothing when the slot is inactive; no device call is issued.
    pub fn bind_buffer<D, T>(
        &mut self,
        context: &mut Context<D>,
        buffer: &RingBuffer<T>,
        range: Option<(usize, usize)>,
    ) where
        D: Device,
        T: Pod,
    {
        let binding = match (self.data.active, self.data.binding) {
            (true, Some(binding)) => binding,
            _ => return,
        };

        let target = match self.data.kind {
            BlockKind::Uniform => IndexedBufferTarget::Uniform,
            BlockKind::Storage => IndexedBufferTarget::ShaderStorage,
        };

        let element_size = buffer.element_size();
        let byte_range = range.map(|(offset, size)| (offset * element_size, size * element_size));

        context.bind_buffer_indexed(target, binding, buffer.handle(), byte_range);
    }
}

/// A transform-feedback output slot, obtained from
/// [Program::transform_out](crate::program::Program::transform_out).
///
/// Unlike the other slot kinds this one is not resolved by name lookup after
/// linking; its binding index was computed by the capture layout's index
/// assignment before the link call.
pub struct TransformOut {
    pub(crate) identifier: Identifier,
    pub(crate) index: u32,
}

impl TransformOut {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The output buffer binding index this varying is captured into.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Attaches `buffer` as the capture storage for this varying's binding
    /// index.
    pub fn bind_buffer<D, T>(&self, context: &mut Context<D>, buffer: &RingBuffer<T>)
    where
        D: Device,
        T: Pod,
    {
        context.bind_buffer_indexed(
            IndexedBufferTarget::TransformFeedback,
            self.index,
            buffer.handle(),
            None,
        );
    }
}

/// A fragment output slot, obtained from
/// [Program::frag_output](crate::program::Program::frag_output).
///
/// Informational: exposes the output's resolved location for explicit
/// draw-buffer setup.
pub struct FragOutput<'a> {
    pub(crate) data: &'a FragOutputSlotData,
}

impl<'a> FragOutput<'a> {
    pub fn identifier(&self) -> &Identifier {
        &self.data.identifier
    }

    pub fn is_active(&self) -> bool {
        self.data.active
    }

    pub fn location(&self) -> Option<u32> {
        self.data.location
    }
}
