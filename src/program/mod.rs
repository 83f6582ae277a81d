//! Programs and their typed binding slots.
//!
//! Slots are declared up front on a [ProgramDescriptor]: the program's author
//! lists every uniform, sampler, attribute, block and fragment output by
//! name, and optionally attaches a transform-feedback capture layout. The
//! program starts out unlinked with every slot inactive; linking is a one-shot
//! transition that resolves each slot against the compiled binary. A slot the
//! compiler optimized away stays inactive forever: touching it is a silent
//! no-op, logged once as a warning at link time.

mod slot;
mod uniform;

pub use self::slot::{
    AttributeBinding, BlockBinding, BlockKind, FragOutput, Identifier, Sampler, TransformOut,
    Uniform, VertexAttribute,
};
pub use self::uniform::UniformValue;

use failure::Fail;
use fnv::FnvHashMap;
use log::warn;

use self::slot::{
    AttributeSlotData, BlockSlotData, FragOutputSlotData, UniformSlotData, UniformSlotKind,
};
use crate::runtime::{
    Context, Device, DeviceError, ObjectKind, ResourceHandle, ShaderSource, ShaderStage,
    SlotKind,
};
use crate::transform_feedback::TransformFeedbackLayout;

/// Declares a program's shader sources and every binding slot it exposes.
///
/// Built with a [ProgramDescriptorBuilder].
pub struct ProgramDescriptor {
    sources: Vec<ShaderSource>,
    uniforms: Vec<(String, UniformSlotKind)>,
    attributes: Vec<String>,
    blocks: Vec<(String, BlockKind)>,
    frag_outputs: Vec<String>,
    feedback: Option<TransformFeedbackLayout>,
}

impl ProgramDescriptor {
    pub fn builder() -> ProgramDescriptorBuilder {
        ProgramDescriptorBuilder {
            sources: Vec::new(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            blocks: Vec::new(),
            frag_outputs: Vec::new(),
            feedback: None,
        }
    }
}

/// Builds a [ProgramDescriptor].
pub struct ProgramDescriptorBuilder {
    sources: Vec<ShaderSource>,
    uniforms: Vec<(String, UniformSlotKind)>,
    attributes: Vec<String>,
    blocks: Vec<(String, BlockKind)>,
    frag_outputs: Vec<String>,
    feedback: Option<TransformFeedbackLayout>,
}

impl ProgramDescriptorBuilder {
    pub fn vertex_source<S>(mut self, source: S) -> Self
    where
        S: Into<String>,
    {
        self.sources
            .push(ShaderSource::new(ShaderStage::Vertex, source));

        self
    }

    pub fn fragment_source<S>(mut self, source: S) -> Self
    where
        S: Into<String>,
    {
        self.sources
            .push(ShaderSource::new(ShaderStage::Fragment, source));

        self
    }

    /// Declares a value uniform slot.
    pub fn uniform<N>(mut self, name: N) -> Self
    where
        N: Into<String>,
    {
        self.uniforms.push((name.into(), UniformSlotKind::Value));

        self
    }

    /// Declares a sampler uniform slot.
    pub fn sampler<N>(mut self, name: N) -> Self
    where
        N: Into<String>,
    {
        self.uniforms.push((name.into(), UniformSlotKind::Sampler));

        self
    }

    /// Declares a vertex attribute slot.
    pub fn attribute<N>(mut self, name: N) -> Self
    where
        N: Into<String>,
    {
        self.attributes.push(name.into());

        self
    }

    /// Declares a uniform-block slot.
    pub fn uniform_block<N>(mut self, name: N) -> Self
    where
        N: Into<String>,
    {
        self.blocks.push((name.into(), BlockKind::Uniform));

        self
    }

    /// Declares a storage-block slot.
    pub fn storage_block<N>(mut self, name: N) -> Self
    where
        N: Into<String>,
    {
        self.blocks.push((name.into(), BlockKind::Storage));

        self
    }

    /// Declares a fragment output slot.
    pub fn frag_output<N>(mut self, name: N) -> Self
    where
        N: Into<String>,
    {
        self.frag_outputs.push(name.into());

        self
    }

    /// Attaches a transform-feedback capture layout.
    pub fn transform_feedback(mut self, layout: TransformFeedbackLayout) -> Self {
        self.feedback = Some(layout);

        self
    }

    pub fn finish(self) -> ProgramDescriptor {
        ProgramDescriptor {
            sources: self.sources,
            uniforms: self.uniforms,
            attributes: self.attributes,
            blocks: self.blocks,
            frag_outputs: self.frag_outputs,
            feedback: self.feedback,
        }
    }
}

/// A device program and the registry of its typed binding slots.
///
/// See the [module documentation](crate::program) for the declare/link/resolve
/// lifecycle.
pub struct Program {
    handle: ResourceHandle,
    sources: Vec<ShaderSource>,
    linked: bool,
    uniforms: FnvHashMap<String, UniformSlotData>,
    attributes: FnvHashMap<String, AttributeSlotData>,
    blocks: FnvHashMap<String, BlockSlotData>,
    frag_outputs: FnvHashMap<String, FragOutputSlotData>,
    feedback: Option<TransformFeedbackLayout>,
}

impl Program {
    /// Creates an unlinked program from its descriptor; every slot starts
    /// inactive and unresolved.
    pub fn new<D>(context: &mut Context<D>, descriptor: ProgramDescriptor) -> Self
    where
        D: Device,
    {
        let handle = context.create_handle(ObjectKind::Program);

        let uniforms = descriptor
            .uniforms
            .into_iter()
            .map(|(name, kind)| (name.clone(), UniformSlotData::new(name, kind)))
            .collect();
        let attributes = descriptor
            .attributes
            .into_iter()
            .map(|name| (name.clone(), AttributeSlotData::new(name)))
            .collect();
        let blocks = descriptor
            .blocks
            .into_iter()
            .map(|(name, kind)| (name.clone(), BlockSlotData::new(name, kind)))
            .collect();
        let frag_outputs = descriptor
            .frag_outputs
            .into_iter()
            .map(|name| (name.clone(), FragOutputSlotData::new(name)))
            .collect();

        Program {
            handle,
            sources: descriptor.sources,
            linked: false,
            uniforms,
            attributes,
            blocks,
            frag_outputs,
            feedback: descriptor.feedback,
        }
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// The transform-feedback capture layout attached at declaration, if any.
    pub fn feedback_layout(&self) -> Option<&TransformFeedbackLayout> {
        self.feedback.as_ref()
    }

    /// Compiles and links the program, then resolves every declared slot.
    ///
    /// One-shot: a linked program cannot be relinked. The transform-feedback
    /// varying name list (pseudo-keywords included) is handed to the device as
    /// part of the link call. Slots the compiled binary does not expose are
    /// logged and permanently disabled; this is a warning, not an error, since
    /// shaders legitimately optimize unused slots away.
    pub fn link<D>(&mut self, context: &mut Context<D>) -> Result<(), ProgramError>
    where
        D: Device,
    {
        if self.linked {
            return Err(ProgramError::AlreadyLinked);
        }

        let (varyings, mode) = match &self.feedback {
            Some(layout) => (layout.device_names(), Some(layout.mode())),
            None => (Vec::new(), None),
        };

        context
            .device_mut()
            .link_program(self.handle.raw(), &self.sources, &varyings, mode)?;

        self.linked = true;

        let program = self.handle.raw();
        let device = context.device_mut();

        for data in self.uniforms.values_mut() {
            data.location = device.resolve_slot(program, SlotKind::Uniform, data.identifier.name());
            data.active = data.location.is_some();

            if !data.active {
                warn!(
                    "uniform `{}` is not active after linking; calls touching it will be ignored",
                    data.identifier
                );
            }
        }

        for data in self.attributes.values_mut() {
            data.location =
                device.resolve_slot(program, SlotKind::Attribute, data.identifier.name());
            data.active = data.location.is_some();

            if !data.active {
                warn!(
                    "vertex attribute `{}` is not active after linking; calls touching it will \
                     be ignored",
                    data.identifier
                );
            }
        }

        for data in self.blocks.values_mut() {
            let kind = match data.kind {
                BlockKind::Uniform => SlotKind::UniformBlock,
                BlockKind::Storage => SlotKind::StorageBlock,
            };

            data.block_index = device.resolve_slot(program, kind, data.identifier.name());
            data.active = data.block_index.is_some();
            // Block bindings default to the block's own declaration index.
            data.binding = data.block_index;

            if !data.active {
                warn!(
                    "interface block `{}` is not active after linking; calls touching it will \
                     be ignored",
                    data.identifier
                );
            }
        }

        for data in self.frag_outputs.values_mut() {
            data.location =
                device.resolve_slot(program, SlotKind::FragOutput, data.identifier.name());
            data.active = data.location.is_some();

            if !data.active {
                warn!(
                    "fragment output `{}` is not active after linking",
                    data.identifier
                );
            }
        }

        context.check_device_error()?;

        Ok(())
    }

    /// Makes this the active program.
    pub fn activate<D>(&self, context: &mut Context<D>) -> Result<(), ProgramError>
    where
        D: Device,
    {
        if !self.linked {
            return Err(ProgramError::NotLinked);
        }

        context.device_mut().use_program(Some(self.handle.raw()));
        context.state_mut().set_active_program(Some(self.handle.raw()));

        Ok(())
    }

    /// The value uniform slot declared under `name`.
    pub fn uniform(&mut self, name: &str) -> Result<Uniform, SlotError> {
        let program = self.handle.raw();

        match self.uniforms.get_mut(name) {
            Some(data) if data.kind == UniformSlotKind::Value => Ok(Uniform { data, program }),
            _ => Err(SlotError::UnknownSlot {
                name: name.to_string(),
            }),
        }
    }

    /// The sampler slot declared under `name`.
    pub fn sampler(&mut self, name: &str) -> Result<Sampler, SlotError> {
        let program = self.handle.raw();

        match self.uniforms.get_mut(name) {
            Some(data) if data.kind == UniformSlotKind::Sampler => Ok(Sampler { data, program }),
            _ => Err(SlotError::UnknownSlot {
                name: name.to_string(),
            }),
        }
    }

    /// The vertex attribute slot declared under `name`.
    pub fn attribute(&mut self, name: &str) -> Result<VertexAttribute, SlotError> {
        match self.attributes.get_mut(name) {
            Some(data) => Ok(VertexAttribute { data }),
            None => Err(SlotError::UnknownSlot {
                name: name.to_string(),
            }),
        }
    }

    /// The block slot declared under `name`.
    pub fn block(&mut self, name: &str) -> Result<BlockBinding, SlotError> {
        let program = self.handle.raw();

        match self.blocks.get_mut(name) {
            Some(data) => Ok(BlockBinding { data, program }),
            None => Err(SlotError::UnknownSlot {
                name: name.to_string(),
            }),
        }
    }

    /// The fragment output slot declared under `name`.
    pub fn frag_output(&self, name: &str) -> Result<FragOutput, SlotError> {
        match self.frag_outputs.get(name) {
            Some(data) => Ok(FragOutput { data }),
            None => Err(SlotError::UnknownSlot {
                name: name.to_string(),
            }),
        }
    }

    /// The transform-feedback output for the varying captured under `name`.
    pub fn transform_out(&self, name: &str) -> Result<TransformOut, SlotError> {
        let index = self
            .feedback
            .as_ref()
            .and_then(|layout| layout.varying_index(name));

        match index {
            Some(index) => Ok(TransformOut {
                identifier: Identifier::new(name),
                index,
            }),
            None => Err(SlotError::UnknownSlot {
                name: name.to_string(),
            }),
        }
    }

    /// Releases the device program. The slot registry dies with it.
    pub fn delete<D>(self, context: &mut Context<D>)
    where
        D: Device,
    {
        let Program { handle, .. } = self;

        handle.release(context);
    }
}

/// Errors raised by program-level operations.
#[derive(Fail, Clone, PartialEq, Debug)]
pub enum ProgramError {
    #[fail(display = "the program is already linked; linking is a one-shot transition")]
    AlreadyLinked,
    #[fail(display = "the program has not been linked yet")]
    NotLinked,
    #[fail(display = "{}", _0)]
    Device(#[fail(cause)] DeviceError),
}

impl From<DeviceError> for ProgramError {
    fn from(error: DeviceError) -> Self {
        ProgramError::Device(error)
    }
}

/// Errors raised by slot lookup and slot operations.
#[derive(Fail, Clone, PartialEq, Debug)]
pub enum SlotError {
    #[fail(display = "no slot named `{}` was declared on this program", name)]
    UnknownSlot { name: String },
    #[fail(
        display = "uniform `{}` requires its owning program to be the active program",
        identifier
    )]
    ProgramNotActive { identifier: Identifier },
}
