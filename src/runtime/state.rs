use crate::runtime::device::{BufferTarget, IndexedBufferTarget, RawHandle};

/// Host-side mirror of the device's mutable binding state.
///
/// The device itself is stateful: every buffer operation acts on whatever
/// handle is currently bound to the relevant target. This struct tracks those
/// bindings as the context issues them, so that binding-discipline checks can
/// run without a device round-trip. Nothing in this layer binds on a caller's
/// behalf; a mutation issued against a buffer that is not the current binding
/// for its target is a programming error, caught when validation is enabled.
pub struct BindingState {
    bound_array_buffer: Option<RawHandle>,
    bound_element_array_buffer: Option<RawHandle>,
    bound_copy_read_buffer: Option<RawHandle>,
    bound_copy_write_buffer: Option<RawHandle>,
    bound_uniform_buffer: Option<RawHandle>,
    bound_transform_feedback_buffer: Option<RawHandle>,
    bound_uniform_buffers_indexed: Vec<Option<RawHandle>>,
    bound_storage_buffers_indexed: Vec<Option<RawHandle>>,
    bound_transform_feedback_buffers_indexed: Vec<Option<RawHandle>>,
    active_program: Option<RawHandle>,
}

impl BindingState {
    pub(crate) fn new() -> Self {
        BindingState {
            bound_array_buffer: None,
            bound_element_array_buffer: None,
            bound_copy_read_buffer: None,
            bound_copy_write_buffer: None,
            bound_uniform_buffer: None,
            bound_transform_feedback_buffer: None,
            bound_uniform_buffers_indexed: Vec::new(),
            bound_storage_buffers_indexed: Vec::new(),
            bound_transform_feedback_buffers_indexed: Vec::new(),
            active_program: None,
        }
    }

    /// The handle currently bound to `target`, as last issued through the
    /// owning context.
    pub fn bound_buffer(&self, target: BufferTarget) -> Option<RawHandle> {
        *self.slot(target)
    }

    /// The currently active program, as last issued through the owning
    /// context.
    pub fn active_program(&self) -> Option<RawHandle> {
        self.active_program
    }

    /// The handle currently bound to the indexed binding point
    /// `(target, index)`.
    pub fn bound_buffer_indexed(
        &self,
        target: IndexedBufferTarget,
        index: u32,
    ) -> Option<RawHandle> {
        self.indexed_slots(target)
            .get(index as usize)
            .copied()
            .flatten()
    }

    pub(crate) fn set_bound_buffer(&mut self, target: BufferTarget, handle: Option<RawHandle>) {
        *self.slot_mut(target) = handle;
    }

    pub(crate) fn set_active_program(&mut self, handle: Option<RawHandle>) {
        self.active_program = handle;
    }

    pub(crate) fn set_bound_buffer_indexed(
        &mut self,
        target: IndexedBufferTarget,
        index: u32,
        handle: Option<RawHandle>,
    ) {
        let slots = self.indexed_slots_mut(target);
        let index = index as usize;

        if slots.len() <= index {
            slots.resize(index + 1, None);
        }

        slots[index] = handle;

        // Binding to an indexed point also rebinds the generic target.
        let generic = match target {
            IndexedBufferTarget::Uniform => BufferTarget::Uniform,
            IndexedBufferTarget::TransformFeedback => BufferTarget::TransformFeedback,
            IndexedBufferTarget::ShaderStorage => return,
        };

        *self.slot_mut(generic) = handle;
    }

    fn slot(&self, target: BufferTarget) -> &Option<RawHandle> {
        match target {
            BufferTarget::Array => &self.bound_array_buffer,
            BufferTarget::ElementArray => &self.bound_element_array_buffer,
            BufferTarget::CopyRead => &self.bound_copy_read_buffer,
            BufferTarget::CopyWrite => &self.bound_copy_write_buffer,
            BufferTarget::Uniform => &self.bound_uniform_buffer,
            BufferTarget::TransformFeedback => &self.bound_transform_feedback_buffer,
        }
    }

    fn slot_mut(&mut self, target: BufferTarget) -> &mut Option<RawHandle> {
        match target {
            BufferTarget::Array => &mut self.bound_array_buffer,
            BufferTarget::ElementArray => &mut self.bound_element_array_buffer,
            BufferTarget::CopyRead => &mut self.bound_copy_read_buffer,
            BufferTarget::CopyWrite => &mut self.bound_copy_write_buffer,
            BufferTarget::Uniform => &mut self.bound_uniform_buffer,
            BufferTarget::TransformFeedback => &mut self.bound_transform_feedback_buffer,
        }
    }

    fn indexed_slots(&self, target: IndexedBufferTarget) -> &Vec<Option<RawHandle>> {
        match target {
            IndexedBufferTarget::Uniform => &self.bound_uniform_buffers_indexed,
            IndexedBufferTarget::ShaderStorage => &self.bound_storage_buffers_indexed,
            IndexedBufferTarget::TransformFeedback => {
                &self.bound_transform_feedback_buffers_indexed
            }
        }
    }

    fn indexed_slots_mut(&mut self, target: IndexedBufferTarget) -> &mut Vec<Option<RawHandle>> {
        match target {
            IndexedBufferTarget::Uniform => &mut self.bound_uniform_buffers_indexed,
            IndexedBufferTarget::ShaderStorage => &mut self.bound_storage_buffers_indexed,
            IndexedBufferTarget::TransformFeedback => {
                &mut self.bound_transform_feedback_buffers_indexed
            }
        }
    }
}
