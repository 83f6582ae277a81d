use fnv::FnvHashMap;

use crate::program::UniformValue;
use crate::runtime::device::{
    BufferTarget, CounterTarget, Device, DeviceError, IndexedBufferTarget, ObjectKind, RawHandle,
    ShaderSource, SlotKind, UsageHint,
};
use crate::transform_feedback::FeedbackMode;

/// One command received by an [EmulatedDevice], in submission order.
///
/// Byte payloads are recorded as lengths; the bytes themselves land in the
/// emulated buffer storage and can be read back.
#[derive(Clone, PartialEq, Debug)]
pub enum DeviceCall {
    CreateObject(ObjectKind, RawHandle),
    DeleteObject(ObjectKind, RawHandle),
    BindBuffer(BufferTarget, Option<RawHandle>),
    BindBufferIndexed(IndexedBufferTarget, u32, Option<RawHandle>, Option<(usize, usize)>),
    BufferData(BufferTarget, usize, UsageHint),
    BufferSubData(BufferTarget, usize, usize),
    CopyBufferSubData(usize, usize, usize),
    ReadBufferSubData(BufferTarget, usize, usize),
    UseProgram(Option<RawHandle>),
    LinkProgram(RawHandle, Vec<String>, Option<FeedbackMode>),
    ResolveSlot(RawHandle, SlotKind, String),
    SetBlockBinding(RawHandle, u32, u32),
    SetUniform(u32, UniformValue),
    SetAttributePointer(u32, usize, usize, bool),
    BeginCounter(CounterTarget, u32, RawHandle),
    EndCounter(CounterTarget, u32),
    CounterResult(RawHandle),
}

/// Software implementation of the [Device] contract.
///
/// Buffer storage is emulated byte-for-byte host-side, so upload/copy/read
/// round-trips are exact. Every command is appended to a call log, slot
/// resolution reads from a table configured up front, and error codes can be
/// injected. Together these make the device fully deterministic, which is
/// what the test suite runs against; it also serves as a headless backend.
pub struct EmulatedDevice {
    next_handle: RawHandle,
    calls: Vec<DeviceCall>,
    buffers: FnvHashMap<RawHandle, Vec<u8>>,
    bound: FnvHashMap<BufferTarget, RawHandle>,
    slots: FnvHashMap<(SlotKind, String), u32>,
    counters: FnvHashMap<RawHandle, u64>,
    pending_error: Option<DeviceError>,
    fail_next_link: Option<String>,
}

impl EmulatedDevice {
    pub fn new() -> Self {
        EmulatedDevice {
            next_handle: 1,
            calls: Vec::new(),
            buffers: FnvHashMap::default(),
            bound: FnvHashMap::default(),
            slots: FnvHashMap::default(),
            counters: FnvHashMap::default(),
            pending_error: None,
            fail_next_link: None,
        }
    }

    /// The commands received so far, in submission order.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Empties the call log.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Declares that the linked binary exposes a slot of the given kind and
    /// name at `location`. Names not declared resolve as inactive.
    pub fn define_slot<N>(&mut self, kind: SlotKind, name: N, location: u32)
    where
        N: Into<String>,
    {
        self.slots.insert((kind, name.into()), location);
    }

    /// Sets the value the next [Device::counter_result] call for `handle`
    /// returns.
    pub fn set_counter_value(&mut self, handle: RawHandle, value: u64) {
        self.counters.insert(handle, value);
    }

    /// Injects a sticky error, surfaced by the next [Device::poll_error].
    pub fn inject_error(&mut self, error: DeviceError) {
        self.pending_error = Some(error);
    }

    /// Makes the next [Device::link_program] call fail with `message`.
    pub fn fail_next_link<M>(&mut self, message: M)
    where
        M: Into<String>,
    {
        self.fail_next_link = Some(message.into());
    }

    /// Raw view of an emulated buffer's storage.
    pub fn buffer_bytes(&self, handle: RawHandle) -> Option<&[u8]> {
        self.buffers.get(&handle).map(|b| b.as_slice())
    }

    fn record_error<M>(&mut self, code: u32, message: M)
    where
        M: Into<String>,
    {
        // First error wins, matching sticky device error semantics.
        if self.pending_error.is_none() {
            self.pending_error = Some(DeviceError::new(code, message));
        }
    }

    fn try_buffer_data(&mut self, target: BufferTarget, size: usize) -> Result<(), String> {
        let handle = self
            .bound
            .get(&target)
            .copied()
            .ok_or_else(|| format!("buffer_data: no buffer bound to {}", target))?;
        let storage = self
            .buffers
            .get_mut(&handle)
            .ok_or_else(|| format!("buffer_data: handle {} is not a buffer", handle))?;

        storage.clear();
        storage.resize(size, 0);

        Ok(())
    }

    fn try_buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> Result<(), String> {
        let handle = self
            .bound
            .get(&target)
            .copied()
            .ok_or_else(|| format!("buffer_sub_data: no buffer bound to {}", target))?;
        let storage = self
            .buffers
            .get_mut(&handle)
            .ok_or_else(|| format!("buffer_sub_data: handle {} is not a buffer", handle))?;

        if offset + data.len() > storage.len() {
            return Err(format!("buffer_sub_data: range out of bounds on {}", target));
        }

        storage[offset..offset + data.len()].copy_from_slice(data);

        Ok(())
    }

    fn try_copy_buffer_sub_data(
        &mut self,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) -> Result<(), String> {
        let source = self
            .bound
            .get(&BufferTarget::CopyRead)
            .and_then(|handle| self.buffers.get(handle))
            .ok_or_else(|| "copy_buffer_sub_data: no buffer bound for reading".to_string())?;

        if read_offset + size > source.len() {
            return Err("copy_buffer_sub_data: invalid source range".to_string());
        }

        let bytes = source[read_offset..read_offset + size].to_vec();

        let write_handle = self
            .bound
            .get(&BufferTarget::CopyWrite)
            .copied()
            .ok_or_else(|| "copy_buffer_sub_data: no buffer bound for writing".to_string())?;
        let destination = self
            .buffers
            .get_mut(&write_handle)
            .ok_or_else(|| format!("copy_buffer_sub_data: handle {} is not a buffer", write_handle))?;

        if write_offset + size > destination.len() {
            return Err("copy_buffer_sub_data: invalid destination range".to_string());
        }

        destination[write_offset..write_offset + size].copy_from_slice(&bytes);

        Ok(())
    }

    fn try_read_buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        out: &mut [u8],
    ) -> Result<(), String> {
        let storage = self
            .bound
            .get(&target)
            .and_then(|handle| self.buffers.get(handle))
            .ok_or_else(|| format!("read_buffer_sub_data: no buffer bound to {}", target))?;

        if offset + out.len() > storage.len() {
            return Err(format!("read_buffer_sub_data: invalid range on {}", target));
        }

        out.copy_from_slice(&storage[offset..offset + out.len()]);

        Ok(())
    }
}

impl Default for EmulatedDevice {
    fn default() -> Self {
        EmulatedDevice::new()
    }
}

/// Error code the emulation reports for out-of-range buffer accesses.
pub const EMULATED_INVALID_OPERATION: u32 = 0x0502;

impl Device for EmulatedDevice {
    fn create_object(&mut self, kind: ObjectKind) -> RawHandle {
        let handle = self.next_handle;

        self.next_handle += 1;

        if kind == ObjectKind::Buffer {
            self.buffers.insert(handle, Vec::new());
        }

        self.calls.push(DeviceCall::CreateObject(kind, handle));

        handle
    }

    fn delete_object(&mut self, kind: ObjectKind, handle: RawHandle) {
        if kind == ObjectKind::Buffer {
            self.buffers.remove(&handle);
        }

        self.calls.push(DeviceCall::DeleteObject(kind, handle));
    }

    fn bind_buffer(&mut self, target: BufferTarget, handle: Option<RawHandle>) {
        match handle {
            Some(handle) => {
                self.bound.insert(target, handle);
            }
            None => {
                self.bound.remove(&target);
            }
        }

        self.calls.push(DeviceCall::BindBuffer(target, handle));
    }

    fn bind_buffer_indexed(
        &mut self,
        target: IndexedBufferTarget,
        index: u32,
        handle: Option<RawHandle>,
        range: Option<(usize, usize)>,
    ) {
        self.calls
            .push(DeviceCall::BindBufferIndexed(target, index, handle, range));
    }

    fn buffer_data(&mut self, target: BufferTarget, size: usize, usage: UsageHint) {
        self.calls.push(DeviceCall::BufferData(target, size, usage));

        if let Err(message) = self.try_buffer_data(target, size) {
            self.record_error(EMULATED_INVALID_OPERATION, message);
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.calls
            .push(DeviceCall::BufferSubData(target, offset, data.len()));

        if let Err(message) = self.try_buffer_sub_data(target, offset, data) {
            self.record_error(EMULATED_INVALID_OPERATION, message);
        }
    }

    fn copy_buffer_sub_data(&mut self, read_offset: usize, write_offset: usize, size: usize) {
        self.calls
            .push(DeviceCall::CopyBufferSubData(read_offset, write_offset, size));

        if let Err(message) = self.try_copy_buffer_sub_data(read_offset, write_offset, size) {
            self.record_error(EMULATED_INVALID_OPERATION, message);
        }
    }

    fn buffer_size(&mut self, target: BufferTarget) -> usize {
        self.bound
            .get(&target)
            .and_then(|handle| self.buffers.get(handle))
            .map(|storage| storage.len())
            .unwrap_or(0)
    }

    fn read_buffer_sub_data(&mut self, target: BufferTarget, offset: usize, out: &mut [u8]) {
        self.calls
            .push(DeviceCall::ReadBufferSubData(target, offset, out.len()));

        if let Err(message) = self.try_read_buffer_sub_data(target, offset, out) {
            self.record_error(EMULATED_INVALID_OPERATION, message);
        }
    }

    fn use_program(&mut self, handle: Option<RawHandle>) {
        self.calls.push(DeviceCall::UseProgram(handle));
    }

    fn link_program(
        &mut self,
        handle: RawHandle,
        _sources: &[ShaderSource],
        varyings: &[String],
        mode: Option<FeedbackMode>,
    ) -> Result<(), DeviceError> {
        self.calls
            .push(DeviceCall::LinkProgram(handle, varyings.to_vec(), mode));

        if let Some(message) = self.fail_next_link.take() {
            return Err(DeviceError::new(EMULATED_INVALID_OPERATION, message));
        }

        Ok(())
    }

    fn resolve_slot(&mut self, program: RawHandle, kind: SlotKind, name: &str) -> Option<u32> {
        self.calls
            .push(DeviceCall::ResolveSlot(program, kind, name.to_string()));

        self.slots.get(&(kind, name.to_string())).copied()
    }

    fn set_block_binding(&mut self, program: RawHandle, block_index: u32, binding: u32) {
        self.calls
            .push(DeviceCall::SetBlockBinding(program, block_index, binding));
    }

    fn set_uniform(&mut self, location: u32, value: &UniformValue) {
        self.calls.push(DeviceCall::SetUniform(location, *value));
    }

    fn set_attribute_pointer(
        &mut self,
        location: u32,
        stride: usize,
        offset: usize,
        normalized: bool,
    ) {
        self.calls.push(DeviceCall::SetAttributePointer(
            location, stride, offset, normalized,
        ));
    }

    fn begin_counter(&mut self, target: CounterTarget, index: u32, handle: RawHandle) {
        self.calls
            .push(DeviceCall::BeginCounter(target, index, handle));
    }

    fn end_counter(&mut self, target: CounterTarget, index: u32) {
        self.calls.push(DeviceCall::EndCounter(target, index));
    }

    fn counter_result(&mut self, handle: RawHandle) -> u64 {
        self.calls.push(DeviceCall::CounterResult(handle));

        self.counters.get(&handle).copied().unwrap_or(0)
    }

    fn bound_buffer(&mut self, target: BufferTarget) -> Option<RawHandle> {
        self.bound.get(&target).copied()
    }

    fn poll_error(&mut self) -> Option<DeviceError> {
        self.pending_error.take()
    }
}
