use std::marker;
use std::mem;

use bytemuck::{Pod, Zeroable};
use failure::Fail;

use crate::runtime::{
    BindingDisciplineError, BufferTarget, Context, Device, DeviceError, ObjectKind,
    ResourceHandle, UsageHint,
};

/// A fixed-capacity device buffer written through a wrapping cursor.
///
/// A `RingBuffer` streams data into device memory without stalling the
/// pipeline: successive [RingBuffer::write] calls append behind the cursor and
/// wrap at the end of the storage, so a producer can keep feeding elements
/// while the device consumes earlier ranges. The high-water mark tracks the
/// furthest extent ever written with live data; consumers use it to know how
/// much of the buffer holds meaningful elements.
///
/// The buffer does not bind itself for writes. Callers bind it to the target
/// they intend to write through ([RingBuffer::bind]) and pass that target to
/// the write operations; when the owning context runs in validation mode,
/// writing through a target the buffer is not currently bound to is an error.
pub struct RingBuffer<T>
where
    T: Pod,
{
    handle: ResourceHandle,
    capacity: usize,
    write_cursor: usize,
    high_water_mark: usize,
    usage: UsageHint,
    _marker: marker::PhantomData<T>,
}

impl<T> RingBuffer<T>
where
    T: Pod,
{
    /// Allocates device storage for `capacity` elements.
    ///
    /// The new buffer is left bound to the copy-write target.
    pub fn new<D>(
        context: &mut Context<D>,
        capacity: usize,
        usage: UsageHint,
    ) -> Result<Self, BufferError>
    where
        D: Device,
    {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }

        let handle = context.create_handle(ObjectKind::Buffer);

        context.bind_buffer(BufferTarget::CopyWrite, &handle);

        let mut buffer = RingBuffer {
            handle,
            capacity,
            write_cursor: 0,
            high_water_mark: 0,
            usage,
            _marker: marker::PhantomData,
        };

        buffer.specify_storage(context, BufferTarget::CopyWrite)?;

        Ok(buffer)
    }

    /// Allocates device storage for `capacity` elements and streams `data`
    /// into it, leaving the cursor and high-water mark as a plain
    /// [RingBuffer::write] would.
    pub fn with_data<D>(
        context: &mut Context<D>,
        capacity: usize,
        data: &[T],
        usage: UsageHint,
    ) -> Result<Self, BufferError>
    where
        D: Device,
    {
        let mut buffer = RingBuffer::new(context, capacity, usage)?;

        buffer.write(context, BufferTarget::CopyWrite, data)?;

        Ok(buffer)
    }

    /// The number of elements the device storage holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size in bytes of one element.
    pub fn element_size(&self) -> usize {
        mem::size_of::<T>()
    }

    /// The position the next streamed write begins at.
    ///
    /// Always in `0..capacity`.
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// The furthest extent of the buffer ever written with live data.
    ///
    /// Tracks the maximum cursor position reached until the cursor wraps for
    /// the first time; any wrapping write saturates it at `capacity`, even
    /// when fewer elements are logically live from the caller's perspective.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    pub fn usage(&self) -> UsageHint {
        self.usage
    }

    /// The handle owning the device-side storage.
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Binds this buffer to `target`.
    pub fn bind<D>(&self, context: &mut Context<D>, target: BufferTarget)
    where
        D: Device,
    {
        context.bind_buffer(target, &self.handle);
    }

    /// Streams `data` into the buffer at the write cursor, wrapping at the
    /// end of the storage.
    ///
    /// A write that spans the end is split: the tail lands in
    /// `[cursor, capacity)` and the remainder restarts at element 0. Fails
    /// before any device call when `data` holds more elements than the whole
    /// buffer.
    pub fn write<D>(
        &mut self,
        context: &mut Context<D>,
        target: BufferTarget,
        data: &[T],
    ) -> Result<(), BufferError>
    where
        D: Device,
    {
        if data.len() > self.capacity {
            return Err(BufferError::WriteTooLarge {
                len: data.len(),
                capacity: self.capacity,
            });
        }

        if data.is_empty() {
            return Ok(());
        }

        context.expect_bound(target, self.handle.raw())?;

        let tail_room = self.capacity - self.write_cursor;

        if data.len() <= tail_room {
            self.upload(context, target, self.write_cursor, data);

            self.write_cursor += data.len();

            if self.write_cursor == self.capacity {
                self.write_cursor = 0;
            }

            let reached = if self.write_cursor == 0 {
                self.capacity
            } else {
                self.write_cursor
            };

            if reached > self.high_water_mark {
                self.high_water_mark = reached;
            }
        } else {
            self.upload(context, target, self.write_cursor, &data[..tail_room]);
            self.upload(context, target, 0, &data[tail_room..]);

            self.write_cursor = data.len() - tail_room;
            self.high_water_mark = self.capacity;
        }

        context.check_device_error()?;

        Ok(())
    }

    /// Uploads `count` elements of `data` at an explicit element offset.
    ///
    /// Does not advance the write cursor or touch the high-water mark; this
    /// is the raw upload primitive [RingBuffer::write] is built on. Validated
    /// independently: the destination range must fit the storage and `data`
    /// must hold at least `count` elements.
    pub fn write_at<D>(
        &mut self,
        context: &mut Context<D>,
        target: BufferTarget,
        data: &[T],
        offset: usize,
        count: usize,
    ) -> Result<(), BufferError>
    where
        D: Device,
    {
        if offset + count > self.capacity {
            return Err(BufferError::RangeOutOfBounds {
                offset,
                count,
                capacity: self.capacity,
            });
        }

        if count > data.len() {
            return Err(BufferError::InsufficientData {
                count,
                len: data.len(),
            });
        }

        context.expect_bound(target, self.handle.raw())?;

        self.upload(context, target, offset, &data[..count]);

        context.check_device_error()?;

        Ok(())
    }

    /// Orphans the device storage and resets the cursor and high-water mark
    /// to 0.
    pub fn clear<D>(
        &mut self,
        context: &mut Context<D>,
        target: BufferTarget,
    ) -> Result<(), BufferError>
    where
        D: Device,
    {
        context.expect_bound(target, self.handle.raw())?;

        let size = self.capacity * self.element_size();

        context.device_mut().buffer_data(target, size, self.usage);

        self.write_cursor = 0;
        self.high_water_mark = 0;

        self.check_storage_size(context, target, size)?;
        context.check_device_error()?;

        Ok(())
    }

    /// Copies `count` elements device-side from `source`, without a host
    /// transfer.
    ///
    /// Binds `source` to the copy-read target and this buffer to the
    /// copy-write target.
    pub fn copy_from<D>(
        &mut self,
        context: &mut Context<D>,
        source: &RingBuffer<T>,
        read_offset: usize,
        write_offset: usize,
        count: usize,
    ) -> Result<(), BufferError>
    where
        D: Device,
    {
        if read_offset + count > source.capacity {
            return Err(BufferError::RangeOutOfBounds {
                offset: read_offset,
                count,
                capacity: source.capacity,
            });
        }

        if write_offset + count > self.capacity {
            return Err(BufferError::RangeOutOfBounds {
                offset: write_offset,
                count,
                capacity: self.capacity,
            });
        }

        source.bind(context, BufferTarget::CopyRead);
        self.bind(context, BufferTarget::CopyWrite);

        let element_size = self.element_size();

        context.device_mut().copy_buffer_sub_data(
            read_offset * element_size,
            write_offset * element_size,
            count * element_size,
        );

        context.check_device_error()?;

        Ok(())
    }

    /// Copies `min(capacity, source.capacity)` elements from the start of
    /// `source` to the start of this buffer.
    pub fn copy_all_from<D>(
        &mut self,
        context: &mut Context<D>,
        source: &RingBuffer<T>,
    ) -> Result<(), BufferError>
    where
        D: Device,
    {
        let count = self.capacity.min(source.capacity);

        self.copy_from(context, source, 0, 0, count)
    }

    /// Reads the full device-side contents back to the host.
    ///
    /// Debug/inspection operation; may force the host to wait for prior
    /// writes to this buffer to complete. Elements beyond the high-water mark
    /// have never been written and hold whatever the device initialized the
    /// storage to.
    pub fn read_back<D>(&self, context: &mut Context<D>) -> Result<Vec<T>, BufferError>
    where
        D: Device,
    {
        self.bind(context, BufferTarget::CopyRead);

        let mut contents = vec![T::zeroed(); self.capacity];

        context.device_mut().read_buffer_sub_data(
            BufferTarget::CopyRead,
            0,
            bytemuck::cast_slice_mut(&mut contents),
        );

        context.check_device_error()?;

        Ok(contents)
    }

    /// Releases the device storage.
    pub fn delete<D>(self, context: &mut Context<D>)
    where
        D: Device,
    {
        let RingBuffer { handle, .. } = self;

        handle.release(context);
    }

    /// Reallocates the device storage at a new capacity, discarding contents
    /// and stream state.
    pub(crate) fn reallocate<D>(
        &mut self,
        context: &mut Context<D>,
        new_capacity: usize,
    ) -> Result<(), BufferError>
    where
        D: Device,
    {
        if new_capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }

        context.bind_buffer(BufferTarget::CopyWrite, &self.handle);

        self.capacity = new_capacity;
        self.write_cursor = 0;
        self.high_water_mark = 0;

        self.specify_storage(context, BufferTarget::CopyWrite)
    }

    pub(crate) fn set_stream_state(&mut self, write_cursor: usize, high_water_mark: usize) {
        self.write_cursor = write_cursor;
        self.high_water_mark = high_water_mark;
    }

    fn specify_storage<D>(
        &mut self,
        context: &mut Context<D>,
        target: BufferTarget,
    ) -> Result<(), BufferError>
    where
        D: Device,
    {
        let size = self.capacity * self.element_size();

        context.device_mut().buffer_data(target, size, self.usage);

        self.check_storage_size(context, target, size)?;
        context.check_device_error()?;

        Ok(())
    }

    fn upload<D>(
        &mut self,
        context: &mut Context<D>,
        target: BufferTarget,
        element_offset: usize,
        data: &[T],
    ) where
        D: Device,
    {
        context.device_mut().buffer_sub_data(
            target,
            element_offset * self.element_size(),
            bytemuck::cast_slice(data),
        );
    }

    fn check_storage_size<D>(
        &mut self,
        context: &mut Context<D>,
        target: BufferTarget,
        expected: usize,
    ) -> Result<(), BufferError>
    where
        D: Device,
    {
        if !context.validation().is_enabled() {
            return Ok(());
        }

        let actual = context.device_mut().buffer_size(target);

        if actual != expected {
            return Err(BufferError::SizeMismatch { expected, actual });
        }

        Ok(())
    }
}

/// Errors raised by buffer operations.
#[derive(Fail, Clone, PartialEq, Debug)]
pub enum BufferError {
    #[fail(display = "buffer capacity must be at least 1 element")]
    ZeroCapacity,
    #[fail(display = "write of {} elements exceeds capacity {}", len, capacity)]
    WriteTooLarge { len: usize, capacity: usize },
    #[fail(
        display = "range of {} elements at offset {} is out of bounds for capacity {}",
        count, offset, capacity
    )]
    RangeOutOfBounds {
        offset: usize,
        count: usize,
        capacity: usize,
    },
    #[fail(display = "{} elements requested but the source slice holds {}", count, len)]
    InsufficientData { count: usize, len: usize },
    #[fail(
        display = "device storage holds {} bytes where {} were requested",
        actual, expected
    )]
    SizeMismatch { expected: usize, actual: usize },
    #[fail(display = "{}", _0)]
    NotBound(#[fail(cause)] BindingDisciplineError),
    #[fail(display = "{}", _0)]
    Device(#[fail(cause)] DeviceError),
}

impl From<BindingDisciplineError> for BufferError {
    fn from(error: BindingDisciplineError) -> Self {
        BufferError::NotBound(error)
    }
}

impl From<DeviceError> for BufferError {
    fn from(error: DeviceError) -> Self {
        BufferError::Device(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{EmulatedDevice, ValidationMode};

    fn test_context() -> Context<EmulatedDevice> {
        Context::with_validation(EmulatedDevice::new(), ValidationMode::Enabled)
    }

    fn drain(mut context: Context<EmulatedDevice>, buffers: Vec<RingBuffer<u32>>) {
        for buffer in buffers {
            buffer.delete(&mut context);
        }
    }

    #[test]
    fn cursor_and_high_water_mark_stay_in_range() {
        let mut context = test_context();
        let mut buffer = RingBuffer::<u32>::new(&mut context, 8, UsageHint::StreamDraw).unwrap();

        buffer.bind(&mut context, BufferTarget::Array);

        for chunk in &[3usize, 5, 7, 2, 8, 1] {
            let data: Vec<u32> = (0..*chunk as u32).collect();

            buffer.write(&mut context, BufferTarget::Array, &data).unwrap();

            assert!(buffer.write_cursor() < 8);
            assert!(buffer.high_water_mark() <= 8);
        }

        drain(context, vec![buffer]);
    }

    #[test]
    fn single_write_advances_cursor_modulo_capacity() {
        let mut context = test_context();
        let mut buffer = RingBuffer::<u32>::new(&mut context, 6, UsageHint::StreamDraw).unwrap();

        buffer.bind(&mut context, BufferTarget::Array);
        buffer
            .write(&mut context, BufferTarget::Array, &[1, 2, 3, 4])
            .unwrap();

        assert_eq!(buffer.write_cursor(), 4);
        assert_eq!(buffer.high_water_mark(), 4);

        drain(context, vec![buffer]);
    }

    #[test]
    fn full_write_wraps_cursor_and_saturates_high_water_mark() {
        let mut context = test_context();
        let mut buffer = RingBuffer::<u32>::new(&mut context, 4, UsageHint::StreamDraw).unwrap();

        buffer.bind(&mut context, BufferTarget::Array);
        buffer
            .write(&mut context, BufferTarget::Array, &[1, 2, 3, 4])
            .unwrap();

        assert_eq!(buffer.write_cursor(), 0);
        assert_eq!(buffer.high_water_mark(), 4);

        drain(context, vec![buffer]);
    }

    #[test]
    fn spanning_write_splits_across_the_end() {
        let mut context = test_context();
        let mut buffer = RingBuffer::<u32>::new(&mut context, 8, UsageHint::StreamDraw).unwrap();

        buffer.bind(&mut context, BufferTarget::Array);
        buffer
            .write(&mut context, BufferTarget::Array, &[0, 0, 0, 0, 0])
            .unwrap();

        let input = [10, 20, 30, 40, 50, 60];

        buffer.write(&mut context, BufferTarget::Array, &input).unwrap();

        assert_eq!(buffer.write_cursor(), 3);
        assert_eq!(buffer.high_water_mark(), 8);

        let contents = buffer.read_back(&mut context).unwrap();
        let mut ring_order = Vec::new();

        ring_order.extend_from_slice(&contents[5..8]);
        ring_order.extend_from_slice(&contents[0..3]);

        assert_eq!(ring_order, input);

        drain(context, vec![buffer]);
    }

    #[test]
    fn write_larger_than_capacity_is_rejected_before_any_device_call() {
        let mut context = test_context();
        let mut buffer = RingBuffer::<u32>::new(&mut context, 4, UsageHint::StreamDraw).unwrap();

        buffer.bind(&mut context, BufferTarget::Array);
        context.device_mut().clear_calls();

        let result = buffer.write(&mut context, BufferTarget::Array, &[0; 5]);

        assert_eq!(
            result,
            Err(BufferError::WriteTooLarge {
                len: 5,
                capacity: 4
            })
        );
        assert!(context.device().calls().is_empty());

        drain(context, vec![buffer]);
    }

    #[test]
    fn write_at_validates_range_and_source_length() {
        let mut context = test_context();
        let mut buffer = RingBuffer::<u32>::new(&mut context, 4, UsageHint::StreamDraw).unwrap();

        buffer.bind(&mut context, BufferTarget::Array);

        assert_eq!(
            buffer.write_at(&mut context, BufferTarget::Array, &[1, 2], 3, 2),
            Err(BufferError::RangeOutOfBounds {
                offset: 3,
                count: 2,
                capacity: 4
            })
        );
        assert_eq!(
            buffer.write_at(&mut context, BufferTarget::Array, &[1, 2], 0, 3),
            Err(BufferError::InsufficientData { count: 3, len: 2 })
        );

        buffer
            .write_at(&mut context, BufferTarget::Array, &[7, 8], 2, 2)
            .unwrap();

        assert_eq!(buffer.write_cursor(), 0, "write_at must not move the cursor");

        let contents = buffer.read_back(&mut context).unwrap();

        assert_eq!(&contents[2..4], &[7, 8]);

        drain(context, vec![buffer]);
    }

    #[test]
    fn copy_from_reproduces_the_source_range() {
        let mut context = test_context();
        let source = RingBuffer::<u32>::with_data(
            &mut context,
            6,
            &[1, 2, 3, 4, 5, 6],
            UsageHint::StaticCopy,
        )
        .unwrap();
        let mut destination =
            RingBuffer::<u32>::new(&mut context, 4, UsageHint::StreamDraw).unwrap();

        destination
            .copy_from(&mut context, &source, 2, 0, 3)
            .unwrap();

        let contents = destination.read_back(&mut context).unwrap();

        assert_eq!(&contents[0..3], &[3, 4, 5]);

        drain(context, vec![source, destination]);
    }

    #[test]
    fn clear_resets_stream_state() {
        let mut context = test_context();
        let mut buffer =
            RingBuffer::<u32>::with_data(&mut context, 4, &[1, 2, 3], UsageHint::StreamDraw)
                .unwrap();

        assert_eq!(buffer.write_cursor(), 3);

        buffer.bind(&mut context, BufferTarget::Array);
        buffer.clear(&mut context, BufferTarget::Array).unwrap();

        assert_eq!(buffer.write_cursor(), 0);
        assert_eq!(buffer.high_water_mark(), 0);

        drain(context, vec![buffer]);
    }

    #[test]
    fn writing_through_an_unbound_target_fails_in_validation_mode() {
        let mut context = test_context();
        let mut buffer = RingBuffer::<u32>::new(&mut context, 4, UsageHint::StreamDraw).unwrap();

        let result = buffer.write(&mut context, BufferTarget::Array, &[1]);

        match result {
            Err(BufferError::NotBound(error)) => {
                assert_eq!(error.target, BufferTarget::Array);
            }
            other => panic!("expected a binding discipline error, got {:?}", other),
        }

        drain(context, vec![buffer]);
    }

    #[test]
    fn device_errors_surface_only_in_validation_mode() {
        let mut context = test_context();
        let mut buffer = RingBuffer::<u32>::new(&mut context, 4, UsageHint::StreamDraw).unwrap();

        buffer.bind(&mut context, BufferTarget::Array);
        context
            .device_mut()
            .inject_error(DeviceError::new(0x0505, "out of memory"));

        let result = buffer.write(&mut context, BufferTarget::Array, &[1]);

        assert_eq!(
            result,
            Err(BufferError::Device(DeviceError::new(0x0505, "out of memory")))
        );

        context.set_validation(ValidationMode::Disabled);
        context
            .device_mut()
            .inject_error(DeviceError::new(0x0505, "out of memory"));

        assert!(buffer.write(&mut context, BufferTarget::Array, &[1]).is_ok());

        drain(context, vec![buffer]);
    }
}
