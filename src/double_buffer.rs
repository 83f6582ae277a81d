use std::mem;

use bytemuck::Pod;

use crate::buffer::{BufferError, RingBuffer};
use crate::runtime::{Context, Device, UsageHint};

/// A front/back pair of [RingBuffer]s swapped each cycle, so writers and
/// readers never touch the same storage simultaneously.
///
/// The front buffer is the published side consumers read from; the back
/// buffer is the side being written. [DoubleBuffer::swap] promotes the back
/// buffer and carries the front's cursor and high-water mark over to it, so
/// the newly promoted front continues the same logical stream state.
pub struct DoubleBuffer<T>
where
    T: Pod,
{
    front: RingBuffer<T>,
    back: RingBuffer<T>,
}

impl<T> DoubleBuffer<T>
where
    T: Pod,
{
    /// Allocates both buffers at `capacity` elements.
    pub fn new<D>(
        context: &mut Context<D>,
        capacity: usize,
        usage: UsageHint,
    ) -> Result<Self, BufferError>
    where
        D: Device,
    {
        let front = RingBuffer::new(context, capacity, usage)?;
        let back = RingBuffer::new(context, capacity, usage)?;

        Ok(DoubleBuffer { front, back })
    }

    /// Allocates both buffers at `capacity` elements and streams `data` into
    /// the front buffer.
    pub fn with_data<D>(
        context: &mut Context<D>,
        capacity: usize,
        data: &[T],
        usage: UsageHint,
    ) -> Result<Self, BufferError>
    where
        D: Device,
    {
        let front = RingBuffer::with_data(context, capacity, data, usage)?;
        let back = RingBuffer::new(context, capacity, usage)?;

        Ok(DoubleBuffer { front, back })
    }

    /// The published buffer consumers read from.
    pub fn front(&self) -> &RingBuffer<T> {
        &self.front
    }

    pub fn front_mut(&mut self) -> &mut RingBuffer<T> {
        &mut self.front
    }

    /// The buffer currently being written.
    pub fn back(&self) -> &RingBuffer<T> {
        &self.back
    }

    pub fn back_mut(&mut self) -> &mut RingBuffer<T> {
        &mut self.back
    }

    pub fn capacity(&self) -> usize {
        self.front.capacity()
    }

    /// Exchanges the front and back roles.
    ///
    /// The outgoing front's cursor and high-water mark are copied into the
    /// buffer being promoted first, so consumers observe a continuous stream.
    /// Swapping twice restores the original state exactly.
    pub fn swap(&mut self) {
        self.back
            .set_stream_state(self.front.write_cursor(), self.front.high_water_mark());

        mem::swap(&mut self.front, &mut self.back);
    }

    /// Changes the capacity of both buffers to `new_capacity`, preserving
    /// front data device-side.
    ///
    /// The front's cursor is remapped into the new range and its high-water
    /// mark clamped; `min(capacity, new_capacity)` elements are device-copied
    /// into freshly allocated storage which is then promoted to front. No
    /// element addressable under the new capacity is lost.
    pub fn resize<D>(
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

        let live = self.front.capacity().min(new_capacity);

        self.front.set_stream_state(
            self.front.write_cursor() % new_capacity,
            self.front.high_water_mark().min(new_capacity),
        );

        self.back.reallocate(context, new_capacity)?;
        self.back.copy_from(context, &self.front, 0, 0, live)?;

        self.swap();

        self.back.reallocate(context, new_capacity)?;

        Ok(())
    }

    /// Releases both device buffers.
    pub fn delete<D>(self, context: &mut Context<D>)
    where
        D: Device,
    {
        let DoubleBuffer { front, back } = self;

        front.delete(context);
        back.delete(context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{BufferTarget, EmulatedDevice, ValidationMode};

    fn test_context() -> Context<EmulatedDevice> {
        Context::with_validation(EmulatedDevice::new(), ValidationMode::Enabled)
    }

    #[test]
    fn swap_is_its_own_inverse() {
        let mut context = test_context();
        let mut pod =
            DoubleBuffer::<u32>::with_data(&mut context, 8, &[1, 2, 3], UsageHint::StreamDraw)
                .unwrap();

        let front_raw = pod.front().handle().raw();
        let back_raw = pod.back().handle().raw();
        let cursor = pod.front().write_cursor();
        let high_water_mark = pod.front().high_water_mark();

        pod.swap();

        assert_eq!(pod.front().handle().raw(), back_raw);
        assert_eq!(pod.front().write_cursor(), cursor);
        assert_eq!(pod.front().high_water_mark(), high_water_mark);

        pod.swap();

        assert_eq!(pod.front().handle().raw(), front_raw);
        assert_eq!(pod.back().handle().raw(), back_raw);
        assert_eq!(pod.front().write_cursor(), cursor);
        assert_eq!(pod.front().high_water_mark(), high_water_mark);

        pod.delete(&mut context);
    }

    #[test]
    fn swap_promotes_the_written_back_buffer() {
        let mut context = test_context();
        let mut pod = DoubleBuffer::<u32>::new(&mut context, 4, UsageHint::StreamDraw).unwrap();

        pod.back_mut().bind(&mut context, BufferTarget::Array);
        pod.back_mut()
            .write(&mut context, BufferTarget::Array, &[9, 9])
            .unwrap();

        let written_raw = pod.back().handle().raw();

        pod.swap();

        assert_eq!(pod.front().handle().raw(), written_raw);

        let contents = pod.front().read_back(&mut context).unwrap();

        assert_eq!(&contents[0..2], &[9, 9]);

        pod.delete(&mut context);
    }

    #[test]
    fn resize_grows_both_buffers_and_preserves_data() {
        let mut context = test_context();
        let mut pod =
            DoubleBuffer::<u32>::with_data(&mut context, 4, &[1, 2, 3], UsageHint::StreamDraw)
                .unwrap();

        pod.resize(&mut context, 8).unwrap();

        assert_eq!(pod.front().capacity(), 8);
        assert_eq!(pod.back().capacity(), 8);
        assert_eq!(pod.front().write_cursor(), 3);
        assert_eq!(pod.front().high_water_mark(), 3);

        let contents = pod.front().read_back(&mut context).unwrap();

        assert_eq!(&contents[0..3], &[1, 2, 3]);

        pod.delete(&mut context);
    }

    #[test]
    fn resize_shrink_remaps_cursor_and_clamps_high_water_mark() {
        let mut context = test_context();
        let mut pod = DoubleBuffer::<u32>::with_data(
            &mut context,
            8,
            &[1, 2, 3, 4, 5, 6, 7],
            UsageHint::StreamDraw,
        )
        .unwrap();

        pod.resize(&mut context, 4).unwrap();

        assert_eq!(pod.front().capacity(), 4);
        // Cursor 7 remaps to 7 mod 4.
        assert_eq!(pod.front().write_cursor(), 3);
        assert_eq!(pod.front().high_water_mark(), 4);

        let contents = pod.front().read_back(&mut context).unwrap();

        assert_eq!(contents, vec![1, 2, 3, 4]);

        pod.delete(&mut context);
    }
}
