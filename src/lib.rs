//! Rusty buffer-streaming and binding-management layer on top of a stateful
//! graphics device API.
//!
//! The device (GPU) is a stateful external service: commands act on whatever
//! objects are currently bound, programs expose their inputs and outputs as
//! small-integer locations and binding indices, and uploads race the pipeline
//! unless the host is careful about which storage it touches. This crate puts
//! a typed, explicit layer over that surface:
//!
//! - [buffer::RingBuffer] streams elements into device memory through a
//!   wrapping write cursor, tracking the high-water mark of live data.
//! - [double_buffer::DoubleBuffer] pairs two ring buffers so readers and
//!   writers never share storage, with ping-pong [swap](double_buffer::DoubleBuffer::swap)
//!   and capacity changes that preserve device-side contents.
//! - [program::Program] registers a program's binding slots up front, resolves
//!   them once after linking, and hands out typed accessors that become silent
//!   no-ops when the compiler optimized a slot away.
//! - [transform_feedback::TransformFeedbackLayout] computes which output
//!   buffer binding each captured varying lands on, including the interleaved
//!   pseudo-descriptors (`gl_NextBuffer`, `gl_SkipComponents1..4`).
//! - [binding::BindingIndexAllocator] centralizes the per-target pools of
//!   counter binding indices, and [query::CounterQuery] drives them.
//!
//! All device access goes through a [runtime::Device] implementation owned by
//! a [runtime::Context]. The context also owns everything that would
//! otherwise be hidden global state: the host-side mirror of the device's
//! binding state, the index pools and the live-handle registry. Contexts are
//! fully independent of each other.
//!
//! # Validation mode
//!
//! With [runtime::ValidationMode::Enabled] the context checks binding
//! discipline (mutating a buffer requires it to be the current binding for
//! the target written through; nothing binds on a caller's behalf) and polls
//! the device's error state after operations. Both checks are skipped
//! entirely when validation is disabled. The toggle is a runtime value, so
//! the same binary can run either way.
//!
//! # Example
//!
//! ```rust
//! use gl_stream::buffer::RingBuffer;
//! use gl_stream::runtime::{BufferTarget, Context, EmulatedDevice, UsageHint, ValidationMode};
//!
//! let device = EmulatedDevice::new();
//! let mut context = Context::with_validation(device, ValidationMode::Enabled);
//!
//! let mut stream =
//!     RingBuffer::<[f32; 3]>::new(&mut context, 1024, UsageHint::StreamDraw).unwrap();
//!
//! stream.bind(&mut context, BufferTarget::Array);
//! stream
//!     .write(&mut context, BufferTarget::Array, &[[0.0, 1.0, 0.0]; 16])
//!     .unwrap();
//!
//! assert_eq!(stream.write_cursor(), 16);
//!
//! stream.delete(&mut context);
//! assert!(context.report_leaks().is_empty());
//! ```

pub mod binding;
pub mod buffer;
pub mod double_buffer;
pub mod program;
pub mod query;
pub mod runtime;
pub mod transform_feedback;
