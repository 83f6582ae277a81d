//! End-to-end streaming scenario against the emulated device: a particle
//! update program captures its output through transform feedback into a
//! double-buffered stream, a counter tracks written primitives, and every
//! resource is released at the end of the session.

use gl_stream::double_buffer::DoubleBuffer;
use gl_stream::program::{AttributeBinding, Program, ProgramDescriptor};
use gl_stream::query::CounterQuery;
use gl_stream::runtime::{
    BufferTarget, Context, CounterTarget, DeviceCall, EmulatedDevice, IndexedBufferTarget,
    SlotKind, UsageHint, ValidationMode,
};
use gl_stream::transform_feedback::{FeedbackMode, TransformFeedbackLayoutBuilder};

type Particle = [f32; 4];

#[test]
fn particle_stream_updates_through_transform_feedback() {
    let mut context = Context::with_validation(EmulatedDevice::new(), ValidationMode::Enabled);

    context
        .device_mut()
        .define_slot(SlotKind::Uniform, "u_delta_time", 0);
    context
        .device_mut()
        .define_slot(SlotKind::Attribute, "a_particle", 0);

    let layout = TransformFeedbackLayoutBuilder::new(FeedbackMode::Interleaved)
        .varying("v_particle")
        .finish()
        .unwrap();

    let descriptor = ProgramDescriptor::builder()
        .vertex_source("void main() { /* integrate */ }")
        .uniform("u_delta_time")
        .attribute("a_particle")
        .transform_feedback(layout)
        .finish();

    let mut program = Program::new(&mut context, descriptor);

    program.link(&mut context).unwrap();

    // The capture layout reached the device link call verbatim.
    let program_raw = program.handle().raw();
    let link_call = context
        .device()
        .calls()
        .iter()
        .find_map(|call| match call {
            DeviceCall::LinkProgram(handle, varyings, mode) if *handle == program_raw => {
                Some((varyings.clone(), *mode))
            }
            _ => None,
        })
        .expect("no link call was issued");

    assert_eq!(
        link_call,
        (
            vec!["v_particle".to_string()],
            Some(FeedbackMode::Interleaved)
        )
    );

    program.activate(&mut context).unwrap();

    let seed: Vec<Particle> = (0..32).map(|i| [i as f32, 0.0, 0.0, 1.0]).collect();
    let mut particles =
        DoubleBuffer::<Particle>::with_data(&mut context, 32, &seed, UsageHint::StreamCopy)
            .unwrap();
    let mut written = CounterQuery::new(&mut context, CounterTarget::FeedbackPrimitivesWritten);

    // Seeding wrote the full capacity, so the stream cursor wrapped.
    assert_eq!(particles.front().write_cursor(), 0);
    assert_eq!(particles.front().high_water_mark(), 32);

    for frame in 0..3 {
        program
            .uniform("u_delta_time")
            .unwrap()
            .set(&mut context, 0.016f32)
            .unwrap();

        // The published front feeds the vertex input; the back captures.
        program.attribute("a_particle").unwrap().bind(
            &mut context,
            particles.front(),
            AttributeBinding::default(),
        );

        let back_raw = particles.back().handle().raw();

        program
            .transform_out("v_particle")
            .unwrap()
            .bind_buffer(&mut context, particles.back());

        assert_eq!(
            context
                .binding_state()
                .bound_buffer_indexed(IndexedBufferTarget::TransformFeedback, 0),
            Some(back_raw)
        );

        let index = written.begin(&mut context).unwrap();

        assert_eq!(index, 0);

        // The draw call filling the capture buffer belongs to a concrete
        // backend; the emulation only tracks the commands around it.
        written.end(&mut context).unwrap();

        let stream_cursor = particles.front().write_cursor();

        particles.swap();

        // The promoted front continues the published stream state.
        assert_eq!(particles.front().write_cursor(), stream_cursor);

        // Host-side streaming continues on the new front behind the cursor.
        let update: Vec<Particle> = (0..8)
            .map(|i| [i as f32, frame as f32, 0.0, 1.0])
            .collect();

        particles
            .front_mut()
            .bind(&mut context, BufferTarget::CopyWrite);
        particles
            .front_mut()
            .write(&mut context, BufferTarget::CopyWrite, &update)
            .unwrap();

        assert_eq!(particles.front().write_cursor(), stream_cursor + 8);
    }

    // Three frames of 8 elements advanced the shared stream cursor, and the
    // high-water mark set by the initial full seed carried across every swap.
    assert_eq!(particles.front().write_cursor(), 24);
    assert_eq!(particles.front().high_water_mark(), 32);

    context
        .device_mut()
        .set_counter_value(written.handle().raw(), 8);

    assert_eq!(written.result(&mut context), Ok(8));

    // Growing the stream preserves the device-side contents.
    particles.resize(&mut context, 64).unwrap();

    let contents = particles.front().read_back(&mut context).unwrap();

    // Frames 0 and 2 landed in this buffer (fronts alternate); frame 1 went
    // to the other one, so its range here was never written.
    assert_eq!(contents[0], [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(contents[7], [7.0, 0.0, 0.0, 1.0]);
    assert_eq!(contents[8], [0.0, 0.0, 0.0, 0.0]);
    assert_eq!(contents[16], [0.0, 2.0, 0.0, 1.0]);
    assert_eq!(contents[23], [7.0, 2.0, 0.0, 1.0]);

    written.delete(&mut context);
    particles.delete(&mut context);
    program.delete(&mut context);

    assert!(context.report_leaks().is_empty());
}
