use failure::Fail;
use fnv::FnvHashSet;
use log::warn;

use crate::binding::BindingIndexAllocator;
use crate::runtime::device::{
    BufferTarget, Device, DeviceError, IndexedBufferTarget, ObjectKind, RawHandle,
};
use crate::runtime::handle::ResourceHandle;
use crate::runtime::state::BindingState;

/// Whether host-side checking of binding discipline and device error state is
/// performed.
///
/// The checks this toggle guards are a development aid: they catch ordering
/// mistakes (mutating a buffer that is not the current binding) and surface
/// the device's sticky error state after each operation. Both cost a little
/// per call, so production contexts run with them disabled. The toggle is a
/// runtime value rather than a build-time conditional: the same binary can run
/// either way.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ValidationMode {
    Enabled,
    Disabled,
}

impl ValidationMode {
    pub fn is_enabled(&self) -> bool {
        *self == ValidationMode::Enabled
    }
}

/// Owns a [Device] along with every piece of state this layer shares across
/// resources: the host-side binding mirror, the counter binding-index pools,
/// and the live-handle registry.
///
/// Nothing here is process-global; independent contexts are fully isolated,
/// which also gives tests deterministic setup and teardown.
pub struct Context<D>
where
    D: Device,
{
    device: D,
    state: BindingState,
    counter_indices: BindingIndexAllocator,
    live: FnvHashSet<(ObjectKind, RawHandle)>,
    validation: ValidationMode,
}

impl<D> Context<D>
where
    D: Device,
{
    /// Creates a context with validation disabled.
    pub fn new(device: D) -> Self {
        Context::with_validation(device, ValidationMode::Disabled)
    }

    /// Creates a context with the given validation mode.
    pub fn with_validation(device: D, validation: ValidationMode) -> Self {
        Context {
            device,
            state: BindingState::new(),
            counter_indices: BindingIndexAllocator::new(),
            live: FnvHashSet::default(),
            validation,
        }
    }

    pub fn validation(&self) -> ValidationMode {
        self.validation
    }

    pub fn set_validation(&mut self, validation: ValidationMode) {
        self.validation = validation;
    }

    /// The host-side mirror of the device's binding state.
    pub fn binding_state(&self) -> &BindingState {
        &self.state
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the underlying device.
    ///
    /// Commands issued directly bypass the binding mirror; prefer the typed
    /// operations on resources.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Binds `handle` to `target` and records the binding host-side.
    pub fn bind_buffer(&mut self, target: BufferTarget, handle: &ResourceHandle) {
        self.device.bind_buffer(target, Some(handle.raw()));
        self.state.set_bound_buffer(target, Some(handle.raw()));
    }

    /// Clears the binding for `target`.
    pub fn unbind_buffer(&mut self, target: BufferTarget) {
        self.device.bind_buffer(target, None);
        self.state.set_bound_buffer(target, None);
    }

    /// Binds `handle` to the indexed binding point `(target, index)`,
    /// optionally restricted to a byte range.
    pub fn bind_buffer_indexed(
        &mut self,
        target: IndexedBufferTarget,
        index: u32,
        handle: &ResourceHandle,
        range: Option<(usize, usize)>,
    ) {
        self.device
            .bind_buffer_indexed(target, index, Some(handle.raw()), range);
        self.state
            .set_bound_buffer_indexed(target, index, Some(handle.raw()));
    }

    /// Handles that were created through this context and never released.
    ///
    /// Intended to be called at a defined end-of-session point; every entry is
    /// also logged as a warning.
    pub fn report_leaks(&self) -> Vec<(ObjectKind, RawHandle)> {
        let mut leaked: Vec<_> = self.live.iter().copied().collect();

        leaked.sort_by_key(|&(_, raw)| raw);

        for (kind, raw) in &leaked {
            warn!("{:?} object {} was never released", kind, raw);
        }

        leaked
    }

    pub(crate) fn create_handle(&mut self, kind: ObjectKind) -> ResourceHandle {
        let raw = self.device.create_object(kind);

        self.live.insert((kind, raw));

        ResourceHandle::new(raw, kind)
    }

    pub(crate) fn release_raw(&mut self, kind: ObjectKind, raw: RawHandle) {
        self.device.delete_object(kind, raw);
        self.live.remove(&(kind, raw));
    }

    /// The counter binding-index pools owned by this context.
    pub fn counter_indices(&self) -> &BindingIndexAllocator {
        &self.counter_indices
    }

    /// Mutable access to the counter binding-index pools.
    ///
    /// [CounterQuery](crate::query::CounterQuery) acquires and releases
    /// through here; direct use is for callers driving the device themselves.
    pub fn counter_indices_mut(&mut self) -> &mut BindingIndexAllocator {
        &mut self.counter_indices
    }

    pub(crate) fn state_mut(&mut self) -> &mut BindingState {
        &mut self.state
    }

    /// Checks that `raw` is the current binding for `target`. Only performed
    /// when validation is enabled.
    pub(crate) fn expect_bound(
        &mut self,
        target: BufferTarget,
        raw: RawHandle,
    ) -> Result<(), BindingDisciplineError> {
        if !self.validation.is_enabled() {
            return Ok(());
        }

        let tracked = self.state.bound_buffer(target);

        if tracked != Some(raw) {
            return Err(BindingDisciplineError {
                target,
                expected: raw,
                actual: tracked,
            });
        }

        // Cross-check against the device in case commands were issued past
        // the mirror through [Context::device_mut].
        let actual = self.device.bound_buffer(target);

        if actual != Some(raw) {
            return Err(BindingDisciplineError {
                target,
                expected: raw,
                actual,
            });
        }

        Ok(())
    }

    /// Polls the device's sticky error state. Only performed when validation
    /// is enabled.
    pub(crate) fn check_device_error(&mut self) -> Result<(), DeviceError> {
        if !self.validation.is_enabled() {
            return Ok(());
        }

        match self.device.poll_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A mutation was issued against a resource that is not the current binding
/// for its target.
#[derive(Fail, Clone, PartialEq, Debug)]
#[fail(
    display = "operation requires handle {} to be bound to {}, but {:?} is bound",
    expected, target, actual
)]
pub struct BindingDisciplineError {
    pub target: BufferTarget,
    pub expected: RawHandle,
    pub actual: Option<RawHandle>,
}
