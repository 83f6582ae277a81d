use failure::Fail;

use crate::binding::IndexConflict;
use crate::runtime::{Context, CounterTarget, Device, ObjectKind, ResourceHandle};

/// A device counter sampling one target between [CounterQuery::begin] and
/// [CounterQuery::end].
///
/// Counters occupy a binding index on their target for as long as they run;
/// the index comes from the context's
/// [BindingIndexAllocator](crate::binding::BindingIndexAllocator) and goes
/// back to the pool when the counter ends, so the indexable-versus-singular
/// policy of each target is enforced in one place.
pub struct CounterQuery {
    handle: ResourceHandle,
    target: CounterTarget,
    index: Option<u32>,
}

impl CounterQuery {
    pub fn new<D>(context: &mut Context<D>, target: CounterTarget) -> Self
    where
        D: Device,
    {
        let handle = context.create_handle(ObjectKind::Query);

        CounterQuery {
            handle,
            target,
            index: None,
        }
    }

    pub fn target(&self) -> CounterTarget {
        self.target
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// The binding index the counter currently occupies, while running.
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn is_running(&self) -> bool {
        self.index.is_some()
    }

    /// Acquires a binding index and starts counting.
    pub fn begin<D>(&mut self, context: &mut Context<D>) -> Result<u32, QueryError>
    where
        D: Device,
    {
        if self.index.is_some() {
            return Err(QueryError::AlreadyRunning {
                target: self.target,
            });
        }

        let index = context.counter_indices_mut().acquire(self.target)?;

        self.index = Some(index);

        context
            .device_mut()
            .begin_counter(self.target, index, self.handle.raw());

        Ok(index)
    }

    /// Stops counting and returns the binding index to the pool.
    pub fn end<D>(&mut self, context: &mut Context<D>) -> Result<(), QueryError>
    where
        D: Device,
    {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                return Err(QueryError::NotRunning {
                    target: self.target,
                });
            }
        };

        context.device_mut().end_counter(self.target, index);
        context.counter_indices_mut().release(self.target, index);

        Ok(())
    }

    /// Fetches the counted value. May force a pipeline sync.
    pub fn result<D>(&self, context: &mut Context<D>) -> Result<u64, QueryError>
    where
        D: Device,
    {
        if self.index.is_some() {
            return Err(QueryError::StillRunning {
                target: self.target,
            });
        }

        Ok(context.device_mut().counter_result(self.handle.raw()))
    }

    /// Releases the device counter object.
    ///
    /// A counter still running has its index returned to the pool first.
    pub fn delete<D>(mut self, context: &mut Context<D>)
    where
        D: Device,
    {
        if let Some(index) = self.index.take() {
            context.device_mut().end_counter(self.target, index);
            context.counter_indices_mut().release(self.target, index);
        }

        let CounterQuery { handle, .. } = self;

        handle.release(context);
    }
}

/// Errors raised by counter lifecycle operations.
#[derive(Fail, Clone, PartialEq, Debug)]
pub enum QueryError {
    #[fail(display = "a counter on {} is already running on this object", target)]
    AlreadyRunning { target: CounterTarget },
    #[fail(display = "no counter on {} is running on this object", target)]
    NotRunning { target: CounterTarget },
    #[fail(display = "the counter on {} must end before its result is read", target)]
    StillRunning { target: CounterTarget },
    #[fail(display = "{}", _0)]
    IndexConflict(#[fail(cause)] IndexConflict),
}

impl From<IndexConflict> for QueryError {
    fn from(error: IndexConflict) -> Self {
        QueryError::IndexConflict(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{DeviceCall, EmulatedDevice, ValidationMode};

    fn test_context() -> Context<EmulatedDevice> {
        Context::with_validation(EmulatedDevice::new(), ValidationMode::Enabled)
    }

    #[test]
    fn concurrent_counters_on_an_indexable_target_get_distinct_indices() {
        let mut context = test_context();
        let mut first = CounterQuery::new(&mut context, CounterTarget::PrimitivesGenerated);
        let mut second = CounterQuery::new(&mut context, CounterTarget::PrimitivesGenerated);

        assert_eq!(first.begin(&mut context), Ok(0));
        assert_eq!(second.begin(&mut context), Ok(1));

        first.end(&mut context).unwrap();
        second.end(&mut context).unwrap();

        first.delete(&mut context);
        second.delete(&mut context);
    }

    #[test]
    fn a_singular_target_admits_one_running_counter() {
        let mut context = test_context();
        let mut first = CounterQuery::new(&mut context, CounterTarget::TimeElapsed);
        let mut second = CounterQuery::new(&mut context, CounterTarget::TimeElapsed);

        first.begin(&mut context).unwrap();

        assert!(matches!(
            second.begin(&mut context),
            Err(QueryError::IndexConflict(_))
        ));

        first.end(&mut context).unwrap();

        assert_eq!(second.begin(&mut context), Ok(0));

        second.end(&mut context).unwrap();

        first.delete(&mut context);
        second.delete(&mut context);
    }

    #[test]
    fn lifecycle_misuse_is_rejected() {
        let mut context = test_context();
        let mut query = CounterQuery::new(&mut context, CounterTarget::SamplesPassed);

        assert!(matches!(
            query.end(&mut context),
            Err(QueryError::NotRunning { .. })
        ));

        query.begin(&mut context).unwrap();

        assert!(matches!(
            query.begin(&mut context),
            Err(QueryError::AlreadyRunning { .. })
        ));
        assert!(matches!(
            query.result(&mut context),
            Err(QueryError::StillRunning { .. })
        ));

        query.end(&mut context).unwrap();

        query.delete(&mut context);
    }

    #[test]
    fn result_reads_the_device_counter() {
        let mut context = test_context();
        let mut query = CounterQuery::new(&mut context, CounterTarget::FeedbackPrimitivesWritten);
        let raw = query.handle().raw();

        query.begin(&mut context).unwrap();
        query.end(&mut context).unwrap();

        context.device_mut().set_counter_value(raw, 4096);

        assert_eq!(query.result(&mut context), Ok(4096));
        assert!(context
            .device()
            .calls()
            .contains(&DeviceCall::CounterResult(raw)));

        query.delete(&mut context);
    }

    #[test]
    fn deleting_a_running_counter_frees_its_index() {
        let mut context = test_context();
        let mut query = CounterQuery::new(&mut context, CounterTarget::AnySamplesPassed);

        query.begin(&mut context).unwrap();
        query.delete(&mut context);

        let mut replacement = CounterQuery::new(&mut context, CounterTarget::AnySamplesPassed);

        assert_eq!(replacement.begin(&mut context), Ok(0));

        replacement.end(&mut context).unwrap();
        replacement.delete(&mut context);
    }
}
