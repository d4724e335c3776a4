//! Stepping iterators opened by `db_scan`.

use crosscall_storage::Record;

use crate::dispatcher::{charge, BackendResult, Dispatcher};
use crate::handle::IteratorId;

impl Dispatcher {
    /// Advances an iterator. `Ok(None)` marks the end of the sequence and
    /// still costs one step.
    pub fn iterator_next(&self, iterator: IteratorId) -> BackendResult<Option<Record>> {
        self.with_context(iterator.call, "iterator_next", |ctx| {
            charge(ctx, self.gas_config().iter_next_cost(), "iterator next")?;
            let record = ctx
                .iterators()
                .lock()
                .next(iterator.iterator_id, ctx.store())?;
            if let Some((key, value)) = &record {
                charge(
                    ctx,
                    self.gas_config()
                        .read_output_cost(key.len().saturating_add(value.len())),
                    "iterator output",
                )?;
            }
            Ok(record)
        })
    }
}
