//! Gas-metered storage callbacks.

use crosscall_storage::traits::check_range;
use crosscall_storage::Order;

use crate::dispatcher::{charge, BackendResult, Dispatcher};
use crate::handle::{CallHandle, IteratorId};

impl Dispatcher {
    /// Reads `key` from the call's store. A miss is `Ok(None)`.
    pub fn db_get(&self, call: CallHandle, key: &[u8]) -> BackendResult<Option<Vec<u8>>> {
        self.with_context(call, "db_get", |ctx| {
            charge(ctx, self.gas_config().read_cost(key.len()), "storage read")?;
            let value = ctx.store().get(key)?;
            if let Some(value) = &value {
                charge(
                    ctx,
                    self.gas_config().read_output_cost(value.len()),
                    "storage read output",
                )?;
            }
            Ok(value)
        })
    }

    pub fn db_set(&self, call: CallHandle, key: &[u8], value: &[u8]) -> BackendResult<()> {
        self.with_context(call, "db_set", |ctx| {
            charge(
                ctx,
                self.gas_config().write_cost(key.len(), value.len()),
                "storage write",
            )?;
            ctx.store().set(key, value)?;
            Ok(())
        })
    }

    pub fn db_delete(&self, call: CallHandle, key: &[u8]) -> BackendResult<()> {
        self.with_context(call, "db_delete", |ctx| {
            charge(ctx, self.gas_config().delete_cost(), "storage delete")?;
            ctx.store().delete(key)?;
            Ok(())
        })
    }

    /// Opens an iterator over `[start, end)` in the call's iterator frame.
    ///
    /// No records are read here; each `iterator_next` fetches and pays for
    /// exactly one.
    pub fn db_scan(
        &self,
        call: CallHandle,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> BackendResult<IteratorId> {
        self.with_context(call, "db_scan", |ctx| {
            check_range(start, end)?;
            charge(ctx, self.gas_config().iter_create_cost(), "storage scan")?;
            let iterator_id = ctx.iterators().lock().push(start, end, order);
            Ok(IteratorId::new(call, iterator_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ErrorCode, HostError};
    use crate::testing::{test_dispatcher, test_binding_with_limit};
    use crosscall_storage::Order;

    #[test]
    fn get_charges_key_then_value() {
        let dispatcher = test_dispatcher();
        let call = dispatcher.register(test_binding_with_limit(1_000_000));

        let (res, gas) = dispatcher.db_get(call, b"missing");
        assert_eq!(res, Ok(None));
        assert_eq!(gas.externally_used, 1000 + 3 * 7);

        dispatcher.db_set(call, b"k", b"value").0.unwrap();
        let (res, gas) = dispatcher.db_get(call, b"k");
        assert_eq!(res, Ok(Some(b"value".to_vec())));
        assert_eq!(gas.externally_used, 1000 + 3 + 3 * 5);
    }

    #[test]
    fn out_of_gas_still_reports_gas() {
        let dispatcher = test_dispatcher();
        let call = dispatcher.register(test_binding_with_limit(100));

        let (res, gas) = dispatcher.db_set(call, b"k", b"v");
        assert_eq!(res.unwrap_err().code(), ErrorCode::OutOfGas);
        assert_eq!(gas.externally_used, 2000 + 60);

        let (res, _) = dispatcher.db_get(call, b"k");
        assert!(res.is_err());
    }

    #[test]
    fn inverted_scan_is_rejected_without_charge() {
        let dispatcher = test_dispatcher();
        let call = dispatcher.register(test_binding_with_limit(1_000_000));
        let (res, gas) = dispatcher.db_scan(call, Some(b"z"), Some(b"a"), Order::Ascending);
        assert_eq!(res, Err(HostError::InvalidRange));
        assert_eq!(res.unwrap_err().code(), ErrorCode::Other);
        assert_eq!(gas.externally_used, 0);
    }

    #[test]
    fn unknown_call_is_not_found() {
        let dispatcher = test_dispatcher();
        let (res, gas) = dispatcher.db_get(crate::CallHandle(42), b"k");
        assert_eq!(res.unwrap_err().code(), ErrorCode::NotFound);
        assert_eq!(gas.externally_used, 0);
    }
}
