//! State bound to one registered call.

use std::fmt;
use std::sync::Arc;

use crosscall_storage::{KvStore, Order, Record};
use parking_lot::Mutex;

use crate::error::{HostError, HostResult};
use crate::gas::GasMeter;
use crate::handle::CallHandle;
use crate::querier::Querier;

/// Capabilities an invocation is bound to.
///
/// Produced by the host for a top-level call, or by
/// [`BackendApi::resolve_call`](crate::api::BackendApi::resolve_call) for a
/// nested one.
#[derive(Clone)]
pub struct CallBinding {
    pub store: Arc<dyn KvStore>,
    pub gas_meter: Arc<dyn GasMeter>,
    pub querier: Arc<dyn Querier>,
    /// Address of the contract being run, if known.
    pub contract_address: Option<String>,
    /// Address whose storage `store` is scoped to. Differs from
    /// `contract_address` under a delegate call.
    pub store_address: Option<String>,
}

impl CallBinding {
    pub fn new(
        store: Arc<dyn KvStore>,
        gas_meter: Arc<dyn GasMeter>,
        querier: Arc<dyn Querier>,
    ) -> Self {
        Self {
            store,
            gas_meter,
            querier,
            contract_address: None,
            store_address: None,
        }
    }

    pub fn with_contract(mut self, contract_address: impl Into<String>) -> Self {
        let address = contract_address.into();
        if self.store_address.is_none() {
            self.store_address = Some(address.clone());
        }
        self.contract_address = Some(address);
        self
    }

    pub fn with_store_address(mut self, store_address: impl Into<String>) -> Self {
        self.store_address = Some(store_address.into());
        self
    }
}

impl fmt::Debug for CallBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallBinding")
            .field("contract_address", &self.contract_address)
            .field("store_address", &self.store_address)
            .field("gas_consumed", &self.gas_meter.gas_consumed())
            .finish_non_exhaustive()
    }
}

/// A cursor over `[start, end)` opened by a scan.
///
/// Nothing is read up front. Each step seeks the store for the record just
/// past the last one handed out and narrows the bounds accordingly.
#[derive(Debug)]
struct HostIterator {
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    order: Order,
    exhausted: bool,
}

impl HostIterator {
    fn step(&mut self, store: &dyn KvStore) -> HostResult<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }
        let record = store.seek(self.start.as_deref(), self.end.as_deref(), self.order)?;
        match &record {
            Some((key, _)) => match self.order {
                // `key ++ [0]` is the smallest key strictly after `key`.
                Order::Ascending => {
                    let mut after = Vec::with_capacity(key.len() + 1);
                    after.extend_from_slice(key);
                    after.push(0);
                    self.start = Some(after);
                }
                Order::Descending => self.end = Some(key.clone()),
            },
            None => self.exhausted = true,
        }
        Ok(record)
    }
}

/// Iterators created by one call. Ids are 1-based positions.
#[derive(Debug, Default)]
pub(crate) struct IteratorFrame {
    iterators: Vec<HostIterator>,
}

impl IteratorFrame {
    pub(crate) fn push(
        &mut self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> u64 {
        self.iterators.push(HostIterator {
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            order,
            exhausted: false,
        });
        self.iterators.len() as u64
    }

    /// Steps iterator `iterator_id` against `store`. Once a cursor has hit
    /// the end it keeps returning `None`.
    pub(crate) fn next(
        &mut self,
        iterator_id: u64,
        store: &dyn KvStore,
    ) -> HostResult<Option<Record>> {
        let index = iterator_id
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| HostError::not_found(format!("iterator {iterator_id}")))?;
        let iterator = self
            .iterators
            .get_mut(index)
            .ok_or_else(|| HostError::not_found(format!("iterator {iterator_id}")))?;
        iterator.step(store)
    }

    pub(crate) fn len(&self) -> usize {
        self.iterators.len()
    }
}

/// Everything the adapters need to serve callbacks for one call.
///
/// Contexts are owned by the [`CallRegistry`](crate::registry::CallRegistry)
/// and handed out as `Arc`s, so an in-flight callback keeps its context
/// alive even if the handle is released concurrently.
pub struct InvocationContext {
    handle: CallHandle,
    parent: Option<CallHandle>,
    depth: u32,
    binding: CallBinding,
    iterators: Mutex<IteratorFrame>,
}

impl InvocationContext {
    pub(crate) fn new(
        handle: CallHandle,
        parent: Option<CallHandle>,
        depth: u32,
        binding: CallBinding,
    ) -> Self {
        Self {
            handle,
            parent,
            depth,
            binding,
            iterators: Mutex::new(IteratorFrame::default()),
        }
    }

    pub fn handle(&self) -> CallHandle {
        self.handle
    }

    pub fn parent(&self) -> Option<CallHandle> {
        self.parent
    }

    /// Zero for a top-level call.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn store(&self) -> &dyn KvStore {
        self.binding.store.as_ref()
    }

    pub fn gas_meter(&self) -> &Arc<dyn GasMeter> {
        &self.binding.gas_meter
    }

    pub fn querier(&self) -> &Arc<dyn Querier> {
        &self.binding.querier
    }

    pub fn contract_address(&self) -> Option<&str> {
        self.binding.contract_address.as_deref()
    }

    pub fn store_address(&self) -> Option<&str> {
        self.binding.store_address.as_deref()
    }

    pub fn binding(&self) -> &CallBinding {
        &self.binding
    }

    /// Number of iterators created so far by this call.
    pub fn iterator_count(&self) -> usize {
        self.iterators.lock().len()
    }

    pub(crate) fn iterators(&self) -> &Mutex<IteratorFrame> {
        &self.iterators
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("handle", &self.handle)
            .field("parent", &self.parent)
            .field("depth", &self.depth)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}
