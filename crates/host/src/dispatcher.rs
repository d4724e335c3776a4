//! Routes handle-keyed callbacks to the context they belong to.
//!
//! The adapters themselves live next to their concern: storage operations
//! in [`crate::storage`], iterator steps in [`crate::iterator`], address
//! conversion and contract resolution in [`crate::capability`], queries in
//! [`crate::querier`].

use std::fmt;
use std::sync::Arc;

use crosscall_config::{GasConfig, HostConfig};
use tracing::{debug, trace};

use crate::api::BackendApi;
use crate::cache::{CacheHandle, Checksum};
use crate::context::{CallBinding, InvocationContext};
use crate::error::HostResult;
use crate::gas::GasInfo;
use crate::handle::CallHandle;
use crate::registry::CallRegistry;

/// Adapter outcome paired with the gas it consumed.
///
/// The gas report is meaningful on failure too.
pub type BackendResult<T> = (HostResult<T>, GasInfo);

/// A nested call that passed resolution and is now registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCall {
    pub checksum: Checksum,
    pub call: CallHandle,
}

/// Owner of the registry and the host capabilities.
pub struct Dispatcher {
    registry: CallRegistry,
    api: Arc<dyn BackendApi>,
    cache: CacheHandle,
    gas: GasConfig,
    max_call_depth: u32,
    print_debug: bool,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn BackendApi>, cache: CacheHandle, config: &HostConfig) -> Self {
        Self {
            registry: CallRegistry::new(),
            api,
            cache,
            gas: config.gas,
            max_call_depth: config.max_call_depth,
            print_debug: config.print_debug,
        }
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    pub fn api(&self) -> &dyn BackendApi {
        self.api.as_ref()
    }

    pub fn cache(&self) -> &CacheHandle {
        &self.cache
    }

    pub fn gas_config(&self) -> &GasConfig {
        &self.gas
    }

    pub fn max_call_depth(&self) -> u32 {
        self.max_call_depth
    }

    pub fn print_debug(&self) -> bool {
        self.print_debug
    }

    /// Registers a top-level call.
    pub fn register(&self, binding: CallBinding) -> CallHandle {
        self.registry.register(binding)
    }

    /// Registers a top-level call that is released when the guard drops.
    pub fn enter(self: &Arc<Self>, binding: CallBinding) -> CallGuard {
        let call = self.register(binding);
        CallGuard::new(Arc::clone(self), call)
    }

    pub fn release(&self, call: CallHandle) -> bool {
        self.registry.release(call)
    }

    pub fn lookup(&self, call: CallHandle) -> HostResult<Arc<InvocationContext>> {
        self.registry.lookup(call)
    }

    /// Runs `op` against the context of `call`, reporting the gas it charged
    /// on that context's meter. An unknown handle costs nothing.
    pub(crate) fn with_context<T>(
        &self,
        call: CallHandle,
        op: &'static str,
        f: impl FnOnce(&InvocationContext) -> HostResult<T>,
    ) -> BackendResult<T> {
        trace!(%call, op, "host callback");
        let ctx = match self.registry.lookup(call) {
            Ok(ctx) => ctx,
            Err(err) => {
                debug!(%call, op, "callback for unknown call");
                return (Err(err), GasInfo::free());
            }
        };
        let meter = ctx.gas_meter();
        let before = meter.gas_consumed();
        let result = f(&ctx);
        let used = meter.gas_consumed().saturating_sub(before);
        (result, GasInfo::with_externally_used(used))
    }
}

/// Charges `amount` on the context's meter.
pub(crate) fn charge(ctx: &InvocationContext, amount: u64, descriptor: &str) -> HostResult<()> {
    ctx.gas_meter().consume_gas(amount, descriptor)
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("gas", &self.gas)
            .field("max_call_depth", &self.max_call_depth)
            .finish_non_exhaustive()
    }
}

/// Releases a registered call when dropped, including during unwinding.
pub struct CallGuard {
    dispatcher: Arc<Dispatcher>,
    call: CallHandle,
}

impl CallGuard {
    pub fn new(dispatcher: Arc<Dispatcher>, call: CallHandle) -> Self {
        Self { dispatcher, call }
    }

    pub fn call(&self) -> CallHandle {
        self.call
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.dispatcher.release(self.call);
    }
}

impl fmt::Debug for CallGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallGuard").field(&self.call).finish()
    }
}
