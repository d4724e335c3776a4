//! The handle-bound view an engine uses during one call.

use std::fmt;
use std::sync::Arc;

use crosscall_storage::{Order, Record};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{Coin, ContractCreateRequest};
use crate::cache::CacheHandle;
use crate::dispatcher::{BackendResult, CallGuard, Dispatcher, ResolvedCall};
use crate::engine::{Engine, EntryPoint, Invocation};
use crate::error::{HostError, HostResult};
use crate::gas::GasInfo;
use crate::handle::{CallHandle, IteratorId};
use crate::querier::{parse_querier_response, QuerierResult};

/// Sender and attached funds of an instantiate or execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub sender: String,
    pub funds: Vec<Coin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Callee runs against its own storage.
    Call,
    /// Callee code runs against the caller's storage.
    DelegateCall,
}

/// A contract-to-contract call issued by a running contract.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub contract_address: String,
    pub kind: CallKind,
    pub sender: String,
    pub funds: Vec<Coin>,
    pub env: Vec<u8>,
    pub msg: Vec<u8>,
    pub gas_limit: u64,
}

/// Capabilities of one registered call.
///
/// A `Backend` does not own its handle; whoever registered the call
/// releases it.
#[derive(Clone)]
pub struct Backend {
    call: CallHandle,
    dispatcher: Arc<Dispatcher>,
}

impl Backend {
    pub fn new(dispatcher: Arc<Dispatcher>, call: CallHandle) -> Self {
        Self { call, dispatcher }
    }

    pub fn call(&self) -> CallHandle {
        self.call
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn cache(&self) -> &CacheHandle {
        self.dispatcher.cache()
    }

    pub fn get(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>> {
        self.dispatcher.db_get(self.call, key)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> BackendResult<()> {
        self.dispatcher.db_set(self.call, key, value)
    }

    pub fn delete(&self, key: &[u8]) -> BackendResult<()> {
        self.dispatcher.db_delete(self.call, key)
    }

    pub fn scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> BackendResult<IteratorId> {
        self.dispatcher.db_scan(self.call, start, end, order)
    }

    pub fn next(&self, iterator: IteratorId) -> BackendResult<Option<Record>> {
        self.dispatcher.iterator_next(iterator)
    }

    pub fn canonicalize_address(&self, human: &str) -> BackendResult<Vec<u8>> {
        self.dispatcher.canonicalize_address(self.call, human)
    }

    pub fn humanize_address(&self, canonical: &[u8]) -> BackendResult<String> {
        self.dispatcher.humanize_address(self.call, canonical)
    }

    pub fn transfer_coins(
        &self,
        contract_address: &str,
        caller: &str,
        coins: &[Coin],
    ) -> BackendResult<()> {
        self.dispatcher
            .transfer_coins(self.call, contract_address, caller, coins)
    }

    pub fn create_contract(
        &self,
        request: &ContractCreateRequest,
        gas_limit: u64,
    ) -> BackendResult<String> {
        self.dispatcher.create_contract(self.call, request, gas_limit)
    }

    pub fn query_raw(&self, request: &[u8], gas_limit: u64) -> BackendResult<Vec<u8>> {
        self.dispatcher.query_external(self.call, request, gas_limit)
    }

    /// Runs a query and decodes the response.
    pub fn query(&self, request: &[u8], gas_limit: u64) -> BackendResult<QuerierResult> {
        let (result, gas) = self.query_raw(request, gas_limit);
        (result.map(parse_querier_response), gas)
    }

    pub fn resolve_call(
        &self,
        contract_address: &str,
        store_address: &str,
    ) -> BackendResult<ResolvedCall> {
        self.dispatcher
            .resolve_call(self.call, contract_address, store_address)
    }

    /// Runs `execute` on another contract.
    ///
    /// Funds of a plain call are transferred first. The callee gets its own
    /// registered call, released before this returns whatever the outcome.
    /// A delegate call runs the callee's code against this call's storage
    /// and moves no funds.
    pub fn call_contract(
        &self,
        engine: &dyn Engine,
        request: &ContractCall,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        let mut gas = GasInfo::free();

        if request.kind == CallKind::Call && !request.funds.is_empty() {
            let (result, used) = self.transfer_coins(
                &request.contract_address,
                &request.sender,
                &request.funds,
            );
            gas += used;
            if let Err(err) = result {
                return (Err(err), gas);
            }
        }

        let store_address = match self.store_address_for(request) {
            Ok(address) => address,
            Err(err) => return (Err(err), gas),
        };

        let (resolved, used) = self.resolve_call(&request.contract_address, &store_address);
        gas += used;
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(err) => return (Err(err), gas),
        };
        let guard = CallGuard::new(Arc::clone(&self.dispatcher), resolved.call);
        let child = Backend::new(Arc::clone(&self.dispatcher), guard.call());

        let info = MessageInfo {
            sender: request.sender.clone(),
            funds: request.funds.clone(),
        };
        let info = match serde_json::to_vec(&info) {
            Ok(info) => info,
            Err(err) => return (Err(HostError::other(err.to_string())), gas),
        };

        debug!(
            parent = %self.call,
            child = %child.call(),
            contract = %request.contract_address,
            kind = ?request.kind,
            "running nested call"
        );
        let invocation = Invocation {
            entry_point: EntryPoint::Execute,
            checksum: resolved.checksum,
            env: &request.env,
            info: Some(&info),
            msg: &request.msg,
            gas_limit: request.gas_limit,
            print_debug: self.dispatcher.print_debug(),
        };
        let (result, used) = engine.run(invocation, &child);
        gas += used;
        (result, gas)
    }

    fn store_address_for(&self, request: &ContractCall) -> HostResult<String> {
        match request.kind {
            CallKind::Call => Ok(request.contract_address.clone()),
            CallKind::DelegateCall => {
                let ctx = self.dispatcher.lookup(self.call)?;
                ctx.store_address()
                    .or(ctx.contract_address())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        HostError::other(format!(
                            "delegate call from {} which has no storage scope",
                            self.call
                        ))
                    })
            }
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend").field("call", &self.call).finish()
    }
}
