//! Address conversion, transfers, contract creation and resolution of
//! nested calls.

use tracing::debug;

use crate::api::{Coin, ContractCreateRequest};
use crate::cache::Checksum;
use crate::dispatcher::{charge, BackendResult, Dispatcher, ResolvedCall};
use crate::error::HostError;
use crate::handle::CallHandle;

impl Dispatcher {
    pub fn canonicalize_address(&self, call: CallHandle, human: &str) -> BackendResult<Vec<u8>> {
        self.with_context(call, "canonicalize_address", |ctx| {
            charge(
                ctx,
                self.gas_config().address_cost(human.len()),
                "canonicalize address",
            )?;
            self.api().canonicalize_address(ctx, human)
        })
    }

    pub fn humanize_address(&self, call: CallHandle, canonical: &[u8]) -> BackendResult<String> {
        self.with_context(call, "humanize_address", |ctx| {
            charge(
                ctx,
                self.gas_config().address_cost(canonical.len()),
                "humanize address",
            )?;
            self.api().humanize_address(ctx, canonical)
        })
    }

    /// Moves `coins` from `caller` to `contract_address`. Whatever the host
    /// charges on the call's meter is reported.
    pub fn transfer_coins(
        &self,
        call: CallHandle,
        contract_address: &str,
        caller: &str,
        coins: &[Coin],
    ) -> BackendResult<()> {
        self.with_context(call, "transfer_coins", |ctx| {
            self.api()
                .transfer_coins(ctx, contract_address, caller, coins)
        })
    }

    pub fn create_contract(
        &self,
        call: CallHandle,
        request: &ContractCreateRequest,
        gas_limit: u64,
    ) -> BackendResult<String> {
        self.with_context(call, "create_contract", |ctx| {
            self.api().create_contract(ctx, request, gas_limit)
        })
    }

    /// Resolves `contract_address` into a fresh child call whose storage is
    /// scoped to `store_address`.
    ///
    /// Depth is checked and the checksum validated before anything is
    /// registered. The caller owns the returned handle and must release it.
    pub fn resolve_call(
        &self,
        call: CallHandle,
        contract_address: &str,
        store_address: &str,
    ) -> BackendResult<ResolvedCall> {
        self.with_context(call, "resolve_call", |ctx| {
            let depth = ctx.depth().saturating_add(1);
            if depth > self.max_call_depth() {
                return Err(HostError::CallDepthExceeded {
                    depth,
                    max: self.max_call_depth(),
                });
            }
            let resolved = self
                .api()
                .resolve_call(ctx, contract_address, store_address)?;
            let checksum = Checksum::try_from(resolved.checksum.as_slice())?;
            let child = self.registry().register_child(ctx, resolved.binding);
            debug!(
                parent = %call,
                %child,
                contract = contract_address,
                store = store_address,
                %checksum,
                "resolved nested call"
            );
            Ok(ResolvedCall {
                checksum,
                call: child,
            })
        })
    }
}
