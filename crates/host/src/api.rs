//! Host capabilities reachable from a running contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{CallBinding, InvocationContext};
use crate::error::HostResult;

/// A token amount. `amount` is a decimal string so it is not bounded by a
/// native integer width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Request to deploy and instantiate a contract from inside another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCreateRequest {
    pub creator: String,
    #[serde(with = "crate::binary")]
    pub wasm_code: Vec<u8>,
    #[serde(with = "crate::binary")]
    pub init_msg: Vec<u8>,
    #[serde(default)]
    pub admin_addr: Option<String>,
    pub label: String,
    #[serde(default)]
    pub is_create2: bool,
    #[serde(with = "crate::binary::option", default)]
    pub salt: Option<Vec<u8>>,
}

/// Result of resolving a contract address for a nested call.
///
/// `checksum` is returned as the host produced it; the dispatcher rejects
/// anything that is not 32 bytes.
#[derive(Debug, Clone)]
pub struct ResolvedContract {
    pub checksum: Vec<u8>,
    pub binding: CallBinding,
}

/// Host capability set.
///
/// Every method receives the context of the calling invocation so the host
/// can charge its gas meter or consult its storage scope.
pub trait BackendApi: Send + Sync {
    fn canonicalize_address(&self, ctx: &InvocationContext, human: &str) -> HostResult<Vec<u8>>;

    fn humanize_address(&self, ctx: &InvocationContext, canonical: &[u8]) -> HostResult<String>;

    /// Looks up `contract_address` and binds a fresh set of capabilities
    /// whose storage is scoped to `store_address`.
    fn resolve_call(
        &self,
        ctx: &InvocationContext,
        contract_address: &str,
        store_address: &str,
    ) -> HostResult<ResolvedContract>;

    fn transfer_coins(
        &self,
        ctx: &InvocationContext,
        contract_address: &str,
        caller: &str,
        coins: &[Coin],
    ) -> HostResult<()>;

    /// Deploys a contract and returns its address.
    fn create_contract(
        &self,
        ctx: &InvocationContext,
        request: &ContractCreateRequest,
        gas_limit: u64,
    ) -> HostResult<String>;
}

type CanonicalizeFn = Box<dyn Fn(&InvocationContext, &str) -> HostResult<Vec<u8>> + Send + Sync>;
type HumanizeFn = Box<dyn Fn(&InvocationContext, &[u8]) -> HostResult<String> + Send + Sync>;
type ResolveCallFn =
    Box<dyn Fn(&InvocationContext, &str, &str) -> HostResult<ResolvedContract> + Send + Sync>;
type TransferFn =
    Box<dyn Fn(&InvocationContext, &str, &str, &[Coin]) -> HostResult<()> + Send + Sync>;
type CreateContractFn = Box<
    dyn Fn(&InvocationContext, &ContractCreateRequest, u64) -> HostResult<String> + Send + Sync,
>;

/// Raised when a closure-built capability set is missing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("host capability '{0}' is not configured")]
pub struct MissingCapability(pub &'static str);

/// [`BackendApi`] assembled from closures.
pub struct FnApi {
    canonicalize: CanonicalizeFn,
    humanize: HumanizeFn,
    resolve_call: ResolveCallFn,
    transfer: TransferFn,
    create_contract: CreateContractFn,
}

impl FnApi {
    pub fn builder() -> FnApiBuilder {
        FnApiBuilder::default()
    }
}

impl fmt::Debug for FnApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnApi").finish_non_exhaustive()
    }
}

impl BackendApi for FnApi {
    fn canonicalize_address(&self, ctx: &InvocationContext, human: &str) -> HostResult<Vec<u8>> {
        (self.canonicalize)(ctx, human)
    }

    fn humanize_address(&self, ctx: &InvocationContext, canonical: &[u8]) -> HostResult<String> {
        (self.humanize)(ctx, canonical)
    }

    fn resolve_call(
        &self,
        ctx: &InvocationContext,
        contract_address: &str,
        store_address: &str,
    ) -> HostResult<ResolvedContract> {
        (self.resolve_call)(ctx, contract_address, store_address)
    }

    fn transfer_coins(
        &self,
        ctx: &InvocationContext,
        contract_address: &str,
        caller: &str,
        coins: &[Coin],
    ) -> HostResult<()> {
        (self.transfer)(ctx, contract_address, caller, coins)
    }

    fn create_contract(
        &self,
        ctx: &InvocationContext,
        request: &ContractCreateRequest,
        gas_limit: u64,
    ) -> HostResult<String> {
        (self.create_contract)(ctx, request, gas_limit)
    }
}

#[derive(Default)]
pub struct FnApiBuilder {
    canonicalize: Option<CanonicalizeFn>,
    humanize: Option<HumanizeFn>,
    resolve_call: Option<ResolveCallFn>,
    transfer: Option<TransferFn>,
    create_contract: Option<CreateContractFn>,
}

impl FnApiBuilder {
    pub fn canonicalize<F>(mut self, f: F) -> Self
    where
        F: Fn(&InvocationContext, &str) -> HostResult<Vec<u8>> + Send + Sync + 'static,
    {
        self.canonicalize = Some(Box::new(f));
        self
    }

    pub fn humanize<F>(mut self, f: F) -> Self
    where
        F: Fn(&InvocationContext, &[u8]) -> HostResult<String> + Send + Sync + 'static,
    {
        self.humanize = Some(Box::new(f));
        self
    }

    pub fn resolve_call<F>(mut self, f: F) -> Self
    where
        F: Fn(&InvocationContext, &str, &str) -> HostResult<ResolvedContract>
            + Send
            + Sync
            + 'static,
    {
        self.resolve_call = Some(Box::new(f));
        self
    }

    pub fn transfer<F>(mut self, f: F) -> Self
    where
        F: Fn(&InvocationContext, &str, &str, &[Coin]) -> HostResult<()> + Send + Sync + 'static,
    {
        self.transfer = Some(Box::new(f));
        self
    }

    pub fn create_contract<F>(mut self, f: F) -> Self
    where
        F: Fn(&InvocationContext, &ContractCreateRequest, u64) -> HostResult<String>
            + Send
            + Sync
            + 'static,
    {
        self.create_contract = Some(Box::new(f));
        self
    }

    /// Builds the capability set, reporting the first missing operation.
    pub fn try_build(self) -> Result<FnApi, MissingCapability> {
        Ok(FnApi {
            canonicalize: self
                .canonicalize
                .ok_or(MissingCapability("canonicalize"))?,
            humanize: self.humanize.ok_or(MissingCapability("humanize"))?,
            resolve_call: self
                .resolve_call
                .ok_or(MissingCapability("resolve_call"))?,
            transfer: self.transfer.ok_or(MissingCapability("transfer"))?,
            create_contract: self
                .create_contract
                .ok_or(MissingCapability("create_contract"))?,
        })
    }

    /// Builds the capability set.
    ///
    /// # Panics
    ///
    /// Panics if any operation was not supplied. A host that cannot serve
    /// every callback must not start.
    pub fn build(self) -> FnApi {
        match self.try_build() {
            Ok(api) => api,
            Err(missing) => panic!("{missing}"),
        }
    }
}
