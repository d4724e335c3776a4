//! In-memory collaborators for tests and local experiments.
//!
//! - [`MockApi`]: `addr` + hex addresses, contract table, balances
//! - [`MockQuerier`]: canned responses with per-byte gas
//! - [`ScriptEngine`]: runs a JSON list of [`ScriptOp`]s against a backend
//! - [`MockCache`]: module cache keyed by SHA-256

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crosscall_config::HostConfig;
use crosscall_storage::{KvStore, MemoryStore, Order, PrefixStore};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{BackendApi, Coin, ContractCreateRequest, ResolvedContract};
use crate::backend::{Backend, CallKind, ContractCall};
use crate::cache::{AnalysisReport, CacheHandle, Checksum, Metrics, ModuleCache};
use crate::context::{CallBinding, InvocationContext};
use crate::dispatcher::Dispatcher;
use crate::engine::{Engine, EntryPoint, Invocation};
use crate::error::{HostError, HostResult};
use crate::gas::{BasicGasMeter, GasInfo, GasMeter};
use crate::handle::CallHandle;
use crate::querier::{ContractResult, Querier, SystemError, SystemResult};

pub const MOCK_ADDRESS_PREFIX: &str = "addr";

/// Gas the mock host charges per coin moved.
pub const MOCK_TRANSFER_COST: u64 = 100;

/// Gas the mock host charges per contract created.
pub const MOCK_CREATE_COST: u64 = 5_000;

/// Host capabilities backed by process memory.
///
/// All contract storage lives in one [`MemoryStore`]; each contract sees it
/// through a [`PrefixStore`] keyed by its storage address.
pub struct MockApi {
    contracts: RwLock<HashMap<String, Vec<u8>>>,
    storage: Arc<MemoryStore>,
    querier: Arc<dyn Querier>,
    balances: Mutex<HashMap<(String, String), u128>>,
    created: AtomicU64,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    pub fn new() -> Self {
        Self::with_querier(Arc::new(MockQuerier::new()))
    }

    pub fn with_querier(querier: Arc<dyn Querier>) -> Self {
        Self {
            contracts: RwLock::new(HashMap::new()),
            storage: Arc::new(MemoryStore::new()),
            querier,
            balances: Mutex::new(HashMap::new()),
            created: AtomicU64::new(0),
        }
    }

    pub fn register_contract(&self, address: impl Into<String>, checksum: impl Into<Checksum>) {
        let checksum: Checksum = checksum.into();
        self.register_raw_checksum(address, checksum.as_bytes().to_vec());
    }

    /// Registers a contract whose code id is returned verbatim by
    /// `resolve_call`, whatever its length.
    pub fn register_raw_checksum(&self, address: impl Into<String>, checksum: Vec<u8>) {
        self.contracts.write().insert(address.into(), checksum);
    }

    /// Storage of `address` as its own contract code would see it.
    pub fn contract_store(&self, address: &str) -> Arc<dyn KvStore> {
        let shared: Arc<dyn KvStore> = self.storage.clone();
        Arc::new(PrefixStore::new(shared, store_prefix(address)))
    }

    pub fn set_balance(&self, address: &str, coin: &Coin) -> HostResult<()> {
        let amount = parse_amount(coin)?;
        self.balances
            .lock()
            .insert((address.to_string(), coin.denom.clone()), amount);
        Ok(())
    }

    pub fn balance(&self, address: &str, denom: &str) -> u128 {
        self.balances
            .lock()
            .get(&(address.to_string(), denom.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.read().len()
    }
}

fn store_prefix(address: &str) -> Vec<u8> {
    format!("{address}/").into_bytes()
}

fn parse_amount(coin: &Coin) -> HostResult<u128> {
    coin.amount
        .parse::<u128>()
        .map_err(|_| HostError::api(format!("invalid amount in {coin}")))
}

impl BackendApi for MockApi {
    fn canonicalize_address(&self, _ctx: &InvocationContext, human: &str) -> HostResult<Vec<u8>> {
        let encoded = human
            .strip_prefix(MOCK_ADDRESS_PREFIX)
            .ok_or_else(|| HostError::api(format!("address {human:?} has no prefix")))?;
        let canonical =
            hex::decode(encoded).map_err(|err| HostError::api(format!("{human:?}: {err}")))?;
        if canonical.is_empty() {
            return Err(HostError::api("empty address"));
        }
        Ok(canonical)
    }

    fn humanize_address(&self, _ctx: &InvocationContext, canonical: &[u8]) -> HostResult<String> {
        if canonical.is_empty() {
            return Err(HostError::api("empty address"));
        }
        Ok(format!("{MOCK_ADDRESS_PREFIX}{}", hex::encode(canonical)))
    }

    fn resolve_call(
        &self,
        ctx: &InvocationContext,
        contract_address: &str,
        store_address: &str,
    ) -> HostResult<ResolvedContract> {
        let checksum = self
            .contracts
            .read()
            .get(contract_address)
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("contract {contract_address}")))?;
        let binding = CallBinding::new(
            self.contract_store(store_address),
            Arc::clone(ctx.gas_meter()),
            Arc::clone(&self.querier),
        )
        .with_store_address(store_address)
        .with_contract(contract_address);
        Ok(ResolvedContract { checksum, binding })
    }

    fn transfer_coins(
        &self,
        ctx: &InvocationContext,
        contract_address: &str,
        caller: &str,
        coins: &[Coin],
    ) -> HostResult<()> {
        let mut balances = self.balances.lock();
        for coin in coins {
            ctx.gas_meter()
                .consume_gas(MOCK_TRANSFER_COST, "mock transfer")?;
            let amount = parse_amount(coin)?;
            let from = (caller.to_string(), coin.denom.clone());
            let available = balances.get(&from).copied().unwrap_or(0);
            let remaining = available
                .checked_sub(amount)
                .ok_or_else(|| HostError::api(format!("{caller} cannot pay {coin}")))?;
            balances.insert(from, remaining);
            let to = balances
                .entry((contract_address.to_string(), coin.denom.clone()))
                .or_insert(0);
            *to = to.saturating_add(amount);
        }
        Ok(())
    }

    fn create_contract(
        &self,
        ctx: &InvocationContext,
        request: &ContractCreateRequest,
        _gas_limit: u64,
    ) -> HostResult<String> {
        ctx.gas_meter()
            .consume_gas(MOCK_CREATE_COST, "mock create contract")?;
        let sequence = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        let address = format!("{MOCK_ADDRESS_PREFIX}{:016x}", sequence);
        self.register_contract(address.clone(), Checksum::generate(&request.wasm_code));
        Ok(address)
    }
}

/// Querier answering from a table of canned responses.
///
/// Charges `gas_per_byte` for every request byte before answering.
pub struct MockQuerier {
    responses: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    gas_per_byte: u64,
}

impl Default for MockQuerier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQuerier {
    pub fn new() -> Self {
        Self::with_gas_per_byte(1)
    }

    pub fn with_gas_per_byte(gas_per_byte: u64) -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            gas_per_byte,
        }
    }

    /// Answers `request` with a successful contract result.
    pub fn respond(&self, request: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> HostResult<()> {
        let result = SystemResult::Ok(ContractResult::Ok(data.into()));
        let encoded = serde_json::to_vec(&result).map_err(|err| HostError::query(err.to_string()))?;
        self.respond_raw(request, encoded);
        Ok(())
    }

    /// Answers `request` with `response` exactly as given.
    pub fn respond_raw(&self, request: impl Into<Vec<u8>>, response: impl Into<Vec<u8>>) {
        self.responses
            .write()
            .insert(request.into(), response.into());
    }
}

impl Querier for MockQuerier {
    fn query_raw(&self, request: &[u8], gas_meter: &dyn GasMeter) -> HostResult<Vec<u8>> {
        gas_meter.consume_gas(
            self.gas_per_byte.saturating_mul(request.len() as u64),
            "mock query",
        )?;
        if let Some(response) = self.responses.read().get(request) {
            return Ok(response.clone());
        }
        let unsupported: SystemResult<ContractResult> =
            SystemResult::Err(SystemError::UnsupportedRequest {
                kind: String::from_utf8_lossy(request).into_owned(),
            });
        serde_json::to_vec(&unsupported).map_err(|err| HostError::query(err.to_string()))
    }
}

/// Module cache held in memory.
#[derive(Default)]
pub struct MockCache {
    codes: RwLock<HashMap<Checksum, Vec<u8>>>,
    pinned: RwLock<HashSet<Checksum>>,
    metrics: Mutex<Metrics>,
}

/// Capabilities a module can declare with a `requires_<name>` marker.
const KNOWN_CAPABILITIES: [&str; 4] = ["iterator", "staking", "stargate", "cosmwasm_1_1"];

impl MockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle() -> CacheHandle {
        CacheHandle::from(Arc::new(Self::new()))
    }

    fn known(&self, checksum: &Checksum) -> HostResult<()> {
        if self.codes.read().contains_key(checksum) {
            Ok(())
        } else {
            Err(HostError::not_found(format!("code {checksum}")))
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

impl ModuleCache for MockCache {
    fn save_wasm(&self, wasm: &[u8]) -> HostResult<Checksum> {
        if wasm.is_empty() {
            return Err(HostError::other("empty module"));
        }
        let checksum = Checksum::generate(wasm);
        let mut codes = self.codes.write();
        if codes.insert(checksum, wasm.to_vec()).is_none() {
            let mut metrics = self.metrics.lock();
            metrics.elements_memory_cache += 1;
            metrics.size_memory_cache += wasm.len() as u64;
        }
        Ok(checksum)
    }

    fn load_wasm(&self, checksum: &Checksum) -> HostResult<Vec<u8>> {
        let code = self.codes.read().get(checksum).cloned();
        let pinned = self.pinned.read().contains(checksum);
        let mut metrics = self.metrics.lock();
        match code {
            Some(code) if pinned => {
                metrics.hits_pinned_memory_cache += 1;
                Ok(code)
            }
            Some(code) => {
                metrics.hits_memory_cache += 1;
                Ok(code)
            }
            None => {
                metrics.misses += 1;
                Err(HostError::not_found(format!("code {checksum}")))
            }
        }
    }

    fn pin(&self, checksum: &Checksum) -> HostResult<()> {
        self.known(checksum)?;
        if self.pinned.write().insert(*checksum) {
            let size = self.codes.read().get(checksum).map_or(0, Vec::len) as u64;
            let mut metrics = self.metrics.lock();
            metrics.elements_pinned_memory_cache += 1;
            metrics.size_pinned_memory_cache += size;
        }
        Ok(())
    }

    fn unpin(&self, checksum: &Checksum) -> HostResult<()> {
        if self.pinned.write().remove(checksum) {
            let size = self.codes.read().get(checksum).map_or(0, Vec::len) as u64;
            let mut metrics = self.metrics.lock();
            metrics.elements_pinned_memory_cache =
                metrics.elements_pinned_memory_cache.saturating_sub(1);
            metrics.size_pinned_memory_cache =
                metrics.size_pinned_memory_cache.saturating_sub(size);
        }
        Ok(())
    }

    fn analyze_code(&self, checksum: &Checksum) -> HostResult<AnalysisReport> {
        let codes = self.codes.read();
        let code = codes
            .get(checksum)
            .ok_or_else(|| HostError::not_found(format!("code {checksum}")))?;
        let ibc_export = EntryPoint::IbcChannelOpen.export_name();
        Ok(AnalysisReport {
            has_ibc_entry_points: contains(code, ibc_export.as_bytes()),
            required_features: KNOWN_CAPABILITIES
                .iter()
                .filter(|name| contains(code, format!("requires_{name}").as_bytes()))
                .map(|name| name.to_string())
                .collect(),
        })
    }

    fn metrics(&self) -> Metrics {
        *self.metrics.lock()
    }
}

/// Instruction understood by [`ScriptEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOp {
    Set {
        key: String,
        value: String,
    },
    Get {
        key: String,
    },
    Delete {
        key: String,
    },
    Scan {
        #[serde(default)]
        start: Option<String>,
        #[serde(default)]
        end: Option<String>,
        #[serde(default)]
        descending: bool,
    },
    Call {
        contract: String,
        #[serde(default)]
        delegate: bool,
        #[serde(default)]
        funds: Vec<Coin>,
        ops: Vec<ScriptOp>,
    },
    Query {
        request: String,
        gas_limit: u64,
    },
    Canonicalize {
        address: String,
    },
    Fail {
        message: String,
    },
    Panic {
        message: String,
    },
}

/// One `Engine::run` observed by [`ScriptEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRun {
    pub entry_point: EntryPoint,
    pub checksum: Checksum,
    pub call: CallHandle,
    pub depth: u32,
}

/// Engine that interprets the message as a JSON array of [`ScriptOp`]s.
///
/// Each op costs `op_cost` engine gas. The output is a JSON array with one
/// value per op.
#[derive(Debug)]
pub struct ScriptEngine {
    op_cost: u64,
    runs: Mutex<Vec<EngineRun>>,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self {
            op_cost: 1,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn msg(ops: &[ScriptOp]) -> Vec<u8> {
        serde_json::to_vec(ops).unwrap_or_default()
    }

    pub fn runs(&self) -> Vec<EngineRun> {
        self.runs.lock().clone()
    }

    fn step(
        &self,
        op: &ScriptOp,
        invocation: &Invocation<'_>,
        backend: &Backend,
        gas: &mut GasInfo,
    ) -> HostResult<Value> {
        let remaining = invocation.gas_limit.saturating_sub(gas.total());
        let output = match op {
            ScriptOp::Set { key, value } => {
                let (res, used) = backend.set(key.as_bytes(), value.as_bytes());
                *gas += used;
                res?;
                Value::Null
            }
            ScriptOp::Get { key } => {
                let (res, used) = backend.get(key.as_bytes());
                *gas += used;
                res?.map_or(Value::Null, |v| json!(String::from_utf8_lossy(&v)))
            }
            ScriptOp::Delete { key } => {
                let (res, used) = backend.delete(key.as_bytes());
                *gas += used;
                res?;
                Value::Null
            }
            ScriptOp::Scan {
                start,
                end,
                descending,
            } => {
                let order = if *descending {
                    Order::Descending
                } else {
                    Order::Ascending
                };
                let (res, used) = backend.scan(
                    start.as_deref().map(str::as_bytes),
                    end.as_deref().map(str::as_bytes),
                    order,
                );
                *gas += used;
                let iterator = res?;
                let mut records = Vec::new();
                loop {
                    let (res, used) = backend.next(iterator);
                    *gas += used;
                    match res? {
                        Some((k, v)) => records.push(json!([
                            String::from_utf8_lossy(&k),
                            String::from_utf8_lossy(&v)
                        ])),
                        None => break,
                    }
                }
                Value::Array(records)
            }
            ScriptOp::Call {
                contract,
                delegate,
                funds,
                ops,
            } => {
                let ctx = backend.dispatcher().lookup(backend.call())?;
                let request = ContractCall {
                    contract_address: contract.clone(),
                    kind: if *delegate {
                        CallKind::DelegateCall
                    } else {
                        CallKind::Call
                    },
                    sender: ctx.contract_address().unwrap_or_default().to_string(),
                    funds: funds.clone(),
                    env: invocation.env.to_vec(),
                    msg: Self::msg(ops),
                    gas_limit: remaining,
                };
                let (res, used) = backend.call_contract(self, &request);
                *gas += used;
                serde_json::from_slice(&res?).map_err(|err| HostError::engine(err.to_string()))?
            }
            ScriptOp::Query { request, gas_limit } => {
                let (res, used) = backend.query(request.as_bytes(), *gas_limit);
                *gas += used;
                match res? {
                    SystemResult::Ok(ContractResult::Ok(data)) => {
                        json!({ "ok": String::from_utf8_lossy(&data) })
                    }
                    SystemResult::Ok(ContractResult::Err(err)) => json!({ "contract_err": err }),
                    SystemResult::Err(err) => json!({ "system_err": format!("{err:?}") }),
                }
            }
            ScriptOp::Canonicalize { address } => {
                let (res, used) = backend.canonicalize_address(address);
                *gas += used;
                json!(hex::encode(res?))
            }
            ScriptOp::Fail { message } => return Err(HostError::engine(message.clone())),
            ScriptOp::Panic { message } => panic!("{message}"),
        };
        *gas += GasInfo::with_cost(self.op_cost);
        if gas.total() > invocation.gas_limit {
            return Err(HostError::OutOfGas {
                limit: invocation.gas_limit,
                requested: gas.total(),
            });
        }
        Ok(output)
    }
}

impl Engine for ScriptEngine {
    fn run(&self, invocation: Invocation<'_>, backend: &Backend) -> (HostResult<Vec<u8>>, GasInfo) {
        let depth = backend
            .dispatcher()
            .lookup(backend.call())
            .map(|ctx| ctx.depth())
            .unwrap_or_default();
        self.runs.lock().push(EngineRun {
            entry_point: invocation.entry_point,
            checksum: invocation.checksum,
            call: backend.call(),
            depth,
        });

        let mut gas = GasInfo::free();
        let ops: Vec<ScriptOp> = match serde_json::from_slice(invocation.msg) {
            Ok(ops) => ops,
            Err(err) => return (Err(HostError::engine(err.to_string())), gas),
        };
        let mut outputs = Vec::with_capacity(ops.len());
        for op in &ops {
            match self.step(op, &invocation, backend, &mut gas) {
                Ok(output) => outputs.push(output),
                Err(err) => return (Err(err), gas),
            }
        }
        let result = serde_json::to_vec(&outputs).map_err(|err| HostError::engine(err.to_string()));
        (result, gas)
    }
}

/// A binding over a fresh [`MemoryStore`] with an effectively unlimited meter.
pub fn test_binding() -> CallBinding {
    test_binding_with_limit(u64::MAX)
}

pub fn test_binding_with_limit(gas_limit: u64) -> CallBinding {
    CallBinding::new(
        Arc::new(MemoryStore::new()),
        Arc::new(BasicGasMeter::new(gas_limit)),
        Arc::new(MockQuerier::new()),
    )
}

pub fn test_binding_with_querier(querier: Arc<dyn Querier>) -> CallBinding {
    CallBinding::new(
        Arc::new(MemoryStore::new()),
        Arc::new(BasicGasMeter::new(u64::MAX)),
        querier,
    )
}

/// A dispatcher over [`MockApi`] and [`MockCache`] with default pricing.
pub fn test_dispatcher() -> Arc<Dispatcher> {
    test_dispatcher_with(Arc::new(MockApi::new()), HostConfig::default().max_call_depth)
}

pub fn test_dispatcher_with(api: Arc<MockApi>, max_call_depth: u32) -> Arc<Dispatcher> {
    let config = HostConfig {
        max_call_depth,
        ..HostConfig::default()
    };
    Arc::new(Dispatcher::new(api, MockCache::handle(), &config))
}
