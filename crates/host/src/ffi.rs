//! C ABI for a native engine.
//!
//! The engine receives a [`HostVtable`]: an opaque `state` pointer plus one
//! `extern "C"` function per callback. Every callback takes the `u64` call
//! handle of the invocation it serves, writes the gas it used to
//! `used_gas` on every path, and returns an [`ErrorCode`] as `i32`. Error
//! text is written to `err_out` only when the code is not `None`; the
//! engine frees it with [`destroy_unmanaged_vector`].
//!
//! Panics never cross the boundary; they are reported as `Other`.

use std::any::Any;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use crosscall_memory::{ByteSliceView, UnmanagedVector};
use crosscall_storage::Order;
use tracing::error;

pub use crosscall_memory::{destroy_unmanaged_vector, new_unmanaged_vector};

use crate::api::{Coin, ContractCreateRequest};
use crate::cache::CacheHandle;
use crate::dispatcher::{BackendResult, Dispatcher};
use crate::error::{ErrorCode, HostError, HostResult};
use crate::gas::GasInfo;
use crate::handle::{CallHandle, IteratorId};

/// Iterator reference as seen by the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IteratorReference {
    pub call_id: u64,
    pub iterator_id: u64,
}

impl From<IteratorId> for IteratorReference {
    fn from(id: IteratorId) -> Self {
        Self {
            call_id: id.call.id(),
            iterator_id: id.iterator_id,
        }
    }
}

impl From<IteratorReference> for IteratorId {
    fn from(reference: IteratorReference) -> Self {
        IteratorId::new(CallHandle(reference.call_id), reference.iterator_id)
    }
}

pub type DbGetFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    key: ByteSliceView,
    value_out: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type DbSetFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    key: ByteSliceView,
    value: ByteSliceView,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type DbDeleteFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    key: ByteSliceView,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type DbScanFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    start: ByteSliceView,
    end: ByteSliceView,
    order: i32,
    iterator_out: *mut IteratorReference,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type IteratorNextFn = extern "C" fn(
    state: *const c_void,
    iterator: IteratorReference,
    used_gas: *mut u64,
    key_out: *mut UnmanagedVector,
    value_out: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type AddressFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    input: ByteSliceView,
    output: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type ResolveCallFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    contract_address: ByteSliceView,
    store_address: ByteSliceView,
    checksum_out: *mut UnmanagedVector,
    new_call_id: *mut u64,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type TransferCoinsFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    contract_address: ByteSliceView,
    caller: ByteSliceView,
    coins_json: ByteSliceView,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type CreateContractFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    gas_limit: u64,
    request_json: ByteSliceView,
    address_out: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type QueryExternalFn = extern "C" fn(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    gas_limit: u64,
    request: ByteSliceView,
    result_out: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type GetCacheFn = extern "C" fn(
    state: *const c_void,
    cache_out: *mut *const c_void,
    err_out: *mut UnmanagedVector,
) -> i32;

pub type ReleaseFn = extern "C" fn(state: *const c_void, call_id: u64) -> i32;

/// Callback table handed to the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostVtable {
    pub state: *const c_void,
    pub db_get: DbGetFn,
    pub db_set: DbSetFn,
    pub db_delete: DbDeleteFn,
    pub db_scan: DbScanFn,
    pub iterator_next: IteratorNextFn,
    pub humanize_address: AddressFn,
    pub canonicalize_address: AddressFn,
    pub resolve_call: ResolveCallFn,
    pub transfer_coins: TransferCoinsFn,
    pub create_contract: CreateContractFn,
    pub query_external: QueryExternalFn,
    /// Writes the opaque module cache handle. The pointer is borrowed from
    /// the dispatcher and must not be freed.
    pub get_cache: GetCacheFn,
    pub release: ReleaseFn,
}

/// A [`HostVtable`] together with the dispatcher its `state` points to.
///
/// The table is only valid while this value is alive.
#[derive(Debug)]
pub struct OwnedVtable {
    dispatcher: Arc<Dispatcher>,
    vtable: HostVtable,
}

impl OwnedVtable {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let vtable = HostVtable {
            state: Arc::as_ptr(&dispatcher) as *const c_void,
            db_get,
            db_set,
            db_delete,
            db_scan,
            iterator_next,
            humanize_address,
            canonicalize_address,
            resolve_call,
            transfer_coins,
            create_contract,
            query_external,
            get_cache,
            release,
        };
        Self { dispatcher, vtable }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn vtable(&self) -> &HostVtable {
        &self.vtable
    }

    pub fn as_ptr(&self) -> *const HostVtable {
        &self.vtable
    }
}

/// # Safety
///
/// `state` must be null or the `state` field of a live [`OwnedVtable`].
unsafe fn host<'a>(state: *const c_void) -> HostResult<&'a Dispatcher> {
    (state as *const Dispatcher)
        .as_ref()
        .ok_or_else(|| HostError::other("host state is null"))
}

/// # Safety
///
/// The view must describe memory that stays valid for the callback.
unsafe fn bytes<'a>(view: &ByteSliceView, what: &str) -> HostResult<&'a [u8]> {
    view.read()
        .ok_or_else(|| HostError::other(format!("{what} is nil")))
}

unsafe fn text<'a>(view: &ByteSliceView, what: &str) -> HostResult<&'a str> {
    std::str::from_utf8(bytes(view, what)?)
        .map_err(|err| HostError::other(format!("{what} is not utf-8: {err}")))
}

fn output<T>(ptr: *mut T, what: &str) -> HostResult<()> {
    if ptr.is_null() {
        Err(HostError::other(format!("{what} output is null")))
    } else {
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one callback body. An outer `Err` is a malformed call and costs
/// nothing; the inner result carries the adapter outcome and its gas.
fn guarded<F>(op: &'static str, used_gas: *mut u64, err_out: *mut UnmanagedVector, body: F) -> i32
where
    F: FnOnce() -> HostResult<BackendResult<()>>,
{
    let (result, gas) = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => (Err(err), GasInfo::free()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(op, %message, "panic in host callback");
            (
                Err(HostError::other(format!("panic in {op}: {message}"))),
                GasInfo::free(),
            )
        }
    };

    if !used_gas.is_null() {
        // SAFETY: non-null and supplied by the engine for this call.
        unsafe { used_gas.write(gas.total()) };
    }

    match result {
        Ok(()) => ErrorCode::None.into(),
        Err(err) => {
            if !err_out.is_null() {
                // SAFETY: as above; the engine owns and frees the vector.
                unsafe { err_out.write(UnmanagedVector::some(err.to_string())) };
            }
            err.code().into()
        }
    }
}

extern "C" fn db_get(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    key: ByteSliceView,
    value_out: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("db_get", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let key = unsafe { bytes(&key, "key")? };
        output(value_out, "value")?;
        let (result, gas) = host.db_get(CallHandle(call_id), key);
        let result = result.map(|value| unsafe { value_out.write(UnmanagedVector::new(value)) });
        Ok((result, gas))
    })
}

extern "C" fn db_set(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    key: ByteSliceView,
    value: ByteSliceView,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("db_set", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let key = unsafe { bytes(&key, "key")? };
        let value = unsafe { bytes(&value, "value")? };
        Ok(host.db_set(CallHandle(call_id), key, value))
    })
}

extern "C" fn db_delete(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    key: ByteSliceView,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("db_delete", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let key = unsafe { bytes(&key, "key")? };
        Ok(host.db_delete(CallHandle(call_id), key))
    })
}

extern "C" fn db_scan(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    start: ByteSliceView,
    end: ByteSliceView,
    order: i32,
    iterator_out: *mut IteratorReference,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("db_scan", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let start = unsafe { start.read() };
        let end = unsafe { end.read() };
        let order = Order::try_from(order)?;
        output(iterator_out, "iterator")?;
        let (result, gas) = host.db_scan(CallHandle(call_id), start, end, order);
        let result = result.map(|id| unsafe { iterator_out.write(id.into()) });
        Ok((result, gas))
    })
}

extern "C" fn iterator_next(
    state: *const c_void,
    iterator: IteratorReference,
    used_gas: *mut u64,
    key_out: *mut UnmanagedVector,
    value_out: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("iterator_next", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        output(key_out, "key")?;
        output(value_out, "value")?;
        let (result, gas) = host.iterator_next(iterator.into());
        let result = result.map(|record| {
            // End of sequence is a `None` key with code `None`.
            let (key, value) = match record {
                Some((key, value)) => (Some(key), Some(value)),
                None => (None, None),
            };
            unsafe {
                key_out.write(UnmanagedVector::new(key));
                value_out.write(UnmanagedVector::new(value));
            }
        });
        Ok((result, gas))
    })
}

extern "C" fn humanize_address(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    input: ByteSliceView,
    output_vec: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("humanize_address", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let canonical = unsafe { bytes(&input, "canonical address")? };
        output(output_vec, "human address")?;
        let (result, gas) = host.humanize_address(CallHandle(call_id), canonical);
        let result = result.map(|human| unsafe {
            output_vec.write(UnmanagedVector::some(human.into_bytes()))
        });
        Ok((result, gas))
    })
}

extern "C" fn canonicalize_address(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    input: ByteSliceView,
    output_vec: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("canonicalize_address", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let human = unsafe { text(&input, "human address")? };
        output(output_vec, "canonical address")?;
        let (result, gas) = host.canonicalize_address(CallHandle(call_id), human);
        let result =
            result.map(|canonical| unsafe { output_vec.write(UnmanagedVector::some(canonical)) });
        Ok((result, gas))
    })
}

extern "C" fn resolve_call(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    contract_address: ByteSliceView,
    store_address: ByteSliceView,
    checksum_out: *mut UnmanagedVector,
    new_call_id: *mut u64,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("resolve_call", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let contract = unsafe { text(&contract_address, "contract address")? };
        let store = unsafe { text(&store_address, "store address")? };
        output(checksum_out, "checksum")?;
        output(new_call_id, "call id")?;
        let (result, gas) = host.resolve_call(CallHandle(call_id), contract, store);
        let result = result.map(|resolved| unsafe {
            checksum_out.write(UnmanagedVector::some(resolved.checksum.as_ref()));
            new_call_id.write(resolved.call.id());
        });
        Ok((result, gas))
    })
}

extern "C" fn transfer_coins(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    contract_address: ByteSliceView,
    caller: ByteSliceView,
    coins_json: ByteSliceView,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("transfer_coins", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let contract = unsafe { text(&contract_address, "contract address")? };
        let caller = unsafe { text(&caller, "caller")? };
        let coins: Vec<Coin> = serde_json::from_slice(unsafe { bytes(&coins_json, "coins")? })
            .map_err(|err| HostError::other(format!("coins: {err}")))?;
        Ok(host.transfer_coins(CallHandle(call_id), contract, caller, &coins))
    })
}

extern "C" fn create_contract(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    gas_limit: u64,
    request_json: ByteSliceView,
    address_out: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("create_contract", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let request: ContractCreateRequest =
            serde_json::from_slice(unsafe { bytes(&request_json, "request")? })
                .map_err(|err| HostError::other(format!("create request: {err}")))?;
        output(address_out, "address")?;
        let (result, gas) = host.create_contract(CallHandle(call_id), &request, gas_limit);
        let result = result.map(|address| unsafe {
            address_out.write(UnmanagedVector::some(address.into_bytes()))
        });
        Ok((result, gas))
    })
}

extern "C" fn query_external(
    state: *const c_void,
    call_id: u64,
    used_gas: *mut u64,
    gas_limit: u64,
    request: ByteSliceView,
    result_out: *mut UnmanagedVector,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("query_external", used_gas, err_out, || {
        let host = unsafe { host(state)? };
        let request = unsafe { bytes(&request, "request")? };
        output(result_out, "result")?;
        let (result, gas) = host.query_external(CallHandle(call_id), request, gas_limit);
        let result =
            result.map(|response| unsafe { result_out.write(UnmanagedVector::some(response)) });
        Ok((result, gas))
    })
}

extern "C" fn get_cache(
    state: *const c_void,
    cache_out: *mut *const c_void,
    err_out: *mut UnmanagedVector,
) -> i32 {
    guarded("get_cache", ptr::null_mut(), err_out, || {
        let host = unsafe { host(state)? };
        output(cache_out, "cache")?;
        let cache = host.cache() as *const CacheHandle as *const c_void;
        unsafe { cache_out.write(cache) };
        Ok((Ok(()), GasInfo::free()))
    })
}

/// Turns a pointer written by `get_cache` back into the handle.
///
/// # Safety
///
/// `cache` must be null or come from `get_cache` on a vtable that is still
/// alive.
pub unsafe fn cache_from_raw<'a>(cache: *const c_void) -> Option<&'a CacheHandle> {
    (cache as *const CacheHandle).as_ref()
}

/// Releasing an unknown handle is not an error.
extern "C" fn release(state: *const c_void, call_id: u64) -> i32 {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let host = unsafe { host(state)? };
        host.release(CallHandle(call_id));
        Ok::<(), HostError>(())
    }));
    match outcome {
        Ok(Ok(())) => ErrorCode::None.into(),
        Ok(Err(err)) => err.code().into(),
        Err(_) => ErrorCode::Other.into(),
    }
}
