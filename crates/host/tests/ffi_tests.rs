//! Callbacks invoked through the C vtable exactly as a native engine would.

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use crosscall_host::ffi::cache_from_raw;
use crosscall_host::testing::{
    test_binding_with_limit, test_dispatcher_with, MockApi, MOCK_TRANSFER_COST,
};
use crosscall_host::{ErrorCode, IteratorReference, OwnedVtable};
use crosscall_memory::{ByteSliceView, UnmanagedVector};

fn setup() -> (OwnedVtable, u64, Arc<MockApi>) {
    let api = Arc::new(MockApi::new());
    api.register_contract("addr02", [2u8; 32]);
    let dispatcher = test_dispatcher_with(Arc::clone(&api), 10);
    let call = dispatcher.register(test_binding_with_limit(1_000_000).with_contract("addr01"));
    (OwnedVtable::new(dispatcher), call.id(), api)
}

fn view(bytes: &[u8]) -> ByteSliceView {
    ByteSliceView::new(Some(bytes))
}

#[test]
fn set_get_through_the_vtable() {
    let (owned, call, _) = setup();
    let vt = owned.vtable();

    let mut gas = 0u64;
    let mut err = UnmanagedVector::default();
    let code = (vt.db_set)(vt.state, call, &mut gas, view(b"k"), view(b"value"), &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(gas, 2000 + 30 * 6);
    assert!(err.is_none());

    let mut value = UnmanagedVector::default();
    let code = (vt.db_get)(vt.state, call, &mut gas, view(b"k"), &mut value, &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(value.consume(), Some(b"value".to_vec()));

    let mut missing = UnmanagedVector::default();
    let code = (vt.db_get)(vt.state, call, &mut gas, view(b"nope"), &mut missing, &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert!(missing.is_none());
}

#[test]
fn unknown_call_reports_not_found_with_detail() {
    let (owned, _, _) = setup();
    let vt = owned.vtable();

    let mut gas = 99u64;
    let mut err = UnmanagedVector::default();
    let mut value = UnmanagedVector::default();
    let code = (vt.db_get)(vt.state, 777, &mut gas, view(b"k"), &mut value, &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::NotFound);
    assert_eq!(gas, 0);
    let message = String::from_utf8(err.consume().unwrap()).unwrap();
    assert!(message.contains("call#777"), "{message}");
}

#[test]
fn scan_and_iterate_to_the_end() {
    let (owned, call, _) = setup();
    let vt = owned.vtable();
    let mut gas = 0u64;
    let mut err = UnmanagedVector::default();
    for key in [b"a", b"b"] {
        (vt.db_set)(vt.state, call, &mut gas, view(key), view(b"v"), &mut err);
    }

    let mut iterator = IteratorReference::default();
    let code = (vt.db_scan)(
        vt.state,
        call,
        &mut gas,
        ByteSliceView::nil(),
        ByteSliceView::nil(),
        2,
        &mut iterator,
        &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(iterator.call_id, call);
    assert_eq!(iterator.iterator_id, 1);

    let mut keys = Vec::new();
    loop {
        let mut key = UnmanagedVector::default();
        let mut value = UnmanagedVector::default();
        let code = (vt.iterator_next)(vt.state, iterator, &mut gas, &mut key, &mut value, &mut err);
        assert_eq!(ErrorCode::from(code), ErrorCode::None);
        match key.consume() {
            Some(key) => {
                keys.push(key);
                assert_eq!(value.consume(), Some(b"v".to_vec()));
            }
            None => break,
        }
    }
    assert_eq!(keys, vec![b"b".to_vec(), b"a".to_vec()]);
}

#[test]
fn bad_scan_arguments_are_other() {
    let (owned, call, _) = setup();
    let vt = owned.vtable();
    let mut gas = 0u64;
    let mut iterator = IteratorReference::default();

    let mut err = UnmanagedVector::default();
    let code = (vt.db_scan)(
        vt.state, call, &mut gas, view(b"z"), view(b"a"), 1, &mut iterator, &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::Other);
    assert!(err.consume().is_some());

    let mut err = UnmanagedVector::default();
    let code = (vt.db_scan)(
        vt.state,
        call,
        &mut gas,
        ByteSliceView::nil(),
        ByteSliceView::nil(),
        7,
        &mut iterator,
        &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::Other);
    assert!(err.consume().is_some());
}

#[test]
fn address_round_trip_through_the_vtable() {
    let (owned, call, _) = setup();
    let vt = owned.vtable();
    let mut gas = 0u64;
    let mut err = UnmanagedVector::default();

    let mut canonical = UnmanagedVector::default();
    let code = (vt.canonicalize_address)(
        vt.state, call, &mut gas, view(b"addrbeef"), &mut canonical, &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(gas, 10 * 8);
    let canonical = canonical.consume().unwrap();
    assert_eq!(canonical, vec![0xbe, 0xef]);

    let mut human = UnmanagedVector::default();
    let code = (vt.humanize_address)(
        vt.state,
        call,
        &mut gas,
        view(&canonical),
        &mut human,
        &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(human.consume(), Some(b"addrbeef".to_vec()));

    let mut out = UnmanagedVector::default();
    let code = (vt.canonicalize_address)(
        vt.state,
        call,
        &mut gas,
        view(b"bogus"),
        &mut out,
        &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::Other);
    assert!(err.consume().is_some());
}

#[test]
fn resolve_and_release_through_the_vtable() {
    let (owned, call, _) = setup();
    let vt = owned.vtable();
    let mut gas = 0u64;
    let mut err = UnmanagedVector::default();
    let mut checksum = UnmanagedVector::default();
    let mut child = 0u64;

    let code = (vt.resolve_call)(
        vt.state,
        call,
        &mut gas,
        view(b"addr02"),
        view(b"addr02"),
        &mut checksum,
        &mut child,
        &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(checksum.consume(), Some(vec![2u8; 32]));
    assert_ne!(child, call);

    let mut value = UnmanagedVector::default();
    (vt.db_set)(vt.state, child, &mut gas, view(b"x"), view(b"1"), &mut err);
    let code = (vt.db_get)(vt.state, child, &mut gas, view(b"x"), &mut value, &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(value.consume(), Some(b"1".to_vec()));

    assert_eq!((vt.release)(vt.state, child), 0);
    assert_eq!((vt.release)(vt.state, child), 0);

    let mut value = UnmanagedVector::default();
    let code = (vt.db_get)(vt.state, child, &mut gas, view(b"x"), &mut value, &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::NotFound);
}

#[test]
fn out_of_gas_is_distinct_code() {
    let api = Arc::new(MockApi::new());
    let dispatcher = test_dispatcher_with(api, 10);
    let call = dispatcher.register(test_binding_with_limit(10)).id();
    let owned = OwnedVtable::new(dispatcher);
    let vt = owned.vtable();

    let mut gas = 0u64;
    let mut err = UnmanagedVector::default();
    let code = (vt.db_delete)(vt.state, call, &mut gas, view(b"k"), &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::OutOfGas);
    assert_eq!(gas, 1000);
    assert!(err.consume().is_some());
}

#[test]
fn transfer_and_query_through_the_vtable() {
    let (owned, call, api) = setup();
    let vt = owned.vtable();
    api.set_balance("addr01", &crosscall_host::Coin::new(10, "ucc"))
        .unwrap();

    let mut gas = 0u64;
    let mut err = UnmanagedVector::default();
    let coins = br#"[{"denom":"ucc","amount":"4"},{"denom":"ucc","amount":"1"}]"#;
    let code = (vt.transfer_coins)(
        vt.state,
        call,
        &mut gas,
        view(b"addr02"),
        view(b"addr01"),
        view(coins),
        &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(api.balance("addr02", "ucc"), 5);
    assert_eq!(gas, MOCK_TRANSFER_COST * 2);

    let mut result = UnmanagedVector::default();
    let code = (vt.query_external)(
        vt.state,
        call,
        &mut gas,
        1_000,
        view(b"q"),
        &mut result,
        &mut err,
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert_eq!(gas, 1);
    assert!(result.consume().is_some());
}

#[test]
fn null_pointers_are_rejected_not_dereferenced() {
    let (owned, call, _) = setup();
    let vt = owned.vtable();
    let mut gas = 5u64;
    let mut err = UnmanagedVector::default();

    let code = (vt.db_get)(vt.state, call, &mut gas, view(b"k"), ptr::null_mut(), &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::Other);
    assert_eq!(gas, 0);
    assert!(err.consume().is_some());

    let mut value = UnmanagedVector::default();
    let code = (vt.db_get)(
        ptr::null(),
        call,
        ptr::null_mut(),
        view(b"k"),
        &mut value,
        ptr::null_mut(),
    );
    assert_eq!(ErrorCode::from(code), ErrorCode::Other);
    assert_eq!((vt.release)(ptr::null(), call), ErrorCode::Other as i32);
}

#[test]
fn cache_handle_is_handed_out_by_reference() {
    let (owned, _, _) = setup();
    let vt = owned.vtable();

    let mut cache: *const c_void = ptr::null();
    let mut err = UnmanagedVector::default();
    let code = (vt.get_cache)(vt.state, &mut cache, &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::None);
    assert!(err.is_none());

    let handle = unsafe { cache_from_raw(cache) }.unwrap();
    assert!(ptr::eq(handle, owned.dispatcher().cache()));

    let checksum = handle.save_wasm(b"\0asm").unwrap();
    assert_eq!(
        owned.dispatcher().cache().load_wasm(&checksum).unwrap(),
        b"\0asm".to_vec()
    );

    let mut again: *const c_void = ptr::null();
    (vt.get_cache)(vt.state, &mut again, &mut err);
    assert_eq!(cache, again);

    let code = (vt.get_cache)(vt.state, ptr::null_mut(), &mut err);
    assert_eq!(ErrorCode::from(code), ErrorCode::Other);
    assert!(err.consume().is_some());
    assert!(unsafe { cache_from_raw(ptr::null()) }.is_none());
}
