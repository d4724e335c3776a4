//! Contract-to-contract calls run end to end through the script engine.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crosscall_host::testing::{test_dispatcher_with, MockApi, MockQuerier, ScriptEngine, ScriptOp};
use crosscall_host::{
    Backend, BasicGasMeter, CallBinding, Checksum, Coin, Dispatcher, Engine, EntryPoint, ErrorCode,
    GasInfo, HostError, HostResult, Invocation,
};
use serde_json::{json, Value};

const GAS: u64 = 10_000_000;

struct World {
    api: Arc<MockApi>,
    dispatcher: Arc<Dispatcher>,
    engine: ScriptEngine,
}

fn world(max_call_depth: u32) -> World {
    let api = Arc::new(MockApi::new());
    api.register_contract("addr01", [1u8; 32]);
    api.register_contract("addr02", [2u8; 32]);
    let dispatcher = test_dispatcher_with(Arc::clone(&api), max_call_depth);
    World {
        api,
        dispatcher,
        engine: ScriptEngine::new(),
    }
}

fn run(world: &World, contract: &str, ops: &[ScriptOp]) -> (HostResult<Value>, GasInfo) {
    let binding = CallBinding::new(
        world.api.contract_store(contract),
        Arc::new(BasicGasMeter::new(GAS)),
        Arc::new(MockQuerier::new()),
    )
    .with_contract(contract);
    let guard = world.dispatcher.enter(binding);
    let backend = Backend::new(Arc::clone(&world.dispatcher), guard.call());

    let msg = ScriptEngine::msg(ops);
    let invocation = Invocation {
        entry_point: EntryPoint::Execute,
        checksum: Checksum::from([1u8; 32]),
        env: b"{}",
        info: None,
        msg: &msg,
        gas_limit: GAS,
        print_debug: false,
    };
    let (result, gas) = world.engine.run(invocation, &backend);
    (
        result.map(|out| serde_json::from_slice(&out).unwrap()),
        gas,
    )
}

fn set(key: &str, value: &str) -> ScriptOp {
    ScriptOp::Set {
        key: key.into(),
        value: value.into(),
    }
}

fn get(key: &str) -> ScriptOp {
    ScriptOp::Get { key: key.into() }
}

fn call(contract: &str, ops: Vec<ScriptOp>) -> ScriptOp {
    ScriptOp::Call {
        contract: contract.into(),
        delegate: false,
        funds: Vec::new(),
        ops,
    }
}

#[test]
fn plain_call_uses_callee_storage() {
    let world = world(10);
    let (result, _) = run(
        &world,
        "addr01",
        &[call("addr02", vec![set("k", "v"), get("k")]), get("k")],
    );
    assert_eq!(result.unwrap(), json!([[null, "v"], null]));

    let callee = world.api.contract_store("addr02");
    assert_eq!(callee.get(b"k").unwrap(), Some(b"v".to_vec()));
    let caller = world.api.contract_store("addr01");
    assert_eq!(caller.get(b"k").unwrap(), None);
    assert!(world.dispatcher.registry().is_empty());
}

#[test]
fn delegate_call_uses_caller_storage() {
    let world = world(10);
    let delegate = ScriptOp::Call {
        contract: "addr02".into(),
        delegate: true,
        funds: Vec::new(),
        ops: vec![set("shared", "yes")],
    };
    let (result, _) = run(&world, "addr01", &[delegate, get("shared")]);
    assert_eq!(result.unwrap(), json!([[null], "yes"]));
    assert_eq!(
        world.api.contract_store("addr02").get(b"shared").unwrap(),
        None
    );

    let runs = world.engine.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1].checksum, Checksum::from([2u8; 32]));
    assert_eq!(runs[1].depth, 1);
}

#[test]
fn funds_move_before_the_callee_runs() {
    let world = world(10);
    world
        .api
        .set_balance("addr01", &Coin::new(100, "ucc"))
        .unwrap();
    let paid = ScriptOp::Call {
        contract: "addr02".into(),
        delegate: false,
        funds: vec![Coin::new(40, "ucc")],
        ops: vec![],
    };
    let (result, gas) = run(&world, "addr01", &[paid.clone()]);
    result.unwrap();
    assert_eq!(world.api.balance("addr01", "ucc"), 60);
    assert_eq!(world.api.balance("addr02", "ucc"), 40);
    assert!(gas.externally_used > 0);

    let broke = ScriptOp::Call {
        contract: "addr02".into(),
        delegate: false,
        funds: vec![Coin::new(1_000, "ucc")],
        ops: vec![],
    };
    let before = world.engine.runs().len();
    let (result, _) = run(&world, "addr01", &[broke]);
    assert!(matches!(result, Err(HostError::Api(_))));
    // Only the top-level run was recorded.
    assert_eq!(world.engine.runs().len(), before + 1);
}

#[test]
fn unknown_callee_is_not_found() {
    let world = world(10);
    let (result, _) = run(&world, "addr01", &[call("addr99", vec![])]);
    assert_eq!(result.unwrap_err().code(), ErrorCode::NotFound);
    assert!(world.dispatcher.registry().is_empty());
}

#[test]
fn depth_limit_stops_recursion_and_releases_everything() {
    let world = world(2);
    let nested = call("addr01", vec![call("addr02", vec![call("addr01", vec![])])]);
    let (result, _) = run(&world, "addr01", &[nested]);
    assert_eq!(
        result.unwrap_err(),
        HostError::CallDepthExceeded { depth: 3, max: 2 }
    );
    assert!(world.dispatcher.registry().is_empty());
}

#[test]
fn child_failure_propagates_and_releases_child() {
    let world = world(10);
    let failing = call(
        "addr02",
        vec![
            set("partial", "1"),
            ScriptOp::Fail {
                message: "refused".into(),
            },
        ],
    );
    let (result, _) = run(&world, "addr01", &[failing]);
    assert_eq!(result.unwrap_err(), HostError::engine("refused"));
    assert!(world.dispatcher.registry().is_empty());
}

#[test]
fn panicking_child_still_releases_every_handle() {
    let world = world(10);
    let panicking = call(
        "addr02",
        vec![ScriptOp::Panic {
            message: "trap".into(),
        }],
    );
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(&world, "addr01", &[panicking])));
    assert!(outcome.is_err());
    assert!(world.dispatcher.registry().is_empty());
}

#[test]
fn child_handles_are_distinct_from_parent() {
    let world = world(10);
    let (result, _) = run(
        &world,
        "addr01",
        &[call("addr02", vec![]), call("addr02", vec![])],
    );
    result.unwrap();

    let runs = world.engine.runs();
    assert_eq!(runs.len(), 3);
    assert_ne!(runs[0].call, runs[1].call);
    assert_ne!(runs[1].call, runs[2].call);
    assert_eq!(runs[0].depth, 0);
    assert!(runs[1..].iter().all(|run| run.depth == 1));
}
