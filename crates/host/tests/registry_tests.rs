//! Registry behaviour under concurrency and arbitrary register/release
//! sequences.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use crosscall_host::testing::test_binding;
use crosscall_host::{CallHandle, CallRegistry, HostError};
use proptest::prelude::*;

#[test]
fn concurrent_registration_yields_distinct_handles() {
    let registry = Arc::new(CallRegistry::new());
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                (0..250)
                    .map(|_| registry.register(test_binding()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for thread in threads {
        for handle in thread.join().unwrap() {
            assert!(seen.insert(handle), "duplicate {handle}");
        }
    }
    assert_eq!(registry.len(), 2000);
}

#[test]
fn concurrent_lookup_and_release() {
    let registry = Arc::new(CallRegistry::new());
    let handles: Vec<_> = (0..64).map(|_| registry.register(test_binding())).collect();

    let threads: Vec<_> = handles
        .chunks(16)
        .map(|chunk| {
            let registry = Arc::clone(&registry);
            let chunk = chunk.to_vec();
            thread::spawn(move || {
                for handle in chunk {
                    let ctx = registry.lookup(handle).unwrap();
                    ctx.store().set(b"key", b"value").unwrap();
                    assert!(registry.release(handle));
                    assert!(!registry.release(handle));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    assert!(registry.is_empty());
    for handle in handles {
        assert!(matches!(
            registry.lookup(handle),
            Err(HostError::NotFound { .. })
        ));
    }
}

#[derive(Debug, Clone)]
enum Step {
    Register,
    Release(usize),
    ReleaseUnknown(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Register),
        2 => any::<usize>().prop_map(Step::Release),
        1 => (1_000_000u64..2_000_000).prop_map(Step::ReleaseUnknown),
    ]
}

proptest! {
    #[test]
    fn live_handles_match_a_model(steps in prop::collection::vec(step(), 1..64)) {
        let registry = CallRegistry::new();
        let mut live: Vec<CallHandle> = Vec::new();
        let mut issued: HashSet<CallHandle> = HashSet::new();

        for step in steps {
            match step {
                Step::Register => {
                    let handle = registry.register(test_binding());
                    prop_assert!(issued.insert(handle));
                    live.push(handle);
                }
                Step::Release(index) if !live.is_empty() => {
                    let handle = live.remove(index % live.len());
                    prop_assert!(registry.release(handle));
                    prop_assert!(!registry.release(handle));
                }
                Step::Release(_) => {}
                Step::ReleaseUnknown(id) => {
                    prop_assert!(!registry.release(CallHandle(id)));
                }
            }
            prop_assert_eq!(registry.len(), live.len());
        }

        for handle in &live {
            prop_assert!(registry.lookup(*handle).is_ok());
        }
        for handle in issued.iter().filter(|h| !live.contains(h)) {
            let is_not_found = matches!(registry.lookup(*handle), Err(HostError::NotFound { .. }));
            prop_assert!(is_not_found);
        }
    }
}
