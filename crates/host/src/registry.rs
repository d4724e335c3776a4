//! Handle arena for in-flight calls.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::context::{CallBinding, InvocationContext};
use crate::error::{HostError, HostResult};
use crate::handle::CallHandle;

#[derive(Debug)]
struct RegistryState {
    next_id: u64,
    calls: HashMap<CallHandle, Arc<InvocationContext>>,
    /// Live child count per registered parent.
    children: HashMap<CallHandle, usize>,
}

impl RegistryState {
    fn allocate(&mut self) -> CallHandle {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);
            let handle = CallHandle(id);
            if !self.calls.contains_key(&handle) {
                return handle;
            }
        }
    }

    fn forget_child(&mut self, parent: CallHandle) {
        if let Some(count) = self.children.get_mut(&parent) {
            *count -= 1;
            if *count == 0 {
                self.children.remove(&parent);
            }
        }
    }
}

/// Maps opaque call handles to their invocation contexts.
///
/// The lock only guards the map. Lookups clone the `Arc` out, so storage
/// and query I/O for one call never blocks registration or lookup of
/// another.
#[derive(Debug)]
pub struct CallRegistry {
    state: Mutex<RegistryState>,
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                next_id: 1,
                calls: HashMap::new(),
                children: HashMap::new(),
            }),
        }
    }

    /// Registers a top-level call.
    pub fn register(&self, binding: CallBinding) -> CallHandle {
        self.insert(binding, None, 0)
    }

    /// Registers a call nested under `parent`, one level deeper.
    pub fn register_child(
        &self,
        parent: &InvocationContext,
        binding: CallBinding,
    ) -> CallHandle {
        self.insert(
            binding,
            Some(parent.handle()),
            parent.depth().saturating_add(1),
        )
    }

    fn insert(&self, binding: CallBinding, parent: Option<CallHandle>, depth: u32) -> CallHandle {
        let handle = {
            let mut state = self.state.lock();
            let handle = state.allocate();
            let context = InvocationContext::new(handle, parent, depth, binding);
            state.calls.insert(handle, Arc::new(context));
            if let Some(parent) = parent.filter(|p| state.calls.contains_key(p)) {
                *state.children.entry(parent).or_insert(0) += 1;
            }
            handle
        };
        debug!(%handle, ?parent, depth, "registered call");
        handle
    }

    /// Returns the live context for `handle`.
    pub fn lookup(&self, handle: CallHandle) -> HostResult<Arc<InvocationContext>> {
        self.state
            .lock()
            .calls
            .get(&handle)
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("{handle}")))
    }

    /// Releases `handle`. Unknown or already released handles are a no-op.
    ///
    /// Returns whether a context was removed. Children are left registered.
    pub fn release(&self, handle: CallHandle) -> bool {
        let (removed, live_children) = {
            let mut state = self.state.lock();
            let removed = state.calls.remove(&handle);
            let live_children = match &removed {
                Some(context) => {
                    if let Some(parent) = context.parent() {
                        state.forget_child(parent);
                    }
                    state.children.remove(&handle).unwrap_or(0)
                }
                None => 0,
            };
            (removed, live_children)
        };

        match removed {
            Some(context) => {
                if live_children > 0 {
                    warn!(%handle, live_children, "released call with live child calls");
                }
                debug!(
                    %handle,
                    iterators = context.iterator_count(),
                    "released call"
                );
                true
            }
            None => {
                debug!(%handle, "release of unknown call ignored");
                false
            }
        }
    }

    pub fn contains(&self, handle: CallHandle) -> bool {
        self.state.lock().calls.contains_key(&handle)
    }

    /// Number of live calls registered under `parent`.
    pub fn child_count(&self, parent: CallHandle) -> usize {
        self.state
            .lock()
            .children
            .get(&parent)
            .copied()
            .unwrap_or(0)
    }

    /// Handles currently registered with `parent` as their parent.
    pub fn children_of(&self, parent: CallHandle) -> Vec<CallHandle> {
        let mut children: Vec<_> = self
            .state
            .lock()
            .calls
            .values()
            .filter(|ctx| ctx.parent() == Some(parent))
            .map(|ctx| ctx.handle())
            .collect();
        children.sort();
        children
    }

    pub fn len(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
