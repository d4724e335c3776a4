use std::fmt;

/// Opaque identifier of a registered invocation context.
///
/// Zero is never issued; the engine may use it to mean "no call".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallHandle(pub u64);

impl CallHandle {
    pub const NONE: CallHandle = CallHandle(0);

    pub fn id(self) -> u64 {
        self.0
    }
}

impl From<u64> for CallHandle {
    fn from(id: u64) -> Self {
        CallHandle(id)
    }
}

impl From<CallHandle> for u64 {
    fn from(handle: CallHandle) -> Self {
        handle.0
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// Reference to an iterator living in the frame of one call.
///
/// `iterator_id` is 1-based within that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IteratorId {
    pub call: CallHandle,
    pub iterator_id: u64,
}

impl IteratorId {
    pub fn new(call: CallHandle, iterator_id: u64) -> Self {
        Self { call, iterator_id }
    }
}

impl fmt::Display for IteratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/iter#{}", self.call, self.iterator_id)
    }
}
