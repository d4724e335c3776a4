//! Gas meters and the gas report returned by every adapter.

use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{HostError, HostResult};

/// A shared gas counter.
///
/// Meters are consulted from several adapters at once, so charging goes
/// through `&self`.
pub trait GasMeter: Send + Sync {
    fn gas_consumed(&self) -> u64;

    fn limit(&self) -> u64;

    /// Adds `amount` to the counter. Fails once the total exceeds the limit;
    /// reaching the limit exactly is allowed. The counter keeps the
    /// saturated total on failure.
    fn consume_gas(&self, amount: u64, descriptor: &str) -> HostResult<()>;

    fn remaining(&self) -> u64 {
        self.limit().saturating_sub(self.gas_consumed())
    }
}

fn saturating_add(counter: &AtomicU64, amount: u64) -> u64 {
    let previous = match counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        Some(current.saturating_add(amount))
    }) {
        Ok(previous) | Err(previous) => previous,
    };
    previous.saturating_add(amount)
}

/// Meter with a fixed limit.
#[derive(Debug)]
pub struct BasicGasMeter {
    limit: u64,
    consumed: AtomicU64,
}

impl BasicGasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            consumed: AtomicU64::new(0),
        }
    }
}

impl GasMeter for BasicGasMeter {
    fn gas_consumed(&self) -> u64 {
        self.consumed.load(Ordering::Acquire)
    }

    fn limit(&self) -> u64 {
        self.limit
    }

    fn consume_gas(&self, amount: u64, descriptor: &str) -> HostResult<()> {
        let total = saturating_add(&self.consumed, amount);
        if total > self.limit {
            debug!(
                descriptor,
                amount,
                total,
                limit = self.limit,
                "out of gas"
            );
            return Err(HostError::OutOfGas {
                limit: self.limit,
                requested: amount,
            });
        }
        Ok(())
    }
}

/// Meter that counts but never fails.
#[derive(Debug, Default)]
pub struct InfiniteGasMeter {
    consumed: AtomicU64,
}

impl InfiniteGasMeter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GasMeter for InfiniteGasMeter {
    fn gas_consumed(&self) -> u64 {
        self.consumed.load(Ordering::Acquire)
    }

    fn limit(&self) -> u64 {
        u64::MAX
    }

    fn consume_gas(&self, amount: u64, _descriptor: &str) -> HostResult<()> {
        saturating_add(&self.consumed, amount);
        Ok(())
    }
}

/// Gas reported by an adapter or an engine run.
///
/// `cost` is gas spent inside the engine, `externally_used` is gas charged
/// on the host side (storage, queries, address conversion, transfers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasInfo {
    pub cost: u64,
    pub externally_used: u64,
}

impl GasInfo {
    pub fn new(cost: u64, externally_used: u64) -> Self {
        Self {
            cost,
            externally_used,
        }
    }

    pub fn with_cost(cost: u64) -> Self {
        Self::new(cost, 0)
    }

    pub fn with_externally_used(externally_used: u64) -> Self {
        Self::new(0, externally_used)
    }

    pub fn free() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.cost.saturating_add(self.externally_used)
    }
}

impl AddAssign for GasInfo {
    fn add_assign(&mut self, other: Self) {
        self.cost = self.cost.saturating_add(other.cost);
        self.externally_used = self.externally_used.saturating_add(other.externally_used);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn reaching_the_limit_exactly_succeeds() {
        let meter = BasicGasMeter::new(100);
        meter.consume_gas(60, "a").unwrap();
        meter.consume_gas(40, "b").unwrap();
        assert_eq!(meter.remaining(), 0);

        let err = meter.consume_gas(1, "c").unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfGas);
        assert_eq!(meter.gas_consumed(), 101);
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn counters_saturate() {
        let meter = BasicGasMeter::new(u64::MAX);
        meter.consume_gas(u64::MAX, "all").unwrap();
        meter.consume_gas(u64::MAX, "more").unwrap();
        assert_eq!(meter.gas_consumed(), u64::MAX);

        let infinite = InfiniteGasMeter::new();
        infinite.consume_gas(u64::MAX, "x").unwrap();
        infinite.consume_gas(5, "y").unwrap();
        assert_eq!(infinite.gas_consumed(), u64::MAX);
    }

    #[test]
    fn gas_info_accumulates() {
        let mut info = GasInfo::with_cost(5);
        info += GasInfo::with_externally_used(7);
        info += GasInfo::new(1, 1);
        assert_eq!(info, GasInfo::new(6, 8));
        assert_eq!(info.total(), 14);
    }
}
