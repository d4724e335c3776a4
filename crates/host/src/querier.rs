//! Queries from a running contract to the outside world.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dispatcher::{BackendResult, Dispatcher};
use crate::error::{HostError, HostResult};
use crate::gas::{BasicGasMeter, GasInfo, GasMeter};
use crate::handle::CallHandle;

/// Host-side query handler.
///
/// `request` is an opaque serialized query. The handler charges what it
/// spends to `gas_meter` and must propagate the `OutOfGas` it gets back
/// rather than keep working past the limit.
pub trait Querier: Send + Sync {
    fn query_raw(&self, request: &[u8], gas_meter: &dyn GasMeter) -> HostResult<Vec<u8>>;
}

/// Failure of the querying system itself, as opposed to the queried contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemError {
    InvalidRequest {
        error: String,
        #[serde(with = "crate::binary")]
        request: Vec<u8>,
    },
    InvalidResponse {
        error: String,
        #[serde(with = "crate::binary")]
        response: Vec<u8>,
    },
    NoSuchContract {
        addr: String,
    },
    Unknown {},
    UnsupportedRequest {
        kind: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemResult<S> {
    Ok(S),
    Err(SystemError),
}

impl<S> SystemResult<S> {
    pub fn is_ok(&self) -> bool {
        matches!(self, SystemResult::Ok(_))
    }

    pub fn into_result(self) -> Result<S, SystemError> {
        match self {
            SystemResult::Ok(value) => Ok(value),
            SystemResult::Err(err) => Err(err),
        }
    }
}

/// Result produced by the queried contract. Payloads are base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractResult {
    Ok(#[serde(with = "crate::binary")] Vec<u8>),
    Err(String),
}

impl ContractResult {
    pub fn into_result(self) -> Result<Vec<u8>, String> {
        match self {
            ContractResult::Ok(value) => Ok(value),
            ContractResult::Err(err) => Err(err),
        }
    }
}

/// Decoded outcome of a query.
pub type QuerierResult = SystemResult<ContractResult>;

/// Decodes a raw query response. Bytes that do not parse are reported as
/// [`SystemError::InvalidResponse`].
pub fn parse_querier_response(response: Vec<u8>) -> QuerierResult {
    match serde_json::from_slice::<QuerierResult>(&response) {
        Ok(result) => result,
        Err(err) => SystemResult::Err(SystemError::InvalidResponse {
            error: err.to_string(),
            response,
        }),
    }
}

impl Dispatcher {
    /// Forwards a raw query to the call's querier under its own gas limit.
    ///
    /// The reported gas never exceeds `gas_limit`. A querier that overran
    /// the limit yields `OutOfGas` whatever it returned, including an error
    /// wrapping the meter's own failure.
    pub fn query_external(
        &self,
        call: CallHandle,
        request: &[u8],
        gas_limit: u64,
    ) -> BackendResult<Vec<u8>> {
        trace!(%call, gas_limit, "host callback query_external");
        let ctx = match self.lookup(call) {
            Ok(ctx) => ctx,
            Err(err) => return (Err(err), GasInfo::free()),
        };

        let meter = BasicGasMeter::new(gas_limit);
        let result = ctx.querier().query_raw(request, &meter);
        let consumed = meter.gas_consumed();
        let result = if consumed > gas_limit {
            Err(HostError::OutOfGas {
                limit: gas_limit,
                requested: consumed,
            })
        } else {
            result
        };
        if let Err(err) = &result {
            debug!(%call, %err, "query failed");
        }
        (result, GasInfo::with_externally_used(consumed.min(gas_limit)))
    }
}
