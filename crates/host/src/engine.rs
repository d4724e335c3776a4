//! Interface to the bytecode engine.

use std::fmt;

use crate::backend::Backend;
use crate::cache::Checksum;
use crate::error::HostResult;
use crate::gas::GasInfo;

/// Exported contract function the engine is asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    Instantiate,
    Execute,
    Migrate,
    Sudo,
    Reply,
    Query,
    IbcChannelOpen,
    IbcChannelConnect,
    IbcChannelClose,
    IbcPacketReceive,
    IbcPacketAck,
    IbcPacketTimeout,
}

impl EntryPoint {
    /// Name of the export inside the module.
    pub fn export_name(self) -> &'static str {
        match self {
            EntryPoint::Instantiate => "instantiate",
            EntryPoint::Execute => "execute",
            EntryPoint::Migrate => "migrate",
            EntryPoint::Sudo => "sudo",
            EntryPoint::Reply => "reply",
            EntryPoint::Query => "query",
            EntryPoint::IbcChannelOpen => "ibc_channel_open",
            EntryPoint::IbcChannelConnect => "ibc_channel_connect",
            EntryPoint::IbcChannelClose => "ibc_channel_close",
            EntryPoint::IbcPacketReceive => "ibc_packet_receive",
            EntryPoint::IbcPacketAck => "ibc_packet_ack",
            EntryPoint::IbcPacketTimeout => "ibc_packet_timeout",
        }
    }

    /// Only instantiate and execute receive message info.
    pub fn takes_info(self) -> bool {
        matches!(self, EntryPoint::Instantiate | EntryPoint::Execute)
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.export_name())
    }
}

/// One request to the engine. Payloads are opaque serialized bytes.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub entry_point: EntryPoint,
    pub checksum: Checksum,
    pub env: &'a [u8],
    pub info: Option<&'a [u8]>,
    pub msg: &'a [u8],
    pub gas_limit: u64,
    pub print_debug: bool,
}

/// A bytecode engine.
///
/// The engine reaches host capabilities only through `backend`, whose
/// handle stays registered for the duration of `run`.
pub trait Engine: Send + Sync {
    fn run(&self, invocation: Invocation<'_>, backend: &Backend) -> (HostResult<Vec<u8>>, GasInfo);
}
