//! Top-level entry points.

use std::fmt;
use std::sync::Arc;

use crosscall_config::{ConfigError, HostConfig};
use crosscall_host::{
    AnalysisReport, Backend, BackendApi, CacheHandle, CallBinding, Checksum, Dispatcher, Engine,
    EntryPoint, GasInfo, HostResult, Invocation, Metrics, OwnedVtable,
};
use tracing::{debug, info};

/// Code, environment and message of a top-level call.
#[derive(Debug, Clone, Copy)]
pub struct CallRequest<'a> {
    pub checksum: Checksum,
    pub env: &'a [u8],
    pub msg: &'a [u8],
    pub gas_limit: u64,
}

/// Owns the dispatcher and engine and runs contract entry points.
///
/// Each entry point registers a fresh call for `binding`, runs the engine
/// with a [`Backend`] for it, and releases the call on every path,
/// including unwinding.
pub struct Host {
    config: HostConfig,
    dispatcher: Arc<Dispatcher>,
    engine: Arc<dyn Engine>,
}

impl Host {
    pub fn new(
        config: HostConfig,
        api: Arc<dyn BackendApi>,
        cache: CacheHandle,
        engine: Arc<dyn Engine>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let dispatcher = Arc::new(Dispatcher::new(api, cache, &config));
        info!(
            max_call_depth = config.max_call_depth,
            gas_mul = config.gas.gas_mul,
            cache_dir = %config.cache.base_dir.display(),
            "host initialised"
        );
        Ok(Self {
            config,
            dispatcher,
            engine,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn cache(&self) -> &CacheHandle {
        self.dispatcher.cache()
    }

    /// Callback table for a native engine sharing this host's registry.
    pub fn vtable(&self) -> OwnedVtable {
        OwnedVtable::new(Arc::clone(&self.dispatcher))
    }

    fn run(
        &self,
        entry_point: EntryPoint,
        binding: CallBinding,
        request: CallRequest<'_>,
        info: Option<&[u8]>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        let guard = self.dispatcher.enter(binding);
        let backend = Backend::new(Arc::clone(&self.dispatcher), guard.call());
        debug!(
            call = %guard.call(),
            %entry_point,
            checksum = %request.checksum,
            gas_limit = request.gas_limit,
            "running entry point"
        );

        let invocation = Invocation {
            entry_point,
            checksum: request.checksum,
            env: request.env,
            info,
            msg: request.msg,
            gas_limit: request.gas_limit,
            print_debug: self.config.print_debug,
        };
        let (result, gas) = self.engine.run(invocation, &backend);
        if let Err(err) = &result {
            debug!(call = %guard.call(), %entry_point, %err, "entry point failed");
        }
        (result, gas)
    }

    pub fn instantiate(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
        info: &[u8],
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::Instantiate, binding, request, Some(info))
    }

    pub fn execute(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
        info: &[u8],
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::Execute, binding, request, Some(info))
    }

    pub fn migrate(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::Migrate, binding, request, None)
    }

    pub fn sudo(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::Sudo, binding, request, None)
    }

    pub fn reply(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::Reply, binding, request, None)
    }

    pub fn query(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::Query, binding, request, None)
    }

    pub fn ibc_channel_open(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::IbcChannelOpen, binding, request, None)
    }

    pub fn ibc_channel_connect(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::IbcChannelConnect, binding, request, None)
    }

    pub fn ibc_channel_close(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::IbcChannelClose, binding, request, None)
    }

    pub fn ibc_packet_receive(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::IbcPacketReceive, binding, request, None)
    }

    pub fn ibc_packet_ack(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::IbcPacketAck, binding, request, None)
    }

    pub fn ibc_packet_timeout(
        &self,
        binding: CallBinding,
        request: CallRequest<'_>,
    ) -> (HostResult<Vec<u8>>, GasInfo) {
        self.run(EntryPoint::IbcPacketTimeout, binding, request, None)
    }

    // Module cache passthroughs.

    pub fn store_code(&self, wasm: &[u8]) -> HostResult<Checksum> {
        self.cache().save_wasm(wasm)
    }

    pub fn get_code(&self, checksum: &Checksum) -> HostResult<Vec<u8>> {
        self.cache().load_wasm(checksum)
    }

    pub fn pin(&self, checksum: &Checksum) -> HostResult<()> {
        self.cache().pin(checksum)
    }

    pub fn unpin(&self, checksum: &Checksum) -> HostResult<()> {
        self.cache().unpin(checksum)
    }

    pub fn analyze_code(&self, checksum: &Checksum) -> HostResult<AnalysisReport> {
        self.cache().analyze_code(checksum)
    }

    pub fn metrics(&self) -> Metrics {
        self.cache().metrics()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
