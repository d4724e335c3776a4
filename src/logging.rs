use crosscall_config::LogConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the configured level. Returns `false` when a
/// subscriber was already installed, which leaves the existing one active.
pub fn init_tracing(config: &LogConfig) -> bool {
    let level = config.level;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},crosscall={level}")));

    let builder = fmt().with_env_filter(env_filter).with_target(true);
    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
