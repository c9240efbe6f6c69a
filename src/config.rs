//! Application-level constants and tracing setup.

use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "Neurocurate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when RUST_LOG is unset: engine internals at debug,
/// everything else at info.
pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}

/// Initialize tracing for binaries and integration harnesses. Library
/// callers that already own a subscriber should skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .init();
    tracing::info!("{APP_NAME} starting v{APP_VERSION}");
}
