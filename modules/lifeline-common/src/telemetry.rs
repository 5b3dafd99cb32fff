use tracing_subscriber::EnvFilter;

/// Initialize logging for binaries and integration tests.
///
/// Honors `RUST_LOG`; defaults to `lifeline=info` when unset. Safe to call
/// more than once (later calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lifeline=info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
