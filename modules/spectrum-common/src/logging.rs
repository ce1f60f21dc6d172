use tracing_subscriber::EnvFilter;

/// Env var holding the harness log level (`debug`, `info`, ...).
pub const LOG_LEVEL_VAR: &str = "SPECTRUM_LOG_LEVEL";

/// Build the filter: `SPECTRUM_LOG_LEVEL` wins, then `RUST_LOG`, then `info`.
pub fn env_filter() -> EnvFilter {
    match std::env::var(LOG_LEVEL_VAR) {
        Ok(level) => EnvFilter::new(level.to_lowercase()),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Install the global fmt subscriber. Safe to call more than once.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .try_init();
}
