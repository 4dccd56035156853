use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Level comes from `RUST_LOG`, `info` by default.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {e}"))
}
