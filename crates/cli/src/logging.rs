use tracing_subscriber::EnvFilter;

/// Install the global subscriber. An explicit `level` wins over `RUST_LOG`;
/// without either the filter is `info`. Logs go to stderr so command output
/// on stdout stays machine-readable.
pub fn init(level: Option<&str>, json: bool) -> anyhow::Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| anyhow::anyhow!("invalid log level {level:?}: {e}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}
