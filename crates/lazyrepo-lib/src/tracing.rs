use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber, writing to stderr. `-v` raises
/// the runner's own crates to debug, `-vv` to trace; `LAZY_LOG_VERBOSITY`
/// overrides everything with a standard env-filter directive.
pub fn init_subscriber(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "warn",
        1 => "lazy=debug,lazyrepo=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("LAZY_LOG_VERBOSITY")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
