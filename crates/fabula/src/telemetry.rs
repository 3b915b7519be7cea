use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize console logging.
///
/// `RUST_LOG` wins when set. Otherwise the Fabula crates log at `info`, or at
/// `debug` when `verbose` is set. Logs go to stderr; stdout carries command
/// output.
pub fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "info,fabula=debug,fabula_context=debug"
    } else {
        "warn,fabula=info,fabula_context=info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
