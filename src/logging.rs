use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize console logging on stderr so stdout stays free for data.
///
/// `RUST_LOG` takes precedence; otherwise `smelter` logs at info, or debug
/// when `verbose` is set.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "smelter=debug" } else { "smelter=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(filter).with(console_layer).try_init();
}
