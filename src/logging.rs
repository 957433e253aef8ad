use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise `info`, or
/// `debug` when `debug` is true. Logs go to stderr so stdout stays clean for output.
pub fn init_logging(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_thread_ids(false);

    // a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}
