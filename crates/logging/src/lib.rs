//! Subscriber setup shared by the server and the CLI

use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};
use tradegate_settings::{LogFormat, LoggingSettings};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured filter. Fails if a subscriber is
/// already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match settings.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init(),
    }
}
