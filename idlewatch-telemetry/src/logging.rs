//! Structured logging through `tracing`.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Install the global subscriber. `RUST_LOG` takes precedence over
    /// `default_level`. Calling this twice is harmless; the second call is
    /// ignored.
    pub fn init(default_level: &str) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        if fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global subscriber already installed");
        }
    }
}
