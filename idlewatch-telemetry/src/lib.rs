//! # idlewatch telemetry
//!
//! Logging setup and Prometheus counters for the pause detector.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
