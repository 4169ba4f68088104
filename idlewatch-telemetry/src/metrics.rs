//! ## idlewatch-telemetry::metrics
//! **Prometheus counters for the pause detector**

use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    /// Positions handed to the detector.
    pub positions: Counter,
    /// Positions dropped before evaluation (unknown device, stale, no
    /// ignition, disabled threshold).
    pub positions_filtered: Counter,
    /// Rising edges that produced an event.
    pub events: Counter,
    /// Window size after each evaluation.
    pub window_samples: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let positions = Counter::new("idlewatch_positions_total", "Positions received")?;
        let positions_filtered = Counter::new(
            "idlewatch_positions_filtered_total",
            "Positions skipped before evaluation",
        )?;
        let events = Counter::new("idlewatch_events_total", "Pause events emitted")?;
        let window_samples = Histogram::with_opts(
            HistogramOpts::new("idlewatch_window_samples", "Samples held in a device window")
                .buckets(vec![1.0, 5.0, 15.0, 60.0, 250.0, 1_000.0]),
        )?;

        registry.register(Box::new(positions.clone()))?;
        registry.register(Box::new(positions_filtered.clone()))?;
        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(window_samples.clone()))?;

        Ok(Self {
            registry,
            positions,
            positions_filtered,
            events,
            window_samples,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn inc_positions(&self) {
        self.positions.inc();
    }

    pub fn inc_filtered(&self) {
        self.positions_filtered.inc();
    }

    pub fn inc_events(&self) {
        self.events.inc();
    }

    pub fn observe_window(&self, samples: usize) {
        self.window_samples.observe(samples as f64);
    }
}
