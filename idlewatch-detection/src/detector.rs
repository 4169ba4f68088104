//! ## idlewatch-detection::detector
//! **Per-position handler**
//!
//! Filters the position, updates the device window and moves the device
//! latch. Window update, latch read, decision and latch write all happen
//! while the device's window mutex is held, so two positions for the same
//! device can never both see the old latch and both emit.
//!
//! The window is only modified after the latch write succeeded. A failing
//! collaborator leaves the window as it was.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use idlewatch_config::{DetectorConfig, DEFAULT_SPEED_THRESHOLD, DEFAULT_WINDOW_SPAN_SECS};
use idlewatch_core::events::{EventBus, PauseEvent};
use idlewatch_core::position::{Position, Sample};
use idlewatch_telemetry::MetricsRecorder;

use crate::collaborators::{AttributeLookup, DeviceStateStore, IdentityLookup};
use crate::error::DetectionError;
use crate::evaluator::{Evaluator, LatchState};
use crate::window::{Admission, WindowStore};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSettings {
    pub window_span: Duration,
    pub speed_threshold: f64,
    /// Windows idle for this long can be reaped. `None` keeps them forever.
    pub idle_reap: Option<Duration>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            window_span: Duration::from_secs(DEFAULT_WINDOW_SPAN_SECS),
            speed_threshold: DEFAULT_SPEED_THRESHOLD,
            idle_reap: None,
        }
    }
}

impl From<&DetectorConfig> for DetectorSettings {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            window_span: Duration::from_secs(config.window_span_secs),
            speed_threshold: config.speed_threshold,
            idle_reap: (config.idle_reap_secs > 0)
                .then(|| Duration::from_secs(config.idle_reap_secs)),
        }
    }
}

pub struct PauseDetector {
    settings: DetectorSettings,
    evaluator: Evaluator,
    windows: Arc<WindowStore>,
    identity: Arc<dyn IdentityLookup>,
    attributes: Arc<dyn AttributeLookup>,
    state: Arc<dyn DeviceStateStore>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl PauseDetector {
    pub fn new(
        settings: DetectorSettings,
        identity: Arc<dyn IdentityLookup>,
        attributes: Arc<dyn AttributeLookup>,
        state: Arc<dyn DeviceStateStore>,
    ) -> Self {
        Self {
            settings,
            evaluator: Evaluator::new(settings.window_span, settings.speed_threshold),
            windows: Arc::new(WindowStore::new(settings.window_span)),
            identity,
            attributes,
            state,
            metrics: None,
        }
    }

    /// Use an externally owned store. Its span replaces the configured one so
    /// trimming and evaluation agree.
    pub fn with_window_store(mut self, windows: Arc<WindowStore>) -> Self {
        self.settings.window_span = windows.span();
        self.evaluator.window_span = windows.span();
        self.windows = windows;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn windows(&self) -> &WindowStore {
        &self.windows
    }

    /// Handle one position. Returns the event produced on a rising edge.
    ///
    /// Unknown devices, positions that are not the latest for their device,
    /// positions without an ignition flag and devices with a zero threshold
    /// are skipped without touching any state.
    #[instrument(skip_all, fields(device = %position.device_id, position = %position.id))]
    pub fn on_position(&self, position: &Position) -> Result<Option<PauseEvent>, DetectionError> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_positions();
        }

        let Some(device) = self.identity.device(position.device_id)? else {
            return Ok(self.skip("unknown device"));
        };
        if !self.identity.is_latest_position(position)? {
            return Ok(self.skip("not the latest position"));
        }
        if position.ignition.is_none() {
            return Ok(self.skip("no ignition attribute"));
        }

        let fraction = self.attributes.threshold_fraction(device.id)?;
        if !(0.0..=1.0).contains(&fraction) {
            warn!(value = fraction, "Rejected threshold");
            return Err(DetectionError::InvalidThreshold {
                device: device.id,
                value: fraction,
            });
        }
        if fraction == 0.0 {
            return Ok(self.skip("disabled"));
        }

        let sample = Sample::try_from(position)?;
        let admission = Admission::new(sample, self.settings.window_span);

        let handle = self.windows.window(device.id);
        let mut window = handle.lock();
        let before = window.len();

        let previous = LatchState::from(self.state.latch(device.id)?);
        let decision = self
            .evaluator
            .decide(window.preview(&admission), fraction, previous);
        self.state.set_latch(device.id, decision.exceeded)?;

        window.admit(admission);
        let after = window.len();
        drop(window);

        let span_secs = self.settings.window_span.as_secs_f64();
        info!(
            device = %device.name,
            before,
            after,
            ign_on_secs = decision.qualifying.as_secs(),
            percent = decision.qualifying.as_secs_f64() / span_secs * 100.0,
            threshold_secs = decision.required.as_secs_f64(),
            exceeded = decision.exceeded,
            "Evaluated window"
        );
        if let Some(metrics) = &self.metrics {
            metrics.observe_window(after);
        }

        if !decision.should_emit {
            return Ok(None);
        }

        info!(device = %device.name, "Fire event");
        if let Some(metrics) = &self.metrics {
            metrics.inc_events();
        }
        Ok(Some(PauseEvent::condition_during_pause(device.id, sample.id)))
    }

    /// Handle one position and queue any produced event on `bus`.
    pub fn on_position_dispatch(
        &self,
        position: &Position,
        bus: &EventBus,
    ) -> Result<Option<PauseEvent>, DetectionError> {
        let event = self.on_position(position)?;
        if let Some(event) = event {
            bus.event_enqueue(event).map_err(DetectionError::Dispatch)?;
        }
        Ok(event)
    }

    /// Reap windows idle for the configured time, measured from `now`.
    pub fn reap_idle(&self, now: DateTime<Utc>) -> usize {
        match self.settings.idle_reap {
            Some(idle_for) => self.windows.reap_idle(now, idle_for),
            None => 0,
        }
    }

    fn skip(&self, reason: &'static str) -> Option<PauseEvent> {
        debug!(reason, "Skipped position");
        if let Some(metrics) = &self.metrics {
            metrics.inc_filtered();
        }
        None
    }
}
