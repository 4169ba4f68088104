//! Scenario files and their replay through a detector.
//!
//! A scenario lists devices with their threshold percentage and the positions
//! to feed. Devices are spread over blocking workers; positions of one device
//! always go to the same worker, in file order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use idlewatch_core::events::{EventBus, PauseEvent};
use idlewatch_core::position::{DeviceId, Position};
use idlewatch_detection::{
    DetectorSettings, InMemoryAttributes, InMemoryDeviceState, InMemoryIdentity, PauseDetector,
};
use idlewatch_telemetry::MetricsRecorder;

use crate::error::CliError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDevice {
    pub id: DeviceId,
    pub name: String,
    /// `ignitionDuringPausePercent`; the configured default applies when absent.
    #[serde(default)]
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub devices: Vec<ScenarioDevice>,
    pub positions: Vec<Position>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ScenarioIo {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub positions: usize,
    pub failures: usize,
    pub reaped: usize,
    pub events: Vec<PauseEvent>,
}

pub struct Replay {
    settings: DetectorSettings,
    default_percent: f64,
    workers: usize,
    metrics: Arc<MetricsRecorder>,
}

impl Replay {
    pub fn new(
        settings: DetectorSettings,
        default_percent: f64,
        workers: usize,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            settings,
            default_percent,
            workers: workers.max(1),
            metrics,
        }
    }

    pub async fn run(&self, scenario: Scenario) -> Result<ReplayReport, CliError> {
        let identity = Arc::new(InMemoryIdentity::new());
        let attributes = Arc::new(InMemoryAttributes::new(self.default_percent));
        for device in &scenario.devices {
            identity.register(device.id, device.name.clone());
            if let Some(percent) = device.percent {
                attributes.set_percent(device.id, percent);
            }
        }

        let detector = Arc::new(
            PauseDetector::new(
                self.settings,
                identity.clone(),
                attributes,
                Arc::new(InMemoryDeviceState::new()),
            )
            .with_metrics(self.metrics.clone()),
        );
        let bus = Arc::new(EventBus::with_capacity(scenario.positions.len().max(1)));

        let latest_fix = scenario.positions.iter().filter_map(|p| p.fix_time).max();
        let total = scenario.positions.len();
        let mut partitions: BTreeMap<usize, Vec<Position>> = BTreeMap::new();
        for position in scenario.positions {
            let worker = (position.device_id.0 % self.workers as u64) as usize;
            partitions.entry(worker).or_default().push(position);
        }

        let tasks: Vec<_> = partitions
            .into_values()
            .map(|positions| {
                let detector = detector.clone();
                let identity = identity.clone();
                let bus = bus.clone();
                tokio::task::spawn_blocking(move || {
                    let mut failures = 0usize;
                    for position in &positions {
                        identity.record_latest(position);
                        if let Err(e) = detector.on_position_dispatch(position, &bus) {
                            warn!(position = %position.id, "Replay failure: {e}");
                            failures += 1;
                        }
                    }
                    failures
                })
            })
            .collect();

        let mut failures = 0;
        for task in tasks {
            failures += task.await?;
        }

        let reaped = latest_fix.map_or(0, |now| detector.reap_idle(now));
        let mut events = bus.event_drain();
        events.sort_by_key(|event| (event.device_id, event.sample_id));
        info!(positions = total, events = events.len(), failures, "Replay finished");

        Ok(ReplayReport {
            positions: total,
            failures,
            reaped,
            events,
        })
    }
}
