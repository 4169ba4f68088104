//! ## idlewatch-detection::collaborators
//! **Narrow interfaces to the services the detector leans on**
//!
//! Identity, device attributes and device state live elsewhere. The detector
//! only sees these traits, and the in-memory versions below back tests and
//! the replay binary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;

use idlewatch_core::position::{DeviceId, Position, SampleId};

/// Device attribute holding the threshold as a percentage of the window.
pub const ATTRIBUTE_PERCENT: &str = "ignitionDuringPausePercent";

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            service,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
}

pub trait IdentityLookup: Send + Sync {
    fn device(&self, id: DeviceId) -> Result<Option<Device>, CollaboratorError>;

    /// Whether `position` is the newest position known for its device.
    fn is_latest_position(&self, position: &Position) -> Result<bool, CollaboratorError>;
}

pub trait AttributeLookup: Send + Sync {
    /// Share of the window, in `[0, 1]`, that has to be exceeded. Zero when
    /// the device has nothing configured.
    fn threshold_fraction(&self, id: DeviceId) -> Result<f64, CollaboratorError>;
}

pub trait DeviceStateStore: Send + Sync {
    /// Latched "exceeded" flag, `false` when nothing was stored yet.
    fn latch(&self, id: DeviceId) -> Result<bool, CollaboratorError>;

    fn set_latch(&self, id: DeviceId, exceeded: bool) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Default)]
pub struct InMemoryIdentity {
    devices: RwLock<HashMap<DeviceId, Device>>,
    latest: RwLock<HashMap<DeviceId, (SampleId, Option<DateTime<Utc>>)>>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: DeviceId, name: impl Into<String>) {
        self.devices.write().insert(
            id,
            Device {
                id,
                name: name.into(),
            },
        );
    }

    /// Remember `position` as the latest one for its device unless a newer
    /// fix is already known. A position without a fix time counts as newest
    /// by arrival, so it still reaches the detector and fails there.
    pub fn record_latest(&self, position: &Position) {
        let mut latest = self.latest.write();
        let newer_known = match (latest.get(&position.device_id), position.fix_time) {
            (Some((_, Some(known))), Some(fix_time)) => *known > fix_time,
            _ => false,
        };
        if !newer_known {
            latest.insert(position.device_id, (position.id, position.fix_time));
        }
    }
}

impl IdentityLookup for InMemoryIdentity {
    fn device(&self, id: DeviceId) -> Result<Option<Device>, CollaboratorError> {
        Ok(self.devices.read().get(&id).cloned())
    }

    fn is_latest_position(&self, position: &Position) -> Result<bool, CollaboratorError> {
        Ok(self
            .latest
            .read()
            .get(&position.device_id)
            .map_or(true, |(id, _)| *id == position.id))
    }
}

/// Numeric device attributes with a fallback percentage.
#[derive(Debug, Default)]
pub struct InMemoryAttributes {
    attributes: RwLock<HashMap<(DeviceId, String), f64>>,
    default_percent: f64,
}

impl InMemoryAttributes {
    pub fn new(default_percent: f64) -> Self {
        Self {
            attributes: RwLock::new(HashMap::new()),
            default_percent,
        }
    }

    pub fn set_attribute(&self, id: DeviceId, key: impl Into<String>, value: f64) {
        self.attributes.write().insert((id, key.into()), value);
    }

    pub fn set_percent(&self, id: DeviceId, percent: f64) {
        self.set_attribute(id, ATTRIBUTE_PERCENT, percent);
    }

    pub fn attribute(&self, id: DeviceId, key: &str) -> Option<f64> {
        self.attributes.read().get(&(id, key.to_string())).copied()
    }
}

impl AttributeLookup for InMemoryAttributes {
    fn threshold_fraction(&self, id: DeviceId) -> Result<f64, CollaboratorError> {
        let percent = self
            .attribute(id, ATTRIBUTE_PERCENT)
            .unwrap_or(self.default_percent);
        Ok(percent / 100.0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDeviceState {
    latches: RwLock<HashMap<DeviceId, bool>>,
}

impl InMemoryDeviceState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStateStore for InMemoryDeviceState {
    fn latch(&self, id: DeviceId) -> Result<bool, CollaboratorError> {
        Ok(self.latches.read().get(&id).copied().unwrap_or(false))
    }

    fn set_latch(&self, id: DeviceId, exceeded: bool) -> Result<(), CollaboratorError> {
        self.latches.write().insert(id, exceeded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn position(id: u64, secs: i64) -> Position {
        Position::new(id, 1, Utc.timestamp_opt(secs, 0).unwrap(), 0.0, true)
    }

    #[test]
    fn unknown_device_is_none() {
        let identity = InMemoryIdentity::new();
        identity.register(DeviceId(1), "truck");
        assert_eq!(identity.device(DeviceId(1)).unwrap().unwrap().name, "truck");
        assert!(identity.device(DeviceId(2)).unwrap().is_none());
    }

    #[test]
    fn latest_tracks_newest_fix() {
        let identity = InMemoryIdentity::new();
        assert!(identity.is_latest_position(&position(1, 10)).unwrap());

        identity.record_latest(&position(2, 20));
        identity.record_latest(&position(1, 10));
        assert!(identity.is_latest_position(&position(2, 20)).unwrap());
        assert!(!identity.is_latest_position(&position(1, 10)).unwrap());
    }

    #[test]
    fn timeless_position_becomes_latest_by_arrival() {
        let identity = InMemoryIdentity::new();
        identity.record_latest(&position(1, 10));
        let mut timeless = position(2, 0);
        timeless.fix_time = None;
        identity.record_latest(&timeless);
        assert!(identity.is_latest_position(&timeless).unwrap());
        assert!(!identity.is_latest_position(&position(1, 10)).unwrap());

        identity.record_latest(&position(3, 5));
        assert!(identity.is_latest_position(&position(3, 5)).unwrap());
    }

    #[test]
    fn percent_attribute_becomes_fraction() {
        let attributes = InMemoryAttributes::new(0.0);
        attributes.set_percent(DeviceId(1), 50.0);
        assert_eq!(attributes.threshold_fraction(DeviceId(1)).unwrap(), 0.5);
        assert_eq!(attributes.threshold_fraction(DeviceId(2)).unwrap(), 0.0);
    }

    #[test]
    fn default_percent_applies_to_unconfigured_devices() {
        let attributes = InMemoryAttributes::new(25.0);
        assert_eq!(attributes.threshold_fraction(DeviceId(9)).unwrap(), 0.25);
    }

    #[test]
    fn latch_defaults_to_false() {
        let state = InMemoryDeviceState::new();
        assert!(!state.latch(DeviceId(1)).unwrap());
        state.set_latch(DeviceId(1), true).unwrap();
        assert!(state.latch(DeviceId(1)).unwrap());
    }
}
