//! Position reports and window samples.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identifier of a monitored device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single position report, used to correlate events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub u64);

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed position report as delivered by ingestion.
///
/// `fix_time` and `ignition` are optional because not every device reports
/// them; the detector decides what a missing value means.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: SampleId,
    pub device_id: DeviceId,
    #[serde(default)]
    pub fix_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub ignition: Option<bool>,
}

impl Position {
    #[inline]
    pub fn new(id: u64, device_id: u64, fix_time: DateTime<Utc>, speed: f64, ignition: bool) -> Self {
        Self {
            id: SampleId(id),
            device_id: DeviceId(device_id),
            fix_time: Some(fix_time),
            speed,
            ignition: Some(ignition),
        }
    }
}

/// Validated window entry. Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub id: SampleId,
    pub timestamp: DateTime<Utc>,
    pub speed: f64,
    pub ignition: bool,
}

impl TryFrom<&Position> for Sample {
    type Error = CoreError;

    /// A position without a fix time is malformed. A missing ignition flag is
    /// read as `false`; callers that must tell the two apart check
    /// `Position::ignition` first.
    fn try_from(position: &Position) -> Result<Self, Self::Error> {
        let timestamp = position
            .fix_time
            .ok_or(CoreError::MissingTimestamp(position.id))?;
        Ok(Self {
            id: position.id,
            timestamp,
            speed: position.speed,
            ignition: position.ignition.unwrap_or(false),
        })
    }
}
