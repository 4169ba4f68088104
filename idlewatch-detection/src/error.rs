use thiserror::Error;

use idlewatch_core::position::DeviceId;
use idlewatch_core::CoreError;

use crate::collaborators::CollaboratorError;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Malformed position: {0}")]
    Sample(#[from] CoreError),

    #[error("Threshold for device {device} outside [0, 1]: {value}")]
    InvalidThreshold { device: DeviceId, value: f64 },

    #[error("Event dispatch failed: {0}")]
    Dispatch(#[source] CoreError),
}
