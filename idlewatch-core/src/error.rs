use thiserror::Error;

use crate::position::SampleId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Position {0} carries no fix time")]
    MissingTimestamp(SampleId),

    #[error("Event queue capacity exceeded")]
    QueueFull,
}
