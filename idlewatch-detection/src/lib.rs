//! # idlewatch detection
//!
//! Detects devices whose ignition stayed on at low speed for more than a
//! configured share of a trailing time window, and reports it once per
//! episode.
//!
//! ### Components:
//! - `window`: per-device sliding windows behind sharded locks
//! - `evaluator`: qualifying duration and the rising-edge decision
//! - `collaborators`: identity, attribute and device-state interfaces
//! - `detector`: the per-position handler tying them together

pub mod collaborators;
pub mod detector;
pub mod error;
pub mod evaluator;
pub mod window;

pub use collaborators::{
    AttributeLookup, CollaboratorError, Device, DeviceStateStore, IdentityLookup,
    InMemoryAttributes, InMemoryDeviceState, InMemoryIdentity, ATTRIBUTE_PERCENT,
};
pub use detector::{DetectorSettings, PauseDetector};
pub use error::DetectionError;
pub use evaluator::{qualifying_duration, Decision, Evaluator, LatchState, Transition};
pub use window::{Admission, Window, WindowStore};
