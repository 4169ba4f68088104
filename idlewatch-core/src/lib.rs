//! # idlewatch-core
//!
//! Foundation types shared by every idlewatch crate.
//!
//! ### Key Submodules:
//! - `position`: raw `Position` reports and the validated `Sample` kept in windows
//! - `events`: `PauseEvent` and the bounded `EventBus` that hands events to dispatch
//! - `error`: `CoreError`

pub mod error;
pub mod events;
pub mod position;

pub use error::CoreError;
