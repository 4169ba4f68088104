//! ## idlewatch-core::events
//! **Pause events and the queue they are dispatched through**
//!
//! The detector only produces events. Delivery is someone else's job, so the
//! bus is a bounded multi-producer queue that a dispatcher drains.
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::position::{DeviceId, SampleId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Ignition stayed on during low speed for longer than the configured
    /// share of the window.
    ConditionDuringPause,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConditionDuringPause => "ConditionDuringPause",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event correlated to the device and the position that triggered it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PauseEvent {
    pub kind: EventKind,
    pub device_id: DeviceId,
    pub sample_id: SampleId,
}

impl PauseEvent {
    #[inline]
    pub fn condition_during_pause(device_id: DeviceId, sample_id: SampleId) -> Self {
        Self {
            kind: EventKind::ConditionDuringPause,
            device_id,
            sample_id,
        }
    }
}

/// Bounded queue. A slot is reserved before the push, so concurrent
/// producers can never take it past `capacity`.
pub struct EventBus {
    queue: SegQueue<PauseEvent>,
    reserved: AtomicUsize,
    capacity: usize,
}

impl EventBus {
    /// Create new event bus with fixed capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: SegQueue::new(),
            reserved: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn event_enqueue(&self, event: PauseEvent) -> Result<(), CoreError> {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                (reserved < self.capacity).then_some(reserved + 1)
            })
            .map_err(|_| CoreError::QueueFull)?;
        self.queue.push(event);
        Ok(())
    }

    pub fn event_dequeue(&self) -> Option<PauseEvent> {
        let event = self.queue.pop()?;
        self.reserved.fetch_sub(1, Ordering::AcqRel);
        Some(event)
    }

    /// Drain everything currently queued, oldest first.
    pub fn event_drain(&self) -> Vec<PauseEvent> {
        std::iter::from_fn(|| self.event_dequeue()).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
