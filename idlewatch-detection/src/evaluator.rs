//! ## idlewatch-detection::evaluator
//! **Qualifying duration and rising-edge decision**
//!
//! Pure functions over a window. Nothing here locks or logs.

use std::time::Duration;

use idlewatch_core::position::Sample;

/// Whether a sample counts as "ignition on while paused".
#[inline]
pub fn is_qualifying(sample: &Sample, speed_threshold: f64) -> bool {
    sample.speed < speed_threshold && sample.ignition
}

/// Elapsed time from `previous` to `current`, zero when time went backwards.
#[inline]
pub fn pair_delta(previous: &Sample, current: &Sample) -> Duration {
    (current.timestamp - previous.timestamp)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Sum of the gaps leading up to every qualifying sample.
///
/// The first sample never contributes; it only bounds the first gap.
pub fn qualifying_duration<'a, I>(samples: I, speed_threshold: f64) -> Duration
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut samples = samples.into_iter();
    let Some(mut previous) = samples.next() else {
        return Duration::ZERO;
    };

    let mut total = Duration::ZERO;
    for current in samples {
        if is_qualifying(current, speed_threshold) {
            total = total.saturating_add(pair_delta(previous, current));
        }
        previous = current;
    }
    total
}

/// Per-device latch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LatchState {
    #[default]
    Normal,
    Exceeded,
}

/// What moving the latch did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Normal to Exceeded. The only transition that emits.
    Rising,
    /// Exceeded to Normal.
    Falling,
    Steady,
}

impl LatchState {
    pub fn transition(self, exceeded: bool) -> (LatchState, Transition) {
        let next = LatchState::from(exceeded);
        let transition = match (self, next) {
            (LatchState::Normal, LatchState::Exceeded) => Transition::Rising,
            (LatchState::Exceeded, LatchState::Normal) => Transition::Falling,
            _ => Transition::Steady,
        };
        (next, transition)
    }
}

impl From<bool> for LatchState {
    fn from(exceeded: bool) -> Self {
        if exceeded {
            LatchState::Exceeded
        } else {
            LatchState::Normal
        }
    }
}

/// Outcome of evaluating one window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    pub qualifying: Duration,
    /// Share of the window that must be exceeded.
    pub required: Duration,
    pub exceeded: bool,
    pub should_emit: bool,
    /// Latch value to write back, always equal to `exceeded`.
    pub latch: LatchState,
    pub transition: Transition,
}

/// Window evaluation with fixed span and speed threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluator {
    pub window_span: Duration,
    pub speed_threshold: f64,
}

impl Evaluator {
    pub fn new(window_span: Duration, speed_threshold: f64) -> Self {
        Self {
            window_span,
            speed_threshold,
        }
    }

    pub fn qualifying_duration<'a, I>(&self, samples: I) -> Duration
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        qualifying_duration(samples, self.speed_threshold)
    }

    /// Evaluate `samples` against `threshold_fraction` of the span and the
    /// previous latch.
    pub fn decide<'a, I>(&self, samples: I, threshold_fraction: f64, previous: LatchState) -> Decision
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        decide(
            self.qualifying_duration(samples),
            threshold_fraction,
            self.window_span,
            previous,
        )
    }
}

/// `exceeded` is a strict comparison against `threshold_fraction * window_span`.
pub fn decide(
    qualifying: Duration,
    threshold_fraction: f64,
    window_span: Duration,
    previous: LatchState,
) -> Decision {
    let required_secs = threshold_fraction * window_span.as_secs_f64();
    let exceeded = qualifying.as_secs_f64() > required_secs;
    let (latch, transition) = previous.transition(exceeded);
    Decision {
        qualifying,
        required: Duration::try_from_secs_f64(required_secs).unwrap_or(window_span),
        exceeded,
        should_emit: transition == Transition::Rising,
        latch,
        transition,
    }
}
