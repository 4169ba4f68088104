//! ## idlewatch-detection::window
//! **Per-device sliding windows of recent samples**
//!
//! Locking is two-level:
//! - the store map sits behind an `RwLock`; only window creation and reaping
//!   take it for writing
//! - every window has its own `Mutex`, so trim-and-append for one device never
//!   blocks another device
//!
//! A window keeps every sample whose timestamp is not older than
//! `latest - span`. Samples exactly on the boundary stay.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use idlewatch_core::position::{DeviceId, Sample};

/// Oldest timestamp that survives a trim triggered by `latest`.
pub fn trim_cutoff(latest: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(span)
        .ok()
        .and_then(|span| latest.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A sample waiting to enter a window, together with the trim it implies.
#[derive(Clone, Copy, Debug)]
pub struct Admission {
    sample: Sample,
    cutoff: DateTime<Utc>,
}

impl Admission {
    pub fn new(sample: Sample, span: Duration) -> Self {
        Self {
            sample,
            cutoff: trim_cutoff(sample.timestamp, span),
        }
    }
}

/// Time-ordered samples of one device, oldest first.
#[derive(Debug, Default)]
pub struct Window {
    samples: VecDeque<Sample>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    /// Most recently appended sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// The samples the window would hold after `admit`, without touching it.
    pub fn preview<'a>(&'a self, admission: &'a Admission) -> impl Iterator<Item = &'a Sample> + 'a {
        let cutoff = admission.cutoff;
        self.samples
            .iter()
            .filter(move |sample| sample.timestamp >= cutoff)
            .chain(std::iter::once(&admission.sample))
    }

    /// Evict stale samples and append the new one. Returns how many samples
    /// were evicted.
    ///
    /// The whole window is scanned, not just the head, so a late sample that
    /// landed behind newer ones is evicted as soon as it falls out of range.
    pub fn admit(&mut self, admission: Admission) -> usize {
        let before = self.samples.len();
        let cutoff = admission.cutoff;
        self.samples.retain(|sample| {
            let keep = sample.timestamp >= cutoff;
            if !keep {
                debug!(sample = %sample.id, time = %sample.timestamp, "Evicted sample");
            }
            keep
        });
        let evicted = before - self.samples.len();
        self.samples.push_back(admission.sample);
        evicted
    }
}

/// Owner of every device window.
#[derive(Debug)]
pub struct WindowStore {
    span: Duration,
    windows: RwLock<HashMap<DeviceId, Arc<Mutex<Window>>>>,
}

impl WindowStore {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    /// Window of `device`, created on first use.
    pub fn window(&self, device: DeviceId) -> Arc<Mutex<Window>> {
        if let Some(window) = self.windows.read().get(&device) {
            return Arc::clone(window);
        }

        let mut windows = self.windows.write();
        Arc::clone(windows.entry(device).or_insert_with(|| {
            debug!(%device, "New window");
            Arc::new(Mutex::new(Window::new()))
        }))
    }

    /// Trim the device window against `sample` and append it. Returns the
    /// live samples, oldest first.
    pub fn record_sample(&self, device: DeviceId, sample: Sample) -> Vec<Sample> {
        let handle = self.window(device);
        let mut window = handle.lock();
        window.admit(Admission::new(sample, self.span));
        window.to_vec()
    }

    /// Copy of the device window, if one exists.
    pub fn snapshot(&self, device: DeviceId) -> Option<Vec<Sample>> {
        let window = self.windows.read().get(&device).map(Arc::clone)?;
        let samples = window.lock().to_vec();
        Some(samples)
    }

    /// Number of devices with a window.
    pub fn len(&self) -> usize {
        self.windows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.read().is_empty()
    }

    /// Drop windows whose newest sample is older than `now - idle_for`.
    ///
    /// Windows somebody is still holding are kept; the store write lock stops
    /// new handles from being handed out while the check runs.
    pub fn reap_idle(&self, now: DateTime<Utc>, idle_for: Duration) -> usize {
        let cutoff = trim_cutoff(now, idle_for);
        let mut windows = self.windows.write();
        let before = windows.len();
        windows.retain(|device, window| {
            if Arc::strong_count(window) > 1 {
                return true;
            }
            let keep = window
                .lock()
                .latest()
                .is_some_and(|latest| latest.timestamp >= cutoff);
            if !keep {
                debug!(%device, "Reaped idle window");
            }
            keep
        });
        before - windows.len()
    }

    pub fn clear(&self) {
        self.windows.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use idlewatch_core::position::SampleId;
    use proptest::prelude::*;

    const SPAN: Duration = Duration::from_secs(15 * 60);

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn sample(id: u64, ms: i64) -> Sample {
        Sample {
            id: SampleId(id),
            timestamp: at_ms(ms),
            speed: 0.0,
            ignition: true,
        }
    }

    fn minutes(m: i64) -> i64 {
        m * 60_000
    }

    #[test]
    fn first_sample_creates_window() {
        let store = WindowStore::new(SPAN);
        let live = store.record_sample(DeviceId(1), sample(1, 0));
        assert_eq!(live.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn evicts_strictly_older_and_keeps_boundary() {
        let store = WindowStore::new(SPAN);
        let device = DeviceId(1);
        for (id, m) in [0, 5, 10, 15, 20].into_iter().enumerate() {
            store.record_sample(device, sample(id as u64, minutes(m)));
        }
        let times: Vec<_> = store
            .snapshot(device)
            .unwrap()
            .iter()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(
            times,
            vec![at_ms(minutes(5)), at_ms(minutes(10)), at_ms(minutes(15)), at_ms(minutes(20))]
        );
    }

    #[test]
    fn window_may_shrink_to_latest_sample() {
        let store = WindowStore::new(SPAN);
        let device = DeviceId(1);
        store.record_sample(device, sample(1, 0));
        store.record_sample(device, sample(2, minutes(1)));
        let live = store.record_sample(device, sample(3, minutes(60)));
        assert_eq!(live, vec![sample(3, minutes(60))]);
    }

    #[test]
    fn late_sample_is_appended_then_evicted() {
        let store = WindowStore::new(SPAN);
        let device = DeviceId(1);
        store.record_sample(device, sample(1, minutes(30)));
        let live = store.record_sample(device, sample(2, minutes(1)));
        assert_eq!(live.len(), 2);
        assert_eq!(live[1].id, SampleId(2));

        let live = store.record_sample(device, sample(3, minutes(31)));
        let ids: Vec<_> = live.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![SampleId(1), SampleId(3)]);
    }

    #[test]
    fn preview_matches_admit_without_mutation() {
        let mut window = Window::new();
        for (id, m) in [0, 10, 20].into_iter().enumerate() {
            window.admit(Admission::new(sample(id as u64, minutes(m)), SPAN));
        }
        let admission = Admission::new(sample(9, minutes(26)), SPAN);
        let previewed: Vec<Sample> = window.preview(&admission).copied().collect();
        assert_eq!(window.len(), 2);

        let evicted = window.admit(admission);
        assert_eq!(evicted, 1);
        assert_eq!(window.to_vec(), previewed);
    }

    #[test]
    fn windows_are_independent_per_device() {
        let store = WindowStore::new(SPAN);
        store.record_sample(DeviceId(1), sample(1, 0));
        store.record_sample(DeviceId(2), sample(2, minutes(100)));
        assert_eq!(store.snapshot(DeviceId(1)).unwrap().len(), 1);
        assert_eq!(store.snapshot(DeviceId(2)).unwrap().len(), 1);
        assert!(store.snapshot(DeviceId(3)).is_none());
    }

    #[test]
    fn concurrent_creation_yields_one_window_per_device() {
        let store = WindowStore::new(SPAN);
        std::thread::scope(|scope| {
            for thread in 0..8u64 {
                let store = &store;
                scope.spawn(move || {
                    for device in 0..32u64 {
                        store.record_sample(DeviceId(device), sample(thread, minutes(thread as i64)));
                    }
                });
            }
        });
        assert_eq!(store.len(), 32);
        for device in 0..32u64 {
            assert_eq!(store.snapshot(DeviceId(device)).unwrap().len(), 8);
        }
    }

    #[test]
    fn reap_drops_only_idle_unused_windows() {
        let store = WindowStore::new(SPAN);
        store.record_sample(DeviceId(1), sample(1, 0));
        store.record_sample(DeviceId(2), sample(2, minutes(50)));
        let held = store.window(DeviceId(3));

        let reaped = store.reap_idle(at_ms(minutes(60)), Duration::from_secs(30 * 60));
        assert_eq!(reaped, 1);
        assert!(store.snapshot(DeviceId(1)).is_none());
        assert!(store.snapshot(DeviceId(2)).is_some());
        assert!(store.snapshot(DeviceId(3)).is_some());
        drop(held);

        let reaped = store.reap_idle(at_ms(minutes(60)), Duration::from_secs(30 * 60));
        assert_eq!(reaped, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let store = WindowStore::new(SPAN);
        store.record_sample(DeviceId(1), sample(1, 0));
        store.clear();
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn window_holds_exactly_the_trailing_span(gaps in prop::collection::vec(1i64..400_000, 1..60)) {
            let store = WindowStore::new(SPAN);
            let device = DeviceId(7);
            let mut fed = Vec::new();
            let mut now = 0i64;
            for (id, gap) in gaps.into_iter().enumerate() {
                now += gap;
                let next = sample(id as u64, now);
                fed.push(next);
                let live = store.record_sample(device, next);

                let cutoff = trim_cutoff(next.timestamp, SPAN);
                let expected: Vec<Sample> = fed
                    .iter()
                    .copied()
                    .filter(|s| s.timestamp >= cutoff)
                    .collect();
                prop_assert_eq!(live, expected);
            }
        }
    }
}
