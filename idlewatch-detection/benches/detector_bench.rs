use std::hint::black_box;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use idlewatch_core::position::{DeviceId, Position};
use idlewatch_detection::{
    DetectorSettings, InMemoryAttributes, InMemoryDeviceState, InMemoryIdentity, PauseDetector,
};

fn detector(devices: u64) -> PauseDetector {
    let identity = Arc::new(InMemoryIdentity::new());
    let attributes = Arc::new(InMemoryAttributes::new(50.0));
    for device in 0..devices {
        identity.register(DeviceId(device), format!("unit-{device}"));
    }
    PauseDetector::new(
        DetectorSettings::default(),
        identity,
        attributes,
        Arc::new(InMemoryDeviceState::new()),
    )
}

fn bench_on_position(c: &mut Criterion) {
    let mut group = c.benchmark_group("on_position");

    // samples per window: one report every `interval_secs` over a 15 minute span
    for interval_secs in [60i64, 10, 1] {
        group.throughput(Throughput::Elements(1));
        group.bench_function(format!("interval_{}s", interval_secs), |b| {
            let detector = detector(1);
            let mut tick = 0i64;
            b.iter(|| {
                tick += 1;
                let at = Utc
                    .timestamp_opt(tick * interval_secs, 0)
                    .single()
                    .unwrap_or_default();
                let position = Position::new(tick as u64, 0, at, 0.0, true);
                black_box(detector.on_position(&position).ok());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_on_position);
criterion_main!(benches);
