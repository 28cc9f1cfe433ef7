#![no_main]

use lobgate_core::breaker::{BreakerJournal, BreakerState, BreakerThresholds, worst_tier};
use lobgate_core::detectors::{DetectorAggregator, OverrideReadings};
use lobgate_core::tail_latency::{PercentileSet, percentile};
use libfuzzer_sys::fuzz_target;

fn f64_at(data: &[u8], at: usize) -> f64 {
    let mut buf = [0u8; 8];
    for (i, b) in buf.iter_mut().enumerate() {
        *b = data.get(at + i).copied().unwrap_or(0);
    }
    f64::from_le_bytes(buf)
}

fuzz_target!(|data: &[u8]| {
    let thresholds = BreakerThresholds::default();
    let mut det = DetectorAggregator::new(f64_at(data, 0));
    let mut journal = BreakerJournal::new(thresholds);
    let mut samples = Vec::new();
    let mut killed = false;

    for (i, op) in data.chunks(9).enumerate() {
        let tag = op[0];
        let value = f64_at(op, 1);
        samples.push(value);
        match tag % 11 {
            0 => det.record_total(u64::from(tag)),
            1 => det.record_gap(1),
            2 => det.record_corrupt(1),
            3 => det.record_burst(value),
            4 => det.record_skew(value),
            5 => det.set_overrides(OverrideReadings::new(value, 0.0, 0.0, 0.0)),
            6 => det.set_overrides(OverrideReadings::new(0.0, value, value, value)),
            7 => journal.clear_latch(),
            8 if i % 64 == 63 => {
                journal.trip_kill();
                killed = true;
            }
            _ => {}
        }

        let before = journal.breaker().state();
        let latched = journal.breaker().is_latched();
        let readings = det.readings();
        let after = journal.step(&readings);

        assert_ne!(worst_tier(&readings, &thresholds), BreakerState::Kill);
        if latched {
            assert!(after >= before);
        }
        if killed {
            assert_eq!(after, BreakerState::Kill);
        }
        assert_eq!(
            journal.breaker().publish_allowed(),
            after <= BreakerState::Local
        );
    }

    let set = PercentileSet::from_samples(&samples);
    assert_eq!(set.sample_count, samples.len());
    if !set.p999_valid {
        assert_eq!(set.p999.to_bits(), 0.0f64.to_bits());
    }
    let _ = percentile(&samples, f64_at(data, 8));
});
