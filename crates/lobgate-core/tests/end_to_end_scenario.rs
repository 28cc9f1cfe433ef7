//! Aggregator → breaker scenario driven entirely through injected overrides.
//!
//! Default thresholds. The raw channel is weighted to (almost) nothing so the
//! injected readings decide the tier.

use lobgate_core::breaker::{BreakerJournal, BreakerState, BreakerThresholds, TransitionCause};
use lobgate_core::detectors::{DetectorAggregator, OverrideReadings};

fn overrides(gap: f64) -> OverrideReadings {
    OverrideReadings::new(gap, 0.0, 0.0, 0.0)
}

#[test]
fn local_then_feeder_then_latched_then_cleared() {
    let mut det = DetectorAggregator::new(1e-9);
    let mut journal = BreakerJournal::new(BreakerThresholds::default());

    det.set_overrides(overrides(6.0));
    journal.step(&det.readings());
    let b = journal.breaker();
    assert_eq!(b.state(), BreakerState::Local);
    assert!(b.publish_allowed());
    assert!(!b.is_latched());

    det.set_overrides(overrides(60.0));
    journal.step(&det.readings());
    let b = journal.breaker();
    assert_eq!(b.state(), BreakerState::Feeder);
    assert!(!b.publish_allowed());
    assert!(b.is_latched());

    det.set_overrides(OverrideReadings::default());
    journal.step(&det.readings());
    assert_eq!(journal.breaker().state(), BreakerState::Feeder);

    journal.clear_latch();
    assert_eq!(journal.breaker().state(), BreakerState::Fuse);
    assert!(!journal.breaker().is_latched());

    let causes: Vec<String> = journal
        .log()
        .records()
        .iter()
        .map(|r| r.cause.to_string())
        .collect();
    assert_eq!(causes, ["gap_ppm>local", "gap_ppm>feeder", "clear_latch"]);
}

#[test]
fn raw_counts_alone_can_trip_the_gate() {
    let mut det = DetectorAggregator::new(1.0);
    let mut journal = BreakerJournal::new(BreakerThresholds::default());

    det.record_total(1_000_000);
    det.record_corrupt(12);
    journal.step(&det.readings());
    assert_eq!(journal.breaker().state(), BreakerState::Feeder);

    det.record_skew(150.0);
    journal.step(&det.readings());
    assert_eq!(journal.breaker().state(), BreakerState::Main);
}

#[test]
fn kill_override_outlives_clear() {
    let mut det = DetectorAggregator::new(1e-9);
    let mut journal = BreakerJournal::new(BreakerThresholds::default());

    det.set_overrides(overrides(6.0));
    journal.step(&det.readings());
    journal.trip_kill();
    journal.clear_latch();
    journal.step(&det.readings());

    assert_eq!(journal.breaker().state(), BreakerState::Kill);
    let last = journal.log().records().last().unwrap();
    assert_eq!(last.cause, TransitionCause::Kill);
    assert_eq!(last.to, BreakerState::Kill);
}
