use super::*;
use crate::config::MotionplayConfig;
use std::time::Duration;
use tokio::time::Instant;

const POLL: Duration = Duration::from_millis(100);

fn presence_stream(base: Instant, values: &[bool]) -> Vec<SensorSample> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| SensorSample::presence(*v, base + POLL * i as u32))
        .collect()
}

fn distance_stream(base: Instant, values: &[f64]) -> Vec<SensorSample> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| SensorSample::distance(*v, base + POLL * i as u32))
        .collect()
}

fn fired_at<P: TriggerPolicy>(policy: &mut P, samples: &[SensorSample]) -> Vec<usize> {
    samples
        .iter()
        .enumerate()
        .filter_map(|(i, s)| policy.observe(s).then_some(i))
        .collect()
}

#[test]
fn test_confirmation_requires_consecutive_presence() {
    let mut filter = ConfirmationFilter::new(3, Duration::ZERO);
    let samples = presence_stream(
        Instant::now(),
        &[true, true, false, true, true, true, false],
    );

    assert_eq!(fired_at(&mut filter, &samples), vec![5]);
    assert_eq!(filter.counter(), 0);
}

#[test]
fn test_confirmation_is_edge_triggered() {
    let mut filter = ConfirmationFilter::new(2, Duration::ZERO);
    let samples = presence_stream(Instant::now(), &[true; 6]);

    // Held presence fires once per completed window, not every poll
    assert_eq!(fired_at(&mut filter, &samples), vec![1, 3, 5]);
}

#[test]
fn test_confirmation_debounce_suppresses_close_events() {
    let mut filter = ConfirmationFilter::new(2, Duration::from_millis(500));
    let samples = presence_stream(Instant::now(), &[true; 12]);

    let fired = fired_at(&mut filter, &samples);
    // First at poll 1 (100 ms), counting resumes at 600 ms, fires at 700 ms
    assert_eq!(fired, vec![1, 7]);

    for pair in fired.windows(2) {
        let gap = samples[pair[1]].at - samples[pair[0]].at;
        assert!(gap >= Duration::from_millis(500));
    }
}

#[test]
fn test_confirmation_ignores_distance_samples() {
    let mut filter = ConfirmationFilter::new(1, Duration::ZERO);
    let now = Instant::now();
    assert!(!filter.observe(&SensorSample::distance(1.0, now)));
    assert!(filter.observe(&SensorSample::presence(true, now)));
}

#[test]
fn test_hysteresis_fires_after_stable_count() {
    let mut filter = HysteresisFilter::new(15.0, 3.0, 3, Duration::ZERO);
    let samples = distance_stream(Instant::now(), &[50.0, 50.0, 10.0, 10.0, 10.0]);

    assert_eq!(fired_at(&mut filter, &samples), vec![4]);
    assert!(!filter.is_armed());
}

#[test]
fn test_hysteresis_broken_run_restarts_count() {
    let mut filter = HysteresisFilter::new(15.0, 3.0, 3, Duration::ZERO);
    let samples = distance_stream(
        Instant::now(),
        &[10.0, 10.0, 16.0, 10.0, 10.0, 10.0],
    );

    assert_eq!(fired_at(&mut filter, &samples), vec![5]);
}

#[test]
fn test_hysteresis_does_not_oscillate_inside_band() {
    let mut filter = HysteresisFilter::new(15.0, 3.0, 2, Duration::ZERO);
    // Fire, then hover between near and far: must not re-arm or re-fire
    let samples = distance_stream(
        Instant::now(),
        &[10.0, 10.0, 16.0, 14.0, 17.0, 14.0, 14.0, 16.5, 14.0, 14.0],
    );

    assert_eq!(fired_at(&mut filter, &samples), vec![1]);
    assert!(!filter.is_armed());
}

#[test]
fn test_hysteresis_rearms_beyond_far() {
    let mut filter = HysteresisFilter::new(15.0, 3.0, 2, Duration::ZERO);
    let samples = distance_stream(
        Instant::now(),
        &[10.0, 10.0, 18.0, 20.0, 10.0, 10.0],
    );

    assert_eq!(fired_at(&mut filter, &samples), vec![1, 5]);
}

#[test]
fn test_hysteresis_respects_debounce() {
    let mut filter = HysteresisFilter::new(15.0, 3.0, 1, Duration::from_millis(450));
    // Fire at 0, re-arm at 100, close again at 200..: held until 450 ms elapsed
    let samples = distance_stream(
        Instant::now(),
        &[10.0, 30.0, 10.0, 10.0, 10.0, 10.0, 10.0],
    );

    assert_eq!(fired_at(&mut filter, &samples), vec![0, 5]);
}

#[test]
fn test_hysteresis_maps_presence() {
    let mut filter = HysteresisFilter::new(15.0, 3.0, 1, Duration::ZERO);
    let now = Instant::now();
    assert!(filter.observe(&SensorSample::presence(true, now)));
    assert!(!filter.observe(&SensorSample::presence(true, now + POLL)));
    assert!(!filter.observe(&SensorSample::presence(false, now + POLL * 2)));
    assert!(filter.is_armed());
}

#[test]
fn test_build_policy_from_config() {
    let mut config = MotionplayConfig::default();
    assert_eq!(build_policy(&config.trigger).name(), "confirmation");

    config.trigger.policy = crate::config::TriggerPolicyKind::Hysteresis;
    let policy = build_policy(&config.trigger);
    assert_eq!(policy.name(), "hysteresis");
    assert!(policy.is_armed());
}

#[test]
fn test_gate_rejects_events_during_cooldown() {
    let mut gate = CooldownGate::new(Duration::from_secs(5), Duration::ZERO);
    let start = Instant::now();

    assert!(gate.try_fire(start));
    assert!(!gate.is_armed());

    for secs in 1..=5 {
        assert!(
            !gate.try_fire(start + Duration::from_secs(secs)),
            "fired during cooldown at {}s",
            secs
        );
    }

    assert!(gate.try_fire(start + Duration::from_millis(5001)));
    assert_eq!(gate.fire_count(), 2);
}

#[test]
fn test_gate_refresh_rearms_strictly_after_period() {
    let mut gate = CooldownGate::new(Duration::from_secs(3), Duration::ZERO);
    let start = Instant::now();
    gate.try_fire(start);

    assert!(!gate.refresh(start + Duration::from_secs(3)));
    assert_eq!(gate.remaining(start + Duration::from_secs(1)), Some(Duration::from_secs(2)));
    assert!(gate.refresh(start + Duration::from_millis(3001)));
    assert_eq!(gate.state(), GateState::Armed);
    assert_eq!(gate.remaining(start), None);
}

#[test]
fn test_gate_hold_covers_long_playback() {
    let mut gate = CooldownGate::new(Duration::from_secs(5), Duration::from_secs(2));
    let start = Instant::now();
    gate.try_fire(start);

    // Playback ran for 30 s, far longer than the base cooldown
    let playback_end = start + Duration::from_secs(30);
    gate.hold_after_playback(playback_end);

    assert!(!gate.try_fire(playback_end + Duration::from_secs(1)));
    assert!(!gate.try_fire(playback_end + Duration::from_secs(2)));
    assert!(gate.try_fire(playback_end + Duration::from_millis(2001)));
}

#[test]
fn test_gate_hold_never_shortens_cooldown() {
    let mut gate = CooldownGate::new(Duration::from_secs(5), Duration::from_secs(1));
    let start = Instant::now();
    gate.try_fire(start);

    gate.hold_after_playback(start + Duration::from_secs(1));
    assert!(!gate.try_fire(start + Duration::from_secs(4)));
    assert!(gate.try_fire(start + Duration::from_millis(5001)));
}

#[test]
fn test_gate_huge_periods_are_clamped_not_overflowed() {
    let mut gate = CooldownGate::new(Duration::MAX, Duration::MAX);
    assert_eq!(gate.period(), Duration::from_secs(2 * 86_400));

    let start = Instant::now();
    assert!(gate.try_fire(start));
    gate.hold_after_playback(start + Duration::from_secs(1));

    assert!(!gate.try_fire(start + Duration::from_secs(86_400)));
    let left = gate.remaining(start).unwrap();
    assert!(left >= Duration::from_secs(2 * 86_400));
}

#[test]
fn test_gate_from_unvalidated_config_does_not_panic() {
    let mut config = MotionplayConfig::default();
    config.trigger.cooldown_seconds = f64::NAN;
    config.trigger.extra_cooldown_seconds = 1e19;

    let mut gate = CooldownGate::from_config(&config.trigger);
    let start = Instant::now();
    assert!(gate.try_fire(start));
    gate.hold_after_playback(start);
    assert!(!gate.is_armed());
}
