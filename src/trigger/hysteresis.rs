use super::TriggerPolicy;
use crate::sensor::SensorSample;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Two-threshold distance trigger.
///
/// Fires once the target has stayed within `near` for `stable_count` samples,
/// then stays disarmed until it has stayed beyond `far` for `stable_count`
/// samples. A reading hovering around a single threshold therefore cannot
/// fire repeatedly.
#[derive(Debug)]
pub struct HysteresisFilter {
    near_cm: f64,
    far_cm: f64,
    stable_count: u32,
    debounce: Duration,
    armed: bool,
    under_count: u32,
    over_count: u32,
    last_fired_at: Option<Instant>,
}

impl HysteresisFilter {
    pub fn new(near_cm: f64, margin_cm: f64, stable_count: u32, debounce: Duration) -> Self {
        Self {
            near_cm,
            far_cm: near_cm + margin_cm,
            stable_count: stable_count.max(1),
            debounce,
            armed: true,
            under_count: 0,
            over_count: 0,
            last_fired_at: None,
        }
    }

    pub fn near_cm(&self) -> f64 {
        self.near_cm
    }

    pub fn far_cm(&self) -> f64 {
        self.far_cm
    }

    fn debounce_elapsed(&self, now: Instant) -> bool {
        self.last_fired_at
            .map(|last| now.saturating_duration_since(last) >= self.debounce)
            .unwrap_or(true)
    }
}

impl TriggerPolicy for HysteresisFilter {
    fn observe(&mut self, sample: &SensorSample) -> bool {
        let distance = sample.distance_cm();

        if self.armed {
            if distance <= self.near_cm {
                self.under_count += 1;
                self.over_count = 0;

                if self.under_count >= self.stable_count && self.debounce_elapsed(sample.at) {
                    info!("Trigger: {:.1} cm within {:.1} cm", distance, self.near_cm);
                    self.last_fired_at = Some(sample.at);
                    self.armed = false;
                    self.under_count = 0;
                    return true;
                }
            } else {
                self.under_count = 0;
            }
        } else if distance >= self.far_cm {
            self.over_count += 1;
            if self.over_count >= self.stable_count {
                debug!(
                    "Re-armed: {:.1} cm beyond {:.1} cm",
                    distance, self.far_cm
                );
                self.armed = true;
                self.over_count = 0;
            }
        } else {
            self.over_count = 0;
        }

        false
    }

    fn reset(&mut self) {
        self.under_count = 0;
        self.over_count = 0;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    fn name(&self) -> &'static str {
        "hysteresis"
    }
}
