use super::TriggerPolicy;
use crate::sensor::SensorSample;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Consecutive-presence confirmation with a debounce window between events
#[derive(Debug)]
pub struct ConfirmationFilter {
    confirmation_count: u32,
    debounce: Duration,
    counter: u32,
    last_confirmed_at: Option<Instant>,
}

impl ConfirmationFilter {
    pub fn new(confirmation_count: u32, debounce: Duration) -> Self {
        Self {
            confirmation_count: confirmation_count.max(1),
            debounce,
            counter: 0,
            last_confirmed_at: None,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn last_confirmed_at(&self) -> Option<Instant> {
        self.last_confirmed_at
    }

    fn in_debounce_window(&self, now: Instant) -> bool {
        self.last_confirmed_at
            .map(|last| now.saturating_duration_since(last) < self.debounce)
            .unwrap_or(false)
    }
}

impl TriggerPolicy for ConfirmationFilter {
    fn observe(&mut self, sample: &SensorSample) -> bool {
        if self.in_debounce_window(sample.at) {
            return false;
        }

        if !sample.is_present() {
            self.counter = 0;
            return false;
        }

        self.counter += 1;
        debug!(
            "Motion detected ({}/{})",
            self.counter, self.confirmation_count
        );

        if self.counter >= self.confirmation_count {
            info!("Motion confirmed after {} consecutive readings", self.counter);
            self.counter = 0;
            self.last_confirmed_at = Some(sample.at);
            return true;
        }

        false
    }

    fn reset(&mut self) {
        self.counter = 0;
    }

    fn is_armed(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "confirmation"
    }
}
