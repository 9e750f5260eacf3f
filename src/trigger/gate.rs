use crate::config::{TriggerConfig, MAX_COOLDOWN_SECONDS};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Arm/fire/cooldown state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Armed,
    Cooldown { fired_at: Instant, until: Instant },
}

/// Refractory gate between a confirmed trigger and playback.
///
/// The cooldown runs from the moment of firing and is extended after every
/// playback so that re-arming never happens sooner than `post_playback_margin`
/// after the playback actually ended.
#[derive(Debug)]
pub struct CooldownGate {
    period: Duration,
    post_playback_margin: Duration,
    state: GateState,
    fire_count: u64,
}

/// Upper bound on any single hold, matching the configuration limits
const MAX_HOLD: Duration = Duration::from_secs(2 * MAX_COOLDOWN_SECONDS as u64);

/// `now + hold`, saturating at `now` when the clock cannot represent it
fn deadline(now: Instant, hold: Duration) -> Instant {
    now.checked_add(hold).unwrap_or(now)
}

impl CooldownGate {
    /// Periods beyond two days are clamped
    pub fn new(period: Duration, post_playback_margin: Duration) -> Self {
        Self {
            period: period.min(MAX_HOLD),
            post_playback_margin: post_playback_margin.min(MAX_HOLD),
            state: GateState::Armed,
            fire_count: 0,
        }
    }

    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(config.cooldown_period(), config.post_playback_margin())
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.state == GateState::Armed
    }

    pub fn fire_count(&self) -> u64 {
        self.fire_count
    }

    /// Return to `Armed` once the cooldown has strictly elapsed.
    /// Returns true when this call re-armed the gate.
    pub fn refresh(&mut self, now: Instant) -> bool {
        if let GateState::Cooldown { until, .. } = self.state {
            if now > until {
                debug!("Cooldown elapsed, trigger re-armed");
                self.state = GateState::Armed;
                return true;
            }
        }
        false
    }

    /// Fire if armed. A `false` return means the event must be ignored.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        self.refresh(now);

        match self.state {
            GateState::Armed => {
                self.state = GateState::Cooldown {
                    fired_at: now,
                    until: deadline(now, self.period),
                };
                self.fire_count += 1;
                true
            }
            GateState::Cooldown { .. } => false,
        }
    }

    /// Push the end of the cooldown to at least `now + post_playback_margin`.
    pub fn hold_after_playback(&mut self, now: Instant) {
        let hold_until = deadline(now, self.post_playback_margin);

        match &mut self.state {
            GateState::Cooldown { until, .. } => {
                if hold_until > *until {
                    debug!(
                        "Extending cooldown by {:?} past playback end",
                        hold_until.saturating_duration_since(*until)
                    );
                    *until = hold_until;
                }
            }
            GateState::Armed => {
                if !self.post_playback_margin.is_zero() {
                    self.state = GateState::Cooldown {
                        fired_at: now,
                        until: hold_until,
                    };
                }
            }
        }
    }

    /// Time left before the gate re-arms
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.state {
            GateState::Armed => None,
            GateState::Cooldown { until, .. } => Some(until.saturating_duration_since(now)),
        }
    }
}
