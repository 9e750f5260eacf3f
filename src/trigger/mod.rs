mod confirmation;
mod gate;
mod hysteresis;
#[cfg(test)]
mod tests;

pub use confirmation::ConfirmationFilter;
pub use gate::{CooldownGate, GateState};
pub use hysteresis::HysteresisFilter;

use crate::config::{TriggerConfig, TriggerPolicyKind};
use crate::sensor::SensorSample;

/// Turns raw sensor samples into confirmed motion events
pub trait TriggerPolicy: Send {
    /// Feed one sample; true when this sample confirms a motion event
    fn observe(&mut self, sample: &SensorSample) -> bool;

    /// Drop any partially accumulated confirmation state
    fn reset(&mut self);

    /// Whether the policy would currently be able to fire
    fn is_armed(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Build the configured trigger policy
pub fn build_policy(config: &TriggerConfig) -> Box<dyn TriggerPolicy> {
    match config.policy {
        TriggerPolicyKind::Confirmation => Box::new(ConfirmationFilter::new(
            config.confirmation_count,
            config.debounce(),
        )),
        TriggerPolicyKind::Hysteresis => Box::new(HysteresisFilter::new(
            config.near_cm,
            config.hysteresis_margin_cm,
            config.stable_count,
            config.debounce(),
        )),
    }
}
