use super::{MotionSensor, SensorSample};
use crate::config::SensorKind;
use crate::error::SensorError;
use tokio::time::Instant;

/// Stand-in used when no sensor is configured or the real one is unavailable.
/// Always reads absence, so it never fires.
#[derive(Debug, Default)]
pub struct NullSensor;

impl NullSensor {
    pub fn new() -> Self {
        Self
    }
}

impl MotionSensor for NullSensor {
    fn read(&mut self) -> Result<SensorSample, SensorError> {
        Ok(SensorSample::presence(false, Instant::now()))
    }

    fn close(&mut self) {}

    fn kind(&self) -> SensorKind {
        SensorKind::None
    }
}
