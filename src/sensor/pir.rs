use super::gpio::{Direction, SysfsPin};
use super::{MotionSensor, SensorSample};
use crate::config::SensorKind;
use crate::error::SensorError;
use std::path::Path;
use tokio::time::Instant;
use tracing::info;

/// Passive infrared sensor on a single GPIO input; high means presence
pub struct PirSensor {
    pin: Option<SysfsPin>,
}

impl PirSensor {
    pub fn open<P: AsRef<Path>>(gpio_root: P, pin: u32) -> Result<Self, SensorError> {
        let pin = SysfsPin::open(gpio_root, pin, Direction::In)?;
        info!("PIR sensor ready on GPIO {}", pin.pin());
        Ok(Self { pin: Some(pin) })
    }
}

impl MotionSensor for PirSensor {
    fn read(&mut self) -> Result<SensorSample, SensorError> {
        let pin = self.pin.as_mut().ok_or(SensorError::Closed)?;
        let present = pin.read_level()?;
        Ok(SensorSample::presence(present, Instant::now()))
    }

    fn close(&mut self) {
        if let Some(pin) = self.pin.take() {
            pin.release();
        }
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Pir
    }
}

impl Drop for PirSensor {
    fn drop(&mut self) {
        self.close();
    }
}
