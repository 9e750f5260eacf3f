use super::gpio::{Direction, SysfsPin};
use super::{MotionSensor, SensorSample};
use crate::config::SensorKind;
use crate::error::SensorError;
use std::path::Path;
use std::time::{Duration, Instant as StdInstant};
use tokio::time::Instant;
use tracing::{debug, info};

/// Speed of sound at room temperature
pub const SPEED_OF_SOUND_CM_PER_S: f64 = 34_300.0;

const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Convert the width of an echo pulse into a distance. The pulse covers the
/// round trip, so the result is halved and clamped to the sensor range.
pub fn distance_from_echo(elapsed: Duration, max_distance_cm: f64) -> f64 {
    (elapsed.as_secs_f64() * SPEED_OF_SOUND_CM_PER_S / 2.0).min(max_distance_cm)
}

/// HC-SR04 style trigger/echo range finder.
///
/// Timing is a busy-wait on the echo line, so this sensor is meant to be
/// sampled from the background trigger thread rather than the control task.
pub struct UltrasonicSensor {
    trigger: Option<SysfsPin>,
    echo: Option<SysfsPin>,
    max_distance_cm: f64,
    echo_timeout: Duration,
}

impl UltrasonicSensor {
    pub fn open<P: AsRef<Path>>(
        gpio_root: P,
        trigger_pin: u32,
        echo_pin: u32,
        max_distance_cm: f64,
        echo_timeout: Duration,
    ) -> Result<Self, SensorError> {
        let mut trigger = SysfsPin::open(gpio_root.as_ref(), trigger_pin, Direction::Out)?;
        trigger.write_level(false)?;
        let echo = SysfsPin::open(gpio_root.as_ref(), echo_pin, Direction::In)?;

        info!(
            "Ultrasonic sensor ready (trigger GPIO {}, echo GPIO {}, range {:.0} cm)",
            trigger_pin, echo_pin, max_distance_cm
        );

        Ok(Self {
            trigger: Some(trigger),
            echo: Some(echo),
            max_distance_cm,
            echo_timeout,
        })
    }

    /// One trigger pulse and echo measurement. A missing echo edge reads as
    /// nothing in range.
    fn measure(&mut self) -> Result<f64, SensorError> {
        let (trigger, echo) = match (self.trigger.as_mut(), self.echo.as_mut()) {
            (Some(trigger), Some(echo)) => (trigger, echo),
            _ => return Err(SensorError::Closed),
        };

        trigger.write_level(true)?;
        std::thread::sleep(TRIGGER_PULSE);
        trigger.write_level(false)?;

        let wait_start = StdInstant::now();
        while !echo.read_level()? {
            if wait_start.elapsed() > self.echo_timeout {
                debug!("No echo rising edge");
                return Ok(self.max_distance_cm);
            }
        }

        let pulse_start = StdInstant::now();
        while echo.read_level()? {
            if pulse_start.elapsed() > self.echo_timeout {
                debug!("Echo held high past timeout");
                return Ok(self.max_distance_cm);
            }
        }

        Ok(distance_from_echo(pulse_start.elapsed(), self.max_distance_cm))
    }
}

impl MotionSensor for UltrasonicSensor {
    fn read(&mut self) -> Result<SensorSample, SensorError> {
        let cm = self.measure()?;
        Ok(SensorSample::distance(cm, Instant::now()))
    }

    fn close(&mut self) {
        if let Some(mut trigger) = self.trigger.take() {
            let _ = trigger.write_level(false);
            trigger.release();
        }
        if let Some(echo) = self.echo.take() {
            echo.release();
        }
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Ultrasonic
    }
}

impl Drop for UltrasonicSensor {
    fn drop(&mut self) {
        self.close();
    }
}
