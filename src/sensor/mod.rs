mod background;
mod gpio;
mod keyboard;
mod null;
mod pir;
mod sample;
mod scripted;
mod serial;
mod ultrasonic;

pub use background::{BackgroundTrigger, TriggerSource};
pub use gpio::{Direction, SysfsPin};
pub use keyboard::KeyboardSensor;
pub use null::NullSensor;
pub use pir::PirSensor;
pub use sample::{SampleValue, SensorSample};
pub use scripted::{ScriptHandle, ScriptedSensor};
pub use serial::{SerialSensor, PLAY_LINE};
pub use ultrasonic::{distance_from_echo, UltrasonicSensor, SPEED_OF_SOUND_CM_PER_S};

use crate::config::{SensorConfig, SensorKind};
use crate::error::SensorError;
use crate::events::EventBus;
use std::sync::Arc;
use tracing::{info, warn};

/// A blocking source of presence or distance readings
pub trait MotionSensor: Send {
    /// Take one reading
    fn read(&mut self) -> Result<SensorSample, SensorError>;

    /// Release the underlying device. Further reads fail with `Closed`.
    fn close(&mut self);

    fn kind(&self) -> SensorKind;
}

/// Open the configured sensor
pub fn open_sensor(
    config: &SensorConfig,
    event_bus: Arc<EventBus>,
) -> Result<Box<dyn MotionSensor>, SensorError> {
    let sensor: Box<dyn MotionSensor> = match config.kind {
        SensorKind::Pir => Box::new(PirSensor::open(&config.gpio_root, config.pir_pin)?),
        SensorKind::Ultrasonic => Box::new(UltrasonicSensor::open(
            &config.gpio_root,
            config.trigger_pin,
            config.echo_pin,
            config.max_distance_cm,
            config.echo_timeout(),
        )?),
        SensorKind::Keyboard => Box::new(KeyboardSensor::start(config.keyboard_hold(), event_bus)?),
        SensorKind::Serial => Box::new(SerialSensor::open(
            &config.serial_device,
            config.serial_baud,
            config.serial_hold(),
        )?),
        SensorKind::None => Box::new(NullSensor::new()),
    };

    Ok(sensor)
}

/// Open the configured sensor, falling back to [`NullSensor`] when it is
/// unavailable so the rest of the system keeps running
pub fn build_sensor(config: &SensorConfig, event_bus: Arc<EventBus>) -> Box<dyn MotionSensor> {
    match open_sensor(config, event_bus) {
        Ok(sensor) => {
            info!("Sensor initialized: {:?}", sensor.kind());
            sensor
        }
        Err(e) => {
            warn!("{} - motion will never trigger", e);
            Box::new(NullSensor::new())
        }
    }
}
