use super::{MotionSensor, SampleValue, SensorSample};
use crate::config::SensorKind;
use crate::error::SensorError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Debug)]
struct Script {
    queue: VecDeque<Result<SampleValue, String>>,
    reads: u64,
    closed: bool,
}

/// Sensor that replays queued readings, then repeats an idle reading.
/// The paired [`ScriptHandle`] can keep feeding it after it has been moved
/// into the trigger source.
pub struct ScriptedSensor {
    kind: SensorKind,
    idle: SampleValue,
    script: Arc<Mutex<Script>>,
}

/// Feeds and inspects a [`ScriptedSensor`] from outside
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSensor {
    /// Presence sensor reading absence when the script runs dry
    pub fn presence() -> (Self, ScriptHandle) {
        Self::with_idle(SensorKind::Pir, SampleValue::Presence(false))
    }

    /// Distance sensor reading `idle_cm` when the script runs dry
    pub fn distance(idle_cm: f64) -> (Self, ScriptHandle) {
        Self::with_idle(SensorKind::Ultrasonic, SampleValue::Distance(idle_cm))
    }

    fn with_idle(kind: SensorKind, idle: SampleValue) -> (Self, ScriptHandle) {
        let script = Arc::new(Mutex::new(Script {
            queue: VecDeque::new(),
            reads: 0,
            closed: false,
        }));

        (
            Self {
                kind,
                idle,
                script: Arc::clone(&script),
            },
            ScriptHandle { script },
        )
    }
}

impl ScriptHandle {
    pub fn push_presence(&self, values: &[bool]) {
        let mut script = self.script.lock();
        script
            .queue
            .extend(values.iter().map(|v| Ok(SampleValue::Presence(*v))));
    }

    pub fn push_distance(&self, values: &[f64]) {
        let mut script = self.script.lock();
        script
            .queue
            .extend(values.iter().map(|v| Ok(SampleValue::Distance(*v))));
    }

    /// Make the next read fail
    pub fn push_error(&self, details: &str) {
        self.script.lock().queue.push_back(Err(details.to_string()));
    }

    pub fn pending(&self) -> usize {
        self.script.lock().queue.len()
    }

    pub fn reads(&self) -> u64 {
        self.script.lock().reads
    }

    /// Simulate the sensor going away; every later read fails with `Closed`
    pub fn close(&self) {
        self.script.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.script.lock().closed
    }
}

impl MotionSensor for ScriptedSensor {
    fn read(&mut self) -> Result<SensorSample, SensorError> {
        let mut script = self.script.lock();
        if script.closed {
            return Err(SensorError::Closed);
        }

        script.reads += 1;
        let value = match script.queue.pop_front() {
            Some(Ok(value)) => value,
            Some(Err(details)) => return Err(SensorError::Read { details }),
            None => self.idle,
        };

        Ok(SensorSample {
            value,
            at: Instant::now(),
        })
    }

    fn close(&mut self) {
        self.script.lock().closed = true;
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }
}
