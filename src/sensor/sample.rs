use tokio::time::Instant;

/// Raw reading taken once per poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    /// Presence sensor output
    Presence(bool),
    /// Measured distance in centimetres
    Distance(f64),
}

/// A timestamped sensor reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub value: SampleValue,
    pub at: Instant,
}

impl SensorSample {
    pub fn presence(present: bool, at: Instant) -> Self {
        Self {
            value: SampleValue::Presence(present),
            at,
        }
    }

    pub fn distance(cm: f64, at: Instant) -> Self {
        Self {
            value: SampleValue::Distance(cm),
            at,
        }
    }

    /// Presence as seen by a boolean policy. Distance readings never count.
    pub fn is_present(&self) -> bool {
        matches!(self.value, SampleValue::Presence(true))
    }

    /// Distance as seen by a range policy. Presence maps to touching / out of range.
    pub fn distance_cm(&self) -> f64 {
        match self.value {
            SampleValue::Distance(cm) => cm,
            SampleValue::Presence(true) => 0.0,
            SampleValue::Presence(false) => f64::INFINITY,
        }
    }
}
