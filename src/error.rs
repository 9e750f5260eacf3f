use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionplayError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Player error: {0}")]
    Player(#[from] PlayerError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl MotionplayError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the main loop may keep going after this error. A closed
    /// sensor can never fire again, so it ends the loop as well.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MotionplayError::Config(_)
                | MotionplayError::Serialization(_)
                | MotionplayError::Deserialization(_)
                | MotionplayError::Sensor(SensorError::Closed)
        )
    }
}

/// Sensor collaborator failures
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Sensor unavailable ({sensor}): {details}")]
    Unavailable { sensor: String, details: String },

    #[error("GPIO {pin} error: {details}")]
    Gpio { pin: u32, details: String },

    #[error("Sensor read failed: {details}")]
    Read { details: String },

    #[error("Sensor has been closed")]
    Closed,
}

/// Media player collaborator failures
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Player backend '{backend}' failed to start: {details}")]
    Spawn { backend: String, details: String },

    #[error("Failed to load media {path}: {details}")]
    Load { path: String, details: String },

    #[error("Player command '{command}' failed: {details}")]
    Command { command: String, details: String },

    #[error("Player IPC error: {details}")]
    Ipc { details: String },

    #[error("Unit has {paths} media paths but session drives {handles} screens")]
    FanOutMismatch { paths: usize, handles: usize },

    #[error("Player handle has been released")]
    Released,

    #[error("Player backend '{backend}' does not support {operation}")]
    Unsupported { backend: String, operation: String },
}

/// Display preparation failures
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Failed to run {command}: {details}")]
    Command { command: String, details: String },

    #[error("No connected displays found")]
    NoOutputs,

    #[error("No configured mode could be applied to {output}")]
    NoUsableMode { output: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, MotionplayError>;
