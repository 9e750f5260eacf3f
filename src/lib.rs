pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod player;
pub mod playlist;
pub mod recovery;
pub mod sensor;
pub mod session;
pub mod trigger;

pub use app::{ComponentState, MotionplayOrchestrator, OrchestratorStats, ShutdownReason, StepOutcome};
pub use config::{MotionplayConfig, PlaybackMode, PlayerBackend, SensorKind, TriggerPolicyKind};
pub use display::{DisplayPreparer, NoopDisplay, XrandrDisplay};
pub use error::{DisplayError, MotionplayError, PlayerError, Result, SensorError};
pub use events::{EventBus, EventFilter, EventReceiver, MotionplayEvent};
pub use player::{MockPlayer, MpvPlayer, PlayerHandle, PlayerState};
pub use playlist::{PlayableUnit, Playlist};
pub use recovery::{retry_with_backoff, RecoveryConfig, RetryError};
pub use sensor::{MotionSensor, SensorSample, TriggerSource};
pub use session::{MediaSession, PlaybackOutcome, SessionTiming};
pub use trigger::{ConfirmationFilter, CooldownGate, HysteresisFilter, TriggerPolicy};
