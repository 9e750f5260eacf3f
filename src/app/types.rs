use crate::session::PlaybackOutcome;
use chrono::{DateTime, Local};

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    /// Running with reduced function (fallback sensor, no idle frame)
    Degraded,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest(String),
}

/// What one control loop iteration did
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// No confirmed motion
    Idle,
    /// Motion confirmed while cooling down
    Ignored,
    /// Motion fired a playback
    Played(PlaybackOutcome),
}

/// Running counters, reported in the periodic status line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrchestratorStats {
    pub motion_confirmed: u64,
    pub motion_ignored: u64,
    pub playbacks: u64,
    pub failed_playbacks: u64,
    pub loop_errors: u64,
    pub idle_failures: u64,
    /// Wall-clock start of the most recent playback
    pub last_playback_at: Option<DateTime<Local>>,
}
