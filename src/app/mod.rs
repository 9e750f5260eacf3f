mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::MotionplayOrchestrator;
pub use types::{ComponentState, OrchestratorStats, ShutdownReason, StepOutcome};
