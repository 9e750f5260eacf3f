use super::{ComponentState, MotionplayOrchestrator};
use crate::error::{MotionplayError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl MotionplayOrchestrator {
    /// Release players, close the sensor and record final component states.
    /// Returns 0 when every step succeeded, 1 otherwise.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel the loop, background sampler and any playback in progress
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        // Players first, so nothing is left on screen without a trigger
        for component in ["session", "sensor", "display"] {
            if let Err(e) = self.stop_component(component).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Bring everything up once, then tear it down again
    pub async fn dry_run(&mut self) -> Result<i32> {
        info!("Dry run: preparing displays and idle frame, then shutting down");
        self.start().await?;
        self.shutdown().await
    }

    async fn stop_component(&mut self, component: &str) -> Result<()> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        let result = match component {
            "session" => {
                let session = Arc::clone(&self.session);
                match timeout(STOP_TIMEOUT, session.release()).await {
                    Ok(released) => released.map_err(MotionplayError::from),
                    Err(_) => Err(MotionplayError::component(component, "stop timeout")),
                }
            }
            "sensor" => {
                self.trigger.close_async().await;
                Ok(())
            }
            // The display layout is left as configured
            _ => Ok(()),
        };

        let state = if result.is_ok() {
            ComponentState::Stopped
        } else {
            ComponentState::Failed
        };
        self.set_component_state(component, state).await;

        if result.is_ok() {
            info!("{} component stopped", component);
        }
        result
    }
}
