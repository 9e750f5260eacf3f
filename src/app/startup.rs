use super::{ComponentState, MotionplayOrchestrator};
use crate::config::SensorKind;
use crate::error::Result;
use crate::events::MotionplayEvent;
use crate::recovery::{retry_with_backoff, RetryError};
use crate::session::MediaSession;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

pub(super) const COMPONENTS: [&str; 3] = ["display", "sensor", "session"];

impl MotionplayOrchestrator {
    /// Register every component in the stopped state
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing motionplay components");

        let mut states = self.component_states.lock().await;
        for component in COMPONENTS {
            states.insert(component.to_string(), ComponentState::Stopped);
        }
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Prepare the displays, check the trigger, and show the first idle frame.
    /// Nothing here is fatal: a failed step leaves its component degraded.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting motionplay");

        // Layout was applied before the players opened; only a session
        // assembled from prebuilt parts still needs it here
        self.set_component_state("display", ComponentState::Starting)
            .await;
        let prepared = match self.display_prepared.take() {
            Some(prepared) => prepared,
            None => {
                let prepared = self.display.prepare(self.config.playback.mode).await;
                if !prepared {
                    warn!(
                        "Display preparation via {} failed, continuing with current layout",
                        self.display.name()
                    );
                }
                prepared
            }
        };
        let display_state = if prepared {
            ComponentState::Running
        } else {
            ComponentState::Failed
        };
        self.set_component_state("display", display_state).await;

        let sensor_state = if self.trigger.kind() == SensorKind::None
            && self.config.sensor.kind != SensorKind::None
        {
            ComponentState::Degraded
        } else {
            ComponentState::Running
        };
        self.set_component_state("sensor", sensor_state).await;
        info!(
            "Trigger running on {:?} sensor ({})",
            self.trigger.kind(),
            if self.trigger.is_background() {
                "background sampler"
            } else {
                "inline"
            }
        );

        self.set_component_state("session", ComponentState::Starting)
            .await;
        self.prepare_idle_with_retry().await;
        let session_state = if self.idle_ready {
            ComponentState::Running
        } else {
            ComponentState::Degraded
        };
        self.set_component_state("session", session_state).await;

        let unhealthy = self.unhealthy_components().await;
        if unhealthy.is_empty() {
            info!("Motionplay started, waiting for motion");
        } else {
            warn!(
                "Motionplay started with degraded components: {:?}",
                unhealthy
            );
        }
        Ok(())
    }

    /// Show the current unit's first frame, retrying with the idle policy.
    /// Exhausted retries are reported and the loop carries on without an
    /// idle frame; the next playback loads the unit itself.
    pub(super) async fn prepare_idle_with_retry(&mut self) -> bool {
        let index = self.playlist.current_index();
        let unit = self.playlist.current().clone();
        let session: Arc<MediaSession> = Arc::clone(&self.session);

        let result = retry_with_backoff(
            &self.idle_retry,
            "idle_frame",
            &self.cancellation_token,
            |_attempt| {
                let session = Arc::clone(&session);
                let unit = unit.clone();
                async move {
                    if session.prepare_idle(&unit).await {
                        Ok(())
                    } else {
                        Err(format!("could not show first frame of {}", unit))
                    }
                }
            },
        )
        .await;

        self.idle_ready = match result {
            Ok(()) => {
                self.publish(MotionplayEvent::IdleFramePrepared {
                    index,
                    timestamp: SystemTime::now(),
                });
                true
            }
            Err(RetryError::Exhausted { attempts, .. }) => {
                self.stats.idle_failures += 1;
                self.publish(MotionplayEvent::IdleFrameDegraded { index, attempts });
                false
            }
            Err(RetryError::Cancelled { .. }) => false,
        };

        self.idle_ready
    }
}
