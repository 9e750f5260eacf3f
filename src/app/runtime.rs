use super::{MotionplayOrchestrator, ShutdownReason, StepOutcome};
use crate::error::{MotionplayError, Result};
use crate::events::{EventFilter, MotionplayEvent};
use crate::session::PlaybackOutcome;
use chrono::Local;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::signal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Store the first shutdown reason and cancel the token
async fn record_shutdown(
    slot: &Mutex<Option<ShutdownReason>>,
    token: &CancellationToken,
    reason: ShutdownReason,
) {
    let mut current = slot.lock().await;
    if current.is_none() {
        *current = Some(reason);
    }
    drop(current);
    token.cancel();
}

impl MotionplayOrchestrator {
    /// Run the control loop with signal handling until shutdown
    pub async fn run(&mut self) -> Result<i32> {
        info!("Motionplay is running");

        self.setup_signal_handlers();
        self.run_until_shutdown().await
    }

    /// Run the control loop until the token is cancelled or a shutdown event
    /// arrives, then tear everything down. Returns the process exit code.
    pub async fn run_until_shutdown(&mut self) -> Result<i32> {
        let listener = self.spawn_shutdown_listener();

        self.run_loop().await;
        listener.abort();

        let reason = self.shutdown_reason.lock().await.clone();
        info!(
            "Shutdown initiated: {}",
            reason
                .map(|r| format!("{:?}", r))
                .unwrap_or_else(|| "token cancelled".to_string())
        );

        let exit_code = self.shutdown().await?;
        info!("Motionplay shutdown complete");
        Ok(exit_code)
    }

    /// Ask the running loop to stop
    pub async fn request_shutdown(&self, reason: ShutdownReason) {
        record_shutdown(&self.shutdown_reason, &self.cancellation_token, reason).await;
    }

    pub async fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.shutdown_reason.lock().await.clone()
    }

    async fn run_loop(&mut self) {
        let poll_interval = self.config.system.poll_interval();
        self.last_status_at = Instant::now();

        while !self.cancellation_token.is_cancelled() {
            if let Err(e) = self.step().await {
                self.handle_loop_error(e).await;
            }

            self.log_status_if_due();

            tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                _ = sleep(poll_interval) => {}
            }
        }

        debug!("Control loop exited");
    }

    /// One loop iteration: refresh the gate, poll the trigger, and play the
    /// current unit if motion fires while armed.
    pub async fn step(&mut self) -> Result<StepOutcome> {
        let now = Instant::now();
        self.gate.refresh(now);

        let confirmed = self.trigger.poll()?;
        self.last_motion = confirmed;
        if !confirmed {
            return Ok(StepOutcome::Idle);
        }

        if !self.gate.try_fire(now) {
            debug!(
                "Motion confirmed during cooldown ({:.1}s left), ignoring",
                self.gate
                    .remaining(now)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or_default()
            );
            self.stats.motion_ignored += 1;
            self.publish(MotionplayEvent::MotionIgnored {
                timestamp: SystemTime::now(),
            });
            return Ok(StepOutcome::Ignored);
        }

        self.stats.motion_confirmed += 1;
        self.publish(MotionplayEvent::MotionConfirmed {
            timestamp: SystemTime::now(),
        });

        let outcome = self.play_current().await;
        Ok(StepOutcome::Played(outcome))
    }

    /// Play the current unit, then rotate, re-prepare the idle frame and
    /// hold the gate past the end of playback.
    async fn play_current(&mut self) -> PlaybackOutcome {
        let index = self.playlist.current_index();
        let unit = self.playlist.current().clone();
        let playback_id = Uuid::new_v4().to_string();

        info!(
            "Playing unit {}/{} ({})",
            index + 1,
            self.playlist.len(),
            unit
        );
        self.stats.last_playback_at = Some(Local::now());
        self.publish(MotionplayEvent::PlaybackStarted {
            playback_id: playback_id.clone(),
            index,
            timestamp: SystemTime::now(),
        });

        let outcome = self.session.play_to_completion(&unit).await;

        self.publish(MotionplayEvent::PlaybackFinished {
            playback_id,
            index,
            outcome: outcome.as_str().to_string(),
            timestamp: SystemTime::now(),
        });

        match &outcome {
            PlaybackOutcome::Completed => self.stats.playbacks += 1,
            PlaybackOutcome::CompletedWithErrors { .. }
            | PlaybackOutcome::TimedOut
            | PlaybackOutcome::Failed(_) => {
                self.stats.playbacks += 1;
                self.stats.failed_playbacks += 1;
                warn!("Unit {} playback {}", index + 1, outcome);
            }
            PlaybackOutcome::Aborted | PlaybackOutcome::Busy => {
                info!("Unit {} playback {}, not rotating", index + 1, outcome);
            }
        }

        if outcome.was_attempted() {
            self.playlist.advance();
            self.trigger.reset();
            self.prepare_idle_with_retry().await;
            self.gate.hold_after_playback(Instant::now());
        }

        outcome
    }

    async fn handle_loop_error(&mut self, err: MotionplayError) {
        self.stats.loop_errors += 1;
        error!("Control loop iteration failed: {}", err);
        self.publish(MotionplayEvent::SystemError {
            component: "main_loop".to_string(),
            error: err.to_string(),
        });

        if !err.is_recoverable() {
            self.request_shutdown(ShutdownReason::Error(err.to_string()))
                .await;
            return;
        }

        tokio::select! {
            _ = self.cancellation_token.cancelled() => {}
            _ = sleep(self.config.system.error_pause()) => {}
        }
    }

    fn log_status_if_due(&mut self) {
        let now = Instant::now();
        if now.saturating_duration_since(self.last_status_at) < self.config.system.status_interval()
        {
            return;
        }
        self.last_status_at = now;

        let gate = match self.gate.remaining(now) {
            None => "armed".to_string(),
            Some(left) => format!("cooldown {:.1}s", left.as_secs_f64()),
        };
        let trigger = match self.trigger.policy_armed() {
            Some(true) => "armed",
            Some(false) => "waiting",
            None => "background",
        };
        let last_playback = self
            .stats
            .last_playback_at
            .map(|at| at.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        info!(
            "Status: motion={} trigger={} playing={} unit={}/{} gate={} playbacks={} ignored={} errors={} last_playback={}",
            self.last_motion,
            trigger,
            self.session.is_playing(),
            self.playlist.current_index() + 1,
            self.playlist.len(),
            gate,
            self.stats.playbacks,
            self.stats.motion_ignored,
            self.stats.loop_errors,
            last_playback
        );
    }

    /// Turn `ShutdownRequested` events (keyboard quit) into cancellation
    fn spawn_shutdown_listener(&self) -> JoinHandle<()> {
        let mut receiver = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown_listener",
        );
        let slot = Arc::clone(&self.shutdown_reason);
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                event = receiver.recv() => {
                    if let Ok(MotionplayEvent::ShutdownRequested { reason, .. }) = event {
                        record_shutdown(&slot, &token, ShutdownReason::UserRequest(reason)).await;
                    }
                }
            }
        })
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let slot = Arc::clone(&self.shutdown_reason);
            let token = self.cancellation_token.clone();
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = token.cancelled() => {}
                            Some(()) = sigterm.recv() => {
                                info!("Received SIGTERM signal");
                                record_shutdown(&slot, &token, ShutdownReason::Signal("SIGTERM".to_string())).await;
                            }
                        }
                    });
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let slot = Arc::clone(&self.shutdown_reason);
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("Received SIGINT signal (Ctrl+C)");
                        record_shutdown(&slot, &token, ShutdownReason::Signal("SIGINT".to_string())).await;
                    }
                }
            }
        });
    }
}
