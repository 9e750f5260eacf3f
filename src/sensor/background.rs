use super::MotionSensor;
use crate::config::SensorKind;
use crate::error::SensorError;
use crate::trigger::TriggerPolicy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Nice value requested for the sampling thread
const SAMPLER_NICE: i32 = -5;

/// Where confirmed motion comes from: the sensor and filter evaluated on the
/// control task, or a dedicated sampling thread that latches its result.
pub enum TriggerSource {
    Inline {
        sensor: Box<dyn MotionSensor>,
        policy: Box<dyn TriggerPolicy>,
    },
    Background(BackgroundTrigger),
}

impl TriggerSource {
    pub fn inline(sensor: Box<dyn MotionSensor>, policy: Box<dyn TriggerPolicy>) -> Self {
        TriggerSource::Inline { sensor, policy }
    }

    /// Move the sensor and filter onto their own thread
    pub fn spawn_background(
        sensor: Box<dyn MotionSensor>,
        policy: Box<dyn TriggerPolicy>,
        sample_period: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Self, SensorError> {
        BackgroundTrigger::spawn(sensor, policy, sample_period, shutdown.child_token())
            .map(TriggerSource::Background)
    }

    /// Take one trigger decision. For the background source this consumes
    /// the latched confirmation, if any.
    pub fn poll(&mut self) -> Result<bool, SensorError> {
        match self {
            TriggerSource::Inline { sensor, policy } => {
                let sample = sensor.read()?;
                Ok(policy.observe(&sample))
            }
            TriggerSource::Background(background) => background.take(),
        }
    }

    /// Forget partial confirmation state, e.g. after a playback
    pub fn reset(&mut self) {
        match self {
            TriggerSource::Inline { policy, .. } => policy.reset(),
            TriggerSource::Background(background) => background.clear(),
        }
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            TriggerSource::Inline { sensor, .. } => sensor.kind(),
            TriggerSource::Background(background) => background.kind,
        }
    }

    /// Whether the filter could fire on the next reading. Unknown for the
    /// background source, whose filter lives on the sampler thread.
    pub fn policy_armed(&self) -> Option<bool> {
        match self {
            TriggerSource::Inline { policy, .. } => Some(policy.is_armed()),
            TriggerSource::Background(_) => None,
        }
    }

    pub fn is_background(&self) -> bool {
        matches!(self, TriggerSource::Background(_))
    }

    pub fn close(&mut self) {
        match self {
            TriggerSource::Inline { sensor, .. } => sensor.close(),
            TriggerSource::Background(background) => background.stop(),
        }
    }

    /// Close from async context. The sampler thread is joined on the
    /// blocking pool so the runtime keeps serving other tasks meanwhile.
    pub async fn close_async(&mut self) {
        match self {
            TriggerSource::Inline { sensor, .. } => sensor.close(),
            TriggerSource::Background(background) => background.stop_async().await,
        }
    }
}

/// Sampling thread handle. The latch is the only state shared with the
/// control task.
pub struct BackgroundTrigger {
    latch: Arc<AtomicBool>,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
    kind: SensorKind,
}

impl BackgroundTrigger {
    fn spawn(
        mut sensor: Box<dyn MotionSensor>,
        mut policy: Box<dyn TriggerPolicy>,
        sample_period: Duration,
        stop: CancellationToken,
    ) -> Result<Self, SensorError> {
        let kind = sensor.kind();
        let latch = Arc::new(AtomicBool::new(false));
        let thread_latch = Arc::clone(&latch);
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("trigger-sampler".to_string())
            .spawn(move || {
                raise_priority();
                info!(
                    "Background trigger sampling every {:?} with {} policy",
                    sample_period,
                    policy.name()
                );

                while !thread_stop.is_cancelled() {
                    match sensor.read() {
                        Ok(sample) => {
                            if policy.observe(&sample) {
                                thread_latch.store(true, Ordering::Release);
                            }
                        }
                        Err(SensorError::Closed) => break,
                        Err(e) => warn!("Sensor read failed: {}", e),
                    }
                    thread::sleep(sample_period);
                }

                sensor.close();
                debug!("Background trigger exited");
            })
            .map_err(|e| SensorError::Unavailable {
                sensor: "background".to_string(),
                details: format!("failed to spawn sampler: {}", e),
            })?;

        Ok(Self {
            latch,
            stop,
            handle: Some(handle),
            kind,
        })
    }

    fn take(&self) -> Result<bool, SensorError> {
        let fired = self.latch.swap(false, Ordering::AcqRel);
        if !fired && self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            return Err(SensorError::Closed);
        }
        Ok(fired)
    }

    fn clear(&self) {
        self.latch.store(false, Ordering::Release);
    }

    fn stop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Background trigger thread panicked");
            }
        }
    }

    async fn stop_async(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("Background trigger thread panicked"),
                Err(e) => warn!("Failed to join background trigger: {}", e),
            }
        }
    }
}

impl Drop for BackgroundTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "linux")]
fn raise_priority() {
    use libc::{setpriority, PRIO_PROCESS};
    // Applies to the calling thread only on Linux
    let rc = unsafe { setpriority(PRIO_PROCESS as u32, 0, SAMPLER_NICE) };
    if rc != 0 {
        debug!("Could not raise sampler priority, keeping default");
    }
}

#[cfg(not(target_os = "linux"))]
fn raise_priority() {
    let _ = SAMPLER_NICE;
}
