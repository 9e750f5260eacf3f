#[cfg(test)]
mod tests;

use crate::config::PlaybackConfig;
use crate::error::PlayerError;
use crate::player::{build_players, PlayerHandle, PlayerState};
use crate::playlist::PlayableUnit;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one `play_to_completion` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every screen reached the end
    Completed,
    /// Every screen finished, some of them with an error
    CompletedWithErrors { failed_screens: Vec<usize> },
    /// Shutdown was requested mid-playback
    Aborted,
    /// The playback ran past `max_playback_seconds`
    TimedOut,
    /// Playback could not be started
    Failed(String),
    /// Another playback is running, or the session is released
    Busy,
}

impl PlaybackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackOutcome::Completed => "completed",
            PlaybackOutcome::CompletedWithErrors { .. } => "completed_with_errors",
            PlaybackOutcome::Aborted => "aborted",
            PlaybackOutcome::TimedOut => "timed_out",
            PlaybackOutcome::Failed(_) => "failed",
            PlaybackOutcome::Busy => "busy",
        }
    }

    /// Whether the unit counts as attempted, so the playlist should rotate
    pub fn was_attempted(&self) -> bool {
        !matches!(self, PlaybackOutcome::Aborted | PlaybackOutcome::Busy)
    }
}

impl fmt::Display for PlaybackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackOutcome::CompletedWithErrors { failed_screens } => {
                write!(f, "completed with errors on screens {:?}", failed_screens)
            }
            PlaybackOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Waits used while driving the players
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// How long the first frame plays before being paused as the idle frame
    pub settle: Duration,
    /// Wait after starting playback before polling state
    pub start_grace: Duration,
    pub state_poll: Duration,
    pub max_playback: Option<Duration>,
}

impl SessionTiming {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            settle: config.settle(),
            start_grace: config.start_grace(),
            state_poll: config.state_poll(),
            max_playback: config.max_playback(),
        }
    }
}

struct SessionInner {
    handles: Vec<Box<dyn PlayerHandle>>,
    loaded: Option<PlayableUnit>,
}

/// Clears `is_playing` however the playback ends
struct PlayingGuard<'a>(&'a AtomicBool);

impl Drop for PlayingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One player handle per screen, driven in lockstep
pub struct MediaSession {
    inner: Mutex<SessionInner>,
    fan_out: usize,
    timing: SessionTiming,
    shutdown: CancellationToken,
    is_playing: AtomicBool,
    initialized: AtomicBool,
    released: AtomicBool,
}

impl MediaSession {
    pub fn new(
        handles: Vec<Box<dyn PlayerHandle>>,
        timing: SessionTiming,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            fan_out: handles.len(),
            inner: Mutex::new(SessionInner {
                handles,
                loaded: None,
            }),
            timing,
            shutdown,
            is_playing: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    /// Create the players for the configured mode and backend
    pub async fn from_config(
        config: &PlaybackConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, PlayerError> {
        let handles = build_players(config).await?;
        Ok(Self::new(handles, SessionTiming::from_config(config), shutdown))
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Show the first frame of `unit` on every screen, paused
    pub async fn prepare_idle(&self, unit: &PlayableUnit) -> bool {
        if self.is_released() {
            warn!("Cannot prepare idle frame: session released");
            return false;
        }
        if self.is_playing() {
            warn!("Cannot prepare idle frame while playing");
            return false;
        }

        let mut inner = self.inner.lock().await;
        match self.load_first_frame(&mut inner, unit).await {
            Ok(()) => {
                inner.loaded = Some(unit.clone());
                self.initialized.store(true, Ordering::Release);
                debug!("Idle frame ready: {}", unit);
                true
            }
            Err(e) => {
                inner.loaded = None;
                warn!("Failed to prepare idle frame for {}: {}", unit, e);
                false
            }
        }
    }

    async fn load_first_frame(
        &self,
        inner: &mut SessionInner,
        unit: &PlayableUnit,
    ) -> Result<(), PlayerError> {
        check_fan_out(&inner.handles, unit)?;

        for (handle, path) in inner.handles.iter_mut().zip(unit.paths()) {
            handle.load(path).await?;
            handle.play().await?;
        }

        // Let the decoder put a frame on screen before freezing it
        let cancelled = tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = sleep(self.timing.settle) => false,
        };

        for handle in inner.handles.iter_mut() {
            handle.pause().await?;
        }

        if cancelled {
            return Err(PlayerError::Command {
                command: "prepare_idle".to_string(),
                details: "interrupted by shutdown".to_string(),
            });
        }

        Ok(())
    }

    /// Play `unit` from the start on every screen and wait until all of
    /// them have finished.
    pub async fn play_to_completion(&self, unit: &PlayableUnit) -> PlaybackOutcome {
        if self.is_released() {
            warn!("Ignoring playback request: session released");
            return PlaybackOutcome::Busy;
        }
        if self
            .is_playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Ignoring playback request: already playing");
            return PlaybackOutcome::Busy;
        }
        let _guard = PlayingGuard(&self.is_playing);

        let mut inner = self.inner.lock().await;

        if let Err(e) = self.start_playback(&mut inner, unit).await {
            error!("Failed to start playback of {}: {}", unit, e);
            return PlaybackOutcome::Failed(e.to_string());
        }

        let started = Instant::now();
        info!("Playing {}", unit);

        tokio::select! {
            _ = self.shutdown.cancelled() => return PlaybackOutcome::Aborted,
            _ = sleep(self.timing.start_grace) => {}
        }

        let mut finished: Vec<Option<PlayerState>> = vec![None; inner.handles.len()];

        loop {
            if self.shutdown.is_cancelled() {
                info!("Playback aborted by shutdown");
                return PlaybackOutcome::Aborted;
            }

            for (index, handle) in inner.handles.iter_mut().enumerate() {
                if finished[index].is_some() {
                    continue;
                }
                let state = match handle.state().await {
                    Ok(state) => state,
                    Err(e) => {
                        warn!("{}: state unavailable, treating as error: {}", handle.name(), e);
                        PlayerState::Error
                    }
                };
                if state.is_terminal() {
                    debug!("{} finished: {}", handle.name(), state);
                    finished[index] = Some(state);
                }
            }

            if finished.iter().all(Option::is_some) {
                let failed_screens: Vec<usize> = finished
                    .iter()
                    .enumerate()
                    .filter(|(_, state)| **state == Some(PlayerState::Error))
                    .map(|(index, _)| index)
                    .collect();

                let outcome = if failed_screens.is_empty() {
                    PlaybackOutcome::Completed
                } else {
                    PlaybackOutcome::CompletedWithErrors { failed_screens }
                };
                info!(
                    "Playback {} after {:.1}s",
                    outcome,
                    started.elapsed().as_secs_f64()
                );
                return outcome;
            }

            if let Some(max) = self.timing.max_playback {
                if started.elapsed() >= max {
                    warn!("Playback exceeded {:?}, pausing", max);
                    for (index, handle) in inner.handles.iter_mut().enumerate() {
                        if finished[index].is_none() {
                            if let Err(e) = handle.pause().await {
                                warn!("{}: pause failed: {}", handle.name(), e);
                            }
                        }
                    }
                    return PlaybackOutcome::TimedOut;
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {}
                _ = sleep(self.timing.state_poll) => {}
            }
        }
    }

    async fn start_playback(
        &self,
        inner: &mut SessionInner,
        unit: &PlayableUnit,
    ) -> Result<(), PlayerError> {
        check_fan_out(&inner.handles, unit)?;

        if inner.loaded.as_ref() != Some(unit) {
            debug!("Loading {} for playback", unit);
            inner.loaded = None;
            for (handle, path) in inner.handles.iter_mut().zip(unit.paths()) {
                handle.load(path).await?;
            }
            inner.loaded = Some(unit.clone());
        }

        for handle in inner.handles.iter_mut() {
            handle.seek_start().await?;
        }
        for handle in inner.handles.iter_mut() {
            handle.play().await?;
        }

        Ok(())
    }

    /// Stop and release every player. Safe to call more than once and
    /// before anything was loaded. Waits for a running playback to return.
    pub async fn release(&self) -> Result<(), PlayerError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut inner = self.inner.lock().await;
        let mut last_error = None;

        for handle in inner.handles.iter_mut() {
            if let Err(e) = handle.stop().await {
                debug!("{}: stop failed: {}", handle.name(), e);
            }
            if let Err(e) = handle.release().await {
                warn!("{}: release failed: {}", handle.name(), e);
                last_error = Some(e);
            }
        }
        inner.loaded = None;

        info!("Media session released");
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn check_fan_out(handles: &[Box<dyn PlayerHandle>], unit: &PlayableUnit) -> Result<(), PlayerError> {
    if unit.fan_out() != handles.len() {
        return Err(PlayerError::FanOutMismatch {
            paths: unit.fan_out(),
            handles: handles.len(),
        });
    }
    Ok(())
}
