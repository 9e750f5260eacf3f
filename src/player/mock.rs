use super::{PlayerHandle, PlayerState};
use crate::error::PlayerError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct MockState {
    duration: Duration,
    state: PlayerState,
    loaded: Option<PathBuf>,
    position: Duration,
    playing_since: Option<Instant>,
    volume: u8,
    fullscreen: bool,
    fail_loads: bool,
    fail_state_reads: bool,
    error_after: Option<Duration>,
    released: bool,
    calls: Vec<String>,
}

impl MockState {
    fn position(&self, now: Instant) -> Duration {
        match self.playing_since {
            Some(since) => self.position + now.saturating_duration_since(since),
            None => self.position,
        }
    }

    fn freeze(&mut self, now: Instant) {
        self.position = self.position(now);
        self.playing_since = None;
    }
}

/// In-memory player. "Plays" each loaded file for a fixed duration on the
/// tokio clock, so paused-time tests see deterministic end times.
pub struct MockPlayer {
    name: String,
    inner: Arc<Mutex<MockState>>,
}

/// Shared view into a [`MockPlayer`] for scripting failures and checking calls
#[derive(Clone)]
pub struct MockControl {
    inner: Arc<Mutex<MockState>>,
}

impl MockPlayer {
    pub fn new<S: Into<String>>(name: S, duration: Duration) -> Self {
        Self::with_control(name, duration).0
    }

    pub fn with_control<S: Into<String>>(name: S, duration: Duration) -> (Self, MockControl) {
        let inner = Arc::new(Mutex::new(MockState {
            duration,
            state: PlayerState::Stopped,
            loaded: None,
            position: Duration::ZERO,
            playing_since: None,
            volume: 100,
            fullscreen: false,
            fail_loads: false,
            fail_state_reads: false,
            error_after: None,
            released: false,
            calls: Vec::new(),
        }));

        (
            Self {
                name: name.into(),
                inner: Arc::clone(&inner),
            },
            MockControl { inner },
        )
    }

    fn record(&self, call: &str) -> Result<parking_lot::MutexGuard<'_, MockState>, PlayerError> {
        let mut inner = self.inner.lock();
        if inner.released {
            return Err(PlayerError::Released);
        }
        inner.calls.push(call.to_string());
        Ok(inner)
    }
}

#[async_trait]
impl PlayerHandle for MockPlayer {
    async fn load(&mut self, path: &Path) -> Result<(), PlayerError> {
        let mut inner = self.record("load")?;
        if inner.fail_loads {
            inner.state = PlayerState::Error;
            return Err(PlayerError::Load {
                path: path.display().to_string(),
                details: "mock load failure".to_string(),
            });
        }

        inner.loaded = Some(path.to_path_buf());
        inner.position = Duration::ZERO;
        inner.playing_since = None;
        inner.state = PlayerState::Paused;
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.record("play")?;
        if inner.loaded.is_none() {
            return Err(PlayerError::Command {
                command: "play".to_string(),
                details: "nothing loaded".to_string(),
            });
        }
        if inner.playing_since.is_none() {
            inner.playing_since = Some(Instant::now());
        }
        inner.state = PlayerState::Playing;
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.record("pause")?;
        inner.freeze(Instant::now());
        if !inner.state.is_terminal() {
            inner.state = PlayerState::Paused;
        }
        Ok(())
    }

    async fn seek_start(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.record("seek_start")?;
        inner.position = Duration::ZERO;
        if inner.playing_since.is_some() {
            inner.playing_since = Some(Instant::now());
        }
        if inner.state == PlayerState::Ended {
            inner.state = PlayerState::Paused;
        }
        Ok(())
    }

    async fn state(&mut self) -> Result<PlayerState, PlayerError> {
        let mut inner = self.inner.lock();
        if inner.released {
            return Err(PlayerError::Released);
        }
        if inner.fail_state_reads {
            return Err(PlayerError::Ipc {
                details: "mock state read failure".to_string(),
            });
        }

        if inner.state == PlayerState::Playing {
            let now = Instant::now();
            let position = inner.position(now);
            if inner.error_after.is_some_and(|after| position >= after) {
                inner.freeze(now);
                inner.state = PlayerState::Error;
            } else if position >= inner.duration {
                inner.freeze(now);
                inner.position = inner.duration;
                inner.state = PlayerState::Ended;
            }
        }

        Ok(inner.state)
    }

    async fn stop(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.record("stop")?;
        inner.freeze(Instant::now());
        inner.loaded = None;
        inner.state = PlayerState::Stopped;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.record("release")?;
        inner.released = true;
        inner.state = PlayerState::Stopped;
        Ok(())
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), PlayerError> {
        let mut inner = self.record("set_volume")?;
        inner.volume = volume;
        Ok(())
    }

    async fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), PlayerError> {
        let mut inner = self.record("set_fullscreen")?;
        inner.fullscreen = fullscreen;
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl MockControl {
    pub fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    pub fn loaded(&self) -> Option<PathBuf> {
        self.inner.lock().loaded.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.inner.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    pub fn volume(&self) -> u8 {
        self.inner.lock().volume
    }

    pub fn set_duration(&self, duration: Duration) {
        self.inner.lock().duration = duration;
    }

    pub fn fail_loads(&self, fail: bool) {
        self.inner.lock().fail_loads = fail;
    }

    pub fn fail_state_reads(&self, fail: bool) {
        self.inner.lock().fail_state_reads = fail;
    }

    /// Report `Error` once playback position reaches `after`
    pub fn error_after(&self, after: Option<Duration>) {
        self.inner.lock().error_after = after;
    }
}
