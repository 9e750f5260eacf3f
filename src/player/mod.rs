#[cfg(all(target_os = "linux", feature = "gstreamer"))]
mod gst;
mod mock;
mod mpv;
#[cfg(test)]
mod tests;

#[cfg(all(target_os = "linux", feature = "gstreamer"))]
pub use gst::GstPlayer;
pub use mock::{MockControl, MockPlayer};
pub use mpv::MpvPlayer;

use crate::config::{PlaybackConfig, PlayerBackend};
use crate::error::PlayerError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Playback state reported by a player handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Loading,
    Playing,
    Paused,
    Ended,
    Error,
    Stopped,
}

impl PlayerState {
    /// States a playback cannot leave on its own
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlayerState::Ended | PlayerState::Error | PlayerState::Stopped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Loading => "loading",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Ended => "ended",
            PlayerState::Error => "error",
            PlayerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One video output driven by some player backend
#[async_trait]
pub trait PlayerHandle: Send {
    /// Open a media file, replacing whatever was loaded
    async fn load(&mut self, path: &Path) -> Result<(), PlayerError>;

    async fn play(&mut self) -> Result<(), PlayerError>;

    async fn pause(&mut self) -> Result<(), PlayerError>;

    /// Rewind to the first frame
    async fn seek_start(&mut self) -> Result<(), PlayerError>;

    async fn state(&mut self) -> Result<PlayerState, PlayerError>;

    async fn stop(&mut self) -> Result<(), PlayerError>;

    /// Tear down the backend. Every later call fails with `Released`.
    async fn release(&mut self) -> Result<(), PlayerError>;

    async fn set_volume(&mut self, volume: u8) -> Result<(), PlayerError>;

    async fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), PlayerError>;

    fn name(&self) -> String;
}

/// Create one player handle per screen for the configured mode and backend
pub async fn build_players(
    config: &PlaybackConfig,
) -> Result<Vec<Box<dyn PlayerHandle>>, PlayerError> {
    let fan_out = config.mode.fan_out();
    let mut players: Vec<Box<dyn PlayerHandle>> = Vec::with_capacity(fan_out);

    for screen in 0..fan_out {
        let player = match create_player(config, screen).await {
            Ok(player) => player,
            Err(e) => {
                for mut started in players {
                    let _ = started.release().await;
                }
                return Err(e);
            }
        };
        players.push(player);
    }

    for player in players.iter_mut() {
        if let Err(e) = player.set_volume(config.volume).await {
            warn!("{}: failed to set volume: {}", player.name(), e);
        }
        if let Err(e) = player.set_fullscreen(config.fullscreen).await {
            warn!("{}: failed to set fullscreen: {}", player.name(), e);
        }
    }

    info!(
        "Created {} {:?} player(s) for {} mode",
        players.len(),
        config.backend,
        config.mode.as_str()
    );

    Ok(players)
}

/// Fullscreen check for backends that cannot place their own window:
/// windowed is a no-op, fullscreen is refused.
pub(crate) fn windowed_only(backend: &str, fullscreen: bool) -> Result<(), PlayerError> {
    if fullscreen {
        return Err(PlayerError::Unsupported {
            backend: backend.to_string(),
            operation: "fullscreen".to_string(),
        });
    }
    Ok(())
}

async fn create_player(
    config: &PlaybackConfig,
    screen: usize,
) -> Result<Box<dyn PlayerHandle>, PlayerError> {
    match config.backend {
        PlayerBackend::Mpv => Ok(Box::new(MpvPlayer::spawn(config, screen).await?)),
        PlayerBackend::Mock => Ok(Box::new(MockPlayer::new(
            format!("mock[{}]", screen),
            config.mock_duration(),
        ))),
        PlayerBackend::Gstreamer => create_gst_player(screen),
    }
}

#[cfg(all(target_os = "linux", feature = "gstreamer"))]
fn create_gst_player(screen: usize) -> Result<Box<dyn PlayerHandle>, PlayerError> {
    Ok(Box::new(GstPlayer::new(screen)?))
}

#[cfg(not(all(target_os = "linux", feature = "gstreamer")))]
fn create_gst_player(_screen: usize) -> Result<Box<dyn PlayerHandle>, PlayerError> {
    Err(PlayerError::Spawn {
        backend: "gstreamer".to_string(),
        details: "built without the gstreamer feature".to_string(),
    })
}
