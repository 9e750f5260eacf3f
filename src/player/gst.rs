use super::{PlayerHandle, PlayerState};
use crate::error::PlayerError;
use async_trait::async_trait;
use gstreamer::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

const STATE_WAIT: gstreamer::ClockTime = gstreamer::ClockTime::from_seconds(5);

/// In-process `playbin` pipeline per screen. End of stream and errors are
/// picked up from the pipeline bus whenever the state is queried.
pub struct GstPlayer {
    name: String,
    playbin: gstreamer::Element,
    bus: gstreamer::Bus,
    state: PlayerState,
    released: bool,
}

fn command_error(command: &str, details: impl ToString) -> PlayerError {
    PlayerError::Command {
        command: command.to_string(),
        details: details.to_string(),
    }
}

impl GstPlayer {
    pub fn new(screen: usize) -> Result<Self, PlayerError> {
        gstreamer::init().map_err(|e| PlayerError::Spawn {
            backend: "gstreamer".to_string(),
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let name = format!("playbin[{}]", screen);
        let playbin = gstreamer::ElementFactory::make("playbin")
            .name(name.as_str())
            .build()
            .map_err(|e| PlayerError::Spawn {
                backend: "gstreamer".to_string(),
                details: format!("Failed to create playbin: {}", e),
            })?;

        let bus = playbin.bus().ok_or_else(|| PlayerError::Spawn {
            backend: "gstreamer".to_string(),
            details: "playbin has no bus".to_string(),
        })?;

        info!("{} created", name);

        Ok(Self {
            name,
            playbin,
            bus,
            state: PlayerState::Stopped,
            released: false,
        })
    }

    fn ensure_live(&self) -> Result<(), PlayerError> {
        if self.released {
            Err(PlayerError::Released)
        } else {
            Ok(())
        }
    }

    fn set_pipeline_state(&self, state: gstreamer::State) -> Result<(), PlayerError> {
        self.playbin
            .set_state(state)
            .map(|_| ())
            .map_err(|e| command_error(&format!("set_state {:?}", state), e))
    }

    fn drain_bus(&mut self) {
        while let Some(msg) = self.bus.pop() {
            match msg.view() {
                gstreamer::MessageView::Eos(..) => {
                    debug!("{}: end of stream", self.name);
                    self.state = PlayerState::Ended;
                }
                gstreamer::MessageView::Error(err) => {
                    warn!(
                        "{}: pipeline error: {} ({:?})",
                        self.name,
                        err.error(),
                        err.debug()
                    );
                    self.state = PlayerState::Error;
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl PlayerHandle for GstPlayer {
    async fn load(&mut self, path: &Path) -> Result<(), PlayerError> {
        self.ensure_live()?;
        let uri = gstreamer::glib::filename_to_uri(path, None).map_err(|e| PlayerError::Load {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;

        self.set_pipeline_state(gstreamer::State::Null)?;
        self.playbin.set_property("uri", uri.as_str());
        self.set_pipeline_state(gstreamer::State::Paused)?;

        // Preroll so the first frame is available and seeking works
        let (result, _, _) = self.playbin.state(Some(STATE_WAIT));
        if let Err(e) = result {
            self.state = PlayerState::Error;
            return Err(PlayerError::Load {
                path: path.display().to_string(),
                details: format!("preroll failed: {}", e),
            });
        }

        // Stale EOS/error from the previous file must not leak into this one
        while self.bus.pop().is_some() {}
        self.state = PlayerState::Paused;
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        self.ensure_live()?;
        self.set_pipeline_state(gstreamer::State::Playing)?;
        self.state = PlayerState::Playing;
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        self.ensure_live()?;
        self.set_pipeline_state(gstreamer::State::Paused)?;
        if !self.state.is_terminal() {
            self.state = PlayerState::Paused;
        }
        Ok(())
    }

    async fn seek_start(&mut self) -> Result<(), PlayerError> {
        self.ensure_live()?;
        self.playbin
            .seek_simple(
                gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
                gstreamer::ClockTime::ZERO,
            )
            .map_err(|e| command_error("seek", e))?;
        if self.state == PlayerState::Ended {
            self.state = PlayerState::Paused;
        }
        Ok(())
    }

    async fn state(&mut self) -> Result<PlayerState, PlayerError> {
        self.ensure_live()?;
        self.drain_bus();

        if self.state.is_terminal() {
            return Ok(self.state);
        }

        Ok(match self.playbin.current_state() {
            gstreamer::State::Playing => PlayerState::Playing,
            gstreamer::State::Paused => PlayerState::Paused,
            _ => PlayerState::Loading,
        })
    }

    async fn stop(&mut self) -> Result<(), PlayerError> {
        self.ensure_live()?;
        self.set_pipeline_state(gstreamer::State::Null)?;
        self.state = PlayerState::Stopped;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), PlayerError> {
        if self.released {
            return Ok(());
        }
        let result = self.set_pipeline_state(gstreamer::State::Null);
        self.released = true;
        self.state = PlayerState::Stopped;
        info!("{} released", self.name);
        result
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), PlayerError> {
        self.ensure_live()?;
        self.playbin
            .set_property("volume", f64::from(volume.min(100)) / 100.0);
        Ok(())
    }

    async fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), PlayerError> {
        self.ensure_live()?;
        // playbin picks its own sink and exposes no window control
        super::windowed_only("gstreamer", fullscreen)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Drop for GstPlayer {
    fn drop(&mut self) {
        let _ = self.playbin.set_state(gstreamer::State::Null);
    }
}
