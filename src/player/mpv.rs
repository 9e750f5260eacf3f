use super::{PlayerHandle, PlayerState};
use crate::config::PlaybackConfig;
use crate::error::PlayerError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_INTERVAL: Duration = Duration::from_millis(100);
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const LOAD_TIMEOUT: Duration = Duration::from_secs(5);
const LOAD_POLL: Duration = Duration::from_millis(50);
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the mpv command line for one screen
pub(crate) fn mpv_args(config: &PlaybackConfig, screen: usize, socket: &Path) -> Vec<String> {
    let mut args = vec![
        "--idle=yes".to_string(),
        format!("--input-ipc-server={}", socket.display()),
        "--keep-open=yes".to_string(),
        "--no-terminal".to_string(),
        "--no-osc".to_string(),
        "--osd-level=0".to_string(),
        "--force-window=yes".to_string(),
        "--hwdec=auto".to_string(),
        format!("--volume={}", config.volume),
    ];

    let placement = config.screen(screen);
    if let Some(index) = placement.screen {
        args.push(format!("--screen={}", index));
        args.push(format!("--fs-screen={}", index));
    }
    if let Some(geometry) = placement.geometry {
        args.push(format!("--geometry={}", geometry));
    }
    if config.fullscreen {
        args.push("--fs".to_string());
    }

    args
}

/// Map the properties queried from mpv onto a player state
pub(crate) fn state_from_properties(
    loaded: bool,
    idle_active: bool,
    eof_reached: bool,
    paused: bool,
) -> PlayerState {
    if !loaded {
        PlayerState::Stopped
    } else if idle_active {
        // File went away without us stopping it: open or decode failure
        PlayerState::Error
    } else if eof_reached {
        PlayerState::Ended
    } else if paused {
        PlayerState::Paused
    } else {
        PlayerState::Playing
    }
}

/// External mpv process per screen, driven over its JSON IPC socket
pub struct MpvPlayer {
    name: String,
    socket_path: PathBuf,
    child: Option<Child>,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_request_id: u64,
    loaded: Option<PathBuf>,
    released: bool,
}

impl MpvPlayer {
    /// Start mpv for `screen` and connect to its IPC socket
    pub async fn spawn(config: &PlaybackConfig, screen: usize) -> Result<Self, PlayerError> {
        let name = format!("mpv[{}]", screen);
        let socket_path = Path::new(&config.ipc_dir).join(format!(
            "motionplay-mpv-{}-{}.sock",
            screen,
            uuid::Uuid::new_v4()
        ));

        let args = mpv_args(config, screen, &socket_path);
        debug!("Launching {} {}", config.player_binary, args.join(" "));

        let mut child = Command::new(&config.player_binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::Spawn {
                backend: "mpv".to_string(),
                details: format!("failed to launch {}: {}", config.player_binary, e),
            })?;

        let mut stream = None;
        for _ in 0..CONNECT_ATTEMPTS {
            sleep(CONNECT_INTERVAL).await;
            match UnixStream::connect(&socket_path).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => {
                    if let Ok(Some(status)) = child.try_wait() {
                        return Err(PlayerError::Spawn {
                            backend: "mpv".to_string(),
                            details: format!("mpv exited before IPC connected ({})", status),
                        });
                    }
                }
            }
        }

        let Some(stream) = stream else {
            let _ = child.kill().await;
            return Err(PlayerError::Spawn {
                backend: "mpv".to_string(),
                details: format!("timed out connecting to {}", socket_path.display()),
            });
        };

        let (read_half, write_half) = stream.into_split();
        info!("{} connected on {}", name, socket_path.display());

        Ok(Self {
            name,
            socket_path,
            child: Some(child),
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
            loaded: None,
            released: false,
        })
    }

    /// Send one IPC command and wait for its reply, skipping unrelated
    /// event lines. Returns the reply's `data` field.
    async fn command(&mut self, args: Value) -> Result<Value, PlayerError> {
        if self.released {
            return Err(PlayerError::Released);
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let label = args
            .get(0)
            .and_then(Value::as_str)
            .unwrap_or("command")
            .to_string();
        let mut line = json!({ "command": args, "request_id": request_id }).to_string();
        line.push('\n');

        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PlayerError::Ipc {
                details: format!("{}: write failed: {}", self.name, e),
            })?;

        let reply = timeout(REPLY_TIMEOUT, read_reply(&mut self.reader, request_id))
            .await
            .map_err(|_| PlayerError::Ipc {
                details: format!("{}: no reply to {}", self.name, label),
            })??;

        match reply.get("error").and_then(Value::as_str) {
            Some("success") | None => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
            Some(error) => Err(PlayerError::Command {
                command: label,
                details: error.to_string(),
            }),
        }
    }

    async fn get_bool(&mut self, property: &str) -> Result<bool, PlayerError> {
        let value = self.command(json!(["get_property", property])).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn set_property(&mut self, property: &str, value: Value) -> Result<(), PlayerError> {
        self.command(json!(["set_property", property, value]))
            .await
            .map(|_| ())
    }
}

async fn read_reply(
    reader: &mut BufReader<OwnedReadHalf>,
    request_id: u64,
) -> Result<Value, PlayerError> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| PlayerError::Ipc {
                details: format!("read failed: {}", e),
            })?;
        if n == 0 {
            return Err(PlayerError::Ipc {
                details: "mpv IPC closed".to_string(),
            });
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if value.get("request_id").and_then(Value::as_u64) == Some(request_id) {
            return Ok(value);
        }
    }
}

#[async_trait]
impl PlayerHandle for MpvPlayer {
    async fn load(&mut self, path: &Path) -> Result<(), PlayerError> {
        let path_str = path.to_string_lossy().to_string();
        self.command(json!(["loadfile", path_str, "replace"]))
            .await
            .map_err(|e| PlayerError::Load {
                path: path_str.clone(),
                details: e.to_string(),
            })?;

        // loadfile returns before the file is opened; wait for mpv to leave idle
        let deadline = Instant::now() + LOAD_TIMEOUT;
        loop {
            sleep(LOAD_POLL).await;
            if !self.get_bool("idle-active").await? {
                break;
            }
            if Instant::now() >= deadline {
                self.loaded = None;
                return Err(PlayerError::Load {
                    path: path_str,
                    details: "mpv stayed idle after loadfile".to_string(),
                });
            }
        }

        debug!("{} loaded {}", self.name, path.display());
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        self.set_property("pause", json!(false)).await
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        self.set_property("pause", json!(true)).await
    }

    async fn seek_start(&mut self) -> Result<(), PlayerError> {
        self.command(json!(["seek", 0, "absolute"])).await.map(|_| ())
    }

    async fn state(&mut self) -> Result<PlayerState, PlayerError> {
        if self.loaded.is_none() {
            return Ok(PlayerState::Stopped);
        }

        let idle_active = self.get_bool("idle-active").await?;
        let eof_reached = if idle_active {
            false
        } else {
            self.get_bool("eof-reached").await?
        };
        let paused = self.get_bool("pause").await?;

        Ok(state_from_properties(true, idle_active, eof_reached, paused))
    }

    async fn stop(&mut self) -> Result<(), PlayerError> {
        self.command(json!(["stop"])).await?;
        self.loaded = None;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), PlayerError> {
        if self.released {
            return Ok(());
        }

        if let Err(e) = self.command(json!(["quit"])).await {
            debug!("{}: quit command failed: {}", self.name, e);
        }
        self.released = true;
        self.loaded = None;

        if let Some(mut child) = self.child.take() {
            match timeout(QUIT_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => debug!("{} exited with {}", self.name, status),
                _ => {
                    warn!("{} did not quit, killing", self.name);
                    let _ = child.kill().await;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        info!("{} released", self.name);
        Ok(())
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), PlayerError> {
        self.set_property("volume", json!(volume)).await
    }

    async fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), PlayerError> {
        self.set_property("fullscreen", json!(fullscreen)).await
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        // Child is killed on drop; only the socket file is left to clean up
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
