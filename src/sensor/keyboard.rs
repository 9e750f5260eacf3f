use super::{MotionSensor, SensorSample};
use crate::config::SensorKind;
use crate::error::SensorError;
use crate::events::{EventBus, MotionplayEvent};
use crossbeam::channel::{self, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyInput {
    Presence,
}

/// Terminal stand-in for a presence sensor: SPACE reads as presence for a
/// short hold period, `q` or Esc requests shutdown.
pub struct KeyboardSensor {
    presses: Receiver<KeyInput>,
    hold: Duration,
    last_press: Option<Instant>,
    cancellation_token: CancellationToken,
    raw_mode: bool,
}

impl KeyboardSensor {
    /// Put the terminal in raw mode and start the key reader thread
    pub fn start(hold: Duration, event_bus: Arc<EventBus>) -> Result<Self, SensorError> {
        enable_raw_mode().map_err(|e| SensorError::Unavailable {
            sensor: "keyboard".to_string(),
            details: format!("raw mode unavailable: {}", e),
        })?;

        let (tx, rx) = channel::unbounded();
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        let spawned = thread::Builder::new()
            .name("keyboard-input".to_string())
            .spawn(move || read_keys(tx, event_bus, token));

        if let Err(e) = spawned {
            let _ = disable_raw_mode();
            return Err(SensorError::Unavailable {
                sensor: "keyboard".to_string(),
                details: format!("failed to spawn reader: {}", e),
            });
        }

        info!("Keyboard sensor active - press SPACE to simulate motion, q to quit");

        let mut sensor = Self::from_channel(rx, hold);
        sensor.cancellation_token = cancellation_token;
        sensor.raw_mode = true;
        Ok(sensor)
    }

    /// Sensor fed from an existing key channel, without touching the terminal
    pub(crate) fn from_channel(presses: Receiver<KeyInput>, hold: Duration) -> Self {
        Self {
            presses,
            hold,
            last_press: None,
            cancellation_token: CancellationToken::new(),
            raw_mode: false,
        }
    }
}

fn read_keys(tx: Sender<KeyInput>, event_bus: Arc<EventBus>, token: CancellationToken) {
    loop {
        if token.is_cancelled() {
            debug!("Keyboard reader stopping");
            break;
        }

        match event::poll(Duration::from_millis(100)) {
            Ok(true) => {
                let key_event = match event::read() {
                    Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => key_event,
                    _ => continue,
                };

                match key_event.code {
                    KeyCode::Char(' ') => {
                        debug!("Space bar pressed");
                        if tx.send(KeyInput::Presence).is_err() {
                            break;
                        }
                    }
                    KeyCode::Char('q') | KeyCode::Esc => {
                        info!("Quit key pressed - requesting shutdown");
                        let shutdown_event = MotionplayEvent::ShutdownRequested {
                            timestamp: SystemTime::now(),
                            reason: "User requested via keyboard".to_string(),
                        };
                        if let Err(e) = event_bus.publish(shutdown_event) {
                            warn!("Failed to publish shutdown event: {}", e);
                        }
                        break;
                    }
                    other => debug!("Key pressed: {:?}", other),
                }
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Error polling for keyboard events: {}", e);
            }
        }
    }

    debug!("Keyboard reader exited");
}

impl MotionSensor for KeyboardSensor {
    fn read(&mut self) -> Result<SensorSample, SensorError> {
        let now = Instant::now();

        if self.presses.try_iter().count() > 0 {
            self.last_press = Some(now);
        }

        let present = self
            .last_press
            .map(|at| now.saturating_duration_since(at) < self.hold)
            .unwrap_or(false);

        Ok(SensorSample::presence(present, now))
    }

    fn close(&mut self) {
        self.cancellation_token.cancel();
        if self.raw_mode {
            self.raw_mode = false;
            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        }
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Keyboard
    }
}

impl Drop for KeyboardSensor {
    fn drop(&mut self) {
        self.close();
    }
}
