use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Longest accepted cooldown or playback margin, in seconds
pub const MAX_COOLDOWN_SECONDS: f64 = 86_400.0;

/// Line speeds the serial sensor can configure
pub const SERIAL_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Largest accepted distance setting, in centimetres
pub const MAX_DISTANCE_CM: f64 = 10_000.0;

/// Seconds to a duration without panicking on NaN, infinite or negative
/// input. The cap covers a validated base cooldown plus its margin.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, 2.0 * MAX_COOLDOWN_SECONDS)).unwrap_or_default()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionplayConfig {
    pub sensor: SensorConfig,
    pub trigger: TriggerConfig,
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    pub display: DisplayConfig,
    pub system: SystemConfig,
}

/// Which physical sensor feeds the trigger
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// PIR motion sensor on a GPIO input (boolean presence)
    Pir,
    /// HC-SR04 style trigger/echo distance sensor
    Ultrasonic,
    /// SPACE bar on the controlling terminal, for bench testing
    Keyboard,
    /// Microcontroller on a serial line sending `PLAY` when it sees motion
    Serial,
    /// No sensor; never fires
    None,
}

impl SensorKind {
    /// True when the sensor produces distance samples rather than presence
    pub fn measures_distance(&self) -> bool {
        matches!(self, SensorKind::Ultrasonic)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPolicyKind {
    Confirmation,
    Hysteresis,
}

/// Screen fan-out of the installation
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    Single,
    Dual,
}

impl PlaybackMode {
    pub fn fan_out(&self) -> usize {
        match self {
            PlaybackMode::Single => 1,
            PlaybackMode::Dual => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackMode::Single => "single",
            PlaybackMode::Dual => "dual",
        }
    }
}

impl std::str::FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(PlaybackMode::Single),
            "dual" => Ok(PlaybackMode::Dual),
            other => Err(format!(
                "Invalid mode '{}'. Must be 'single' or 'dual'",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerBackend {
    /// External mpv process per screen, driven over JSON IPC
    Mpv,
    /// In-process GStreamer playbin per screen
    Gstreamer,
    /// In-memory player that "plays" for a fixed duration
    Mock,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SensorConfig {
    /// Sensor type
    #[serde(default = "default_sensor_kind")]
    pub kind: SensorKind,

    /// Root of the sysfs GPIO tree
    #[serde(default = "default_gpio_root")]
    pub gpio_root: String,

    /// BCM pin of the PIR output
    #[serde(default = "default_pir_pin")]
    pub pir_pin: u32,

    /// BCM pin driving the ultrasonic trigger
    #[serde(default = "default_trigger_pin")]
    pub trigger_pin: u32,

    /// BCM pin reading the ultrasonic echo
    #[serde(default = "default_echo_pin")]
    pub echo_pin: u32,

    /// Distance reported when no echo comes back
    #[serde(default = "default_max_distance_cm")]
    pub max_distance_cm: f64,

    /// Give up waiting for an echo edge after this long
    #[serde(default = "default_echo_timeout_ms")]
    pub echo_timeout_ms: u64,

    /// Run sensor reads and filtering on a dedicated thread
    #[serde(default = "default_background")]
    pub background: bool,

    /// Sampling period of the background reader
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,

    /// How long a SPACE press reads as presence
    #[serde(default = "default_keyboard_hold_ms")]
    pub keyboard_hold_ms: u64,

    /// Serial device the trigger board is attached to
    #[serde(default = "default_serial_device")]
    pub serial_device: String,

    /// Line speed of the serial device
    #[serde(default = "default_serial_baud")]
    pub serial_baud: u32,

    /// How long a `PLAY` line reads as presence
    #[serde(default = "default_serial_hold_ms")]
    pub serial_hold_ms: u64,
}

impl SensorConfig {
    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    pub fn keyboard_hold(&self) -> Duration {
        Duration::from_millis(self.keyboard_hold_ms)
    }

    pub fn serial_hold(&self) -> Duration {
        Duration::from_millis(self.serial_hold_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TriggerConfig {
    /// Trigger filter policy
    #[serde(default = "default_trigger_policy")]
    pub policy: TriggerPolicyKind,

    /// Consecutive positive polls required to confirm motion
    #[serde(default = "default_confirmation_count")]
    pub confirmation_count: u32,

    /// Minimum time between two confirmed events
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Fire when closer than this (hysteresis policy)
    #[serde(default = "default_near_cm")]
    pub near_cm: f64,

    /// Re-arm only beyond near_cm + margin (hysteresis policy)
    #[serde(default = "default_hysteresis_margin_cm")]
    pub hysteresis_margin_cm: f64,

    /// Consecutive samples required on either side of the band
    #[serde(default = "default_stable_count")]
    pub stable_count: u32,

    /// Base refractory period after firing
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,

    /// Extra refractory margin, also applied after playback ends
    #[serde(default = "default_extra_cooldown_seconds")]
    pub extra_cooldown_seconds: f64,
}

impl TriggerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Refractory period counted from the moment of firing
    pub fn cooldown_period(&self) -> Duration {
        saturating_secs(self.cooldown_seconds + self.extra_cooldown_seconds)
    }

    /// Margin kept after a playback ends before re-arming
    pub fn post_playback_margin(&self) -> Duration {
        saturating_secs(self.extra_cooldown_seconds)
    }

    pub fn far_cm(&self) -> f64 {
        self.near_cm + self.hysteresis_margin_cm
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlaybackConfig {
    /// Single screen or left/right pair
    #[serde(default = "default_playback_mode")]
    pub mode: PlaybackMode,

    /// Media engine behind each screen
    #[serde(default = "default_player_backend")]
    pub backend: PlayerBackend,

    /// Player executable (mpv backend)
    #[serde(default = "default_player_binary")]
    pub player_binary: String,

    /// Directory for mpv IPC sockets
    #[serde(default = "default_ipc_dir")]
    pub ipc_dir: String,

    /// Time between play and pause when showing the idle frame
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Wait before the first state poll of a playback
    #[serde(default = "default_start_grace_ms")]
    pub start_grace_ms: u64,

    /// Interval between player state polls
    #[serde(default = "default_state_poll_ms")]
    pub state_poll_ms: u64,

    /// Optional upper bound on a single playback
    #[serde(default)]
    pub max_playback_seconds: Option<u64>,

    /// Output volume (0-100)
    #[serde(default = "default_volume")]
    pub volume: u8,

    /// Fullscreen every screen at setup
    #[serde(default = "default_fullscreen")]
    pub fullscreen: bool,

    /// Duration each unit lasts with the mock backend
    #[serde(default = "default_mock_duration_ms")]
    pub mock_duration_ms: u64,

    /// Per-screen placement, left first
    #[serde(default)]
    pub screens: Vec<ScreenConfig>,
}

impl PlaybackConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_ms)
    }

    pub fn state_poll(&self) -> Duration {
        Duration::from_millis(self.state_poll_ms)
    }

    pub fn max_playback(&self) -> Option<Duration> {
        self.max_playback_seconds.map(Duration::from_secs)
    }

    pub fn mock_duration(&self) -> Duration {
        Duration::from_millis(self.mock_duration_ms)
    }

    /// Placement for screen `index`, falling back to defaults
    pub fn screen(&self, index: usize) -> ScreenConfig {
        self.screens.get(index).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ScreenConfig {
    /// X screen / monitor index handed to the player
    pub screen: Option<u32>,
    /// Window geometry such as "720x1280+720+0"
    pub geometry: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum UnitConfig {
    Pair { left: String, right: String },
    Single { path: String },
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PlaylistConfig {
    /// Ordered playable units
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// Run display preparation before the first idle frame
    #[serde(default = "default_display_enabled")]
    pub enabled: bool,

    /// X display to configure
    #[serde(default = "default_x_display")]
    pub x_display: String,

    /// Modes to try, in order
    #[serde(default = "default_display_modes")]
    pub modes: Vec<String>,

    /// xrandr rotation ("left" for portrait content)
    #[serde(default = "default_display_rotate")]
    pub rotate: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Main loop poll interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Attempts at showing the idle frame before degrading
    #[serde(default = "default_idle_retry_attempts")]
    pub idle_retry_attempts: u32,

    /// Delay between idle frame attempts
    #[serde(default = "default_idle_retry_delay_ms")]
    pub idle_retry_delay_ms: u64,

    /// Pause after a failed loop iteration
    #[serde(default = "default_error_pause_ms")]
    pub error_pause_ms: u64,

    /// Interval of the periodic status line
    #[serde(default = "default_status_interval_seconds")]
    pub status_interval_seconds: u64,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl SystemConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_millis(self.error_pause_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_seconds)
    }
}

impl MotionplayConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("motionplay.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("sensor.kind", "pir")?
            .set_default("sensor.gpio_root", default_gpio_root())?
            .set_default("sensor.pir_pin", default_pir_pin())?
            .set_default("sensor.trigger_pin", default_trigger_pin())?
            .set_default("sensor.echo_pin", default_echo_pin())?
            .set_default("sensor.max_distance_cm", default_max_distance_cm())?
            .set_default("sensor.echo_timeout_ms", default_echo_timeout_ms())?
            .set_default("sensor.background", default_background())?
            .set_default("sensor.sample_period_ms", default_sample_period_ms())?
            .set_default("sensor.keyboard_hold_ms", default_keyboard_hold_ms())?
            .set_default("sensor.serial_device", default_serial_device())?
            .set_default("sensor.serial_baud", default_serial_baud())?
            .set_default("sensor.serial_hold_ms", default_serial_hold_ms())?
            .set_default("trigger.policy", "confirmation")?
            .set_default("trigger.confirmation_count", default_confirmation_count())?
            .set_default("trigger.debounce_ms", default_debounce_ms())?
            .set_default("trigger.near_cm", default_near_cm())?
            .set_default(
                "trigger.hysteresis_margin_cm",
                default_hysteresis_margin_cm(),
            )?
            .set_default("trigger.stable_count", default_stable_count())?
            .set_default("trigger.cooldown_seconds", default_cooldown_seconds())?
            .set_default(
                "trigger.extra_cooldown_seconds",
                default_extra_cooldown_seconds(),
            )?
            .set_default("playback.mode", "single")?
            .set_default("playback.backend", "mpv")?
            .set_default("playback.player_binary", default_player_binary())?
            .set_default("playback.ipc_dir", default_ipc_dir())?
            .set_default("playback.settle_ms", default_settle_ms())?
            .set_default("playback.start_grace_ms", default_start_grace_ms())?
            .set_default("playback.state_poll_ms", default_state_poll_ms())?
            .set_default("playback.volume", default_volume() as i64)?
            .set_default("playback.fullscreen", default_fullscreen())?
            .set_default("playback.mock_duration_ms", default_mock_duration_ms())?
            .set_default("display.enabled", default_display_enabled())?
            .set_default("display.x_display", default_x_display())?
            .set_default("display.modes", default_display_modes())?
            .set_default("display.rotate", default_display_rotate())?
            .set_default("system.poll_interval_ms", default_poll_interval_ms())?
            .set_default(
                "system.idle_retry_attempts",
                default_idle_retry_attempts(),
            )?
            .set_default(
                "system.idle_retry_delay_ms",
                default_idle_retry_delay_ms(),
            )?
            .set_default("system.error_pause_ms", default_error_pause_ms())?
            .set_default(
                "system.status_interval_seconds",
                default_status_interval_seconds(),
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with MOTIONPLAY_ prefix
            .add_source(
                Environment::with_prefix("MOTIONPLAY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: MotionplayConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values. Everything rejected here would otherwise
    /// only surface mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Playlist shape
        if self.playlist.units.is_empty() {
            return Err(ConfigError::Message(
                "Playlist must contain at least one unit".to_string(),
            ));
        }

        for (index, unit) in self.playlist.units.iter().enumerate() {
            match (self.playback.mode, unit) {
                (PlaybackMode::Single, UnitConfig::Single { path }) => {
                    if path.trim().is_empty() {
                        return Err(ConfigError::Message(format!(
                            "Playlist unit {} has an empty path",
                            index + 1
                        )));
                    }
                }
                (PlaybackMode::Dual, UnitConfig::Pair { left, right }) => {
                    if left.trim().is_empty() || right.trim().is_empty() {
                        return Err(ConfigError::Message(format!(
                            "Playlist unit {} has an empty left or right path",
                            index + 1
                        )));
                    }
                }
                (mode, _) => {
                    return Err(ConfigError::Message(format!(
                        "Playlist unit {} does not match {} mode",
                        index + 1,
                        mode.as_str()
                    )));
                }
            }
        }

        // Sensor / policy pairing
        match (self.sensor.kind, self.trigger.policy) {
            (SensorKind::Ultrasonic, TriggerPolicyKind::Confirmation) => {
                return Err(ConfigError::Message(
                    "Ultrasonic sensor requires the hysteresis trigger policy".to_string(),
                ));
            }
            (SensorKind::Pir, TriggerPolicyKind::Hysteresis)
            | (SensorKind::Keyboard, TriggerPolicyKind::Hysteresis)
            | (SensorKind::Serial, TriggerPolicyKind::Hysteresis) => {
                return Err(ConfigError::Message(
                    "Presence sensors require the confirmation trigger policy".to_string(),
                ));
            }
            _ => {}
        }

        if self.sensor.kind == SensorKind::Serial {
            if self.sensor.serial_device.is_empty() {
                return Err(ConfigError::Message(
                    "Serial sensor requires sensor.serial_device".to_string(),
                ));
            }
            if !SERIAL_BAUD_RATES.contains(&self.sensor.serial_baud) {
                return Err(ConfigError::Message(format!(
                    "Unsupported serial_baud {}, expected one of {:?}",
                    self.sensor.serial_baud, SERIAL_BAUD_RATES
                )));
            }
        }

        // Trigger settings
        if self.trigger.confirmation_count == 0 {
            return Err(ConfigError::Message(
                "Trigger confirmation_count must be greater than 0".to_string(),
            ));
        }

        if self.trigger.stable_count == 0 {
            return Err(ConfigError::Message(
                "Trigger stable_count must be greater than 0".to_string(),
            ));
        }

        // Comparisons are written so that NaN fails them
        for (name, value) in [
            ("trigger.near_cm", self.trigger.near_cm),
            ("trigger.hysteresis_margin_cm", self.trigger.hysteresis_margin_cm),
            ("sensor.max_distance_cm", self.sensor.max_distance_cm),
        ] {
            if !(value > 0.0 && value <= MAX_DISTANCE_CM) {
                return Err(ConfigError::Message(format!(
                    "{} must be greater than 0 and at most {} cm, got {}",
                    name, MAX_DISTANCE_CM, value
                )));
            }
        }

        for (name, value) in [
            ("trigger.cooldown_seconds", self.trigger.cooldown_seconds),
            ("trigger.extra_cooldown_seconds", self.trigger.extra_cooldown_seconds),
        ] {
            if !(0.0..=MAX_COOLDOWN_SECONDS).contains(&value) {
                return Err(ConfigError::Message(format!(
                    "{} must be between 0 and {} seconds, got {}",
                    name, MAX_COOLDOWN_SECONDS, value
                )));
            }
        }

        if self.sensor.kind == SensorKind::Ultrasonic
            && self.trigger.far_cm() > self.sensor.max_distance_cm
        {
            return Err(ConfigError::Message(format!(
                "Re-arm distance {:.1} cm lies beyond sensor range {:.1} cm",
                self.trigger.far_cm(),
                self.sensor.max_distance_cm
            )));
        }

        if self.sensor.sample_period_ms == 0 {
            return Err(ConfigError::Message(
                "Sensor sample_period_ms must be greater than 0".to_string(),
            ));
        }

        // Playback settings
        if self.playback.state_poll_ms == 0 {
            return Err(ConfigError::Message(
                "Playback state_poll_ms must be greater than 0".to_string(),
            ));
        }

        if self.playback.volume > 100 {
            return Err(ConfigError::Message(
                "Playback volume must be between 0 and 100".to_string(),
            ));
        }

        if self.playback.max_playback_seconds == Some(0) {
            return Err(ConfigError::Message(
                "Playback max_playback_seconds must be greater than 0 when set".to_string(),
            ));
        }

        // System settings
        if self.system.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "System poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.system.idle_retry_attempts == 0 {
            return Err(ConfigError::Message(
                "System idle_retry_attempts must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for MotionplayConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig {
                kind: default_sensor_kind(),
                gpio_root: default_gpio_root(),
                pir_pin: default_pir_pin(),
                trigger_pin: default_trigger_pin(),
                echo_pin: default_echo_pin(),
                max_distance_cm: default_max_distance_cm(),
                echo_timeout_ms: default_echo_timeout_ms(),
                background: default_background(),
                sample_period_ms: default_sample_period_ms(),
                keyboard_hold_ms: default_keyboard_hold_ms(),
                serial_device: default_serial_device(),
                serial_baud: default_serial_baud(),
                serial_hold_ms: default_serial_hold_ms(),
            },
            trigger: TriggerConfig {
                policy: default_trigger_policy(),
                confirmation_count: default_confirmation_count(),
                debounce_ms: default_debounce_ms(),
                near_cm: default_near_cm(),
                hysteresis_margin_cm: default_hysteresis_margin_cm(),
                stable_count: default_stable_count(),
                cooldown_seconds: default_cooldown_seconds(),
                extra_cooldown_seconds: default_extra_cooldown_seconds(),
            },
            playback: PlaybackConfig {
                mode: default_playback_mode(),
                backend: default_player_backend(),
                player_binary: default_player_binary(),
                ipc_dir: default_ipc_dir(),
                settle_ms: default_settle_ms(),
                start_grace_ms: default_start_grace_ms(),
                state_poll_ms: default_state_poll_ms(),
                max_playback_seconds: None,
                volume: default_volume(),
                fullscreen: default_fullscreen(),
                mock_duration_ms: default_mock_duration_ms(),
                screens: Vec::new(),
            },
            playlist: PlaylistConfig::default(),
            display: DisplayConfig {
                enabled: default_display_enabled(),
                x_display: default_x_display(),
                modes: default_display_modes(),
                rotate: default_display_rotate(),
            },
            system: SystemConfig {
                poll_interval_ms: default_poll_interval_ms(),
                idle_retry_attempts: default_idle_retry_attempts(),
                idle_retry_delay_ms: default_idle_retry_delay_ms(),
                error_pause_ms: default_error_pause_ms(),
                status_interval_seconds: default_status_interval_seconds(),
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_sensor_kind() -> SensorKind {
    SensorKind::Pir
}
fn default_gpio_root() -> String {
    "/sys/class/gpio".to_string()
}
fn default_pir_pin() -> u32 {
    14
}
fn default_trigger_pin() -> u32 {
    23
}
fn default_echo_pin() -> u32 {
    24
}
fn default_max_distance_cm() -> f64 {
    200.0
}
fn default_echo_timeout_ms() -> u64 {
    30
}
fn default_background() -> bool {
    false
}
fn default_sample_period_ms() -> u64 {
    30
}
fn default_keyboard_hold_ms() -> u64 {
    1000
}
fn default_serial_device() -> String {
    "/dev/ttyACM0".to_string()
}
fn default_serial_baud() -> u32 {
    9600
}
fn default_serial_hold_ms() -> u64 {
    1000
}

fn default_trigger_policy() -> TriggerPolicyKind {
    TriggerPolicyKind::Confirmation
}
fn default_confirmation_count() -> u32 {
    2
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_near_cm() -> f64 {
    15.0
}
fn default_hysteresis_margin_cm() -> f64 {
    3.0
}
fn default_stable_count() -> u32 {
    3
}
fn default_cooldown_seconds() -> f64 {
    3.0
}
fn default_extra_cooldown_seconds() -> f64 {
    2.0
}

fn default_playback_mode() -> PlaybackMode {
    PlaybackMode::Single
}
fn default_player_backend() -> PlayerBackend {
    PlayerBackend::Mpv
}
fn default_player_binary() -> String {
    "mpv".to_string()
}
fn default_ipc_dir() -> String {
    "/tmp".to_string()
}
fn default_settle_ms() -> u64 {
    500
}
fn default_start_grace_ms() -> u64 {
    1000
}
fn default_state_poll_ms() -> u64 {
    100
}
fn default_volume() -> u8 {
    100
}
fn default_fullscreen() -> bool {
    true
}
fn default_mock_duration_ms() -> u64 {
    5000
}

fn default_display_enabled() -> bool {
    true
}
fn default_x_display() -> String {
    ":0".to_string()
}
fn default_display_modes() -> Vec<String> {
    vec![
        "1280x720".to_string(),
        "1920x1080".to_string(),
        "1024x768".to_string(),
        "848x480".to_string(),
    ]
}
fn default_display_rotate() -> String {
    "left".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}
fn default_idle_retry_attempts() -> u32 {
    3
}
fn default_idle_retry_delay_ms() -> u64 {
    2000
}
fn default_error_pause_ms() -> u64 {
    1000
}
fn default_status_interval_seconds() -> u64 {
    10
}
fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn single_playlist() -> PlaylistConfig {
        PlaylistConfig {
            units: vec![
                UnitConfig::Single {
                    path: "/media/one.mp4".to_string(),
                },
                UnitConfig::Single {
                    path: "/media/two.mp4".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_default_config_needs_playlist() {
        let mut config = MotionplayConfig::default();
        assert!(config.validate().is_err());

        config.playlist = single_playlist();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unit_shape_must_match_mode() {
        let mut config = MotionplayConfig::default();
        config.playlist = single_playlist();
        config.playback.mode = PlaybackMode::Dual;
        assert!(config.validate().is_err());

        config.playlist.units = vec![UnitConfig::Pair {
            left: "/media/l.mp4".to_string(),
            right: "/media/r.mp4".to_string(),
        }];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_must_match_sensor() {
        let mut config = MotionplayConfig::default();
        config.playlist = single_playlist();

        config.sensor.kind = SensorKind::Ultrasonic;
        assert!(config.validate().is_err());

        config.trigger.policy = TriggerPolicyKind::Hysteresis;
        assert!(config.validate().is_ok());

        config.sensor.kind = SensorKind::Pir;
        assert!(config.validate().is_err());

        // No sensor accepts either policy
        config.sensor.kind = SensorKind::None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serial_sensor_settings() {
        let mut config = MotionplayConfig::default();
        config.playlist = single_playlist();
        config.sensor.kind = SensorKind::Serial;
        assert_eq!(config.sensor.serial_baud, 9600);
        assert!(config.validate().is_ok());

        config.sensor.serial_baud = 12345;
        assert!(config.validate().is_err());
        config.sensor.serial_baud = 115200;

        config.sensor.serial_device.clear();
        assert!(config.validate().is_err());
        config.sensor.serial_device = "/dev/ttyUSB0".to_string();

        config.trigger.policy = TriggerPolicyKind::Hysteresis;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rearm_distance_within_range() {
        let mut config = MotionplayConfig::default();
        config.playlist = single_playlist();
        config.sensor.kind = SensorKind::Ultrasonic;
        config.trigger.policy = TriggerPolicyKind::Hysteresis;
        config.trigger.near_cm = 190.0;
        config.trigger.hysteresis_margin_cm = 20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = MotionplayConfig::default();
        config.playlist = single_playlist();

        config.system.poll_interval_ms = 0;
        assert!(config.validate().is_err());
        config.system.poll_interval_ms = 500;

        config.playback.state_poll_ms = 0;
        assert!(config.validate().is_err());
        config.playback.state_poll_ms = 100;

        config.trigger.confirmation_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_and_oversized_floats_rejected() {
        let mut config = MotionplayConfig::default();
        config.playlist = single_playlist();

        for bad in [f64::NAN, f64::INFINITY, 1e19, -1.0] {
            config.trigger.cooldown_seconds = bad;
            assert!(config.validate().is_err(), "cooldown {} accepted", bad);
        }
        config.trigger.cooldown_seconds = 3.0;

        config.trigger.extra_cooldown_seconds = f64::NAN;
        assert!(config.validate().is_err());
        config.trigger.extra_cooldown_seconds = 2.0;

        config.trigger.near_cm = f64::NAN;
        assert!(config.validate().is_err());
        config.trigger.near_cm = 15.0;

        config.trigger.hysteresis_margin_cm = f64::INFINITY;
        assert!(config.validate().is_err());
        config.trigger.hysteresis_margin_cm = 3.0;

        config.sensor.max_distance_cm = f64::NAN;
        assert!(config.validate().is_err());
        config.sensor.max_distance_cm = 200.0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cooldown_conversion_never_panics() {
        let mut config = MotionplayConfig::default();

        config.trigger.cooldown_seconds = f64::NAN;
        assert_eq!(config.trigger.cooldown_period(), Duration::ZERO);

        config.trigger.cooldown_seconds = 1e19;
        config.trigger.extra_cooldown_seconds = f64::INFINITY;
        let cap = Duration::from_secs_f64(2.0 * MAX_COOLDOWN_SECONDS);
        assert_eq!(config.trigger.cooldown_period(), cap);
        assert_eq!(config.trigger.post_playback_margin(), cap);
    }

    #[test]
    fn test_cooldown_period_includes_margin() {
        let config = MotionplayConfig::default();
        assert_eq!(config.trigger.cooldown_period(), Duration::from_secs(5));
        assert_eq!(config.trigger.post_playback_margin(), Duration::from_secs(2));
        assert_eq!(config.trigger.far_cm(), 18.0);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("dual".parse::<PlaybackMode>(), Ok(PlaybackMode::Dual));
        assert_eq!("SINGLE".parse::<PlaybackMode>(), Ok(PlaybackMode::Single));
        assert!("triple".parse::<PlaybackMode>().is_err());
        assert_eq!(PlaybackMode::Dual.fan_out(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[sensor]
kind = "ultrasonic"

[trigger]
policy = "hysteresis"
near_cm = 20.0

[playback]
mode = "dual"
backend = "mock"

[[playlist.units]]
left = "/media/a_left.mp4"
right = "/media/a_right.mp4"

[[playlist.units]]
left = "/media/b_left.mp4"
right = "/media/b_right.mp4"
"#
        )
        .unwrap();

        let config = MotionplayConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.sensor.kind, SensorKind::Ultrasonic);
        assert_eq!(config.trigger.policy, TriggerPolicyKind::Hysteresis);
        assert_eq!(config.trigger.near_cm, 20.0);
        assert_eq!(config.playback.mode, PlaybackMode::Dual);
        assert_eq!(config.playback.backend, PlayerBackend::Mock);
        assert_eq!(config.playlist.units.len(), 2);
        assert_eq!(
            config.playlist.units[1],
            UnitConfig::Pair {
                left: "/media/b_left.mp4".to_string(),
                right: "/media/b_right.mp4".to_string(),
            }
        );
        // Untouched keys keep their defaults
        assert_eq!(config.system.poll_interval_ms, 500);
        assert!(config.validate().is_ok());
    }
}
