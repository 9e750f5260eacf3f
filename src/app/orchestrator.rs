use super::types::{ComponentState, OrchestratorStats, ShutdownReason};
use crate::config::{MotionplayConfig, PlaybackMode, SensorKind};
use crate::display::{build_display, DisplayPreparer};
use crate::error::Result;
use crate::events::{EventBus, MotionplayEvent};
use crate::playlist::Playlist;
use crate::recovery::RecoveryConfig;
use crate::sensor::{build_sensor, TriggerSource};
use crate::session::MediaSession;
use crate::trigger::{build_policy, CooldownGate};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

/// Apply the display layout for `mode`, then run `open_players`, so player
/// windows land on the outputs the layout just configured.
pub(super) async fn prepare_display_then<T, F, Fut>(
    display: &dyn DisplayPreparer,
    mode: PlaybackMode,
    open_players: F,
) -> (bool, T)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let prepared = display.prepare(mode).await;
    if !prepared {
        let display_name = display.name();
        warn!(
            "Display preparation via {} failed, continuing with current layout",
            display_name
        );
    }
    (prepared, open_players().await)
}

/// Owns every component and runs the sense, fire, play, rotate cycle
pub struct MotionplayOrchestrator {
    pub(super) config: MotionplayConfig,
    pub(super) event_bus: Arc<EventBus>,

    // Components
    pub(super) trigger: TriggerSource,
    pub(super) gate: CooldownGate,
    pub(super) session: Arc<MediaSession>,
    pub(super) playlist: Playlist,
    pub(super) display: Box<dyn DisplayPreparer>,
    pub(super) display_prepared: Option<bool>,
    pub(super) idle_retry: RecoveryConfig,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_reason: Arc<Mutex<Option<ShutdownReason>>>,
    pub(super) cancellation_token: CancellationToken,

    // Loop bookkeeping
    pub(super) stats: OrchestratorStats,
    pub(super) idle_ready: bool,
    pub(super) last_motion: bool,
    pub(super) last_status_at: Instant,
}

impl MotionplayOrchestrator {
    /// Build every component from configuration
    pub async fn new(config: MotionplayConfig) -> Result<Self> {
        let display = build_display(&config.display);
        Self::with_display(config, display).await
    }

    /// Build every component from configuration around an existing display
    /// preparer. The layout is applied before any player is spawned.
    pub async fn with_display(
        config: MotionplayConfig,
        display: Box<dyn DisplayPreparer>,
    ) -> Result<Self> {
        config.validate()?;

        let cancellation_token = CancellationToken::new();
        let capacity = config.system.event_bus_capacity;
        let event_bus = Arc::new(if tracing::enabled!(Level::DEBUG) {
            EventBus::with_debug_logging(capacity)
        } else {
            EventBus::new(capacity)
        });

        let sensor = build_sensor(&config.sensor, Arc::clone(&event_bus));
        if sensor.kind() != config.sensor.kind {
            warn!(
                "Configured {:?} sensor unavailable, running with {:?}",
                config.sensor.kind,
                sensor.kind()
            );
        }

        let policy = build_policy(&config.trigger);
        let trigger = if config.sensor.background {
            TriggerSource::spawn_background(
                sensor,
                policy,
                config.sensor.sample_period(),
                &cancellation_token,
            )?
        } else {
            TriggerSource::inline(sensor, policy)
        };

        let (prepared, session) = prepare_display_then(&*display, config.playback.mode, || {
            MediaSession::from_config(&config.playback, cancellation_token.clone())
        })
        .await;
        let session = session?;

        let mut orchestrator = Self::with_components(
            config,
            event_bus,
            trigger,
            session,
            display,
            cancellation_token,
        )?;
        orchestrator.display_prepared = Some(prepared);
        Ok(orchestrator)
    }

    /// Assemble an orchestrator from already built components. The session
    /// must have been created with `cancellation_token`.
    pub fn with_components(
        config: MotionplayConfig,
        event_bus: Arc<EventBus>,
        trigger: TriggerSource,
        session: MediaSession,
        display: Box<dyn DisplayPreparer>,
        cancellation_token: CancellationToken,
    ) -> Result<Self> {
        let playlist = Playlist::from_config(&config.playlist)?;
        let gate = CooldownGate::from_config(&config.trigger);
        let idle_retry = RecoveryConfig::idle_frame(&config.system);

        let display_name = display.name();
        info!(
            "Orchestrator ready: {} unit(s), {} mode, {:?} trigger, display {}",
            playlist.len(),
            config.playback.mode.as_str(),
            trigger.kind(),
            display_name
        );

        Ok(Self {
            config,
            event_bus,
            trigger,
            gate,
            session: Arc::new(session),
            playlist,
            display,
            display_prepared: None,
            idle_retry,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_reason: Arc::new(Mutex::new(None)),
            cancellation_token,
            stats: OrchestratorStats::default(),
            idle_ready: false,
            last_motion: false,
            last_status_at: Instant::now(),
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn session(&self) -> Arc<MediaSession> {
        Arc::clone(&self.session)
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    pub fn stats(&self) -> &OrchestratorStats {
        &self.stats
    }

    pub fn is_idle_ready(&self) -> bool {
        self.idle_ready
    }

    /// Whether the trigger is running on a real sensor
    pub fn has_sensor(&self) -> bool {
        self.trigger.kind() != SensorKind::None
    }

    /// Publish, logging instead of failing when the bus rejects the event
    pub(super) fn publish(&self, event: MotionplayEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            warn!("Failed to publish event: {}", e);
        }
    }
}
