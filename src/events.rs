use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the motionplay system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MotionplayEvent {
    /// The trigger filter confirmed motion while the gate was armed
    MotionConfirmed { timestamp: SystemTime },
    /// Motion was confirmed during cooldown and ignored
    MotionIgnored { timestamp: SystemTime },
    /// A playlist unit started playing
    PlaybackStarted {
        playback_id: String,
        index: usize,
        timestamp: SystemTime,
    },
    /// A playlist unit finished (completed, failed, timed out or aborted)
    PlaybackFinished {
        playback_id: String,
        index: usize,
        outcome: String,
        timestamp: SystemTime,
    },
    /// Idle first frame is showing for a playlist unit
    IdleFramePrepared { index: usize, timestamp: SystemTime },
    /// Idle first frame could not be shown after all retries
    IdleFrameDegraded { index: usize, attempts: u32 },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl MotionplayEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            MotionplayEvent::MotionConfirmed { timestamp } => *timestamp,
            MotionplayEvent::MotionIgnored { timestamp } => *timestamp,
            MotionplayEvent::PlaybackStarted { timestamp, .. } => *timestamp,
            MotionplayEvent::PlaybackFinished { timestamp, .. } => *timestamp,
            MotionplayEvent::IdleFramePrepared { timestamp, .. } => *timestamp,
            MotionplayEvent::IdleFrameDegraded { .. } => SystemTime::now(),
            MotionplayEvent::SystemError { .. } => SystemTime::now(),
            MotionplayEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            MotionplayEvent::MotionConfirmed { .. } => "Motion confirmed".to_string(),
            MotionplayEvent::MotionIgnored { .. } => {
                "Motion ignored during cooldown".to_string()
            }
            MotionplayEvent::PlaybackStarted {
                playback_id, index, ..
            } => {
                format!("Playback {} started for unit {}", playback_id, index + 1)
            }
            MotionplayEvent::PlaybackFinished {
                playback_id,
                index,
                outcome,
                ..
            } => {
                format!(
                    "Playback {} of unit {} finished: {}",
                    playback_id,
                    index + 1,
                    outcome
                )
            }
            MotionplayEvent::IdleFramePrepared { index, .. } => {
                format!("Idle frame showing for unit {}", index + 1)
            }
            MotionplayEvent::IdleFrameDegraded { index, attempts } => {
                format!(
                    "Idle frame for unit {} unavailable after {} attempts",
                    index + 1,
                    attempts
                )
            }
            MotionplayEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            MotionplayEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            MotionplayEvent::MotionConfirmed { .. } => "motion_confirmed",
            MotionplayEvent::MotionIgnored { .. } => "motion_ignored",
            MotionplayEvent::PlaybackStarted { .. } => "playback_started",
            MotionplayEvent::PlaybackFinished { .. } => "playback_finished",
            MotionplayEvent::IdleFramePrepared { .. } => "idle_frame_prepared",
            MotionplayEvent::IdleFrameDegraded { .. } => "idle_frame_degraded",
            MotionplayEvent::SystemError { .. } => "system_error",
            MotionplayEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<MotionplayEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<MotionplayEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers. Having no subscribers is not an
    /// error; the event is simply dropped.
    pub fn publish(&self, event: MotionplayEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            MotionplayEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            MotionplayEvent::IdleFrameDegraded { .. } => {
                warn!("{}", event.description());
            }
            MotionplayEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&MotionplayEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &MotionplayEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<MotionplayEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<MotionplayEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event. Lagging is logged and skipped.
    pub async fn recv(&mut self) -> Result<MotionplayEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<MotionplayEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        let delivered = bus
            .publish(MotionplayEvent::MotionConfirmed {
                timestamp: SystemTime::now(),
            })
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_filtered_receiver_skips_other_events() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["playback_finished"]),
            "test",
        );

        bus.publish(MotionplayEvent::MotionConfirmed {
            timestamp: SystemTime::now(),
        })
        .unwrap();
        bus.publish(MotionplayEvent::PlaybackFinished {
            playback_id: "abc".to_string(),
            index: 1,
            outcome: "completed".to_string(),
            timestamp: SystemTime::now(),
        })
        .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "playback_finished");
        assert_eq!(
            event.description(),
            "Playback abc of unit 2 finished: completed"
        );
        assert!(receiver.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_custom_filter() {
        let filter = EventFilter::Custom(|event| {
            matches!(event, MotionplayEvent::ShutdownRequested { .. })
        });
        assert!(filter.matches(&MotionplayEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "test".to_string(),
        }));
        assert!(!filter.matches(&MotionplayEvent::MotionIgnored {
            timestamp: SystemTime::now(),
        }));
    }
}
