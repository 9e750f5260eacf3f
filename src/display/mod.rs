mod xrandr;
#[cfg(test)]
mod tests;

pub use xrandr::{parse_connected_outputs, XrandrDisplay};

use crate::config::{DisplayConfig, PlaybackMode};
use async_trait::async_trait;
use tracing::info;

/// Puts the physical outputs into the layout a playback mode needs
#[async_trait]
pub trait DisplayPreparer: Send + Sync {
    /// Configure the outputs. False when nothing usable could be applied;
    /// playback still proceeds on whatever layout is active.
    async fn prepare(&self, mode: PlaybackMode) -> bool;

    fn name(&self) -> &'static str;
}

/// Leaves the outputs untouched
#[derive(Debug, Default)]
pub struct NoopDisplay;

#[async_trait]
impl DisplayPreparer for NoopDisplay {
    async fn prepare(&self, mode: PlaybackMode) -> bool {
        info!("Display preparation disabled ({} mode)", mode.as_str());
        true
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

pub fn build_display(config: &DisplayConfig) -> Box<dyn DisplayPreparer> {
    if config.enabled {
        Box::new(XrandrDisplay::new(config))
    } else {
        Box::new(NoopDisplay)
    }
}
