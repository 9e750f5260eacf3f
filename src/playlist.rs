use crate::config::{PlaylistConfig, UnitConfig};
use crate::error::{MotionplayError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One playlist entry: a single video, or a left/right pair started together
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableUnit {
    Single(PathBuf),
    Pair { left: PathBuf, right: PathBuf },
}

impl PlayableUnit {
    /// Media paths in screen order (left first)
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            PlayableUnit::Single(path) => vec![path.as_path()],
            PlayableUnit::Pair { left, right } => vec![left.as_path(), right.as_path()],
        }
    }

    /// Number of screens this unit needs
    pub fn fan_out(&self) -> usize {
        match self {
            PlayableUnit::Single(_) => 1,
            PlayableUnit::Pair { .. } => 2,
        }
    }

    /// Paths that do not exist on disk
    pub fn missing_paths(&self) -> Vec<&Path> {
        self.paths().into_iter().filter(|p| !p.exists()).collect()
    }
}

impl From<&UnitConfig> for PlayableUnit {
    fn from(unit: &UnitConfig) -> Self {
        match unit {
            UnitConfig::Single { path } => PlayableUnit::Single(PathBuf::from(path)),
            UnitConfig::Pair { left, right } => PlayableUnit::Pair {
                left: PathBuf::from(left),
                right: PathBuf::from(right),
            },
        }
    }
}

impl fmt::Display for PlayableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayableUnit::Single(path) => write!(f, "{}", path.display()),
            PlayableUnit::Pair { left, right } => {
                write!(f, "left={}, right={}", left.display(), right.display())
            }
        }
    }
}

/// Fixed, non-empty list of units with a circular cursor
#[derive(Debug, Clone)]
pub struct Playlist {
    units: Vec<PlayableUnit>,
    current_index: usize,
}

impl Playlist {
    pub fn new(units: Vec<PlayableUnit>) -> Result<Self> {
        if units.is_empty() {
            return Err(MotionplayError::component(
                "playlist",
                "Playlist must contain at least one unit",
            ));
        }

        Ok(Self {
            units,
            current_index: 0,
        })
    }

    pub fn from_config(config: &PlaylistConfig) -> Result<Self> {
        let playlist = Self::new(config.units.iter().map(PlayableUnit::from).collect())?;

        for (index, unit) in playlist.units.iter().enumerate() {
            for path in unit.missing_paths() {
                warn!(
                    "Playlist unit {} media not found: {}",
                    index + 1,
                    path.display()
                );
            }
        }

        Ok(playlist)
    }

    pub fn current(&self) -> &PlayableUnit {
        &self.units[self.current_index]
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Move to the next unit, wrapping at the end. Called after every
    /// playback attempt whatever its outcome, so a broken unit is skipped.
    pub fn advance(&mut self) {
        self.current_index = (self.current_index + 1) % self.units.len();
        debug!(
            "Rotated to unit {} of {}",
            self.current_index + 1,
            self.units.len()
        );
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[PlayableUnit] {
        &self.units
    }
}
