//! Game rules and audio preferences
//!
//! Loaded from a JSON file; every field falls back to the reference value.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::secs_to_ticks;

/// Why a settings file could not be used
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "failed to read settings: {}", e),
            SettingsError::Parse(e) => write!(f, "failed to parse settings: {}", e),
            SettingsError::Invalid(msg) => write!(f, "invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(e) => Some(e),
            SettingsError::Parse(e) => Some(e),
            SettingsError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Parse(e)
    }
}

/// Session rules and preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Container ===
    /// A settled block above this height ends the run
    pub limit_height: f32,
    /// A settled block above this height shows the warning line
    pub warning_height: f32,
    /// Height of the rail the preview block slides along
    pub drop_rail_y: f32,
    /// Aim is clamped to +/- this value
    pub container_half_width: f32,

    // === Ranks ===
    /// Preview ranks are drawn from 1..=preview_rank_max
    pub preview_rank_max: u8,
    /// Terminal rank; blocks at this rank never merge
    pub max_rank: u8,

    // === Pacing (seconds) ===
    pub removal_delay: f32,
    pub merge_delay: f32,
    pub drop_cooldown: f32,
    pub game_over_grace: f32,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit_height: LIMIT_HEIGHT,
            warning_height: WARNING_HEIGHT,
            drop_rail_y: DROP_RAIL_Y,
            container_half_width: CONTAINER_HALF_WIDTH,

            preview_rank_max: PREVIEW_RANK_MAX,
            max_rank: MAX_RANK,

            removal_delay: REMOVAL_DELAY,
            merge_delay: MERGE_DELAY,
            drop_cooldown: DROP_COOLDOWN,
            game_over_grace: GAME_OVER_GRACE,

            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

impl Settings {
    /// Parse and validate settings from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Check the cross-field rules the session relies on
    pub fn validate(&self) -> Result<(), SettingsError> {
        let finite = [
            ("limit_height", self.limit_height),
            ("warning_height", self.warning_height),
            ("drop_rail_y", self.drop_rail_y),
            ("container_half_width", self.container_half_width),
            ("removal_delay", self.removal_delay),
            ("merge_delay", self.merge_delay),
            ("drop_cooldown", self.drop_cooldown),
            ("game_over_grace", self.game_over_grace),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SettingsError::Invalid(format!("{name} must be finite, got {value}")));
        }
        if self.limit_height <= self.warning_height {
            return Err(SettingsError::Invalid(format!(
                "limit_height ({}) must be above warning_height ({})",
                self.limit_height, self.warning_height
            )));
        }
        if self.preview_rank_max == 0 {
            return Err(SettingsError::Invalid("preview_rank_max must be at least 1".into()));
        }
        if self.max_rank < self.preview_rank_max {
            return Err(SettingsError::Invalid(format!(
                "max_rank ({}) is below preview_rank_max ({})",
                self.max_rank, self.preview_rank_max
            )));
        }
        if self.container_half_width <= 0.0 {
            return Err(SettingsError::Invalid("container_half_width must be positive".into()));
        }
        if self.merge_ticks() <= self.removal_ticks() {
            return Err(SettingsError::Invalid(format!(
                "merge_delay ({}s) must outlast removal_delay ({}s)",
                self.merge_delay, self.removal_delay
            )));
        }
        Ok(())
    }

    pub fn removal_ticks(&self) -> u64 {
        secs_to_ticks(self.removal_delay)
    }

    pub fn merge_ticks(&self) -> u64 {
        secs_to_ticks(self.merge_delay)
    }

    pub fn cooldown_ticks(&self) -> u64 {
        secs_to_ticks(self.drop_cooldown)
    }

    pub fn game_over_ticks(&self) -> u64 {
        secs_to_ticks(self.game_over_grace)
    }
}
