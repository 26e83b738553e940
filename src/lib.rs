//! Merge Drop - a watermelon-style merge/drop puzzle engine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (merge arbitration, scoring, height monitor)
//! - `settings`: Data-driven rule configuration
//! - `audio`: Sound effect routing to the host audio backend
//! - `host`: Presentation collaborator and event dispatch

pub mod audio;
pub mod host;
pub mod settings;
pub mod sim;

pub use audio::{AudioManager, AudioSink, SoundEffect};
pub use host::{Presenter, dispatch_events};
pub use settings::{Settings, SettingsError};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, matches the host frame rate)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Vertical coordinate of the drop rail the preview block slides along
    pub const DROP_RAIL_Y: f32 = 530.0;
    /// Half the container width; aim is clamped to +/- this value
    pub const CONTAINER_HALF_WIDTH: f32 = 320.0;

    /// A settled block above this height ends the run
    pub const LIMIT_HEIGHT: f32 = 430.0;
    /// A settled block above this height shows the warning line
    pub const WARNING_HEIGHT: f32 = 280.0;

    /// Preview ranks are drawn uniformly from 1..=PREVIEW_RANK_MAX
    pub const PREVIEW_RANK_MAX: u8 = 5;
    /// Highest rank with a defined tier; blocks at this rank never merge
    pub const MAX_RANK: u8 = 11;

    /// Delay before a merging block is removed (seconds)
    pub const REMOVAL_DELAY: f32 = 0.05;
    /// Delay before the successor block spawns (seconds, longer than removal)
    pub const MERGE_DELAY: f32 = 0.1;
    /// Pause between a drop and the next preview (seconds)
    pub const DROP_COOLDOWN: f32 = 0.75;
    /// Grace period between crossing the limit and game over (seconds)
    pub const GAME_OVER_GRACE: f32 = 1.0;
}

/// Convert a delay in seconds to whole simulation ticks (rounded up, at least one)
#[inline]
pub fn secs_to_ticks(secs: f32) -> u64 {
    ((secs / consts::SIM_DT) - 1e-4).ceil().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_to_ticks() {
        assert_eq!(secs_to_ticks(0.05), 3);
        assert_eq!(secs_to_ticks(0.1), 6);
        assert_eq!(secs_to_ticks(1.0), 60);
        assert_eq!(secs_to_ticks(0.0), 1);
    }

    #[test]
    fn test_merge_delay_outlasts_removal() {
        assert!(secs_to_ticks(consts::MERGE_DELAY) > secs_to_ticks(consts::REMOVAL_DELAY));
    }
}
