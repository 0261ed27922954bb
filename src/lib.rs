//! Beat Bubble - a webcam rhythm game
//!
//! Core modules:
//! - `game`: Timing and gameplay core (beat schedule, targets, hit-testing, session)
//! - `platform`: Collaborator traits (audio clock, camera, pose model, presenter)
//! - `runtime`: Native two-thread driver for a session
//! - `settings`: Data-driven configuration
//! - `highscores`: Leaderboard of finished sessions

#[cfg(target_arch = "wasm32")]
pub mod audio;
pub mod error;
pub mod game;
pub mod highscores;
pub mod platform;
#[cfg(not(target_arch = "wasm32"))]
pub mod runtime;
pub mod settings;

pub use error::{GameError, Result};
pub use highscores::HighScores;
pub use settings::{DetectionMode, Settings};

/// Game configuration defaults
pub mod consts {
    /// Wall-clock interval between beat timer polls
    pub const BEAT_POLL_INTERVAL_MS: u64 = 500;
    /// Beats advanced per spawn ("next actionable beat")
    pub const BEAT_STEP: usize = 3;

    /// Native detection pacing (~60 Hz display refresh)
    pub const FRAME_INTERVAL_MS: u64 = 16;

    /// Camera frame size requested from the device
    pub const VIDEO_WIDTH: u32 = 1200;
    pub const VIDEO_HEIGHT: u32 = 1000;

    /// Range bubbles are drawn from (pixels)
    pub const PLAYFIELD_WIDTH: f32 = 1300.0;
    pub const PLAYFIELD_HEIGHT: f32 = 800.0;

    /// Hit box as a fraction of the bubble coordinates
    pub const HIT_ENVELOPE_INNER: f32 = 0.7;
    pub const HIT_ENVELOPE_OUTER: f32 = 1.3;

    /// Poses below this overall score are not drawn
    pub const MIN_POSE_CONFIDENCE: f32 = 0.3;
    /// Upper bound of poses evaluated in multi-pose mode
    pub const MAX_POSE_DETECTIONS: usize = 2;
}
