//! Error types shared by the game core and its platform shells

use thiserror::Error;

/// Everything that can go wrong while setting up or running a session
#[derive(Error, Debug)]
pub enum GameError {
    /// Audio collaborator not ready when a session was started
    #[error("audio clock is not ready")]
    ClockUnavailable,

    /// No camera, or camera permission denied
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Pose model could not be loaded
    #[error("pose model unavailable: {0}")]
    ModelUnavailable(String),

    /// A single frame could not be read or estimated
    #[error("detection frame failed: {0}")]
    DetectionFrameFailed(String),

    /// Model output did not describe a full pose
    #[error("malformed pose: {0}")]
    MalformedPose(String),

    /// Beat offsets were negative, non-finite or out of order
    #[error("invalid beat schedule: {0}")]
    InvalidSchedule(String),

    /// Settings failed validation
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for game operations
pub type Result<T> = std::result::Result<T, GameError>;
