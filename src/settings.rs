//! Game settings
//!
//! Persisted in LocalStorage on the web, as a JSON file on native.
//! Missing fields fall back to defaults, so partial files are fine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{GameError, Result};
use crate::game::{BeatSchedule, BodyPart, HitEnvelope};

/// Pose detection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMode {
    /// One performer; the only mode that scores
    #[default]
    SinglePose,
    /// Several performers, drawn only
    MultiPose,
}

impl DetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::SinglePose => "single-pose",
            DetectionMode::MultiPose => "multi-pose",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "single-pose" | "single" => Some(DetectionMode::SinglePose),
            "multi-pose" | "multi" => Some(DetectionMode::MultiPose),
            _ => None,
        }
    }
}

/// Parameters forwarded to the pose model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// MobileNet multiplier (0.5 on mobile, 1.01 otherwise)
    pub architecture: f32,
    pub image_scale_factor: f32,
    pub output_stride: u32,
    /// Mirror the webcam image
    pub flip_horizontal: bool,
    pub max_pose_detections: usize,
    pub min_part_confidence: f32,
    pub nms_radius: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            architecture: 1.01,
            image_scale_factor: 0.2,
            output_stride: 32,
            flip_horizontal: true,
            max_pose_detections: MAX_POSE_DETECTIONS,
            min_part_confidence: 0.5,
            nms_radius: 20.0,
        }
    }
}

/// Where the beat grid comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BeatSource {
    /// Explicit offsets in seconds
    Offsets(BeatSchedule),
    /// Regular grid from tempo metadata
    Tempo {
        bpm: f64,
        #[serde(default)]
        first_beat: f64,
        duration: f64,
    },
}

impl BeatSource {
    pub fn schedule(&self) -> Result<BeatSchedule> {
        match self {
            BeatSource::Offsets(schedule) => Ok(schedule.clone()),
            BeatSource::Tempo {
                bpm,
                first_beat,
                duration,
            } => BeatSchedule::from_tempo(*bpm, *first_beat, *duration),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongSettings {
    pub url: String,
    pub beats: BeatSource,
}

impl Default for SongSettings {
    fn default() -> Self {
        Self {
            url: "/songs/dancingqueen.m4a".to_string(),
            beats: BeatSource::Tempo {
                bpm: 100.0,
                first_beat: 0.5,
                duration: 230.0,
            },
        }
    }
}

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: DetectionMode,

    // === Camera ===
    pub video_width: u32,
    pub video_height: u32,

    // === Targets ===
    /// Bubbles are drawn from [0, width) x [0, height)
    pub playfield_width: f32,
    pub playfield_height: f32,
    pub hit_envelope: HitEnvelope,
    /// Keypoint that scores
    pub hit_keypoint: BodyPart,
    /// Confidence gate on the scoring keypoint (off when `None`)
    pub min_keypoint_confidence: Option<f32>,
    /// Poses below this score are not drawn
    pub min_pose_confidence: f32,

    // === Timing ===
    pub poll_interval_ms: u64,
    /// Beats skipped per spawn
    pub beat_step: usize,
    /// Native detection pacing
    pub frame_interval_ms: u64,

    pub model: ModelSettings,
    pub song: SongSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: DetectionMode::SinglePose,

            video_width: VIDEO_WIDTH,
            video_height: VIDEO_HEIGHT,

            playfield_width: PLAYFIELD_WIDTH,
            playfield_height: PLAYFIELD_HEIGHT,
            hit_envelope: HitEnvelope::default(),
            hit_keypoint: BodyPart::RightWrist,
            min_keypoint_confidence: None,
            min_pose_confidence: MIN_POSE_CONFIDENCE,

            poll_interval_ms: BEAT_POLL_INTERVAL_MS,
            beat_step: BEAT_STEP,
            frame_interval_ms: FRAME_INTERVAL_MS,

            model: ModelSettings::default(),
            song: SongSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(GameError::InvalidSettings(msg.to_string()));

        if !(self.playfield_width > 0.0 && self.playfield_height > 0.0)
            || !self.playfield_width.is_finite()
            || !self.playfield_height.is_finite()
        {
            return invalid("playfield must be positive");
        }
        if self.video_width == 0 || self.video_height == 0 {
            return invalid("video size must be positive");
        }
        if !self.hit_envelope.is_valid() {
            return invalid("hit envelope needs 0 <= inner < outer");
        }
        if let Some(c) = self.min_keypoint_confidence {
            if !(0.0..=1.0).contains(&c) {
                return invalid("keypoint confidence gate must be in [0, 1]");
            }
        }
        if self.beat_step == 0 {
            return invalid("beat_step must be at least 1");
        }
        if self.poll_interval_ms == 0 || self.frame_interval_ms == 0 {
            return invalid("intervals must be at least 1 ms");
        }
        if self.model.max_pose_detections == 0 {
            return invalid("max_pose_detections must be at least 1");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Beat grid for the configured song
    pub fn schedule(&self) -> Result<BeatSchedule> {
        self.song.beats.schedule()
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "beat_bubble_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        match crate::platform::web::load_local::<Settings>(Self::STORAGE_KEY) {
            Some(settings) if settings.validate().is_ok() => {
                log::info!("Loaded settings from LocalStorage");
                settings
            }
            Some(_) => {
                log::warn!("Stored settings are invalid, using defaults");
                Self::default()
            }
            None => Self::default(),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        if crate::platform::web::save_local(Self::STORAGE_KEY, self) {
            log::info!("Settings saved");
        }
    }

    /// Read and validate a JSON settings file
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let settings: Settings = crate::platform::native::read_json(path)?.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })?;
        settings.validate()?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        crate::platform::native::write_json(path, self)
    }
}
