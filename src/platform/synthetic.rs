//! Synthetic camera and performer for headless runs
//!
//! The performer sweeps its right wrist across the playfield on a Lissajous
//! path, so bubbles get hit now and then without a webcam.

use glam::Vec2;

use super::{FrameSource, PoseModel, Presenter};
use crate::error::{GameError, Result};
use crate::game::{BodyPart, Keypoint, Pose, SessionSnapshot};

/// A fake video frame: just its sequence number and capture time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticFrame {
    pub index: u64,
    /// Seconds since the camera started
    pub time: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    fps: f64,
    connected: bool,
    started: bool,
    next_index: u64,
}

impl SyntheticCamera {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            connected: true,
            started: false,
            next_index: 0,
        }
    }

    /// A camera that refuses to start, like a missing device
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new(60.0)
        }
    }
}

impl FrameSource for SyntheticCamera {
    type Frame = SyntheticFrame;

    fn start(&mut self) -> Result<()> {
        if !self.connected {
            return Err(GameError::CameraUnavailable("no synthetic device".into()));
        }
        self.started = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<SyntheticFrame> {
        if !self.started {
            return Err(GameError::DetectionFrameFailed("camera not started".into()));
        }
        let frame = SyntheticFrame {
            index: self.next_index,
            time: self.next_index as f64 / self.fps,
        };
        self.next_index += 1;
        Ok(frame)
    }
}

/// Pose model that invents a performer
#[derive(Debug, Clone)]
pub struct SyntheticPerformer {
    playfield: Vec2,
    /// Angular speeds of the wrist path on each axis (rad/s)
    speed: Vec2,
    /// Every n-th frame fails to estimate
    fail_every: Option<u64>,
    loaded: bool,
}

impl SyntheticPerformer {
    pub fn new(playfield: Vec2) -> Self {
        Self {
            playfield,
            speed: Vec2::new(1.3, 1.7),
            fail_every: None,
            loaded: false,
        }
    }

    pub fn with_failures(mut self, every: u64) -> Self {
        self.fail_every = Some(every.max(1));
        self
    }

    /// Wrist position at time `t`
    pub fn wrist_at(&self, t: f64) -> Vec2 {
        let half = self.playfield * 0.5;
        let t = t as f32;
        Vec2::new(
            half.x + half.x * (self.speed.x * t).sin(),
            half.y + half.y * (self.speed.y * t).sin(),
        )
    }

    fn pose_at(&self, t: f64, offset: Vec2) -> Result<Pose> {
        let wrist = self.wrist_at(t) + offset;
        let shoulder = Vec2::new(self.playfield.x * 0.5, self.playfield.y * 0.3) + offset;
        let keypoints = BodyPart::ALL.iter().map(|&part| {
            let p = match part {
                BodyPart::RightWrist => wrist,
                BodyPart::RightElbow => shoulder.lerp(wrist, 0.5),
                _ => shoulder,
            };
            Keypoint {
                part,
                position: p,
                confidence: 0.9,
            }
        });
        Pose::from_keypoints(0.9, keypoints)
    }

    fn check_frame(&self, frame: &SyntheticFrame) -> Result<()> {
        if !self.loaded {
            return Err(GameError::ModelUnavailable("model not loaded".into()));
        }
        match self.fail_every {
            Some(n) if frame.index % n == n - 1 => Err(GameError::DetectionFrameFailed(
                format!("synthetic failure on frame {}", frame.index),
            )),
            _ => Ok(()),
        }
    }
}

impl PoseModel<SyntheticFrame> for SyntheticPerformer {
    fn load(&mut self) -> Result<()> {
        self.loaded = true;
        Ok(())
    }

    fn estimate_single_pose(&mut self, frame: &SyntheticFrame) -> Result<Pose> {
        self.check_frame(frame)?;
        self.pose_at(frame.time, Vec2::ZERO)
    }

    fn estimate_multiple_poses(
        &mut self,
        frame: &SyntheticFrame,
        max_poses: usize,
    ) -> Result<Vec<Pose>> {
        self.check_frame(frame)?;
        // Extra performers stand side by side
        (0..max_poses)
            .map(|i| self.pose_at(frame.time, Vec2::new(i as f32 * 40.0, 0.0)))
            .collect()
    }
}

/// Presenter that logs the HUD state
#[derive(Debug, Default)]
pub struct LogPresenter {
    last_score: u64,
    frames: u64,
}

impl Presenter for LogPresenter {
    fn present(&mut self, poses: &[Pose], view: &SessionSnapshot) {
        self.frames += 1;
        if view.score != self.last_score {
            log::info!("Score: {}", view.score);
            self.last_score = view.score;
        }
        if let Some(target) = view.target {
            log::trace!(
                "Frame {}: {} poses, bubble {} at ({:.0}, {:.0})",
                self.frames,
                poses.len(),
                target.id,
                target.target.bubble.x,
                target.target.bubble.y
            );
        }
    }
}
