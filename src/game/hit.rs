//! Keypoint-in-target hit testing

use glam::Vec2;

use super::pose::{BodyPart, Pose};
use super::target::ActiveTarget;

/// Result of testing one pose against the published target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitResult {
    /// Tracked keypoint is strictly inside the target
    Hit { position: Vec2 },
    Miss,
}

impl HitResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, HitResult::Hit { .. })
    }
}

/// Decides whether the tracked keypoint touches the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTester {
    /// Keypoint that has to enter the bubble
    pub keypoint: BodyPart,
    /// Optional per-keypoint confidence gate; `None` accepts any confidence
    pub min_confidence: Option<f32>,
}

impl Default for HitTester {
    fn default() -> Self {
        Self {
            keypoint: BodyPart::RightWrist,
            min_confidence: None,
        }
    }
}

impl HitTester {
    pub fn new(keypoint: BodyPart, min_confidence: Option<f32>) -> Self {
        Self {
            keypoint,
            min_confidence,
        }
    }

    /// Pure check; applying the hit (score, clearing) is up to the session
    pub fn test(&self, pose: &Pose, target: Option<&ActiveTarget>) -> HitResult {
        let Some(target) = target else {
            return HitResult::Miss;
        };

        let kp = pose.keypoint(self.keypoint);
        if let Some(threshold) = self.min_confidence {
            if !kp.is_confident(threshold) {
                return HitResult::Miss;
            }
        }

        if target.bounds().contains(kp.position) {
            HitResult::Hit {
                position: kp.position,
            }
        } else {
            HitResult::Miss
        }
    }
}
