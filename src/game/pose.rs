//! Pose and keypoint types as produced by the pose model
//!
//! Serialized in PoseNet's JSON shape so web model output can be parsed
//! directly.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// The 17 PoseNet body parts, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(usize)]
pub enum BodyPart {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl BodyPart {
    pub const COUNT: usize = 17;

    pub const ALL: [BodyPart; BodyPart::COUNT] = [
        BodyPart::Nose,
        BodyPart::LeftEye,
        BodyPart::RightEye,
        BodyPart::LeftEar,
        BodyPart::RightEar,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftKnee,
        BodyPart::RightKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// A single tracked body-part location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: BodyPart,
    /// Frame pixel coordinates
    #[serde(with = "xy")]
    pub position: Vec2,
    /// Model confidence in [0, 1]
    #[serde(rename = "score")]
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(part: BodyPart, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            part,
            position: Vec2::new(x, y),
            confidence,
        }
    }

    /// Confidence at or above threshold
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

/// A full body pose: one keypoint per body part plus an overall score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPose", into = "RawPose")]
pub struct Pose {
    keypoints: [Keypoint; BodyPart::COUNT],
    pub score: f32,
}

impl Pose {
    /// Build a pose from keypoints in any order. Every part must appear once.
    pub fn from_keypoints(
        score: f32,
        keypoints: impl IntoIterator<Item = Keypoint>,
    ) -> Result<Self, GameError> {
        let mut slots: [Option<Keypoint>; BodyPart::COUNT] = [None; BodyPart::COUNT];
        for kp in keypoints {
            let slot = &mut slots[kp.part.index()];
            if slot.is_some() {
                return Err(GameError::MalformedPose(format!(
                    "duplicate keypoint {:?}",
                    kp.part
                )));
            }
            *slot = Some(kp);
        }

        let mut out = [Keypoint::new(BodyPart::Nose, 0.0, 0.0, 0.0); BodyPart::COUNT];
        for (part, slot) in BodyPart::ALL.iter().zip(slots) {
            out[part.index()] = slot
                .ok_or_else(|| GameError::MalformedPose(format!("missing keypoint {:?}", part)))?;
        }
        Ok(Self {
            keypoints: out,
            score,
        })
    }

    /// Keypoint for a body part
    #[inline]
    pub fn keypoint(&self, part: BodyPart) -> &Keypoint {
        &self.keypoints[part.index()]
    }

    pub fn keypoints(&self) -> &[Keypoint; BodyPart::COUNT] {
        &self.keypoints
    }

    /// Mean keypoint confidence
    pub fn average_confidence(&self) -> f32 {
        let sum: f32 = self.keypoints.iter().map(|k| k.confidence).sum();
        sum / BodyPart::COUNT as f32
    }
}

/// Wire shape of a pose (keypoints as a list)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPose {
    score: f32,
    keypoints: Vec<Keypoint>,
}

impl TryFrom<RawPose> for Pose {
    type Error = GameError;

    fn try_from(raw: RawPose) -> Result<Self, Self::Error> {
        Pose::from_keypoints(raw.score, raw.keypoints)
    }
}

impl From<Pose> for RawPose {
    fn from(pose: Pose) -> Self {
        RawPose {
            score: pose.score,
            keypoints: pose.keypoints.to_vec(),
        }
    }
}

/// `Vec2` as `{ "x": .., "y": .. }`
mod xy {
    use glam::Vec2;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xy {
        x: f32,
        y: f32,
    }

    pub fn serialize<S: Serializer>(v: &Vec2, s: S) -> Result<S::Ok, S::Error> {
        Xy { x: v.x, y: v.y }.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec2, D::Error> {
        let Xy { x, y } = Xy::deserialize(d)?;
        Ok(Vec2::new(x, y))
    }
}

/// Test helper: a pose with every keypoint at `rest`, except the listed overrides
#[cfg(test)]
pub(crate) fn pose_with(rest: Vec2, overrides: &[Keypoint]) -> Pose {
    let keypoints = BodyPart::ALL.iter().map(|&part| {
        overrides
            .iter()
            .find(|k| k.part == part)
            .copied()
            .unwrap_or(Keypoint {
                part,
                position: rest,
                confidence: 0.9,
            })
    });
    Pose::from_keypoints(0.9, keypoints).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_part_index_roundtrip() {
        for (i, part) in BodyPart::ALL.iter().enumerate() {
            assert_eq!(part.index(), i);
            assert_eq!(BodyPart::from_index(i), Some(*part));
        }
        assert_eq!(BodyPart::from_index(17), None);
        assert_eq!(BodyPart::RightWrist.index(), 10);
    }

    #[test]
    fn test_pose_from_posenet_json() {
        let keypoints: Vec<String> = BodyPart::ALL
            .iter()
            .map(|p| {
                let name = serde_json::to_string(p).unwrap();
                format!(
                    r#"{{"part":{},"position":{{"x":{}.5,"y":20}},"score":0.8}}"#,
                    name,
                    p.index()
                )
            })
            .collect();
        // Reverse order to check placement by part, not by position in the list
        let json = format!(
            r#"{{"score":0.75,"keypoints":[{}]}}"#,
            keypoints.iter().rev().cloned().collect::<Vec<_>>().join(",")
        );

        let pose: Pose = serde_json::from_str(&json).unwrap();
        assert!((pose.score - 0.75).abs() < 1e-6);
        let wrist = pose.keypoint(BodyPart::RightWrist);
        assert_eq!(wrist.part, BodyPart::RightWrist);
        assert!((wrist.position.x - 10.5).abs() < 1e-6);
        assert!((wrist.position.y - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_pose_missing_part_is_malformed() {
        let keypoints = BodyPart::ALL
            .iter()
            .filter(|p| **p != BodyPart::RightWrist)
            .map(|&p| Keypoint::new(p, 1.0, 1.0, 1.0));
        let err = Pose::from_keypoints(1.0, keypoints).unwrap_err();
        assert!(matches!(err, GameError::MalformedPose(_)));
    }

    #[test]
    fn test_pose_duplicate_part_is_malformed() {
        let mut keypoints: Vec<_> = BodyPart::ALL
            .iter()
            .map(|&p| Keypoint::new(p, 1.0, 1.0, 1.0))
            .collect();
        keypoints.push(Keypoint::new(BodyPart::Nose, 2.0, 2.0, 1.0));
        assert!(Pose::from_keypoints(1.0, keypoints).is_err());
    }

    #[test]
    fn test_keypoint_serializes_as_posenet() {
        let kp = Keypoint::new(BodyPart::LeftWrist, 1.0, 2.0, 0.5);
        let json = serde_json::to_value(kp).unwrap();
        assert_eq!(json["part"], "leftWrist");
        assert_eq!(json["position"]["x"], 1.0);
        assert_eq!(json["score"], 0.5);
    }
}
