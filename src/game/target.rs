//! Target ("bubble") regions and their generator

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::{HIT_ENVELOPE_INNER, HIT_ENVELOPE_OUTER};
use crate::error::{GameError, Result};

/// Axis-aligned rectangle in frame pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl Bounds {
    /// Strict containment: points on the edge are outside
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        self.x_min < p.x && p.x < self.x_max && self.y_min < p.y && p.y < self.y_max
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.x_min + self.x_max) * 0.5,
            (self.y_min + self.y_max) * 0.5,
        )
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.x_max - self.x_min, self.y_max - self.y_min)
    }
}

/// Fractional hit box around a drawn bubble point.
///
/// This is the authoritative hit region; it does not have to match the
/// rendered bubble radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitEnvelope {
    pub inner: f32,
    pub outer: f32,
}

impl Default for HitEnvelope {
    fn default() -> Self {
        Self {
            inner: HIT_ENVELOPE_INNER,
            outer: HIT_ENVELOPE_OUTER,
        }
    }
}

impl HitEnvelope {
    pub fn around(&self, point: Vec2) -> Bounds {
        Bounds {
            x_min: point.x * self.inner,
            x_max: point.x * self.outer,
            y_min: point.y * self.inner,
            y_max: point.y * self.outer,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_finite() && self.outer.is_finite() && 0.0 <= self.inner && self.inner < self.outer
    }
}

/// A spawned bubble: the drawn point and its hit box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub bubble: Vec2,
    pub bounds: Bounds,
}

/// The target currently published in a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveTarget {
    /// Unique within a session; a hit consumes exactly one id
    pub id: u64,
    /// Beat that spawned it
    pub beat_index: usize,
    pub target: Target,
}

impl ActiveTarget {
    #[inline]
    pub fn bounds(&self) -> &Bounds {
        &self.target.bounds
    }
}

/// Draws bubble points uniformly from the playfield
#[derive(Debug, Clone)]
pub struct TargetGenerator {
    rng: Pcg32,
    max: Vec2,
    envelope: HitEnvelope,
}

impl TargetGenerator {
    /// `max` must be finite and positive on both axes
    pub fn new(seed: u64, max: Vec2, envelope: HitEnvelope) -> Result<Self> {
        if !(max.is_finite() && max.x > 0.0 && max.y > 0.0) {
            return Err(GameError::InvalidSettings(format!(
                "playfield {}x{} must be positive",
                max.x, max.y
            )));
        }
        if !envelope.is_valid() {
            return Err(GameError::InvalidSettings(
                "hit envelope needs 0 <= inner < outer".into(),
            ));
        }
        Ok(Self {
            rng: Pcg32::seed_from_u64(seed),
            max,
            envelope,
        })
    }

    pub fn generate(&mut self) -> Target {
        let bubble = Vec2::new(
            self.rng.random_range(0.0..self.max.x),
            self.rng.random_range(0.0..self.max.y),
        );
        Target {
            bubble,
            bounds: self.envelope.around(bubble),
        }
    }

    pub fn envelope(&self) -> HitEnvelope {
        self.envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_envelope_around_bubble() {
        let bounds = HitEnvelope::default().around(Vec2::new(100.0, 200.0));
        assert!((bounds.x_min - 70.0).abs() < 1e-3);
        assert!((bounds.x_max - 130.0).abs() < 1e-3);
        assert!((bounds.y_min - 140.0).abs() < 1e-3);
        assert!((bounds.y_max - 260.0).abs() < 1e-3);
    }

    #[test]
    fn test_contains_is_strict() {
        let b = Bounds {
            x_min: 70.0,
            x_max: 130.0,
            y_min: 140.0,
            y_max: 260.0,
        };
        assert!(b.contains(Vec2::new(100.0, 200.0)));
        assert!(!b.contains(Vec2::new(69.0, 200.0)));
        assert!(!b.contains(Vec2::new(70.0, 200.0)));
        assert!(!b.contains(Vec2::new(130.0, 200.0)));
        assert!(!b.contains(Vec2::new(100.0, 140.0)));
        assert!(!b.contains(Vec2::new(100.0, 260.0)));
    }

    #[test]
    fn test_generator_is_deterministic() {
        let max = Vec2::new(1300.0, 800.0);
        let mut a = TargetGenerator::new(42, max, HitEnvelope::default()).unwrap();
        let mut b = TargetGenerator::new(42, max, HitEnvelope::default()).unwrap();
        for _ in 0..10 {
            assert_eq!(a.generate(), b.generate());
        }
    }

    #[test]
    fn test_generator_rejects_empty_playfield() {
        let envelope = HitEnvelope::default();
        for max in [
            Vec2::new(0.0, 800.0),
            Vec2::new(1300.0, -1.0),
            Vec2::new(f32::INFINITY, 800.0),
        ] {
            assert!(matches!(
                TargetGenerator::new(1, max, envelope),
                Err(GameError::InvalidSettings(_))
            ));
        }
        let bad = HitEnvelope { inner: 1.3, outer: 0.7 };
        assert!(TargetGenerator::new(1, Vec2::new(1300.0, 800.0), bad).is_err());
    }

    #[test]
    fn test_envelope_validation() {
        assert!(HitEnvelope::default().is_valid());
        assert!(!HitEnvelope { inner: 1.3, outer: 0.7 }.is_valid());
        assert!(!HitEnvelope { inner: -0.1, outer: 1.0 }.is_valid());
    }

    proptest! {
        #[test]
        fn prop_generated_bubbles_stay_in_playfield(seed in any::<u64>()) {
            let max = Vec2::new(1300.0, 800.0);
            let mut generator = TargetGenerator::new(seed, max, HitEnvelope::default()).unwrap();
            for _ in 0..16 {
                let t = generator.generate();
                prop_assert!(t.bubble.x >= 0.0 && t.bubble.x < max.x);
                prop_assert!(t.bubble.y >= 0.0 && t.bubble.y < max.y);
                prop_assert!(t.bounds.x_min <= t.bubble.x && t.bubble.x <= t.bounds.x_max);
                prop_assert!(t.bounds.y_min <= t.bubble.y && t.bubble.y <= t.bounds.y_max);
            }
        }
    }
}
