//! Song beat grid
//!
//! Offsets are seconds from song start. The schedule is immutable once built.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Largest grid `from_tempo` will build (four hours at 400 bpm)
pub const MAX_TEMPO_BEATS: usize = 96_000;

/// Ordered beat offsets at which new targets become due
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct BeatSchedule {
    offsets: Vec<f64>,
}

impl BeatSchedule {
    /// Offsets must be finite, non-negative and non-decreasing. Repeats are allowed.
    pub fn new(offsets: Vec<f64>) -> Result<Self> {
        for (i, &t) in offsets.iter().enumerate() {
            if !t.is_finite() || t < 0.0 {
                return Err(GameError::InvalidSchedule(format!(
                    "offset {} at index {} is not a non-negative number",
                    t, i
                )));
            }
            if i > 0 && t < offsets[i - 1] {
                return Err(GameError::InvalidSchedule(format!(
                    "offset {} at index {} is earlier than its predecessor",
                    t, i
                )));
            }
        }
        Ok(Self { offsets })
    }

    /// Derive the grid from tempo metadata: one beat every `60 / bpm` seconds,
    /// starting at `first_beat`, up to and including `duration`.
    pub fn from_tempo(bpm: f64, first_beat: f64, duration: f64) -> Result<Self> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(GameError::InvalidSchedule(format!("bpm must be positive, got {}", bpm)));
        }
        if !(first_beat.is_finite() && first_beat >= 0.0 && duration.is_finite()) {
            return Err(GameError::InvalidSchedule(
                "first beat and duration must be non-negative".into(),
            ));
        }

        let period = 60.0 / bpm;
        let count = if duration < first_beat {
            0.0
        } else {
            ((duration - first_beat) / period).floor() + 1.0
        };
        if count > MAX_TEMPO_BEATS as f64 {
            return Err(GameError::InvalidSchedule(format!(
                "{} bpm over {}s gives more than {} beats",
                bpm, duration, MAX_TEMPO_BEATS
            )));
        }
        let count = count as usize;
        // Computed by multiplication so rounding error does not accumulate
        let offsets = (0..count).map(|k| first_beat + k as f64 * period).collect();
        Self::new(offsets)
    }

    /// Offset at `index`, or `None` at end of sequence
    #[inline]
    pub fn next(&self, index: usize) -> Option<f64> {
        self.offsets.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }
}

impl TryFrom<Vec<f64>> for BeatSchedule {
    type Error = GameError;

    fn try_from(offsets: Vec<f64>) -> Result<Self> {
        Self::new(offsets)
    }
}

impl From<BeatSchedule> for Vec<f64> {
    fn from(schedule: BeatSchedule) -> Self {
        schedule.offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_signals_end() {
        let s = BeatSchedule::new(vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(s.next(0), Some(0.0));
        assert_eq!(s.next(2), Some(1.0));
        assert_eq!(s.next(3), None);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_rejects_bad_offsets() {
        assert!(BeatSchedule::new(vec![0.0, -1.0]).is_err());
        assert!(BeatSchedule::new(vec![1.0, 0.5]).is_err());
        assert!(BeatSchedule::new(vec![f64::NAN]).is_err());
        // Repeats are fine
        assert!(BeatSchedule::new(vec![0.5, 0.5, 0.5]).is_ok());
        assert!(BeatSchedule::new(vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_from_tempo() {
        let s = BeatSchedule::from_tempo(120.0, 0.0, 2.0).unwrap();
        assert_eq!(s.offsets(), &[0.0, 0.5, 1.0, 1.5, 2.0]);

        let s = BeatSchedule::from_tempo(60.0, 0.25, 3.0).unwrap();
        assert_eq!(s.offsets(), &[0.25, 1.25, 2.25]);

        assert!(BeatSchedule::from_tempo(0.0, 0.0, 10.0).is_err());
        assert!(BeatSchedule::from_tempo(120.0, 5.0, 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_from_tempo_rejects_oversized_grid() {
        assert!(matches!(
            BeatSchedule::from_tempo(1e300, 0.0, 10.0),
            Err(GameError::InvalidSchedule(_))
        ));
        assert!(matches!(
            BeatSchedule::from_tempo(1e7, 0.0, 230.0),
            Err(GameError::InvalidSchedule(_))
        ));

        // Right at the cap is still accepted
        let s = BeatSchedule::from_tempo(60.0, 0.0, (MAX_TEMPO_BEATS - 1) as f64).unwrap();
        assert_eq!(s.len(), MAX_TEMPO_BEATS);
    }

    #[test]
    fn test_deserialize_validates() {
        let s: BeatSchedule = serde_json::from_str("[0.0, 0.5, 1.5]").unwrap();
        assert_eq!(s.len(), 3);
        assert!(serde_json::from_str::<BeatSchedule>("[1.0, 0.0]").is_err());
    }
}
