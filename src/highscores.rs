//! High score leaderboard
//!
//! Tracks the top 10 finished sessions. Persisted to LocalStorage on the
//! web and to a JSON file on native.

use serde::{Deserialize, Serialize};

use crate::game::SessionSummary;

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// One finished session on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Bubbles hit
    pub score: u64,
    /// Bubbles spawned during the session
    pub targets: u32,
    /// Unix timestamp (ms) when achieved
    pub timestamp: f64,
}

impl HighScoreEntry {
    /// Share of spawned bubbles that were hit
    pub fn accuracy(&self) -> f32 {
        if self.targets == 0 {
            0.0
        } else {
            self.score as f32 / self.targets as f32
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "beat_bubble_highscores";

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A session with no hits never makes the board
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Rank a score would achieve (1-indexed)
    pub fn potential_rank(&self, score: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Record a finished session. Returns the rank achieved, if any.
    pub fn record(&mut self, summary: &SessionSummary, timestamp: f64) -> Option<usize> {
        self.add_score(summary.score, summary.stats.targets_spawned, timestamp)
    }

    /// Insert keeping the board sorted by score, ties to the older entry
    pub fn add_score(&mut self, score: u64, targets: u32, timestamp: f64) -> Option<usize> {
        let rank = self.potential_rank(score)?;
        self.entries.insert(
            rank - 1,
            HighScoreEntry {
                score,
                targets,
                timestamp,
            },
        );
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    /// Load high scores from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let scores: HighScores =
            crate::platform::web::load_local(Self::STORAGE_KEY).unwrap_or_default();
        log::info!("{} high scores on the board", scores.entries.len());
        scores
    }

    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        if crate::platform::web::save_local(Self::STORAGE_KEY, self) {
            log::info!("High scores saved ({} entries)", self.entries.len());
        }
    }

    /// Load from a JSON file; a missing file is an empty board
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: &std::path::Path) -> crate::Result<Self> {
        Ok(crate::platform::native::read_json(path)?.unwrap_or_default())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to(&self, path: &std::path::Path) -> crate::Result<()> {
        crate::platform::native::write_json(path, self)
    }
}
