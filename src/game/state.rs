//! Session state shared by the beat poller and the detection loop
//!
//! Everything both loops touch lives here, behind the session's single lock.

use serde::{Deserialize, Serialize};

use super::beats::BeatSchedule;
use super::target::{ActiveTarget, TargetGenerator};
use super::timer::{BeatTimer, TimerPhase, TimerTick};

/// Notifications for the shell (sound effects, HUD)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    SessionStarted { generation: u64 },
    TargetSpawned { target: ActiveTarget },
    TargetHit { target_id: u64, score: u64 },
    ScheduleFinished { score: u64 },
    SessionStopped { score: u64 },
}

/// Upper bound on queued events if nobody drains them
pub const MAX_PENDING_EVENTS: usize = 256;

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub targets_spawned: u32,
    /// Overdue beats folded into a later spawn
    pub beats_collapsed: u32,
    pub hits: u32,
    pub frames_processed: u64,
    pub frames_skipped: u64,
}

/// Read-only view handed to presenters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub running: bool,
    pub score: u64,
    pub target: Option<ActiveTarget>,
    pub timer_phase: TimerPhase,
    pub beat_index: usize,
}

/// Final result of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub generation: u64,
    pub score: u64,
    pub stats: SessionStats,
}

/// Complete mutable session state
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Bumped on every start; loops holding an older value are stale
    pub generation: u64,
    pub running: bool,
    pub score: u64,
    /// At most one active target
    pub target: Option<ActiveTarget>,
    pub timer: BeatTimer,
    pub stats: SessionStats,
    generator: TargetGenerator,
    events: Vec<GameEvent>,
    next_target_id: u64,
}

impl SessionState {
    pub fn new(timer: BeatTimer, generator: TargetGenerator) -> Self {
        Self {
            generation: 0,
            running: false,
            score: 0,
            target: None,
            timer,
            stats: SessionStats::default(),
            generator,
            events: Vec::new(),
            next_target_id: 1,
        }
    }

    /// Reset everything that belongs to one session. Timer must already be armed.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.running = true;
        self.score = 0;
        self.target = None;
        self.stats = SessionStats::default();
        self.push_event(GameEvent::SessionStarted {
            generation: self.generation,
        });
        self.generation
    }

    pub fn end(&mut self) -> SessionSummary {
        self.running = false;
        self.timer.stop();
        self.push_event(GameEvent::SessionStopped { score: self.score });
        self.summary()
    }

    /// Poll the timer and publish one target for the latest due beat
    pub fn advance_timer(&mut self, now: f64, schedule: &BeatSchedule) -> TimerTick {
        let was_finished = self.timer.phase() == TimerPhase::Finished;
        let tick = self.timer.poll(now, schedule);

        if let Some(beat_index) = tick.due_beat {
            let target = ActiveTarget {
                id: self.next_target_id,
                beat_index,
                target: self.generator.generate(),
            };
            self.next_target_id += 1;
            self.target = Some(target);
            self.stats.targets_spawned += 1;
            self.stats.beats_collapsed += tick.collapsed as u32;
            log::debug!(
                "Target {} spawned for beat {}/{} at ({:.0}, {:.0})",
                target.id,
                beat_index,
                schedule.len(),
                target.target.bubble.x,
                target.target.bubble.y
            );
            self.push_event(GameEvent::TargetSpawned { target });
        }

        if !was_finished && tick.phase == TimerPhase::Finished {
            log::info!("Beat schedule finished (score {})", self.score);
            self.push_event(GameEvent::ScheduleFinished { score: self.score });
        }

        tick
    }

    /// Score the active target and clear the slot. Returns the new score.
    pub fn resolve_hit(&mut self) -> Option<u64> {
        let target = self.target.take()?;
        self.score += 1;
        self.stats.hits += 1;
        self.push_event(GameEvent::TargetHit {
            target_id: target.id,
            score: self.score,
        });
        Some(self.score)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            running: self.running,
            score: self.score,
            target: self.target,
            timer_phase: self.timer.phase(),
            beat_index: self.timer.beat_index(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            generation: self.generation,
            score: self.score,
            stats: self.stats,
        }
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn push_event(&mut self, event: GameEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.remove(0);
        }
        self.events.push(event);
    }
}
