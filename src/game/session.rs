//! Game session: start/stop and the update/read contract for shared state
//!
//! The beat poller and the detection loop each hold a clone of the session
//! and a `SessionTicket`. They never call each other; every mutation of the
//! target slot and score goes through the session's lock.

use std::num::NonZeroUsize;
use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;

use super::beats::BeatSchedule;
use super::hit::{HitResult, HitTester};
use super::pose::Pose;
use super::state::{GameEvent, SessionSnapshot, SessionState, SessionSummary};
use super::target::{ActiveTarget, TargetGenerator};
use super::timer::{BeatTimer, TimerPhase};
use crate::error::{GameError, Result};
use crate::platform::AudioClock;
use crate::settings::{DetectionMode, Settings};

/// Generation a loop was started for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionTicket {
    generation: u64,
}

impl SessionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What the beat poller should do after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Keep polling
    Continue,
    /// Schedule exhausted, stop polling
    Finished,
    /// Session stopped or restarted since this poller began
    Stale,
}

/// Result of delivering one detection frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Hit { score: u64 },
    Miss,
    /// Multi-pose frames are drawn but not scored
    PresentationOnly,
    /// Estimate failed; frame dropped
    Skipped,
    /// Session ended while the frame was in flight
    Stale,
    /// No session running; frame drawn only
    Idle,
}

struct Shared {
    state: Mutex<SessionState>,
    schedule: BeatSchedule,
    hit_tester: HitTester,
    mode: DetectionMode,
}

/// Cloneable handle to one game's state
#[derive(Clone)]
pub struct GameSession {
    shared: Arc<Shared>,
}

impl GameSession {
    pub fn new(settings: &Settings, schedule: BeatSchedule, seed: u64) -> Result<Self> {
        settings.validate()?;
        let step = NonZeroUsize::new(settings.beat_step)
            .ok_or_else(|| GameError::InvalidSettings("beat_step must be at least 1".into()))?;
        let generator = TargetGenerator::new(
            seed,
            Vec2::new(settings.playfield_width, settings.playfield_height),
            settings.hit_envelope,
        )?;
        let state = SessionState::new(BeatTimer::new(step), generator);

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                schedule,
                hit_tester: HitTester::new(settings.hit_keypoint, settings.min_keypoint_confidence),
                mode: settings.mode,
            }),
        })
    }

    /// Arm the beat timer and reset score. Fails if the audio clock is not ready.
    ///
    /// Starting a running session restarts it: the previous ticket goes stale,
    /// so its loops stop on their next cycle.
    pub fn start<C: AudioClock + ?Sized>(&self, clock: &C) -> Result<SessionTicket> {
        let now = clock.current_time();
        let mut state = self.shared.state.lock();
        state.timer.start(now)?;
        let generation = state.begin();
        log::info!(
            "Session {} started ({} beats, step {})",
            generation,
            self.shared.schedule.len(),
            state.timer.step()
        );
        Ok(SessionTicket { generation })
    }

    /// Halt the session, leaving the final score readable. No-op when stopped.
    pub fn stop(&self) -> Option<SessionSummary> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return None;
        }
        let summary = state.end();
        log::info!(
            "Session {} stopped: score {}, {} targets, {} frames skipped",
            summary.generation,
            summary.score,
            summary.stats.targets_spawned,
            summary.stats.frames_skipped
        );
        Some(summary)
    }

    /// One beat timer poll at audio time `now`
    pub fn poll_beats(&self, ticket: SessionTicket, now: Option<f64>) -> PollOutcome {
        let mut state = self.shared.state.lock();
        if !Self::ticket_matches(&state, ticket) {
            return PollOutcome::Stale;
        }
        let Some(now) = now else {
            log::warn!("Audio clock not ready, skipping beat poll");
            return PollOutcome::Continue;
        };

        let tick = state.advance_timer(now, &self.shared.schedule);
        match tick.phase {
            TimerPhase::Finished => PollOutcome::Finished,
            _ => PollOutcome::Continue,
        }
    }

    /// Deliver the poses estimated for one frame
    pub fn handle_poses(&self, ticket: SessionTicket, poses: &[Pose]) -> FrameOutcome {
        let mut state = self.shared.state.lock();
        if !Self::ticket_matches(&state, ticket) {
            return FrameOutcome::Stale;
        }
        state.stats.frames_processed += 1;

        if self.shared.mode == DetectionMode::MultiPose {
            return FrameOutcome::PresentationOnly;
        }
        let Some(pose) = poses.first() else {
            return FrameOutcome::Miss;
        };

        match self.shared.hit_tester.test(pose, state.target.as_ref()) {
            HitResult::Hit { position } => match state.resolve_hit() {
                Some(score) => {
                    log::info!(
                        "Hit at ({:.0}, {:.0}), score {}",
                        position.x,
                        position.y,
                        score
                    );
                    FrameOutcome::Hit { score }
                }
                None => FrameOutcome::Miss,
            },
            HitResult::Miss => FrameOutcome::Miss,
        }
    }

    /// Count a dropped frame; the loop carries on
    pub fn record_skipped_frame(&self, ticket: SessionTicket, err: &GameError) -> FrameOutcome {
        let mut state = self.shared.state.lock();
        if !Self::ticket_matches(&state, ticket) {
            return FrameOutcome::Stale;
        }
        state.stats.frames_skipped += 1;
        log::warn!("Skipping frame: {}", err);
        FrameOutcome::Skipped
    }

    /// True while `ticket` belongs to the running session
    pub fn is_current(&self, ticket: SessionTicket) -> bool {
        Self::ticket_matches(&self.shared.state.lock(), ticket)
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    pub fn score(&self) -> u64 {
        self.shared.state.lock().score
    }

    pub fn target(&self) -> Option<ActiveTarget> {
        self.shared.state.lock().target
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.lock().snapshot()
    }

    pub fn summary(&self) -> SessionSummary {
        self.shared.state.lock().summary()
    }

    pub fn drain_events(&self) -> Vec<GameEvent> {
        self.shared.state.lock().drain_events()
    }

    pub fn schedule(&self) -> &BeatSchedule {
        &self.shared.schedule
    }

    pub fn mode(&self) -> DetectionMode {
        self.shared.mode
    }

    fn ticket_matches(state: &SessionState, ticket: SessionTicket) -> bool {
        state.running && state.generation == ticket.generation
    }
}
