//! Beat timer state machine
//!
//! Walks a `BeatSchedule` against elapsed audio time. Polled on a fixed
//! wall-clock interval by the platform shell; each poll collapses every
//! overdue beat into a single spawn.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use super::beats::BeatSchedule;
use crate::error::{GameError, Result};

/// Lifecycle of the timer within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerPhase {
    /// No session active
    Idle,
    /// Started, not yet polled
    Armed,
    /// Polling against the schedule
    Advancing,
    /// Schedule exhausted; no more spawns
    Finished,
}

/// What a single poll decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    /// Latest beat that became due this poll; a target should be spawned for it
    pub due_beat: Option<usize>,
    /// Earlier due beats folded into `due_beat` by catch-up
    pub collapsed: usize,
    /// Phase after the poll
    pub phase: TimerPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatTimer {
    phase: TimerPhase,
    /// Audio-clock time when the timer was armed
    session_start: f64,
    /// Cursor into the schedule
    beat_index: usize,
    step: NonZeroUsize,
}

impl BeatTimer {
    pub fn new(step: NonZeroUsize) -> Self {
        Self {
            phase: TimerPhase::Idle,
            session_start: 0.0,
            beat_index: 0,
            step,
        }
    }

    /// Arm the timer at the clock's current time.
    ///
    /// Restarting an armed timer resets its cursor; with no clock reading the
    /// timer is left untouched.
    pub fn start(&mut self, now: Option<f64>) -> Result<()> {
        let now = now.ok_or(GameError::ClockUnavailable)?;
        self.session_start = now;
        self.beat_index = 0;
        self.phase = TimerPhase::Armed;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.phase = TimerPhase::Idle;
    }

    /// Compare elapsed audio time against the schedule and advance the cursor
    pub fn poll(&mut self, now: f64, schedule: &BeatSchedule) -> TimerTick {
        match self.phase {
            TimerPhase::Idle | TimerPhase::Finished => {
                return TimerTick {
                    due_beat: None,
                    collapsed: 0,
                    phase: self.phase,
                };
            }
            TimerPhase::Armed => self.phase = TimerPhase::Advancing,
            TimerPhase::Advancing => {}
        }

        let elapsed = now - self.session_start;
        let mut due_beat = None;
        let mut due_count = 0usize;

        // Cursor strictly increases and is clamped to len, so this terminates
        while let Some(offset) = schedule.next(self.beat_index) {
            if elapsed <= offset {
                break;
            }
            due_beat = Some(self.beat_index);
            due_count += 1;
            self.beat_index = (self.beat_index + self.step.get()).min(schedule.len());
        }

        if self.beat_index >= schedule.len() {
            self.beat_index = schedule.len();
            self.phase = TimerPhase::Finished;
        }

        TimerTick {
            due_beat,
            collapsed: due_count.saturating_sub(1),
            phase: self.phase,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn beat_index(&self) -> usize {
        self.beat_index
    }

    pub fn session_start(&self) -> f64 {
        self.session_start
    }

    pub fn step(&self) -> usize {
        self.step.get()
    }

    /// Audio seconds since the timer was armed
    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.session_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn step(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn half_second_grid(count: usize) -> BeatSchedule {
        BeatSchedule::new((0..count).map(|i| i as f64 * 0.5).collect()).unwrap()
    }

    #[test]
    fn test_start_requires_clock() {
        let mut timer = BeatTimer::new(step(3));
        assert!(matches!(timer.start(None), Err(GameError::ClockUnavailable)));
        assert_eq!(timer.phase(), TimerPhase::Idle);

        timer.start(Some(10.0)).unwrap();
        assert_eq!(timer.phase(), TimerPhase::Armed);
        assert_eq!(timer.session_start(), 10.0);
    }

    #[test]
    fn test_idle_timer_never_spawns() {
        let mut timer = BeatTimer::new(step(3));
        let tick = timer.poll(100.0, &half_second_grid(8));
        assert_eq!(tick.due_beat, None);
        assert_eq!(tick.phase, TimerPhase::Idle);
    }

    #[test]
    fn test_catch_up_collapses_to_one_spawn() {
        let schedule = half_second_grid(20);
        let mut timer = BeatTimer::new(step(3));
        timer.start(Some(0.0)).unwrap();

        // First poll lands at 2.0s: beats 0 (0.0s) and 3 (1.5s) are due, 6 (3.0s) is not
        let tick = timer.poll(2.0, &schedule);
        assert_eq!(tick.due_beat, Some(3));
        assert_eq!(tick.collapsed, 1);
        assert_eq!(tick.phase, TimerPhase::Advancing);
        assert_eq!(timer.beat_index(), 6);

        // Nothing new until 3.0s has passed
        let tick = timer.poll(2.9, &schedule);
        assert_eq!(tick.due_beat, None);
        assert_eq!(timer.beat_index(), 6);
    }

    #[test]
    fn test_due_comparison_is_strict() {
        let schedule = BeatSchedule::new(vec![1.0, 2.0]).unwrap();
        let mut timer = BeatTimer::new(step(1));
        timer.start(Some(5.0)).unwrap();

        assert_eq!(timer.poll(6.0, &schedule).due_beat, None);
        assert_eq!(timer.poll(6.01, &schedule).due_beat, Some(0));
    }

    #[test]
    fn test_finishes_at_end_of_schedule() {
        let schedule = half_second_grid(5);
        let mut timer = BeatTimer::new(step(3));
        timer.start(Some(0.0)).unwrap();

        let tick = timer.poll(0.1, &schedule);
        assert_eq!(tick.due_beat, Some(0));
        assert_eq!(timer.beat_index(), 3);

        // Beat 3 (1.5s) is due, cursor would move to 6 but clamps to len
        let tick = timer.poll(1.6, &schedule);
        assert_eq!(tick.due_beat, Some(3));
        assert_eq!(tick.phase, TimerPhase::Finished);
        assert_eq!(timer.beat_index(), 5);

        let tick = timer.poll(100.0, &schedule);
        assert_eq!(tick.due_beat, None);
        assert_eq!(tick.phase, TimerPhase::Finished);
    }

    #[test]
    fn test_empty_schedule_finishes_immediately() {
        let schedule = BeatSchedule::new(vec![]).unwrap();
        let mut timer = BeatTimer::new(step(3));
        timer.start(Some(0.0)).unwrap();
        let tick = timer.poll(0.0, &schedule);
        assert_eq!(tick.due_beat, None);
        assert_eq!(tick.phase, TimerPhase::Finished);
    }

    #[test]
    fn test_duplicate_offsets_terminate() {
        let schedule = BeatSchedule::new(vec![0.0; 1000]).unwrap();
        let mut timer = BeatTimer::new(step(1));
        timer.start(Some(0.0)).unwrap();
        let tick = timer.poll(1.0, &schedule);
        assert_eq!(tick.due_beat, Some(999));
        assert_eq!(tick.collapsed, 999);
        assert_eq!(tick.phase, TimerPhase::Finished);
    }

    #[test]
    fn test_restart_resets_cursor() {
        let schedule = half_second_grid(20);
        let mut timer = BeatTimer::new(step(3));
        timer.start(Some(0.0)).unwrap();
        timer.poll(4.0, &schedule);
        assert!(timer.beat_index() > 0);

        timer.start(Some(4.0)).unwrap();
        assert_eq!(timer.beat_index(), 0);
        assert_eq!(timer.phase(), TimerPhase::Armed);
    }

    proptest! {
        #[test]
        fn prop_cursor_is_monotone_and_bounded(
            offsets in prop::collection::vec(0.0f64..30.0, 0..40),
            polls in prop::collection::vec(0.0f64..40.0, 1..30),
            step_size in 1usize..6,
        ) {
            let mut offsets = offsets;
            offsets.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let schedule = BeatSchedule::new(offsets).unwrap();
            let mut timer = BeatTimer::new(step(step_size));
            timer.start(Some(0.0)).unwrap();

            let mut polls = polls;
            polls.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mut last = 0;
            for now in polls {
                let tick = timer.poll(now, &schedule);
                prop_assert!(timer.beat_index() >= last);
                prop_assert!(timer.beat_index() <= schedule.len());
                if let Some(beat) = tick.due_beat {
                    prop_assert!(beat >= last);
                    prop_assert!(beat < schedule.len());
                }
                last = timer.beat_index();
            }
        }
    }
}
