//! Platform abstraction layer
//!
//! The game core talks to its collaborators through these traits:
//! - Audio playback clock
//! - Camera frames
//! - Pose model
//! - Presentation (skeleton and bubble overlay)

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::game::{Pose, SessionSnapshot};

#[cfg(not(target_arch = "wasm32"))]
pub mod native;
pub mod synthetic;
#[cfg(target_arch = "wasm32")]
pub mod web;

/// Monotonic playback clock of the song
pub trait AudioClock {
    /// Seconds since playback started, or `None` while audio is not ready
    fn current_time(&self) -> Option<f64>;
}

/// Continuous stream of video frames
pub trait FrameSource {
    type Frame;

    /// Acquire the device. Failure here is `CameraUnavailable`.
    fn start(&mut self) -> Result<()>;

    /// Next frame; an error drops this frame only
    fn next_frame(&mut self) -> Result<Self::Frame>;
}

/// Keypoint extraction from a frame
pub trait PoseModel<F> {
    /// Load weights once per session. Failure here is `ModelUnavailable`.
    fn load(&mut self) -> Result<()>;

    fn estimate_single_pose(&mut self, frame: &F) -> Result<Pose>;

    fn estimate_multiple_poses(&mut self, frame: &F, max_poses: usize) -> Result<Vec<Pose>>;
}

/// Read-only consumer of each detection frame
pub trait Presenter {
    fn present(&mut self, poses: &[Pose], view: &SessionSnapshot);
}

/// Hand-driven clock for tests and replays
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Option<f64>>>,
}

impl ManualClock {
    pub fn at(seconds: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(Some(seconds))),
        }
    }

    /// A clock whose audio has not come up yet
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        *self.now.lock() = Some(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        let mut now = self.now.lock();
        *now = Some(now.unwrap_or(0.0) + seconds);
    }
}

impl AudioClock for ManualClock {
    fn current_time(&self) -> Option<f64> {
        *self.now.lock()
    }
}

impl<C: AudioClock + ?Sized> AudioClock for Arc<C> {
    fn current_time(&self) -> Option<f64> {
        (**self).current_time()
    }
}

/// A song being played back
pub trait Playback {
    /// Playback position in seconds
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;
}

/// Beat clock read from the song's own playback position, so beats stay
/// locked to the music through buffering and stalls
#[derive(Debug, Clone, Copy)]
pub struct SongClock<'a, M: ?Sized> {
    song: &'a M,
}

impl<'a, M: Playback + ?Sized> SongClock<'a, M> {
    pub fn new(song: &'a M) -> Self {
        Self { song }
    }
}

impl<M: Playback + ?Sized> AudioClock for SongClock<'_, M> {
    fn current_time(&self) -> Option<f64> {
        let position = self.song.position();
        (self.song.is_playing() && position.is_finite()).then_some(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{BeatSchedule, GameSession, PollOutcome};
    use crate::settings::Settings;

    struct Track {
        position: f64,
        playing: bool,
    }

    impl Playback for Track {
        fn position(&self) -> f64 {
            self.position
        }

        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    #[test]
    fn test_song_clock_reads_only_while_playing() {
        let mut track = Track {
            position: 1.25,
            playing: false,
        };
        assert_eq!(SongClock::new(&track).current_time(), None);

        track.playing = true;
        assert_eq!(SongClock::new(&track).current_time(), Some(1.25));

        track.position = f64::NAN;
        assert_eq!(SongClock::new(&track).current_time(), None);
    }

    #[test]
    fn test_beats_follow_song_position_not_wall_time() {
        let schedule = BeatSchedule::new(vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0]).unwrap();
        let session = GameSession::new(&Settings::default(), schedule, 3).unwrap();

        // Still buffering: no session yet
        let mut track = Track {
            position: 0.0,
            playing: false,
        };
        assert!(session.start(&SongClock::new(&track)).is_err());

        track.playing = true;
        let ticket = session.start(&SongClock::new(&track)).unwrap();

        // A stall keeps the song at 0 however long it lasts
        let clock = SongClock::new(&track);
        assert_eq!(session.poll_beats(ticket, clock.current_time()), PollOutcome::Continue);
        assert!(session.target().is_none());

        track.position = 0.1;
        session.poll_beats(ticket, SongClock::new(&track).current_time());
        assert_eq!(session.target().map(|t| t.beat_index), Some(0));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::unavailable();
        assert_eq!(clock.current_time(), None);

        clock.advance(0.5);
        assert_eq!(clock.current_time(), Some(0.5));

        let shared = clock.clone();
        shared.set(3.0);
        assert_eq!(clock.current_time(), Some(3.0));
    }
}
