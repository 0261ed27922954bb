//! Frame → pose → hit-test pipeline
//!
//! One `run_frame` call is one cycle. The driver decides the cadence
//! (display refresh on the web, a paced thread on native).

use super::pose::Pose;
use super::session::{FrameOutcome, GameSession, SessionTicket};
use crate::error::{GameError, Result};
use crate::platform::{FrameSource, PoseModel, Presenter};
use crate::settings::{DetectionMode, Settings};

/// How poses are requested and filtered for drawing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    pub mode: DetectionMode,
    pub max_poses: usize,
    /// Poses below this score are not handed to the presenter
    pub min_pose_confidence: f32,
}

impl DetectionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            mode: settings.mode,
            max_poses: settings.model.max_pose_detections,
            min_pose_confidence: settings.min_pose_confidence,
        }
    }
}

pub struct DetectionLoop<S, M> {
    source: S,
    model: M,
    config: DetectionConfig,
    session: GameSession,
    warmed_up: bool,
}

impl<S, M> DetectionLoop<S, M>
where
    S: FrameSource,
    M: PoseModel<S::Frame>,
{
    pub fn new(source: S, model: M, config: DetectionConfig, session: GameSession) -> Self {
        Self {
            source,
            model,
            config,
            session,
            warmed_up: false,
        }
    }

    /// Start the camera and load the model. Only the first call does work.
    pub fn warm_up(&mut self) -> Result<()> {
        if self.warmed_up {
            return Ok(());
        }
        self.source.start().map_err(|e| match e {
            GameError::CameraUnavailable(_) => e,
            other => GameError::CameraUnavailable(other.to_string()),
        })?;
        self.model.load().map_err(|e| match e {
            GameError::ModelUnavailable(_) => e,
            other => GameError::ModelUnavailable(other.to_string()),
        })?;
        self.warmed_up = true;
        log::info!("Detection ready ({} mode)", self.config.mode.as_str());
        Ok(())
    }

    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    /// One cycle: grab a frame, estimate, present, and hit-test when a
    /// session is running.
    ///
    /// Frames are drawn from warm-up on, with or without a session; only
    /// scoring and frame stats need a current ticket.
    pub fn run_frame<P: Presenter + ?Sized>(
        &mut self,
        ticket: Option<SessionTicket>,
        presenter: &mut P,
    ) -> FrameOutcome {
        let poses = match self.source.next_frame().and_then(|frame| self.estimate(&frame)) {
            Ok(poses) => poses,
            Err(err) => {
                let err = match err {
                    GameError::DetectionFrameFailed(_) => err,
                    other => GameError::DetectionFrameFailed(other.to_string()),
                };
                return match ticket {
                    Some(ticket) => self.session.record_skipped_frame(ticket, &err),
                    None => {
                        log::debug!("Skipping idle frame: {}", err);
                        FrameOutcome::Skipped
                    }
                };
            }
        };

        let outcome = match ticket {
            Some(ticket) => self.session.handle_poses(ticket, &poses),
            None => FrameOutcome::Idle,
        };
        let visible: Vec<Pose> = poses
            .into_iter()
            .filter(|p| p.score >= self.config.min_pose_confidence)
            .collect();
        presenter.present(&visible, &self.session.snapshot());
        outcome
    }

    fn estimate(&mut self, frame: &S::Frame) -> Result<Vec<Pose>> {
        match self.config.mode {
            DetectionMode::SinglePose => Ok(vec![self.model.estimate_single_pose(frame)?]),
            DetectionMode::MultiPose => {
                let mut poses = self
                    .model
                    .estimate_multiple_poses(frame, self.config.max_poses)?;
                poses.truncate(self.config.max_poses);
                Ok(poses)
            }
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn config(&self) -> DetectionConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{BeatSchedule, SessionSnapshot};
    use crate::platform::ManualClock;
    use crate::platform::synthetic::{SyntheticCamera, SyntheticFrame, SyntheticPerformer};
    use glam::Vec2;

    /// Model that puts the wrist wherever the test says
    struct Puppet {
        session: GameSession,
        loads: u32,
        on_target: bool,
    }

    impl PoseModel<SyntheticFrame> for Puppet {
        fn load(&mut self) -> Result<()> {
            self.loads += 1;
            Ok(())
        }

        fn estimate_single_pose(&mut self, _frame: &SyntheticFrame) -> Result<Pose> {
            let p = match (self.on_target, self.session.target()) {
                (true, Some(t)) => t.bounds().center(),
                _ => Vec2::new(-100.0, -100.0),
            };
            Ok(crate::game::pose::pose_with(p, &[]))
        }

        fn estimate_multiple_poses(
            &mut self,
            frame: &SyntheticFrame,
            max_poses: usize,
        ) -> Result<Vec<Pose>> {
            let pose = self.estimate_single_pose(frame)?;
            Ok(vec![pose; max_poses + 2])
        }
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(usize, SessionSnapshot)>,
    }

    impl Presenter for Recorder {
        fn present(&mut self, poses: &[Pose], view: &SessionSnapshot) {
            self.frames.push((poses.len(), *view));
        }
    }

    fn setup(mode: DetectionMode) -> (GameSession, Settings) {
        let settings = Settings {
            mode,
            ..Settings::default()
        };
        let schedule = BeatSchedule::new((0..30).map(|i| i as f64 * 0.5).collect()).unwrap();
        (GameSession::new(&settings, schedule, 7).unwrap(), settings)
    }

    #[test]
    fn test_frame_hits_published_target() {
        let (session, settings) = setup(DetectionMode::SinglePose);
        let puppet = Puppet {
            session: session.clone(),
            loads: 0,
            on_target: true,
        };
        let mut detection = DetectionLoop::new(
            SyntheticCamera::new(60.0),
            puppet,
            DetectionConfig::from_settings(&settings),
            session.clone(),
        );
        detection.warm_up().unwrap();
        detection.warm_up().unwrap();
        assert_eq!(detection.model.loads, 1);

        let clock = ManualClock::at(0.0);
        let ticket = session.start(&clock).unwrap();
        let mut recorder = Recorder::default();

        // No target yet
        assert_eq!(detection.run_frame(Some(ticket), &mut recorder), FrameOutcome::Miss);

        session.poll_beats(ticket, Some(0.1));
        assert_eq!(
            detection.run_frame(Some(ticket), &mut recorder),
            FrameOutcome::Hit { score: 1 }
        );
        // Presenter saw the cleared slot
        let (_, view) = recorder.frames.last().unwrap();
        assert_eq!(view.score, 1);
        assert!(view.target.is_none());
    }

    #[test]
    fn test_camera_failure_is_fatal_at_warm_up() {
        let (session, settings) = setup(DetectionMode::SinglePose);
        let mut detection = DetectionLoop::new(
            SyntheticCamera::disconnected(),
            SyntheticPerformer::new(Vec2::new(1300.0, 800.0)),
            DetectionConfig::from_settings(&settings),
            session,
        );
        assert!(matches!(detection.warm_up(), Err(GameError::CameraUnavailable(_))));
        assert!(!detection.is_warmed_up());
    }

    #[test]
    fn test_failed_estimates_skip_frames() {
        let (session, settings) = setup(DetectionMode::SinglePose);
        let mut detection = DetectionLoop::new(
            SyntheticCamera::new(60.0),
            SyntheticPerformer::new(Vec2::new(1300.0, 800.0)).with_failures(2),
            DetectionConfig::from_settings(&settings),
            session.clone(),
        );
        detection.warm_up().unwrap();
        let ticket = session.start(&ManualClock::at(0.0)).unwrap();
        let mut recorder = Recorder::default();

        let outcomes: Vec<_> = (0..4)
            .map(|_| detection.run_frame(Some(ticket), &mut recorder))
            .collect();
        assert_eq!(outcomes[1], FrameOutcome::Skipped);
        assert_eq!(outcomes[3], FrameOutcome::Skipped);
        assert_eq!(recorder.frames.len(), 2);

        let stats = session.summary().stats;
        assert_eq!(stats.frames_skipped, 2);
        assert_eq!(stats.frames_processed, 2);
    }

    #[test]
    fn test_multi_pose_presents_capped_poses_without_scoring() {
        let (session, settings) = setup(DetectionMode::MultiPose);
        let puppet = Puppet {
            session: session.clone(),
            loads: 0,
            on_target: true,
        };
        let config = DetectionConfig::from_settings(&settings);
        let mut detection =
            DetectionLoop::new(SyntheticCamera::new(60.0), puppet, config, session.clone());
        detection.warm_up().unwrap();
        let ticket = session.start(&ManualClock::at(0.0)).unwrap();
        session.poll_beats(ticket, Some(0.1));

        let mut recorder = Recorder::default();
        assert_eq!(
            detection.run_frame(Some(ticket), &mut recorder),
            FrameOutcome::PresentationOnly
        );
        assert_eq!(recorder.frames[0].0, config.max_poses);
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn test_stale_ticket_presents_without_scoring() {
        let (session, settings) = setup(DetectionMode::SinglePose);
        let puppet = Puppet {
            session: session.clone(),
            loads: 0,
            on_target: true,
        };
        let mut detection = DetectionLoop::new(
            SyntheticCamera::new(60.0),
            puppet,
            DetectionConfig::from_settings(&settings),
            session.clone(),
        );
        detection.warm_up().unwrap();
        let ticket = session.start(&ManualClock::at(0.0)).unwrap();
        session.poll_beats(ticket, Some(0.1));
        session.stop();

        let mut recorder = Recorder::default();
        assert_eq!(detection.run_frame(Some(ticket), &mut recorder), FrameOutcome::Stale);
        assert_eq!(recorder.frames.len(), 1);
        assert!(!recorder.frames[0].1.running);
        assert_eq!(session.score(), 0);
        assert_eq!(session.summary().stats.frames_processed, 0);
    }

    #[test]
    fn test_warmed_up_loop_presents_before_start() {
        let (session, settings) = setup(DetectionMode::SinglePose);
        let mut detection = DetectionLoop::new(
            SyntheticCamera::new(60.0),
            SyntheticPerformer::new(Vec2::new(1300.0, 800.0)),
            DetectionConfig::from_settings(&settings),
            session.clone(),
        );
        detection.warm_up().unwrap();

        let mut recorder = Recorder::default();
        for _ in 0..3 {
            assert_eq!(detection.run_frame(None, &mut recorder), FrameOutcome::Idle);
        }
        assert_eq!(recorder.frames.len(), 3);
        assert!(recorder.frames.iter().all(|(n, view)| *n == 1 && !view.running));
        assert_eq!(session.summary().stats.frames_processed, 0);
    }

    #[test]
    fn test_idle_frames_need_warm_up() {
        let (session, settings) = setup(DetectionMode::SinglePose);
        let mut detection = DetectionLoop::new(
            SyntheticCamera::new(60.0),
            SyntheticPerformer::new(Vec2::new(1300.0, 800.0)),
            DetectionConfig::from_settings(&settings),
            session,
        );

        let mut recorder = Recorder::default();
        assert_eq!(detection.run_frame(None, &mut recorder), FrameOutcome::Skipped);
        assert!(recorder.frames.is_empty());
    }

    #[test]
    fn test_low_confidence_poses_are_not_presented() {
        let (session, mut settings) = setup(DetectionMode::SinglePose);
        settings.min_pose_confidence = 0.95;
        let mut detection = DetectionLoop::new(
            SyntheticCamera::new(60.0),
            SyntheticPerformer::new(Vec2::new(1300.0, 800.0)),
            DetectionConfig::from_settings(&settings),
            session.clone(),
        );
        detection.warm_up().unwrap();
        let ticket = session.start(&ManualClock::at(0.0)).unwrap();

        let mut recorder = Recorder::default();
        detection.run_frame(Some(ticket), &mut recorder);
        assert_eq!(recorder.frames[0].0, 0);
    }
}
