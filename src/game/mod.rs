//! Timing and gameplay core
//!
//! Everything here is platform-free:
//! - Audio time is passed in, never read from a global clock
//! - Seeded RNG only
//! - One lock around all state the two loops share

pub mod beats;
pub mod detection;
pub mod hit;
pub mod pose;
pub mod session;
pub mod state;
pub mod target;
pub mod timer;

pub use beats::BeatSchedule;
pub use detection::{DetectionConfig, DetectionLoop};
pub use hit::{HitResult, HitTester};
pub use pose::{BodyPart, Keypoint, Pose};
pub use session::{FrameOutcome, GameSession, PollOutcome, SessionTicket};
pub use state::{GameEvent, SessionSnapshot, SessionState, SessionStats, SessionSummary};
pub use target::{ActiveTarget, Bounds, HitEnvelope, Target, TargetGenerator};
pub use timer::{BeatTimer, TimerPhase, TimerTick};
