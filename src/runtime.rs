//! Native session driver
//!
//! Runs the beat poller and the detection loop on two threads that share
//! one `GameSession`:
//! - poller: wakes on a fixed wall-clock tick, reads the audio clock, may spawn
//! - detection: frame-paced, estimates poses and hit-tests
//!
//! Stopping cancels the poller through its channel and stales the ticket the
//! detection thread checks each cycle; both threads are joined.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};

use crate::error::{GameError, Result};
use crate::game::{DetectionLoop, GameSession, PollOutcome, SessionSummary, SessionTicket};
use crate::platform::{AudioClock, FrameSource, PoseModel, Presenter};

struct Workers<S, M, P> {
    ticket: SessionTicket,
    cancel: Sender<()>,
    poller: JoinHandle<()>,
    detector: JoinHandle<(DetectionLoop<S, M>, P)>,
}

/// Owns the collaborators and the threads of one running session at a time
pub struct NativeRuntime<C, S, M, P> {
    session: GameSession,
    clock: Arc<C>,
    poll_interval: Duration,
    frame_interval: Duration,
    /// Detection pipeline and presenter while no session runs
    parked: Option<(DetectionLoop<S, M>, P)>,
    workers: Option<Workers<S, M, P>>,
}

impl<C, S, M, P> NativeRuntime<C, S, M, P>
where
    C: AudioClock + Send + Sync + 'static,
    S: FrameSource + Send + 'static,
    M: PoseModel<S::Frame> + Send + 'static,
    P: Presenter + Send + 'static,
{
    pub fn new(
        clock: Arc<C>,
        detection: DetectionLoop<S, M>,
        presenter: P,
        poll_interval: Duration,
        frame_interval: Duration,
    ) -> Self {
        Self {
            session: detection.session().clone(),
            clock,
            poll_interval,
            frame_interval,
            parked: Some((detection, presenter)),
            workers: None,
        }
    }

    /// Warm up detection, start the session and spawn both loops.
    ///
    /// A running session is stopped first so no poller outlives its session.
    /// Camera or model failure leaves the session idle.
    pub fn start(&mut self) -> Result<SessionTicket> {
        self.stop();

        let (mut detection, presenter) = self
            .parked
            .take()
            .ok_or_else(|| GameError::CameraUnavailable("detection pipeline lost".into()))?;

        if let Err(e) = detection.warm_up() {
            log::error!("Cannot start: {}", e);
            self.parked = Some((detection, presenter));
            return Err(e);
        }

        let ticket = match self.session.start(self.clock.as_ref()) {
            Ok(ticket) => ticket,
            Err(e) => {
                log::error!("Cannot start: {}", e);
                self.parked = Some((detection, presenter));
                return Err(e);
            }
        };

        let (cancel, cancelled) = bounded::<()>(0);
        let poller = self.spawn_poller(ticket, cancelled)?;
        let detector = match self.spawn_detector(ticket, detection, presenter) {
            Ok(handle) => handle,
            Err(e) => {
                self.session.stop();
                drop(cancel);
                let _ = poller.join();
                return Err(e);
            }
        };

        self.workers = Some(Workers {
            ticket,
            cancel,
            poller,
            detector,
        });
        Ok(ticket)
    }

    /// Stop the session and join both threads. No-op when nothing runs.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        let workers = self.workers.take()?;
        let summary = self.session.stop();

        // Dropping the sender wakes the poller's select
        drop(workers.cancel);
        if workers.poller.join().is_err() {
            log::error!("Beat poller panicked");
        }
        match workers.detector.join() {
            Ok(parked) => self.parked = Some(parked),
            Err(_) => log::error!("Detection thread panicked"),
        }

        log::debug!("Session {} threads joined", workers.ticket.generation());
        summary
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.workers.is_some()
    }

    fn spawn_poller(&self, ticket: SessionTicket, cancelled: Receiver<()>) -> Result<JoinHandle<()>> {
        let session = self.session.clone();
        let clock = Arc::clone(&self.clock);
        let ticker = tick(self.poll_interval);

        let handle = thread::Builder::new()
            .name("beat-poller".to_string())
            .spawn(move || {
                log::debug!("Beat poller started");
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            match session.poll_beats(ticket, clock.current_time()) {
                                PollOutcome::Continue => {}
                                PollOutcome::Finished => {
                                    log::debug!("Beat poller finished");
                                    break;
                                }
                                PollOutcome::Stale => break,
                            }
                        }
                        recv(cancelled) -> _ => break,
                    }
                }
                log::debug!("Beat poller stopped");
            })?;
        Ok(handle)
    }

    fn spawn_detector(
        &self,
        ticket: SessionTicket,
        mut detection: DetectionLoop<S, M>,
        mut presenter: P,
    ) -> Result<JoinHandle<(DetectionLoop<S, M>, P)>> {
        let frame_interval = self.frame_interval;

        let handle = thread::Builder::new()
            .name("detection".to_string())
            .spawn(move || {
                log::debug!("Detection thread started");
                while detection.session().is_current(ticket) {
                    let start = Instant::now();
                    detection.run_frame(Some(ticket), &mut presenter);

                    // Throttle to display refresh
                    let elapsed = start.elapsed();
                    if elapsed < frame_interval {
                        thread::sleep(frame_interval - elapsed);
                    }
                }
                log::debug!("Detection thread stopped");
                (detection, presenter)
            })?;
        Ok(handle)
    }
}

impl<C, S, M, P> Drop for NativeRuntime<C, S, M, P> {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.take() {
            self.session.stop();
            drop(workers.cancel);
            let _ = workers.poller.join();
            let _ = workers.detector.join();
        }
    }
}
