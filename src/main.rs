//! Beat Bubble entry point
//!
//! The web build wires the webcam, PoseNet and the song to the game core.
//! The native build plays a headless session with a synthetic performer.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;

    use beat_bubble::audio::{AudioManager, SoundEffect};
    use beat_bubble::game::{
        DetectionConfig, DetectionLoop, GameEvent, GameSession, PollOutcome, SessionTicket,
    };
    use beat_bubble::platform::AudioClock;
    use beat_bubble::platform::web::{CanvasPresenter, PoseFeed, WebCamera, WebPoseModel};
    use beat_bubble::{HighScores, Settings};

    /// Game instance holding all state
    struct Game {
        settings: Settings,
        session: GameSession,
        detection: DetectionLoop<WebCamera, WebPoseModel>,
        presenter: CanvasPresenter,
        feed: PoseFeed,
        audio: AudioManager,
        high_scores: HighScores,
        ticket: Option<SessionTicket>,
        /// An estimate is awaiting the model
        estimating: bool,
        /// setInterval handle and its callback
        poller: Option<(i32, Closure<dyn FnMut()>)>,
    }

    impl Game {
        fn new(settings: Settings, session: GameSession, feed: PoseFeed) -> Self {
            let detection = DetectionLoop::new(
                feed.camera(),
                feed.model(),
                DetectionConfig::from_settings(&settings),
                session.clone(),
            );
            Self {
                presenter: CanvasPresenter::new(&settings.model),
                audio: AudioManager::new(&settings.song.url),
                high_scores: HighScores::load(),
                settings,
                session,
                detection,
                feed,
                ticket: None,
                estimating: false,
                poller: None,
            }
        }

        fn clear_poller(&mut self) {
            if let Some((handle, _closure)) = self.poller.take() {
                if let Some(window) = web_sys::window() {
                    window.clear_interval_with_handle(handle);
                }
            }
        }

        /// End the session and record it
        fn finish(&mut self) {
            self.clear_poller();
            self.audio.stop_song();
            self.ticket = None;
            if let Some(summary) = self.session.stop() {
                log::info!(
                    "Session {} ended: {} hits / {} bubbles",
                    summary.generation,
                    summary.score,
                    summary.stats.targets_spawned
                );
                if let Some(rank) = self.high_scores.record(&summary, js_sys::Date::now()) {
                    log::info!("New high score, rank {}", rank);
                    self.audio.play(SoundEffect::HighScore);
                    self.high_scores.save();
                }
            }
            set_class("start-btn", "");
        }

        /// Turn drained events into sounds
        fn handle_events(&self) {
            for event in self.session.drain_events() {
                match event {
                    GameEvent::TargetSpawned { .. } => self.audio.play(SoundEffect::TargetSpawn),
                    GameEvent::TargetHit { .. } => self.audio.play(SoundEffect::TargetHit),
                    GameEvent::ScheduleFinished { score } => {
                        log::info!("Last beat reached with {} hits", score);
                        self.audio.play(SoundEffect::ScheduleFinished);
                    }
                    GameEvent::SessionStarted { .. } | GameEvent::SessionStopped { .. } => {}
                }
            }
        }
    }

    fn set_class(id: &str, class: &str) {
        let el = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(id));
        if let Some(el) = el {
            let _ = el.set_attribute("class", class);
        }
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Beat Bubble starting...");

        let settings = Settings::load();
        let schedule = match settings.schedule() {
            Ok(schedule) => schedule,
            Err(e) => {
                log::error!("Bad beat schedule: {}", e);
                return;
            }
        };
        log::info!("{} beats loaded for {}", schedule.len(), settings.song.url);

        let seed = js_sys::Date::now() as u64;
        let session = match GameSession::new(&settings, schedule, seed) {
            Ok(session) => session,
            Err(e) => {
                log::error!("Cannot create session: {}", e);
                return;
            }
        };

        let feed = PoseFeed::new();
        if let Err(e) = feed.open_camera(&settings).await {
            log::error!("{}", e);
            set_class("camera-error", "");
            return;
        }
        if let Err(e) = feed.load_model(&settings.model).await {
            log::error!("{}", e);
            return;
        }

        // Hide loading indicator
        set_class("loading", "hidden");

        let game = Rc::new(RefCell::new(Game::new(settings, session, feed)));

        if let Err(e) = game.borrow_mut().detection.warm_up() {
            log::error!("{}", e);
            return;
        }

        setup_start_button(game.clone());
        setup_song_end(game.clone());

        set_class("hud", "");

        // Start detection loop
        request_animation_frame(game);

        log::info!("Beat Bubble running!");
    }

    /// Runs inside the click handler so playback is allowed to begin
    fn start_session(game: Rc<RefCell<Game>>) {
        let (playing, resume) = {
            let mut g = game.borrow_mut();
            g.clear_poller();
            (g.audio.play_song(), g.audio.resume())
        };

        wasm_bindgen_futures::spawn_local(async move {
            resume.await;
            // Beat time is the song position, readable once playback began
            if !playing.await {
                log::error!("Cannot start: song did not play");
                return;
            }

            let mut g = game.borrow_mut();
            let ticket = match g.session.start(&g.audio) {
                Ok(ticket) => ticket,
                Err(e) => {
                    log::error!("Cannot start: {}", e);
                    g.audio.stop_song();
                    return;
                }
            };
            g.ticket = Some(ticket);

            let poll_game = game.clone();
            let closure = Closure::<dyn FnMut()>::new(move || {
                let Ok(g) = poll_game.try_borrow() else {
                    return;
                };
                let now = g.audio.current_time();
                match g.session.poll_beats(ticket, now) {
                    PollOutcome::Continue => {}
                    PollOutcome::Finished | PollOutcome::Stale => {
                        // Callback stays owned by Game until the next start
                        if let Some((handle, _)) = &g.poller {
                            if let Some(window) = web_sys::window() {
                                window.clear_interval_with_handle(*handle);
                            }
                        }
                    }
                }
            });

            let handle = web_sys::window().and_then(|w| {
                w.set_interval_with_callback_and_timeout_and_arguments_0(
                    closure.as_ref().unchecked_ref(),
                    g.settings.poll_interval_ms as i32,
                )
                .ok()
            });
            match handle {
                Some(handle) => {
                    g.poller = Some((handle, closure));
                    set_class("start-btn", "hidden");
                    log::info!("Session {} started", ticket.generation());
                }
                None => {
                    log::error!("Could not schedule the beat poller");
                    g.session.stop();
                    g.ticket = None;
                }
            }
        });
    }

    fn setup_start_button(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        if let Some(btn) = document.get_element_by_id("start-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                start_session(game.clone());
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    /// The session ends with the song
    fn setup_song_end(game: Rc<RefCell<Game>>) {
        let song = game.borrow().audio.song().cloned();
        if let Some(song) = song {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                game.borrow_mut().finish();
            });
            let _ = song.add_event_listener_with_callback("ended", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::once(move |_time: f64| {
            game_loop(game);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// One display frame: kick off an estimate if none is in flight.
    /// Frames are drawn before Start and after the song too; only scoring
    /// needs a session.
    fn game_loop(game: Rc<RefCell<Game>>) {
        let request = {
            let mut g = game.borrow_mut();
            g.handle_events();
            if g.estimating {
                None
            } else {
                g.estimating = true;
                Some((g.feed.clone(), g.settings.mode, g.settings.model))
            }
        };

        if let Some((feed, mode, model)) = request {
            let game = game.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let estimated = feed.estimate(mode, &model).await;
                let mut g = game.borrow_mut();
                g.estimating = false;
                let ticket = g.ticket;
                match (estimated, ticket) {
                    (Ok(()), _) => {
                        let Game {
                            detection,
                            presenter,
                            ..
                        } = &mut *g;
                        detection.run_frame(ticket, presenter);
                    }
                    (Err(e), Some(ticket)) => {
                        g.session.record_skipped_frame(ticket, &e);
                    }
                    (Err(e), None) => log::debug!("Skipping idle frame: {}", e),
                }
            });
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
mod native_demo {
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    use glam::Vec2;

    use beat_bubble::game::{DetectionConfig, DetectionLoop, GameEvent, GameSession, TimerPhase};
    use beat_bubble::platform::native::MonotonicClock;
    use beat_bubble::platform::synthetic::{LogPresenter, SyntheticCamera, SyntheticPerformer};
    use beat_bubble::runtime::NativeRuntime;
    use beat_bubble::{HighScores, Result, Settings};

    const HIGH_SCORES_FILE: &str = "beat_bubble_highscores.json";
    const DEFAULT_PLAY_SECONDS: f64 = 30.0;

    /// `beat-bubble [settings.json] [seconds]`
    pub fn run() -> Result<()> {
        let mut args = std::env::args().skip(1);
        let settings = match args.next() {
            Some(path) => Settings::load_from(Path::new(&path))?,
            None => Settings::default(),
        };
        let play_for = args
            .next()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_PLAY_SECONDS);

        let schedule = settings.schedule()?;
        log::info!("{} beats, playing for {:.0}s", schedule.len(), play_for);

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let session = GameSession::new(&settings, schedule, now.as_nanos() as u64)?;

        let fps = 1000.0 / settings.frame_interval_ms as f64;
        let playfield = Vec2::new(settings.playfield_width, settings.playfield_height);
        let detection = DetectionLoop::new(
            SyntheticCamera::new(fps),
            SyntheticPerformer::new(playfield).with_failures(50),
            DetectionConfig::from_settings(&settings),
            session.clone(),
        );
        let mut runtime = NativeRuntime::new(
            Arc::new(MonotonicClock::new()),
            detection,
            LogPresenter::default(),
            settings.poll_interval(),
            settings.frame_interval(),
        );

        runtime.start()?;

        let deadline = Instant::now() + Duration::from_secs_f64(play_for);
        while Instant::now() < deadline {
            for event in session.drain_events() {
                match event {
                    GameEvent::TargetSpawned { target } => log::info!(
                        "Bubble {} on beat {} at ({:.0}, {:.0})",
                        target.id,
                        target.beat_index,
                        target.target.bubble.x,
                        target.target.bubble.y
                    ),
                    GameEvent::TargetHit { target_id, score } => {
                        log::info!("Hit bubble {} (score {})", target_id, score)
                    }
                    other => log::debug!("{:?}", other),
                }
            }
            if session.snapshot().timer_phase == TimerPhase::Finished {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }

        let Some(summary) = runtime.stop() else {
            return Ok(());
        };
        log::info!(
            "Final score {} / {} bubbles ({} frames, {} skipped)",
            summary.score,
            summary.stats.targets_spawned,
            summary.stats.frames_processed,
            summary.stats.frames_skipped
        );

        let path = Path::new(HIGH_SCORES_FILE);
        let mut high_scores = HighScores::load_from(path)?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as f64;
        if let Some(rank) = high_scores.record(&summary, timestamp) {
            log::info!("New high score, rank {}", rank);
            high_scores.save_to(path)?;
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Beat Bubble (native) starting...");

    if let Err(e) = native_demo::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
