//! Audio system using Web Audio API
//!
//! The song's playback position drives the beat timer. Sound effects are
//! procedurally generated on an `AudioContext`; the song itself streams from
//! an audio element.

use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AudioContext, GainNode, HtmlAudioElement, HtmlMediaElement, OscillatorNode, OscillatorType,
};

use crate::platform::{AudioClock, Playback, SongClock};

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// New bubble on screen
    TargetSpawn,
    /// Bubble popped by the performer
    TargetHit,
    /// Last beat of the song reached
    ScheduleFinished,
    /// Session made the leaderboard
    HighScore,
}

/// Audio manager: playback clock, song and effects
pub struct AudioManager {
    ctx: Option<AudioContext>,
    song: Option<HtmlAudioElement>,
    master_volume: f32,
    sfx_volume: f32,
    music_volume: f32,
}

impl AudioManager {
    pub fn new(song_url: &str) -> Self {
        // Try to create audio context (may fail if not in secure context)
        let ctx = AudioContext::new().ok();
        if ctx.is_none() {
            log::warn!("Failed to create AudioContext - audio disabled");
        }
        let song = HtmlAudioElement::new_with_src(song_url).ok();
        if song.is_none() {
            log::warn!("Could not load song {}", song_url);
        }
        Self {
            ctx,
            song,
            master_volume: 0.8,
            sfx_volume: 1.0,
            music_volume: 0.7,
        }
    }

    /// Resume the effects context (required after user gesture)
    pub fn resume(&self) -> impl Future<Output = ()> + 'static {
        let promise = self.ctx.as_ref().map(|ctx| ctx.resume());
        async move {
            match promise {
                Some(Ok(promise)) => {
                    if JsFuture::from(promise).await.is_err() {
                        log::warn!("AudioContext refused to resume");
                    }
                }
                Some(Err(_)) => log::warn!("AudioContext resume failed"),
                None => {}
            }
        }
    }

    /// Rewind and play the song from t=0.
    ///
    /// Call from the user gesture. Resolves to `true` once playback has
    /// actually begun.
    pub fn play_song(&self) -> impl Future<Output = bool> + 'static {
        let promise = self.song.as_ref().map(|song| {
            song.set_current_time(0.0);
            song.set_volume((self.master_volume * self.music_volume) as f64);
            song.play()
        });
        async move {
            match promise {
                Some(Ok(promise)) => match JsFuture::from(promise).await {
                    Ok(_) => true,
                    Err(e) => {
                        log::warn!("Song playback was refused: {:?}", e);
                        false
                    }
                },
                Some(Err(e)) => {
                    log::warn!("Song playback failed: {:?}", e);
                    false
                }
                None => false,
            }
        }
    }

    /// The song element, for `ended` listeners
    pub fn song(&self) -> Option<&HtmlAudioElement> {
        self.song.as_ref()
    }

    pub fn stop_song(&self) {
        if let Some(song) = &self.song {
            let _ = song.pause();
        }
    }

    /// Play a sound effect
    pub fn play(&self, effect: SoundEffect) {
        let vol = self.master_volume * self.sfx_volume;
        if vol <= 0.0 {
            return;
        }
        let Some(ctx) = &self.ctx else { return };

        match effect {
            SoundEffect::TargetSpawn => self.play_spawn(ctx, vol),
            SoundEffect::TargetHit => self.play_hit(ctx, vol),
            SoundEffect::ScheduleFinished => self.play_arpeggio(ctx, vol, &[400.0, 500.0, 600.0, 800.0], 0.1),
            SoundEffect::HighScore => {
                self.play_arpeggio(ctx, vol, &[500.0, 600.0, 700.0, 800.0, 1000.0], 0.08)
            }
        }
    }

    /// Create an oscillator with gain envelope
    fn create_osc(
        &self,
        ctx: &AudioContext,
        freq: f32,
        osc_type: OscillatorType,
    ) -> Option<(OscillatorNode, GainNode)> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;

        osc.set_type(osc_type);
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&ctx.destination()).ok()?;

        Some((osc, gain))
    }

    /// Spawn - soft rising pop
    fn play_spawn(&self, ctx: &AudioContext, vol: f32) {
        let Some((osc, gain)) = self.create_osc(ctx, 300.0, OscillatorType::Sine) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain().set_value_at_time(vol * 0.2, t).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.01, t + 0.12)
            .ok();
        osc.frequency()
            .exponential_ramp_to_value_at_time(600.0, t + 0.1)
            .ok();

        osc.start().ok();
        osc.stop_with_when(t + 0.15).ok();
    }

    /// Hit - bright two-note chime
    fn play_hit(&self, ctx: &AudioContext, vol: f32) {
        for (i, freq) in [880.0, 1320.0].iter().enumerate() {
            if let Some((osc, gain)) = self.create_osc(ctx, *freq, OscillatorType::Triangle) {
                let t = ctx.current_time() + i as f64 * 0.06;
                gain.gain().set_value_at_time(vol * 0.35, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.01, t + 0.25)
                    .ok();
                osc.start_with_when(t).ok();
                osc.stop_with_when(t + 0.3).ok();
            }
        }
    }

    fn play_arpeggio(&self, ctx: &AudioContext, vol: f32, notes: &[f32], spacing: f64) {
        for (i, freq) in notes.iter().enumerate() {
            if let Some((osc, gain)) = self.create_osc(ctx, *freq, OscillatorType::Triangle) {
                let t = ctx.current_time() + i as f64 * spacing;
                gain.gain().set_value_at_time(vol * 0.25, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.01, t + 0.3)
                    .ok();
                osc.start_with_when(t).ok();
                osc.stop_with_when(t + 0.35).ok();
            }
        }
    }
}

impl Playback for HtmlAudioElement {
    fn position(&self) -> f64 {
        HtmlMediaElement::current_time(self)
    }

    fn is_playing(&self) -> bool {
        !self.paused() && !self.ended()
    }
}

impl AudioClock for AudioManager {
    /// Song position, while the song plays
    fn current_time(&self) -> Option<f64> {
        SongClock::new(self.song.as_ref()?).current_time()
    }
}
