//! Mix session
//!
//! Keeps one voice and one background source in step:
//!
//! - background plays iff the voice is playing, background is enabled and
//!   the mix is not finalized
//! - every gain change is a ramp (cancel → snapshot → schedule), never a
//!   hard cut, except the instant background pause on manual pause
//! - a fade-out pauses the background through a cancellable timer, so a
//!   quick re-enable wins over the pending pause
//!
//! Audio failures never leave this module: they are logged, reported
//! through the notifier, and the session carries on with what still works.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::element::TransportEvent;
use crate::audio::graph::{AudioGraph, GraphInput};
use crate::audio::loader::MediaLoader;
use crate::config::OutputConfig;
use crate::constants::*;
use crate::error::{AudioError, PlayerError};
use crate::player::fade::FadeTimer;
use crate::player::notify::Notifier;
use crate::player::props::{PlayerProps, PropChange};
use crate::tracks::catalog::TrackCatalog;

/// Transport state, derived from the voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Voice position as last reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    pub position: f64,
    pub duration: f64,
}

impl Progress {
    /// 0-100; 0 while the duration is unknown
    pub fn percent(&self) -> f64 {
        if self.duration > 0.0 && self.duration.is_finite() {
            (self.position / self.duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

/// Voice gain for a 0-100 volume
pub fn voice_gain_for(percent: u8) -> f32 {
    percent.min(100) as f32 / 100.0
}

/// Background gain for a 0-100 volume, under the ceiling
pub fn background_gain_for(percent: u8) -> f32 {
    voice_gain_for(percent) * BACKGROUND_CEILING
}

fn is_supported_speed(rate: f64) -> bool {
    PLAYBACK_SPEEDS.iter().any(|s| (s - rate).abs() < 1e-9)
}

/// One mounted player: graph, transport state and mix reactivity
pub struct MixSession {
    graph: AudioGraph,
    catalog: Arc<TrackCatalog>,
    notifier: Notifier,
    props: PlayerProps,
    state: PlaybackState,
    fade_out: FadeTimer,
    progress: Progress,
    playback_rate: f64,
}

impl MixSession {
    pub fn new(
        output: OutputConfig,
        loader: Arc<dyn MediaLoader>,
        catalog: Arc<TrackCatalog>,
        notifier: Notifier,
    ) -> Self {
        Self {
            graph: AudioGraph::new(output, loader),
            catalog,
            notifier,
            props: PlayerProps::new(""),
            state: PlaybackState::Stopped,
            fade_out: FadeTimer::new(),
            progress: Progress::default(),
            playback_rate: 1.0,
        }
    }

    /// Build the graph for `props.audio_url`, replacing any previous one
    pub fn mount(&mut self, props: PlayerProps) {
        self.fade_out.cancel();
        self.state = PlaybackState::Stopped;
        self.progress = Progress::default();

        let voice_gain = voice_gain_for(props.voice_volume);
        let background_gain = background_gain_for(props.background_volume);
        let url = props.audio_url.clone();
        self.props = props;

        if let Err(e) = self.graph.initialize(&url, voice_gain, background_gain) {
            self.notifier.recovered(format!("Could not load audio: {}", e));
        }
        if !self.graph.is_initialized() {
            return;
        }

        if let Some(voice) = self.graph.voice() {
            voice.element.set_playback_rate(self.playback_rate);
            if let Some(duration) = voice.element.duration() {
                self.progress.duration = duration;
            }
        }
        self.rebind_background();
        info!("Mix session mounted on {}", url);
    }

    /// Release the graph. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        self.fade_out.cancel();
        self.state = PlaybackState::Stopped;
        if self.graph.teardown() {
            info!("Mix session unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.graph.is_initialized()
    }

    /// React to a new set of owner-controlled inputs
    pub fn apply_props(&mut self, next: PlayerProps) {
        for change in self.props.diff(&next) {
            debug!(?change, "prop change");
            match change {
                PropChange::AudioUrl(_) => {
                    self.mount(next);
                    return;
                }
                PropChange::Finalized(finalized) => self.set_finalized(finalized),
                PropChange::BackgroundTrack(id) => self.set_background_track(id),
                PropChange::BackgroundEnabled(enabled) => self.set_background_enabled(enabled),
                PropChange::VoiceVolume(percent) => self.set_voice_volume(percent),
                PropChange::BackgroundVolume(percent) => self.set_background_volume(percent),
            }
        }
    }

    // --- transport ---

    pub fn toggle_play(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Stopped | PlaybackState::Paused => self.play(),
        }
    }

    pub fn play(&mut self) {
        let Some(voice) = self.graph.voice().cloned() else {
            return;
        };
        if self.state == PlaybackState::Playing {
            return;
        }

        if let Some(context) = self.graph.context() {
            if let Err(e) = context.resume() {
                self.notifier.recovered(format!("Could not play audio: {}", e));
                return;
            }
        }

        voice.element.set_playback_rate(self.playback_rate);
        if let Err(e) = voice.element.play() {
            self.notifier.recovered(format!("Could not play audio: {}", e));
            return;
        }
        self.state = PlaybackState::Playing;
        info!("Playback started");

        if self.background_intended() {
            self.fade_out.cancel();
            self.start_background(Some(0.0), PLAY_FADE_IN_SECS);
        }
    }

    /// Pause both transports at once
    pub fn pause(&mut self) {
        if let Some(voice) = self.graph.voice() {
            voice.element.pause();
        }
        if let Some(background) = self.graph.background() {
            background.element.pause();
        }
        self.fade_out.cancel();
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            info!("Playback paused");
        }
    }

    /// Seek the voice to `seconds`. The background is left alone.
    pub fn seek(&mut self, seconds: f64) {
        let Some(voice) = self.graph.voice() else {
            return;
        };
        voice.element.seek(seconds);
        self.progress.position = voice.element.position();
    }

    /// Seek the voice to a fraction of its duration, clamped to [0, 1]
    pub fn seek_fraction(&mut self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        let Some(duration) = self.graph.voice().and_then(|v| v.element.duration()) else {
            return;
        };
        self.seek(fraction.clamp(0.0, 1.0) * duration);
    }

    /// Set the voice playback speed; only the fixed speed set is accepted
    pub fn set_speed(&mut self, rate: f64) -> Result<(), PlayerError> {
        if !is_supported_speed(rate) {
            return Err(PlayerError::UnsupportedSpeed(rate));
        }
        self.playback_rate = rate;
        if let Some(voice) = self.graph.voice() {
            voice.element.set_playback_rate(rate);
        }
        debug!(rate, "playback speed");
        Ok(())
    }

    // --- mix reactivity ---

    pub fn set_voice_volume(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.props.voice_volume = percent;
        let now = self.now();
        if let Some(voice) = self.graph.voice() {
            voice
                .gain
                .approach(voice_gain_for(percent), now, VOLUME_TIME_CONSTANT_SECS);
        }
    }

    /// Applied while background is enabled; a pending fade-out wins and the
    /// value is used on the next fade-in
    pub fn set_background_volume(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.props.background_volume = percent;
        if self.fade_out.is_pending() {
            debug!(percent, "background volume deferred until fade-out settles");
            return;
        }
        if !self.props.background_enabled || self.props.finalized {
            return;
        }
        let now = self.now();
        if let Some(background) = self.graph.background() {
            background.gain.approach(
                background_gain_for(percent),
                now,
                VOLUME_TIME_CONSTANT_SECS,
            );
        }
    }

    pub fn set_background_enabled(&mut self, enabled: bool) {
        if self.props.background_enabled == enabled {
            return;
        }
        self.props.background_enabled = enabled;
        if self.state != PlaybackState::Playing || self.props.finalized {
            return;
        }

        if enabled {
            self.fade_out.cancel();
            self.start_background(None, ENABLE_FADE_IN_SECS);
        } else {
            self.fade_out_background();
        }
    }

    /// Select a background track. `None` means the catalog default; the
    /// `none` id means no background at all.
    pub fn set_background_track(&mut self, id: Option<String>) {
        self.props.selected_track_id = id;
        self.rebind_background();
    }

    pub fn set_finalized(&mut self, finalized: bool) {
        if self.props.finalized == finalized {
            return;
        }
        self.props.finalized = finalized;
        if self.state != PlaybackState::Playing {
            return;
        }

        if finalized {
            if self.background_playing() {
                self.fade_out_background();
            }
        } else if self.props.background_enabled {
            self.fade_out.cancel();
            self.start_background(None, ENABLE_FADE_IN_SECS);
        }
    }

    /// Bind the background to the selected track, resuming it with a
    /// fade-in when it is meant to be audible
    pub fn rebind_background(&mut self) {
        let Some(background) = self.graph.background().cloned() else {
            return;
        };

        let selected = self.props.selected_track_id.clone();
        if selected.as_deref() == Some(NO_TRACK_ID) {
            self.fade_out.cancel();
            background.element.pause();
            return;
        }
        let Some(id) = self.catalog.initial_selection(selected.as_deref()) else {
            return;
        };
        let Some(track) = self.catalog.get(&id) else {
            warn!("Unknown background track {}", id);
            return;
        };
        if selected.is_none() {
            self.props.selected_track_id = Some(id);
        }
        if background.element.src().as_deref() == Some(track.url.as_str())
            && background.element.has_media()
        {
            return;
        }

        let audible = self.background_intended();
        self.fade_out.cancel();
        match self.graph.set_track_for_background(&track.url, audible) {
            Ok(()) => {
                info!("Background track: {}", track.display_name);
                if audible {
                    let now = self.now();
                    background.gain.ramp_to(
                        background_gain_for(self.props.background_volume),
                        now,
                        ENABLE_FADE_IN_SECS,
                    );
                }
            }
            Err(e) => self.background_failed(e),
        }
    }

    // --- driving ---

    /// Handle pending voice events and fire the fade-out timer. Returns
    /// the events handled.
    pub fn tick(&mut self) -> Vec<TransportEvent> {
        let events: Vec<TransportEvent> = match self.graph.voice_events() {
            Some(rx) => rx.try_iter().collect(),
            None => return Vec::new(),
        };

        for event in &events {
            match *event {
                TransportEvent::TimeUpdate { position, duration } => {
                    self.progress = Progress { position, duration };
                }
                TransportEvent::LoadedMetadata { duration } => {
                    self.progress.duration = duration;
                }
                TransportEvent::Ended => self.handle_voice_ended(),
            }
        }

        let now = self.now();
        if self.fade_out.poll(now) {
            if let Some(background) = self.graph.background() {
                background.element.pause();
                debug!("background paused after fade-out");
            }
        }
        events
    }

    /// Render `seconds` when nothing else drives the output, then tick
    pub fn drive(&mut self, seconds: f64) -> Vec<TransportEvent> {
        if let Some(context) = self.graph.context() {
            if !context.is_driven() {
                context.advance(seconds, 256);
            }
        }
        self.tick()
    }

    fn handle_voice_ended(&mut self) {
        self.state = PlaybackState::Stopped;
        if let Some(voice) = self.graph.voice() {
            voice.element.seek(0.0);
        }
        self.progress.position = 0.0;
        info!("Voice finished");

        if self.background_playing() {
            self.fade_out_background();
        }
    }

    fn fade_out_background(&mut self) {
        let now = self.now();
        let Some(background) = self.graph.background() else {
            return;
        };
        background.gain.ramp_to(0.0, now, FADE_OUT_SECS);
        self.fade_out.arm(now + FADE_OUT_SECS);
        debug!("background fading out");
    }

    fn start_background(&mut self, from: Option<f32>, duration: f64) {
        let Some(background) = self.graph.background().cloned() else {
            return;
        };
        if let Err(e) = background.element.play() {
            self.background_failed(e);
            return;
        }
        let now = self.now();
        let target = background_gain_for(self.props.background_volume);
        match from {
            Some(from) => background.gain.ramp_from(from, target, now, duration),
            None => {
                background.gain.ramp_to(target, now, duration);
            }
        }
    }

    fn background_failed(&self, err: AudioError) {
        match err {
            AudioError::NoSource => debug!("no background track bound"),
            err => {
                self.notifier
                    .recovered(format!("Could not play background music: {}", err));
            }
        }
    }

    fn background_intended(&self) -> bool {
        self.state == PlaybackState::Playing
            && self.props.background_enabled
            && !self.props.finalized
    }

    fn background_playing(&self) -> bool {
        self.graph
            .background()
            .map(|b| !b.element.is_paused())
            .unwrap_or(false)
    }

    // --- accessors ---

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn props(&self) -> &PlayerProps {
        &self.props
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn fade_out_pending(&self) -> bool {
        self.fade_out.is_pending()
    }

    /// Output clock time
    pub fn now(&self) -> f64 {
        self.graph.now()
    }

    pub fn voice(&self) -> Option<&GraphInput> {
        self.graph.voice()
    }

    pub fn background(&self) -> Option<&GraphInput> {
        self.graph.background()
    }

    /// Voice gain right now
    pub fn voice_gain(&self) -> Option<f32> {
        let now = self.now();
        self.graph.voice().map(|v| v.gain.value_at(now))
    }

    /// Background gain right now
    pub fn background_gain(&self) -> Option<f32> {
        let now = self.now();
        self.graph.background().map(|b| b.gain.value_at(now))
    }

    pub fn background_paused(&self) -> bool {
        !self.background_playing()
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn catalog(&self) -> &Arc<TrackCatalog> {
        &self.catalog
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}
