//! Media elements
//!
//! A `MediaElement` is one transport: a media locator bound to decoded PCM,
//! a play/pause status, a position, a loop flag and a playback rate. The
//! control side drives it; the output context's render thread pulls samples
//! from it. Lifecycle events go out to subscribers over channels.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::audio::buffer::SharedPcm;
use crate::audio::loader::MediaLoader;
use crate::constants::TIME_UPDATE_INTERVAL_SECS;
use crate::error::AudioError;

/// Transport lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Position moved during playback (seconds)
    TimeUpdate { position: f64, duration: f64 },
    /// New media decoded; duration is known
    LoadedMetadata { duration: f64 },
    /// Reached the end of non-looping media
    Ended,
}

struct ElementState {
    src: Option<String>,
    media: Option<SharedPcm>,
    /// Position in source frames
    position: f64,
    paused: bool,
    looping: bool,
    rate: f64,
    ended: bool,
    listeners: Vec<Sender<TransportEvent>>,
    /// Output seconds rendered since the last `TimeUpdate`
    since_time_update: f64,
}

impl ElementState {
    fn emit(&mut self, event: TransportEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn position_secs(&self) -> f64 {
        match &self.media {
            Some(media) if media.sample_rate > 0 => self.position / media.sample_rate as f64,
            _ => 0.0,
        }
    }

    fn duration_secs(&self) -> Option<f64> {
        self.media.as_ref().map(|m| m.duration_secs())
    }
}

/// A playable media transport
#[derive(Clone)]
pub struct MediaElement {
    name: &'static str,
    state: Arc<Mutex<ElementState>>,
}

impl MediaElement {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(ElementState {
                src: None,
                media: None,
                position: 0.0,
                paused: true,
                looping: false,
                rate: 1.0,
                ended: false,
                listeners: Vec::new(),
                since_time_update: 0.0,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Bind a new locator. The element pauses and rewinds first; on success
    /// subscribers receive `LoadedMetadata`. `None` unloads.
    pub fn load(&self, url: Option<&str>, loader: &dyn MediaLoader) -> Result<(), AudioError> {
        {
            let mut state = self.state.lock();
            state.paused = true;
            state.ended = false;
            state.position = 0.0;
            state.since_time_update = 0.0;
            state.src = url.map(str::to_string);
            state.media = None;
        }

        let Some(url) = url else {
            return Ok(());
        };

        // Decode outside the lock so rendering is not blocked
        let media = loader.load(url)?;

        let mut state = self.state.lock();
        if state.src.as_deref() != Some(url) {
            // Rebound while decoding
            return Ok(());
        }
        let duration = media.duration_secs();
        state.media = Some(media);
        state.emit(TransportEvent::LoadedMetadata { duration });
        tracing::debug!(element = self.name, url, duration, "media loaded");
        Ok(())
    }

    pub fn src(&self) -> Option<String> {
        self.state.lock().src.clone()
    }

    pub fn has_media(&self) -> bool {
        self.state.lock().media.is_some()
    }

    /// The decoded media currently bound
    pub fn media(&self) -> Option<SharedPcm> {
        self.state.lock().media.clone()
    }

    /// Start or resume playback
    pub fn play(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if state.media.is_none() {
            return Err(match &state.src {
                Some(src) => AudioError::MediaNotFound(src.clone()),
                None => AudioError::NoSource,
            });
        }
        if state.ended {
            state.ended = false;
            state.position = 0.0;
        }
        state.paused = false;
        Ok(())
    }

    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn has_ended(&self) -> bool {
        self.state.lock().ended
    }

    /// Current position in seconds
    pub fn position(&self) -> f64 {
        self.state.lock().position_secs()
    }

    /// Move to `seconds`, clamped to the media
    pub fn seek(&self, seconds: f64) {
        let mut state = self.state.lock();
        let Some(media) = state.media.clone() else {
            return;
        };
        let seconds = if seconds.is_finite() { seconds } else { 0.0 };
        let frame = (seconds * media.sample_rate as f64).clamp(0.0, media.frames() as f64);
        state.position = frame;
        state.ended = false;
    }

    /// Media duration in seconds, once loaded
    pub fn duration(&self) -> Option<f64> {
        self.state.lock().duration_secs()
    }

    pub fn set_playback_rate(&self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.state.lock().rate = rate;
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.state.lock().rate
    }

    pub fn set_looping(&self, looping: bool) {
        self.state.lock().looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    /// Receive this element's lifecycle events until the receiver is dropped
    pub fn subscribe(&self) -> Receiver<TransportEvent> {
        let (tx, rx) = unbounded();
        self.state.lock().listeners.push(tx);
        rx
    }

    /// Drop every subscription
    pub fn detach_listeners(&self) {
        self.state.lock().listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Mix `gains.len()` frames of this element into interleaved `out`,
    /// scaling frame `i` by `gains[i]`
    pub fn render_add(&self, out: &mut [f32], gains: &[f32], channels: u16, sample_rate: u32) {
        let mut state = self.state.lock();
        if state.paused {
            return;
        }
        let Some(media) = state.media.clone() else {
            return;
        };
        let source_frames = media.frames() as f64;
        let step = state.rate * media.sample_rate as f64 / sample_rate.max(1) as f64;
        let channels = channels.max(1) as usize;

        let mut rendered = 0usize;
        for (i, gain) in gains.iter().enumerate() {
            if state.position >= source_frames {
                if state.looping && source_frames > 0.0 {
                    state.position %= source_frames;
                } else {
                    state.position = source_frames;
                    state.paused = true;
                    state.ended = true;
                    break;
                }
            }

            let base = i * channels;
            for ch in 0..channels {
                if let Some(slot) = out.get_mut(base + ch) {
                    *slot += media.sample_interpolated(state.position, ch as u16) * gain;
                }
            }
            state.position += step;
            rendered += 1;
        }

        state.since_time_update += rendered as f64 / sample_rate.max(1) as f64;
        if state.ended {
            let duration = media.duration_secs();
            state.emit(TransportEvent::TimeUpdate {
                position: duration,
                duration,
            });
            state.emit(TransportEvent::Ended);
            state.since_time_update = 0.0;
        } else if state.since_time_update >= TIME_UPDATE_INTERVAL_SECS {
            state.since_time_update = 0.0;
            let position = state.position_secs();
            let duration = media.duration_secs();
            state.emit(TransportEvent::TimeUpdate { position, duration });
        }
    }
}

impl std::fmt::Debug for MediaElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MediaElement")
            .field("name", &self.name)
            .field("src", &state.src)
            .field("paused", &state.paused)
            .field("looping", &state.looping)
            .field("rate", &state.rate)
            .finish()
    }
}
