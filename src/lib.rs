//! # Manifest Mixer
//!
//! Voice + background music mixing and playback for personalized
//! manifestation audio.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                           PLAYER SHELL (player::shell)                   │
//! │  play/pause · seek-by-click · speed menu · downloads · mixing controls   │
//! └───────────────┬──────────────────────────────────────┬───────────────────┘
//!                 │ transport gestures                   │ prop changes
//!                 ▼                                      ▼
//! ┌──────────────────────────────┐      ┌──────────────────────────────────┐
//! │  Playback Synchronizer       │      │  Volume / Track Reactivity       │
//! │  (player::session)           │      │  (player::props → session)       │
//! │  Stopped ⇄ Playing ⇄ Paused  │      │  exp. approach · track rebind    │
//! │  fade timer (player::fade)   │      │                                  │
//! └───────────────┬──────────────┘      └────────────────┬─────────────────┘
//!                 │                                      │
//!                 ▼                                      ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                    Audio Graph Manager (audio::graph)                    │
//! │                                                                          │
//! │   Voice MediaElement ──► GainStage ──┐                                   │
//! │                                      ├──► OutputContext ──► cpal device  │
//! │   Background MediaElement ─► GainStage ┘   (AudioClock)     or headless  │
//! └──────────────────────────────────────────────────────────────────────────┘
//!                 ▲
//!                 │ decoded PCM at the context rate (audio::decode, audio::loader,
//!                 │ audio::resample)
//! ┌───────────────┴──────────────────────────────────────────────────────────┐
//! │  Backend REST client (network::client) · Track catalog (tracks)          │
//! │  Audio workflow + media store (flow) · Offline mixdown (mixdown)         │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod flow;
pub mod mixdown;
pub mod network;
pub mod player;
pub mod protocol;
pub mod tracks;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default output sample rate
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default output channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Highest fraction of full scale the background may reach
    pub const BACKGROUND_CEILING: f32 = 0.40;

    /// Background fade-in when playback starts, in seconds
    pub const PLAY_FADE_IN_SECS: f64 = 1.0;

    /// Background fade-in when it is re-enabled or its track switches, in seconds
    pub const ENABLE_FADE_IN_SECS: f64 = 0.5;

    /// Background fade-out before it is paused, in seconds
    pub const FADE_OUT_SECS: f64 = 1.5;

    /// Time constant of the exponential approach used for volume changes
    pub const VOLUME_TIME_CONSTANT_SECS: f64 = 0.1;

    /// Interval between `TimeUpdate` events from a playing element
    pub const TIME_UPDATE_INTERVAL_SECS: f64 = 0.25;

    /// Largest accepted background upload (10 MiB)
    pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

    /// Extensions accepted for background uploads
    pub const UPLOAD_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

    /// Playback speeds offered by the speed menu
    pub const PLAYBACK_SPEEDS: [f64; 4] = [0.75, 1.0, 1.25, 1.5];

    /// Default voice volume percent
    pub const DEFAULT_VOICE_VOLUME: u8 = 100;

    /// Default background volume percent
    pub const DEFAULT_BACKGROUND_VOLUME: u8 = 20;

    /// Catalog id of the backend's recommended track
    pub const DEFAULT_TRACK_ID: &str = "default-meditation";

    /// Pseudo track id meaning "no background" in finalize requests
    pub const NO_TRACK_ID: &str = "none";

    /// Default backend base URL
    pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

    /// Fade applied to each end of the background in an offline mixdown, in seconds
    pub const MIXDOWN_FADE_SECS: f64 = 2.0;
}
