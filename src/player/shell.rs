//! Player control surface
//!
//! The thin layer a front end talks to: transport buttons, click-to-seek,
//! the speed menu, downloads, and the mixing controls that go inert once
//! the audio is finalized.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::audio::decode::decode_bytes;
use crate::audio::loader::{FileLoader, MemoryLoader};
use crate::constants::PLAYBACK_SPEEDS;
use crate::error::{PlayerError, Result};
use crate::network::client::ApiClient;
use crate::player::session::MixSession;
use crate::player::Control;
use crate::protocol::BackgroundTrack;
use crate::tracks::upload::UploadCandidate;

/// `m:ss`; `0:00` for anything that is not a positive finite time
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Snapshot of everything a front end renders
#[derive(Debug, Clone, PartialEq)]
pub struct ShellView {
    pub playing: bool,
    pub progress_percent: f64,
    pub current_time: String,
    pub duration: String,
    pub speed: f64,
    pub speeds: Vec<f64>,
    pub finalized: bool,
    pub voice_volume: u8,
    pub background_volume: u8,
    pub background_enabled: bool,
    pub selected_track_id: Option<String>,
    pub tracks: Vec<BackgroundTrack>,
    pub uploading: bool,
    /// Controls that currently ignore input
    pub inert: Vec<Control>,
}

pub struct PlayerShell {
    session: MixSession,
    download_dir: PathBuf,
    media_cache: Option<Arc<MemoryLoader>>,
    uploading: bool,
}

impl PlayerShell {
    pub fn new(session: MixSession, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            download_dir: download_dir.into(),
            media_cache: None,
            uploading: false,
        }
    }

    /// Decode uploads straight into this cache so they play without a
    /// round trip
    pub fn with_media_cache(mut self, cache: Arc<MemoryLoader>) -> Self {
        self.media_cache = Some(cache);
        self
    }

    pub fn session(&self) -> &MixSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut MixSession {
        &mut self.session
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        !(self.session.props().finalized && control.is_mixing())
    }

    fn guard(&self, control: Control) -> std::result::Result<(), PlayerError> {
        if self.is_enabled(control) {
            Ok(())
        } else {
            Err(PlayerError::ControlInert(control))
        }
    }

    pub fn toggle_play(&mut self) {
        self.session.toggle_play();
    }

    /// Seek by a click at `click_x` on a progress bar spanning
    /// `track_left..track_left + track_width`. Returns whether it applied.
    pub fn click_seek(&mut self, click_x: f64, track_left: f64, track_width: f64) -> bool {
        if track_width.is_nan() || track_width <= 0.0 || !click_x.is_finite() || !track_left.is_finite() {
            return false;
        }
        let fraction = ((click_x - track_left) / track_width).clamp(0.0, 1.0);
        self.session.seek_fraction(fraction);
        true
    }

    pub fn select_speed(&mut self, rate: f64) -> std::result::Result<(), PlayerError> {
        self.guard(Control::Speed)?;
        self.session.set_speed(rate)
    }

    pub fn set_voice_volume(&mut self, percent: u8) -> std::result::Result<(), PlayerError> {
        self.guard(Control::VoiceVolume)?;
        self.session.set_voice_volume(percent);
        Ok(())
    }

    pub fn set_background_volume(&mut self, percent: u8) -> std::result::Result<(), PlayerError> {
        self.guard(Control::BackgroundVolume)?;
        self.session.set_background_volume(percent);
        Ok(())
    }

    /// Flip the background switch; returns the new state
    pub fn toggle_background(&mut self) -> std::result::Result<bool, PlayerError> {
        self.guard(Control::BackgroundToggle)?;
        let enabled = !self.session.props().background_enabled;
        self.session.set_background_enabled(enabled);
        Ok(enabled)
    }

    /// Select a catalog track. Remote audio is fetched into the media
    /// cache first, so the background keeps playing across the switch.
    pub async fn pick_track(&mut self, client: &ApiClient, id: &str) -> Result<()> {
        self.guard(Control::TrackPicker)?;
        let track = self.session.catalog().require(id)?;
        if let Err(e) = self.cache_track(client, &track).await {
            self.session
                .notifier()
                .error(format!("Could not load {}", track.display_name));
            return Err(e);
        }
        self.session.set_background_track(Some(track.id));
        Ok(())
    }

    /// Fetch and decode a track's audio into the media cache. Local files
    /// and tracks already cached are left alone.
    pub async fn cache_track(&self, client: &ApiClient, track: &BackgroundTrack) -> Result<()> {
        let Some(cache) = &self.media_cache else {
            return Ok(());
        };
        if cache.contains(&track.url) || FileLoader::local_path(&track.url).is_some() {
            return Ok(());
        }

        let bytes = client.fetch_media(&track.url).await?;
        let extension = Path::new(&track.filename)
            .extension()
            .and_then(|e| e.to_str());
        let pcm = decode_bytes(bytes.to_vec(), extension)?;
        info!(
            "Cached {} ({:.1}s)",
            track.display_name,
            pcm.duration_secs()
        );
        cache.insert(track.url.clone(), pcm);
        Ok(())
    }

    /// Validate, upload, add to the catalog and select a custom track
    pub async fn upload_track(
        &mut self,
        client: &ApiClient,
        candidate: UploadCandidate,
    ) -> Result<BackgroundTrack> {
        self.guard(Control::Upload)?;
        if let Err(e) = candidate.validate() {
            self.session.notifier().error(e.to_string());
            return Err(e.into());
        }

        self.uploading = true;
        let uploaded = client.upload_background_track(&candidate).await;
        self.uploading = false;

        let track = match uploaded {
            Ok(track) => track,
            Err(e) => {
                warn!("Upload failed: {}", e);
                self.session.notifier().error("Failed to upload track");
                return Err(e);
            }
        };

        if let Some(cache) = &self.media_cache {
            match decode_bytes(candidate.bytes.clone(), candidate.extension().as_deref()) {
                Ok(pcm) => cache.insert(track.url.clone(), pcm),
                Err(e) => warn!("Uploaded track not decodable locally: {}", e),
            }
        }

        self.session.catalog().add(track.clone());
        self.session.set_background_track(Some(track.id.clone()));
        self.session.notifier().success("Background track uploaded!");
        Ok(track)
    }

    /// Copy the current audio to the download directory
    pub fn download_audio(&self, source: &Path) -> Result<PathBuf> {
        self.guard(Control::DownloadAudio)?;
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3");
        std::fs::create_dir_all(&self.download_dir)?;
        let target = self
            .download_dir
            .join(format!("manifestation.{}", extension));
        std::fs::copy(source, &target)?;
        info!("Audio saved to {}", target.display());
        Ok(target)
    }

    /// Write the manifestation text to the download directory
    pub fn download_text(&self, text: &str) -> Result<PathBuf> {
        self.guard(Control::DownloadText)?;
        std::fs::create_dir_all(&self.download_dir)?;
        let target = self.download_dir.join("manifestation.txt");
        std::fs::write(&target, text)?;
        info!("Text saved to {}", target.display());
        Ok(target)
    }

    pub fn view(&self) -> ShellView {
        let props = self.session.props();
        let progress = self.session.progress();
        ShellView {
            playing: self.session.is_playing(),
            progress_percent: progress.percent(),
            current_time: format_time(progress.position),
            duration: format_time(progress.duration),
            speed: self.session.playback_rate(),
            speeds: PLAYBACK_SPEEDS.to_vec(),
            finalized: props.finalized,
            voice_volume: props.voice_volume,
            background_volume: props.background_volume,
            background_enabled: props.background_enabled,
            selected_track_id: props.selected_track_id.clone(),
            tracks: self.session.catalog().list(),
            uploading: self.uploading,
            inert: Control::ALL
                .iter()
                .copied()
                .filter(|c| !self.is_enabled(*c))
                .collect(),
        }
    }
}
