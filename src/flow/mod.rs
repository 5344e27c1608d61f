//! Audio workflow
//!
//! Everything between a generated manifestation and a mounted player:
//! translation, speech synthesis, and the server-side finalize step. Audio
//! blobs from the backend live in a [`MediaStore`]; the path of the current
//! one is what the player is mounted with.

pub mod media_store;

pub use media_store::{MediaBlob, MediaStore};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::{DEFAULT_TRACK_ID, NO_TRACK_ID};
use crate::error::{PlayerError, Result};
use crate::network::client::ApiClient;
use crate::player::notify::Notifier;
use crate::player::props::PlayerProps;
use crate::protocol::{
    AudioRequest, FinalizeAudioRequest, Gender, ManifestationResponse, SupportedLanguage,
    TranslationRequest, VoiceStyle,
};
use crate::tracks::catalog::TrackCatalog;

/// Language the manifestation is generated in
pub const SOURCE_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// State carried from the generation step into the audio step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowState {
    pub manifestation: Option<String>,
    pub username: Option<String>,
    pub translations: BTreeMap<String, String>,
    pub translation_status: BTreeMap<String, TranslationStatus>,
}

impl FlowState {
    pub fn new(manifestation: impl Into<String>, username: Option<String>) -> Self {
        Self {
            manifestation: Some(manifestation.into()),
            username,
            ..Default::default()
        }
    }

    pub fn from_response(response: &ManifestationResponse, username: Option<String>) -> Self {
        Self::new(response.data.manifestation_text.clone(), username)
    }

    /// The manifestation text; the audio step cannot run without it
    pub fn require_manifestation(&self) -> std::result::Result<&str, PlayerError> {
        self.manifestation
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .ok_or(PlayerError::MissingManifestation)
    }

    pub fn set_translation(&mut self, language: &str, text: impl Into<String>) {
        self.translations.insert(language.to_string(), text.into());
        self.translation_status
            .insert(language.to_string(), TranslationStatus::Ready);
    }

    pub fn set_translation_status(&mut self, language: &str, status: TranslationStatus) {
        self.translation_status.insert(language.to_string(), status);
    }

    pub fn translation_status(&self, language: &str) -> TranslationStatus {
        self.translation_status
            .get(language)
            .copied()
            .unwrap_or_default()
    }

    /// Text to synthesize for `language`: its translation, else the original
    pub fn text_for(&self, language: &str) -> Option<&str> {
        self.translations
            .get(language)
            .map(String::as_str)
            .filter(|text| !text.is_empty())
            .or_else(|| self.require_manifestation().ok())
    }

    fn username_or_default(&self) -> String {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("user")
            .to_string()
    }
}

/// Mix the finalize service bakes into the voice
#[derive(Debug, Clone, PartialEq)]
pub struct MixSettings {
    pub track_id: String,
    pub background_enabled: bool,
    pub background_volume: u8,
    pub voice_volume: u8,
}

impl MixSettings {
    pub fn from_props(props: &PlayerProps, catalog: &TrackCatalog) -> Self {
        let track_id = catalog
            .initial_selection(props.selected_track_id.as_deref())
            .unwrap_or_else(|| DEFAULT_TRACK_ID.to_string());
        Self {
            track_id,
            background_enabled: props.background_enabled,
            background_volume: props.background_volume.min(100),
            voice_volume: props.voice_volume.min(100),
        }
    }

    /// A disabled background is sent as the `none` track at volume 0
    pub fn to_request(&self, voice_filename: &str, username: String) -> FinalizeAudioRequest {
        let (track, bg_volume) = if self.background_enabled {
            (self.track_id.clone(), self.background_volume)
        } else {
            (NO_TRACK_ID.to_string(), 0)
        };
        FinalizeAudioRequest {
            voice_filename: voice_filename.to_string(),
            background_track_id: track,
            bg_volume,
            voice_volume: Some(self.voice_volume),
            username,
        }
    }
}

/// Voice generation, language choice and finalization for one manifestation
#[derive(Debug)]
pub struct AudioWorkflow {
    flow: FlowState,
    notifier: Notifier,
    store: MediaStore,
    language: String,
    voice_style: VoiceStyle,
    selected_voice: Option<Gender>,
    voice_audio: Option<MediaBlob>,
    voice_filename: Option<String>,
    final_audio: Option<MediaBlob>,
    finalized: bool,
    supported: BTreeMap<String, SupportedLanguage>,
}

impl AudioWorkflow {
    /// Fails (and notifies) when the flow carries no manifestation
    pub fn new(
        flow: FlowState,
        notifier: Notifier,
        store: MediaStore,
    ) -> std::result::Result<Self, PlayerError> {
        if let Err(e) = flow.require_manifestation() {
            notifier.error(e.to_string());
            return Err(e);
        }

        Ok(Self {
            flow,
            notifier,
            store,
            language: SOURCE_LANGUAGE.to_string(),
            voice_style: VoiceStyle::Calm,
            selected_voice: None,
            voice_audio: None,
            voice_filename: None,
            final_audio: None,
            finalized: false,
            supported: BTreeMap::new(),
        })
    }

    pub fn flow(&self) -> &FlowState {
        &self.flow
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn voice_style(&self) -> VoiceStyle {
        self.voice_style
    }

    pub fn set_voice_style(&mut self, style: VoiceStyle) {
        self.voice_style = style;
    }

    pub fn selected_voice(&self) -> Option<Gender> {
        self.selected_voice
    }

    pub fn voice_filename(&self) -> Option<&str> {
        self.voice_filename.as_deref()
    }

    pub fn voice_audio(&self) -> Option<&Path> {
        self.voice_audio.as_ref().map(MediaBlob::path)
    }

    pub fn final_audio(&self) -> Option<&Path> {
        self.final_audio.as_ref().map(MediaBlob::path)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The final mix when there is one, else the raw voice
    pub fn current_audio(&self) -> Option<&Path> {
        self.final_audio().or(self.voice_audio())
    }

    /// Props for mounting the player on the current audio
    pub fn player_props(&self, base: &PlayerProps) -> Option<PlayerProps> {
        let audio = self.current_audio()?;
        Some(PlayerProps {
            audio_url: audio.to_string_lossy().into_owned(),
            finalized: self.finalized,
            ..base.clone()
        })
    }

    pub fn set_supported_languages(&mut self, languages: BTreeMap<String, SupportedLanguage>) {
        self.supported = languages;
    }

    /// Fetch the backend's language list. A failure leaves only English.
    pub async fn load_languages(&mut self, client: &ApiClient) -> bool {
        match client.supported_languages().await {
            Ok(response) => {
                self.supported = response.languages;
                true
            }
            Err(e) => {
                warn!("Failed to load supported languages: {}", e);
                false
            }
        }
    }

    /// Translated languages the backend can also speak
    pub fn available_languages(&self) -> Vec<(String, SupportedLanguage)> {
        self.flow
            .translation_status
            .iter()
            .filter(|(code, status)| {
                code.as_str() != SOURCE_LANGUAGE && **status == TranslationStatus::Ready
            })
            .filter_map(|(code, _)| {
                self.supported
                    .get(code)
                    .map(|language| (code.clone(), language.clone()))
            })
            .collect()
    }

    pub async fn translate(&mut self, client: &ApiClient, language: &str) -> Result<()> {
        if language == SOURCE_LANGUAGE {
            return Ok(());
        }
        let text = self.flow.require_manifestation()?.to_string();
        self.flow
            .set_translation_status(language, TranslationStatus::Loading);

        let request = TranslationRequest {
            text,
            target_language: language.to_string(),
            username: self.flow.username.clone(),
        };
        match client.translate_manifestation(&request).await {
            Ok(response) => {
                info!("Translated manifestation to {}", response.language);
                self.flow.set_translation(language, response.translated_text);
                Ok(())
            }
            Err(e) => {
                self.flow
                    .set_translation_status(language, TranslationStatus::Error);
                self.notifier.error(e.user_message());
                Err(e.into())
            }
        }
    }

    /// Switching language drops the voice and any final mix built from it
    pub fn select_language(&mut self, language: &str) {
        if self.language == language {
            return;
        }
        self.language = language.to_string();
        self.store.release(&mut self.voice_audio);
        self.store.release(&mut self.final_audio);
        self.voice_filename = None;
        self.selected_voice = None;
        self.finalized = false;
    }

    /// Synthesize the manifestation in the selected language
    pub async fn generate_voice(&mut self, client: &ApiClient, gender: Gender) -> Result<PathBuf> {
        let text = self
            .flow
            .text_for(&self.language)
            .ok_or(PlayerError::MissingManifestation)?
            .to_string();

        self.selected_voice = Some(gender);
        self.finalized = false;
        self.store.release(&mut self.final_audio);

        let request = AudioRequest {
            text,
            gender,
            language: Some(self.language.clone()),
            username: self.flow.username.clone(),
            voice_style: Some(self.voice_style),
        };
        let blob = match client.generate_audio(&request).await {
            Ok(blob) => blob,
            Err(e) => {
                self.selected_voice = None;
                self.notifier.error(e.user_message());
                return Err(e.into());
            }
        };

        let filename = if blob.filename.is_empty() {
            format!("manifestation_{}.mp3", chrono::Utc::now().timestamp_millis())
        } else {
            blob.filename
        };
        let path = self.store.replace(
            &mut self.voice_audio,
            &blob.bytes,
            extension_of(&filename, "mp3"),
        )?;
        self.voice_filename = Some(filename);
        self.notifier.success(format!(
            "Audio generated in {} style!",
            self.voice_style.as_str()
        ));
        Ok(path)
    }

    /// Ask the backend to bake the mix into a single file
    pub async fn finalize(&mut self, client: &ApiClient, mix: &MixSettings) -> Result<PathBuf> {
        let Some(voice_filename) = self.voice_filename.clone() else {
            let e = PlayerError::MissingVoiceAudio;
            self.notifier.error(e.to_string());
            return Err(e.into());
        };

        let request = mix.to_request(&voice_filename, self.flow.username_or_default());
        let blob = match client.finalize_audio(&request).await {
            Ok(blob) => blob,
            Err(e) => {
                self.notifier
                    .error(format!("Finalization failed: {}", e.user_message()));
                return Err(e.into());
            }
        };

        let path = self.store.replace(
            &mut self.final_audio,
            &blob.bytes,
            extension_of(&blob.filename, "mp3"),
        )?;
        self.finalized = true;
        self.notifier.success("Your personalized audio is ready!");
        Ok(path)
    }
}

fn extension_of<'a>(filename: &'a str, fallback: &'a str) -> &'a str {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(fallback)
}
