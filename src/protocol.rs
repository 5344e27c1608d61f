//! Wire types for the manifestation backend
//!
//! JSON bodies exchanged with the REST API. Field names match the backend's
//! snake_case schema.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Length of the generated manifestation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    #[default]
    Quick,
    Deep,
}

/// Profile fields submitted for generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ManifestationRequest {
    pub preferred_name: String,
    pub birth_date: String,
    pub birth_time: String,
    pub birth_place: String,
    pub nakshatra: String,
    pub lagna: String,
    pub strengths: String,
    pub areas_of_improvement: String,
    pub greatest_achievement: String,
    pub recent_achievement: String,
    pub next_year_goals: String,
    pub life_goals: String,
    pub legacy: String,
    pub manifestation_focus: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_mode: Option<GenerationMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestationData {
    pub manifestation_text: String,
    pub generation_mode: String,
    pub word_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestationResponse {
    pub status: String,
    pub message: String,
    pub data: ManifestationData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStyle {
    Calm,
    #[default]
    Balanced,
    Uplifting,
}

impl VoiceStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            VoiceStyle::Calm => "calm",
            VoiceStyle::Balanced => "balanced",
            VoiceStyle::Uplifting => "uplifting",
        }
    }
}

/// Speech synthesis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRequest {
    pub text: String,
    pub gender: Gender,
    /// Language code: en, ta, hi, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_style: Option<VoiceStyle>,
}

/// Binary audio returned by synthesis and finalize calls
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlob {
    pub bytes: Bytes,
    /// From `Content-Disposition`; empty when the header is absent
    pub filename: String,
}

/// Selectable background track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundTrack {
    pub id: String,
    pub display_name: String,
    pub filename: String,
    #[serde(default)]
    pub is_default: bool,
    pub url: String,
}

/// Request to bake the final mix server-side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeAudioRequest {
    pub voice_filename: String,
    /// Track id, or `none` for no background
    pub background_track_id: String,
    pub bg_volume: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_volume: Option<u8>,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub status: String,
    pub language: String,
    pub language_code: String,
    pub translated_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedLanguage {
    pub name: String,
    pub native_name: String,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedLanguagesResponse {
    pub status: String,
    pub languages: BTreeMap<String, SupportedLanguage>,
}

/// Sources to import a profile from; at least one should be set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileIngestRequest {
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub profile_text: Option<String>,
    /// LinkedIn PDF export (file name, bytes)
    pub pdf: Option<(String, Vec<u8>)>,
}

impl ProfileIngestRequest {
    pub fn is_empty(&self) -> bool {
        self.linkedin_url.is_none()
            && self.github_url.is_none()
            && self.portfolio_url.is_none()
            && self.profile_text.is_none()
            && self.pdf.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileIngestResponse {
    pub status: String,
    pub raw_profile_text: String,
    pub source: String,
    pub char_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummarizeRequest {
    pub raw_profile_text: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummarizeResponse {
    pub status: String,
    /// Fields in the `ManifestationRequest` shape; unknown keys are kept
    pub manifestation_data: serde_json::Map<String, serde_json::Value>,
}

impl ProfileSummarizeResponse {
    /// Merge the summary over `base`, keeping base values for missing keys
    pub fn into_request(self, base: &ManifestationRequest) -> ManifestationRequest {
        let mut merged = match serde_json::to_value(base) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in self.manifestation_data {
            if let serde_json::Value::String(_) = value {
                merged.insert(key, value);
            }
        }
        serde_json::from_value(serde_json::Value::Object(merged)).unwrap_or_else(|_| base.clone())
    }
}

/// Body of a backend error response
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: Option<serde_json::Value>,
}

impl ErrorDetail {
    /// `detail` as text; validation errors arrive as arrays
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}
