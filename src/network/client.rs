//! REST client for the manifestation backend
//!
//! Thin async wrapper over `reqwest`. Every non-2xx response becomes
//! `ApiError::Backend` carrying the body's `detail` field, or a per-call
//! fallback message when the body has none.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::protocol::*;
use crate::tracks::catalog::resolve_url;
use crate::tracks::upload::UploadCandidate;

const USER_AGENT: &str = concat!("manifest-mixer/", env!("CARGO_PKG_VERSION"));

/// Backend API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn generate_manifestation(
        &self,
        request: &ManifestationRequest,
    ) -> Result<ManifestationResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/v1/generate-manifestation"))
            .json(request)
            .send()
            .await?;
        let response = check(response, "Failed to generate manifestation").await?;
        let body: ManifestationResponse = json(response).await?;
        info!(
            "Generated {} manifestation ({} words)",
            body.data.generation_mode, body.data.word_count
        );
        Ok(body)
    }

    /// The most recent form submission stored by the backend
    pub async fn last_submission(&self) -> Result<ManifestationRequest, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/v1/last-submission"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound("No previous submission found".to_string()));
        }
        let response = check(response, "Failed to fetch last submission").await?;
        json(response).await
    }

    /// Synthesize speech; returns the audio and its server-side filename
    pub async fn generate_audio(&self, request: &AudioRequest) -> Result<AudioBlob, ApiError> {
        debug!(gender = ?request.gender, language = ?request.language, "Requesting speech");
        let response = self
            .http
            .post(self.endpoint("/api/v1/generate-audio"))
            .json(request)
            .send()
            .await?;
        let response = check(response, "Failed to generate audio").await?;
        blob(response).await
    }

    /// Bake the final mix server-side
    pub async fn finalize_audio(
        &self,
        request: &FinalizeAudioRequest,
    ) -> Result<AudioBlob, ApiError> {
        info!(
            voice = %request.voice_filename,
            track = %request.background_track_id,
            bg_volume = request.bg_volume,
            "Finalizing audio"
        );
        let response = self
            .http
            .post(self.endpoint("/api/v1/finalize-audio"))
            .json(request)
            .send()
            .await?;
        let response = check(response, "Failed to finalize audio").await?;
        blob(response).await
    }

    /// Background catalog with URLs resolved against the base URL
    pub async fn background_tracks(&self) -> Result<Vec<BackgroundTrack>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/v1/background-tracks"))
            .send()
            .await?;
        let response = check(response, "Failed to fetch background tracks").await?;
        let tracks: Vec<BackgroundTrack> = json(response).await?;
        Ok(tracks
            .into_iter()
            .map(|track| self.resolve_track(track))
            .collect())
    }

    /// Upload a custom background track. The candidate is validated first;
    /// nothing is sent for an invalid file.
    pub async fn upload_background_track(
        &self,
        candidate: &UploadCandidate,
    ) -> crate::Result<BackgroundTrack> {
        candidate.validate()?;

        let part = Part::bytes(candidate.bytes.clone())
            .file_name(candidate.file_name.clone())
            .mime_str(candidate.mime_type())
            .map_err(ApiError::from)?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint("/api/v1/upload-background-track"))
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from)?;
        let response = check(response, "Failed to upload background track").await?;
        let track: BackgroundTrack = json(response).await?;
        info!("Uploaded background track {}", track.id);
        Ok(self.resolve_track(track))
    }

    pub async fn supported_languages(&self) -> Result<SupportedLanguagesResponse, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/v1/supported-languages"))
            .send()
            .await?;
        let response = check(response, "Failed to fetch supported languages").await?;
        json(response).await
    }

    pub async fn translate_manifestation(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/v1/translate-manifestation"))
            .json(request)
            .send()
            .await?;
        let response = check(response, "Failed to translate manifestation").await?;
        json(response).await
    }

    /// Extract raw profile text from any combination of sources
    pub async fn ingest_profile(
        &self,
        request: &ProfileIngestRequest,
    ) -> Result<ProfileIngestResponse, ApiError> {
        let mut form = Form::new();
        let fields = [
            ("linkedin_url", &request.linkedin_url),
            ("github_url", &request.github_url),
            ("portfolio_url", &request.portfolio_url),
            ("profile_text", &request.profile_text),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                form = form.text(name, value.clone());
            }
        }
        if let Some((file_name, bytes)) = &request.pdf {
            let part = Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str("application/pdf")?;
            form = form.part("file", part);
        }

        let response = self
            .http
            .post(self.endpoint("/api/v1/profile/ingest"))
            .multipart(form)
            .send()
            .await?;
        let response = check(response, "Failed to import profile").await?;
        json(response).await
    }

    /// Map raw profile text onto manifestation form fields
    pub async fn summarize_profile(
        &self,
        request: &ProfileSummarizeRequest,
    ) -> Result<ProfileSummarizeResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/v1/profile/summarize"))
            .json(request)
            .send()
            .await?;
        let response = check(response, "Failed to summarize profile").await?;
        json(response).await
    }

    /// Download media from an absolute URL
    pub async fn fetch_media(&self, url: &str) -> Result<Bytes, ApiError> {
        debug!(url, "Fetching media");
        let response = self.http.get(url).send().await?;
        let response = check(response, "Failed to fetch media").await?;
        Ok(response.bytes().await?)
    }

    fn resolve_track(&self, mut track: BackgroundTrack) -> BackgroundTrack {
        track.url = resolve_url(&self.base_url, &track.url);
        track
    }
}

/// Pass 2xx responses through; turn anything else into `ApiError::Backend`
async fn check(response: Response, fallback: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = backend_error(status.as_u16(), &body, fallback);
    error!("{}", err);
    Err(err)
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::Malformed(e.to_string()))
}

async fn blob(response: Response) -> Result<AudioBlob, ApiError> {
    let filename = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(attachment_filename)
        .unwrap_or_default();
    let bytes = response.bytes().await?;
    debug!(filename = %filename, size = bytes.len(), "Received audio");
    Ok(AudioBlob { bytes, filename })
}

/// Build the error for a failed call from its status and body
pub fn backend_error(status: u16, body: &str, fallback: &str) -> ApiError {
    let detail = serde_json::from_str::<ErrorDetail>(body)
        .ok()
        .and_then(|d| d.message())
        .unwrap_or_else(|| fallback.to_string());
    ApiError::Backend { status, detail }
}

/// Filename from an `attachment` Content-Disposition value, or empty
pub fn attachment_filename(header: &str) -> String {
    if !header.contains("attachment") {
        return String::new();
    }
    let Some(start) = header.find("filename") else {
        return String::new();
    };
    let rest = &header[start + "filename".len()..];
    let extended = rest.starts_with('*');
    let Some(eq) = rest.find('=') else {
        return String::new();
    };
    let value = rest[eq + 1..].trim_start();

    let raw = match value.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &value[1..];
            inner.split(quote).next().unwrap_or(inner)
        }
        _ => value.split(';').next().unwrap_or(value).trim(),
    };

    // RFC 5987: charset'lang'value
    let raw = if extended {
        raw.rsplit("''").next().unwrap_or(raw)
    } else {
        raw
    };
    raw.replace(['"', '\''], "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{http_response, serve_once};

    #[test]
    fn test_attachment_filename() {
        assert_eq!(
            attachment_filename(r#"attachment; filename="manifestation_asha.mp3""#),
            "manifestation_asha.mp3"
        );
        assert_eq!(
            attachment_filename("attachment; filename=final.wav; size=10"),
            "final.wav"
        );
        assert_eq!(
            attachment_filename("attachment; filename*=UTF-8''voice.mp3"),
            "voice.mp3"
        );
        assert_eq!(attachment_filename(r#"inline; filename="x.mp3""#), "");
        assert_eq!(attachment_filename("attachment"), "");
    }

    #[test]
    fn test_backend_error_detail() {
        let err = backend_error(404, r#"{"detail":"Voice file not found"}"#, "Failed to finalize audio");
        assert_eq!(err.user_message(), "Voice file not found");
        assert!(matches!(err, ApiError::Backend { status: 404, .. }));

        let err = backend_error(500, "Internal Server Error", "Failed to generate audio");
        assert_eq!(err.user_message(), "Failed to generate audio");
    }

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_background_tracks_resolve_urls() {
        let body = br#"[{"id":"ocean-waves","display_name":"Ocean Waves","filename":"ocean.mp3","is_default":false,"url":"/api/v1/background-tracks/ocean.mp3"}]"#;
        let (base, server) = serve_once(http_response(
            "200 OK",
            &[("Content-Type", "application/json")],
            body,
        ))
        .await;

        let tracks = client(&base).background_tracks().await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(
            tracks[0].url,
            format!("{}/api/v1/background-tracks/ocean.mp3", base)
        );

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v1/background-tracks "));
    }

    #[tokio::test]
    async fn test_generate_audio_reads_filename() {
        let (base, server) = serve_once(http_response(
            "200 OK",
            &[
                ("Content-Type", "audio/mpeg"),
                ("Content-Disposition", r#"attachment; filename="asha_voice.mp3""#),
            ],
            b"ID3fake",
        ))
        .await;

        let blob = client(&base)
            .generate_audio(&AudioRequest {
                text: "I am grateful".to_string(),
                gender: Gender::Male,
                language: None,
                username: Some("asha".to_string()),
                voice_style: None,
            })
            .await
            .unwrap();
        assert_eq!(blob.filename, "asha_voice.mp3");
        assert_eq!(&blob.bytes[..], b"ID3fake");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/v1/generate-audio "));
        assert!(request.contains(r#""gender":"male""#));
    }

    #[tokio::test]
    async fn test_last_submission_not_found() {
        let (base, _server) = serve_once(http_response("404 Not Found", &[], b"{}")).await;
        let err = client(&base).last_submission().await.unwrap_err();
        assert_eq!(err.user_message(), "No previous submission found");
    }

    #[tokio::test]
    async fn test_finalize_failure_carries_detail() {
        let (base, _server) = serve_once(http_response(
            "500 Internal Server Error",
            &[("Content-Type", "application/json")],
            br#"{"detail":"Mixing failed"}"#,
        ))
        .await;

        let err = client(&base)
            .finalize_audio(&FinalizeAudioRequest {
                voice_filename: "v.mp3".to_string(),
                background_track_id: "none".to_string(),
                bg_volume: 0,
                voice_volume: Some(100),
                username: "user".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Mixing failed");
    }

    #[tokio::test]
    async fn test_invalid_upload_never_sent() {
        // Nothing listens here; validation must fail first
        let client = client("http://127.0.0.1:9");
        let candidate = UploadCandidate::new("huge.mp3", vec![0u8; 15 * 1024 * 1024]);
        let err = client.upload_background_track(&candidate).await.unwrap_err();
        assert_eq!(err.to_string(), "Catalog error: File size must be less than 10MB");
    }
}
