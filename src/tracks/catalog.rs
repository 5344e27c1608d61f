//! Background track catalog
//!
//! The list of selectable background tracks, fetched from the backend or
//! extended by uploads. Shared between the shell and the workflow, so it
//! sits behind a lock.

use parking_lot::RwLock;

use crate::constants::{DEFAULT_TRACK_ID, NO_TRACK_ID};
use crate::error::CatalogError;
use crate::protocol::BackgroundTrack;

/// Join a backend-relative track URL onto the API base URL
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.contains("://") {
        return url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        format!("{}/{}", base, url)
    }
}

/// Selectable background tracks
#[derive(Debug, Default)]
pub struct TrackCatalog {
    tracks: RwLock<Vec<BackgroundTrack>>,
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<BackgroundTrack>) -> Self {
        Self {
            tracks: RwLock::new(tracks),
        }
    }

    /// Swap in a freshly fetched list
    pub fn replace_all(&self, tracks: Vec<BackgroundTrack>) {
        tracing::debug!("Catalog now holds {} tracks", tracks.len());
        *self.tracks.write() = tracks;
    }

    /// Add a track, replacing one with the same id
    pub fn add(&self, track: BackgroundTrack) {
        let mut tracks = self.tracks.write();
        match tracks.iter_mut().find(|t| t.id == track.id) {
            Some(existing) => *existing = track,
            None => tracks.push(track),
        }
    }

    pub fn get(&self, id: &str) -> Option<BackgroundTrack> {
        self.tracks.read().iter().find(|t| t.id == id).cloned()
    }

    /// Look up a track, failing for unknown ids
    pub fn require(&self, id: &str) -> Result<BackgroundTrack, CatalogError> {
        self.get(id)
            .ok_or_else(|| CatalogError::UnknownTrack(id.to_string()))
    }

    /// The track flagged default, else the backend's well-known default id
    pub fn default_track(&self) -> Option<BackgroundTrack> {
        let tracks = self.tracks.read();
        tracks
            .iter()
            .find(|t| t.is_default)
            .or_else(|| tracks.iter().find(|t| t.id == DEFAULT_TRACK_ID))
            .cloned()
    }

    /// Selection to use when the user has not picked one
    pub fn initial_selection(&self, selected: Option<&str>) -> Option<String> {
        match selected {
            Some(id) if !id.is_empty() && id != NO_TRACK_ID => Some(id.to_string()),
            _ => self.default_track().map(|t| t.id),
        }
    }

    pub fn list(&self) -> Vec<BackgroundTrack> {
        self.tracks.read().clone()
    }

    pub fn len(&self) -> usize {
        self.tracks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }
}
