//! Media loading
//!
//! A `MediaLoader` turns a media locator into decoded PCM. Elements call it
//! whenever their src changes.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::buffer::{PcmBuffer, SharedPcm};
use crate::audio::decode::decode_file;
use crate::audio::resample::resample;
use crate::error::AudioError;

/// Resolves media locators to decoded audio
pub trait MediaLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<SharedPcm, AudioError>;
}

/// Loads local paths and `file://` URLs
#[derive(Debug, Default, Clone)]
pub struct FileLoader;

impl FileLoader {
    /// Map a locator to a path, if it names a local file
    pub fn local_path(url: &str) -> Option<PathBuf> {
        if let Some(rest) = url.strip_prefix("file://") {
            return Some(PathBuf::from(rest));
        }
        if url.contains("://") {
            return None;
        }
        Some(PathBuf::from(url))
    }
}

impl MediaLoader for FileLoader {
    fn load(&self, url: &str) -> Result<SharedPcm, AudioError> {
        let path = Self::local_path(url)
            .ok_or_else(|| AudioError::UnsupportedFormat(format!("Not a local file: {}", url)))?;
        decode_file(Path::new(&path)).map(Arc::new)
    }
}

/// Pre-decoded media keyed by locator, falling back to local files
#[derive(Default)]
pub struct MemoryLoader {
    entries: RwLock<HashMap<String, SharedPcm>>,
    fallback: Option<FileLoader>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also resolve locators that are not registered from the filesystem
    pub fn with_file_fallback() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fallback: Some(FileLoader),
        }
    }

    pub fn insert(&self, url: impl Into<String>, pcm: PcmBuffer) {
        self.entries.write().insert(url.into(), Arc::new(pcm));
    }

    pub fn remove(&self, url: &str) -> Option<SharedPcm> {
        self.entries.write().remove(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.read().contains_key(url)
    }
}

impl MediaLoader for MemoryLoader {
    fn load(&self, url: &str) -> Result<SharedPcm, AudioError> {
        if let Some(pcm) = self.entries.read().get(url) {
            return Ok(pcm.clone());
        }
        match &self.fallback {
            Some(files) => files.load(url),
            None => Err(AudioError::MediaNotFound(url.to_string())),
        }
    }
}

/// Brings everything `inner` loads to one sample rate, so elements play
/// at the output context's rate without real-time conversion
pub struct ResamplingLoader<'a> {
    inner: &'a dyn MediaLoader,
    sample_rate: u32,
}

impl<'a> ResamplingLoader<'a> {
    pub fn new(inner: &'a dyn MediaLoader, sample_rate: u32) -> Self {
        Self { inner, sample_rate }
    }
}

impl MediaLoader for ResamplingLoader<'_> {
    fn load(&self, url: &str) -> Result<SharedPcm, AudioError> {
        let pcm = self.inner.load(url)?;
        if pcm.sample_rate == self.sample_rate {
            return Ok(pcm);
        }
        resample(&pcm, self.sample_rate).map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_mapping() {
        assert_eq!(
            FileLoader::local_path("file:///tmp/a.mp3"),
            Some(PathBuf::from("/tmp/a.mp3"))
        );
        assert_eq!(
            FileLoader::local_path("voice/sample.mp3"),
            Some(PathBuf::from("voice/sample.mp3"))
        );
        assert_eq!(FileLoader::local_path("http://host/a.mp3"), None);
    }

    #[test]
    fn test_memory_loader_lookup() {
        let loader = MemoryLoader::new();
        loader.insert("ocean-waves", PcmBuffer::silence(10, 2, 48000));

        assert!(loader.contains("ocean-waves"));
        assert_eq!(loader.load("ocean-waves").unwrap().frames(), 10);
        assert!(matches!(
            loader.load("missing"),
            Err(AudioError::MediaNotFound(_))
        ));
    }

    #[test]
    fn test_file_loader_rejects_remote_urls() {
        let err = FileLoader.load("https://example.com/track.mp3").unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_resampling_loader_converts_to_context_rate() {
        let loader = MemoryLoader::new();
        loader.insert("voice", PcmBuffer::new(vec![0.25; 2205 * 2], 2, 22050));
        loader.insert("native", PcmBuffer::new(vec![0.25; 480], 1, 48000));

        let resampling = ResamplingLoader::new(&loader, 48000);
        let voice = resampling.load("voice").unwrap();
        assert_eq!(voice.sample_rate, 48000);
        assert_eq!(voice.channels, 2);
        assert_eq!(voice.frames(), 4800);
        assert!((voice.duration_secs() - 0.1).abs() < 1e-9);

        // already at the rate: the cached buffer itself comes back
        let native = resampling.load("native").unwrap();
        assert!(Arc::ptr_eq(&native, &loader.load("native").unwrap()));

        assert!(matches!(
            resampling.load("missing"),
            Err(AudioError::MediaNotFound(_))
        ));
    }
}
