//! Custom background track uploads
//!
//! Files are checked locally before anything goes over the network.

use std::path::Path;

use crate::constants::{MAX_UPLOAD_BYTES, UPLOAD_EXTENSIONS};
use crate::error::CatalogError;

/// A file the user picked for upload
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadCandidate {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a candidate from disk
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, bytes })
    }

    /// Lowercased extension, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Reject oversized files and anything but mp3/wav
    pub fn validate(&self) -> Result<(), CatalogError> {
        check_size(self.size())?;
        match self.extension() {
            Some(ext) if UPLOAD_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(CatalogError::UnsupportedFileType(self.file_name.clone())),
        }
    }

    /// MIME type for the multipart part
    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("wav") => "audio/wav",
            _ => "audio/mpeg",
        }
    }
}

/// Size check alone, usable before reading a file into memory
pub fn check_size(size: u64) -> Result<(), CatalogError> {
    if size > MAX_UPLOAD_BYTES {
        Err(CatalogError::FileTooLarge(size))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_large_file() {
        let candidate = UploadCandidate::new("big.mp3", vec![0u8; 15 * 1024 * 1024]);
        let err = candidate.validate().unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 10MB");
    }

    #[test]
    fn test_limit_is_inclusive() {
        assert!(check_size(MAX_UPLOAD_BYTES).is_ok());
        assert!(check_size(MAX_UPLOAD_BYTES + 1).is_err());
    }

    #[test]
    fn test_extension_check() {
        assert!(UploadCandidate::new("rain.WAV", vec![0; 4]).validate().is_ok());
        assert!(UploadCandidate::new("rain.mp3", vec![0; 4]).validate().is_ok());

        let err = UploadCandidate::new("rain.ogg", vec![0; 4]).validate().unwrap_err();
        assert_eq!(err.to_string(), "Only .mp3 and .wav files are supported");
        assert!(UploadCandidate::new("noext", vec![0; 4]).validate().is_err());
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(UploadCandidate::new("a.wav", vec![]).mime_type(), "audio/wav");
        assert_eq!(UploadCandidate::new("a.mp3", vec![]).mime_type(), "audio/mpeg");
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chimes.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let candidate = UploadCandidate::from_path(&path).unwrap();
        assert_eq!(candidate.file_name, "chimes.mp3");
        assert_eq!(candidate.size(), 3);
    }
}
