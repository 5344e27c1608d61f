//! Temporary storage for generated audio
//!
//! Backend responses are binary blobs. Each one is written to its own
//! temp file inside a private per-store directory, and the path is what the
//! player mounts. Dropping or revoking a `MediaBlob` deletes its file;
//! dropping the store removes the directory with anything left in it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir, TempPath};
use tracing::{debug, warn};

/// A stored blob. The file lives exactly as long as this handle.
#[derive(Debug)]
pub struct MediaBlob {
    path: TempPath,
}

impl MediaBlob {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now
    pub fn revoke(self) {
        let path = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
        debug!("Revoked {}", path.display());
    }
}

impl AsRef<Path> for MediaBlob {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

#[derive(Debug)]
pub struct MediaStore {
    dir: TempDir,
}

impl MediaStore {
    /// Fresh private directory under the system temp directory
    pub fn new() -> io::Result<Self> {
        let dir = Builder::new().prefix("manifest-mixer-").tempdir()?;
        Ok(Self { dir })
    }

    /// Fresh private directory under `parent`
    pub fn in_dir(parent: impl AsRef<Path>) -> io::Result<Self> {
        let parent = parent.as_ref();
        fs::create_dir_all(parent)?;
        let dir = Builder::new().prefix("manifest-mixer-").tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` to a fresh file
    pub fn create(&self, bytes: &[u8], extension: &str) -> io::Result<MediaBlob> {
        let extension = extension.trim_start_matches('.');
        let extension = if extension.is_empty() { "bin" } else { extension };
        let suffix = format!(".{}", extension);

        let mut file = Builder::new()
            .prefix("blob-")
            .suffix(&suffix)
            .tempfile_in(self.dir.path())?;
        file.write_all(bytes)?;
        file.flush()?;

        let path = file.into_temp_path();
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(MediaBlob { path })
    }

    /// Store `bytes` in `slot`, revoking whatever the slot held before
    pub fn replace(
        &self,
        slot: &mut Option<MediaBlob>,
        bytes: &[u8],
        extension: &str,
    ) -> io::Result<PathBuf> {
        let blob = self.create(bytes, extension)?;
        let path = blob.path().to_path_buf();
        if let Some(old) = slot.replace(blob) {
            old.revoke();
        }
        Ok(path)
    }

    /// Revoke and clear `slot`
    pub fn release(&self, slot: &mut Option<MediaBlob>) {
        if let Some(blob) = slot.take() {
            blob.revoke();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_create_writes_uniquely_named_files() {
        let parent = tempfile::tempdir().unwrap();
        let store = MediaStore::in_dir(parent.path()).unwrap();

        let a = store.create(b"one", "mp3").unwrap();
        let b = store.create(b"two", ".mp3").unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(store.dir()));
        assert_eq!(a.path().extension().unwrap(), "mp3");
        assert_eq!(b.path().extension().unwrap(), "mp3");
        assert_eq!(fs::read(b.path()).unwrap(), b"two");
        assert_eq!(entries(store.dir()), 2);

        let raw = store.create(b"raw", "").unwrap();
        assert_eq!(raw.path().extension().unwrap(), "bin");
    }

    #[test]
    fn test_replace_revokes_previous() {
        let parent = tempfile::tempdir().unwrap();
        let store = MediaStore::in_dir(parent.path()).unwrap();
        let mut slot = None;

        let first = store.replace(&mut slot, b"first", "mp3").unwrap();
        let second = store.replace(&mut slot, b"second", "mp3").unwrap();

        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(slot.as_ref().map(MediaBlob::path), Some(second.as_path()));
        assert_eq!(entries(store.dir()), 1);
    }

    #[test]
    fn test_release_clears_slot() {
        let parent = tempfile::tempdir().unwrap();
        let store = MediaStore::in_dir(parent.path()).unwrap();
        let mut slot = None;
        let path = store.replace(&mut slot, b"voice", "wav").unwrap();

        store.release(&mut slot);
        assert!(slot.is_none());
        assert!(!path.exists());

        // releasing an empty slot is a no-op
        store.release(&mut slot);
    }

    #[test]
    fn test_dropped_blob_is_deleted() {
        let parent = tempfile::tempdir().unwrap();
        let store = MediaStore::in_dir(parent.path()).unwrap();
        let blob = store.create(b"temp", "mp3").unwrap();
        let path = blob.path().to_path_buf();
        assert!(path.exists());

        drop(blob);
        assert!(!path.exists());
    }

    #[test]
    fn test_stores_do_not_share_a_directory() {
        let parent = tempfile::tempdir().unwrap();
        let a = MediaStore::in_dir(parent.path()).unwrap();
        let b = MediaStore::in_dir(parent.path()).unwrap();
        assert_ne!(a.dir(), b.dir());

        let dir = a.dir().to_path_buf();
        let kept = a.create(b"left behind", "mp3").unwrap();
        drop(a);
        assert!(!dir.exists());
        assert!(!kept.path().exists());
        assert!(b.dir().exists());
    }
}
