//! Stem file storage
//!
//! Stems for a track live in `<stems dir>/<track name> - stems/<stem>.mp3`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assets::StemBlobs;
use crate::error::{MixError, Result};
use crate::types::Stem;

/// File extension of stored stems
pub const STEM_FILE_EXTENSION: &str = "mp3";

/// File name for a stem inside a track's stems folder
pub fn stem_file_name(stem: Stem) -> String {
    format!("{}.{}", stem.name(), STEM_FILE_EXTENSION)
}

/// Access to the user's stems directory
pub trait StemStorage {
    /// Configured stems directory, if the user picked one
    fn directory(&self) -> Option<&Path>;

    /// Whether the directory can be both read and written
    fn has_permission(&self) -> Result<bool>;

    /// Read all four stems from a track folder
    ///
    /// Returns `None` when any of the four files is missing.
    fn read_stems(&self, folder: &str) -> Result<Option<StemBlobs>>;

    /// Write one stem into a track folder, creating it as needed
    fn write_stem(&mut self, folder: &str, stem: Stem, bytes: &[u8]) -> Result<()>;
}

/// `StemStorage` on the local file system
#[derive(Debug, Clone, Default)]
pub struct FsStemStorage {
    directory: Option<PathBuf>,
}

impl FsStemStorage {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }

    pub fn set_directory(&mut self, directory: Option<PathBuf>) {
        log::info!("[STEMS] Stems directory set to {:?}", directory);
        self.directory = directory;
    }

    fn folder_path(&self, folder: &str) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(folder))
    }
}

impl StemStorage for FsStemStorage {
    fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn has_permission(&self) -> Result<bool> {
        let Some(dir) = self.directory.as_ref() else {
            return Ok(false);
        };
        match fs::metadata(dir) {
            Ok(meta) => Ok(meta.is_dir() && !meta.permissions().readonly()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MixError::from_io(dir.display(), e)),
        }
    }

    fn read_stems(&self, folder: &str) -> Result<Option<StemBlobs>> {
        let Some(path) = self.folder_path(folder) else {
            return Ok(None);
        };

        let mut stems = StemBlobs::new();
        for stem in Stem::ALL {
            let file = path.join(stem_file_name(stem));
            match fs::read(&file) {
                Ok(bytes) => stems.set(stem, Arc::from(bytes)),
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(MixError::from_io(file.display(), e)),
            }
        }
        log::debug!("[STEMS] Read stems from {:?}", path);
        Ok(Some(stems))
    }

    fn write_stem(&mut self, folder: &str, stem: Stem, bytes: &[u8]) -> Result<()> {
        let Some(path) = self.folder_path(folder) else {
            return Err(MixError::PermissionDenied("no stems directory selected".into()));
        };
        fs::create_dir_all(&path).map_err(|e| MixError::from_io(path.display(), e))?;

        let file = path.join(stem_file_name(stem));
        fs::write(&file, bytes).map_err(|e| MixError::from_io(file.display(), e))?;
        log::debug!("[STEMS] Wrote {:?} ({} bytes)", file, bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_directory() {
        let storage = FsStemStorage::default();
        assert!(storage.directory().is_none());
        assert!(!storage.has_permission().unwrap());
        assert!(storage.read_stems("x - stems").unwrap().is_none());
    }

    #[test]
    fn test_partial_folder_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FsStemStorage::new(Some(dir.path().to_path_buf()));
        assert!(storage.has_permission().unwrap());

        storage.write_stem("song - stems", Stem::Drums, &[1]).unwrap();
        storage.write_stem("song - stems", Stem::Bass, &[2]).unwrap();
        assert!(storage.read_stems("song - stems").unwrap().is_none());

        storage.write_stem("song - stems", Stem::Vocals, &[3]).unwrap();
        storage.write_stem("song - stems", Stem::Other, &[4]).unwrap();
        let stems = storage.read_stems("song - stems").unwrap().unwrap();
        assert!(stems.is_complete());
        assert_eq!(&**stems.get(Stem::Vocals).unwrap(), &[3]);
        assert!(dir.path().join("song - stems").join("other.mp3").exists());
    }

    #[test]
    fn test_missing_directory_has_no_permission() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStemStorage::new(Some(dir.path().join("not-there")));
        assert!(!storage.has_permission().unwrap());
    }
}
