//! Content-addressed store of synthesized utterances
//!
//! One file per utterance, named `<sha256 hex of the requested text>.raw`.
//! Entries are never evicted: the directory doubles as the device's offline
//! library of everything it has ever said.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

/// File extension of cached audio
pub const CACHE_EXTENSION: &str = "raw";

/// Hash key for `text`: lowercase hex SHA-256 of its UTF-8 bytes
#[must_use]
pub fn cache_key(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Disk cache of raw PCM keyed by text
#[derive(Clone, Debug)]
pub struct SpeechCache {
    dir: PathBuf,
}

impl SpeechCache {
    /// Open (and create if needed) a cache directory
    ///
    /// # Errors
    ///
    /// Returns the IO error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the entry for `text` lives at (whether or not it exists)
    #[must_use]
    pub fn path_for(&self, text: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{CACHE_EXTENSION}", cache_key(text)))
    }

    /// Whether `text` has a cached entry
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.path_for(text).is_file()
    }

    /// Read the cached audio for `text`, if any
    ///
    /// # Errors
    ///
    /// Returns IO errors other than the entry being absent.
    pub fn load(&self, text: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(text)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Store audio for `text`.
    ///
    /// Writes to a temporary file first and renames it into place, so a
    /// reader never observes a partial entry.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the entry cannot be written.
    pub fn store(&self, text: &str, audio: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(text);
        let tmp = path.with_extension(format!("{CACHE_EXTENSION}.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(audio)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = audio.len(), "Cached utterance");
        Ok(path)
    }

    /// Number of entries on disk
    #[must_use]
    pub fn len(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| {
                        e.path().extension().and_then(|x| x.to_str()) == Some(CACHE_EXTENSION)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_sha256_hex() {
        assert_eq!(
            cache_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SpeechCache::open(dir.path().join("cache")).unwrap();

        assert!(cache.load("Hello").unwrap().is_none());
        let path = cache.store("Hello", &[1, 2, 3]).unwrap();

        assert!(path.ends_with(format!("{}.raw", cache_key("Hello"))));
        assert!(cache.contains("Hello"));
        assert_eq!(cache.load("Hello").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SpeechCache::open(dir.path()).unwrap();
        cache.store("Hello", &[1]).unwrap();
        assert!(!cache.contains("hello"));
    }
}
