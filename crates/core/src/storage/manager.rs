use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::CoreError;

use super::cache::{CacheKind, CacheRecord, CacheStore};
use super::format;

/// Cache store persisted as one file per `CacheKind` inside a directory.
///
/// Flow: CacheRecord → bincode → header + payload → temp file → rename.
/// Every write gets its own uniquely named temp file in the cache directory,
/// so concurrent writers never share a partial file and the rename makes
/// each write all-or-nothing.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: CacheKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Encode a record to file bytes.
    pub fn encode(kind: CacheKind, record: &CacheRecord) -> Result<Vec<u8>, CoreError> {
        let payload = bincode::serialize(record)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize cache record: {e}")))?;
        Ok(format::write_file(
            format::CURRENT_VERSION,
            kind,
            record.timestamp_ms,
            &payload,
        ))
    }

    /// Decode file bytes, checking that they belong to `kind`.
    pub fn decode(kind: CacheKind, bytes: &[u8]) -> Result<CacheRecord, CoreError> {
        let (header, payload) = format::read_file(bytes)?;
        if header.kind != kind {
            return Err(CoreError::InvalidFileFormat(format!(
                "Expected a {kind} cache file, found {}",
                header.kind
            )));
        }
        let record: CacheRecord = bincode::deserialize(payload).map_err(|e| {
            CoreError::Deserialization(format!("Failed to deserialize cache record: {e}"))
        })?;
        if record.timestamp_ms != header.timestamp_ms {
            return Err(CoreError::InvalidFileFormat(
                "Header timestamp does not match payload".into(),
            ));
        }
        Ok(record)
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, kind: CacheKind) -> Result<Option<CacheRecord>, CoreError> {
        let path = self.path_for(kind);
        if !path.exists() {
            debug!(%kind, "Cache MISS (no file)");
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        let record = Self::decode(kind, &bytes)?;
        debug!(%kind, points = record.data.len(), "Cache HIT (file)");
        Ok(Some(record))
    }

    fn put(&self, kind: CacheKind, record: CacheRecord) -> Result<(), CoreError> {
        let bytes = Self::encode(kind, &record)?;
        let path = self.path_for(kind);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(%kind, path = %path.display(), "Cache PUT (file)");
        Ok(())
    }

    fn invalidate(&self, kind: CacheKind) -> Result<(), CoreError> {
        let path = self.path_for(kind);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
