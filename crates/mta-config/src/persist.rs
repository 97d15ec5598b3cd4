//! Configuration persistence
//!
//! The store persists the full record after every accepted mutation.
//! Durability is best effort: a failed save is reported but never rolls
//! back the in-memory configuration.

use crate::error::PersistError;
use crate::types::{ConfigId, Configuration};
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Storage backend for configuration records
#[async_trait::async_trait]
pub trait ConfigPersister: Send + Sync + std::fmt::Debug {
    /// Save the full record, replacing any previous version
    async fn save(&self, config: &Configuration) -> Result<(), PersistError>;

    /// Load a record, `None` if it was never saved
    async fn load(&self, id: ConfigId) -> Result<Option<Configuration>, PersistError>;

    /// Delete a record; deleting a missing record is not an error
    async fn remove(&self, id: ConfigId) -> Result<(), PersistError>;
}

/// One pretty-printed JSON file per configuration
#[derive(Debug, Clone)]
pub struct JsonFilePersister {
    dir: PathBuf,
}

impl JsonFilePersister {
    /// Create persister rooted at `dir`
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a record file
    #[must_use]
    pub fn record_path(&self, id: ConfigId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait::async_trait]
impl ConfigPersister for JsonFilePersister {
    async fn save(&self, config: &Configuration) -> Result<(), PersistError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistError::io_error(&self.dir, e))?;

        let path = self.record_path(config.id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(config)?;

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| PersistError::io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PersistError::io_error(&path, e))?;

        tracing::debug!(config = %config.id, path = %path.display(), "configuration saved");
        Ok(())
    }

    async fn load(&self, id: ConfigId) -> Result<Option<Configuration>, PersistError> {
        let path = self.record_path(id);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistError::io_error(&path, e)),
        };
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn remove(&self, id: ConfigId) -> Result<(), PersistError> {
        let path = self.record_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistError::io_error(&path, e)),
        }
    }
}

/// In-memory records, used when no storage directory is configured
#[derive(Debug, Default)]
pub struct MemoryPersister {
    records: DashMap<ConfigId, String>,
}

impl MemoryPersister {
    /// Create empty persister
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl ConfigPersister for MemoryPersister {
    async fn save(&self, config: &Configuration) -> Result<(), PersistError> {
        // Stored encoded so loads go through the same decoding as files
        let body = serde_json::to_string(config)?;
        self.records.insert(config.id, body);
        Ok(())
    }

    async fn load(&self, id: ConfigId) -> Result<Option<Configuration>, PersistError> {
        match self.records.get(&id) {
            Some(body) => Ok(Some(serde_json::from_str(body.value())?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, id: ConfigId) -> Result<(), PersistError> {
        self.records.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptionValue;

    fn sample() -> Configuration {
        let mut config = Configuration::new("persisted");
        config
            .options
            .insert("input".into(), OptionValue::list(["/src/app", "/src/lib"]));
        config
            .options
            .insert("output".into(), OptionValue::text("/tmp/out"));
        config
            .options
            .insert("sourceMode".into(), OptionValue::Flag(true));
        config
    }

    #[tokio::test]
    async fn json_file_round_trip_keeps_types() {
        let dir = tempfile::tempdir().unwrap();
        let persister = JsonFilePersister::new(dir.path().join("configs"));
        let config = sample();

        persister.save(&config).await.unwrap();
        assert!(persister.record_path(config.id).exists());

        let loaded = persister.load(config.id).await.unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.option("sourceMode"), Some(&OptionValue::Flag(true)));
    }

    #[tokio::test]
    async fn json_file_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let persister = JsonFilePersister::new(dir.path());
        assert!(persister.load(ConfigId::new()).await.unwrap().is_none());
        persister.remove(ConfigId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn json_file_corrupt_record_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let persister = JsonFilePersister::new(dir.path());
        let id = ConfigId::new();
        std::fs::write(persister.record_path(id), "{not json").unwrap();

        let err = persister.load(id).await.unwrap_err();
        assert!(matches!(err, PersistError::Serde(_)));
    }

    #[tokio::test]
    async fn memory_round_trip_and_remove() {
        let persister = MemoryPersister::new();
        let config = sample();

        persister.save(&config).await.unwrap();
        assert_eq!(persister.len(), 1);
        assert_eq!(persister.load(config.id).await.unwrap(), Some(config.clone()));

        persister.remove(config.id).await.unwrap();
        assert!(persister.is_empty());
    }
}
