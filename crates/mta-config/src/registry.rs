//! Session Registry
//!
//! Owns the lifetime of every configuration store and its session manager.
//! Passed explicitly to whoever needs it; there is no process-wide state.

use crate::error::ConfigError;
use crate::manager::SessionManager;
use crate::persist::{ConfigPersister, MemoryPersister};
use crate::schema::OptionSchema;
use crate::store::ConfigurationStore;
use crate::types::{ConfigId, Configuration};
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of open configurations
#[derive(Debug)]
pub struct SessionRegistry {
    schema: Arc<OptionSchema>,
    persister: Arc<dyn ConfigPersister>,
    managers: DashMap<ConfigId, Arc<SessionManager>>,
}

impl SessionRegistry {
    /// Create registry with the given schema and storage backend
    #[must_use]
    pub fn new(schema: OptionSchema, persister: Arc<dyn ConfigPersister>) -> Self {
        Self {
            schema: Arc::new(schema),
            persister,
            managers: DashMap::new(),
        }
    }

    /// Registry with the analyzer schema and in-memory storage
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            OptionSchema::analyzer_defaults(),
            Arc::new(MemoryPersister::new()),
        )
    }

    /// Create and open a new configuration with an empty option map
    pub fn create(&self, name: impl Into<String>) -> Arc<SessionManager> {
        self.open(Configuration::new(name))
    }

    /// Open an existing configuration, replacing nothing if already open
    pub fn open(&self, config: Configuration) -> Arc<SessionManager> {
        let id = config.id;
        let entry = self.managers.entry(id).or_insert_with(|| {
            tracing::info!(config = %id, name = %config.name, "configuration opened");
            SessionManager::spawn(ConfigurationStore::new(
                config,
                Arc::clone(&self.schema),
                Arc::clone(&self.persister),
            ))
        });
        Arc::clone(entry.value())
    }

    /// Open a persisted configuration
    ///
    /// # Errors
    /// - `ConfigError::NotFound` if no record exists
    /// - `ConfigError::Persist` if the record cannot be read
    pub async fn load(&self, id: ConfigId) -> Result<Arc<SessionManager>, ConfigError> {
        if let Some(manager) = self.get(id) {
            return Ok(manager);
        }
        let config = self
            .persister
            .load(id)
            .await?
            .ok_or(ConfigError::NotFound(id))?;
        Ok(self.open(config))
    }

    /// Get an open configuration
    #[inline]
    #[must_use]
    pub fn get(&self, id: ConfigId) -> Option<Arc<SessionManager>> {
        self.managers.get(&id).map(|m| Arc::clone(m.value()))
    }

    /// Close a configuration, dropping all of its client sessions
    ///
    /// With `forget`, the persisted record is deleted too.
    ///
    /// # Errors
    /// - `ConfigError::NotFound` if the configuration is not open
    /// - `ConfigError::Persist` if deleting the record failed
    pub async fn close(&self, id: ConfigId, forget: bool) -> Result<(), ConfigError> {
        let (_, manager) = self.managers.remove(&id).ok_or(ConfigError::NotFound(id))?;
        tracing::info!(config = %id, forget, "configuration closed");
        match manager.shutdown(forget).await {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Ids of open configurations
    #[must_use]
    pub fn ids(&self) -> Vec<ConfigId> {
        let mut ids: Vec<ConfigId> = self.managers.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Number of open configurations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Check if nothing is open
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
