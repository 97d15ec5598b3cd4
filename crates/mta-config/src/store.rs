//! Configuration Store
//!
//! Holds one in-memory configuration and applies mutations to it. The store
//! itself is not synchronized: the session manager's actor is its only
//! owner, which is what serializes concurrent edits.

use crate::error::{ConfigError, PersistError};
use crate::intent::Intent;
use crate::persist::ConfigPersister;
use crate::results::AnalysisResults;
use crate::schema::{OptionKind, OptionSchema};
use crate::types::{
    CloneOutcome, ConfigId, Configuration, OptionMap, OptionValue, INPUT_OPTION, NAME_OPTION,
};
use std::sync::Arc;

/// Single source of truth for one configuration
#[derive(Debug)]
pub struct ConfigurationStore {
    config: Configuration,
    schema: Arc<OptionSchema>,
    persister: Arc<dyn ConfigPersister>,
    revision: u64,
}

impl ConfigurationStore {
    /// Create store owning `config`
    #[must_use]
    pub fn new(
        config: Configuration,
        schema: Arc<OptionSchema>,
        persister: Arc<dyn ConfigPersister>,
    ) -> Self {
        Self {
            config,
            schema,
            persister,
            revision: 0,
        }
    }

    /// Id of the held configuration
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConfigId {
        self.config.id
    }

    /// Number of mutations accepted since the store was created
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Option schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    /// Held configuration
    #[inline]
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Get configuration by id
    ///
    /// # Errors
    /// - `ConfigError::NotFound` if `id` is not the held configuration
    pub fn get(&self, id: ConfigId) -> Result<&Configuration, ConfigError> {
        if id == self.config.id {
            Ok(&self.config)
        } else {
            Err(ConfigError::NotFound(id))
        }
    }

    /// Apply any intent, returning the updated option view
    ///
    /// Each accepted intent bumps the revision by one.
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` if the intent is rejected; nothing changes
    pub fn apply(&mut self, intent: &Intent) -> Result<OptionMap, ConfigError> {
        let options = match intent {
            Intent::UpdateOption { name, value } => self.apply_option_change(name, value.clone()),
            Intent::AddOptionValue { option, value } => self.append_option_value(option, value),
            Intent::PromptExternalResult {
                option,
                paths,
                multi,
            } => self.apply_external_selection(option, paths, *multi),
            Intent::CloneStarted { repo } => self.begin_clone(repo),
            Intent::CloneFinished { repo, outcome } => self.finish_clone(repo, outcome),
        }?;
        self.revision += 1;
        Ok(options)
    }

    /// Set or delete an option
    ///
    /// Clearing `name` falls back to a generated unique name instead of
    /// removing it.
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` for unknown options or mismatched kinds
    pub fn apply_option_change(
        &mut self,
        name: &str,
        value: Option<OptionValue>,
    ) -> Result<OptionMap, ConfigError> {
        let descriptor = self.schema.require(name)?;
        let value = descriptor.coerce(value)?;

        if name == NAME_OPTION {
            self.config.name = match value {
                Some(OptionValue::Text(name)) => name,
                _ => self.config.fallback_name(),
            };
            return Ok(self.config.option_view());
        }

        match value {
            Some(value) => {
                self.config.options.insert(name.to_string(), value);
            }
            None => {
                self.config.options.remove(name);
            }
        }
        Ok(self.config.option_view())
    }

    /// Append one value to a list option, creating a singleton list if absent
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` if the option is not a list or `value` is blank
    pub fn append_option_value(&mut self, name: &str, value: &str) -> Result<OptionMap, ConfigError> {
        let descriptor = self.schema.require(name)?;
        if !descriptor.is_multi() {
            return Err(ConfigError::invalid_option(name, "option does not hold a list"));
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::invalid_option(name, "cannot append an empty value"));
        }

        match self.config.options.get_mut(name) {
            Some(OptionValue::List(items)) => items.push(value.to_string()),
            _ => {
                self.config
                    .options
                    .insert(name.to_string(), OptionValue::list([value]));
            }
        }
        Ok(self.config.option_view())
    }

    /// Apply paths chosen by an external picker
    ///
    /// Multi-valued options get the paths appended; single-valued options are
    /// replaced. An empty selection changes nothing.
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` for unknown options or flags
    pub fn apply_external_selection(
        &mut self,
        name: &str,
        paths: &[String],
        multi: bool,
    ) -> Result<OptionMap, ConfigError> {
        let descriptor = self.schema.require(name)?;
        if descriptor.kind == OptionKind::Flag {
            return Err(ConfigError::invalid_option(name, "flags cannot be chosen from files"));
        }
        if paths.is_empty() {
            return Ok(self.config.option_view());
        }

        let value = if descriptor.is_multi() {
            let mut items = if multi {
                self.config.list(name).to_vec()
            } else {
                Vec::new()
            };
            items.extend(paths.iter().cloned());
            OptionValue::List(items)
        } else {
            OptionValue::Text(paths[0].clone())
        };
        self.apply_option_change(name, Some(value))
    }

    /// Mark a repository listed in `input` as being fetched
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` if `repo` is not in `input`
    pub fn begin_clone(&mut self, repo: &str) -> Result<OptionMap, ConfigError> {
        if !self.config.input().iter().any(|i| i == repo) {
            return Err(ConfigError::invalid_option(
                INPUT_OPTION,
                format!("'{repo}' is not an input"),
            ));
        }
        self.config.cloning.insert(repo.to_string());
        Ok(self.config.option_view())
    }

    /// Finish fetching a repository
    ///
    /// Removes it from the cloning set and, in the same step, rewrites
    /// `input`: the repository entry becomes the local path on success or
    /// disappears on failure, then duplicates are dropped keeping the first
    /// occurrence.
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` if `repo` is not being fetched
    pub fn finish_clone(
        &mut self,
        repo: &str,
        outcome: &CloneOutcome,
    ) -> Result<OptionMap, ConfigError> {
        if !self.config.cloning.remove(repo) {
            return Err(ConfigError::invalid_option(
                INPUT_OPTION,
                format!("'{repo}' is not being fetched"),
            ));
        }

        let mut input: Vec<String> = Vec::new();
        for entry in self.config.input() {
            let entry = if entry == repo {
                match outcome {
                    CloneOutcome::Succeeded { local_path } => local_path.clone(),
                    CloneOutcome::Failed { .. } => continue,
                }
            } else {
                entry.clone()
            };
            if !input.contains(&entry) {
                input.push(entry);
            }
        }

        if input.is_empty() {
            self.config.options.remove(INPUT_OPTION);
        } else {
            self.config
                .options
                .insert(INPUT_OPTION.to_string(), OptionValue::List(input));
        }
        Ok(self.config.option_view())
    }

    /// Attach results of a successful analysis
    pub fn set_results(&mut self, results: AnalysisResults) {
        self.config.results = Some(results);
    }

    /// Save the current record
    ///
    /// # Errors
    /// - `PersistError` from the backend; in-memory state is kept
    pub async fn persist(&self) -> Result<(), PersistError> {
        self.persister.save(&self.config).await
    }

    /// Delete the persisted record
    ///
    /// # Errors
    /// - `PersistError` from the backend
    pub async fn forget(&self) -> Result<(), PersistError> {
        self.persister.remove(self.config.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryPersister;

    fn store() -> ConfigurationStore {
        ConfigurationStore::new(
            Configuration::new("store-test"),
            Arc::new(OptionSchema::analyzer_defaults()),
            Arc::new(MemoryPersister::new()),
        )
    }

    #[test]
    fn get_checks_identity() {
        let store = store();
        assert!(store.get(store.id()).is_ok());
        assert!(matches!(store.get(ConfigId::new()), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn revision_counts_accepted_intents() {
        let mut store = store();
        store.apply(&Intent::add("target", "eap8")).unwrap();
        assert!(store.apply(&Intent::add("output", "/x")).is_err());
        store.apply(&Intent::delete("target")).unwrap();
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn delete_removes_key() {
        let mut store = store();
        store
            .apply_option_change("output", Some(OptionValue::text("/out")))
            .unwrap();
        let map = store.apply_option_change("output", None).unwrap();
        assert!(!map.contains_key("output"));
        assert!(store.configuration().options.get("output").is_none());
    }

    #[test]
    fn clearing_name_falls_back() {
        let mut store = store();
        let map = store
            .apply_option_change("name", Some(OptionValue::text("")))
            .unwrap();
        let fallback = store.configuration().fallback_name();
        assert_eq!(store.configuration().name, fallback);
        assert_eq!(map.get("name"), Some(&OptionValue::Text(fallback)));

        store
            .apply_option_change("name", Some(OptionValue::text("renamed")))
            .unwrap();
        assert_eq!(store.configuration().name, "renamed");
    }

    #[test]
    fn append_creates_then_extends() {
        let mut store = store();
        store.append_option_value("target", "eap8").unwrap();
        let map = store.append_option_value("target", "quarkus").unwrap();
        assert_eq!(map.get("target"), Some(&OptionValue::list(["eap8", "quarkus"])));
    }

    #[test]
    fn append_rejects_single_valued() {
        let mut store = store();
        assert!(store.append_option_value("output", "/x").is_err());
        assert!(store.append_option_value("target", "  ").is_err());
    }

    #[test]
    fn external_selection_concatenates_or_replaces() {
        let mut store = store();
        store
            .apply_option_change("input", Some(OptionValue::list(["/a"])))
            .unwrap();

        let map = store
            .apply_external_selection("input", &["/b".into(), "/c".into()], true)
            .unwrap();
        assert_eq!(map.get("input"), Some(&OptionValue::list(["/a", "/b", "/c"])));

        let map = store
            .apply_external_selection("output", &["/out1".into(), "/out2".into()], false)
            .unwrap();
        assert_eq!(map.get("output"), Some(&OptionValue::text("/out1")));

        let map = store.apply_external_selection("input", &["/z".into()], false).unwrap();
        assert_eq!(map.get("input"), Some(&OptionValue::list(["/z"])));
    }

    #[test]
    fn clone_success_replaces_and_dedupes() {
        let mut store = store();
        let repo = "https://git.example.com/app.git";
        store
            .apply_option_change("input", Some(OptionValue::list(["/local/app", repo, "/other"])))
            .unwrap();
        store.begin_clone(repo).unwrap();
        assert!(store.configuration().cloning.contains(repo));

        let map = store
            .finish_clone(
                repo,
                &CloneOutcome::Succeeded {
                    local_path: "/local/app".into(),
                },
            )
            .unwrap();
        assert_eq!(map.get("input"), Some(&OptionValue::list(["/local/app", "/other"])));
        assert!(store.configuration().cloning.is_empty());
    }

    #[test]
    fn clone_failure_drops_entry() {
        let mut store = store();
        let repo = "https://git.example.com/app.git";
        store
            .apply_option_change("input", Some(OptionValue::list([repo])))
            .unwrap();
        store.begin_clone(repo).unwrap();

        let map = store
            .finish_clone(repo, &CloneOutcome::Failed { reason: "auth".into() })
            .unwrap();
        assert!(!map.contains_key("input"));
    }

    #[test]
    fn clone_requires_input_entry() {
        let mut store = store();
        assert!(store.begin_clone("https://nowhere.git").is_err());
        assert!(store
            .finish_clone("https://nowhere.git", &CloneOutcome::Failed { reason: String::new() })
            .is_err());
    }

    #[tokio::test]
    async fn persist_saves_record() {
        let persister = Arc::new(MemoryPersister::new());
        let mut store = ConfigurationStore::new(
            Configuration::new("p"),
            Arc::new(OptionSchema::analyzer_defaults()),
            persister.clone(),
        );
        store
            .apply_option_change("output", Some(OptionValue::text("/o")))
            .unwrap();
        store.persist().await.unwrap();

        let loaded = persister.load(store.id()).await.unwrap().unwrap();
        assert_eq!(loaded.output(), Some("/o"));
    }
}
