//! Core types for MTA Config
//!
//! Defines the configuration record shared by every connected view:
//! - Identifiers for configurations and client sessions
//! - Option values and the option map
//! - The configuration itself and its client-visible snapshot

use crate::results::AnalysisResults;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use ulid::Ulid;

/// Name of the option mirrored into [`Configuration::name`]
pub const NAME_OPTION: &str = "name";
/// Paths or repositories to analyze
pub const INPUT_OPTION: &str = "input";
/// Directory the analyzer writes its report into
pub const OUTPUT_OPTION: &str = "output";
/// Migration targets
pub const TARGET_OPTION: &str = "target";

/// Unique configuration identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(pub Ulid);

impl ConfigId {
    /// Generate new configuration ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ConfigId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConfigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConfigId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Unique client session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value held by a configuration option
///
/// Serialized untagged so persisted records keep their JSON shape:
/// booleans stay booleans and lists stay lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean switch
    Flag(bool),
    /// Ordered list of strings
    List(Vec<String>),
    /// Single string
    Text(String),
}

impl OptionValue {
    /// Single string value
    #[inline]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// List value from any string iterator
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Borrow as text
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as list
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Read as flag
    #[inline]
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

/// Option name to value mapping
pub type OptionMap = BTreeMap<String, OptionValue>;

/// Result of fetching a remote repository listed in `input`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CloneOutcome {
    /// Repository is available locally
    #[serde(rename_all = "camelCase")]
    Succeeded { local_path: String },
    /// Fetch failed; the repository is dropped from `input`
    Failed { reason: String },
}

/// Analysis configuration
///
/// The persisted record is `{id, name, options}`. The cloning set and the
/// results of the last run live in memory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Unique identity
    pub id: ConfigId,
    /// Display name, never empty
    pub name: String,
    /// Option values; absent options have no key
    #[serde(default)]
    pub options: OptionMap,
    /// Remote repositories from `input` currently being fetched
    #[serde(skip)]
    pub cloning: BTreeSet<String>,
    /// Results of the last successful analysis
    #[serde(skip)]
    pub results: Option<AnalysisResults>,
}

impl Configuration {
    /// Create configuration with an empty option map
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(ConfigId::new(), name)
    }

    /// Create configuration with a known id
    #[must_use]
    pub fn with_id(id: ConfigId, name: impl Into<String>) -> Self {
        let mut config = Self {
            id,
            name: name.into(),
            options: OptionMap::new(),
            cloning: BTreeSet::new(),
            results: None,
        };
        if config.name.trim().is_empty() {
            config.name = config.fallback_name();
        }
        config
    }

    /// Name used when the `name` option is cleared
    #[must_use]
    pub fn fallback_name(&self) -> String {
        let id = self.id.to_string().to_lowercase();
        format!("analysis-{}", &id[id.len() - 8..])
    }

    /// Get option value
    #[inline]
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// Get list option, empty when absent
    #[must_use]
    pub fn list(&self, name: &str) -> &[String] {
        self.options
            .get(name)
            .and_then(OptionValue::as_list)
            .unwrap_or(&[])
    }

    /// Get text option
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(OptionValue::as_text)
    }

    /// Get flag option, false when absent
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.options
            .get(name)
            .and_then(OptionValue::as_flag)
            .unwrap_or(false)
    }

    /// Input paths
    #[inline]
    #[must_use]
    pub fn input(&self) -> &[String] {
        self.list(INPUT_OPTION)
    }

    /// Output path
    #[inline]
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.text(OUTPUT_OPTION)
    }

    /// Option map as seen by clients, `name` included
    #[must_use]
    pub fn option_view(&self) -> OptionMap {
        let mut view = self.options.clone();
        view.insert(NAME_OPTION.to_string(), OptionValue::Text(self.name.clone()));
        view
    }

    /// Client-visible snapshot
    #[must_use]
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            id: self.id,
            name: self.name.clone(),
            options: self.option_view(),
            cloning: self.cloning.iter().cloned().collect(),
            results: self.results.clone(),
        }
    }
}

/// Read-only view of a configuration sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    /// Configuration id
    pub id: ConfigId,
    /// Display name
    pub name: String,
    /// Options including `name`
    pub options: OptionMap,
    /// Repositories being fetched
    pub cloning: Vec<String>,
    /// Last analysis results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<AnalysisResults>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_value_json_shapes() {
        let mut options = OptionMap::new();
        options.insert("input".into(), OptionValue::list(["/a", "/b"]));
        options.insert("output".into(), OptionValue::text("/out"));
        options.insert("sourceMode".into(), OptionValue::Flag(true));

        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(
            json,
            r#"{"input":["/a","/b"],"output":"/out","sourceMode":true}"#
        );

        let back: OptionMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }

    #[test]
    fn persisted_record_round_trip() {
        let mut config = Configuration::new("demo");
        config
            .options
            .insert("target".into(), OptionValue::list(["eap7"]));
        config
            .options
            .insert("skipReports".into(), OptionValue::Flag(false));
        config.cloning.insert("https://example.com/repo.git".into());

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("cloning").is_none());
        assert!(json.get("results").is_none());

        let back: Configuration = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, config.id);
        assert_eq!(back.options, config.options);
        assert!(back.cloning.is_empty());
    }

    #[test]
    fn blank_name_falls_back() {
        let config = Configuration::new("   ");
        assert!(config.name.starts_with("analysis-"));
        assert_eq!(config.name.len(), "analysis-".len() + 8);

        let id = config.id.to_string().to_lowercase();
        assert!(id.ends_with(&config.name["analysis-".len()..]));
    }

    #[test]
    fn option_view_includes_name() {
        let config = Configuration::new("demo");
        let view = config.option_view();
        assert_eq!(view.get(NAME_OPTION), Some(&OptionValue::text("demo")));
        assert!(config.options.get(NAME_OPTION).is_none());
    }

    #[test]
    fn config_id_parses_display() {
        let id = ConfigId::new();
        let parsed: ConfigId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
