//! Option schema
//!
//! Declares every option a configuration may hold, its value kind and how a
//! view should prompt for it. The store coerces every incoming value through
//! the schema so an option is either absent or holds a non-empty value of its
//! declared kind.

use crate::error::ConfigError;
use crate::types::OptionValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Value kind of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionKind {
    /// Free text
    Text,
    /// Single filesystem path
    Path,
    /// Ordered filesystem paths
    PathList,
    /// Ordered identifiers
    List,
    /// Boolean switch
    Flag,
}

impl OptionKind {
    /// Check if the kind holds several values
    #[inline]
    #[must_use]
    pub fn is_multi(self) -> bool {
        matches!(self, Self::PathList | Self::List)
    }
}

/// What an external chooser may select for an option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    /// Files only
    Files,
    /// Folders only
    Folders,
    /// Files and folders
    FilesAndFolders,
}

/// Declaration of one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDescriptor {
    /// Option name
    pub name: String,
    /// Value kind
    pub kind: OptionKind,
    /// Human-readable description
    pub description: String,
    /// External chooser mode, if the option can be prompted for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<SelectionMode>,
}

impl OptionDescriptor {
    /// Create descriptor
    pub fn new(name: impl Into<String>, kind: OptionKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            prompt: None,
        }
    }

    /// With external chooser mode
    #[inline]
    #[must_use]
    pub fn with_prompt(mut self, mode: SelectionMode) -> Self {
        self.prompt = Some(mode);
        self
    }

    /// Check if the option holds several values
    #[inline]
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.kind.is_multi()
    }

    /// Coerce a value into this option's kind
    ///
    /// Returns `Ok(None)` when the value means "remove the key": absent,
    /// empty text or a list with no non-blank entries.
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` if the value cannot hold this kind
    pub fn coerce(&self, value: Option<OptionValue>) -> Result<Option<OptionValue>, ConfigError> {
        let Some(value) = value else {
            return Ok(None);
        };

        match (self.kind, value) {
            (OptionKind::Flag, OptionValue::Flag(b)) => Ok(Some(OptionValue::Flag(b))),
            (OptionKind::Flag, _) => Err(ConfigError::invalid_option(
                &self.name,
                "expected a boolean",
            )),
            (OptionKind::Text | OptionKind::Path, OptionValue::Text(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(OptionValue::Text(trimmed.to_string())))
                }
            }
            (OptionKind::Text | OptionKind::Path, _) => Err(ConfigError::invalid_option(
                &self.name,
                "expected a single value",
            )),
            (OptionKind::List | OptionKind::PathList, OptionValue::Text(s)) => {
                Ok(normalize_list(vec![s]))
            }
            (OptionKind::List | OptionKind::PathList, OptionValue::List(items)) => {
                Ok(normalize_list(items))
            }
            (OptionKind::List | OptionKind::PathList, OptionValue::Flag(_)) => Err(
                ConfigError::invalid_option(&self.name, "expected a list of values"),
            ),
        }
    }
}

fn normalize_list(items: Vec<String>) -> Option<OptionValue> {
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(OptionValue::List(items))
    }
}

/// Ordered set of option declarations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSchema {
    options: IndexMap<String, OptionDescriptor>,
}

impl OptionSchema {
    /// Create empty schema
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option declaration
    #[must_use]
    pub fn with(mut self, descriptor: OptionDescriptor) -> Self {
        self.options.insert(descriptor.name.clone(), descriptor);
        self
    }

    /// Look up an option
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionDescriptor> {
        self.options.get(name)
    }

    /// Look up an option, rejecting unknown names
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` for undeclared options
    pub fn require(&self, name: &str) -> Result<&OptionDescriptor, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::invalid_option(name, "unknown option"))
    }

    /// Declared options in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &OptionDescriptor> {
        self.options.values()
    }

    /// Number of declared options
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Check if no option is declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Options understood by the analyzer CLI
    #[must_use]
    pub fn analyzer_defaults() -> Self {
        use OptionKind::{Flag, List, Path, PathList, Text};

        Self::new()
            .with(OptionDescriptor::new("name", Text, "Display name of the configuration"))
            .with(
                OptionDescriptor::new("input", PathList, "Applications or source folders to analyze")
                    .with_prompt(SelectionMode::FilesAndFolders),
            )
            .with(
                OptionDescriptor::new("output", Path, "Directory the report is written to")
                    .with_prompt(SelectionMode::Folders),
            )
            .with(OptionDescriptor::new("target", List, "Migration targets"))
            .with(OptionDescriptor::new("source", List, "Source technologies"))
            .with(OptionDescriptor::new("packages", List, "Packages to include"))
            .with(OptionDescriptor::new("excludePackages", List, "Packages to exclude"))
            .with(
                OptionDescriptor::new("userRulesDirectory", PathList, "Additional rule directories")
                    .with_prompt(SelectionMode::Folders),
            )
            .with(OptionDescriptor::new("sourceMode", Flag, "Treat input as source code"))
            .with(OptionDescriptor::new("skipReports", Flag, "Do not generate HTML reports"))
    }
}
