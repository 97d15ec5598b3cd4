//! Mutation intents
//!
//! Every change a client (or a collaborator such as the repository fetcher)
//! wants to make to a configuration is one `Intent`, dispatched through the
//! session manager's single `handle` entry point.

use crate::types::{CloneOutcome, OptionValue, SessionId};
use serde::{Deserialize, Serialize};

/// A discrete, named mutation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "camelCase")]
pub enum Intent {
    /// Set an option, or delete it when `value` is absent
    UpdateOption {
        name: String,
        value: Option<OptionValue>,
    },
    /// Append one value to a list option
    AddOptionValue { option: String, value: String },
    /// Paths chosen by an external file picker
    PromptExternalResult {
        option: String,
        paths: Vec<String>,
        multi: bool,
    },
    /// A repository listed in `input` started fetching
    CloneStarted { repo: String },
    /// A repository fetch ended
    CloneFinished { repo: String, outcome: CloneOutcome },
}

impl Intent {
    /// Set an option value
    pub fn update(name: impl Into<String>, value: impl Into<Option<OptionValue>>) -> Self {
        Self::UpdateOption {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Delete an option
    pub fn delete(name: impl Into<String>) -> Self {
        Self::UpdateOption {
            name: name.into(),
            value: None,
        }
    }

    /// Append to a list option
    pub fn add(option: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AddOptionValue {
            option: option.into(),
            value: value.into(),
        }
    }

    /// Option this intent targets, used as the broadcast key
    #[must_use]
    pub fn option(&self) -> &str {
        match self {
            Self::UpdateOption { name, .. } => name,
            Self::AddOptionValue { option, .. } | Self::PromptExternalResult { option, .. } => {
                option
            }
            Self::CloneStarted { .. } | Self::CloneFinished { .. } => crate::types::INPUT_OPTION,
        }
    }

    /// Short label for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateOption { .. } => "updateOption",
            Self::AddOptionValue { .. } => "addOptionValue",
            Self::PromptExternalResult { .. } => "promptExternalResult",
            Self::CloneStarted { .. } => "cloneStarted",
            Self::CloneFinished { .. } => "cloneFinished",
        }
    }
}

/// Intent tagged with the session that submitted it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentEnvelope {
    /// Originating client session, `None` for server-side collaborators
    pub origin: Option<SessionId>,
    /// The mutation
    pub intent: Intent,
}

impl IntentEnvelope {
    /// Intent from a client session
    #[inline]
    #[must_use]
    pub fn from_session(origin: SessionId, intent: Intent) -> Self {
        Self {
            origin: Some(origin),
            intent,
        }
    }

    /// Intent from a server-side collaborator
    #[inline]
    #[must_use]
    pub fn internal(intent: Intent) -> Self {
        Self {
            origin: None,
            intent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_key() {
        assert_eq!(Intent::update("output", OptionValue::text("/o")).option(), "output");
        assert_eq!(Intent::add("target", "quarkus").option(), "target");
        assert_eq!(
            Intent::CloneStarted {
                repo: "https://x/y.git".into()
            }
            .option(),
            "input"
        );
    }

    #[test]
    fn delete_has_no_value() {
        assert_eq!(
            Intent::delete("output"),
            Intent::UpdateOption {
                name: "output".into(),
                value: None
            }
        );
    }
}
