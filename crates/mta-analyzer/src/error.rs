//! Error types for analyzer runs

use mta_config::{ConfigError, ConfigId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration cannot be analyzed as it stands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no input selected")]
    MissingInput,

    #[error("input does not exist: {0}")]
    InputNotFound(String),

    #[error("no output directory selected")]
    MissingOutput,

    #[error("{count} input repositories are still being fetched")]
    CloningInProgress { count: usize },
}

/// Failures of the analyzer subprocess
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no output within {0:?}")]
    StartupTimeout(Duration),

    #[error("process stopped before producing output")]
    ExitedBeforeStart,
}

impl ProcessError {
    /// Check if the process never answered in time
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StartupTimeout(_))
    }
}

/// Settings file problems
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reasons an analysis could not be started
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("analysis already running for {0}")]
    AlreadyRunning(ConfigId),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    /// Check if the user can fix this by editing the configuration
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Why a started run ended without results
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    #[error("analyzer could not be started: {0}")]
    Spawn(String),

    #[error("analyzer produced no output within {0:?}")]
    StartupTimeout(Duration),

    #[error("analyzer stopped unexpectedly")]
    ProcessCrash,

    #[error("results not found at {}", .0.display())]
    ResultsNotFound(PathBuf),

    #[error("malformed results in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

impl RunFailure {
    /// Message shown to the user
    ///
    /// Missing results are kept apart from analyzer failures.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ResultsNotFound(_) => "results not found",
            _ => "analysis could not complete",
        }
    }
}

impl From<ProcessError> for RunFailure {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::StartupTimeout(limit) => Self::StartupTimeout(limit),
            ProcessError::ExitedBeforeStart => Self::ProcessCrash,
            err @ ProcessError::Spawn { .. } => Self::Spawn(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_separate_missing_results() {
        assert_eq!(
            RunFailure::ResultsNotFound(PathBuf::from("/out/results.json")).user_message(),
            "results not found"
        );
        assert_eq!(
            RunFailure::ProcessCrash.user_message(),
            "analysis could not complete"
        );
        assert_eq!(
            RunFailure::StartupTimeout(Duration::from_secs(1)).user_message(),
            "analysis could not complete"
        );
    }

    #[test]
    fn process_errors_map_to_failures() {
        let timeout = ProcessError::StartupTimeout(Duration::from_millis(10));
        assert!(timeout.is_timeout());
        assert_eq!(
            RunFailure::from(timeout),
            RunFailure::StartupTimeout(Duration::from_millis(10))
        );
        assert_eq!(
            RunFailure::from(ProcessError::ExitedBeforeStart),
            RunFailure::ProcessCrash
        );

        let spawn = ProcessError::Spawn {
            program: "mta-cli".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(matches!(RunFailure::from(spawn), RunFailure::Spawn(msg) if msg.contains("mta-cli")));
    }

    #[test]
    fn validation_is_detected() {
        let err = AnalysisError::from(ValidationError::MissingOutput);
        assert!(err.is_validation());
        assert!(!AnalysisError::AlreadyRunning(ConfigId::new()).is_validation());
    }
}
