//! MTA Analyzer - driving the external analyzer
//!
//! Spawns the migration analyzer as an opaque subprocess and turns its
//! output into user-visible progress:
//! - Process Runner with first-line readiness and one-shot shutdown
//! - Progress Monitor over the analyzer's JSON progress protocol
//! - Analysis Orchestrator with one run per configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use mta_analyzer::prelude::*;
//! use mta_config::SessionRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), AnalysisError> {
//! let registry = SessionRegistry::in_memory();
//! let manager = registry.create("my-app");
//! let orchestrator = AnalysisOrchestrator::new(AnalyzerSettings::default());
//!
//! let reporter = Arc::new(SessionReporter::new(Arc::clone(&manager)));
//! let outcome = orchestrator.analyze(manager, reporter).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod args;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod reporter;
pub mod results;
pub mod run_state;
pub mod settings;
pub mod validate;

pub use args::build_cli_args;
pub use error::{AnalysisError, ProcessError, RunFailure, SettingsError, ValidationError};
pub use orchestrator::{AnalysisOrchestrator, RunOutcome};
pub use process::{ProcessHandle, ProcessRunner, ProcessState, ShutdownCallback, StartedProcess};
pub use progress::{ProgressLine, ProgressMonitor, ProgressOperation, ProgressUpdate};
pub use reporter::{AnalysisReporter, LogReporter, Notice, RecordingReporter, SessionReporter};
pub use run_state::{allowed_transitions, validate_transition, IllegalTransition, RunState};
pub use settings::AnalyzerSettings;
pub use validate::validate_configuration;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running analyses
    pub use crate::{
        AnalysisError, AnalysisOrchestrator, AnalysisReporter, AnalyzerSettings, RunOutcome,
        SessionReporter,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
