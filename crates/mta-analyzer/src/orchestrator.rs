//! Analysis Orchestrator
//!
//! Runs at most one analysis per configuration. A run validates the
//! configuration, spawns the analyzer, feeds its output through a
//! [`ProgressMonitor`] and ends in exactly one of completed, cancelled or
//! failed.
//!
//! Once a process has been requested, [`AnalysisOrchestrator::analyze`]
//! always returns `Ok`; the failure kind travels in [`RunOutcome`] and in a
//! notice to the reporter.

use crate::args::build_cli_args;
use crate::error::{AnalysisError, RunFailure};
use crate::process::{ProcessHandle, ProcessRunner, StartedProcess};
use crate::progress::ProgressMonitor;
use crate::reporter::{AnalysisReporter, Notice};
use crate::results::load_results;
use crate::run_state::{validate_transition, RunState};
use crate::settings::AnalyzerSettings;
use crate::validate::validate_configuration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mta_config::{AnalysisResults, ConfigId, SessionManager};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

/// How long buffered output is still read after the analyzer stops
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How a started run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Results were loaded and attached to the configuration
    Completed {
        results: AnalysisResults,
        report_path: PathBuf,
    },
    Cancelled,
    Failed(RunFailure),
}

impl RunOutcome {
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Shared state of one active run
#[derive(Debug)]
struct RunControl {
    state: Mutex<RunState>,
    cancelled: AtomicBool,
    resolved: AtomicBool,
    cancel: Notify,
    process: Mutex<Option<ProcessHandle>>,
}

impl RunControl {
    fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Idle),
            cancelled: AtomicBool::new(false),
            resolved: AtomicBool::new(false),
            cancel: Notify::new(),
            process: Mutex::new(None),
        }
    }

    fn state(&self) -> RunState {
        *self.state.lock()
    }

    fn advance(&self, to: RunState) {
        let mut state = self.state.lock();
        match validate_transition(*state, to) {
            Ok(()) => {
                tracing::debug!(from = %*state, %to, "run transition");
                *state = to;
            }
            Err(err) => tracing::warn!(error = %err, "run transition refused"),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Claim the single terminal transition of this run
    fn resolve(&self, terminal: RunState) -> bool {
        if self.resolved.swap(true, Ordering::SeqCst) {
            tracing::warn!(%terminal, "run already resolved");
            return false;
        }
        self.advance(terminal);
        true
    }
}

/// Removes the run slot however the run ends
struct RunSlot<'a> {
    runs: &'a DashMap<ConfigId, Arc<RunControl>>,
    id: ConfigId,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.runs.remove(&self.id);
    }
}

/// How the run loop ended
enum Ending {
    Completed,
    Cancelled,
    Crashed,
}

/// Drives analyzer runs for any number of configurations
#[derive(Debug)]
pub struct AnalysisOrchestrator {
    settings: AnalyzerSettings,
    runs: DashMap<ConfigId, Arc<RunControl>>,
}

impl AnalysisOrchestrator {
    #[must_use]
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self {
            settings,
            runs: DashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Check if `id` has an active run
    #[must_use]
    pub fn is_running(&self, id: ConfigId) -> bool {
        self.runs.contains_key(&id)
    }

    /// Phase of the run for `id`
    #[must_use]
    pub fn state(&self, id: ConfigId) -> RunState {
        self.runs
            .get(&id)
            .map_or(RunState::Idle, |run| run.state())
    }

    /// Ask the active run for `id` to stop
    ///
    /// Progress arriving afterwards is discarded. Returns `false` if nothing
    /// was running or cancellation was already requested.
    pub async fn cancel(&self, id: ConfigId) -> bool {
        let Some(control) = self.runs.get(&id).map(|run| Arc::clone(run.value())) else {
            return false;
        };
        if control.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::info!(config = %id, "analysis cancellation requested");
        control.cancel.notify_one();

        let process = control.process.lock().clone();
        if let Some(process) = process {
            process.shutdown().await;
        }
        true
    }

    /// Run one analysis of the configuration behind `manager`
    ///
    /// # Errors
    /// - `AnalysisError::AlreadyRunning` if this configuration has an active run
    /// - `AnalysisError::Validation` if the configuration cannot be analyzed
    /// - `AnalysisError::Config` if the configuration is closed
    pub async fn analyze(
        &self,
        manager: Arc<SessionManager>,
        reporter: Arc<dyn AnalysisReporter>,
    ) -> Result<RunOutcome, AnalysisError> {
        let id = manager.id();
        let control = Arc::new(RunControl::new());
        match self.runs.entry(id) {
            Entry::Occupied(_) => return Err(AnalysisError::AlreadyRunning(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&control));
            }
        }
        let _slot = RunSlot {
            runs: &self.runs,
            id,
        };

        control.advance(RunState::Validating);
        let config = match manager.configuration().await {
            Ok(config) => config,
            Err(err) => {
                control.advance(RunState::Idle);
                return Err(err.into());
            }
        };
        if let Err(err) = validate_configuration(&config).await {
            tracing::info!(config = %id, error = %err, "analysis refused");
            control.advance(RunState::Idle);
            reporter.notify(&Notice::error(err.to_string()));
            return Err(err.into());
        }

        let output = PathBuf::from(config.output().unwrap_or_default());
        let args = build_cli_args(&config, &self.settings.default_target);
        let runner = ProcessRunner::new(&self.settings.cli_path, args)
            .with_working_dir(&self.settings.working_dir)
            .with_startup_timeout(self.settings.startup_timeout());

        control.advance(RunState::Starting);
        tracing::info!(config = %id, "analysis starting");
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let on_shutdown = Box::new(move || {
            let _ = stopped_tx.send(());
        });

        // Cancelling abandons the startup wait, which kills the analyzer
        let started = tokio::select! {
            biased;
            () = control.cancel.notified() => {
                tracing::info!(config = %id, "analysis cancelled during startup");
                return Ok(resolve_cancelled(&control, reporter.as_ref()));
            }
            result = runner.run(on_shutdown) => result,
        };
        let started = match started {
            Ok(started) => started,
            Err(err) if control.is_cancelled() => {
                tracing::debug!(error = %err, "startup ended after cancellation");
                return Ok(resolve_cancelled(&control, reporter.as_ref()));
            }
            Err(err) => {
                tracing::error!(config = %id, error = %err, "analyzer did not start");
                return Ok(resolve_failed(&control, reporter.as_ref(), RunState::Crashed, err.into()));
            }
        };
        *control.process.lock() = Some(started.handle.clone());
        if control.is_cancelled() {
            started.handle.shutdown().await;
            return Ok(resolve_cancelled(&control, reporter.as_ref()));
        }

        control.advance(RunState::Running);
        reporter.notify(&Notice::info("analysis started"));
        let handle = started.handle.clone();

        match self
            .monitor(&control, started, stopped_rx, reporter.as_ref())
            .await
        {
            Ending::Cancelled => {
                handle.shutdown().await;
                Ok(resolve_cancelled(&control, reporter.as_ref()))
            }
            Ending::Crashed => {
                tracing::error!(config = %id, state = ?handle.state(), "analyzer stopped unexpectedly");
                Ok(resolve_failed(
                    &control,
                    reporter.as_ref(),
                    RunState::Crashed,
                    RunFailure::ProcessCrash,
                ))
            }
            Ending::Completed => {
                let outcome = self.complete(&control, &manager, &output, reporter.as_ref()).await;
                handle.shutdown().await;
                Ok(outcome)
            }
        }
    }

    /// Pump analyzer output until the run ends
    async fn monitor(
        &self,
        control: &RunControl,
        started: StartedProcess,
        mut stopped_rx: oneshot::Receiver<()>,
        reporter: &dyn AnalysisReporter,
    ) -> Ending {
        let StartedProcess { mut lines, .. } = started;
        let (mut monitor, mut completion) = ProgressMonitor::new(self.settings.settle_delay());
        let mut stopped = false;
        let mut lines_open = true;
        // Armed once the process stops; stdout may be held open by its children
        let drain = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(drain);

        loop {
            tokio::select! {
                biased;
                () = control.cancel.notified() => return Ending::Cancelled,
                _ = &mut completion => return Ending::Completed,
                line = lines.recv(), if lines_open => match line {
                    Some(_) if control.is_cancelled() => {}
                    Some(line) => {
                        if let Some(update) = monitor.observe_line(&line) {
                            reporter.progress(&update);
                        }
                    }
                    None => lines_open = false,
                },
                _ = &mut stopped_rx, if !stopped => {
                    stopped = true;
                    drain.as_mut().reset(Instant::now() + OUTPUT_DRAIN_GRACE);
                }
                () = &mut drain, if stopped && lines_open => {
                    tracing::debug!("analyzer output still open after exit");
                    lines_open = false;
                }
            }

            if stopped && !lines_open && !monitor.is_complete() {
                return if control.is_cancelled() {
                    Ending::Cancelled
                } else {
                    Ending::Crashed
                };
            }
        }
    }

    async fn complete(
        &self,
        control: &RunControl,
        manager: &SessionManager,
        output: &std::path::Path,
        reporter: &dyn AnalysisReporter,
    ) -> RunOutcome {
        if !control.resolve(RunState::Completing) {
            return RunOutcome::Cancelled;
        }
        let results_path = self.settings.results_path(output);
        let report_path = self.settings.report_path(output);
        let loaded = load_results(
            &results_path,
            &report_path,
            self.settings.results_poll_attempts,
            self.settings.results_poll_interval(),
        )
        .await;

        let outcome = match loaded {
            Ok((results, report_path)) => {
                tracing::info!(
                    config = %manager.id(),
                    findings = results.finding_count(),
                    report = %report_path.display(),
                    "analysis completed"
                );
                if let Err(err) = manager.set_results(results.clone()).await {
                    tracing::warn!(error = %err, "could not attach results");
                }
                RunOutcome::Completed {
                    results,
                    report_path,
                }
            }
            Err(failure) => {
                tracing::warn!(config = %manager.id(), error = %failure, "results unavailable");
                reporter.notify(&Notice::error(failure.user_message()));
                RunOutcome::Failed(failure)
            }
        };
        control.advance(RunState::Idle);
        outcome
    }
}

fn resolve_cancelled(control: &RunControl, reporter: &dyn AnalysisReporter) -> RunOutcome {
    if control.resolve(RunState::Cancelling) {
        reporter.notify(&Notice::info("analysis cancelled"));
        control.advance(RunState::Idle);
    }
    RunOutcome::Cancelled
}

fn resolve_failed(
    control: &RunControl,
    reporter: &dyn AnalysisReporter,
    terminal: RunState,
    failure: RunFailure,
) -> RunOutcome {
    if control.resolve(terminal) {
        reporter.notify(&Notice::error(failure.user_message()));
        control.advance(RunState::Idle);
    }
    RunOutcome::Failed(failure)
}

impl Default for AnalysisOrchestrator {
    fn default() -> Self {
        Self::new(AnalyzerSettings::default())
    }
}
