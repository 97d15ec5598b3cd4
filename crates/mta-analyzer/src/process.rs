//! Process Runner
//!
//! Spawns the analyzer and turns its lifetime into a small state machine:
//! `Spawning -> Running -> {Exited | Killed}`.
//!
//! # Readiness
//!
//! The first stdout line, whatever it says, means the process has started.
//! Anything stricter belongs to the progress protocol layered on top.
//!
//! # Shutdown
//!
//! The shutdown callback fires exactly once per process. An explicit
//! [`ProcessHandle::shutdown`] and the exit watcher race for it; the loser
//! is a no-op.

use crate::error::ProcessError;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};

/// Called once when the process stops for any reason
pub type ShutdownCallback = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of one spawned process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, no output yet
    Spawning,
    /// Produced its first line
    Running,
    /// Stopped on its own; exit code if it had one
    Exited(Option<i32>),
    /// Stopped by us
    Killed,
}

impl ProcessState {
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exited(_) | Self::Killed)
    }
}

/// How to launch the analyzer
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    startup_timeout: Duration,
}

impl ProcessRunner {
    /// Runner for `program` with `args`, 60s startup timeout
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            startup_timeout: Duration::from_secs(60),
        }
    }

    /// With working directory
    #[inline]
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// With time allowed before the first output line
    #[inline]
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Spawn the process and wait for its first output line
    ///
    /// `on_shutdown` fires once when the process stops, including when it
    /// fails to spawn or start.
    ///
    /// # Errors
    /// - `ProcessError::Spawn` if the executable cannot be started
    /// - `ProcessError::StartupTimeout` if no line arrives in time; the process is killed
    /// - `ProcessError::ExitedBeforeStart` if stdout closes before any line
    ///
    /// Dropping the returned future before it resolves kills the process.
    pub async fn run(&self, on_shutdown: ShutdownCallback) -> Result<StartedProcess, ProcessError> {
        let program = self.program.display().to_string();
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                tracing::error!(program = %program, error = %source, "analyzer failed to spawn");
                on_shutdown();
                return Err(ProcessError::Spawn { program, source });
            }
        };

        let pid = child.id();
        tracing::info!(program = %program, pid, args = ?self.args, "analyzer spawned");

        let (lines_tx, mut lines) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, lines_tx));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr, pid));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        let (state, _) = watch::channel(ProcessState::Spawning);
        let shared = Arc::new(Shared {
            state,
            on_shutdown: Mutex::new(Some(on_shutdown)),
            kill: Mutex::new(Some(kill_tx)),
            pid,
        });
        let handle = ProcessHandle {
            shared: Arc::clone(&shared),
        };
        tokio::spawn(supervise(child, kill_rx, shared));

        // Dropping this future before startup resolves must not orphan the child
        let mut guard = StartupGuard(Some(handle.clone()));
        match tokio::time::timeout(self.startup_timeout, lines.recv()).await {
            Ok(Some(first_line)) => {
                guard.0 = None;
                handle.mark_running();
                tracing::info!(pid, "analyzer started");
                Ok(StartedProcess {
                    handle,
                    first_line,
                    lines,
                })
            }
            Ok(None) => {
                handle.shutdown().await;
                Err(ProcessError::ExitedBeforeStart)
            }
            Err(_) => {
                tracing::warn!(pid, timeout = ?self.startup_timeout, "analyzer startup timed out");
                handle.shutdown().await;
                Err(ProcessError::StartupTimeout(self.startup_timeout))
            }
        }
    }
}

/// Kills the process when startup is abandoned mid-wait
struct StartupGuard(Option<ProcessHandle>);

impl Drop for StartupGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            if handle.request_kill() {
                tracing::debug!(pid = handle.pid(), "startup abandoned, analyzer killed");
            }
        }
    }
}

/// A process that passed startup
#[derive(Debug)]
pub struct StartedProcess {
    /// Control handle
    pub handle: ProcessHandle,
    /// The readiness line
    pub first_line: String,
    /// Every later stdout line; closes when stdout does
    pub lines: mpsc::UnboundedReceiver<String>,
}

struct Shared {
    state: watch::Sender<ProcessState>,
    on_shutdown: Mutex<Option<ShutdownCallback>>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
    pid: Option<u32>,
}

impl Shared {
    fn fire_shutdown(&self) {
        let callback = self.on_shutdown.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Shared control handle of a spawned process
#[derive(Clone)]
pub struct ProcessHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.shared.pid)
            .field("state", &self.state())
            .finish()
    }
}

impl ProcessHandle {
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.shared.pid
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ProcessState {
        *self.shared.state.borrow()
    }

    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Wait until the process has stopped
    pub async fn wait(&self) -> ProcessState {
        let mut rx = self.shared.state.subscribe();
        let state = match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    /// Kill the process if it is still alive and wait for it to stop
    ///
    /// Returns `false` when the process had already stopped, in which case
    /// nothing happens.
    pub async fn shutdown(&self) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        let requested = self.request_kill();
        self.wait().await;
        requested
    }

    /// Ask the supervisor to kill the process without waiting for it
    fn request_kill(&self) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        let kill = self.shared.kill.lock().take();
        let requested = kill.is_some_and(|tx| tx.send(()).is_ok());
        self.shared.fire_shutdown();
        requested
    }

    fn mark_running(&self) {
        self.shared.state.send_if_modified(|state| {
            if *state == ProcessState::Spawning {
                *state = ProcessState::Running;
                true
            } else {
                false
            }
        });
    }
}

/// Own the child until it stops, then publish the terminal state
async fn supervise(mut child: Child, kill_rx: oneshot::Receiver<()>, shared: Arc<Shared>) {
    let terminal = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => ProcessState::Exited(status.code()),
            Err(err) => {
                tracing::warn!(pid = shared.pid, error = %err, "lost track of analyzer");
                ProcessState::Exited(None)
            }
        },
        _ = kill_rx => {
            if let Err(err) = child.kill().await {
                tracing::warn!(pid = shared.pid, error = %err, "failed to kill analyzer");
            }
            ProcessState::Killed
        }
    };

    tracing::info!(pid = shared.pid, state = ?terminal, "analyzer stopped");
    shared.state.send_replace(terminal);
    shared.fire_shutdown();
}

async fn forward_lines<R>(stdout: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read analyzer output");
                break;
            }
        }
    }
}

async fn log_stderr<R>(stderr: R, pid: Option<u32>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(pid, "analyzer stderr: {line}");
    }
}
