//! Progress Monitor
//!
//! The analyzer interleaves JSON progress operations with ordinary output
//! on stdout. Lines are decoded once into [`ProgressOperation`] and folded
//! into a status message and percentage.
//!
//! Reporting rules:
//! - below 99% the message is `"{title} ({percent}% done)"`
//! - the first time 99% is reached the monitor latches into finalizing and
//!   reports `Finalizing...` from then on, whatever later work says
//! - after `done` or `complete` nothing more is reported

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;

/// Optional prefix marking a progress line
pub const PROGRESS_PREFIX: &str = ":progress:";

/// Message shown once the finalizing latch is set
pub const FINALIZING_MESSAGE: &str = "Finalizing...";

const FINALIZING_PERCENT: u8 = 99;

/// One operation of the analyzer's progress protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ProgressOperation {
    #[serde(rename_all = "camelCase")]
    BeginTask { task: String, total_work: f64 },
    Worked { value: f64 },
    SetTaskName { value: String },
    SubTask { value: String },
    LogMessage { value: String },
    Done,
    Complete,
}

/// What a stdout line turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    Operation(ProgressOperation),
    /// Looked like a progress operation but did not decode
    Malformed(String),
    /// Plain analyzer output
    Output,
}

impl ProgressLine {
    /// Classify one stdout line
    #[must_use]
    pub fn classify(line: &str) -> Self {
        let trimmed = line.trim();
        let (prefixed, body) = match trimmed.strip_prefix(PROGRESS_PREFIX) {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        if !body.starts_with('{') {
            return if prefixed {
                Self::Malformed("expected a JSON object".to_string())
            } else {
                Self::Output
            };
        }

        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(err) if prefixed => return Self::Malformed(err.to_string()),
            Err(_) => return Self::Output,
        };
        if value.get("op").is_none() {
            return if prefixed {
                Self::Malformed("missing 'op'".to_string())
            } else {
                Self::Output
            };
        }
        match serde_json::from_value(value) {
            Ok(op) => Self::Operation(op),
            Err(err) => Self::Malformed(err.to_string()),
        }
    }
}

/// Status to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub message: String,
    pub percent: u8,
}

/// Folds progress operations into user-visible status
#[derive(Debug)]
pub struct ProgressMonitor {
    title: String,
    accumulated: f64,
    total: f64,
    finalizing: bool,
    done: bool,
    settle_delay: Duration,
    completion: Option<oneshot::Sender<()>>,
}

impl ProgressMonitor {
    /// Create monitor and the signal fired `settle_delay` after `complete`
    #[must_use]
    pub fn new(settle_delay: Duration) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let monitor = Self {
            title: String::new(),
            accumulated: 0.0,
            total: 0.0,
            finalizing: false,
            done: false,
            settle_delay,
            completion: Some(tx),
        };
        (monitor, rx)
    }

    /// Current percentage, `floor(min(work * 100 / total, 100))`
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        if self.total <= 0.0 {
            return 0;
        }
        (self.accumulated * 100.0 / self.total).clamp(0.0, 100.0).floor() as u8
    }

    #[inline]
    #[must_use]
    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    /// Check if `done` or `complete` was seen
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Check if `complete` was seen
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completion.is_none()
    }

    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Feed one stdout line
    pub fn observe_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        match ProgressLine::classify(line) {
            ProgressLine::Operation(op) => self.apply(op),
            ProgressLine::Malformed(reason) => {
                tracing::warn!(%reason, "skipping malformed progress line");
                None
            }
            ProgressLine::Output => {
                tracing::debug!("analyzer: {line}");
                None
            }
        }
    }

    /// Apply one operation, returning the update to show, if any
    pub fn apply(&mut self, op: ProgressOperation) -> Option<ProgressUpdate> {
        match op {
            ProgressOperation::BeginTask { task, total_work } => {
                self.title = task;
                self.total = total_work;
                self.report()
            }
            ProgressOperation::Worked { value } => {
                self.accumulated += value;
                self.report()
            }
            ProgressOperation::SetTaskName { value } => {
                self.title = value;
                self.report()
            }
            ProgressOperation::SubTask { value } => {
                tracing::debug!(subtask = %value, "analyzer subtask");
                None
            }
            ProgressOperation::LogMessage { value } => {
                tracing::info!("analyzer: {value}");
                None
            }
            ProgressOperation::Done => {
                self.done = true;
                None
            }
            ProgressOperation::Complete => {
                self.done = true;
                self.signal_completion();
                None
            }
        }
    }

    /// Current status, unless reporting has stopped
    pub fn report(&mut self) -> Option<ProgressUpdate> {
        let percent = self.percent();
        if self.done {
            tracing::debug!(percent, "progress after completion suppressed");
            return None;
        }
        if percent >= FINALIZING_PERCENT {
            self.finalizing = true;
        }
        if self.finalizing {
            return Some(ProgressUpdate {
                message: FINALIZING_MESSAGE.to_string(),
                percent: percent.max(FINALIZING_PERCENT),
            });
        }
        Some(ProgressUpdate {
            message: format!("{} ({percent}% done)", self.title),
            percent,
        })
    }

    fn signal_completion(&mut self) {
        let Some(tx) = self.completion.take() else {
            return;
        };
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(());
        });
    }
}
