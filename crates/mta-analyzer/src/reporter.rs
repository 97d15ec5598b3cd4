//! Where run progress and notices go

use crate::progress::ProgressUpdate;
use mta_config::{NoticeLevel, ServerMessage, SessionManager};
use parking_lot::Mutex;
use std::sync::Arc;

/// A user-visible notice about a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Receives progress and notices of one run
pub trait AnalysisReporter: Send + Sync {
    fn progress(&self, update: &ProgressUpdate);

    fn notify(&self, notice: &Notice);
}

/// Forwards run events to every client of a configuration
#[derive(Debug, Clone)]
pub struct SessionReporter {
    manager: Arc<SessionManager>,
}

impl SessionReporter {
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

impl AnalysisReporter for SessionReporter {
    fn progress(&self, update: &ProgressUpdate) {
        self.manager.publish(&ServerMessage::Progress {
            message: update.message.clone(),
            percent: update.percent,
        });
    }

    fn notify(&self, notice: &Notice) {
        self.manager
            .publish(&ServerMessage::notice(notice.level, notice.message.clone()));
    }
}

/// Writes run events to the log, for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl AnalysisReporter for LogReporter {
    fn progress(&self, update: &ProgressUpdate) {
        tracing::info!(percent = update.percent, "{}", update.message);
    }

    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::error!("{}", notice.message),
            NoticeLevel::Warning => tracing::warn!("{}", notice.message),
            NoticeLevel::Info => tracing::info!("{}", notice.message),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<ProgressUpdate>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().clone()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Messages of every notice, in order
    #[must_use]
    pub fn notice_messages(&self) -> Vec<String> {
        self.notices.lock().iter().map(|n| n.message.clone()).collect()
    }
}

impl AnalysisReporter for RecordingReporter {
    fn progress(&self, update: &ProgressUpdate) {
        self.updates.lock().push(update.clone());
    }

    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_config::SessionRegistry;

    #[tokio::test]
    async fn session_reporter_reaches_clients() {
        let registry = SessionRegistry::in_memory();
        let manager = registry.create("report");
        let (handle, mut rx) = mta_config::ClientHandle::channel();
        manager.connect(handle).await.unwrap();
        let _bind = rx.recv().await.unwrap();

        let reporter = SessionReporter::new(Arc::clone(&manager));
        reporter.progress(&ProgressUpdate {
            message: "scan (10% done)".into(),
            percent: 10,
        });
        reporter.notify(&Notice::error("analysis could not complete"));

        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::Progress {
                message: "scan (10% done)".into(),
                percent: 10
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::notice(NoticeLevel::Error, "analysis could not complete")
        );
    }

    #[test]
    fn recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        reporter.notify(&Notice::info("analysis started"));
        reporter.notify(&Notice::warning("slow"));
        assert_eq!(reporter.notice_messages(), vec!["analysis started", "slow"]);
        assert!(reporter.updates().is_empty());
    }
}
