//! Testing utilities for MTA Assist workspace
//!
//! Shared test helpers, fixtures, and fakes.

#![allow(missing_docs)]

use mta_config::{
    ConfigId, ConfigPersister, Configuration, ExternalPrompter, OptionSchema, PersistError,
    SelectionMode, ServerMessage, SessionRegistry,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// How long helpers wait for an expected message
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Persister whose saves always fail
#[derive(Debug, Default)]
pub struct FailingPersister;

#[async_trait::async_trait]
impl ConfigPersister for FailingPersister {
    async fn save(&self, _config: &Configuration) -> Result<(), PersistError> {
        Err(PersistError::Unavailable("disk full".to_string()))
    }

    async fn load(&self, _id: ConfigId) -> Result<Option<Configuration>, PersistError> {
        Ok(None)
    }

    async fn remove(&self, _id: ConfigId) -> Result<(), PersistError> {
        Ok(())
    }
}

/// Prompter answering with a fixed selection and recording each request
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answer: Option<Vec<String>>,
    pub requests: Mutex<Vec<(String, SelectionMode, bool)>>,
}

impl ScriptedPrompter {
    /// Prompter that picks `paths`
    pub fn picking<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answer: Some(paths.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Prompter where the user always cancels
    pub fn cancelling() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ExternalPrompter for ScriptedPrompter {
    async fn choose(&self, option: &str, mode: SelectionMode, multi: bool) -> Option<Vec<String>> {
        self.requests.lock().push((option.to_string(), mode, multi));
        self.answer.clone()
    }
}

/// Registry backed by `persister`
pub fn registry_with(persister: Arc<dyn ConfigPersister>) -> SessionRegistry {
    SessionRegistry::new(OptionSchema::analyzer_defaults(), persister)
}

/// Wait for the next message of any kind
pub async fn next_message(rx: &mut UnboundedReceiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a server message")
        .expect("client channel closed")
}

/// Wait for the next `updateOption` broadcast, skipping anything else
pub async fn next_update(rx: &mut UnboundedReceiver<ServerMessage>) -> ServerMessage {
    loop {
        let message = next_message(rx).await;
        if matches!(message, ServerMessage::UpdateOption { .. }) {
            return message;
        }
    }
}

/// Everything currently queued for a client
pub fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

/// A `:progress:` framed protocol line
pub fn progress_line(json: &str) -> String {
    format!(":progress: {json}")
}

/// Write an executable POSIX shell script standing in for the analyzer
#[cfg(unix)]
pub fn fake_analyzer(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-analyzer.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake analyzer");
    let mut perms = std::fs::metadata(&path).expect("stat fake analyzer").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake analyzer");
    path
}

/// Configuration ready to analyze: existing input dir, output dir under `root`
pub fn runnable_config(root: &Path) -> Configuration {
    use mta_config::OptionValue;

    let input = root.join("app");
    std::fs::create_dir_all(&input).expect("create input dir");
    let output = root.join("out");

    let mut config = Configuration::new("fixture");
    config.options.insert(
        "input".into(),
        OptionValue::list([input.to_string_lossy().into_owned()]),
    );
    config.options.insert(
        "output".into(),
        OptionValue::text(output.to_string_lossy().into_owned()),
    );
    config
}
