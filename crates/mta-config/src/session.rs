//! Client Session protocol layer
//!
//! Adapts one view connection to the session manager:
//! - Decodes inbound wire messages into intents
//! - Carries outbound state to the view through a channel
//! - Disposes exactly once, however many close events the transport fires
//!
//! No business logic lives here; option semantics belong to the store.

use crate::error::ConfigError;
use crate::intent::{Intent, IntentEnvelope};
use crate::manager::{MutationOutcome, SessionManager};
use crate::results::AnalysisResults;
use crate::schema::{OptionSchema, SelectionMode};
use crate::types::{ConfigSnapshot, OptionMap, OptionValue, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Messages sent by a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Initial sync request
    Ready,
    /// Set or delete an option
    UpdateOption {
        name: String,
        #[serde(default)]
        value: Option<OptionValue>,
    },
    /// Append to a list option
    #[serde(rename_all = "camelCase")]
    AddOptionValue { option_name: String, value: String },
    /// Ask for an external file/folder choice
    #[serde(rename_all = "camelCase")]
    PromptExternal {
        option_name: String,
        #[serde(default)]
        selection_mode: Option<SelectionMode>,
    },
}

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    /// Informational
    Info,
    /// Something degraded but work continues
    Warning,
    /// Operation failed
    Error,
}

/// Messages sent to a view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full state, sent on connect and on `ready`
    #[serde(rename_all = "camelCase")]
    Bind {
        config: ConfigSnapshot,
        option_schema: OptionSchema,
    },
    /// Authoritative option map after an accepted mutation
    UpdateOption { option: String, options: OptionMap },
    /// Analysis progress
    Progress { message: String, percent: u8 },
    /// User-visible notice
    Notification { level: NoticeLevel, message: String },
    /// Results of a completed analysis
    Results { results: AnalysisResults },
}

impl ServerMessage {
    /// Notification message
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self::Notification {
            level,
            message: message.into(),
        }
    }
}

/// Outbound side of one connected view
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// Session ID
    pub id: SessionId,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ClientHandle {
    /// Create handle and the receiving end for the transport
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: SessionId::new(),
                sender,
            },
            rx,
        )
    }

    /// Queue a message for the view
    ///
    /// # Errors
    /// - `ConfigError::SessionDisposed` if the transport side is gone
    pub fn send(&self, message: ServerMessage) -> Result<(), ConfigError> {
        self.sender
            .send(message)
            .map_err(|_| ConfigError::SessionDisposed)
    }

    /// Check if the transport side is gone
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// External file/folder chooser
#[async_trait::async_trait]
pub trait ExternalPrompter: Send + Sync {
    /// Ask the user for paths; `None` when the user cancelled
    async fn choose(&self, option: &str, mode: SelectionMode, multi: bool) -> Option<Vec<String>>;
}

/// One connected view
pub struct ClientSession {
    id: SessionId,
    manager: Arc<SessionManager>,
    prompter: Option<Arc<dyn ExternalPrompter>>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("config", &self.manager.id())
            .field("disposed", &self.disposed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl ClientSession {
    /// Connect a new view to `manager`
    ///
    /// The returned receiver yields a `bind` with the full state first.
    ///
    /// # Errors
    /// - `ConfigError::ManagerClosed` if the manager has shut down
    pub async fn connect(
        manager: Arc<SessionManager>,
        prompter: Option<Arc<dyn ExternalPrompter>>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>), ConfigError> {
        let (handle, rx) = ClientHandle::channel();
        let id = handle.id;
        manager.connect(handle).await?;

        tracing::info!(session = %id, config = %manager.id(), "client connected");
        Ok((
            Self {
                id,
                manager,
                prompter,
                disposed: AtomicBool::new(false),
            },
            rx,
        ))
    }

    /// Session ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Manager this session is attached to
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Check if the session was disposed
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Decode and handle a raw JSON message
    ///
    /// # Errors
    /// - `ConfigError::Protocol` for malformed messages
    /// - any error from [`ClientSession::handle_message`]
    pub async fn handle_json(&self, raw: &str) -> Result<Option<MutationOutcome>, ConfigError> {
        let message: ClientMessage =
            serde_json::from_str(raw).map_err(|e| ConfigError::Protocol(e.to_string()))?;
        self.handle_message(message).await
    }

    /// Translate one inbound message into manager calls
    ///
    /// Returns the mutation outcome when the message produced an intent.
    ///
    /// # Errors
    /// - `ConfigError::SessionDisposed` after disposal
    /// - validation and manager errors from the intent
    pub async fn handle_message(
        &self,
        message: ClientMessage,
    ) -> Result<Option<MutationOutcome>, ConfigError> {
        if self.is_disposed() {
            return Err(ConfigError::SessionDisposed);
        }
        tracing::debug!(session = %self.id, ?message, "client message");

        let intent = match message {
            ClientMessage::Ready => {
                self.manager.resync(self.id).await?;
                return Ok(None);
            }
            ClientMessage::UpdateOption { name, value } => Intent::UpdateOption { name, value },
            ClientMessage::AddOptionValue { option_name, value } => Intent::AddOptionValue {
                option: option_name,
                value,
            },
            ClientMessage::PromptExternal {
                option_name,
                selection_mode,
            } => match self.prompt(&option_name, selection_mode).await? {
                Some(intent) => intent,
                None => return Ok(None),
            },
        };

        self.manager
            .handle(IntentEnvelope::from_session(self.id, intent))
            .await
            .map(Some)
    }

    /// Run the external chooser outside the manager's serialized path
    async fn prompt(
        &self,
        option: &str,
        requested: Option<SelectionMode>,
    ) -> Result<Option<Intent>, ConfigError> {
        let schema = self.manager.schema();
        let descriptor = schema.require(option)?;
        let mode = requested
            .or(descriptor.prompt)
            .ok_or_else(|| ConfigError::invalid_option(option, "option cannot be chosen from files"))?;
        let multi = descriptor.is_multi();

        let prompter = self
            .prompter
            .as_ref()
            .ok_or_else(|| ConfigError::invalid_option(option, "no external chooser available"))?;

        match prompter.choose(option, mode, multi).await {
            Some(paths) => Ok(Some(Intent::PromptExternalResult {
                option: option.to_string(),
                paths,
                multi,
            })),
            None => {
                tracing::debug!(session = %self.id, option, "external choice cancelled");
                Ok(None)
            }
        }
    }

    /// Detach from the manager
    ///
    /// Returns `true` only for the call that actually disconnected.
    pub fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.manager.disconnect(self.id);
        tracing::info!(session = %self.id, config = %self.manager.id(), "client disconnected");
        true
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Schema shared with views
pub(crate) fn bind_message(snapshot: ConfigSnapshot, schema: &OptionSchema) -> ServerMessage {
    ServerMessage::Bind {
        config: snapshot,
        option_schema: schema.clone(),
    }
}
