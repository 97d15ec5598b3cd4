//! Session Manager
//!
//! Serializes edits from every client session attached to one configuration
//! and fans out the resulting state.
//!
//! # Ordering
//!
//! One actor task owns the [`ConfigurationStore`]. Every intent is applied,
//! persisted and broadcast to all connected clients (originator included)
//! before the actor takes the next command, so two clients can never
//! interleave read-modify-write cycles on the option map.

use crate::error::{ConfigError, PersistError};
use crate::intent::IntentEnvelope;
use crate::results::AnalysisResults;
use crate::schema::OptionSchema;
use crate::session::{bind_message, ClientHandle, NoticeLevel, ServerMessage};
use crate::store::ConfigurationStore;
use crate::types::{ConfigId, ConfigSnapshot, Configuration, OptionMap, SessionId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const COMMAND_BUFFER: usize = 64;

/// Result of an accepted mutation
#[derive(Debug)]
pub struct MutationOutcome {
    /// Option the mutation targeted
    pub option: String,
    /// Full option map after the mutation
    pub options: OptionMap,
    /// Store revision this mutation produced; strictly increasing
    pub revision: u64,
    /// Set when the record could not be saved; memory state is kept
    pub persist_error: Option<PersistError>,
}

impl MutationOutcome {
    /// Check if the mutation reached storage
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Commands processed by the manager actor
enum Command {
    Connect {
        handle: ClientHandle,
        reply: oneshot::Sender<()>,
    },
    Resync {
        session: SessionId,
        reply: oneshot::Sender<()>,
    },
    Apply {
        envelope: IntentEnvelope,
        reply: oneshot::Sender<Result<MutationOutcome, ConfigError>>,
    },
    Snapshot {
        reply: oneshot::Sender<ConfigSnapshot>,
    },
    Configuration {
        reply: oneshot::Sender<Configuration>,
    },
    SetResults {
        results: AnalysisResults,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        forget: bool,
        reply: oneshot::Sender<Option<PersistError>>,
    },
}

/// Connected clients of one configuration
type Clients = Arc<DashMap<SessionId, ClientHandle>>;

/// Owner of all client sessions attached to one configuration store
#[derive(Debug)]
pub struct SessionManager {
    id: ConfigId,
    schema: Arc<OptionSchema>,
    clients: Clients,
    commands: mpsc::Sender<Command>,
}

impl SessionManager {
    /// Start the actor owning `store`
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(store: ConfigurationStore) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let clients: Clients = Arc::new(DashMap::new());
        let manager = Arc::new(Self {
            id: store.id(),
            schema: Arc::new(store.schema().clone()),
            clients: Arc::clone(&clients),
            commands: tx,
        });

        tokio::spawn(manager_task(store, clients, rx));
        manager
    }

    /// Configuration id
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConfigId {
        self.id
    }

    /// Option schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    /// Number of connected clients
    #[inline]
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Check if the actor is gone
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Register a client and push the full current state to it
    ///
    /// # Errors
    /// - `ConfigError::ManagerClosed` if the actor stopped
    pub async fn connect(&self, handle: ClientHandle) -> Result<(), ConfigError> {
        self.call(|reply| Command::Connect { handle, reply }).await
    }

    /// Deregister a client; later broadcasts skip it
    pub fn disconnect(&self, session: SessionId) {
        self.clients.remove(&session);
    }

    /// Re-send the full state to one client
    ///
    /// # Errors
    /// - `ConfigError::ManagerClosed` if the actor stopped
    pub async fn resync(&self, session: SessionId) -> Result<(), ConfigError> {
        self.call(|reply| Command::Resync { session, reply }).await
    }

    /// Apply an intent, persist and broadcast, in arrival order
    ///
    /// # Errors
    /// - `ConfigError::InvalidOption` if rejected; nothing changed or was broadcast
    /// - `ConfigError::ManagerClosed` if the actor stopped
    pub async fn handle(&self, envelope: IntentEnvelope) -> Result<MutationOutcome, ConfigError> {
        self.call(|reply| Command::Apply { envelope, reply }).await?
    }

    /// Client-visible snapshot
    ///
    /// # Errors
    /// - `ConfigError::ManagerClosed` if the actor stopped
    pub async fn snapshot(&self) -> Result<ConfigSnapshot, ConfigError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    /// Copy of the full configuration
    ///
    /// # Errors
    /// - `ConfigError::ManagerClosed` if the actor stopped
    pub async fn configuration(&self) -> Result<Configuration, ConfigError> {
        self.call(|reply| Command::Configuration { reply }).await
    }

    /// Attach analysis results and broadcast them
    ///
    /// # Errors
    /// - `ConfigError::ManagerClosed` if the actor stopped
    pub async fn set_results(&self, results: AnalysisResults) -> Result<(), ConfigError> {
        self.call(|reply| Command::SetResults { results, reply }).await
    }

    /// Send a non-mutating message to every connected client
    ///
    /// Progress and notifications do not touch the option map, so they skip
    /// the actor queue.
    pub fn publish(&self, message: &ServerMessage) {
        broadcast(&self.clients, message);
    }

    /// Stop the actor and drop every client session
    ///
    /// With `forget`, the persisted record is deleted as well. Returns the
    /// delete error, if any. Calling this on a closed manager is a no-op.
    pub async fn shutdown(&self, forget: bool) -> Option<PersistError> {
        match self.call(|reply| Command::Shutdown { forget, reply }).await {
            Ok(err) => err,
            Err(_) => None,
        }
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ConfigError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| ConfigError::ManagerClosed(self.id))?;
        rx.await.map_err(|_| ConfigError::ManagerClosed(self.id))
    }
}

/// Actor loop owning the store
async fn manager_task(
    mut store: ConfigurationStore,
    clients: Clients,
    mut rx: mpsc::Receiver<Command>,
) {
    let id = store.id();
    tracing::debug!(config = %id, "session manager started");

    while let Some(command) = rx.recv().await {
        match command {
            Command::Connect { handle, reply } => {
                let bind = bind_message(store.configuration().snapshot(), store.schema());
                if handle.send(bind).is_ok() {
                    clients.insert(handle.id, handle);
                }
                let _ = reply.send(());
            }
            Command::Resync { session, reply } => {
                if let Some(handle) = clients.get(&session) {
                    let bind = bind_message(store.configuration().snapshot(), store.schema());
                    let _ = handle.send(bind);
                }
                let _ = reply.send(());
            }
            Command::Apply { envelope, reply } => {
                let result = apply_intent(&mut store, &clients, envelope).await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(store.configuration().snapshot());
            }
            Command::Configuration { reply } => {
                let _ = reply.send(store.configuration().clone());
            }
            Command::SetResults { results, reply } => {
                tracing::info!(config = %id, findings = results.finding_count(), "results attached");
                store.set_results(results.clone());
                broadcast(&clients, &ServerMessage::Results { results });
                let _ = reply.send(());
            }
            Command::Shutdown { forget, reply } => {
                clients.clear();
                let err = if forget { store.forget().await.err() } else { None };
                let _ = reply.send(err);
                break;
            }
        }
    }

    clients.clear();
    tracing::debug!(config = %id, "session manager stopped");
}

async fn apply_intent(
    store: &mut ConfigurationStore,
    clients: &Clients,
    envelope: IntentEnvelope,
) -> Result<MutationOutcome, ConfigError> {
    let IntentEnvelope { origin, intent } = envelope;
    let option = intent.option().to_string();

    let options = match store.apply(&intent) {
        Ok(options) => options,
        Err(err) => {
            tracing::warn!(config = %store.id(), intent = intent.kind(), error = %err, "intent rejected");
            notify_origin(clients, origin, err.to_string());
            return Err(err);
        }
    };
    tracing::debug!(config = %store.id(), intent = intent.kind(), option = %option, "intent applied");

    let persist_error = store.persist().await.err();
    if let Some(err) = &persist_error {
        tracing::error!(config = %store.id(), error = %err, "configuration not saved");
        notify_origin(clients, origin, format!("changes were not saved: {err}"));
    }

    broadcast(
        clients,
        &ServerMessage::UpdateOption {
            option: option.clone(),
            options: options.clone(),
        },
    );

    Ok(MutationOutcome {
        option,
        options,
        revision: store.revision(),
        persist_error,
    })
}

fn notify_origin(clients: &Clients, origin: Option<SessionId>, message: String) {
    if let Some(handle) = origin.and_then(|id| clients.get(&id)) {
        let _ = handle.send(ServerMessage::notice(NoticeLevel::Error, message));
    }
}

/// Deliver to every client, dropping the ones whose transport is gone
fn broadcast(clients: &Clients, message: &ServerMessage) {
    let mut gone = Vec::new();
    for entry in clients.iter() {
        if entry.value().send(message.clone()).is_err() {
            gone.push(*entry.key());
        }
    }
    for id in gone {
        tracing::debug!(session = %id, "dropping closed client");
        clients.remove(&id);
    }
}
