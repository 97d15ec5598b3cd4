//! MTA Config - shared analysis configuration
//!
//! Keeps one mutable analysis configuration per session consistent across
//! any number of connected views:
//! - Option schema and value coercion
//! - Configuration store with best-effort persistence
//! - Client session protocol layer
//! - Session manager serializing every mutation
//! - Session registry owning store lifetimes
//!
//! # Example
//!
//! ```rust,ignore
//! use mta_config::prelude::*;
//!
//! # async fn example() -> Result<(), ConfigError> {
//! let registry = SessionRegistry::in_memory();
//! let manager = registry.create("my-app");
//!
//! let (session, mut updates) = ClientSession::connect(manager, None).await?;
//! session
//!     .handle_message(ClientMessage::UpdateOption {
//!         name: "output".into(),
//!         value: Some(OptionValue::text("/tmp/report")),
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod intent;
pub mod manager;
pub mod persist;
pub mod registry;
pub mod results;
pub mod schema;
pub mod session;
pub mod store;
pub mod types;

pub use error::{ConfigError, PersistError};
pub use intent::{Intent, IntentEnvelope};
pub use manager::{MutationOutcome, SessionManager};
pub use persist::{ConfigPersister, JsonFilePersister, MemoryPersister};
pub use registry::SessionRegistry;
pub use results::{AnalysisResults, Classification, Hint};
pub use schema::{OptionDescriptor, OptionKind, OptionSchema, SelectionMode};
pub use session::{
    ClientHandle, ClientMessage, ClientSession, ExternalPrompter, NoticeLevel, ServerMessage,
};
pub use store::ConfigurationStore;
pub use types::{
    CloneOutcome, ConfigId, ConfigSnapshot, Configuration, OptionMap, OptionValue, SessionId,
    INPUT_OPTION, NAME_OPTION, OUTPUT_OPTION, TARGET_OPTION,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with MTA Config
    pub use crate::{
        ClientMessage, ClientSession, ConfigError, ConfigId, Configuration, Intent,
        IntentEnvelope, OptionValue, ServerMessage, SessionManager, SessionRegistry,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
