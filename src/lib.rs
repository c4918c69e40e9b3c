//! datagateway - Folder-per-table storage on a remote object store
//!
//! Each named table lives in its own folder under a root folder and owns
//! three objects: the encoded rows, a human-readable summary and an audit
//! log. [`TableStore`] reads and mutates tables; destructive calls pass
//! through a [`ConfirmationPolicy`].

pub mod audit;
pub mod codec;
pub mod config;
pub mod confirm;
pub mod error;
pub mod ingest;
pub mod locator;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod remote;
pub mod render;
pub mod session;
pub mod table_store;

pub use config::GatewayConfig;
pub use confirm::ConfirmationPolicy;
pub use error::{GatewayError, Result};
pub use model::Table;
pub use session::Session;
pub use table_store::{DeleteOutcome, Selection, TableStore};
