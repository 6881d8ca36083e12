//! `eventdesk-core`: configuration, shared errors and catalog types used by
//! the report scheduler, the order integrity layer and the CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::EventdeskConfig;
pub use error::{CoreError, Result};
pub use types::{CatalogItem, ItemConfig, ItemId, ItemKind};
