//! Core type definitions for indexsync.
//!
//! This crate defines the storage- and transport-agnostic types shared by the
//! rest of the workspace:
//! - The indexing state machine (`Action`, `IndexingRecord`, `RecordKey`)
//! - Outcomes of remote calls and discovery runs (`SyncResult`, `DiscoveryResult`)
//! - Host catalog shapes (`AttributeDefinition`, `CatalogEntity`, `Scope`)
//! - The remote service's attribute model (`RemoteAttribute`, `RemoteDataType`)
//!
//! Persistence adapters return these already typed; nothing downstream
//! re-parses loosely typed storage values.

mod action;
mod attribute;
mod entity;
mod ids;
mod record;
mod result;
mod scope;

pub use action::Action;
pub use attribute::{
    AttributeDefinition, BackendType, FrontendInput, RemoteAttribute, RemoteDataType,
};
pub use entity::CatalogEntity;
pub use ids::RecordId;
pub use record::{IndexingRecord, NewIndexingRecord, RecordKey, RecordKind};
pub use result::{DiscoveryResult, SyncResult};
pub use scope::{AccountCredentials, Scope};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid action: {0:?}")]
    InvalidAction(String),

    #[error("invalid record kind: {0:?}")]
    InvalidRecordKind(String),

    #[error("unsupported remote data type: {0:?}")]
    InvalidDataType(String),
}
