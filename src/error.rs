use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::EntityKind;

#[derive(Debug, Error, Diagnostic)]
pub enum PolisError {
    #[error("invalid country id: {0}")]
    InvalidCountry(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("association not found: {0}")]
    AssociationNotFound(String),

    #[error("association already exists for user {user_id} and entity {entity_id}")]
    DuplicateAssociation { user_id: String, entity_id: String },

    #[error("api request failed: {0}")]
    ApiHttp(String),

    #[error("api returned status {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("association store request failed: {0}")]
    Storage(String),

    #[error("association store returned status {status}: {message}")]
    StorageStatus { status: u16, message: String },

    #[error("calculation failed: {0}")]
    Calculation(String),

    #[error("invalid {kind} record: {reason}")]
    InvalidEntity { kind: EntityKind, reason: String },

    #[error("missing config file polis-rm.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
