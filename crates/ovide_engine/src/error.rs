/*
SPDX-License-Identifier: MPL-2.0
*/

use thiserror::Error;

/// Failure reported by a persistence backend.
///
/// Backends are external collaborators; their failures are carried as
/// plain messages tagged with the operation that raised them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("persistence failure in {operation}: {message}")]
pub struct PersistenceError {
    pub operation: &'static str,
    pub message: String,
}

impl PersistenceError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        PersistenceError {
            operation,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("production {0} not found")]
    ProductionNotFound(String),

    #[error("section {0} not found")]
    SectionNotFound(String),

    #[error("resource {0} not found")]
    ResourceNotFound(String),

    #[error("note {0} not found in section {1}")]
    NoteNotFound(String, String),

    #[error("no contextualizer model accepts resource {resource_id} in {mode} mode")]
    NoMatchingContextualizer {
        resource_id: String,
        mode: &'static str,
    },

    #[error("selection does not resolve to a block of the target content")]
    InvalidSelection,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
