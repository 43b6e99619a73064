//! Error types for element access

use souldesk_core_types::NativeId;
use thiserror::Error;

/// Failures raised by a backend while reading an element.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElementError {
    /// The native reference no longer denotes a live element
    #[error("element {id} on backend '{backend}' no longer exists")]
    InvalidReference { backend: String, id: NativeId },

    /// No backend registered under this name
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// Backend-specific failure (COM error, accessibility bus timeout, ...)
    #[error("backend '{backend}' failed: {reason}")]
    Backend { backend: String, reason: String },

    /// Tree description could not be loaded
    #[error("failed to load element tree: {0}")]
    Load(String),
}

impl ElementError {
    pub fn invalid_reference(backend: impl Into<String>, id: &NativeId) -> Self {
        Self::InvalidReference {
            backend: backend.into(),
            id: id.clone(),
        }
    }

    pub fn backend(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, ElementError::InvalidReference { .. })
    }

    /// Check if a later read could succeed (the tree may have changed meanwhile)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ElementError::InvalidReference { .. } | ElementError::Backend { .. }
        )
    }
}

pub type ElementResult<T> = Result<T, ElementError>;
