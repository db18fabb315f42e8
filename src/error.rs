//! Error types for the declaration graph.
//!
//! The first four variants are the failures the core raises while building
//! or querying the graph. They are reported synchronously where they are
//! detected and never retried.

use thiserror::Error;

/// Errors raised by the declaration graph, its loaders and its resolver.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A requested handle or cursor has no backing definition.
    #[error("not found: {0}")]
    NotFound(String),

    /// A metadata cursor or syntax node is inconsistent with its declared kind.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Every resolution strategy was exhausted for a reference.
    #[error("unresolved reference `{reference}` requested by {requester} ({location})")]
    UnresolvedReference {
        /// The reference text that could not be matched.
        reference: String,
        /// Full name of the requesting declaration.
        requester: String,
        /// Origin of the requesting declaration.
        location: String,
    },

    /// A side-data slot was written twice for the same kind.
    #[error("data integrity: `{kind}` is already stored on {declaration}")]
    DataIntegrity {
        /// Type name of the payload kind.
        kind: &'static str,
        /// Full name of the declaration owning the slot.
        declaration: String,
    },

    /// The C# grammar could not be loaded or the parser gave up.
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl ModelError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ModelError::MalformedInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ModelError::NotFound(message.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ModelError>;
