//! Unified error types for the stackweave workspace.
//!
//! Every error raised while describing a topology is fatal for the whole
//! description pass. Nothing here is retried or logged-and-continued.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A resource parameter is malformed (bad CIDR, port, zone count, ...).
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A consuming unit's input contract is not satisfied.
    #[error("contract mismatch for {consumer}: {message}")]
    ContractMismatch {
        /// Construct path of the consuming unit.
        consumer: String,
        /// Description of the mismatch.
        message: String,
    },

    /// Two siblings share the same identifier.
    #[error("duplicate id \"{id}\" under {scope}")]
    DuplicateId {
        /// Construct path of the parent scope.
        scope: String,
        /// The conflicting identifier.
        id: String,
    },

    /// An identifier does not satisfy the naming rules.
    #[error("invalid id \"{id}\": {reason}")]
    InvalidId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A referenced construct was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing construct.
        kind: &'static str,
        /// Identifier of the missing construct.
        id: String,
    },

    /// Adding an edge would make the unit dependency graph cyclic.
    #[error("cyclic dependency detected: {dependent} -> {dependency}")]
    CyclicDependency {
        /// Unit that would depend.
        dependent: String,
        /// Unit that would be depended upon.
        dependency: String,
    },

    /// An I/O operation failed while writing the assembly.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization of the assembly failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl TopologyError {
    /// Shorthand for a [`TopologyError::Config`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a [`TopologyError::ContractMismatch`] error.
    pub fn contract(consumer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContractMismatch {
            consumer: consumer.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TopologyError>;
