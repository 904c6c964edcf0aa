//! Error types for flowrunner.
//!
//! Defines the taxonomy from the runtime's error-handling design: topology
//! errors (fatal at `start`, before any worker spawns), initialization and
//! process errors (fatal for the offending block, causing graceful
//! collapse of the rest of the graph), and the escape hatch for block
//! authors' own error types via `anyhow`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("topology error: {0}")]
    Topology(String),

    #[error("block '{block}' failed to initialize: {source}")]
    Initialize {
        block: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("block '{block}' failed during process: {source}")]
    Process {
        block: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("control call '{method}' on '{block}' failed: {source}")]
    Control {
        block: &'static str,
        method: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("control call timed out")]
    Timeout,

    #[error("unknown control method '{0}'")]
    UnknownMethod(&'static str),

    #[error("control call argument/return type mismatch for '{0}'")]
    TypeMismatch(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type that uses [`FlowError`].
pub type Result<T> = std::result::Result<T, FlowError>;
