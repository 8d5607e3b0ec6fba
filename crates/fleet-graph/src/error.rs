//! Graph-subsystem error type.

use thiserror::Error;

use fleet_core::NodeId;

/// Errors produced by `fleet-graph`.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph description cannot be turned into a valid graph.  Partial
    /// graphs are never returned.
    #[error("malformed navigation graph: {0}")]
    Malformed(String),

    #[error("node {0} not found in navigation graph")]
    UnknownNode(NodeId),

    #[error("no path from {from} to {to}")]
    NoPath { from: NodeId, to: NodeId },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        GraphError::Malformed(msg.into())
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
