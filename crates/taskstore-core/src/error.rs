use std::time::Duration;

use thiserror::Error;

/// Storage-level failures. Not-found is never an error at this layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("kv engine {op} failed: {message}")]
    Engine { op: &'static str, message: String },

    #[error("could not decode record {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode record {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed key, expected `prefix-part-tsid`: {0}")]
    MalformedKey(String),

    #[error("unexpected status: {0}")]
    UnexpectedStatus(u8),
}

impl StoreError {
    pub fn engine(op: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Engine {
            op,
            message: err.to_string(),
        }
    }
}

/// Failures of the consensus path (proposal, apply, snapshot streaming).
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("proposal was not committed within {0:?}")]
    Timeout(Duration),

    #[error("consensus log is closed")]
    Closed,

    #[error("could not encode log entry: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("apply failed: {0}")]
    Apply(String),

    #[error("snapshot stream error: {0}")]
    Snapshot(#[from] std::io::Error),
}

/// Failures talking to a peer node.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("request url {url} error: {message}")]
    Transport { url: String, message: String },

    /// The peer answered with a non-success status.
    #[error("request url {url} error: {message}")]
    Remote { url: String, message: String },

    #[error("response format error from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("unknown node: {0}")]
    UnknownNode(String),
}

/// Top-level error returned by every command and query handler.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Routing(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl TaskStoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TaskStoreError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, TaskStoreError::Validation(_))
    }
}

pub type Result<T, E = TaskStoreError> = std::result::Result<T, E>;
