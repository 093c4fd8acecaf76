//! # Error Types
//!
//! Errors surfaced by the search engine to the owning feature. Recoverable
//! conditions such as a chunk that is not loaded yet never show up here; they
//! are retried silently by the coordinator.

use thiserror::Error;

use crate::engine_state::voxels::chunk::ChunkKey;

/// Errors produced by the area search engine and its configuration layer.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The block query panicked while testing a block of the given chunk.
    ///
    /// The chunk is marked failed and contributes no matches until the query,
    /// the area, or the chunk itself changes.
    #[error("block query failed while scanning chunk {chunk}: {message}")]
    PredicateFailed {
        /// Chunk whose scan or patch triggered the failure
        chunk: ChunkKey,
        /// Panic payload rendered as text
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid search configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read search configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`SearchConfig`](crate::config::SearchConfig).
    #[error("failed to parse search configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A worker thread could not be spawned.
    #[error("failed to spawn search worker {index}: {source}")]
    WorkerSpawn {
        /// Index of the worker within the pool
        index: usize,
        /// Underlying OS error
        source: std::io::Error,
    },
}
