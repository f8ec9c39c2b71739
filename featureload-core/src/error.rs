//! Error types surfaced by the bulk-load pipeline.

use std::{error::Error as StdError, io, sync::Arc};

use thiserror::Error;

use crate::config::ConfigError;

/// Type-erased backend error shared between every caller that observes it.
pub type SharedSource = Arc<dyn StdError + Send + Sync>;

/// Errors raised by the bulk-load pipeline.
///
/// The writer records the first failure and hands a clone of it to every
/// later caller of [`sync_and_wait`](crate::PipelineHandle::sync_and_wait) or
/// [`shutdown`](crate::PipelineHandle::shutdown), so backend sources are
/// reference counted rather than owned.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// Opening or closing the database connection failed.
    #[error("failed to {operation} database connection: {source}")]
    Connection {
        /// Connection lifecycle step that failed.
        operation: &'static str,
        /// Error reported by the backend.
        #[source]
        source: SharedSource,
    },
    /// Beginning, feeding, or ending a copy session failed.
    #[error("failed to {operation} copy into {table}: {source}")]
    Stream {
        /// Table targeted by the copy session.
        table: String,
        /// Copy step that failed.
        operation: &'static str,
        /// Error reported by the backend.
        #[source]
        source: SharedSource,
    },
    /// The delete statement for pending identifiers failed.
    #[error("failed to delete {count} rows from {table}: {source}")]
    Statement {
        /// Table the rows were deleted from.
        table: String,
        /// Number of identifiers carried by the statement.
        count: usize,
        /// Error reported by the backend.
        #[source]
        source: SharedSource,
    },
    /// An internal ordering invariant was violated.
    #[error("protocol misuse: {message}")]
    ProtocolMisuse {
        /// Description of the violated invariant.
        message: &'static str,
    },
    /// Deletions were queued for a target that names no id column.
    #[error("target {table} has pending deletions but no id column")]
    MissingIdColumn {
        /// Table without an id column.
        table: String,
    },
    /// The pipeline configuration was rejected.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    /// The writer thread could not be started.
    #[error("failed to spawn writer thread: {source}")]
    Spawn {
        /// Error returned by the thread builder.
        #[source]
        source: Arc<io::Error>,
    },
    /// The writer thread exited without answering.
    #[error("writer thread terminated unexpectedly")]
    WriterTerminated,
    /// The pipeline has already processed its shutdown request.
    #[error("pipeline has shut down")]
    Closed,
}

impl LoadError {
    pub(crate) fn connection<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Connection {
            operation,
            source: Arc::new(source),
        }
    }

    pub(crate) fn stream<E>(table: &str, operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Stream {
            table: table.to_owned(),
            operation,
            source: Arc::new(source),
        }
    }
}
