//! Asynchronous bulk loading of feature rows into a relational store.
//!
//! Producers encode rows in the PostgreSQL COPY text format and hand full
//! buffers to a [`PipelineHandle`]. A single writer thread owns the database
//! connection, keeps a copy session open while consecutive buffers target
//! the same table, applies pending deletions before the rows that replace
//! them, and releases barriers once everything submitted earlier has been
//! applied.
//!
//! Backends plug in through the [`Connector`] and [`Connection`] traits. The
//! `store-sqlite` feature provides [`SqliteConnector`], which emulates copy
//! sessions with transactions.

#![forbid(unsafe_code)]

mod barrier;
mod command;
mod config;
mod connection;
mod copy_mgr;
pub mod copy_text;
mod deleter;
mod error;
mod pipeline;
mod target;

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use barrier::{BarrierSignal, BarrierWait, barrier};
pub use command::{Command, CopyBuffer, FinishToken};
pub use config::{
    BUFFER_HEADROOM, ConfigError, DEFAULT_MAX_BUFFER_BYTES, DEFAULT_MAX_PENDING_DELETES,
    DEFAULT_MAX_QUEUE_LEN, PipelineConfig,
};
pub use connection::{Connection, Connector};
pub use copy_mgr::CopyManager;
pub use deleter::IdBatchDeleter;
pub use error::{LoadError, SharedSource};
pub use pipeline::{CommandSender, PipelineHandle, WRITER_THREAD_NAME};
pub use target::TargetDescriptor;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteConnection, SqliteConnector, SqliteLoadError};
