//! Facade crate for the featureload bulk-load pipeline.
//!
//! This crate re-exports the pipeline, buffer and connection types and exposes
//! the SQLite backend behind the `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use featureload_core::{
    BarrierWait, CommandSender, ConfigError, Connection, Connector, CopyBuffer, CopyManager,
    IdBatchDeleter, LoadError, PipelineConfig, PipelineHandle, TargetDescriptor, copy_text,
};

#[cfg(feature = "store-sqlite")]
pub use featureload_core::{SqliteConnection, SqliteConnector, SqliteLoadError};

#[cfg(feature = "test-support")]
pub use featureload_core::test_support;
