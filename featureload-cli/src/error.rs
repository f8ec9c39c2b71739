//! Error types emitted by the featureload CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::{io, sync::Arc};

use camino::Utf8PathBuf;
use featureload_core::{ConfigError, LoadError};
use thiserror::Error;

/// Errors emitted by the featureload CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name of the missing option.
        field: &'static str,
        /// Environment variable that can provide it.
        env: &'static str,
    },
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        /// Cargo feature that is disabled.
        feature: &'static str,
        /// Command that needs it.
        action: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// Path that was checked.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Path that was checked.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Path that was checked.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Pipeline thresholds were rejected.
    #[error("invalid pipeline settings: {0}")]
    InvalidPipelineConfig(#[from] ConfigError),
    /// Reading an input file failed.
    #[error("failed to read {field} file {path:?}: {source}")]
    ReadSource {
        /// Flag naming the file.
        field: &'static str,
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A line of the delete-ids file is not an integer identifier.
    #[error("line {line} of {path:?} is not a row id: {value:?}")]
    ParseDeleteId {
        /// File being read.
        path: Utf8PathBuf,
        /// One-based line number.
        line: usize,
        /// Offending text.
        value: String,
    },
    /// The bulk-load pipeline failed.
    #[error("bulk load failed: {0}")]
    Load(#[from] LoadError),
    /// Writing the load report failed.
    #[error("failed to write load report: {0}")]
    WriteReport(#[source] io::Error),
}
