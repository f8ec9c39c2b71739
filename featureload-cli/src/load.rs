//! Load command implementation for the featureload CLI.

use std::{
    io::{BufRead, BufReader},
    sync::Arc,
};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8;
use clap::Parser;
use featureload_core::{
    Connector, CopyBuffer, LoadError, PipelineConfig, PipelineHandle, TargetDescriptor,
};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_DELETE_IDS, ARG_ID_COLUMN, ARG_INPUT, ARG_TABLE, CliError, ENV_DATABASE,
    ENV_ID_COLUMN, ENV_INPUT, ENV_TABLE, fs,
};

/// CLI arguments for the `load` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Stream a file of COPY text rows into one table through the \
                 bulk-load pipeline. Row ids listed in a delete-ids file are \
                 removed before the rows are copied.",
    about = "Bulk-load COPY text rows into a table"
)]
#[ortho_config(prefix = "FEATURELOAD")]
pub(crate) struct LoadArgs {
    /// Path to the SQLite database receiving the rows.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Table the rows are copied into.
    #[arg(long = ARG_TABLE, value_name = "name")]
    #[serde(default)]
    pub(crate) table: Option<String>,
    /// Comma-separated column list; defaults to every column of the table.
    #[arg(long = "columns", value_name = "a,b")]
    #[serde(default)]
    pub(crate) columns: Option<String>,
    /// Column holding the row id used by deletions.
    #[arg(long = ARG_ID_COLUMN, value_name = "column")]
    #[serde(default)]
    pub(crate) id_column: Option<String>,
    /// File of COPY text rows, one per line.
    #[arg(long = ARG_INPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// File of row ids to delete first, one per line.
    #[arg(long = ARG_DELETE_IDS, value_name = "path")]
    #[serde(default)]
    pub(crate) delete_ids: Option<Utf8PathBuf>,
    /// Size threshold of a copy buffer in bytes.
    #[arg(long = "max-buffer-bytes", value_name = "bytes")]
    #[serde(default)]
    pub(crate) max_buffer_bytes: Option<usize>,
    /// Number of buffers queued before the reader waits.
    #[arg(long = "max-queue-len", value_name = "count")]
    #[serde(default)]
    pub(crate) max_queue_len: Option<usize>,
    /// Number of ids a buffer deletes at most.
    #[arg(long = "max-pending-deletes", value_name = "count")]
    #[serde(default)]
    pub(crate) max_pending_deletes: Option<usize>,
}

impl LoadArgs {
    pub(crate) fn into_config(self) -> Result<LoadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        LoadConfig::try_from(merged)
    }
}

/// Resolved `load` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadConfig {
    /// Path to the SQLite database.
    pub(crate) database: Utf8PathBuf,
    /// Table, columns and id column of the load.
    pub(crate) target: TargetDescriptor,
    /// Path to the COPY text rows.
    pub(crate) input: Utf8PathBuf,
    /// Path to the ids deleted before loading.
    pub(crate) delete_ids: Option<Utf8PathBuf>,
    /// Pipeline thresholds.
    pub(crate) pipeline: PipelineConfig,
}

impl LoadConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.input, ARG_INPUT)?;
        if let Some(path) = &self.delete_ids {
            Self::require_existing(path, ARG_DELETE_IDS)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<LoadArgs> for LoadConfig {
    type Error = CliError;

    fn try_from(args: LoadArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_DATABASE,
        })?;
        let table = args.table.ok_or(CliError::MissingArgument {
            field: ARG_TABLE,
            env: ENV_TABLE,
        })?;
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_INPUT,
        })?;
        let id_column = args.id_column.unwrap_or_default();
        if args.delete_ids.is_some() && id_column.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_ID_COLUMN,
                env: ENV_ID_COLUMN,
            });
        }

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            max_buffer_bytes: args.max_buffer_bytes.unwrap_or(defaults.max_buffer_bytes),
            max_queue_len: args.max_queue_len.unwrap_or(defaults.max_queue_len),
            max_pending_deletes: args
                .max_pending_deletes
                .unwrap_or(defaults.max_pending_deletes),
        };
        pipeline.validate()?;

        Ok(Self {
            database,
            target: TargetDescriptor::new(table, id_column)
                .with_columns(args.columns.unwrap_or_default()),
            input,
            delete_ids: args.delete_ids,
            pipeline,
        })
    }
}

/// Totals reported after a successful load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Bytes of row data submitted.
    pub bytes: usize,
    /// Rows submitted.
    pub rows: usize,
    /// Buffers handed to the pipeline.
    pub buffers: usize,
    /// Row ids deleted before loading.
    pub deleted_ids: usize,
}

/// Load `config.input` into the SQLite database named by `config`.
#[cfg(feature = "store-sqlite")]
pub(crate) fn execute(config: &LoadConfig) -> Result<LoadReport, CliError> {
    let connector = featureload_core::SqliteConnector::new(config.database.clone());
    stream_into(connector, config)
}

#[cfg(not(feature = "store-sqlite"))]
pub(crate) fn execute(_config: &LoadConfig) -> Result<LoadReport, CliError> {
    Err(CliError::MissingFeature {
        feature: "store-sqlite",
        action: "load",
    })
}

/// Stream the configured files through a pipeline backed by `connector`.
///
/// The pipeline is always shut down; a streaming error takes precedence
/// over the failure shutdown reports.
pub(crate) fn stream_into<C: Connector>(
    connector: C,
    config: &LoadConfig,
) -> Result<LoadReport, CliError> {
    let pipeline = PipelineHandle::spawn(connector, config.pipeline)?;
    let mut loader = Loader {
        pipeline: &pipeline,
        target: Arc::new(config.target.clone()),
        config: config.pipeline,
        report: LoadReport::default(),
    };
    let streamed = loader.run(config);
    let report = loader.report;
    let stopped = pipeline.shutdown();
    streamed?;
    stopped?;
    info!(
        "loaded {} rows ({} bytes, {} buffers) into {}, deleting {} ids",
        report.rows,
        report.bytes,
        report.buffers,
        config.target.name(),
        report.deleted_ids
    );
    Ok(report)
}

struct Loader<'a> {
    pipeline: &'a PipelineHandle,
    target: Arc<TargetDescriptor>,
    config: PipelineConfig,
    report: LoadReport,
}

impl Loader<'_> {
    fn run(&mut self, config: &LoadConfig) -> Result<(), CliError> {
        let mut buffer = self.fresh_buffer();
        if let Some(path) = &config.delete_ids {
            buffer = self.queue_deletions(path, buffer)?;
        }
        buffer = self.queue_rows(&config.input, buffer)?;
        self.submit(buffer)?;
        self.pipeline.sync_and_wait()?;
        Ok(())
    }

    fn queue_deletions(
        &mut self,
        path: &Utf8Path,
        mut buffer: CopyBuffer,
    ) -> Result<CopyBuffer, CliError> {
        for (index, line) in read_lines(path, ARG_DELETE_IDS)?.lines().enumerate() {
            let line = line.map_err(|source| CliError::ReadSource {
                field: ARG_DELETE_IDS,
                path: path.to_path_buf(),
                source,
            })?;
            let value = line.trim();
            if value.is_empty() {
                continue;
            }
            let id = value.parse::<i64>().map_err(|_| CliError::ParseDeleteId {
                path: path.to_path_buf(),
                line: index + 1,
                value: value.to_owned(),
            })?;
            buffer.add_deletable(id);
            self.report.deleted_ids += 1;
            if buffer.is_full() {
                self.submit(buffer)?;
                buffer = self.fresh_buffer();
            }
        }
        Ok(buffer)
    }

    fn queue_rows(
        &mut self,
        path: &Utf8Path,
        mut buffer: CopyBuffer,
    ) -> Result<CopyBuffer, CliError> {
        let mut reader = read_lines(path, ARG_INPUT)?;
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|source| CliError::ReadSource {
                    field: ARG_INPUT,
                    path: path.to_path_buf(),
                    source,
                })?;
            if read == 0 {
                return Ok(buffer);
            }
            buffer.extend_from_slice(&line);
            self.report.rows += 1;
            self.report.bytes += read;
            if buffer.is_full() {
                self.submit(buffer)?;
                buffer = self.fresh_buffer();
            }
        }
    }

    fn submit(&mut self, buffer: CopyBuffer) -> Result<(), LoadError> {
        if buffer.is_empty() {
            return Ok(());
        }
        self.pipeline.submit(buffer)?;
        self.report.buffers += 1;
        Ok(())
    }

    fn fresh_buffer(&self) -> CopyBuffer {
        CopyBuffer::new(Arc::clone(&self.target), &self.config)
    }
}

fn read_lines(
    path: &Utf8Path,
    field: &'static str,
) -> Result<BufReader<fs_utf8::File>, CliError> {
    fs::open_utf8_file(path)
        .map(BufReader::new)
        .map_err(|source| CliError::ReadSource {
            field,
            path: path.to_path_buf(),
            source,
        })
}
