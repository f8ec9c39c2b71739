//! SQLite backend for the bulk-load pipeline.
//!
//! SQLite has no `COPY` protocol, so a load session is emulated: opening one
//! starts a transaction, every complete COPY text line is decoded and
//! inserted through a cached prepared statement, and closing the session
//! commits. Chunks may split a line anywhere; the unterminated tail is
//! carried into the next chunk.
#![forbid(unsafe_code)]

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use log::debug;
use rusqlite::Error as SqliteError;
use thiserror::Error;

use crate::{Connection, Connector, TargetDescriptor, copy_text::CopyTextError};

mod session;

use session::CopySession;

/// Errors raised by the SQLite backend.
#[derive(Debug, Error)]
pub enum SqliteLoadError {
    /// Failed to create the parent directory for the database file.
    #[error("failed to create parent directory {path:?}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A statement issued by the backend failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// Step that failed.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The target names no columns and the table does not exist.
    #[error("table {table} does not exist")]
    UnknownTable {
        /// Table that was looked up.
        table: String,
    },
    /// A load session is already open on this connection.
    #[error("a load session for {table} is still open")]
    SessionOpen {
        /// Table of the open session.
        table: String,
    },
    /// Load data arrived while no session was open.
    #[error("no load session is open")]
    NoSession,
    /// A row could not be decoded from COPY text.
    #[error("failed to decode row {row} for {table}")]
    Decode {
        /// Table being loaded.
        table: String,
        /// One-based row number within the session.
        row: u64,
        /// Decoding failure.
        #[source]
        source: CopyTextError,
    },
    /// A row carried a different number of columns than the target.
    #[error("row {row} for {table} has {actual} columns, expected {expected}")]
    RowWidth {
        /// Table being loaded.
        table: String,
        /// One-based row number within the session.
        row: u64,
        /// Columns in the target.
        expected: usize,
        /// Columns in the row.
        actual: usize,
    },
}

impl SqliteLoadError {
    fn sqlite(operation: &'static str) -> impl FnOnce(SqliteError) -> Self {
        move |source| Self::Sqlite { operation, source }
    }
}

/// Opens connections to one SQLite database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConnector {
    path: Utf8PathBuf,
}

impl SqliteConnector {
    /// Connector for the database at `path`, created on first connect.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Connector for SqliteConnector {
    type Connection = SqliteConnection;
    type Error = SqliteLoadError;

    fn connect(&self) -> Result<SqliteConnection, SqliteLoadError> {
        ensure_parent_dir(&self.path)?;
        let connection = rusqlite::Connection::open(self.path.as_std_path()).map_err(|source| {
            SqliteLoadError::Open {
                path: self.path.clone(),
                source,
            }
        })?;
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(SqliteLoadError::sqlite("enable SQLite foreign keys"))?;
        debug!("opened SQLite database {}", self.path);
        Ok(SqliteConnection {
            connection,
            session: None,
        })
    }
}

/// A SQLite connection with at most one emulated load session.
#[derive(Debug)]
pub struct SqliteConnection {
    connection: rusqlite::Connection,
    session: Option<CopySession>,
}

impl SqliteConnection {
    fn session_open(&self) -> Result<(), SqliteLoadError> {
        match &self.session {
            Some(session) => Err(SqliteLoadError::SessionOpen {
                table: session.table().to_owned(),
            }),
            None => Ok(()),
        }
    }

    fn resolve_columns(&self, target: &TargetDescriptor) -> Result<Vec<String>, SqliteLoadError> {
        let explicit: Vec<String> = target.column_names().map(str::to_owned).collect();
        if !explicit.is_empty() {
            return Ok(explicit);
        }
        let mut statement = self
            .connection
            .prepare_cached("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(SqliteLoadError::sqlite("prepare table lookup"))?;
        let columns = statement
            .query_map([target.name()], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(SqliteLoadError::sqlite("read table columns"))?;
        if columns.is_empty() {
            return Err(SqliteLoadError::UnknownTable {
                table: target.name().to_owned(),
            });
        }
        Ok(columns)
    }
}

impl Connection for SqliteConnection {
    type Error = SqliteLoadError;

    fn begin_copy(&mut self, target: &TargetDescriptor) -> Result<(), SqliteLoadError> {
        self.session_open()?;
        let columns = self.resolve_columns(target)?;
        self.connection
            .execute_batch("BEGIN")
            .map_err(SqliteLoadError::sqlite("begin load transaction"))?;
        self.session = Some(CopySession::new(target.name(), &columns));
        Ok(())
    }

    fn write_copy_data(&mut self, data: &[u8]) -> Result<(), SqliteLoadError> {
        let session = self.session.as_mut().ok_or(SqliteLoadError::NoSession)?;
        session.write(&self.connection, data)
    }

    fn end_copy(&mut self) -> Result<(), SqliteLoadError> {
        let mut session = self.session.take().ok_or(SqliteLoadError::NoSession)?;
        session.finish(&self.connection)?;
        self.connection
            .execute_batch("COMMIT")
            .map_err(SqliteLoadError::sqlite("commit load transaction"))?;
        debug!("loaded {} rows into {}", session.rows(), session.table());
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<(), SqliteLoadError> {
        self.session_open()?;
        self.connection
            .execute_batch(sql)
            .map_err(SqliteLoadError::sqlite("execute statement"))
    }

    fn close(self) -> Result<(), SqliteLoadError> {
        self.connection
            .close()
            .map_err(|(_, source)| SqliteLoadError::Sqlite {
                operation: "close SQLite database",
                source,
            })
    }
}

fn ensure_parent_dir(path: &Utf8Path) -> Result<(), SqliteLoadError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base, relative) = if parent.is_absolute() {
        ("/", parent.strip_prefix("/").unwrap_or(parent))
    } else {
        (".", parent)
    };
    let create = |source| SqliteLoadError::CreateDirectory {
        path: parent.to_path_buf(),
        source,
    };
    fs_utf8::Dir::open_ambient_dir(base, ambient_authority())
        .map_err(create)?
        .create_dir_all(relative)
        .map_err(create)
}

#[cfg(test)]
mod tests;
