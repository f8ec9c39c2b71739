//! Line assembly and row inserts for one emulated load session.

use rusqlite::params_from_iter;

use super::SqliteLoadError;
use crate::copy_text::{self, ROW_TERMINATOR};

/// Marker line PostgreSQL clients may send to end COPY data.
const END_OF_DATA: &[u8] = b"\\.";

#[derive(Debug)]
pub(super) struct CopySession {
    table: String,
    insert_sql: String,
    width: usize,
    pending: Vec<u8>,
    rows: u64,
}

impl CopySession {
    pub(super) fn new(table: &str, columns: &[String]) -> Self {
        let column_list = columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            table: table.to_owned(),
            insert_sql: format!("INSERT INTO {table} ({column_list}) VALUES ({placeholders})"),
            width: columns.len(),
            pending: Vec::new(),
            rows: 0,
        }
    }

    pub(super) fn table(&self) -> &str {
        &self.table
    }

    pub(super) const fn rows(&self) -> u64 {
        self.rows
    }

    /// Insert every complete line of `pending` + `data`, keeping the
    /// unterminated tail for the next chunk.
    pub(super) fn write(
        &mut self,
        connection: &rusqlite::Connection,
        data: &[u8],
    ) -> Result<(), SqliteLoadError> {
        self.pending.extend_from_slice(data);
        let Some(last) = self.pending.iter().rposition(|&byte| byte == ROW_TERMINATOR) else {
            return Ok(());
        };
        let tail = self.pending.split_off(last + 1);
        let complete = std::mem::replace(&mut self.pending, tail);
        complete
            .strip_suffix(&[ROW_TERMINATOR])
            .unwrap_or(&complete)
            .split(|&byte| byte == ROW_TERMINATOR)
            .try_for_each(|line| self.insert_line(connection, line))
    }

    /// Insert a final line that arrived without a terminator.
    pub(super) fn finish(&mut self, connection: &rusqlite::Connection) -> Result<(), SqliteLoadError> {
        let rest = std::mem::take(&mut self.pending);
        if rest.is_empty() {
            return Ok(());
        }
        self.insert_line(connection, &rest)
    }

    fn insert_line(
        &mut self,
        connection: &rusqlite::Connection,
        line: &[u8],
    ) -> Result<(), SqliteLoadError> {
        if line == END_OF_DATA {
            return Ok(());
        }
        let row = self.rows + 1;
        let fields = copy_text::decode_line(line).map_err(|source| SqliteLoadError::Decode {
            table: self.table.clone(),
            row,
            source,
        })?;
        if fields.len() != self.width {
            return Err(SqliteLoadError::RowWidth {
                table: self.table.clone(),
                row,
                expected: self.width,
                actual: fields.len(),
            });
        }
        connection
            .prepare_cached(&self.insert_sql)
            .map_err(SqliteLoadError::sqlite("prepare row insert"))?
            .execute(params_from_iter(fields.iter()))
            .map_err(SqliteLoadError::sqlite("insert row"))?;
        self.rows = row;
        Ok(())
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
