//! Batched deletion of rows by identifier.

use std::sync::Arc;

use crate::{Connection, LoadError, TargetDescriptor, config::DEFAULT_MAX_PENDING_DELETES};

/// Accumulates identifiers whose rows must be removed before new rows for
/// the same target are copied.
///
/// Deleting in one statement per buffer trades a larger pending list for far
/// fewer round trips; [`is_over_capacity`](Self::is_over_capacity) tells the
/// producer when the list has grown past its soft cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdBatchDeleter {
    ids: Vec<i64>,
    max_pending: usize,
}

impl Default for IdBatchDeleter {
    fn default() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING_DELETES)
    }
}

impl IdBatchDeleter {
    /// Create an empty deleter with the given soft cap.
    #[must_use]
    pub const fn with_max_pending(max_pending: usize) -> Self {
        Self {
            ids: Vec::new(),
            max_pending,
        }
    }

    /// Queue an identifier for deletion. Duplicates are kept.
    pub fn add(&mut self, id: i64) {
        self.ids.push(id);
    }

    /// Whether any identifiers wait to be deleted.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.ids.is_empty()
    }

    /// Number of identifiers waiting to be deleted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no identifiers wait to be deleted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers waiting to be deleted, in insertion order.
    #[must_use]
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Whether the list has grown past its soft cap.
    #[must_use]
    pub fn is_over_capacity(&self) -> bool {
        self.ids.len() > self.max_pending
    }

    /// Render the delete statement for the pending identifiers.
    ///
    /// # Errors
    /// Returns [`LoadError::MissingIdColumn`] when `target` names no id
    /// column.
    pub fn delete_statement(&self, target: &TargetDescriptor) -> Result<String, LoadError> {
        if !target.has_id_column() {
            return Err(LoadError::MissingIdColumn {
                table: target.name().to_owned(),
            });
        }
        let mut sql = format!(
            "DELETE FROM {} WHERE {} IN (",
            target.name(),
            target.id_column()
        );
        for (position, id) in self.ids.iter().enumerate() {
            if position > 0 {
                sql.push(',');
            }
            sql.push_str(&id.to_string());
        }
        sql.push(')');
        Ok(sql)
    }

    /// Delete every pending identifier from `target` with one statement and
    /// clear the list.
    ///
    /// The list is kept when the statement fails.
    ///
    /// # Errors
    /// Returns [`LoadError::MissingIdColumn`] for targets without an id column
    /// and [`LoadError::Statement`] when the store rejects the statement.
    pub fn flush<C>(&mut self, target: &TargetDescriptor, connection: &mut C) -> Result<(), LoadError>
    where
        C: Connection + ?Sized,
    {
        if self.ids.is_empty() {
            return Ok(());
        }
        let sql = self.delete_statement(target)?;
        connection
            .execute(&sql)
            .map_err(|source| LoadError::Statement {
                table: target.name().to_owned(),
                count: self.ids.len(),
                source: Arc::new(source),
            })?;
        self.ids.clear();
        Ok(())
    }
}
