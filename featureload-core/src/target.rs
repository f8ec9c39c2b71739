//! Descriptions of copy destinations.

use std::ptr;

/// Table information needed to build copy and delete statements.
///
/// Descriptors are shared behind an [`Arc`](std::sync::Arc) by every buffer
/// that loads into the same table, which keeps the common "same target"
/// comparison a pointer check.
///
/// # Examples
///
/// ```
/// use featureload_core::TargetDescriptor;
///
/// let points = TargetDescriptor::new("planet_osm_point", "osm_id");
/// let subset = TargetDescriptor::new("planet_osm_point", "osm_id").with_columns("osm_id,way");
/// assert!(!points.is_copy_compatible_with(&subset));
/// assert_eq!(subset.copy_statement(), "COPY planet_osm_point (osm_id,way) FROM STDIN");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    name: String,
    columns: String,
    id_column: String,
}

impl TargetDescriptor {
    /// Describe a copy into every column of `name`, deleting by `id_column`.
    ///
    /// Pass an empty `id_column` for append-only targets.
    pub fn new(name: impl Into<String>, id_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: String::new(),
            id_column: id_column.into(),
        }
    }

    /// Restrict the copy to a comma-separated column list.
    #[must_use]
    pub fn with_columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    /// Name of the target table.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Comma-separated column list; empty when every column is loaded.
    #[must_use]
    pub fn columns(&self) -> &str {
        &self.columns
    }

    /// Column matched against identifiers when deleting rows.
    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Whether rows of this target can be deleted by id.
    #[must_use]
    pub fn has_id_column(&self) -> bool {
        !self.id_column.is_empty()
    }

    /// Individual column names of the qualifier, trimmed.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns
            .split(',')
            .map(str::trim)
            .filter(|column| !column.is_empty())
    }

    /// Whether a buffer for `other` can continue a copy opened for `self`.
    ///
    /// The id column plays no part: it only matters to deletions, which close
    /// the copy anyway.
    #[must_use]
    pub fn is_copy_compatible_with(&self, other: &Self) -> bool {
        ptr::eq(self, other) || (self.name == other.name && self.columns == other.columns)
    }

    /// `COPY` statement opening a text-format load for this target.
    #[must_use]
    pub fn copy_statement(&self) -> String {
        if self.columns.is_empty() {
            format!("COPY {} FROM STDIN", self.name)
        } else {
            format!("COPY {} ({}) FROM STDIN", self.name, self.columns)
        }
    }
}
