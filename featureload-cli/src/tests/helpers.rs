//! Test helpers for composing load inputs and layered overrides.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

pub(super) const ROWS: &str = "1\tHigh Street\n2\tMill Lane\n3\tQuay\n";

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) database: Option<Utf8PathBuf>,
    pub(super) table: Option<String>,
    pub(super) input: Option<Utf8PathBuf>,
}

/// Temporary directory holding a COPY text file, a delete-ids file and the
/// database path a load writes to.
#[derive(Debug)]
pub(super) struct LoadFiles {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl LoadFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        fs::write(root.join("roads.copy"), ROWS).expect("write rows");
        fs::write(root.join("config.copy"), ROWS).expect("write config rows");
        fs::write(root.join("env.copy"), ROWS).expect("write env rows");
        fs::write(root.join("stale.ids"), "2\n\n9\n").expect("write ids");
        Self { _dir: dir, root }
    }

    pub(super) fn input(&self) -> Utf8PathBuf {
        self.root.join("roads.copy")
    }

    pub(super) fn config_input(&self) -> Utf8PathBuf {
        self.root.join("config.copy")
    }

    pub(super) fn env_input(&self) -> Utf8PathBuf {
        self.root.join("env.copy")
    }

    pub(super) fn delete_ids(&self) -> Utf8PathBuf {
        self.root.join("stale.ids")
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("out/roads.db")
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Write `contents` to `name` inside the directory and return its path.
    pub(super) fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("write fixture file");
        path
    }
}

#[cfg(feature = "store-sqlite")]
/// Create the `roads` table the loads write into.
pub(super) fn create_roads_table(path: &Utf8Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create database directory");
    }
    let connection = rusqlite::Connection::open(path.as_std_path()).expect("open database");
    connection
        .execute_batch("CREATE TABLE roads (osm_id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
        .expect("create roads table");
}

#[cfg(feature = "store-sqlite")]
/// Rows of the `roads` table ordered by id.
pub(super) fn read_roads(path: &Utf8Path) -> Vec<(i64, String)> {
    let connection = rusqlite::Connection::open(path.as_std_path()).expect("open database");
    let mut statement = connection
        .prepare("SELECT osm_id, name FROM roads ORDER BY osm_id")
        .expect("prepare select");
    let rows = statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query roads")
        .collect::<Result<Vec<_>, _>>()
        .expect("read roads");
    rows
}

pub(super) fn merge_layers(
    mut cli_args: LoadArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<LoadConfig, CliError> {
    merge_field(
        &mut cli_args.database,
        extract_field(&env_layer, |layer| &layer.database),
        extract_field(&file_layer, |layer| &layer.database),
    );
    merge_field(
        &mut cli_args.table,
        extract_field(&env_layer, |layer| &layer.table),
        extract_field(&file_layer, |layer| &layer.table),
    );
    merge_field(
        &mut cli_args.input,
        extract_field(&env_layer, |layer| &layer.input),
        extract_field(&file_layer, |layer| &layer.input),
    );
    let config = LoadConfig::try_from(cli_args)?;
    config.validate_sources()?;
    Ok(config)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: &Option<LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.as_ref().and_then(|entry| accessor(entry).clone())
}
