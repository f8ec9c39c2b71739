#![expect(
    clippy::expect_used,
    reason = "tests should fail fast when setup breaks"
)]

//! Unit tests for the SQLite backend.

use super::*;
use crate::{PipelineConfig, PipelineHandle};
use rstest::{fixture, rstest};
use std::sync::Arc;
use tempfile::TempDir;

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn db_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 path")
}

fn create_roads(path: &Utf8Path) {
    let conn = rusqlite::Connection::open(path.as_std_path()).expect("open database");
    conn.execute_batch("CREATE TABLE roads (osm_id INTEGER, name TEXT, ref TEXT)")
        .expect("create table");
}

fn roads(path: &Utf8Path) -> Vec<(i64, Option<String>)> {
    let conn = rusqlite::Connection::open(path.as_std_path()).expect("open database");
    let mut statement = conn
        .prepare("SELECT osm_id, name FROM roads ORDER BY rowid")
        .expect("prepare select");
    let rows = statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query rows")
        .collect::<Result<_, _>>()
        .expect("read rows");
    rows
}

#[rstest]
fn lines_split_across_chunks_are_reassembled(temp_dir: TempDir) {
    let path = db_path(&temp_dir, "load.db");
    create_roads(&path);
    let target = TargetDescriptor::new("roads", "osm_id").with_columns("osm_id,name");
    let mut conn = SqliteConnector::new(path.clone()).connect().expect("connect");

    conn.begin_copy(&target).expect("begin");
    conn.write_copy_data(b"1\tHigh St").expect("first chunk");
    conn.write_copy_data(b"reet\n2\t\\N\n3\tMarket").expect("second chunk");
    conn.write_copy_data(b" Sq").expect("third chunk");
    conn.end_copy().expect("end");
    conn.close().expect("close");

    assert_eq!(
        roads(&path),
        [
            (1, Some("High Street".to_owned())),
            (2, None),
            (3, Some("Market Sq".to_owned())),
        ]
    );
}

#[rstest]
fn columns_default_to_table_order(temp_dir: TempDir) {
    let path = db_path(&temp_dir, "load.db");
    create_roads(&path);
    let mut conn = SqliteConnector::new(path.clone()).connect().expect("connect");

    conn.begin_copy(&TargetDescriptor::new("roads", "osm_id"))
        .expect("begin");
    conn.write_copy_data(b"9\tMill Lane\tB1234\n").expect("write");
    conn.end_copy().expect("end");

    assert_eq!(roads(&path), [(9, Some("Mill Lane".to_owned()))]);
}

#[rstest]
fn unknown_table_is_rejected(temp_dir: TempDir) {
    let path = db_path(&temp_dir, "load.db");
    let mut conn = SqliteConnector::new(path).connect().expect("connect");

    let err = conn
        .begin_copy(&TargetDescriptor::new("missing", "osm_id"))
        .expect_err("table does not exist");
    assert!(matches!(err, SqliteLoadError::UnknownTable { ref table } if table == "missing"));
}

#[rstest]
#[case(b"1\tA\textra\n".as_slice())]
#[case(b"1\n".as_slice())]
fn row_width_must_match(temp_dir: TempDir, #[case] data: &[u8]) {
    let path = db_path(&temp_dir, "load.db");
    create_roads(&path);
    let target = TargetDescriptor::new("roads", "osm_id").with_columns("osm_id,name");
    let mut conn = SqliteConnector::new(path).connect().expect("connect");

    conn.begin_copy(&target).expect("begin");
    let err = conn.write_copy_data(data).expect_err("width mismatch");
    assert!(matches!(err, SqliteLoadError::RowWidth { expected: 2, row: 1, .. }));
}

#[rstest]
fn malformed_escape_is_reported_with_row(temp_dir: TempDir) {
    let path = db_path(&temp_dir, "load.db");
    create_roads(&path);
    let target = TargetDescriptor::new("roads", "osm_id").with_columns("osm_id,name");
    let mut conn = SqliteConnector::new(path).connect().expect("connect");

    conn.begin_copy(&target).expect("begin");
    let err = conn
        .write_copy_data(b"1\tok\n2\tbad\\q\n")
        .expect_err("unknown escape");
    assert!(matches!(err, SqliteLoadError::Decode { row: 2, .. }));
}

#[rstest]
fn statements_wait_for_the_session_to_close(temp_dir: TempDir) {
    let path = db_path(&temp_dir, "load.db");
    create_roads(&path);
    let target = TargetDescriptor::new("roads", "osm_id").with_columns("osm_id,name");
    let mut conn = SqliteConnector::new(path).connect().expect("connect");

    conn.begin_copy(&target).expect("begin");
    assert!(matches!(
        conn.execute("DELETE FROM roads"),
        Err(SqliteLoadError::SessionOpen { .. })
    ));
    assert!(matches!(conn.begin_copy(&target), Err(SqliteLoadError::SessionOpen { .. })));
    conn.end_copy().expect("end");
    assert!(matches!(conn.end_copy(), Err(SqliteLoadError::NoSession)));
    conn.execute("DELETE FROM roads").expect("statement after session");
}

#[rstest]
fn abandoned_session_is_rolled_back(temp_dir: TempDir) {
    let path = db_path(&temp_dir, "load.db");
    create_roads(&path);
    let target = TargetDescriptor::new("roads", "osm_id").with_columns("osm_id,name");
    let mut conn = SqliteConnector::new(path.clone()).connect().expect("connect");

    conn.begin_copy(&target).expect("begin");
    conn.write_copy_data(b"1\tkept?\n").expect("write");
    drop(conn);

    assert!(roads(&path).is_empty());
}

#[rstest]
fn connect_creates_parent_directories(temp_dir: TempDir) {
    let path = db_path(&temp_dir, "nested/deeper/load.db");
    let connector = SqliteConnector::new(path.clone());

    connector.connect().expect("connect").close().expect("close");

    assert!(path.as_std_path().exists());
    assert_eq!(connector.path(), path.as_path());
}

#[rstest]
fn pipeline_replaces_rows_by_id(temp_dir: TempDir) {
    let path = db_path(&temp_dir, "load.db");
    create_roads(&path);
    let target = Arc::new(TargetDescriptor::new("roads", "osm_id").with_columns("osm_id,name"));
    let config = PipelineConfig::default().with_max_buffer_bytes(128);
    let pipeline =
        PipelineHandle::spawn(SqliteConnector::new(path.clone()), config).expect("spawn");
    let mut rows = pipeline.copy_manager();

    for (id, name) in [(1, "Old Road"), (2, "Bridge St")] {
        rows.new_line(&target).expect("row");
        rows.add_column(id).expect("id");
        rows.add_text_column(name).expect("name");
        rows.finish_line().expect("finish");
    }
    rows.sync().expect("first sync");

    rows.delete_object(&target, 1).expect("delete");
    rows.new_line(&target).expect("row");
    rows.add_column(1).expect("id");
    rows.add_text_column("New Road").expect("name");
    rows.finish_line().expect("finish");
    rows.sync().expect("second sync");
    pipeline.shutdown().expect("shutdown");

    assert_eq!(
        roads(&path),
        [
            (2, Some("Bridge St".to_owned())),
            (1, Some("New Road".to_owned())),
        ]
    );
}
