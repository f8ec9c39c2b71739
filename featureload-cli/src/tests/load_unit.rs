//! Unit tests for streaming load files through the pipeline.

use super::helpers::{LoadFiles, ROWS};
use crate::load::{self, stream_into};
use super::*;
use camino::Utf8PathBuf;
use featureload_core::{
    LoadError, PipelineConfig, TargetDescriptor,
    test_support::{FailPoint, RecordingConnector, TraceEvent},
};
use rstest::rstest;

fn load_config(files: &LoadFiles, delete_ids: Option<Utf8PathBuf>) -> LoadConfig {
    LoadConfig {
        database: files.database(),
        target: TargetDescriptor::new("roads", "osm_id"),
        input: files.input(),
        delete_ids,
        pipeline: PipelineConfig::default().with_max_buffer_bytes(110),
    }
}

#[rstest]
fn streaming_splits_rows_into_buffers_after_deletions() {
    let files = LoadFiles::new();
    let connector = RecordingConnector::default();
    let trace = connector.trace();

    let report = stream_into(connector, &load_config(&files, Some(files.delete_ids())))
        .expect("load succeeds");

    assert_eq!(
        report,
        LoadReport {
            bytes: ROWS.len(),
            rows: 3,
            buffers: 3,
            deleted_ids: 2,
        }
    );
    assert_eq!(
        trace.events(),
        vec![
            TraceEvent::Connect,
            TraceEvent::Execute("DELETE FROM roads WHERE osm_id IN (2,9)".to_owned()),
            TraceEvent::BeginCopy("roads".to_owned()),
            TraceEvent::Write("1\tHigh Street\n".to_owned()),
            TraceEvent::Write("2\tMill Lane\n".to_owned()),
            TraceEvent::Write("3\tQuay\n".to_owned()),
            TraceEvent::EndCopy,
            TraceEvent::Close,
        ]
    );
}

#[rstest]
fn empty_input_never_connects() {
    let files = LoadFiles::new();
    let connector = RecordingConnector::default();
    let trace = connector.trace();
    let config = LoadConfig {
        input: files.write("empty.copy", ""),
        ..load_config(&files, None)
    };

    let report = stream_into(connector, &config).expect("empty load succeeds");

    assert_eq!(report, LoadReport::default());
    assert!(trace.events().is_empty());
}

#[rstest]
fn malformed_delete_ids_are_reported_with_their_line() {
    let files = LoadFiles::new();
    let ids = files.write("bad.ids", "4\nnorth\n");

    let err = stream_into(RecordingConnector::default(), &load_config(&files, Some(ids)))
        .expect_err("non-numeric id should error");

    match err {
        CliError::ParseDeleteId { line, value, .. } => {
            assert_eq!(line, 2);
            assert_eq!(value, "north");
        }
        other => panic!("expected ParseDeleteId, found {other:?}"),
    }
}

#[rstest]
fn store_failures_abort_the_load() {
    let files = LoadFiles::new();
    let connector = RecordingConnector::default().failing_at(FailPoint::Write);
    let trace = connector.trace();

    let err = stream_into(connector, &load_config(&files, None))
        .expect_err("write failure should surface");

    match err {
        CliError::Load(LoadError::Stream {
            table, operation, ..
        }) => {
            assert_eq!(table, "roads");
            assert_eq!(operation, "write");
        }
        other => panic!("expected a stream failure, found {other:?}"),
    }
    // The rejected write is not recorded and the failed connection is
    // dropped without closing.
    assert_eq!(
        trace.events(),
        vec![
            TraceEvent::Connect,
            TraceEvent::BeginCopy("roads".to_owned())
        ]
    );
}

#[cfg(feature = "store-sqlite")]
#[rstest]
fn execute_replaces_rows_in_sqlite() {
    use super::helpers::{create_roads_table, read_roads};

    let files = LoadFiles::new();
    let database = files.database();
    create_roads_table(&database);
    rusqlite::Connection::open(database.as_std_path())
        .expect("open database")
        .execute_batch("INSERT INTO roads VALUES (2, 'Old Lane'), (9, 'Gone Road')")
        .expect("seed rows");

    let report =
        load::execute(&load_config(&files, Some(files.delete_ids()))).expect("load succeeds");

    assert_eq!(report.rows, 3);
    assert_eq!(
        read_roads(&database),
        vec![
            (1, "High Street".to_owned()),
            (2, "Mill Lane".to_owned()),
            (3, "Quay".to_owned()),
        ]
    );
}
