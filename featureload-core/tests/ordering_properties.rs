//! Property-based tests for the writer's ordering guarantees.
//!
//! # Invariants tested
//!
//! - **Order preservation:** rows reach the store in submission order.
//! - **Session reuse:** one copy session per run of same-target buffers.
//! - **Well-formed trace:** writes only happen inside an open session and
//!   statements only outside one.
//! - **Deletion before insert:** a buffer's delete precedes its rows.

use std::sync::Arc;

use featureload_core::{
    CopyBuffer, PipelineConfig, PipelineHandle, TargetDescriptor,
    test_support::{RecordingConnector, TraceEvent},
};
use proptest::prelude::*;

const TABLES: [&str; 3] = ["points", "lines", "polygons"];

/// One submitted buffer: target index, row id, whether it replaces the id.
type Submission = (usize, u16, bool);

fn submissions() -> impl Strategy<Value = Vec<Submission>> {
    prop::collection::vec((0..TABLES.len(), any::<u16>(), any::<bool>()), 1..40)
}

fn run(submissions: &[Submission], queue_len: usize) -> Vec<TraceEvent> {
    let connector = RecordingConnector::default();
    let trace = connector.trace();
    let config = PipelineConfig::default()
        .with_max_buffer_bytes(1024)
        .with_max_queue_len(queue_len);
    let pipeline = PipelineHandle::spawn(connector, config).unwrap_or_else(|err| panic!("spawn: {err}"));
    let targets: Vec<_> = TABLES
        .iter()
        .map(|table| Arc::new(TargetDescriptor::new(*table, "osm_id")))
        .collect();

    for (position, &(table, id, replace)) in submissions.iter().enumerate() {
        let mut buffer = CopyBuffer::new(Arc::clone(&targets[table]), &config);
        buffer.extend_from_slice(format!("{position}\t{id}\n").as_bytes());
        if replace {
            buffer.add_deletable(i64::from(id));
        }
        pipeline
            .submit(buffer)
            .unwrap_or_else(|err| panic!("submit {position}: {err}"));
    }
    pipeline
        .shutdown()
        .unwrap_or_else(|err| panic!("shutdown: {err}"));
    trace.events()
}

/// Number of sessions the writer needs: a new one whenever the target
/// changes or a deletion forces the open one closed.
fn expected_sessions(submissions: &[Submission]) -> usize {
    let mut sessions = 0;
    let mut open: Option<usize> = None;
    for &(table, _, replace) in submissions {
        if replace || open != Some(table) {
            sessions += 1;
        }
        open = Some(table);
    }
    sessions
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: rows arrive in submission order with minimal sessions.
    #[test]
    fn rows_arrive_in_submission_order(
        submissions in submissions(),
        queue_len in 1_usize..=4,
    ) {
        let events = run(&submissions, queue_len);

        let written: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Write(data) => data.split('\t').next()?.parse().ok(),
                _ => None,
            })
            .collect();
        let expected: Vec<usize> = (0..submissions.len()).collect();
        prop_assert_eq!(written, expected);

        let sessions = events
            .iter()
            .filter(|event| matches!(event, TraceEvent::BeginCopy(_)))
            .count();
        prop_assert_eq!(sessions, expected_sessions(&submissions));
    }

    /// Property: sessions nest properly around writes and statements.
    #[test]
    fn trace_is_well_formed(
        submissions in submissions(),
        queue_len in 1_usize..=4,
    ) {
        let events = run(&submissions, queue_len);

        prop_assert_eq!(events.first(), Some(&TraceEvent::Connect));
        prop_assert_eq!(events.last(), Some(&TraceEvent::Close));
        let mut open = false;
        for event in &events {
            match event {
                TraceEvent::BeginCopy(_) => {
                    prop_assert!(!open, "session opened twice");
                    open = true;
                }
                TraceEvent::EndCopy => {
                    prop_assert!(open, "session closed while idle");
                    open = false;
                }
                TraceEvent::Write(_) => prop_assert!(open, "write outside a session"),
                TraceEvent::Execute(_) | TraceEvent::Close => {
                    prop_assert!(!open, "statement inside a session");
                }
                TraceEvent::Connect => {}
            }
        }
    }

    /// Property: a replacing buffer's delete runs right before its rows.
    #[test]
    fn deletions_precede_their_rows(submissions in submissions()) {
        let events = run(&submissions, 2);

        for (position, &(table, id, replace)) in submissions.iter().enumerate() {
            if !replace {
                continue;
            }
            let row = TraceEvent::Write(format!("{position}\t{id}\n"));
            let write_at = events.iter().position(|event| *event == row);
            prop_assert!(write_at.is_some(), "row {} missing", position);
            let delete = TraceEvent::Execute(format!(
                "DELETE FROM {} WHERE osm_id IN ({id})",
                TABLES[table]
            ));
            let preceding = write_at.and_then(|at| events.get(..at)).unwrap_or_default();
            let delete_at = preceding.iter().rposition(|event| *event == delete);
            prop_assert!(delete_at.is_some(), "delete for row {} missing", position);
        }
    }
}
