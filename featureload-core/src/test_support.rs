//! Test-only connection that records every call the writer makes.
//!
//! The recording backend never touches a real store. Each operation appends
//! a [`TraceEvent`] to a shared [`CallTrace`], which tests inspect to check
//! ordering and session reuse. Failures can be injected at any operation and
//! copy writes can be held behind a [`Gate`] to simulate a slow store.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::{Connection, Connector, TargetDescriptor};

/// One call observed by the recording connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A connection was opened.
    Connect,
    /// A copy session was opened for the named table.
    BeginCopy(String),
    /// A chunk of copy data, decoded lossily as UTF-8.
    Write(String),
    /// The copy session was closed.
    EndCopy,
    /// A statement was executed.
    Execute(String),
    /// The connection was closed.
    Close,
}

/// Operation at which the recording connection reports a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Fail to connect.
    Connect,
    /// Fail to open a copy session.
    BeginCopy,
    /// Fail to accept copy data.
    Write,
    /// Fail to close a copy session.
    EndCopy,
    /// Fail to execute a statement.
    Execute,
    /// Fail to disconnect.
    Close,
}

/// Error reported at the configured [`FailPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("recording connection rigged to fail at {point:?}")]
pub struct RecordingError {
    /// Operation that failed.
    pub point: FailPoint,
}

/// Shared, ordered list of recorded calls.
#[derive(Debug, Clone, Default)]
pub struct CallTrace(Arc<Mutex<Vec<TraceEvent>>>);

impl CallTrace {
    fn lock(&self) -> MutexGuard<'_, Vec<TraceEvent>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: TraceEvent) {
        self.lock().push(event);
    }

    /// Snapshot of the calls recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.lock().clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&TraceEvent) -> bool) -> usize {
        self.lock().iter().filter(|event| predicate(event)).count()
    }
}

/// Latch that holds copy writes until opened.
#[derive(Debug, Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    /// Let every held and future write through.
    pub fn open(&self) {
        let (open, condvar) = &*self.0;
        *open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    fn wait(&self) {
        let (open, condvar) = &*self.0;
        let mut guard = open.lock().unwrap_or_else(PoisonError::into_inner);
        while !*guard {
            guard = condvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Connector producing [`RecordingConnection`]s that share one trace.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    trace: CallTrace,
    fail_at: Option<FailPoint>,
    gate: Option<Gate>,
}

impl RecordingConnector {
    /// Report a [`RecordingError`] whenever `point` is reached.
    #[must_use]
    pub fn failing_at(mut self, point: FailPoint) -> Self {
        self.fail_at = Some(point);
        self
    }

    /// Hold every copy write until `gate` opens.
    #[must_use]
    pub fn gated_by(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Handle on the trace shared with every connection.
    #[must_use]
    pub fn trace(&self) -> CallTrace {
        self.trace.clone()
    }

    fn check(fail_at: Option<FailPoint>, point: FailPoint) -> Result<(), RecordingError> {
        if fail_at == Some(point) {
            Err(RecordingError { point })
        } else {
            Ok(())
        }
    }
}

impl Connector for RecordingConnector {
    type Connection = RecordingConnection;
    type Error = RecordingError;

    fn connect(&self) -> Result<RecordingConnection, RecordingError> {
        Self::check(self.fail_at, FailPoint::Connect)?;
        self.trace.push(TraceEvent::Connect);
        Ok(RecordingConnection {
            trace: self.trace.clone(),
            fail_at: self.fail_at,
            gate: self.gate.clone(),
        })
    }
}

/// Connection that records calls instead of talking to a store.
#[derive(Debug)]
pub struct RecordingConnection {
    trace: CallTrace,
    fail_at: Option<FailPoint>,
    gate: Option<Gate>,
}

impl RecordingConnection {
    fn record(&self, point: FailPoint, event: TraceEvent) -> Result<(), RecordingError> {
        RecordingConnector::check(self.fail_at, point)?;
        self.trace.push(event);
        Ok(())
    }
}

impl Connection for RecordingConnection {
    type Error = RecordingError;

    fn begin_copy(&mut self, target: &TargetDescriptor) -> Result<(), RecordingError> {
        self.record(FailPoint::BeginCopy, TraceEvent::BeginCopy(target.name().to_owned()))
    }

    fn write_copy_data(&mut self, data: &[u8]) -> Result<(), RecordingError> {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.record(
            FailPoint::Write,
            TraceEvent::Write(String::from_utf8_lossy(data).into_owned()),
        )
    }

    fn end_copy(&mut self) -> Result<(), RecordingError> {
        self.record(FailPoint::EndCopy, TraceEvent::EndCopy)
    }

    fn execute(&mut self, sql: &str) -> Result<(), RecordingError> {
        self.record(FailPoint::Execute, TraceEvent::Execute(sql.to_owned()))
    }

    fn close(self) -> Result<(), RecordingError> {
        self.record(FailPoint::Close, TraceEvent::Close)
    }
}
