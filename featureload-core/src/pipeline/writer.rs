//! The single thread that owns the database connection.

use std::{sync::Arc, thread};

use log::{debug, error, info};

use crate::{Command, Connection, Connector, CopyBuffer, LoadError, TargetDescriptor};

use super::queue::WorkQueue;

/// Drains the work queue into one connection.
///
/// A copy session stays open between buffers for compatible targets and is
/// only closed when a deletion, a target switch, a barrier, or the finish
/// command needs the connection free.
pub(crate) struct Writer<C: Connector> {
    connector: C,
    connection: Option<C::Connection>,
    inflight: Option<Arc<TargetDescriptor>>,
    failed: Option<LoadError>,
    queue: Arc<WorkQueue>,
}

impl<C: Connector> Writer<C> {
    pub(crate) const fn new(connector: C, queue: Arc<WorkQueue>) -> Self {
        Self {
            connector,
            connection: None,
            inflight: None,
            failed: None,
            queue,
        }
    }

    /// Process commands until [`Command::Finish`] arrives.
    pub(crate) fn run(mut self) {
        let _abandon = AbandonOnPanic(Arc::clone(&self.queue));
        loop {
            match self.queue.pop_blocking() {
                Command::Copy(buffer) => self.copy(buffer),
                Command::Sync(signal) => {
                    let outcome = self.sync();
                    signal.release(outcome);
                }
                Command::Finish(_) => {
                    self.finish();
                    break;
                }
            }
        }
        // `Finish` already closed the queue; this wakes producers still
        // waiting for room.
        drop(self.queue.close());
    }

    fn copy(&mut self, buffer: CopyBuffer) {
        if self.failed.is_some() {
            debug!("discarding copy buffer for {} after failure", buffer.target().name());
            return;
        }
        if let Err(err) = self.write_to_db(buffer) {
            self.fail(err);
        }
    }

    fn write_to_db(&mut self, buffer: CopyBuffer) -> Result<(), LoadError> {
        let (target, data, mut deleter) = buffer.into_parts();

        if deleter.has_pending() {
            self.finish_copy()?;
            let count = deleter.len();
            let connection = self.idle_connection()?;
            deleter.flush(&target, connection)?;
            debug!("deleted {count} ids from {}", target.name());
        }

        if data.is_empty() {
            return Ok(());
        }

        let reusable = self
            .inflight
            .as_ref()
            .is_some_and(|open| open.is_copy_compatible_with(&target));
        if !reusable {
            self.finish_copy()?;
            self.start_copy(&target)?;
        }

        self.connection()?
            .write_copy_data(&data)
            .map_err(|source| LoadError::stream(target.name(), "write", source))
    }

    fn sync(&mut self) -> Result<(), LoadError> {
        if let Some(failure) = &self.failed {
            return Err(failure.clone());
        }
        self.finish_copy().inspect_err(|err| self.fail(err.clone()))
    }

    fn finish(&mut self) {
        if self.failed.is_some() {
            return;
        }
        if let Err(err) = self.finish_copy().and_then(|()| self.disconnect()) {
            self.fail(err);
        }
    }

    /// Connection for the current command, opening it on first use.
    fn connection(&mut self) -> Result<&mut C::Connection, LoadError> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                let connection = self
                    .connector
                    .connect()
                    .map_err(|source| LoadError::connection("open", source))?;
                info!("bulk-load writer connected");
                connection
            }
        };
        Ok(self.connection.insert(connection))
    }

    /// Connection for a plain statement; no copy session may be open.
    fn idle_connection(&mut self) -> Result<&mut C::Connection, LoadError> {
        if self.inflight.is_some() {
            return Err(LoadError::ProtocolMisuse {
                message: "statement issued while a copy session is open",
            });
        }
        self.connection()
    }

    fn start_copy(&mut self, target: &Arc<TargetDescriptor>) -> Result<(), LoadError> {
        self.connection()?
            .begin_copy(target)
            .map_err(|source| LoadError::stream(target.name(), "begin", source))?;
        debug!("opened copy session for {}", target.name());
        self.inflight = Some(Arc::clone(target));
        Ok(())
    }

    fn finish_copy(&mut self) -> Result<(), LoadError> {
        let Some(target) = self.inflight.take() else {
            return Ok(());
        };
        let connection = self.connection.as_mut().ok_or(LoadError::ProtocolMisuse {
            message: "copy session open without a connection",
        })?;
        connection
            .end_copy()
            .map_err(|source| LoadError::stream(target.name(), "end", source))?;
        debug!("closed copy session for {}", target.name());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LoadError> {
        if let Some(connection) = self.connection.take() {
            connection
                .close()
                .map_err(|source| LoadError::connection("close", source))?;
            info!("bulk-load writer disconnected");
        }
        Ok(())
    }

    /// Abort loading: drop the connection and make every later caller see
    /// `err`.
    fn fail(&mut self, err: LoadError) {
        error!("bulk load aborted: {err}");
        self.inflight = None;
        self.connection = None;
        self.failed = Some(err.clone());
        self.queue.record_failure(err);
    }
}

/// Unblocks producers and barrier waiters if the writer thread panics.
struct AbandonOnPanic(Arc<WorkQueue>);

impl Drop for AbandonOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.record_failure(LoadError::WriterTerminated);
            drop(self.0.close());
        }
    }
}
