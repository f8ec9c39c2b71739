//! Caller-facing handle of the asynchronous bulk-load pipeline.
//!
//! Producers submit [`Command`]s into a bounded queue; a dedicated writer
//! thread applies them to the store in submission order. The handle owns
//! the writer thread and offers barriers and an orderly shutdown.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use log::{info, warn};

use crate::{
    Command, Connector, CopyManager, FinishToken, LoadError, PipelineConfig, barrier,
};

mod queue;
mod writer;

use queue::WorkQueue;
use writer::Writer;

/// Name given to the writer thread.
pub const WRITER_THREAD_NAME: &str = "featureload-writer";

/// Owner of the writer thread.
///
/// Dropping a handle that was not shut down drains the queue and joins the
/// writer, logging any failure it would otherwise swallow.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use featureload_core::{CopyBuffer, PipelineConfig, PipelineHandle, TargetDescriptor};
/// use featureload_core::test_support::{RecordingConnector, TraceEvent};
///
/// # fn main() -> Result<(), featureload_core::LoadError> {
/// let connector = RecordingConnector::default();
/// let trace = connector.trace();
/// let config = PipelineConfig::default().with_max_buffer_bytes(4096);
/// let pipeline = PipelineHandle::spawn(connector, config)?;
///
/// let target = Arc::new(TargetDescriptor::new("planet_osm_point", "osm_id"));
/// let mut buffer = CopyBuffer::new(target, &config);
/// buffer.extend_from_slice(b"1\tcafe\n");
/// pipeline.submit(buffer)?;
/// pipeline.sync_and_wait()?;
/// pipeline.shutdown()?;
///
/// assert_eq!(trace.events().last(), Some(&TraceEvent::Close));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PipelineHandle {
    queue: Arc<WorkQueue>,
    worker: Option<JoinHandle<()>>,
    config: PipelineConfig,
}

impl PipelineHandle {
    /// Validate `config` and start the writer thread for `connector`.
    ///
    /// The connection itself is opened lazily by the writer when the first
    /// copy buffer arrives.
    ///
    /// # Errors
    /// Returns [`LoadError::InvalidConfig`] for unusable thresholds and
    /// [`LoadError::Spawn`] when the thread cannot be started.
    pub fn spawn<C: Connector>(connector: C, config: PipelineConfig) -> Result<Self, LoadError> {
        config.validate()?;
        let queue = Arc::new(WorkQueue::new(config.max_queue_len));
        let writer_queue = Arc::clone(&queue);
        // The writer holds the connection, which need not be `Send`, so it is
        // built on the writer thread.
        let worker = thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_owned())
            .spawn(move || Writer::new(connector, writer_queue).run())
            .map_err(|source| LoadError::Spawn {
                source: Arc::new(source),
            })?;
        info!(
            "bulk-load pipeline started (queue {}, buffer {} bytes)",
            config.max_queue_len, config.max_buffer_bytes
        );
        Ok(Self {
            queue,
            worker: Some(worker),
            config,
        })
    }

    /// Thresholds the pipeline was started with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cloneable submission endpoint for producer threads.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Producer-side row encoder submitting through this pipeline.
    #[must_use]
    pub fn copy_manager(&self) -> CopyManager {
        CopyManager::new(self.sender(), self.config)
    }

    /// Queue a command, blocking while the queue is full.
    ///
    /// # Errors
    /// Returns the recorded failure once loading has been aborted, and
    /// [`LoadError::Closed`] after shutdown.
    pub fn submit(&self, command: impl Into<Command>) -> Result<(), LoadError> {
        self.queue.push(command.into())
    }

    /// Block until everything submitted before this call has been applied.
    ///
    /// # Errors
    /// Returns the recorded failure instead of waiting when loading has been
    /// aborted.
    pub fn sync_and_wait(&self) -> Result<(), LoadError> {
        sync_and_wait(&self.queue)
    }

    /// The failure that aborted loading, if any.
    #[must_use]
    pub fn failure(&self) -> Option<LoadError> {
        self.queue.failure()
    }

    /// Apply everything still queued, close the connection, and join the
    /// writer thread.
    ///
    /// # Errors
    /// Returns the recorded failure when loading was aborted at any point,
    /// or [`LoadError::WriterTerminated`] when the writer panicked.
    pub fn shutdown(mut self) -> Result<(), LoadError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), LoadError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // A writer that panicked has already closed the queue; it is joined
        // regardless so the recorded failure wins over `Closed`.
        let finish = self.queue.push(Command::Finish(FinishToken::new()));
        let joined = worker.join();
        if let Some(failure) = self.queue.failure() {
            return Err(failure);
        }
        joined.map_err(|_| LoadError::WriterTerminated)?;
        finish?;
        info!("bulk-load pipeline stopped");
        Ok(())
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.worker.is_none() {
            return;
        }
        if let Err(err) = self.stop() {
            warn!("bulk-load pipeline dropped after failure: {err}");
        }
    }
}

/// Cloneable endpoint for submitting commands from any thread.
#[derive(Debug, Clone)]
pub struct CommandSender {
    queue: Arc<WorkQueue>,
}

impl CommandSender {
    /// Queue a command, blocking while the queue is full.
    ///
    /// # Errors
    /// See [`PipelineHandle::submit`].
    pub fn submit(&self, command: impl Into<Command>) -> Result<(), LoadError> {
        self.queue.push(command.into())
    }

    /// Block until everything this sender submitted so far has been applied.
    ///
    /// # Errors
    /// See [`PipelineHandle::sync_and_wait`].
    pub fn sync_and_wait(&self) -> Result<(), LoadError> {
        sync_and_wait(&self.queue)
    }

    /// The failure that aborted loading, if any.
    #[must_use]
    pub fn failure(&self) -> Option<LoadError> {
        self.queue.failure()
    }
}

fn sync_and_wait(queue: &WorkQueue) -> Result<(), LoadError> {
    if let Some(failure) = queue.failure() {
        return Err(failure);
    }
    let (signal, wait) = barrier();
    queue.push(Command::Sync(signal))?;
    wait.wait()
}
