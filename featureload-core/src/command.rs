//! Commands travelling from producers to the writer thread.

use std::{fmt, sync::Arc};

use crate::{BarrierSignal, IdBatchDeleter, PipelineConfig, TargetDescriptor, config::BUFFER_HEADROOM};

/// A unit of work for the writer thread.
///
/// Each command has exactly one owner at a time: the producer that built
/// it, then the work queue, then the writer.
#[derive(Debug)]
pub enum Command {
    /// Apply pending deletions, then stream the buffer into its target.
    Copy(CopyBuffer),
    /// Release the barrier once everything submitted earlier is applied.
    Sync(BarrierSignal),
    /// Close the copy session and the connection, then stop the writer.
    Finish(FinishToken),
}

impl From<CopyBuffer> for Command {
    fn from(buffer: CopyBuffer) -> Self {
        Self::Copy(buffer)
    }
}

impl From<BarrierSignal> for Command {
    fn from(signal: BarrierSignal) -> Self {
        Self::Sync(signal)
    }
}

/// Proof that a [`Command::Finish`] was issued by the pipeline itself.
///
/// Only [`PipelineHandle::shutdown`](crate::PipelineHandle::shutdown) can
/// create one, so a pipeline never sees more than one finish command.
#[derive(Debug)]
pub struct FinishToken(());

impl FinishToken {
    pub(crate) const fn new() -> Self {
        Self(())
    }
}

/// Encoded rows for one target plus the rows they replace.
pub struct CopyBuffer {
    target: Arc<TargetDescriptor>,
    data: Vec<u8>,
    deleter: IdBatchDeleter,
    max_bytes: usize,
}

impl fmt::Debug for CopyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyBuffer")
            .field("target", &self.target.name())
            .field("bytes", &self.data.len())
            .field("deletions", &self.deleter.len())
            .finish_non_exhaustive()
    }
}

impl CopyBuffer {
    /// Start an empty buffer for `target` sized by `config`.
    #[must_use]
    pub fn new(target: Arc<TargetDescriptor>, config: &PipelineConfig) -> Self {
        Self {
            target,
            data: Vec::with_capacity(config.max_buffer_bytes),
            deleter: IdBatchDeleter::with_max_pending(config.max_pending_deletes),
            max_bytes: config.max_buffer_bytes,
        }
    }

    /// Target the buffer loads into.
    #[must_use]
    pub const fn target(&self) -> &Arc<TargetDescriptor> {
        &self.target
    }

    /// Encoded row data collected so far.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Append already encoded row data.
    pub fn extend_from_slice(&mut self, rows: &[u8]) {
        self.data.extend_from_slice(rows);
    }

    /// Queue the rows identified by `id` for deletion before this buffer's
    /// rows are copied.
    pub fn add_deletable(&mut self, id: i64) {
        self.deleter.add(id);
    }

    /// Deletions carried by this buffer.
    #[must_use]
    pub const fn deleter(&self) -> &IdBatchDeleter {
        &self.deleter
    }

    /// Whether the buffer should be submitted before more work is added.
    ///
    /// A buffer is full once it gets within [`BUFFER_HEADROOM`] bytes of its
    /// size threshold or its deleter is over capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.data.len() > self.max_bytes.saturating_sub(BUFFER_HEADROOM)
            || self.deleter.is_over_capacity()
    }

    /// Whether the buffer carries neither rows nor deletions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.deleter.is_empty()
    }

    pub(crate) fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub(crate) fn into_parts(self) -> (Arc<TargetDescriptor>, Vec<u8>, IdBatchDeleter) {
        (self.target, self.data, self.deleter)
    }
}
