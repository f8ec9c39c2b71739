//! Producer-side row encoder that fills copy buffers and submits them.

use std::{fmt::Display, mem, sync::Arc};

use log::{debug, warn};

use crate::{
    CommandSender, CopyBuffer, LoadError, PipelineConfig, TargetDescriptor,
    copy_text::{self, COLUMN_SEPARATOR, NULL_MARKER, ROW_TERMINATOR},
};

/// Builds COPY text rows for one producer and hands full buffers to the
/// pipeline.
///
/// Rows for consecutive copy-compatible targets share a buffer. Switching to
/// an incompatible target submits the current buffer first, so buffers reach
/// the writer in the order their rows were produced.
///
/// Rows still buffered when the manager is dropped are discarded; call
/// [`flush`](Self::flush) or [`sync`](Self::sync) first.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use featureload_core::{PipelineConfig, PipelineHandle, TargetDescriptor};
/// use featureload_core::test_support::{RecordingConnector, TraceEvent};
///
/// # fn main() -> Result<(), featureload_core::LoadError> {
/// let connector = RecordingConnector::default();
/// let trace = connector.trace();
/// let pipeline = PipelineHandle::spawn(connector, PipelineConfig::default())?;
/// let points = Arc::new(TargetDescriptor::new("points", "osm_id"));
///
/// let mut rows = pipeline.copy_manager();
/// rows.new_line(&points)?;
/// rows.add_column(42)?;
/// rows.add_text_column("corner\tshop")?;
/// rows.add_null_column()?;
/// rows.finish_line()?;
/// rows.sync()?;
///
/// assert!(trace.events().contains(&TraceEvent::Write("42\tcorner\\tshop\t\\N\n".to_owned())));
/// # pipeline.shutdown()
/// # }
/// ```
#[derive(Debug)]
pub struct CopyManager {
    sender: CommandSender,
    config: PipelineConfig,
    current: Option<CopyBuffer>,
    line_open: bool,
}

impl CopyManager {
    /// Create a manager submitting through `sender`.
    #[must_use]
    pub const fn new(sender: CommandSender, config: PipelineConfig) -> Self {
        Self {
            sender,
            config,
            current: None,
            line_open: false,
        }
    }

    /// Start a row for `target`.
    ///
    /// # Errors
    /// Returns [`LoadError::ProtocolMisuse`] while the previous row is
    /// unfinished and the recorded failure if a buffer submission is refused.
    pub fn new_line(&mut self, target: &Arc<TargetDescriptor>) -> Result<(), LoadError> {
        if self.line_open {
            return Err(LoadError::ProtocolMisuse {
                message: "row started before the previous one was finished",
            });
        }
        self.switch_target(target)?;
        self.line_open = true;
        Ok(())
    }

    /// Append a column rendered through [`Display`].
    ///
    /// # Errors
    /// Returns [`LoadError::ProtocolMisuse`] outside a row.
    pub fn add_column(&mut self, value: impl Display) -> Result<(), LoadError> {
        self.add_text_column(&value.to_string())
    }

    /// Append a text column, escaping separators and backslashes.
    ///
    /// # Errors
    /// Returns [`LoadError::ProtocolMisuse`] outside a row.
    pub fn add_text_column(&mut self, value: &str) -> Result<(), LoadError> {
        let data = self.row_data()?;
        copy_text::escape_into(data, value);
        data.push(COLUMN_SEPARATOR);
        Ok(())
    }

    /// Append a `NULL` column.
    ///
    /// # Errors
    /// Returns [`LoadError::ProtocolMisuse`] outside a row.
    pub fn add_null_column(&mut self) -> Result<(), LoadError> {
        let data = self.row_data()?;
        data.extend_from_slice(NULL_MARKER.as_bytes());
        data.push(COLUMN_SEPARATOR);
        Ok(())
    }

    /// Terminate the current row, submitting the buffer once it is full.
    ///
    /// # Errors
    /// Returns [`LoadError::ProtocolMisuse`] for a row without columns and
    /// the recorded failure if the submission is refused.
    pub fn finish_line(&mut self) -> Result<(), LoadError> {
        let data = self.row_data()?;
        match data.last_mut() {
            Some(last) if *last == COLUMN_SEPARATOR => *last = ROW_TERMINATOR,
            _ => {
                return Err(LoadError::ProtocolMisuse {
                    message: "row finished without any column",
                });
            }
        }
        self.line_open = false;
        if self.current.as_ref().is_some_and(CopyBuffer::is_full) {
            self.flush()?;
        }
        Ok(())
    }

    /// Remove the row of `target` identified by `id` before any row added
    /// after this call is copied.
    ///
    /// # Errors
    /// Returns [`LoadError::ProtocolMisuse`] inside an unfinished row and the
    /// recorded failure if a buffer submission is refused.
    pub fn delete_object(&mut self, target: &Arc<TargetDescriptor>, id: i64) -> Result<(), LoadError> {
        if self.line_open {
            return Err(LoadError::ProtocolMisuse {
                message: "deletion queued inside an unfinished row",
            });
        }
        // Deletions run before the rows of their buffer, so rows already
        // encoded for this target must be copied first.
        if self
            .current
            .as_ref()
            .is_some_and(|buffer| !buffer.data().is_empty())
        {
            self.flush()?;
        }
        self.switch_target(target)?;
        let buffer = self.current.get_or_insert_with(|| CopyBuffer::new(Arc::clone(target), &self.config));
        buffer.add_deletable(id);
        if buffer.deleter().is_over_capacity() {
            self.flush()?;
        }
        Ok(())
    }

    /// Submit the current buffer if it carries rows or deletions.
    ///
    /// # Errors
    /// Returns [`LoadError::ProtocolMisuse`] inside an unfinished row and the
    /// recorded failure if the submission is refused.
    pub fn flush(&mut self) -> Result<(), LoadError> {
        if self.line_open {
            return Err(LoadError::ProtocolMisuse {
                message: "buffer flushed inside an unfinished row",
            });
        }
        let Some(buffer) = self.current.take() else {
            return Ok(());
        };
        if buffer.is_empty() {
            return Ok(());
        }
        debug!("submitting {buffer:?}");
        self.sender.submit(buffer)
    }

    /// Submit the current buffer and wait until the writer has applied it.
    ///
    /// # Errors
    /// See [`flush`](Self::flush) and
    /// [`PipelineHandle::sync_and_wait`](crate::PipelineHandle::sync_and_wait).
    pub fn sync(&mut self) -> Result<(), LoadError> {
        self.flush()?;
        self.sender.sync_and_wait()
    }

    /// Bytes encoded but not yet submitted.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.current.as_ref().map_or(0, |buffer| buffer.data().len())
    }

    fn switch_target(&mut self, target: &Arc<TargetDescriptor>) -> Result<(), LoadError> {
        let compatible = self
            .current
            .as_ref()
            .is_some_and(|buffer| buffer.target().is_copy_compatible_with(target));
        if compatible {
            return Ok(());
        }
        let previous = mem::replace(&mut self.current, Some(CopyBuffer::new(Arc::clone(target), &self.config)));
        match previous {
            Some(buffer) if !buffer.is_empty() => self.sender.submit(buffer),
            _ => Ok(()),
        }
    }

    fn row_data(&mut self) -> Result<&mut Vec<u8>, LoadError> {
        match self.current.as_mut() {
            Some(buffer) if self.line_open => Ok(buffer.data_mut()),
            _ => Err(LoadError::ProtocolMisuse {
                message: "column added outside a row",
            }),
        }
    }
}

impl Drop for CopyManager {
    fn drop(&mut self) {
        if let Some(buffer) = self.current.as_ref().filter(|buffer| !buffer.is_empty()) {
            warn!("discarding unsubmitted {buffer:?}");
        }
    }
}
