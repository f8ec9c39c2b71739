//! Tunables for the bulk-load pipeline.

use thiserror::Error;

/// Default size of a single copy buffer in bytes.
///
/// Larger buffers send bigger chunks per write at the cost of memory held by
/// every queued command.
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Default number of commands the work queue holds before producers block.
///
/// When the store keeps up the queue rarely holds more than one entry; when
/// it does not, a short queue keeps memory bounded.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 10;

/// Default number of identifiers a deleter accumulates before asking to be
/// flushed.
pub const DEFAULT_MAX_PENDING_DELETES: usize = 1_000_000;

/// Bytes kept free at the end of a buffer so a line in progress never
/// crosses the configured size.
pub const BUFFER_HEADROOM: usize = 100;

/// Errors raised by [`PipelineConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A threshold was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Name of the offending field.
        field: &'static str,
    },
    /// The buffer cannot hold anything beyond its headroom.
    #[error("max_buffer_bytes ({value}) must exceed the {headroom}-byte headroom")]
    BufferTooSmall {
        /// Configured buffer size.
        value: usize,
        /// Required headroom.
        headroom: usize,
    },
}

/// Thresholds bounding memory use of the pipeline.
///
/// # Examples
///
/// ```
/// use featureload_core::PipelineConfig;
///
/// let config = PipelineConfig::default().with_max_queue_len(4);
/// assert_eq!(config.max_queue_len, 4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Size threshold of a copy buffer in bytes.
    pub max_buffer_bytes: usize,
    /// Capacity of the work queue.
    pub max_queue_len: usize,
    /// Soft cap on identifiers pending deletion per buffer.
    pub max_pending_deletes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            max_queue_len: DEFAULT_MAX_QUEUE_LEN,
            max_pending_deletes: DEFAULT_MAX_PENDING_DELETES,
        }
    }
}

impl PipelineConfig {
    /// Override the buffer size threshold.
    #[must_use]
    pub const fn with_max_buffer_bytes(mut self, max_buffer_bytes: usize) -> Self {
        self.max_buffer_bytes = max_buffer_bytes;
        self
    }

    /// Override the work queue capacity.
    #[must_use]
    pub const fn with_max_queue_len(mut self, max_queue_len: usize) -> Self {
        self.max_queue_len = max_queue_len;
        self
    }

    /// Override the deletion batch cap.
    #[must_use]
    pub const fn with_max_pending_deletes(mut self, max_pending_deletes: usize) -> Self {
        self.max_pending_deletes = max_pending_deletes;
        self
    }

    /// Check that every threshold leaves room for work.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a threshold is zero or the buffer is not
    /// larger than [`BUFFER_HEADROOM`].
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_len == 0 {
            return Err(ConfigError::Zero {
                field: "max_queue_len",
            });
        }
        if self.max_pending_deletes == 0 {
            return Err(ConfigError::Zero {
                field: "max_pending_deletes",
            });
        }
        if self.max_buffer_bytes <= BUFFER_HEADROOM {
            return Err(ConfigError::BufferTooSmall {
                value: self.max_buffer_bytes,
                headroom: BUFFER_HEADROOM,
            });
        }
        Ok(())
    }
}
