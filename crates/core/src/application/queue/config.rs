use crate::application::worker::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL,
};
use crate::error::{AppError, Result};
use std::time::Duration;

/// Tuning for a `MemoryQueue`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Items per flushed batch (upper bound)
    pub batch_size: usize,
    /// Channel capacity between producers and the consumer
    pub buffer_size: usize,
    /// Maximum time a partial batch waits before being flushed
    pub flush_interval: Duration,
}

impl QueueConfig {
    pub fn new(batch_size: usize, buffer_size: usize, flush_interval: Duration) -> Self {
        Self {
            batch_size,
            buffer_size,
            flush_interval,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config("batch_size must be positive".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(AppError::Config("buffer_size must be positive".to_string()));
        }
        if self.flush_interval.is_zero() {
            return Err(AppError::Config(
                "flush_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL)
    }
}
