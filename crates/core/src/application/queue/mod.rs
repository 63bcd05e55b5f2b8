// Queue - Batching in-memory queue in front of a batch persister

mod config;
mod memory;

pub use config::QueueConfig;
pub use memory::MemoryQueue;

use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;

/// Producer side of a queue
#[async_trait]
pub trait Queue<T: Send + 'static>: Send + Sync {
    /// Hand one item to the queue, waiting while the buffer is full
    ///
    /// # Errors
    /// - AppError::QueueClosed once the queue stopped accepting items
    async fn push(&self, item: T) -> Result<()>;
}

/// Consumer side: receives flushed batches, in order, one at a time
#[async_trait]
pub trait BatchHandler<T: Send + 'static>: Send + Sync + 'static {
    async fn handle(&self, batch: Vec<T>) -> Result<()>;
}

#[async_trait]
impl<T, F, Fut> BatchHandler<T> for F
where
    T: Send + 'static,
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, batch: Vec<T>) -> Result<()> {
        self(batch).await
    }
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::{Mutex, PoisonError};

    /// Queue that records pushed items without batching
    pub struct RecordingQueue<T> {
        items: Mutex<Vec<T>>,
        closed: Mutex<bool>,
    }

    impl<T: Clone + Send + 'static> RecordingQueue<T> {
        pub fn new() -> Self {
            Self {
                items: Mutex::new(Vec::new()),
                closed: Mutex::new(false),
            }
        }

        /// Queue that refuses every push
        pub fn closed() -> Self {
            let queue = Self::new();
            *queue.closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
            queue
        }

        pub fn items(&self) -> Vec<T> {
            self.items
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl<T: Clone + Send + 'static> Default for RecordingQueue<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl<T: Clone + Send + 'static> Queue<T> for RecordingQueue<T> {
        async fn push(&self, item: T) -> Result<()> {
            if *self.closed.lock().unwrap_or_else(PoisonError::into_inner) {
                return Err(AppError::QueueClosed("recording queue".to_string()));
            }
            self.items
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(item);
            Ok(())
        }
    }
}
