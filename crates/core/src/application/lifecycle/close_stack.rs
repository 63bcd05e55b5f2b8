use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

/// Resource that needs an explicit, awaited shutdown
#[async_trait]
pub trait Closer: Send + Sync {
    async fn close(&self) -> Result<()>;
}

/// Registry of closers, torn down in reverse registration order
///
/// Components register themselves on construction, so the most recently
/// built component (typically the one that feeds the others) closes first.
#[derive(Default)]
pub struct CloseStack {
    entries: Mutex<Vec<(String, Arc<dyn Closer>)>>,
}

impl CloseStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, name: impl Into<String>, closer: Arc<dyn Closer>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.into(), closer));
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every registered entry, newest first
    ///
    /// A failing closer is logged and the remaining ones still run.
    /// Returns the number of closers that failed.
    pub async fn close_all(&self) -> usize {
        let entries = std::mem::take(
            &mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let total = entries.len();
        let mut failed = 0;

        for (name, closer) in entries.into_iter().rev() {
            match closer.close().await {
                Ok(()) => debug!(component = %name, "Closed"),
                Err(e) => {
                    failed += 1;
                    error!(component = %name, error = %e, "Failed to close");
                }
            }
        }

        info!(total, failed, "Shutdown sequence finished");
        failed
    }
}
