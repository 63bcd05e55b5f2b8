use crate::error::AppError;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};

/// Single-slot channel for errors that should bring the process down
///
/// Only the first unconsumed report is kept; later ones are logged and
/// dropped so a reporter never blocks.
#[derive(Clone)]
pub struct FatalErrors {
    tx: mpsc::Sender<AppError>,
    rx: Arc<Mutex<mpsc::Receiver<AppError>>>,
}

impl FatalErrors {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Report a fatal error without waiting
    pub fn report(&self, err: AppError) {
        error!(error = %err, "Fatal error reported");
        if let Err(e) = self.tx.try_send(err) {
            let dropped = match e {
                mpsc::error::TrySendError::Full(err) | mpsc::error::TrySendError::Closed(err) => err,
            };
            warn!(error = %dropped, "Fatal error slot occupied, dropping");
        }
    }

    /// Wait for the next fatal error
    pub async fn recv(&self) -> Option<AppError> {
        self.rx.lock().await.recv().await
    }
}

impl Default for FatalErrors {
    fn default() -> Self {
        Self::new()
    }
}
