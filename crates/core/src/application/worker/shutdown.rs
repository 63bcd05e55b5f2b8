// Shared cancellation signal for background work

use crate::error::{AppError, Result};
use tokio::sync::watch;

/// Shutdown signal observed by every task handler
///
/// Cloning is cheap; all clones observe the same sender.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(AppError::Cancelled)` once shutdown was requested
    pub fn check(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    /// Wait for shutdown signal
    ///
    /// Returns immediately when shutdown was already requested. If the sender
    /// is dropped without signalling, nobody can cancel anymore and this
    /// never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Shutdown sender
#[derive(Debug)]
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to all tokens, including ones created later
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_reaches_all_tokens() {
        let (tx, token) = shutdown_channel();
        let clone = token.clone();
        assert!(!token.is_shutdown());
        assert!(token.check().is_ok());

        tx.shutdown();

        assert!(token.is_shutdown());
        assert!(clone.is_shutdown());
        assert!(tx.token().is_shutdown());
        assert!(token.check().unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_signal() {
        let (tx, token) = shutdown_channel();
        let waiter = tokio::spawn(async move { token.cancelled().await });

        tx.shutdown();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_already_signalled() {
        let (tx, token) = shutdown_channel();
        tx.shutdown();
        timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already signalled token should resolve");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_never_cancels() {
        let (tx, token) = shutdown_channel();
        drop(tx);

        assert!(!token.is_shutdown());
        assert!(timeout(Duration::from_secs(5), token.cancelled())
            .await
            .is_err());
    }
}
