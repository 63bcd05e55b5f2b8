use super::{BatchHandler, Queue, QueueConfig};
use crate::application::lifecycle::{CloseStack, Closer};
use crate::application::worker::{execute_guarded, shutdown_channel, PanicGuardResult, ShutdownSender, ShutdownToken};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Bounded in-memory queue that groups items into batches
///
/// A single consumer task drains the channel into an accumulator and hands
/// it to the `BatchHandler` when it reaches `batch_size` or when
/// `flush_interval` elapses, whichever comes first. Batches are delivered
/// in push order, one at a time. A failed or panicking batch is logged and
/// dropped; the consumer keeps going.
pub struct MemoryQueue<T> {
    name: String,
    sender: mpsc::Sender<T>,
    exit: ShutdownSender,
    closed: AtomicBool,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> MemoryQueue<T> {
    /// Start the consumer and register the queue for ordered teardown
    pub fn new<H>(
        name: impl Into<String>,
        config: QueueConfig,
        handler: H,
        closers: &CloseStack,
    ) -> Result<Arc<Self>>
    where
        H: BatchHandler<T>,
    {
        config.validate()?;
        let name = name.into();
        if config.batch_size > config.buffer_size {
            warn!(
                queue = %name,
                batch_size = config.batch_size,
                buffer_size = config.buffer_size,
                "Batch size exceeds buffer size, producers will block before a batch fills"
            );
        }

        let (sender, receiver) = mpsc::channel(config.buffer_size);
        let (exit, exit_token) = shutdown_channel();

        let consumer = Consumer {
            name: name.clone(),
            config,
            handler,
            receiver,
            exit: exit_token,
        };
        let handle = tokio::spawn(consumer.run());

        let queue = Arc::new(Self {
            name: name.clone(),
            sender,
            exit,
            closed: AtomicBool::new(false),
            consumer: Mutex::new(Some(handle)),
        });
        closers.push(format!("queue {}", name), queue.clone());

        debug!(
            queue = %name,
            batch_size = config.batch_size,
            buffer_size = config.buffer_size,
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            "Queue started"
        );
        Ok(queue)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting items, flush everything already accepted and wait for
    /// the consumer to finish
    ///
    /// Idempotent. Every caller, including concurrent ones, returns only
    /// after the drain is over. Producers blocked on a full buffer are
    /// released with `AppError::QueueClosed`.
    pub async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.exit.shutdown();
        }

        // Held across the join so later callers wait for the first one
        let mut consumer = self.consumer.lock().await;
        if let Some(handle) = consumer.as_mut() {
            let joined = handle.await;
            *consumer = None;
            joined.map_err(|e| {
                AppError::Internal(format!("queue '{}' consumer failed: {}", self.name, e))
            })?;
            info!(queue = %self.name, "Queue closed");
        }

        Ok(())
    }
}

#[async_trait]
impl<T: Send + 'static> Queue<T> for MemoryQueue<T> {
    async fn push(&self, item: T) -> Result<()> {
        if self.is_closed() {
            return Err(AppError::QueueClosed(self.name.clone()));
        }
        self.sender
            .send(item)
            .await
            .map_err(|_| AppError::QueueClosed(self.name.clone()))
    }
}

#[async_trait]
impl<T: Send + 'static> Closer for MemoryQueue<T> {
    async fn close(&self) -> Result<()> {
        MemoryQueue::close(self).await
    }
}

struct Consumer<T, H> {
    name: String,
    config: QueueConfig,
    handler: H,
    receiver: mpsc::Receiver<T>,
    exit: ShutdownToken,
}

impl<T: Send + 'static, H: BatchHandler<T>> Consumer<T, H> {
    async fn run(self) {
        let Consumer {
            name,
            config,
            handler,
            mut receiver,
            exit,
        } = self;

        let mut pending: Vec<T> = Vec::with_capacity(config.batch_size);
        let timer = sleep(config.flush_interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;

                _ = exit.cancelled() => {
                    debug!(queue = %name, "Queue exit requested, draining");
                    break;
                }

                item = receiver.recv() => match item {
                    Some(item) => {
                        pending.push(item);
                        if pending.len() >= config.batch_size {
                            let batch = std::mem::replace(
                                &mut pending,
                                Vec::with_capacity(config.batch_size),
                            );
                            flush(&name, &handler, batch).await;
                            timer.as_mut().reset(Instant::now() + config.flush_interval);
                        }
                    }
                    None => {
                        debug!(queue = %name, "All producers gone, draining");
                        break;
                    }
                },

                _ = &mut timer => {
                    if !pending.is_empty() {
                        let batch = std::mem::take(&mut pending);
                        flush(&name, &handler, batch).await;
                    }
                    timer.as_mut().reset(Instant::now() + config.flush_interval);
                }
            }
        }

        // Refuse new sends, then collect what was already accepted
        receiver.close();
        while let Ok(item) = receiver.try_recv() {
            pending.push(item);
        }

        let remaining = pending.len();
        while !pending.is_empty() {
            let rest = if pending.len() > config.batch_size {
                pending.split_off(config.batch_size)
            } else {
                Vec::new()
            };
            let batch = std::mem::replace(&mut pending, rest);
            flush(&name, &handler, batch).await;
        }

        debug!(queue = %name, drained = remaining, "Queue consumer stopped");
    }
}

async fn flush<T, H>(name: &str, handler: &H, batch: Vec<T>)
where
    T: Send + 'static,
    H: BatchHandler<T>,
{
    let size = batch.len();
    let start = Instant::now();

    match execute_guarded(name, handler.handle(batch)).await {
        PanicGuardResult::Success(Ok(())) => debug!(
            queue = %name,
            batch_size = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch flushed"
        ),
        PanicGuardResult::Success(Err(e)) if e.is_cancelled() => {
            info!(queue = %name, batch_size = size, "Batch flush cancelled")
        }
        PanicGuardResult::Success(Err(e)) => {
            error!(queue = %name, batch_size = size, error = %e, "Batch flush failed, batch dropped")
        }
        PanicGuardResult::Panicked(msg) => {
            error!(queue = %name, batch_size = size, panic_msg = %msg, "Batch handler panicked, batch dropped")
        }
    }
}
