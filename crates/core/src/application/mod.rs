// Application Layer - Background runtime and use cases

pub mod lifecycle;
pub mod product;
pub mod queue;
pub mod tracking;
pub mod worker;

// Re-exports
pub use lifecycle::{CloseStack, Closer, FatalErrors};
pub use product::ProductService;
pub use queue::{BatchHandler, MemoryQueue, Queue, QueueConfig};
pub use tracking::TrackingService;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
