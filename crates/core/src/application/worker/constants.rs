// Background runtime constants (no magic values)
use std::time::Duration;

/// Default number of messages per queue flush
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default capacity of a queue's pending-message channel
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Default maximum wait of a partial batch before a forced flush (1s)
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Default cadence of the catalog update cycle (10 minutes)
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Default cadence of the tracking notification cycle (5 minutes)
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Graceful process shutdown timeout (10 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
