// Command-line and environment configuration

use anyhow::{ensure, Result};
use clap::Parser;
use pricewatch_core::application::worker::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL, DEFAULT_NOTIFY_INTERVAL,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_UPDATE_INTERVAL,
};
use pricewatch_core::application::QueueConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "pricewatch", version, about = "Catalog price tracker with drop notifications")]
pub struct Args {
    /// JSON file with categories and tracking subscriptions
    #[arg(long, env = "PRICEWATCH_SEED")]
    pub seed: Option<PathBuf>,

    /// Seconds between catalog update cycles
    #[arg(long, env = "PRICEWATCH_UPDATE_INTERVAL_SECS", default_value_t = DEFAULT_UPDATE_INTERVAL.as_secs())]
    pub update_interval_secs: u64,

    /// Seconds between notification cycles
    #[arg(long, env = "PRICEWATCH_NOTIFY_INTERVAL_SECS", default_value_t = DEFAULT_NOTIFY_INTERVAL.as_secs())]
    pub notify_interval_secs: u64,

    /// Items per persisted batch
    #[arg(long, env = "PRICEWATCH_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Queue buffer capacity
    #[arg(long, env = "PRICEWATCH_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Maximum wait before a partial batch is persisted, in milliseconds
    #[arg(long, env = "PRICEWATCH_FLUSH_INTERVAL_MS", default_value_t = DEFAULT_FLUSH_INTERVAL.as_millis() as u64)]
    pub flush_interval_ms: u64,

    /// Telegram bot token; notifications are only logged when absent
    #[arg(long, env = "PRICEWATCH_TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    #[arg(long, env = "PRICEWATCH_TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "PRICEWATCH_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Address of the liveness endpoint
    #[arg(long = "listen", env = "PRICEWATCH_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Directory for daily rolling log files
    #[arg(long, env = "PRICEWATCH_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Upper bound for the shutdown sequence, in seconds
    #[arg(long, env = "PRICEWATCH_SHUTDOWN_TIMEOUT_SECS", default_value_t = DEFAULT_SHUTDOWN_TIMEOUT.as_secs())]
    pub shutdown_timeout_secs: u64,
}

impl Args {
    pub fn queue_config(&self) -> Result<QueueConfig> {
        let config = QueueConfig::new(
            self.batch_size,
            self.buffer_size,
            Duration::from_millis(self.flush_interval_ms),
        );
        config.validate()?;
        Ok(config)
    }

    pub fn update_interval(&self) -> Result<Duration> {
        positive_secs("update interval", self.update_interval_secs)
    }

    pub fn notify_interval(&self) -> Result<Duration> {
        positive_secs("notify interval", self.notify_interval_secs)
    }

    pub fn http_timeout(&self) -> Result<Duration> {
        positive_secs("http timeout", self.http_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn positive_secs(name: &str, secs: u64) -> Result<Duration> {
    ensure!(secs > 0, "{} must be positive", name);
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["pricewatch"]).unwrap();

        assert_eq!(args.update_interval().unwrap(), Duration::from_secs(600));
        assert_eq!(args.notify_interval().unwrap(), Duration::from_secs(300));
        assert_eq!(args.queue_config().unwrap(), QueueConfig::default());
        assert_eq!(args.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(args.telegram_api_url, "https://api.telegram.org");
        assert_eq!(args.listen_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "pricewatch",
            "--batch-size",
            "25",
            "--flush-interval-ms",
            "250",
            "--update-interval-secs",
            "60",
            "--listen",
            "127.0.0.1:9000",
        ])
        .unwrap();

        let queue = args.queue_config().unwrap();
        assert_eq!(queue.batch_size, 25);
        assert_eq!(queue.flush_interval, Duration::from_millis(250));
        assert_eq!(args.update_interval().unwrap(), Duration::from_secs(60));
        assert_eq!(args.listen_addr, SocketAddr::from(([127, 0, 0, 1], 9000)));
    }

    #[test]
    fn test_zero_values_rejected() {
        let args = Args::try_parse_from(["pricewatch", "--batch-size", "0"]).unwrap();
        assert!(args.queue_config().is_err());

        let args = Args::try_parse_from(["pricewatch", "--notify-interval-secs", "0"]).unwrap();
        assert!(args.notify_interval().is_err());
    }
}
