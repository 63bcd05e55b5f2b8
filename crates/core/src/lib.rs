// Pricewatch Core - Domain Logic, Ports & Background Runtime
// NO infrastructure dependencies: HTTP and storage live behind ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
