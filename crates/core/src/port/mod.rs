// Port Layer - Interfaces for external collaborators

pub mod catalog_repository;
pub mod product_client;
pub mod time_provider;
pub mod tracking;

// Re-exports
pub use catalog_repository::{CategoryRepository, ProductRepository};
pub use product_client::ProductClient;
pub use time_provider::TimeProvider;
pub use tracking::{NotificationSender, TrackingRepository};
