// Domain Layer - Catalog snapshots and price tracking

pub mod product;
pub mod tracking;

// Re-exports
pub use product::{Category, CategoryId, Product, ProductId, ProductSize, ProductsRequest};
pub use tracking::{ChatId, TrackingLog, TrackingResult, TrackingSettings};
