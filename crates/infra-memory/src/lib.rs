// Pricewatch Infrastructure - In-Memory Adapter
// Implements: ProductRepository, CategoryRepository, TrackingRepository

mod store;

pub use store::{MemoryStore, ProductRecord};
