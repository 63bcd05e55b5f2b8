// Catalog Repository Ports (Interfaces)

use crate::domain::{Category, CategoryId, Product};
use crate::error::Result;
use async_trait::async_trait;

/// Bulk persistence of scraped products
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Upsert a batch of products
    ///
    /// Must be idempotent: calling it again with overlapping products never
    /// duplicates stored products or sizes. Every stored size rolls its
    /// current price into the previous price.
    async fn update(&self, products: &[Product]) -> Result<()>;
}

/// Read access to the scraped categories
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn get_categories(&self) -> Result<Vec<Category>>;

    /// # Errors
    /// - AppError::NotFound if the category does not exist
    async fn get_category(&self, id: CategoryId) -> Result<Category>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::{Arc, Mutex};

    /// Mock CategoryRepository over a fixed list
    pub struct MockCategoryRepository {
        categories: Vec<Category>,
    }

    impl MockCategoryRepository {
        pub fn new(categories: Vec<Category>) -> Self {
            Self { categories }
        }
    }

    #[async_trait]
    impl CategoryRepository for MockCategoryRepository {
        async fn get_categories(&self) -> Result<Vec<Category>> {
            Ok(self.categories.clone())
        }

        async fn get_category(&self, id: CategoryId) -> Result<Category> {
            self.categories
                .iter()
                .find(|category| category.id == id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("category {}", id)))
        }
    }

    /// Mock ProductRepository recording every batch it receives
    #[derive(Default)]
    pub struct MockProductRepository {
        batches: Arc<Mutex<Vec<Vec<Product>>>>,
        fail_with: Option<String>,
    }

    impl MockProductRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self {
                batches: Arc::default(),
                fail_with: Some(message.into()),
            }
        }

        pub fn batches(&self) -> Vec<Vec<Product>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProductRepository for MockProductRepository {
        async fn update(&self, products: &[Product]) -> Result<()> {
            if let Some(msg) = &self.fail_with {
                return Err(AppError::Storage(msg.clone()));
            }
            self.batches.lock().unwrap().push(products.to_vec());
            Ok(())
        }
    }
}
