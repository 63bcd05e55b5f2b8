// Product Client Port (catalog page fetcher)

use crate::domain::{Product, ProductsRequest};
use crate::error::Result;
use async_trait::async_trait;

/// Fetches one catalog page
///
/// Implementations:
/// - HttpProductClient: single GET against the catalog API
#[async_trait]
pub trait ProductClient: Send + Sync {
    /// Fetch the products of `request.page`
    ///
    /// An empty vector signals the end of pagination.
    ///
    /// # Errors
    /// - AppError::RateLimited when the catalog answers with its request limit
    /// - AppError::Fetch for any other transport or status failure
    async fn get_products(&self, request: &ProductsRequest) -> Result<Vec<Product>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted answer of the mock client
    #[derive(Debug, Clone)]
    pub enum MockPage {
        Products(Vec<Product>),
        RateLimited,
        Fail(String),
        /// Panic while fetching (for panic isolation testing)
        Panic(String),
    }

    /// Mock ProductClient replaying scripted pages, then empty pages
    pub struct MockProductClient {
        pages: Arc<Mutex<VecDeque<MockPage>>>,
        requests: Arc<Mutex<Vec<ProductsRequest>>>,
    }

    impl MockProductClient {
        pub fn new(pages: Vec<MockPage>) -> Self {
            Self {
                pages: Arc::new(Mutex::new(pages.into())),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn requests(&self) -> Vec<ProductsRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProductClient for MockProductClient {
        async fn get_products(&self, request: &ProductsRequest) -> Result<Vec<Product>> {
            self.requests.lock().unwrap().push(request.clone());

            let page = self.pages.lock().unwrap().pop_front();
            match page {
                None => Ok(Vec::new()),
                Some(MockPage::Products(products)) => Ok(products),
                Some(MockPage::RateLimited) => Err(AppError::RateLimited(format!(
                    "{} page {}",
                    request.category, request.page
                ))),
                Some(MockPage::Fail(msg)) => Err(AppError::Fetch(msg)),
                Some(MockPage::Panic(msg)) => panic!("{}", msg),
            }
        }
    }
}
