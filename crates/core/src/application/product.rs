// Product Service - Catalog scraping use cases

use crate::application::lifecycle::FatalErrors;
use crate::application::queue::Queue;
use crate::application::worker::{ShutdownToken, Worker};
use crate::domain::{CategoryId, Product, ProductsRequest};
use crate::error::{AppError, Result};
use crate::port::{CategoryRepository, ProductClient};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Walks catalog pages of every category and feeds the product queue
pub struct ProductService {
    worker: Arc<Worker>,
    client: Arc<dyn ProductClient>,
    categories: Arc<dyn CategoryRepository>,
    products: Arc<dyn Queue<Product>>,
    fatal: FatalErrors,
    updating: Mutex<HashSet<CategoryId>>,
}

/// Marks a category as being updated until dropped
struct UpdateSlot {
    service: Arc<ProductService>,
    category_id: CategoryId,
}

impl Drop for UpdateSlot {
    fn drop(&mut self) {
        self.service
            .updating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.category_id);
    }
}

impl ProductService {
    pub fn new(
        worker: Arc<Worker>,
        client: Arc<dyn ProductClient>,
        categories: Arc<dyn CategoryRepository>,
        products: Arc<dyn Queue<Product>>,
        fatal: FatalErrors,
    ) -> Arc<Self> {
        Arc::new(Self {
            worker,
            client,
            categories,
            products,
            fatal,
            updating: Mutex::new(HashSet::new()),
        })
    }

    /// Launch one update task per category
    ///
    /// A category whose previous update is still running is skipped.
    /// Returns the number of launched tasks, or `AppError::Cancelled` once
    /// shutdown was requested.
    pub async fn run_update_workers(self: &Arc<Self>, shutdown: &ShutdownToken) -> Result<usize> {
        let categories = self.categories.get_categories().await?;
        let mut launched = 0;

        for category in categories {
            shutdown.check()?;
            let Some(slot) = self.claim(category.id) else {
                warn!(category = %category.name, "Previous update still running, skipping");
                continue;
            };

            let category_id = category.id;
            let service = Arc::clone(self);
            self.worker.run(
                shutdown,
                format!("update {} products", category.name),
                move |token| async move {
                    let _slot = slot;
                    match service.update_products(&token, category_id).await {
                        Ok(_) => Ok(()),
                        Err(AppError::Config(msg)) => {
                            service.fatal.report(AppError::Config(msg.clone()));
                            Err(AppError::Config(msg))
                        }
                        Err(e) => Err(e),
                    }
                },
            )?;
            launched += 1;
        }

        debug!(launched, "Update workers launched");
        Ok(launched)
    }

    /// Fetch every page of a category and push its products into the queue
    ///
    /// Pagination starts at page 1 and ends on the first empty page. Hitting
    /// the catalog request limit ends the walk early without error; the next
    /// cycle starts over. Returns the number of queued products.
    pub async fn update_products(
        &self,
        shutdown: &ShutdownToken,
        category_id: CategoryId,
    ) -> Result<usize> {
        let category = self.categories.get_category(category_id).await?;
        let mut request = ProductsRequest::first_page(&category);
        request.url()?;

        let mut queued = 0;
        loop {
            shutdown.check()?;

            let products = match self.client.get_products(&request).await {
                Ok(products) => products,
                Err(AppError::RateLimited(msg)) => {
                    warn!(
                        category = %category.name,
                        page = request.page,
                        reason = %msg,
                        "Request limit reached, stopping update"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            if products.is_empty() {
                break;
            }

            debug!(
                category = %category.name,
                page = request.page,
                products = products.len(),
                "Page fetched"
            );
            for mut product in products {
                product.category_id = category.id;
                self.products.push(product).await?;
                queued += 1;
            }
            request.next_page();
        }

        info!(
            category = %category.name,
            pages = request.page - 1,
            products = queued,
            "Category update finished"
        );
        Ok(queued)
    }

    fn claim(self: &Arc<Self>, category_id: CategoryId) -> Option<UpdateSlot> {
        let inserted = self
            .updating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(category_id);

        inserted.then(|| UpdateSlot {
            service: Arc::clone(self),
            category_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::lifecycle::CloseStack;
    use crate::application::queue::mocks::RecordingQueue;
    use crate::application::worker::shutdown_channel;
    use crate::domain::Category;
    use crate::port::catalog_repository::mocks::MockCategoryRepository;
    use crate::port::product_client::mocks::{MockPage, MockProductClient};
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn category(id: CategoryId, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            title: String::new(),
            emoji: String::new(),
            request_url: "https://catalog.example/{category}?page={page}".to_string(),
            product_url: "https://shop.example/{id}".to_string(),
        }
    }

    fn product(id: u64) -> Product {
        Product {
            id,
            category_id: 0,
            name: format!("product {}", id),
            rating: 4.5,
            url: String::new(),
            brand: "brand".to_string(),
            brand_id: 1,
            colors: Vec::new(),
            sizes: Vec::new(),
        }
    }

    struct Fixture {
        service: Arc<ProductService>,
        client: Arc<MockProductClient>,
        queue: Arc<RecordingQueue<Product>>,
        worker: Arc<Worker>,
        fatal: FatalErrors,
    }

    fn fixture(categories: Vec<Category>, pages: Vec<MockPage>) -> Fixture {
        let worker = Worker::new(&CloseStack::new());
        let client = Arc::new(MockProductClient::new(pages));
        let queue = Arc::new(RecordingQueue::new());
        let fatal = FatalErrors::new();
        let service = ProductService::new(
            worker.clone(),
            client.clone(),
            Arc::new(MockCategoryRepository::new(categories)),
            queue.clone(),
            fatal.clone(),
        );
        Fixture {
            service,
            client,
            queue,
            worker,
            fatal,
        }
    }

    #[tokio::test]
    async fn test_update_walks_pages_until_empty() {
        let f = fixture(
            vec![category(7, "dresses")],
            vec![
                MockPage::Products(vec![product(1), product(2)]),
                MockPage::Products(vec![product(3)]),
            ],
        );
        let (_tx, token) = shutdown_channel();

        let queued = f.service.update_products(&token, 7).await.unwrap();
        assert_eq!(queued, 3);

        let items = f.queue.items();
        assert_eq!(items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(items.iter().all(|p| p.category_id == 7));

        let pages: Vec<u32> = f.client.requests().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rate_limit_ends_update_without_error() {
        let f = fixture(
            vec![category(7, "dresses")],
            vec![
                MockPage::Products(vec![product(1)]),
                MockPage::RateLimited,
                MockPage::Products(vec![product(2)]),
            ],
        );
        let (_tx, token) = shutdown_channel();

        let queued = f.service.update_products(&token, 7).await.unwrap();
        assert_eq!(queued, 1);
        assert_eq!(f.client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let f = fixture(
            vec![category(7, "dresses")],
            vec![MockPage::Fail("connection reset".to_string())],
        );
        let (_tx, token) = shutdown_channel();

        let err = f.service.update_products(&token, 7).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_cancelled_update_stops_before_fetching() {
        let f = fixture(
            vec![category(7, "dresses")],
            vec![MockPage::Products(vec![product(1)])],
        );
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        let err = f.service.update_products(&token, 7).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(f.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_queue_aborts_update() {
        let worker = Worker::new(&CloseStack::new());
        let service = ProductService::new(
            worker,
            Arc::new(MockProductClient::new(vec![MockPage::Products(vec![product(1)])])),
            Arc::new(MockCategoryRepository::new(vec![category(7, "dresses")])),
            Arc::new(RecordingQueue::closed()),
            FatalErrors::new(),
        );
        let (_tx, token) = shutdown_channel();

        let err = service.update_products(&token, 7).await.unwrap_err();
        assert!(matches!(err, AppError::QueueClosed(_)));
    }

    #[tokio::test]
    async fn test_run_update_workers_launches_one_task_per_category() {
        let f = fixture(
            vec![category(1, "dresses"), category(2, "skirts")],
            vec![MockPage::Products(vec![product(10)])],
        );
        let (_tx, token) = shutdown_channel();

        let launched = f.service.run_update_workers(&token).await.unwrap();
        assert_eq!(launched, 2);

        assert_ok!(f.worker.close().await);
        assert_eq!(f.queue.items().len(), 1);
        assert!(f.client.call_count() >= 3);
    }

    #[tokio::test]
    async fn test_bad_url_template_is_reported_as_fatal() {
        let mut broken = category(3, "broken");
        broken.request_url = "https://catalog.example/{category}".to_string();
        let f = fixture(vec![broken], Vec::new());
        let (_tx, token) = shutdown_channel();

        assert_ok!(f.service.run_update_workers(&token).await);
        assert_ok!(f.worker.close().await);

        let err = tokio::time::timeout(Duration::from_secs(1), f.fatal.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(f.client.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_update_is_skipped() {
        let f = fixture(vec![category(1, "dresses")], Vec::new());
        let (_tx, token) = shutdown_channel();

        let slot = f.service.claim(1);
        assert!(slot.is_some());
        assert_eq!(f.service.run_update_workers(&token).await.unwrap(), 0);

        drop(slot);
        assert_eq!(f.service.run_update_workers(&token).await.unwrap(), 1);
        assert_ok!(f.worker.close().await);
    }

    #[tokio::test]
    async fn test_run_update_workers_after_shutdown_is_cancelled() {
        let f = fixture(
            vec![category(1, "dresses")],
            vec![MockPage::Products(vec![product(10)])],
        );
        let (tx, token) = shutdown_channel();
        tx.shutdown();
        assert_ok!(f.worker.close().await);

        let err = f.service.run_update_workers(&token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(f.client.call_count(), 0);
        assert!(f.service.claim(1).is_some());
    }
}
