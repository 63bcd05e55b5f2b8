//! Scrape -> persist -> notify pipeline over the in-memory store
//!
//! Real queues and store; only the catalog and the chat transport are mocked.

use pricewatch_core::application::{
    shutdown_channel, CloseStack, FatalErrors, MemoryQueue, ProductService, QueueConfig,
    ShutdownToken, TrackingService, Worker,
};
use pricewatch_core::domain::{Category, Product, ProductSize, TrackingLog, TrackingSettings};
use pricewatch_core::port::product_client::mocks::{MockPage, MockProductClient};
use pricewatch_core::port::time_provider::SystemTimeProvider;
use pricewatch_core::port::tracking::mocks::MockNotificationSender;
use pricewatch_core::port::{ProductRepository, TrackingRepository};
use pricewatch_infra_memory::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_test::assert_ok;

const CATEGORY: u64 = 8137;
const FLUSH: Duration = Duration::from_millis(50);

fn category() -> Category {
    Category {
        id: CATEGORY,
        name: "dresses".to_string(),
        title: "Dresses".to_string(),
        emoji: String::new(),
        request_url: "https://catalog.example/{category}?page={page}".to_string(),
        product_url: "https://shop.example/{id}".to_string(),
    }
}

fn dress(id: u64, price: f32) -> Product {
    Product {
        id,
        category_id: 0,
        name: format!("dress {}", id),
        rating: 4.9,
        url: format!("https://shop.example/{}", id),
        brand: "brand".to_string(),
        brand_id: 3,
        colors: Vec::new(),
        sizes: vec![ProductSize::new("M", price)],
    }
}

struct Pipeline {
    store: Arc<MemoryStore>,
    client: Arc<MockProductClient>,
    sender: Arc<MockNotificationSender>,
    products: Arc<ProductService>,
    tracking: Arc<TrackingService>,
    closers: CloseStack,
    token: ShutdownToken,
}

async fn pipeline(pages: Vec<MockPage>, sender: MockNotificationSender) -> Pipeline {
    let closers = CloseStack::new();
    let (_tx, token) = shutdown_channel();
    let store = Arc::new(MemoryStore::new(Arc::new(SystemTimeProvider)));
    store.seed_categories(vec![category()]).await.unwrap();

    let config = QueueConfig::new(2, 16, FLUSH);
    let product_store = store.clone();
    let product_queue = MemoryQueue::new(
        "products",
        config,
        move |batch: Vec<Product>| {
            let store = product_store.clone();
            async move { store.update(&batch).await }
        },
        &closers,
    )
    .unwrap();
    let log_store = store.clone();
    let log_queue = MemoryQueue::new(
        "tracking logs",
        config,
        move |batch: Vec<TrackingLog>| {
            let store = log_store.clone();
            async move { store.save_logs(&batch).await }
        },
        &closers,
    )
    .unwrap();

    let worker = Worker::new(&closers);
    let client = Arc::new(MockProductClient::new(pages));
    let sender = Arc::new(sender);

    let products = ProductService::new(
        worker.clone(),
        client.clone(),
        store.clone(),
        product_queue,
        FatalErrors::new(),
    );
    let tracking = TrackingService::new(
        worker,
        store.clone(),
        store.clone(),
        sender.clone(),
        log_queue,
    );

    Pipeline {
        store,
        client,
        sender,
        products,
        tracking,
        closers,
        token,
    }
}

fn watch(chat_id: i64, diff_value: u8) -> TrackingSettings {
    TrackingSettings {
        chat_id,
        size: "M".to_string(),
        category_id: CATEGORY,
        diff_value,
    }
}

/// Let partial batches reach the store
async fn settle() {
    sleep(FLUSH * 3).await;
}

#[tokio::test(start_paused = true)]
async fn test_update_persists_every_page() {
    let p = pipeline(
        vec![
            MockPage::Products(vec![dress(1, 1000.0), dress(2, 1100.0)]),
            MockPage::Products(vec![dress(3, 1200.0)]),
        ],
        MockNotificationSender::new(),
    )
    .await;

    assert_eq!(p.products.update_products(&p.token, CATEGORY).await.unwrap(), 3);
    assert_eq!(p.closers.close_all().await, 0);

    assert_eq!(p.store.product_count().await, 3);
    let record = p.store.product(3).await.unwrap();
    assert_eq!(record.product.category_id, CATEGORY);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_cycles_do_not_duplicate_rows() {
    let page = vec![dress(1, 1000.0), dress(2, 1100.0), dress(3, 1200.0)];
    let p = pipeline(
        vec![
            MockPage::Products(page.clone()),
            MockPage::Products(Vec::new()),
            MockPage::Products(page),
        ],
        MockNotificationSender::new(),
    )
    .await;

    assert_ok!(p.products.update_products(&p.token, CATEGORY).await);
    settle().await;
    assert_ok!(p.products.update_products(&p.token, CATEGORY).await);
    p.closers.close_all().await;

    assert_eq!(p.store.product_count().await, 3);
    assert_eq!(p.store.size_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_ends_cycle_and_next_cycle_restarts() {
    let p = pipeline(
        vec![
            MockPage::Products(vec![dress(1, 1000.0)]),
            MockPage::RateLimited,
            MockPage::Products(vec![dress(2, 900.0)]),
        ],
        MockNotificationSender::new(),
    )
    .await;

    assert_eq!(p.products.update_products(&p.token, CATEGORY).await.unwrap(), 1);
    assert_eq!(p.products.update_products(&p.token, CATEGORY).await.unwrap(), 1);

    let pages: Vec<u32> = p.client.requests().iter().map(|r| r.page).collect();
    assert_eq!(pages, vec![1, 2, 1, 2]);

    p.closers.close_all().await;
    assert_eq!(p.store.product_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_price_drop_is_notified_once() {
    let p = pipeline(
        vec![
            MockPage::Products(vec![dress(1, 2000.0)]),
            MockPage::Products(Vec::new()),
            MockPage::Products(vec![dress(1, 1500.0)]),
        ],
        MockNotificationSender::new(),
    )
    .await;
    assert_ok!(p.tracking.add_tracking(watch(10, 20)).await);
    assert_ok!(p.tracking.add_tracking(watch(11, 30)).await);

    assert_ok!(p.products.update_products(&p.token, CATEGORY).await);
    settle().await;
    assert_eq!(p.tracking.send_notifications(&p.token, CATEGORY).await.unwrap(), 0);

    assert_ok!(p.products.update_products(&p.token, CATEGORY).await);
    settle().await;
    assert_eq!(p.tracking.send_notifications(&p.token, CATEGORY).await.unwrap(), 1);

    let sent = p.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, 10);
    assert_eq!(sent[0].diff_percent, 25);

    settle().await;
    assert_eq!(p.tracking.send_notifications(&p.token, CATEGORY).await.unwrap(), 0);
    assert_eq!(p.store.log_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_recipient_is_retried_next_cycle_only() {
    let p = pipeline(
        vec![
            MockPage::Products(vec![dress(1, 2000.0)]),
            MockPage::Products(Vec::new()),
            MockPage::Products(vec![dress(1, 1000.0)]),
        ],
        MockNotificationSender::failing_for([11]),
    )
    .await;
    assert_ok!(p.tracking.add_tracking(watch(10, 10)).await);
    assert_ok!(p.tracking.add_tracking(watch(11, 10)).await);
    assert_ok!(p.tracking.add_tracking(watch(12, 10)).await);

    assert_ok!(p.products.update_products(&p.token, CATEGORY).await);
    settle().await;
    assert_ok!(p.products.update_products(&p.token, CATEGORY).await);
    settle().await;

    assert_eq!(p.tracking.send_notifications(&p.token, CATEGORY).await.unwrap(), 2);
    settle().await;

    // Only the failed chat is matched again, and it fails again
    assert_eq!(p.tracking.send_notifications(&p.token, CATEGORY).await.unwrap(), 0);

    let chats: Vec<i64> = p.sender.sent().iter().map(|r| r.chat_id).collect();
    assert_eq!(chats, vec![10, 12]);
    assert_eq!(p.store.log_count().await, 2);
}
