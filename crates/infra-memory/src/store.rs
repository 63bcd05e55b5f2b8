// In-memory storage for catalog snapshots and tracking subscriptions

use async_trait::async_trait;
use pricewatch_core::domain::{
    Category, CategoryId, ChatId, Product, ProductId, ProductSize, TrackingLog, TrackingResult,
    TrackingSettings,
};
use pricewatch_core::error::{AppError, Result};
use pricewatch_core::port::{
    CategoryRepository, ProductRepository, TimeProvider, TrackingRepository,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Stored product with bookkeeping timestamps (ms since epoch)
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub product: Product,
    pub created_at: i64,
    pub updated_at: i64,
}

type TrackingKey = (ChatId, String, CategoryId);

#[derive(Default)]
struct State {
    categories: BTreeMap<CategoryId, Category>,
    products: HashMap<ProductId, ProductRecord>,
    tracking: HashMap<TrackingKey, TrackingSettings>,
    logs: HashSet<TrackingLog>,
}

/// Storage backed by maps behind a single async lock
///
/// Writing the same product batch twice leaves one row per product and
/// size; only the price history moves.
pub struct MemoryStore {
    state: RwLock<State>,
    time_provider: Arc<dyn TimeProvider>,
}

impl MemoryStore {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            time_provider,
        }
    }

    /// Insert or replace categories
    pub async fn seed_categories(&self, categories: Vec<Category>) -> Result<()> {
        let mut state = self.state.write().await;
        for category in categories {
            if category.name.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "category {} has an empty name",
                    category.id
                )));
            }
            state.categories.insert(category.id, category);
        }
        debug!(categories = state.categories.len(), "Categories seeded");
        Ok(())
    }

    pub async fn product(&self, id: ProductId) -> Option<ProductRecord> {
        self.state.read().await.products.get(&id).cloned()
    }

    pub async fn product_count(&self) -> usize {
        self.state.read().await.products.len()
    }

    /// Total number of stored (product, size) rows
    pub async fn size_count(&self) -> usize {
        self.state
            .read()
            .await
            .products
            .values()
            .map(|record| record.product.sizes.len())
            .sum()
    }

    pub async fn tracking_count(&self) -> usize {
        self.state.read().await.tracking.len()
    }

    pub async fn log_count(&self) -> usize {
        self.state.read().await.logs.len()
    }
}

fn merge_sizes(stored: &mut Vec<ProductSize>, scraped: &[ProductSize]) {
    for size in scraped {
        match stored.iter_mut().find(|s| s.name == size.name) {
            Some(existing) => existing.reprice(size.current_price),
            None => stored.push(ProductSize::new(size.name.clone(), size.current_price)),
        }
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn update(&self, products: &[Product]) -> Result<()> {
        let now = self.time_provider.now_millis();
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut inserted = 0;

        for product in products {
            match state.products.get_mut(&product.id) {
                Some(record) => {
                    merge_sizes(&mut record.product.sizes, &product.sizes);
                    record.updated_at = now;
                }
                None => {
                    let mut stored = product.clone();
                    stored.sizes.clear();
                    merge_sizes(&mut stored.sizes, &product.sizes);
                    state.products.insert(
                        product.id,
                        ProductRecord {
                            product: stored,
                            created_at: now,
                            updated_at: now,
                        },
                    );
                    inserted += 1;
                }
            }
        }

        debug!(
            batch = products.len(),
            inserted,
            total = state.products.len(),
            "Products stored"
        );
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn get_categories(&self) -> Result<Vec<Category>> {
        Ok(self.state.read().await.categories.values().cloned().collect())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Category> {
        self.state
            .read()
            .await
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("category {}", id)))
    }
}

#[async_trait]
impl TrackingRepository for MemoryStore {
    async fn add_tracking(&self, settings: &TrackingSettings) -> Result<()> {
        let key = (
            settings.chat_id,
            settings.size.clone(),
            settings.category_id,
        );
        self.state
            .write()
            .await
            .tracking
            .insert(key, settings.clone());
        Ok(())
    }

    async fn find_match_tracking(&self, category_id: CategoryId) -> Result<Vec<TrackingResult>> {
        let state = self.state.read().await;
        let mut results = Vec::new();

        for settings in state
            .tracking
            .values()
            .filter(|settings| settings.category_id == category_id)
        {
            for record in state.products.values() {
                let product = &record.product;
                if product.category_id != category_id {
                    continue;
                }
                let Some(size) = product.size(&settings.size) else {
                    continue;
                };

                let diff_percent =
                    TrackingResult::price_drop_percent(size.previous_price, size.current_price);
                if diff_percent == 0 || diff_percent < settings.diff_value {
                    continue;
                }

                let result = TrackingResult {
                    chat_id: settings.chat_id,
                    product_id: product.id,
                    product_name: product.name.clone(),
                    product_url: product.url.clone(),
                    size: size.name.clone(),
                    previous_price: size.previous_price,
                    current_price: size.current_price,
                    diff_percent,
                };
                if state.logs.contains(&result.log()) {
                    continue;
                }
                results.push(result);
            }
        }

        results.sort_by(|a, b| (a.chat_id, a.product_id).cmp(&(b.chat_id, b.product_id)));
        Ok(results)
    }

    async fn save_logs(&self, logs: &[TrackingLog]) -> Result<()> {
        let mut state = self.state.write().await;
        state.logs.extend(logs.iter().cloned());
        Ok(())
    }
}
