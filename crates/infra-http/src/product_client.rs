// Catalog API client (one GET per page)

use crate::fetch_error;
use async_trait::async_trait;
use pricewatch_core::domain::{Product, ProductSize, ProductsRequest};
use pricewatch_core::error::{AppError, Result};
use pricewatch_core::port::ProductClient;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    data: CatalogData,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogData {
    #[serde(default)]
    products: Vec<CatalogProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogProduct {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    review_rating: f32,
    #[serde(default)]
    brand: String,
    #[serde(default)]
    brand_id: u64,
    #[serde(default)]
    colors: Vec<CatalogColor>,
    #[serde(default)]
    sizes: Vec<CatalogSize>,
}

#[derive(Debug, Deserialize)]
struct CatalogColor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CatalogSize {
    name: String,
    price: Option<CatalogPrice>,
}

#[derive(Debug, Deserialize)]
struct CatalogPrice {
    total: f64,
}

/// Decode a catalog page body into products
///
/// Prices arrive in kopecks and are truncated to whole rubles. Sizes
/// without a price (sold out) are skipped.
pub fn decode_products(body: &[u8], request: &ProductsRequest) -> Result<Vec<Product>> {
    let response: CatalogResponse = serde_json::from_slice(body)?;

    let products = response
        .data
        .products
        .into_iter()
        .map(|item| Product {
            id: item.id,
            category_id: request.category_id,
            name: item.name,
            rating: item.review_rating,
            url: request.product_link(item.id),
            brand: item.brand,
            brand_id: item.brand_id,
            colors: item.colors.into_iter().map(|c| c.name).collect(),
            sizes: item
                .sizes
                .into_iter()
                .filter_map(|size| {
                    let price = size.price?;
                    Some(ProductSize::new(size.name, (price.total / 100.0).trunc() as f32))
                })
                .collect(),
        })
        .collect();

    Ok(products)
}

/// Map a catalog response status; `Ok(false)` means an empty page
fn has_body(status: StatusCode, request: &ProductsRequest) -> Result<bool> {
    match status {
        StatusCode::OK => Ok(true),
        StatusCode::NO_CONTENT => Ok(false),
        StatusCode::TOO_MANY_REQUESTS => Err(AppError::RateLimited(format!(
            "{} page {}",
            request.category, request.page
        ))),
        other => Err(AppError::Fetch(format!(
            "catalog answered {} for {} page {}",
            other, request.category, request.page
        ))),
    }
}

/// ProductClient over the public catalog API
pub struct HttpProductClient {
    client: reqwest::Client,
}

impl HttpProductClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProductClient for HttpProductClient {
    async fn get_products(&self, request: &ProductsRequest) -> Result<Vec<Product>> {
        let url = request.url()?;

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| fetch_error("catalog request failed", e))?;

        let status = response.status();
        if !has_body(status, request)? {
            debug!(category = %request.category, page = request.page, "Catalog page empty");
            return Ok(Vec::new());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error("failed to read catalog body", e))?;
        let products = decode_products(&body, request)?;

        debug!(
            category = %request.category,
            page = request.page,
            products = products.len(),
            "Catalog page decoded"
        );
        Ok(products)
    }
}
