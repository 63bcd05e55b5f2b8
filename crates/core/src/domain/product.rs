// Catalog Domain Model

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Catalog product identifier
pub type ProductId = u64;

/// Catalog category identifier
pub type CategoryId = u64;

const CATEGORY_PLACEHOLDER: &str = "{category}";
const PAGE_PLACEHOLDER: &str = "{page}";
const PRODUCT_ID_PLACEHOLDER: &str = "{id}";

/// Catalog section scraped by the update workers
///
/// `request_url` is a template with `{category}` and `{page}` placeholders,
/// `product_url` a template with an `{id}` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub emoji: String,
    pub request_url: String,
    pub product_url: String,
}

/// One catalog page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductsRequest {
    pub page: u32,
    pub category: String,
    pub category_id: CategoryId,
    pub request_url: String,
    pub product_url: String,
}

impl ProductsRequest {
    /// Request for the first page of a category (pages start at 1)
    pub fn first_page(category: &Category) -> Self {
        Self {
            page: 1,
            category: category.name.clone(),
            category_id: category.id,
            request_url: category.request_url.clone(),
            product_url: category.product_url.clone(),
        }
    }

    pub fn next_page(&mut self) {
        self.page += 1;
    }

    /// Render the page URL from the category template
    pub fn url(&self) -> Result<String> {
        if !self.request_url.contains(PAGE_PLACEHOLDER) {
            return Err(AppError::Config(format!(
                "request url of category '{}' has no {} placeholder",
                self.category, PAGE_PLACEHOLDER
            )));
        }

        Ok(self
            .request_url
            .replace(CATEGORY_PLACEHOLDER, &self.category)
            .replace(PAGE_PLACEHOLDER, &self.page.to_string()))
    }

    /// Render the public product link
    pub fn product_link(&self, id: ProductId) -> String {
        self.product_url
            .replace(PRODUCT_ID_PLACEHOLDER, &id.to_string())
    }
}

/// Price snapshot of one size of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSize {
    pub name: String,
    pub first_price: f32,
    pub previous_price: f32,
    pub current_price: f32,
}

impl ProductSize {
    /// Size seen for the first time: every price equals the scraped one
    pub fn new(name: impl Into<String>, price: f32) -> Self {
        Self {
            name: name.into(),
            first_price: price,
            previous_price: price,
            current_price: price,
        }
    }

    /// Apply a newly scraped price; the old current price becomes the previous one
    pub fn reprice(&mut self, price: f32) {
        self.previous_price = self.current_price;
        self.current_price = price;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub category_id: CategoryId,
    pub name: String,
    pub rating: f32,
    pub url: String,
    pub brand: String,
    pub brand_id: u64,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<ProductSize>,
}

impl Product {
    pub fn size(&self, name: &str) -> Option<&ProductSize> {
        self.sizes.iter().find(|size| size.name == name)
    }
}
