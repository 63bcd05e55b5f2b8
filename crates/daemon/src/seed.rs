// Startup data: categories to scrape and tracking subscriptions

use anyhow::{Context, Result};
use pricewatch_core::domain::{Category, TrackingSettings};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Seed {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub tracking: Vec<TrackingSettings>,
}

impl Seed {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid seed file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let seed: Seed = serde_json::from_str(raw)?;
        anyhow::ensure!(!seed.categories.is_empty(), "seed has no categories");
        Ok(seed)
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self {
            categories: vec![Category {
                id: 8137,
                name: "dresses".to_string(),
                title: "Dresses".to_string(),
                emoji: "👗".to_string(),
                request_url: "https://catalog.wb.ru/catalog/{category}/v2/catalog?ab_testing=false&appType=1&cat=8137&curr=rub&dest=-1257786&hide_dtype=13&lang=ru&page={page}&sort=popular&spp=30".to_string(),
                product_url: "https://www.wildberries.ru/catalog/{id}/detail.aspx".to_string(),
            }],
            tracking: Vec::new(),
        }
    }
}
