// Price Tracking Domain Model

use super::product::{CategoryId, ProductId};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Chat identifier of a subscribed bot user
pub type ChatId = i64;

/// A user subscription: notify when `size` in `category_id` gets cheaper by
/// at least `diff_value` percent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSettings {
    pub chat_id: ChatId,
    pub size: String,
    pub category_id: CategoryId,
    pub diff_value: u8,
}

impl TrackingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.size.trim().is_empty() {
            return Err(AppError::Validation("tracking size cannot be empty".to_string()));
        }
        if !(1..=100).contains(&self.diff_value) {
            return Err(AppError::Validation(format!(
                "tracking diff value {} out of range (1-100)",
                self.diff_value
            )));
        }
        Ok(())
    }
}

/// A price drop matching a subscription, ready to be sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    pub chat_id: ChatId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_url: String,
    pub size: String,
    pub previous_price: f32,
    pub current_price: f32,
    pub diff_percent: u8,
}

impl TrackingResult {
    /// Whole percent the price dropped by; 0 when it did not drop
    pub fn price_drop_percent(previous: f32, current: f32) -> u8 {
        if previous <= 0.0 || current >= previous {
            return 0;
        }
        let percent = ((previous - current) / previous * 100.0).floor();
        percent.clamp(0.0, 100.0) as u8
    }

    /// Record of this notification, used to avoid sending the same price twice
    pub fn log(&self) -> TrackingLog {
        TrackingLog {
            chat_id: self.chat_id,
            size: self.size.clone(),
            product_id: self.product_id,
            price: self.current_price.round() as u64,
        }
    }
}

/// A delivered notification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingLog {
    pub chat_id: ChatId,
    pub size: String,
    pub product_id: ProductId,
    pub price: u64,
}
