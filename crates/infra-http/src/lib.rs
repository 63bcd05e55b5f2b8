// Pricewatch Infrastructure - HTTP Adapters
// Implements: ProductClient (catalog API), NotificationSender (Telegram Bot API)

mod product_client;
mod telegram;

pub use product_client::{decode_products, HttpProductClient, DEFAULT_USER_AGENT};
pub use telegram::{render_message, TelegramSender};

use pricewatch_core::error::AppError;

// reqwest errors carry the request URL; strip it so secrets in paths never reach logs
pub(crate) fn transport_error(context: &str, err: reqwest::Error) -> String {
    format!("{}: {}", context, err.without_url())
}

pub(crate) fn fetch_error(context: &str, err: reqwest::Error) -> AppError {
    AppError::Fetch(transport_error(context, err))
}
