// Tracking Service - Subscription management and price-drop notifications

use crate::application::queue::Queue;
use crate::application::worker::{ShutdownToken, Worker};
use crate::domain::{CategoryId, TrackingLog, TrackingSettings};
use crate::error::Result;
use crate::port::{CategoryRepository, NotificationSender, TrackingRepository};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct TrackingService {
    worker: Arc<Worker>,
    categories: Arc<dyn CategoryRepository>,
    tracking: Arc<dyn TrackingRepository>,
    sender: Arc<dyn NotificationSender>,
    logs: Arc<dyn Queue<TrackingLog>>,
}

impl TrackingService {
    pub fn new(
        worker: Arc<Worker>,
        categories: Arc<dyn CategoryRepository>,
        tracking: Arc<dyn TrackingRepository>,
        sender: Arc<dyn NotificationSender>,
        logs: Arc<dyn Queue<TrackingLog>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            worker,
            categories,
            tracking,
            sender,
            logs,
        })
    }

    /// Store a subscription, replacing the one for the same chat, size and category
    pub async fn add_tracking(&self, settings: TrackingSettings) -> Result<()> {
        settings.validate()?;
        self.categories.get_category(settings.category_id).await?;
        self.tracking.add_tracking(&settings).await?;

        info!(
            chat_id = settings.chat_id,
            size = %settings.size,
            category_id = settings.category_id,
            diff_value = settings.diff_value,
            "Tracking added"
        );
        Ok(())
    }

    /// Launch one notification task per category
    pub async fn run_notification_workers(self: &Arc<Self>, shutdown: &ShutdownToken) -> Result<usize> {
        let categories = self.categories.get_categories().await?;

        for category in &categories {
            shutdown.check()?;
            let category_id = category.id;
            let service = Arc::clone(self);
            self.worker.run(
                shutdown,
                format!("notify {} tracking", category.name),
                move |token| async move {
                    service.send_notifications(&token, category_id).await.map(|_| ())
                },
            )?;
        }

        debug!(launched = categories.len(), "Notification workers launched");
        Ok(categories.len())
    }

    /// Notify every subscriber whose tracked size got cheaper enough
    ///
    /// Each recipient is handled on its own: a failed delivery is logged and
    /// the fan-out goes on. Delivered notifications are logged through the
    /// tracking-log queue so the same price is not sent twice. Returns the
    /// number of delivered notifications.
    pub async fn send_notifications(
        &self,
        shutdown: &ShutdownToken,
        category_id: CategoryId,
    ) -> Result<usize> {
        let matches = self.tracking.find_match_tracking(category_id).await?;
        if matches.is_empty() {
            debug!(category_id, "No price drops to notify");
            return Ok(0);
        }

        let total = matches.len();
        let mut delivered = 0;
        for result in matches {
            shutdown.check()?;

            if let Err(e) = self.sender.send(&result).await {
                error!(
                    chat_id = result.chat_id,
                    product_id = result.product_id,
                    error = %e,
                    "Failed to send notification"
                );
                continue;
            }

            self.logs.push(result.log()).await?;
            delivered += 1;
        }

        info!(category_id, total, delivered, "Notifications sent");
        Ok(delivered)
    }
}
