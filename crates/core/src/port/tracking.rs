// Tracking Ports: subscription storage and notification delivery

use crate::domain::{CategoryId, TrackingLog, TrackingResult, TrackingSettings};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for price tracking subscriptions
#[async_trait]
pub trait TrackingRepository: Send + Sync {
    /// Insert or replace the settings of (chat, size, category)
    async fn add_tracking(&self, settings: &TrackingSettings) -> Result<()>;

    /// Price drops of a category matching a subscription and not yet logged
    async fn find_match_tracking(&self, category_id: CategoryId) -> Result<Vec<TrackingResult>>;

    /// Record delivered notifications (idempotent)
    async fn save_logs(&self, logs: &[TrackingLog]) -> Result<()>;
}

/// Delivers one notification to one chat
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, result: &TrackingResult) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ChatId;
    use crate::error::AppError;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Mock NotificationSender recording deliveries
    #[derive(Default)]
    pub struct MockNotificationSender {
        failing_chats: HashSet<ChatId>,
        sent: Arc<Mutex<Vec<TrackingResult>>>,
    }

    impl MockNotificationSender {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sender failing for the given chats
        pub fn failing_for(chats: impl IntoIterator<Item = ChatId>) -> Self {
            Self {
                failing_chats: chats.into_iter().collect(),
                sent: Arc::default(),
            }
        }

        pub fn sent(&self) -> Vec<TrackingResult> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSender for MockNotificationSender {
        async fn send(&self, result: &TrackingResult) -> Result<()> {
            if self.failing_chats.contains(&result.chat_id) {
                return Err(AppError::Notification(format!(
                    "chat {} blocked the bot",
                    result.chat_id
                )));
            }
            self.sent.lock().unwrap().push(result.clone());
            Ok(())
        }
    }

    /// Mock TrackingRepository returning scripted matches
    #[derive(Default)]
    pub struct MockTrackingRepository {
        matches: Vec<TrackingResult>,
        settings: Arc<Mutex<Vec<TrackingSettings>>>,
        logs: Arc<Mutex<Vec<TrackingLog>>>,
    }

    impl MockTrackingRepository {
        pub fn new(matches: Vec<TrackingResult>) -> Self {
            Self {
                matches,
                ..Self::default()
            }
        }

        pub fn settings(&self) -> Vec<TrackingSettings> {
            self.settings.lock().unwrap().clone()
        }

        pub fn logs(&self) -> Vec<TrackingLog> {
            self.logs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrackingRepository for MockTrackingRepository {
        async fn add_tracking(&self, settings: &TrackingSettings) -> Result<()> {
            self.settings.lock().unwrap().push(settings.clone());
            Ok(())
        }

        async fn find_match_tracking(
            &self,
            _category_id: CategoryId,
        ) -> Result<Vec<TrackingResult>> {
            Ok(self.matches.clone())
        }

        async fn save_logs(&self, logs: &[TrackingLog]) -> Result<()> {
            self.logs.lock().unwrap().extend_from_slice(logs);
            Ok(())
        }
    }
}
