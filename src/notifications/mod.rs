//! Mock notifications and the live push channel.

mod hub;

pub use hub::{spawn_demo_ticker, NotificationHub, PushMessage, CONNECTED_MESSAGE};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// A dashboard notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub time: String,
    pub unread: bool,
}

impl Notification {
    pub fn new(id: u64, kind: &str, title: &str, message: &str, time: &str, unread: bool) -> Self {
        Self {
            id,
            kind: kind.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            time: time.to_string(),
            unread,
        }
    }
}

/// Notifications present when the gateway starts
pub fn seed() -> Vec<Notification> {
    vec![
        Notification::new(
            1,
            "mention",
            "Sarah Chen mentioned you",
            "in #backend-team: \"Can you review the API changes?\"",
            "5 min ago",
            true,
        ),
        Notification::new(
            2,
            "update",
            "Sprint Planning Complete",
            "Backend Team has completed sprint planning for Sprint 24",
            "1 hour ago",
            true,
        ),
        Notification::new(
            3,
            "alert",
            "Critical Issue Detected",
            "Production API response time exceeded threshold",
            "2 hours ago",
            false,
        ),
        Notification::new(
            4,
            "success",
            "Deployment Successful",
            "v2.3.0 deployed to production successfully",
            "3 hours ago",
            false,
        ),
        Notification::new(
            5,
            "mention",
            "Alex Kumar assigned you",
            "to task BACK-235: Optimize database queries",
            "5 hours ago",
            false,
        ),
    ]
}

/// In-memory notification list shared by the handlers
#[derive(Debug)]
pub struct NotificationStore {
    items: RwLock<Vec<Notification>>,
}

impl NotificationStore {
    pub fn new(items: Vec<Notification>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Store holding the mock seed data
    pub fn seeded() -> Self {
        Self::new(seed())
    }

    pub async fn list(&self) -> Vec<Notification> {
        self.items.read().await.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.items.read().await.iter().filter(|n| n.unread).count()
    }

    /// Mark one notification read, returning its updated value
    pub async fn mark_read(&self, id: u64) -> Option<Notification> {
        let mut items = self.items.write().await;
        let notification = items.iter_mut().find(|n| n.id == id)?;
        notification.unread = false;
        debug!(id, "Notification marked read");
        Some(notification.clone())
    }

    pub async fn mark_all_read(&self) {
        let mut items = self.items.write().await;
        for notification in items.iter_mut() {
            notification.unread = false;
        }
        debug!(count = items.len(), "All notifications marked read");
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::seeded()
    }
}
