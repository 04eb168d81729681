use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Notification;
use crate::config::NotificationConfig;

/// First frame every subscriber receives
pub const CONNECTED_MESSAGE: &str = "Connected to notification stream";

/// Frame pushed over the notification stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PushMessage {
    Connected { message: String },
    Notification { data: Notification },
}

impl PushMessage {
    pub fn connected() -> Self {
        PushMessage::Connected {
            message: CONNECTED_MESSAGE.to_string(),
        }
    }
}

/// Fan-out of pushed notifications to every open stream.
///
/// Each stream holds its own receiver, dropped when the connection closes.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<PushMessage>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Push a notification to all subscribers; returns how many received it
    pub fn broadcast(&self, notification: Notification) -> usize {
        let id = notification.id;
        match self.sender.send(PushMessage::Notification { data: notification }) {
            Ok(receivers) => {
                debug!(id, receivers, "Notification broadcast");
                receivers
            }
            // No open streams
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(NotificationConfig::default().capacity)
    }
}

fn demo_notifications(now_ms: u64) -> [Notification; 2] {
    [
        Notification::new(
            now_ms,
            "update",
            "New PR Merged",
            "Backend Team: PR #234 has been merged to main",
            "Just now",
            true,
        ),
        Notification::new(
            now_ms + 1,
            "mention",
            "You were mentioned",
            "in #frontend-team: \"Can you help with the review?\"",
            "Just now",
            true,
        ),
    ]
}

/// Periodically push a random demo notification.
///
/// Each tick fires with `config.probability`. The task runs until aborted.
pub fn spawn_demo_ticker(hub: Arc<NotificationHub>, config: NotificationConfig) -> JoinHandle<()> {
    info!(
        interval_ms = config.interval_ms,
        probability = config.probability,
        "Starting demo notification ticker"
    );

    tokio::spawn(async move {
        let period = Duration::from_millis(config.interval_ms.max(1));
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            interval.tick().await;

            let pick = {
                let mut rng = rand::thread_rng();
                if rng.gen::<f64>() < config.probability {
                    Some(rng.gen_range(0..2usize))
                } else {
                    None
                }
            };

            if let Some(index) = pick {
                let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
                let [first, second] = demo_notifications(now_ms);
                let notification = if index == 0 { first } else { second };
                hub.broadcast(notification);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_message_wire_shape() {
        let connected = serde_json::to_value(PushMessage::connected()).unwrap();
        assert_eq!(
            connected,
            json!({"type": "connected", "message": "Connected to notification stream"})
        );

        let pushed = serde_json::to_value(PushMessage::Notification {
            data: demo_notifications(7)[0].clone(),
        })
        .unwrap();
        assert_eq!(pushed["type"], json!("notification"));
        assert_eq!(pushed["data"]["title"], json!("New PR Merged"));
        assert_eq!(pushed["data"]["id"], json!(7));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let hub = NotificationHub::new(8);
        assert_eq!(hub.broadcast(demo_notifications(1)[0].clone()), 0);

        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);
        assert_eq!(hub.broadcast(demo_notifications(1)[1].clone()), 2);

        assert!(matches!(a.recv().await.unwrap(), PushMessage::Notification { .. }));
        assert!(matches!(b.recv().await.unwrap(), PushMessage::Notification { .. }));

        drop(a);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_ticker_always_fires_with_probability_one() {
        let hub = Arc::new(NotificationHub::new(8));
        let mut rx = hub.subscribe();
        let handle = spawn_demo_ticker(
            hub.clone(),
            NotificationConfig {
                interval_ms: 10,
                probability: 1.0,
                capacity: 8,
            },
        );

        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match message {
            PushMessage::Notification { data } => assert_eq!(data.time, "Just now"),
            other => panic!("unexpected message: {:?}", other),
        }
        handle.abort();
    }
}
