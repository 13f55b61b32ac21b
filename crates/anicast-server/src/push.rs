//! Chat push delivery

use crate::error::{Result, ServerError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()>;
}

#[derive(Serialize)]
struct PushMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Posts `{chat_id, text}` to a chat bridge webhook
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServerError::Push(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&PushMessage { chat_id, text })
            .send()
            .await
            .map_err(|e| ServerError::Push(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::Push(format!("webhook returned {}", status)));
        }
        Ok(())
    }
}

/// Send `text` to every chat; fails only when no delivery succeeded
pub async fn deliver_all(notifier: &dyn Notifier, chat_ids: &[String], text: &str) -> Result<usize> {
    if chat_ids.is_empty() {
        warn!("Push has no chat ids configured");
        return Ok(0);
    }

    let mut delivered = 0;
    for chat_id in chat_ids {
        match notifier.send(chat_id, text).await {
            Ok(()) => {
                info!(chat_id = %chat_id, "Pushed digest");
                delivered += 1;
            }
            Err(e) => error!(chat_id = %chat_id, error = %e, "Push delivery failed"),
        }
    }

    if delivered == 0 {
        return Err(ServerError::Push(format!(
            "all {} deliveries failed",
            chat_ids.len()
        )));
    }
    Ok(delivered)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::sync::Mutex;

    /// Records messages; chats listed in `broken` fail
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String)>>,
        pub broken: Vec<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
            if self.broken.iter().any(|b| b == chat_id) {
                return Err(ServerError::Push("chat unreachable".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_partial_failure_succeeds() {
        let notifier = RecordingNotifier {
            broken: ids(&["b"]),
            ..RecordingNotifier::default()
        };
        let delivered = deliver_all(&notifier, &ids(&["a", "b", "c"]), "hi").await.unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_all_failed_is_error() {
        let notifier = RecordingNotifier {
            broken: ids(&["a", "b"]),
            ..RecordingNotifier::default()
        };
        assert!(matches!(
            deliver_all(&notifier, &ids(&["a", "b"]), "hi").await,
            Err(ServerError::Push(_))
        ));
    }

    #[tokio::test]
    async fn test_no_chats_is_noop() {
        let notifier = RecordingNotifier::default();
        assert_eq!(deliver_all(&notifier, &[], "hi").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_webhook_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/send")
                    .json_body(serde_json::json!({"chat_id": "group:1", "text": "今日新番"}));
                then.status(200);
            })
            .await;

        let notifier = WebhookNotifier::new(server.url("/send")).unwrap();
        notifier.send("group:1", "今日新番").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/send");
                then.status(500);
            })
            .await;

        let notifier = WebhookNotifier::new(server.url("/send")).unwrap();
        assert!(notifier.send("group:1", "x").await.is_err());
    }
}
