use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::backend::{DispatchNote, PushBackend};

/// Push backend that POSTs dispatch notes to a gateway webhook (the FCM
/// relay in production). Non-2xx responses are errors.
pub struct WebhookPush {
    webhook_url: String,
    http: reqwest::Client,
}

impl WebhookPush {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PushBackend for WebhookPush {
    async fn send(&self, channel_id: &str, note: &DispatchNote) -> anyhow::Result<()> {
        let payload = json!({
            "channel_id": channel_id,
            "notification": {
                "title": note.title,
                "body": note.body,
            },
            "data": {
                "alert_id": note.alert_id,
                "type": note.kind,
                "lat": note.location.lat,
                "lng": note.location.lng,
                "distance_km": note.distance_km,
                "user_phone": note.reporter_phone.as_deref().unwrap_or(""),
            },
        });

        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "push gateway returned non-success");
            anyhow::bail!("push gateway returned {status}");
        }

        Ok(())
    }
}
