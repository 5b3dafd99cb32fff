use async_trait::async_trait;

use super::backend::{DispatchNote, PushBackend};

/// No-op push backend for dev environments without a push gateway.
pub struct NoopPush;

#[async_trait]
impl PushBackend for NoopPush {
    async fn send(&self, _channel_id: &str, _note: &DispatchNote) -> anyhow::Result<()> {
        Ok(())
    }
}
