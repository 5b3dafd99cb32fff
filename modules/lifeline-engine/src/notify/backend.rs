use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lifeline_common::{Alert, GeoPoint, ServiceKind};

/// Payload pushed to a facility's channel when a new incident is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchNote {
    pub alert_id: Uuid,
    pub kind: ServiceKind,
    pub location: GeoPoint,
    pub distance_km: f64,
    pub reporter_phone: Option<String>,
    pub title: String,
    pub body: String,
}

impl DispatchNote {
    pub fn for_alert(alert: &Alert) -> Self {
        let title = match alert.kind {
            ServiceKind::Police => "EMERGENCY ALERT - Police Assistance Required",
            ServiceKind::Fire => "FIRE EMERGENCY",
            ServiceKind::Ambulance => "MEDICAL EMERGENCY - Ambulance Required",
        };

        let body = match alert.kind {
            ServiceKind::Police => format!(
                "Emergency at {:.2} km away. Tap to view details.",
                alert.distance_km
            ),
            ServiceKind::Fire => format!(
                "Fire reported at {:.2} km away. Immediate response required!",
                alert.distance_km
            ),
            ServiceKind::Ambulance => format!(
                "Medical emergency at {:.2} km away. Immediate response needed!",
                alert.distance_km
            ),
        };

        Self {
            alert_id: alert.id,
            kind: alert.kind,
            location: alert.location,
            distance_km: alert.distance_km,
            reporter_phone: alert.reporters.first().and_then(|r| r.user_phone.clone()),
            title: title.to_string(),
            body,
        }
    }
}

/// Pluggable push backend for dispatch notifications.
#[async_trait]
pub trait PushBackend: Send + Sync {
    /// Deliver one note to a facility's push channel.
    async fn send(&self, channel_id: &str, note: &DispatchNote) -> anyhow::Result<()>;
}
