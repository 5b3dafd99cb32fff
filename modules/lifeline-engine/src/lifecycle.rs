//! Alert status state machine.
//!
//! One authoritative transition table; `acknowledge`, `resolve`, and
//! `cancel` are thin wrappers over `transition`. There is no generic
//! unguarded status setter.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use lifeline_common::{Alert, AlertStatus, LifelineError};

use crate::traits::{AlertStore, StatusUpdate};

/// Source statuses from which `target` may be entered. Terminal states and
/// `pending` have no legal entry; self-transitions are rejected with the
/// rest.
fn allowed_from(target: AlertStatus) -> &'static [AlertStatus] {
    match target {
        AlertStatus::Pending => &[],
        AlertStatus::Acknowledged => &[AlertStatus::Pending],
        AlertStatus::Resolved => &[AlertStatus::Pending, AlertStatus::Acknowledged],
        AlertStatus::Cancelled => &[AlertStatus::Pending, AlertStatus::Acknowledged],
    }
}

pub struct Lifecycle {
    alerts: Arc<dyn AlertStore>,
}

impl Lifecycle {
    pub fn new(alerts: Arc<dyn AlertStore>) -> Self {
        Self { alerts }
    }

    /// Move an alert to `target`, validated against the transition table.
    ///
    /// The guard and the write are one conditional store operation, so a
    /// concurrent transition on the same alert cannot be lost; the loser
    /// observes `InvalidTransition`.
    pub async fn transition(
        &self,
        alert_id: Uuid,
        target: AlertStatus,
        note: Option<String>,
    ) -> Result<Alert, LifelineError> {
        let now = Utc::now();
        let update = StatusUpdate {
            status: target,
            response_time: (target == AlertStatus::Acknowledged).then_some(now),
            resolved_time: (target == AlertStatus::Resolved).then_some(now),
            description: note.filter(|_| target == AlertStatus::Resolved),
        };

        let updated = self
            .alerts
            .update_status(alert_id, allowed_from(target), update)
            .await
            .map_err(|e| LifelineError::Store(e.to_string()))?;

        match updated {
            Some(alert) => {
                info!(alert_id = %alert.id, status = %alert.status, "alert transitioned");
                Ok(alert)
            }
            // No row matched: the id is unknown, or the current status is
            // not a legal source. Re-read to tell the two apart.
            None => match self
                .alerts
                .find_by_id(alert_id)
                .await
                .map_err(|e| LifelineError::Store(e.to_string()))?
            {
                Some(alert) => Err(LifelineError::InvalidTransition {
                    from: alert.status,
                    to: target,
                }),
                None => Err(LifelineError::NotFound(format!("alert {alert_id}"))),
            },
        }
    }

    /// Facility accepted the alert. Valid only from `pending`; stamps
    /// `response_time`.
    pub async fn acknowledge(&self, alert_id: Uuid) -> Result<Alert, LifelineError> {
        self.transition(alert_id, AlertStatus::Acknowledged, None).await
    }

    /// Incident closed. Valid from `pending` or `acknowledged`; stamps
    /// `resolved_time`. A resolution note overwrites the description.
    pub async fn resolve(
        &self,
        alert_id: Uuid,
        note: Option<String>,
    ) -> Result<Alert, LifelineError> {
        self.transition(alert_id, AlertStatus::Resolved, note).await
    }

    /// Withdraw an alert. Valid from any non-terminal state.
    pub async fn cancel(&self, alert_id: Uuid) -> Result<Alert, LifelineError> {
        self.transition(alert_id, AlertStatus::Cancelled, None).await
    }
}
