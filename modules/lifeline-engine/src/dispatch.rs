//! New-incident dispatch: resolve the nearest active facility, persist the
//! alert, then notify the facility.
//!
//! The persisted record is the authoritative outcome. Notification rides on
//! top as best-effort: a push failure is logged and reported back as
//! `notification_sent: false`, never as a failed dispatch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use lifeline_common::{Alert, IncidentReport, LifelineError};

use crate::notify::{DispatchNote, PushBackend};
use crate::traits::{AlertStore, FacilityDirectory};

#[derive(Debug, Clone)]
pub struct Dispatched {
    pub alert: Alert,
    pub facility_name: String,
    pub distance_km: f64,
    pub notification_sent: bool,
}

pub struct Dispatcher {
    alerts: Arc<dyn AlertStore>,
    facilities: Arc<dyn FacilityDirectory>,
    push: Arc<dyn PushBackend>,
}

impl Dispatcher {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        facilities: Arc<dyn FacilityDirectory>,
        push: Arc<dyn PushBackend>,
    ) -> Self {
        Self {
            alerts,
            facilities,
            push,
        }
    }

    /// Create a new incident from a report: nearest facility, persist,
    /// notify. Fails with `NoFacilityAvailable` when the kind has no active
    /// facilities; nothing is persisted in that case.
    pub async fn dispatch(&self, report: &IncidentReport) -> Result<Dispatched, LifelineError> {
        let nearest = self
            .facilities
            .nearest(report.kind, report.location, 1)
            .await
            .map_err(|e| LifelineError::Store(e.to_string()))?;

        let Some((facility, distance_km)) = nearest.into_iter().next() else {
            return Err(LifelineError::NoFacilityAvailable(report.kind));
        };

        let alert = Alert::new_root(report, &facility, distance_km, Utc::now());
        let mut alert = self
            .alerts
            .save(alert)
            .await
            .map_err(|e| LifelineError::Store(e.to_string()))?;

        info!(
            alert_id = %alert.id,
            kind = %alert.kind,
            facility = %facility.name,
            distance_km,
            "dispatched new alert"
        );

        let notification_sent = match facility.push_channel.as_deref() {
            Some(channel) => {
                let note = DispatchNote::for_alert(&alert);
                match self.push.send(channel, &note).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            alert_id = %alert.id,
                            facility = %facility.name,
                            error = %e,
                            "dispatch notification failed"
                        );
                        false
                    }
                }
            }
            None => {
                info!(facility = %facility.name, "facility has no push channel registered");
                false
            }
        };

        if notification_sent {
            alert.notification_sent = true;
            // Record the delivery on the alert. The push already happened,
            // so a failure here downgrades the record, not the dispatch.
            match self.alerts.save(alert.clone()).await {
                Ok(saved) => alert = saved,
                Err(e) => {
                    warn!(alert_id = %alert.id, error = %e, "failed to record notification delivery");
                }
            }
        }

        Ok(Dispatched {
            alert,
            facility_name: facility.name,
            distance_km,
            notification_sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        facility_at, report_at, FailingPush, MemoryAlertStore, MemoryFacilityDirectory,
        RecordingPush,
    };
    use lifeline_common::{AlertStatus, GeoPoint, Priority, ServiceKind};

    fn colombo() -> GeoPoint {
        GeoPoint { lat: 6.9271, lng: 79.8612 }
    }

    /// Facilities at roughly 5, 2, and 8 km north of Colombo.
    fn directory_with_three() -> (MemoryFacilityDirectory, String) {
        let far = facility_at(ServiceKind::Police, 6.9721, 79.8612, "Far Station");
        let near = facility_at(ServiceKind::Police, 6.9451, 79.8612, "Near Station");
        let farther = facility_at(ServiceKind::Police, 6.9991, 79.8612, "Farther Station");
        let dir = MemoryFacilityDirectory::with(vec![far, near.clone(), farther]);
        (dir, near.name)
    }

    #[tokio::test]
    async fn selects_minimum_distance_facility() {
        let (dir, near_name) = directory_with_three();
        let alerts = Arc::new(MemoryAlertStore::new());
        let push = Arc::new(RecordingPush::new());
        let dispatcher = Dispatcher::new(alerts, Arc::new(dir), push);

        let report = report_at(ServiceKind::Police, colombo(), "user-1");
        let out = dispatcher.dispatch(&report).await.unwrap();

        assert_eq!(out.facility_name, near_name);
        assert!((out.distance_km - 2.0).abs() < 0.05, "got {}", out.distance_km);
        assert_eq!(out.alert.facility_name, near_name);
    }

    #[tokio::test]
    async fn new_alert_shape() {
        let (dir, _) = directory_with_three();
        let alerts = Arc::new(MemoryAlertStore::new());
        let push = Arc::new(RecordingPush::new());
        let dispatcher = Dispatcher::new(alerts.clone(), Arc::new(dir), push);

        let report = report_at(ServiceKind::Police, colombo(), "user-1");
        let out = dispatcher.dispatch(&report).await.unwrap();

        let alert = alerts.find_by_id(out.alert.id).await.unwrap().unwrap();
        assert_eq!(alert.status, AlertStatus::Pending);
        assert_eq!(alert.priority, Priority::High);
        assert_eq!(alert.report_count, 1);
        assert_eq!(alert.reporters.len(), 1);
        assert!(!alert.is_aggregated);
    }

    #[tokio::test]
    async fn no_active_facility_persists_nothing() {
        let dir = MemoryFacilityDirectory::with(vec![]);
        let alerts = Arc::new(MemoryAlertStore::new());
        let push = Arc::new(RecordingPush::new());
        let dispatcher = Dispatcher::new(alerts.clone(), Arc::new(dir), push);

        let report = report_at(ServiceKind::Ambulance, colombo(), "user-1");
        let err = dispatcher.dispatch(&report).await.unwrap_err();

        assert!(matches!(
            err,
            LifelineError::NoFacilityAvailable(ServiceKind::Ambulance)
        ));
        assert!(alerts.recent(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deactivated_facilities_are_skipped() {
        let mut inactive = facility_at(ServiceKind::Fire, 6.9451, 79.8612, "Closed Station");
        inactive.active = false;
        let active = facility_at(ServiceKind::Fire, 6.9721, 79.8612, "Open Station");
        let dir = MemoryFacilityDirectory::with(vec![inactive, active]);

        let alerts = Arc::new(MemoryAlertStore::new());
        let push = Arc::new(RecordingPush::new());
        let dispatcher = Dispatcher::new(alerts, Arc::new(dir), push);

        let report = report_at(ServiceKind::Fire, colombo(), "user-1");
        let out = dispatcher.dispatch(&report).await.unwrap();
        assert_eq!(out.facility_name, "Open Station");
    }

    #[tokio::test]
    async fn notification_payload_reaches_the_channel() {
        let (dir, _) = directory_with_three();
        let alerts = Arc::new(MemoryAlertStore::new());
        let push = Arc::new(RecordingPush::new());
        let dispatcher = Dispatcher::new(alerts, Arc::new(dir), push.clone());

        let report = report_at(ServiceKind::Police, colombo(), "user-1");
        let out = dispatcher.dispatch(&report).await.unwrap();

        assert!(out.notification_sent);
        assert!(out.alert.notification_sent);
        let sent = push.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.alert_id, out.alert.id);
        assert_eq!(sent[0].1.title, "EMERGENCY ALERT - Police Assistance Required");
    }

    #[tokio::test]
    async fn push_failure_does_not_fail_dispatch() {
        let (dir, _) = directory_with_three();
        let alerts = Arc::new(MemoryAlertStore::new());
        let dispatcher = Dispatcher::new(alerts.clone(), Arc::new(dir), Arc::new(FailingPush));

        let report = report_at(ServiceKind::Police, colombo(), "user-1");
        let out = dispatcher.dispatch(&report).await.unwrap();

        assert!(!out.notification_sent);
        assert!(!out.alert.notification_sent);
        // The alert is persisted regardless.
        assert!(alerts.find_by_id(out.alert.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_push_channel_reports_not_sent() {
        let mut facility = facility_at(ServiceKind::Fire, 6.9451, 79.8612, "Quiet Station");
        facility.push_channel = None;
        let dir = MemoryFacilityDirectory::with(vec![facility]);
        let alerts = Arc::new(MemoryAlertStore::new());
        let push = Arc::new(RecordingPush::new());
        let dispatcher = Dispatcher::new(alerts, Arc::new(dir), push.clone());

        let report = report_at(ServiceKind::Fire, colombo(), "user-1");
        let out = dispatcher.dispatch(&report).await.unwrap();

        assert!(!out.notification_sent);
        assert!(push.sent().await.is_empty());
    }
}
