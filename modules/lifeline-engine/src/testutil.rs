//! In-memory collaborators for tests and local development.
//!
//! The mock stores mirror the conditional-update semantics of the Postgres
//! implementations: `append_reporter` and `update_status` check and write
//! under one lock, the same atomicity the real store gets from single
//! SQL statements.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use lifeline_common::{Alert, AlertStatus, Facility, GeoPoint, IncidentReport, Reporter, ServiceKind};

use crate::notify::{DispatchNote, PushBackend};
use crate::traits::{AlertStore, FacilityDirectory, StatusUpdate};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn facility_at(kind: ServiceKind, lat: f64, lng: f64, name: &str) -> Facility {
    Facility {
        id: Uuid::new_v4(),
        kind,
        name: name.to_string(),
        phone: "0112345678".to_string(),
        location: GeoPoint { lat, lng },
        address: None,
        district: None,
        push_channel: Some(format!("channel-{name}")),
        active: true,
        created_at: Utc::now(),
    }
}

pub fn report_at(kind: ServiceKind, location: GeoPoint, user_id: &str) -> IncidentReport {
    IncidentReport {
        user_id: Some(user_id.to_string()),
        user_phone: Some("0771234567".to_string()),
        kind,
        location,
        description: None,
    }
}

/// A pending root alert at `location`, reported by `user_id`, bound to a
/// synthetic facility 1 km out.
pub fn root_alert_at(kind: ServiceKind, location: GeoPoint, user_id: &str) -> Alert {
    let facility = facility_at(kind, location.lat, location.lng, "Synthetic Station");
    let report = report_at(kind, location, user_id);
    Alert::new_root(&report, &facility, 1.0, Utc::now())
}

// ---------------------------------------------------------------------------
// MemoryAlertStore
// ---------------------------------------------------------------------------

/// Alert store over a plain Vec, insertion-ordered. Candidate scans return
/// alerts in the order they were saved.
#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn find_active_by_kind_since(
        &self,
        kind: ServiceKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let alerts = self.alerts.lock().await;
        Ok(alerts
            .iter()
            .filter(|a| a.kind == kind && a.status.is_active() && a.created_at >= since)
            .cloned()
            .collect())
    }

    async fn save(&self, alert: Alert) -> Result<Alert> {
        let mut alerts = self.alerts.lock().await;
        match alerts.iter_mut().find(|a| a.id == alert.id) {
            Some(slot) => *slot = alert.clone(),
            None => alerts.push(alert.clone()),
        }
        Ok(alert)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Alert>> {
        let alerts = self.alerts.lock().await;
        Ok(alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn append_reporter(&self, id: Uuid, reporter: Reporter) -> Result<Alert> {
        let mut alerts = self.alerts.lock().await;
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            bail!("alert {id} not found");
        };
        if !alert.status.is_active() {
            bail!("alert {id} is no longer active");
        }
        if alert.has_reporter(&reporter.user_id) {
            bail!("user {} already reported alert {id}", reporter.user_id);
        }
        alert.reporters.push(reporter);
        alert.recount();
        Ok(alert.clone())
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: &[AlertStatus],
        update: StatusUpdate,
    ) -> Result<Option<Alert>> {
        let mut alerts = self.alerts.lock().await;
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if !from.contains(&alert.status) {
            return Ok(None);
        }
        alert.status = update.status;
        if let Some(ts) = update.response_time {
            alert.response_time = Some(ts);
        }
        if let Some(ts) = update.resolved_time {
            alert.resolved_time = Some(ts);
        }
        if let Some(note) = update.description {
            alert.description = note;
        }
        Ok(Some(alert.clone()))
    }

    async fn recent(&self, kind: Option<ServiceKind>, limit: u32) -> Result<Vec<Alert>> {
        let alerts = self.alerts.lock().await;
        let mut out: Vec<Alert> = alerts
            .iter()
            .filter(|a| !a.is_aggregated && kind.map_or(true, |k| a.kind == k))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn by_facility(
        &self,
        facility_id: Uuid,
        kind: Option<ServiceKind>,
        limit: u32,
    ) -> Result<Vec<Alert>> {
        let alerts = self.alerts.lock().await;
        let mut out: Vec<Alert> = alerts
            .iter()
            .filter(|a| a.facility_id == facility_id && kind.map_or(true, |k| a.kind == k))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit as usize);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// MemoryFacilityDirectory
// ---------------------------------------------------------------------------

/// Facility directory over a fixed Vec, insertion-ordered.
#[derive(Default)]
pub struct MemoryFacilityDirectory {
    facilities: Vec<Facility>,
}

impl MemoryFacilityDirectory {
    pub fn with(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }
}

#[async_trait]
impl FacilityDirectory for MemoryFacilityDirectory {
    async fn active_by_kind(&self, kind: ServiceKind) -> Result<Vec<Facility>> {
        Ok(self
            .facilities
            .iter()
            .filter(|f| f.kind == kind && f.active)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Facility>> {
        Ok(self.facilities.iter().find(|f| f.id == id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Push backends
// ---------------------------------------------------------------------------

/// Records every note it is asked to deliver.
#[derive(Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<(String, DispatchNote)>>,
}

impl RecordingPush {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(String, DispatchNote)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PushBackend for RecordingPush {
    async fn send(&self, channel_id: &str, note: &DispatchNote) -> Result<()> {
        self.sent
            .lock()
            .await
            .push((channel_id.to_string(), note.clone()));
        Ok(())
    }
}

/// Always fails; exercises the best-effort notification contract.
pub struct FailingPush;

#[async_trait]
impl PushBackend for FailingPush {
    async fn send(&self, _channel_id: &str, _note: &DispatchNote) -> Result<()> {
        bail!("push gateway unreachable")
    }
}
