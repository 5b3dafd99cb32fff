//! Seams to the persistence collaborators. The engines only know these
//! traits; Postgres implementations live in `lifeline-store`, in-memory
//! implementations in `testutil`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use lifeline_common::{Alert, AlertStatus, Facility, GeoPoint, Reporter, ServiceKind};

/// Fields applied by one status transition. Applied as a single conditional
/// write; `None` fields are left untouched.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: AlertStatus,
    pub response_time: Option<DateTime<Utc>>,
    pub resolved_time: Option<DateTime<Utc>>,
    /// Resolution note. Overwrites the alert description when set.
    pub description: Option<String>,
}

/// Owns Alert records. Mutations (`append_reporter`, `update_status`) must
/// each be a single atomic store operation so concurrent acknowledge,
/// resolve, and merge calls targeting the same alert cannot lose updates.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Active (pending or acknowledged) alerts of one kind created at or
    /// after `since`, oldest first. The aggregation candidate set.
    async fn find_active_by_kind_since(
        &self,
        kind: ServiceKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<Alert>>;

    /// Insert, or replace an existing record with the same id.
    async fn save(&self, alert: Alert) -> Result<Alert>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Alert>>;

    /// Append a reporter and recompute `report_count` in the same write.
    /// Fails if the alert is gone, no longer active, or already carries a
    /// reporter with the same `user_id`.
    async fn append_reporter(&self, id: Uuid, reporter: Reporter) -> Result<Alert>;

    /// Conditional status update: applies `update` only while the alert's
    /// current status is one of `from`. Returns `None` when no row matched,
    /// either because the id is unknown or the guard failed; the caller
    /// re-reads to tell the two apart.
    async fn update_status(
        &self,
        id: Uuid,
        from: &[AlertStatus],
        update: StatusUpdate,
    ) -> Result<Option<Alert>>;

    /// Root alerts, newest first, optionally filtered by kind.
    async fn recent(&self, kind: Option<ServiceKind>, limit: u32) -> Result<Vec<Alert>>;

    /// Alerts dispatched to one facility, newest first.
    async fn by_facility(
        &self,
        facility_id: Uuid,
        kind: Option<ServiceKind>,
        limit: u32,
    ) -> Result<Vec<Alert>>;
}

/// Owns Facility records. Read-mostly: registration and deactivation happen
/// on the store side, outside the engines.
#[async_trait]
pub trait FacilityDirectory: Send + Sync {
    async fn active_by_kind(&self, kind: ServiceKind) -> Result<Vec<Facility>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Facility>>;

    /// Nearest-K active facilities by linear Haversine scan, ascending
    /// distance in km. The scan is deliberate: fleets are tens to low
    /// hundreds of facilities, and keeping it behind this trait means a
    /// spatial index can replace it without touching the engines.
    async fn nearest(
        &self,
        kind: ServiceKind,
        origin: GeoPoint,
        k: usize,
    ) -> Result<Vec<(Facility, f64)>> {
        let mut ranked: Vec<(Facility, f64)> = self
            .active_by_kind(kind)
            .await?
            .into_iter()
            .map(|f| {
                let km = origin.distance_km(&f.location);
                (f, km)
            })
            .collect();

        // Stable sort: exact distance ties keep scan order, so the first
        // facility encountered wins.
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        Ok(ranked)
    }
}
