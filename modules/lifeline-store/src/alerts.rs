//! Alert records in Postgres.
//!
//! Reporters live in a JSONB column on the alert row, so appending a
//! reporter, recomputing the count, and guarding against duplicates is one
//! UPDATE statement. Status transitions are likewise single conditional
//! statements; concurrent writers cannot lose updates, the loser simply
//! matches no row.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use lifeline_common::{Alert, AlertStatus, GeoPoint, Priority, Reporter, ServiceKind};
use lifeline_engine::traits::{AlertStore, StatusUpdate};

const ALERT_COLUMNS: &str = "id, kind, status, priority, lat, lng, description, facility_id, \
     facility_name, distance_km, reporters, report_count, is_aggregated, notification_sent, \
     created_at, response_time, resolved_time";

#[derive(Clone)]
pub struct PgAlertStore {
    pool: PgPool,
}

impl PgAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn find_active_by_kind_since(
        &self,
        kind: ServiceKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE kind = $1 AND status IN ('pending', 'acknowledged') AND created_at >= $2
            ORDER BY created_at ASC
            "#,
        ))
        .bind(kind.to_string())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn save(&self, alert: Alert) -> Result<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            INSERT INTO alerts ({ALERT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                status            = EXCLUDED.status,
                description       = EXCLUDED.description,
                reporters         = EXCLUDED.reporters,
                report_count      = EXCLUDED.report_count,
                notification_sent = EXCLUDED.notification_sent,
                created_at        = EXCLUDED.created_at,
                response_time     = EXCLUDED.response_time,
                resolved_time     = EXCLUDED.resolved_time
            RETURNING {ALERT_COLUMNS}
            "#,
        ))
        .bind(alert.id)
        .bind(alert.kind.to_string())
        .bind(alert.status.to_string())
        .bind(alert.priority.to_string())
        .bind(alert.location.lat)
        .bind(alert.location.lng)
        .bind(&alert.description)
        .bind(alert.facility_id)
        .bind(&alert.facility_name)
        .bind(alert.distance_km)
        .bind(serde_json::to_value(&alert.reporters)?)
        .bind(alert.report_count as i32)
        .bind(alert.is_aggregated)
        .bind(alert.notification_sent)
        .bind(alert.created_at)
        .bind(alert.response_time)
        .bind(alert.resolved_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    async fn append_reporter(&self, id: Uuid, reporter: Reporter) -> Result<Alert> {
        let reporter_json = serde_json::to_value(&reporter)?;

        // Append, recount, and reject duplicates in one statement.
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            UPDATE alerts
            SET reporters    = reporters || jsonb_build_array($2::jsonb),
                report_count = jsonb_array_length(reporters || jsonb_build_array($2::jsonb))
            WHERE id = $1
              AND status IN ('pending', 'acknowledged')
              AND NOT EXISTS (
                  SELECT 1 FROM jsonb_array_elements(reporters) AS r
                  WHERE r->>'user_id' = $3
              )
            RETURNING {ALERT_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(&reporter_json)
        .bind(&reporter.user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.0),
            None => bail!(
                "alert {id} not eligible for reporter append (missing, closed, or duplicate reporter)"
            ),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: &[AlertStatus],
        update: StatusUpdate,
    ) -> Result<Option<Alert>> {
        let from_states: Vec<String> = from.iter().map(|s| s.to_string()).collect();

        let row = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            UPDATE alerts
            SET status        = $2,
                response_time = COALESCE($3, response_time),
                resolved_time = COALESCE($4, resolved_time),
                description   = COALESCE($5, description)
            WHERE id = $1 AND status = ANY($6)
            RETURNING {ALERT_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(update.status.to_string())
        .bind(update.response_time)
        .bind(update.resolved_time)
        .bind(update.description)
        .bind(from_states)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    async fn recent(&self, kind: Option<ServiceKind>, limit: u32) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE is_aggregated = FALSE AND ($1::TEXT IS NULL OR kind = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        ))
        .bind(kind.map(|k| k.to_string()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn by_facility(
        &self,
        facility_id: Uuid,
        kind: Option<ServiceKind>,
        limit: u32,
    ) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE facility_id = $1 AND ($2::TEXT IS NULL OR kind = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        ))
        .bind(facility_id)
        .bind(kind.map(|k| k.to_string()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Local wrapper so the domain type stays sqlx-free.
struct AlertRow(Alert);

fn decode_err(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for AlertRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let kind_raw: String = row.try_get("kind")?;
        let kind = ServiceKind::from_str_loose(&kind_raw)
            .ok_or_else(|| decode_err("kind", format!("unknown service kind {kind_raw}")))?;

        let status_raw: String = row.try_get("status")?;
        let status = AlertStatus::from_str_loose(&status_raw)
            .ok_or_else(|| decode_err("status", format!("unknown status {status_raw}")))?;

        let priority_raw: String = row.try_get("priority")?;
        let priority = Priority::from_str_loose(&priority_raw)
            .ok_or_else(|| decode_err("priority", format!("unknown priority {priority_raw}")))?;

        let reporters_raw: serde_json::Value = row.try_get("reporters")?;
        let reporters: Vec<Reporter> = serde_json::from_value(reporters_raw)
            .map_err(|e| decode_err("reporters", e.to_string()))?;

        Ok(AlertRow(Alert {
            id: row.try_get("id")?,
            kind,
            status,
            priority,
            location: GeoPoint {
                lat: row.try_get("lat")?,
                lng: row.try_get("lng")?,
            },
            description: row.try_get("description")?,
            facility_id: row.try_get("facility_id")?,
            facility_name: row.try_get("facility_name")?,
            distance_km: row.try_get("distance_km")?,
            reporters,
            report_count: row.try_get::<i32, _>("report_count")? as u32,
            is_aggregated: row.try_get("is_aggregated")?,
            notification_sent: row.try_get("notification_sent")?,
            created_at: row.try_get("created_at")?,
            response_time: row.try_get("response_time")?,
            resolved_time: row.try_get("resolved_time")?,
        }))
    }
}
