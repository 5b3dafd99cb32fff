//! Facility records in Postgres.
//!
//! Registration, push-channel rotation, and deactivation are store-side
//! operations driven by the facility-management surface; the engines only
//! read through the `FacilityDirectory` trait.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use lifeline_common::{Facility, GeoPoint, ServiceKind};
use lifeline_engine::traits::FacilityDirectory;

const FACILITY_COLUMNS: &str =
    "id, kind, name, phone, lat, lng, address, district, push_channel, active, created_at";

#[derive(Clone)]
pub struct PgFacilityDirectory {
    pool: PgPool,
}

impl PgFacilityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a facility, or update its details if the id already exists.
    pub async fn register(&self, facility: Facility) -> Result<Facility> {
        let row = sqlx::query_as::<_, FacilityRow>(&format!(
            r#"
            INSERT INTO facilities ({FACILITY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name         = EXCLUDED.name,
                phone        = EXCLUDED.phone,
                lat          = EXCLUDED.lat,
                lng          = EXCLUDED.lng,
                address      = EXCLUDED.address,
                district     = EXCLUDED.district,
                push_channel = EXCLUDED.push_channel,
                active       = EXCLUDED.active
            RETURNING {FACILITY_COLUMNS}
            "#,
        ))
        .bind(facility.id)
        .bind(facility.kind.to_string())
        .bind(&facility.name)
        .bind(&facility.phone)
        .bind(facility.location.lat)
        .bind(facility.location.lng)
        .bind(&facility.address)
        .bind(&facility.district)
        .bind(&facility.push_channel)
        .bind(facility.active)
        .bind(facility.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Rotate or clear the facility's push channel.
    pub async fn set_push_channel(
        &self,
        id: Uuid,
        channel: Option<String>,
    ) -> Result<Option<Facility>> {
        let row = sqlx::query_as::<_, FacilityRow>(&format!(
            "UPDATE facilities SET push_channel = $2 WHERE id = $1 RETURNING {FACILITY_COLUMNS}",
        ))
        .bind(id)
        .bind(channel)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    /// Soft-deactivate: the facility stays on record but drops out of
    /// nearest-search.
    pub async fn deactivate(&self, id: Uuid) -> Result<Option<Facility>> {
        let row = sqlx::query_as::<_, FacilityRow>(&format!(
            "UPDATE facilities SET active = FALSE WHERE id = $1 RETURNING {FACILITY_COLUMNS}",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }
}

#[async_trait]
impl FacilityDirectory for PgFacilityDirectory {
    async fn active_by_kind(&self, kind: ServiceKind) -> Result<Vec<Facility>> {
        let rows = sqlx::query_as::<_, FacilityRow>(&format!(
            r#"
            SELECT {FACILITY_COLUMNS}
            FROM facilities
            WHERE kind = $1 AND active = TRUE
            ORDER BY created_at ASC
            "#,
        ))
        .bind(kind.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Facility>> {
        let row = sqlx::query_as::<_, FacilityRow>(&format!(
            "SELECT {FACILITY_COLUMNS} FROM facilities WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }
}

/// Local wrapper so the domain type stays sqlx-free.
struct FacilityRow(Facility);

impl<'r> sqlx::FromRow<'r, PgRow> for FacilityRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let kind_raw: String = row.try_get("kind")?;
        let kind = ServiceKind::from_str_loose(&kind_raw).ok_or_else(|| {
            sqlx::Error::ColumnDecode {
                index: "kind".to_string(),
                source: format!("unknown service kind {kind_raw}").into(),
            }
        })?;

        Ok(FacilityRow(Facility {
            id: row.try_get("id")?,
            kind,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            location: GeoPoint {
                lat: row.try_get("lat")?,
                lng: row.try_get("lng")?,
            },
            address: row.try_get("address")?,
            district: row.try_get("district")?,
            push_channel: row.try_get("push_channel")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}
