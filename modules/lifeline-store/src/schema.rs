//! Schema DDL. Idempotent; binaries and tests run it at startup.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS facilities (
            id           UUID             PRIMARY KEY,
            kind         TEXT             NOT NULL,
            name         TEXT             NOT NULL,
            phone        TEXT             NOT NULL,
            lat          DOUBLE PRECISION NOT NULL,
            lng          DOUBLE PRECISION NOT NULL,
            address      TEXT,
            district     TEXT,
            push_channel TEXT,
            active       BOOLEAN          NOT NULL DEFAULT TRUE,
            created_at   TIMESTAMPTZ      NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS facilities_kind_active_idx ON facilities (kind, active)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id                UUID             PRIMARY KEY,
            kind              TEXT             NOT NULL,
            status            TEXT             NOT NULL,
            priority          TEXT             NOT NULL,
            lat               DOUBLE PRECISION NOT NULL,
            lng               DOUBLE PRECISION NOT NULL,
            description       TEXT             NOT NULL,
            facility_id       UUID             NOT NULL,
            facility_name     TEXT             NOT NULL,
            distance_km       DOUBLE PRECISION NOT NULL,
            reporters         JSONB            NOT NULL,
            report_count      INTEGER          NOT NULL,
            is_aggregated     BOOLEAN          NOT NULL DEFAULT FALSE,
            notification_sent BOOLEAN          NOT NULL DEFAULT FALSE,
            created_at        TIMESTAMPTZ      NOT NULL,
            response_time     TIMESTAMPTZ,
            resolved_time     TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The aggregation candidate query: kind + status + recency.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS alerts_kind_status_created_idx \
         ON alerts (kind, status, created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS alerts_facility_idx ON alerts (facility_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    info!("schema ready");
    Ok(())
}
