//! `SQLite` implementation of [`EntityStore`].

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use unictl_app::ports::EntityStore;
use unictl_domain::entity::{Entity, EntityStatus};
use unictl_domain::error::UnictlError;
use unictl_domain::id::EntityId;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(Entity);

fn decode<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    Ok(DateTime::parse_from_rfc3339(value).map_err(decode)?.to_utc())
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let last_execution_at: Option<String> = row.try_get("last_execution_at")?;
        let last_duration: Option<i64> = row.try_get("last_execution_duration_ms")?;
        let last_result: String = row.try_get("last_result")?;
        let execution_count: i64 = row.try_get("execution_count")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let id = EntityId::parse(id).map_err(decode)?;
        let status: EntityStatus =
            serde_json::from_value(serde_json::Value::String(status)).map_err(decode)?;
        let last_result: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&last_result).map_err(decode)?;

        Ok(Self(Entity {
            id,
            name: row.try_get("name")?,
            script_code: row.try_get("script_code")?,
            html_template: row.try_get("html_template")?,
            css_styles: row.try_get("css_styles")?,
            interval_seconds: row.try_get("interval_seconds")?,
            enabled: row.try_get("enabled")?,
            status,
            last_execution_at: last_execution_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            last_execution_duration_ms: last_duration
                .map(u64::try_from)
                .transpose()
                .map_err(decode)?,
            last_error: row.try_get("last_error")?,
            last_result,
            execution_count: u64::try_from(execution_count).map_err(decode)?,
            consecutive_failures: row.try_get("consecutive_failures")?,
            disabled_after_failures: row.try_get("disabled_after_failures")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO entities (
        id, name, script_code, html_template, css_styles, interval_seconds, enabled,
        status, last_execution_at, last_execution_duration_ms, last_error, last_result,
        execution_count, consecutive_failures, disabled_after_failures, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        name = excluded.name,
        script_code = excluded.script_code,
        html_template = excluded.html_template,
        css_styles = excluded.css_styles,
        interval_seconds = excluded.interval_seconds,
        enabled = excluded.enabled,
        status = excluded.status,
        last_execution_at = excluded.last_execution_at,
        last_execution_duration_ms = excluded.last_execution_duration_ms,
        last_error = excluded.last_error,
        last_result = excluded.last_result,
        execution_count = excluded.execution_count,
        consecutive_failures = excluded.consecutive_failures,
        disabled_after_failures = excluded.disabled_after_failures,
        updated_at = excluded.updated_at
";

const SELECT_BY_ID: &str = "SELECT * FROM entities WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM entities ORDER BY created_at, name";
const DELETE_BY_ID: &str = "DELETE FROM entities WHERE id = ?";

/// `SQLite`-backed entity store.
#[derive(Clone)]
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl EntityStore for SqliteEntityStore {
    async fn load(&self, id: &EntityId) -> Result<Option<Entity>, UnictlError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn save(&self, entity: Entity) -> Result<Entity, UnictlError> {
        let last_result = serde_json::to_string(&entity.last_result).map_err(StorageError::from)?;

        sqlx::query(UPSERT)
            .bind(entity.id.as_str())
            .bind(&entity.name)
            .bind(&entity.script_code)
            .bind(&entity.html_template)
            .bind(&entity.css_styles)
            .bind(entity.interval_seconds)
            .bind(entity.enabled)
            .bind(entity.status.to_string())
            .bind(entity.last_execution_at.map(|ts| ts.to_rfc3339()))
            .bind(entity.last_execution_duration_ms.map(saturating_i64))
            .bind(&entity.last_error)
            .bind(&last_result)
            .bind(saturating_i64(entity.execution_count))
            .bind(entity.consecutive_failures)
            .bind(entity.disabled_after_failures)
            .bind(entity.created_at.to_rfc3339())
            .bind(entity.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(entity)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), UnictlError> {
        sqlx::query(DELETE_BY_ID)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Entity>, UnictlError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
