//! Repository for the `bulk_import_entities` table.

use std::time::Duration;

use sqlx::{PgExecutor, PgPool};
use transit_core::bulk_import::{ImportEntityStatus, SourceType};
use transit_core::types::DbId;

use crate::models::bulk_import_entity::{BulkImportEntity, CreateBulkImportEntity};

/// Column list for bulk_import_entities queries.
const COLUMNS: &str = "id, source_type, source_full_path, destination_slug, \
    destination_namespace, source_attributes, status, project_id, failure_reason, \
    created_at, updated_at";

/// Provides queueing and status transitions for import entities.
pub struct BulkImportEntityRepo;

impl BulkImportEntityRepo {
    /// Queue an entity, returning the created row in status `created`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateBulkImportEntity,
    ) -> Result<BulkImportEntity, sqlx::Error> {
        let destination_namespace = input.destination_namespace.clone().unwrap_or_default();
        let source_attributes = input
            .source_attributes
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        let query = format!(
            "INSERT INTO bulk_import_entities
                (source_type, source_full_path, destination_slug, destination_namespace,
                 source_attributes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BulkImportEntity>(&query)
            .bind(&input.source_type)
            .bind(&input.source_full_path)
            .bind(&input.destination_slug)
            .bind(&destination_namespace)
            .bind(&source_attributes)
            .fetch_one(pool)
            .await
    }

    /// Find an entity by its internal ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<BulkImportEntity>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bulk_import_entities WHERE id = $1");
        sqlx::query_as::<_, BulkImportEntity>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically move up to `limit` claimable project entities to
    /// `started` and return them ordered by ID.
    ///
    /// Claimable means queued, or `started` with no update for longer than
    /// `stale_after` (its worker died or gave up). Claiming refreshes
    /// `updated_at`. Rows locked by another worker are skipped, so
    /// concurrent workers never claim the same entity.
    pub async fn claim_pending(
        pool: &PgPool,
        limit: i64,
        stale_after: Duration,
    ) -> Result<Vec<BulkImportEntity>, sqlx::Error> {
        let query = format!(
            "UPDATE bulk_import_entities SET status = $1
             WHERE id IN (
                SELECT id FROM bulk_import_entities
                WHERE source_type = $3
                  AND (status = $2
                       OR (status = $1 AND updated_at < NOW() - make_interval(secs => $5)))
                ORDER BY id ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
             )
             RETURNING {COLUMNS}"
        );
        let mut rows = sqlx::query_as::<_, BulkImportEntity>(&query)
            .bind(ImportEntityStatus::Started.as_str())
            .bind(ImportEntityStatus::Created.as_str())
            .bind(SourceType::ProjectEntity.as_str())
            .bind(limit)
            .bind(stale_after.as_secs_f64())
            .fetch_all(pool)
            .await?;
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    /// Mark a started entity finished. Returns `true` if the row was updated.
    ///
    /// Accepts a transaction so the project insert and this update commit
    /// together.
    pub async fn mark_finished<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        project_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_import_entities
             SET status = $2, project_id = $3, failure_reason = NULL
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(ImportEntityStatus::Finished.as_str())
        .bind(project_id)
        .bind(ImportEntityStatus::Started.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a started entity failed. Returns `true` if the row was updated.
    pub async fn mark_failed(pool: &PgPool, id: DbId, reason: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_import_entities
             SET status = $2, failure_reason = $3
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(ImportEntityStatus::Failed.as_str())
        .bind(reason)
        .bind(ImportEntityStatus::Started.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count entities grouped by status.
    ///
    /// Returns tuples of (status, count).
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>, sqlx::Error> {
        let rows: Vec<StatusCount> = sqlx::query_as(
            "SELECT status, COUNT(*) as count FROM bulk_import_entities
             GROUP BY status
             ORDER BY status",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| (r.status, r.count)).collect())
    }
}

/// Helper struct for the count_by_status query.
#[derive(sqlx::FromRow)]
struct StatusCount {
    status: String,
    count: i64,
}
