//! Repository for the `namespaces` table.

use sqlx::PgPool;
use transit_core::naming::SiblingField;
use transit_core::types::DbId;

use crate::models::namespace::{CreateNamespace, Namespace};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, parent_id, name, path, full_path, visibility_level, created_at, updated_at";

/// Provides lookups and inserts for namespaces.
pub struct NamespaceRepo;

impl NamespaceRepo {
    /// Insert a new namespace, returning the created row.
    ///
    /// `full_path` is the parent's full path joined with `path`, or just
    /// `path` for a top-level namespace.
    pub async fn create(pool: &PgPool, input: &CreateNamespace) -> Result<Namespace, sqlx::Error> {
        let query = format!(
            "INSERT INTO namespaces (parent_id, name, path, full_path, visibility_level)
             VALUES (
                $1, $2, $3,
                COALESCE((SELECT full_path || '/' FROM namespaces WHERE id = $1), '') || $3,
                COALESCE($4, 0)
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Namespace>(&query)
            .bind(input.parent_id)
            .bind(&input.name)
            .bind(&input.path)
            .bind(input.visibility_level)
            .fetch_one(pool)
            .await
    }

    /// Find a namespace by its full path (e.g. `"parent/child"`).
    pub async fn find_by_full_path(
        pool: &PgPool,
        full_path: &str,
    ) -> Result<Option<Namespace>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM namespaces WHERE full_path = $1");
        sqlx::query_as::<_, Namespace>(&query)
            .bind(full_path)
            .fetch_optional(pool)
            .await
    }

    /// Whether a direct child namespace of `parent_id` uses `value` for `field`.
    pub async fn child_exists(
        pool: &PgPool,
        parent_id: DbId,
        field: SiblingField,
        value: &str,
    ) -> Result<bool, sqlx::Error> {
        let column = field.as_str();
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM namespaces WHERE parent_id = $1 AND {column} = $2)"
        );
        let (exists,): (bool,) = sqlx::query_as(&query)
            .bind(parent_id)
            .bind(value)
            .fetch_one(pool)
            .await?;
        Ok(exists)
    }
}
