//! Repository for the `projects` table.

use sqlx::{PgExecutor, PgPool};
use transit_core::naming::SiblingField;
use transit_core::types::DbId;

use crate::models::project::{CreateProject, Project};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, namespace_id, name, path, visibility_level, import_type, created_at, updated_at";

/// Provides create and lookup operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project, returning the created row.
    ///
    /// Fails with a unique violation (`uq_projects_namespace_name` or
    /// `uq_projects_namespace_path`) when a sibling already took the name
    /// or path. Accepts a pool or an open transaction.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (namespace_id, name, path, visibility_level, import_type, created_at)
             VALUES ($1, $2, $3, COALESCE($4, 0), $5, COALESCE($6, NOW()))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(input.namespace_id)
            .bind(&input.name)
            .bind(&input.path)
            .bind(input.visibility_level)
            .bind(&input.import_type)
            .bind(input.created_at)
            .fetch_one(executor)
            .await
    }

    /// Find a project by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List projects directly inside a namespace, ordered by ID.
    pub async fn list_by_namespace(
        pool: &PgPool,
        namespace_id: DbId,
    ) -> Result<Vec<Project>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM projects WHERE namespace_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, Project>(&query)
            .bind(namespace_id)
            .fetch_all(pool)
            .await
    }

    /// Whether a project in `namespace_id` uses `value` for `field`.
    pub async fn exists_in_namespace(
        pool: &PgPool,
        namespace_id: DbId,
        field: SiblingField,
        value: &str,
    ) -> Result<bool, sqlx::Error> {
        let column = field.as_str();
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE namespace_id = $1 AND {column} = $2)"
        );
        let (exists,): (bool,) = sqlx::query_as(&query)
            .bind(namespace_id)
            .bind(value)
            .fetch_one(pool)
            .await?;
        Ok(exists)
    }
}
