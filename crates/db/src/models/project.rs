//! Project entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use transit_core::bulk_import::TransformedAttributes;
use transit_core::types::{DbId, Timestamp};

/// A project row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub namespace_id: Option<DbId>,
    pub name: String,
    pub path: String,
    pub visibility_level: i32,
    pub import_type: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub namespace_id: Option<DbId>,
    pub name: String,
    pub path: String,
    /// Defaults to 0 (private) if omitted.
    pub visibility_level: Option<i32>,
    pub import_type: Option<String>,
    /// Defaults to `NOW()` if omitted.
    pub created_at: Option<Timestamp>,
}

impl From<&TransformedAttributes> for CreateProject {
    /// `created_at` is kept only when it is an RFC 3339 string; any other
    /// exported value falls back to the insert time.
    fn from(attrs: &TransformedAttributes) -> Self {
        let created_at = attrs
            .created_at
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));

        Self {
            namespace_id: attrs.namespace_id,
            name: attrs.name.clone(),
            path: attrs.path.clone(),
            visibility_level: attrs.visibility_level,
            import_type: Some(attrs.import_type.clone()),
            created_at,
        }
    }
}
