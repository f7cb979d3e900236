//! Namespace (group) model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use transit_core::naming::DestinationNamespace;
use transit_core::types::{DbId, Timestamp};
use transit_core::visibility::VisibilityLevel;

/// A row from the `namespaces` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Namespace {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub name: String,
    pub path: String,
    pub full_path: String,
    pub visibility_level: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Namespace {
    /// View as an import destination.
    ///
    /// The column is constrained to known levels; anything else is treated
    /// as private so imported projects never end up more visible.
    pub fn to_destination(&self) -> DestinationNamespace {
        DestinationNamespace {
            id: self.id,
            full_path: self.full_path.clone(),
            visibility_level: VisibilityLevel::from_level(self.visibility_level)
                .unwrap_or(VisibilityLevel::Private),
        }
    }
}

/// DTO for creating a namespace. `full_path` is computed from the parent.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNamespace {
    pub parent_id: Option<DbId>,
    pub name: String,
    pub path: String,
    /// Defaults to 0 (private) if omitted.
    pub visibility_level: Option<i32>,
}
