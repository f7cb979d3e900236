//! Bulk import entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use transit_core::bulk_import::{ImportEntity, SourceType};
use transit_core::error::CoreError;
use transit_core::types::{DbId, Timestamp};

/// A row from the `bulk_import_entities` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulkImportEntity {
    pub id: DbId,
    pub source_type: String,
    pub source_full_path: String,
    pub destination_slug: String,
    pub destination_namespace: String,
    pub source_attributes: serde_json::Value,
    pub status: String,
    pub project_id: Option<DbId>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BulkImportEntity {
    /// Convert the row into the core import entity.
    ///
    /// Fails when `source_type` is unknown or `source_attributes` is not a
    /// JSON object.
    pub fn to_import_entity(&self) -> Result<ImportEntity, CoreError> {
        let source_type = SourceType::from_str(&self.source_type).ok_or_else(|| {
            CoreError::Validation(format!(
                "Unknown source type '{}' on import entity {}",
                self.source_type, self.id
            ))
        })?;
        let source_attributes = self
            .source_attributes
            .as_object()
            .cloned()
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Source attributes of import entity {} must be a JSON object",
                    self.id
                ))
            })?;

        Ok(ImportEntity {
            id: self.id,
            source_type,
            source_full_path: self.source_full_path.clone(),
            destination_slug: self.destination_slug.clone(),
            destination_namespace: self.destination_namespace.clone(),
            source_attributes,
        })
    }
}

/// DTO for queueing an entity for import.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBulkImportEntity {
    pub source_type: String,
    pub source_full_path: String,
    pub destination_slug: String,
    /// Defaults to blank (no destination namespace).
    pub destination_namespace: Option<String>,
    pub source_attributes: Option<serde_json::Value>,
}
