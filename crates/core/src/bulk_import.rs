//! Core types and the attribute transformer for project bulk imports.
//!
//! An [`ImportEntity`] describes one project exported from a source
//! instance together with where it should land. The
//! [`ProjectAttributesTransformer`] turns it into the fixed set of
//! attributes used to create the destination project:
//!
//! - `name` and `path`, made unique inside the destination namespace
//! - `namespace_id`, only when a destination namespace was given
//! - `import_type`, always [`PROJECT_IMPORT_TYPE`]
//! - `visibility_level`, only when the exported visibility is known
//! - `created_at`, passed through when exported
//!
//! Any other exported attribute is dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::naming::{
    derive_path, resolve_unique, DestinationLookup, DestinationNamespace, SiblingField,
    MAX_SUFFIX_ATTEMPTS,
};
use crate::types::DbId;
use crate::visibility::VisibilityLevel;

// ── Constants ────────────────────────────────────────────────────────

/// Import-origin marker stored on projects created by a bulk import.
pub const PROJECT_IMPORT_TYPE: &str = "gitlab_project_migration";

/// Exported attribute holding the visibility string.
const VISIBILITY_KEY: &str = "visibility";

/// Exported attribute holding the creation timestamp.
const CREATED_AT_KEY: &str = "created_at";

// ── Source type ──────────────────────────────────────────────────────

/// Kind of entity exported from the source instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    GroupEntity,
    ProjectEntity,
}

impl SourceType {
    /// Return the source type name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GroupEntity => "group_entity",
            Self::ProjectEntity => "project_entity",
        }
    }

    /// Parse a source type string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "group_entity" => Some(Self::GroupEntity),
            "project_entity" => Some(Self::ProjectEntity),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Entity status ────────────────────────────────────────────────────

/// Lifecycle of a single import entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportEntityStatus {
    Created,
    Started,
    Finished,
    Failed,
}

impl ImportEntityStatus {
    /// Return the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ImportEntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Types ────────────────────────────────────────────────────────────

/// One exported entity and its requested destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEntity {
    pub id: DbId,
    pub source_type: SourceType,
    /// Full path on the source instance (e.g. "source/full/path").
    pub source_full_path: String,
    /// Requested name; the path is derived from it.
    pub destination_slug: String,
    /// Full path of the destination namespace. Blank means none.
    pub destination_namespace: String,
    /// Raw exported attributes.
    pub source_attributes: Map<String, Value>,
}

impl ImportEntity {
    /// Destination namespace full path, or `None` when blank.
    pub fn destination_namespace_path(&self) -> Option<&str> {
        let trimmed = self.destination_namespace.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Attributes for creating the destination project.
///
/// Optional fields are omitted from the serialized form rather than
/// written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformedAttributes {
    pub name: String,
    pub path: String,
    pub import_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
}

// ── Transformer ──────────────────────────────────────────────────────

/// Builds [`TransformedAttributes`] for project entities.
#[derive(Debug, Clone, Copy)]
pub struct ProjectAttributesTransformer {
    max_suffix_attempts: u32,
}

impl Default for ProjectAttributesTransformer {
    fn default() -> Self {
        Self {
            max_suffix_attempts: MAX_SUFFIX_ATTEMPTS,
        }
    }
}

impl ProjectAttributesTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the `_N` suffix cap.
    pub fn with_max_suffix_attempts(mut self, max_suffix_attempts: u32) -> Self {
        self.max_suffix_attempts = max_suffix_attempts;
        self
    }

    /// Transform `entity` into creation attributes.
    ///
    /// Issues read-only queries through `lookup`: one namespace lookup when a
    /// destination is given, then one sibling check per name and path
    /// candidate. Persists nothing.
    pub async fn transform<L>(
        &self,
        lookup: &L,
        entity: &ImportEntity,
    ) -> Result<TransformedAttributes, CoreError>
    where
        L: DestinationLookup + ?Sized,
    {
        if entity.source_type != SourceType::ProjectEntity {
            return Err(CoreError::Validation(format!(
                "Entity {} is a {}, expected {}",
                entity.id,
                entity.source_type,
                SourceType::ProjectEntity
            )));
        }

        let namespace = match entity.destination_namespace_path() {
            Some(full_path) => Some(lookup.find_namespace(full_path).await?.ok_or_else(|| {
                CoreError::Validation(format!(
                    "Destination namespace '{full_path}' does not exist"
                ))
            })?),
            None => None,
        };
        let namespace_id = namespace.as_ref().map(|ns| ns.id);

        let derived_path = derive_path(&entity.destination_slug);
        if derived_path.is_empty() {
            return Err(CoreError::Validation(format!(
                "Destination slug '{}' contains no path-safe characters",
                entity.destination_slug
            )));
        }

        let name = resolve_unique(
            lookup,
            namespace_id,
            SiblingField::Name,
            &entity.destination_slug,
            self.max_suffix_attempts,
        )
        .await?;
        let path = resolve_unique(
            lookup,
            namespace_id,
            SiblingField::Path,
            &derived_path,
            self.max_suffix_attempts,
        )
        .await?;

        Ok(TransformedAttributes {
            name,
            path,
            import_type: PROJECT_IMPORT_TYPE.to_string(),
            namespace_id,
            visibility_level: visibility_level(&entity.source_attributes, namespace.as_ref()),
            created_at: entity.source_attributes.get(CREATED_AT_KEY).cloned(),
        })
    }
}

/// Map the exported visibility string to a level, capped to the namespace.
///
/// Unknown or non-string values yield `None` so the caller's default applies.
fn visibility_level(
    attributes: &Map<String, Value>,
    namespace: Option<&DestinationNamespace>,
) -> Option<i32> {
    let requested = attributes
        .get(VISIBILITY_KEY)
        .and_then(Value::as_str)
        .and_then(VisibilityLevel::from_str)?;

    let allowed = match namespace {
        Some(ns) => requested.capped_to(ns.visibility_level),
        None => requested,
    };
    Some(allowed.level())
}
