//! Database-backed [`DestinationLookup`].

use async_trait::async_trait;
use sqlx::PgPool;
use transit_core::error::CoreError;
use transit_core::naming::{DestinationLookup, DestinationNamespace, SiblingField};
use transit_core::types::DbId;

use crate::repositories::{NamespaceRepo, ProjectRepo};

/// Answers destination queries from PostgreSQL.
///
/// A sibling is a project inside the namespace or a direct child namespace.
/// Each call runs its own queries; nothing is cached.
#[derive(Debug, Clone)]
pub struct PgDestinationLookup {
    pool: PgPool,
}

impl PgDestinationLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DestinationLookup for PgDestinationLookup {
    async fn find_namespace(
        &self,
        full_path: &str,
    ) -> Result<Option<DestinationNamespace>, CoreError> {
        let namespace = NamespaceRepo::find_by_full_path(&self.pool, full_path)
            .await
            .map_err(|e| lookup_failed("namespace lookup", e))?;
        Ok(namespace.map(|ns| ns.to_destination()))
    }

    async fn sibling_exists(
        &self,
        namespace_id: DbId,
        field: SiblingField,
        value: &str,
    ) -> Result<bool, CoreError> {
        let project = ProjectRepo::exists_in_namespace(&self.pool, namespace_id, field, value)
            .await
            .map_err(|e| lookup_failed("project sibling check", e))?;
        if project {
            tracing::debug!(namespace_id, %field, value, "Sibling project exists");
            return Ok(true);
        }

        let group = NamespaceRepo::child_exists(&self.pool, namespace_id, field, value)
            .await
            .map_err(|e| lookup_failed("group sibling check", e))?;
        if group {
            tracing::debug!(namespace_id, %field, value, "Sibling group exists");
        }
        Ok(group)
    }
}

fn lookup_failed(what: &str, err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Destination {what} failed");
    CoreError::Internal(format!("{what} failed: {err}"))
}
