//! Project import loop.
//!
//! Claims queued project entities, resolves their destination name and
//! path, creates the project and records the outcome on the entity row.
//! The project insert and the `finished` update commit in one transaction.
//!
//! Name resolution and creation are not atomic. When another import takes
//! the same name or path in between, the insert hits a `uq_` constraint and
//! the entity is re-resolved with fresh queries, up to
//! `max_create_attempts` times.
//!
//! Only project rows carry those constraints. A child group created
//! concurrently with the same name or path as a resolved project is not
//! detected, even though resolution treats groups as siblings.
//!
//! Entities whose worker died or could not record an outcome stay
//! `started` until `stale_after` elapses, then are claimed again.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use transit_core::bulk_import::ProjectAttributesTransformer;
use transit_core::error::CoreError;
use transit_core::naming::DestinationLookup;
use transit_db::models::bulk_import_entity::BulkImportEntity;
use transit_db::models::project::{CreateProject, Project};
use transit_db::repositories::{BulkImportEntityRepo, ProjectRepo};
use transit_db::PgDestinationLookup;

use crate::config::{WorkerConfig, DEFAULT_STALE_AFTER_SECS};
use crate::error::WorkerResult;

/// Per-batch counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub claimed: usize,
    pub finished: usize,
    pub failed: usize,
}

/// Imports project entities into the destination database.
pub struct ProjectImporter<L = PgDestinationLookup> {
    pool: PgPool,
    lookup: L,
    transformer: ProjectAttributesTransformer,
    max_create_attempts: u32,
    stale_after: Duration,
}

impl ProjectImporter<PgDestinationLookup> {
    /// Importer resolving names against the same database it writes to.
    pub fn new(pool: PgPool, max_create_attempts: u32) -> Self {
        let lookup = PgDestinationLookup::new(pool.clone());
        Self::with_lookup(pool, lookup, max_create_attempts)
    }
}

impl<L: DestinationLookup> ProjectImporter<L> {
    pub fn with_lookup(pool: PgPool, lookup: L, max_create_attempts: u32) -> Self {
        Self {
            pool,
            lookup,
            transformer: ProjectAttributesTransformer::new(),
            max_create_attempts: max_create_attempts.max(1),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        }
    }

    /// Replace the attribute transformer (e.g. to lower the suffix cap).
    pub fn with_transformer(mut self, transformer: ProjectAttributesTransformer) -> Self {
        self.transformer = transformer;
        self
    }

    /// How long a `started` entity may go without an update before it is
    /// claimed again.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Transform and create the project for one entity, marking the entity
    /// finished in the same transaction.
    ///
    /// Fails with `Conflict` when the entity is no longer `started` (another
    /// worker reclaimed and finished it); nothing is committed then.
    pub async fn import_entity(&self, row: &BulkImportEntity) -> WorkerResult<Project> {
        let entity = row.to_import_entity()?;
        let mut attempt = 1;

        loop {
            let attrs = self.transformer.transform(&self.lookup, &entity).await?;
            tracing::debug!(
                entity_id = entity.id,
                namespace_id = ?attrs.namespace_id,
                name = %attrs.name,
                path = %attrs.path,
                attempt,
                "Resolved destination attributes",
            );

            let mut tx = self.pool.begin().await?;
            match ProjectRepo::create(&mut *tx, &CreateProject::from(&attrs)).await {
                Ok(project) => {
                    if !BulkImportEntityRepo::mark_finished(&mut *tx, row.id, project.id).await? {
                        return Err(CoreError::Conflict(format!(
                            "Import entity {} is no longer started",
                            row.id
                        ))
                        .into());
                    }
                    tx.commit().await?;
                    return Ok(project);
                }
                Err(e) if transit_db::is_unique_violation(&e) => {
                    if attempt >= self.max_create_attempts {
                        return Err(CoreError::Conflict(format!(
                            "Name '{}' or path '{}' was taken concurrently {attempt} times",
                            attrs.name, attrs.path
                        ))
                        .into());
                    }
                    tracing::warn!(
                        entity_id = entity.id,
                        attempt,
                        error = %e,
                        "Lost creation race, re-resolving",
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Import one claimed entity and record the outcome on its row.
    ///
    /// Import failures are recorded, not returned. Only a failure to write
    /// the outcome itself is an error.
    pub async fn process(&self, row: &BulkImportEntity) -> Result<bool, sqlx::Error> {
        match self.import_entity(row).await {
            Ok(project) => {
                tracing::info!(
                    entity_id = row.id,
                    project_id = project.id,
                    source_full_path = %row.source_full_path,
                    "Project imported",
                );
                Ok(true)
            }
            Err(e) => {
                tracing::error!(
                    entity_id = row.id,
                    source_full_path = %row.source_full_path,
                    error = %e,
                    "Project import failed",
                );
                BulkImportEntityRepo::mark_failed(&self.pool, row.id, &e.to_string()).await?;
                Ok(false)
            }
        }
    }

    /// Claim up to `limit` entities and process them one at a time.
    ///
    /// An entity whose outcome cannot be written is counted as failed and
    /// left `started` for a later reclaim; the rest of the batch still runs.
    pub async fn run_batch(&self, limit: i64) -> Result<BatchSummary, sqlx::Error> {
        let rows = BulkImportEntityRepo::claim_pending(&self.pool, limit, self.stale_after).await?;
        let mut summary = BatchSummary {
            claimed: rows.len(),
            ..BatchSummary::default()
        };

        for row in &rows {
            match self.process(row).await {
                Ok(true) => summary.finished += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    tracing::error!(
                        entity_id = row.id,
                        error = %e,
                        "Could not record import outcome, leaving entity for reclaim",
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Run the import loop until `cancel` is triggered.
///
/// Polls every `config.poll_interval` (at least one second). A batch in
/// progress is finished before the loop observes cancellation.
pub async fn run<L: DestinationLookup>(
    importer: ProjectImporter<L>,
    config: WorkerConfig,
    cancel: CancellationToken,
) {
    let period = config.poll_interval.max(Duration::from_secs(1));
    tracing::info!(
        batch_size = config.batch_size,
        interval_secs = period.as_secs(),
        max_create_attempts = config.max_create_attempts,
        stale_after_secs = config.stale_after.as_secs(),
        "Project import loop started",
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Project import loop stopping");
                break;
            }
            _ = interval.tick() => {
                match importer.run_batch(config.batch_size).await {
                    Ok(summary) if summary.claimed > 0 => {
                        tracing::info!(
                            claimed = summary.claimed,
                            finished = summary.finished,
                            failed = summary.failed,
                            "Import batch complete",
                        );
                    }
                    Ok(_) => tracing::debug!("No queued import entities"),
                    Err(e) => tracing::error!(error = %e, "Import batch failed"),
                }
            }
        }
    }
}
