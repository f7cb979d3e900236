//! Integration tests for the project import loop.
//!
//! Exercises claim -> transform -> create -> record against a real database:
//! - Name and path collisions resolved with `_N` suffixes
//! - Blank destination namespace
//! - Failures recorded on the entity row
//! - Re-resolution after losing the creation race
//! - Reclaim of entities abandoned in `started`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use transit_core::bulk_import::{ProjectAttributesTransformer, PROJECT_IMPORT_TYPE};
use transit_core::error::CoreError;
use transit_core::naming::{DestinationLookup, DestinationNamespace, SiblingField};
use transit_db::models::bulk_import_entity::CreateBulkImportEntity;
use transit_db::models::namespace::CreateNamespace;
use transit_db::models::project::CreateProject;
use transit_db::repositories::{BulkImportEntityRepo, NamespaceRepo, ProjectRepo};
use transit_db::PgDestinationLookup;
use transit_worker::config::WorkerConfig;
use transit_worker::error::WorkerError;
use transit_worker::importer::{self, BatchSummary, ProjectImporter};

const STALE_AFTER: Duration = Duration::from_secs(600);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn destination_group(pool: &PgPool, visibility_level: i32) -> i64 {
    NamespaceRepo::create(
        pool,
        &CreateNamespace {
            parent_id: None,
            name: "Destination Group".to_string(),
            path: "destination-group".to_string(),
            visibility_level: Some(visibility_level),
        },
    )
    .await
    .unwrap()
    .id
}

async fn existing_project(pool: &PgPool, namespace_id: i64, name: &str, path: &str) {
    ProjectRepo::create(
        pool,
        &CreateProject {
            namespace_id: Some(namespace_id),
            name: name.to_string(),
            path: path.to_string(),
            visibility_level: None,
            import_type: None,
            created_at: None,
        },
    )
    .await
    .unwrap();
}

async fn queue(pool: &PgPool, slug: &str, namespace: &str) -> i64 {
    BulkImportEntityRepo::create(
        pool,
        &CreateBulkImportEntity {
            source_type: "project_entity".to_string(),
            source_full_path: "source/full/path".to_string(),
            destination_slug: slug.to_string(),
            destination_namespace: Some(namespace.to_string()),
            source_attributes: Some(json!({
                "visibility": "private",
                "created_at": "2016-11-18T09:29:42.634Z",
                "my_key": "my_key",
            })),
        },
    )
    .await
    .unwrap()
    .id
}

/// Reports taken names as free a fixed number of times, standing in for a
/// concurrent import that wins the race between resolution and insert.
struct StaleNameLookup {
    inner: PgDestinationLookup,
    stale_answers: AtomicUsize,
}

impl StaleNameLookup {
    fn new(pool: &PgPool, stale_answers: usize) -> Self {
        Self {
            inner: PgDestinationLookup::new(pool.clone()),
            stale_answers: AtomicUsize::new(stale_answers),
        }
    }
}

#[async_trait]
impl DestinationLookup for StaleNameLookup {
    async fn find_namespace(
        &self,
        full_path: &str,
    ) -> Result<Option<DestinationNamespace>, CoreError> {
        self.inner.find_namespace(full_path).await
    }

    async fn sibling_exists(
        &self,
        namespace_id: i64,
        field: SiblingField,
        value: &str,
    ) -> Result<bool, CoreError> {
        let exists = self.inner.sibling_exists(namespace_id, field, value).await?;
        if exists && field == SiblingField::Name {
            let stale = self
                .stale_answers
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale {
                return Ok(false);
            }
        }
        Ok(exists)
    }
}

fn worker_config(poll_interval: Duration) -> WorkerConfig {
    WorkerConfig {
        database_url: String::new(),
        max_connections: 1,
        poll_interval,
        batch_size: 10,
        max_create_attempts: 3,
        stale_after: STALE_AFTER,
    }
}

/// Push an entity's `updated_at` into the past, bypassing the trigger.
async fn age_entity(pool: &PgPool, id: i64) {
    let mut tx = pool.begin().await.unwrap();
    sqlx::query("ALTER TABLE bulk_import_entities DISABLE TRIGGER set_updated_at")
        .execute(&mut *tx)
        .await
        .unwrap();
    sqlx::query(
        "UPDATE bulk_import_entities SET updated_at = NOW() - INTERVAL '1 hour' WHERE id = $1",
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .unwrap();
    sqlx::query("ALTER TABLE bulk_import_entities ENABLE TRIGGER set_updated_at")
        .execute(&mut *tx)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_colliding_name_is_suffixed(pool: PgPool) {
    let group = destination_group(&pool, 20).await;
    existing_project(&pool, group, "Destination-Project-Name", "project").await;
    existing_project(&pool, group, "Destination-Project-Name_1", "project_1").await;
    let entity_id = queue(&pool, "Destination-Project-Name", "destination-group").await;

    let importer = ProjectImporter::new(pool.clone(), 3);
    let summary = importer.run_batch(10).await.unwrap();
    assert_eq!(
        summary,
        BatchSummary {
            claimed: 1,
            finished: 1,
            failed: 0
        }
    );

    let entity = BulkImportEntityRepo::find_by_id(&pool, entity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.status, "finished");

    let project = ProjectRepo::find_by_id(&pool, entity.project_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.name, "Destination-Project-Name_2");
    assert_eq!(project.path, "destination-project-name");
    assert_eq!(project.namespace_id, Some(group));
    assert_eq!(project.visibility_level, 0);
    assert_eq!(project.import_type.as_deref(), Some(PROJECT_IMPORT_TYPE));
    let exported: DateTime<Utc> = "2016-11-18T09:29:42.634Z".parse().unwrap();
    assert_eq!(project.created_at, exported);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_colliding_path_is_suffixed(pool: PgPool) {
    let group = destination_group(&pool, 20).await;
    existing_project(&pool, group, "Source Project Name", "destination-slug-path").await;
    existing_project(&pool, group, "Source Project Name_1", "destination-slug-path_1").await;
    queue(&pool, "destination-slug-path", "destination-group").await;

    ProjectImporter::new(pool.clone(), 3)
        .run_batch(10)
        .await
        .unwrap();

    let projects = ProjectRepo::list_by_namespace(&pool, group).await.unwrap();
    let imported = projects.last().unwrap();
    assert_eq!(imported.name, "destination-slug-path");
    assert_eq!(imported.path, "destination-slug-path_2");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_blank_namespace_creates_unparented_project(pool: PgPool) {
    let entity_id = queue(&pool, "Loose Project", "").await;

    ProjectImporter::new(pool.clone(), 3)
        .run_batch(10)
        .await
        .unwrap();

    let entity = BulkImportEntityRepo::find_by_id(&pool, entity_id)
        .await
        .unwrap()
        .unwrap();
    let project = ProjectRepo::find_by_id(&pool, entity.project_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.namespace_id, None);
    assert_eq!(project.path, "loose-project");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_namespace_marks_entity_failed(pool: PgPool) {
    let entity_id = queue(&pool, "Project", "no/such/group").await;

    let summary = ProjectImporter::new(pool.clone(), 3)
        .run_batch(10)
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);

    let entity = BulkImportEntityRepo::find_by_id(&pool, entity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.status, "failed");
    assert!(entity
        .failure_reason
        .unwrap()
        .contains("does not exist"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_suffix_cap_reports_exhaustion(pool: PgPool) {
    let group = destination_group(&pool, 20).await;
    existing_project(&pool, group, "Project", "a").await;
    existing_project(&pool, group, "Project_1", "b").await;
    let entity_id = queue(&pool, "Project", "destination-group").await;

    let importer = ProjectImporter::new(pool.clone(), 3)
        .with_transformer(ProjectAttributesTransformer::new().with_max_suffix_attempts(1));

    let claimed = BulkImportEntityRepo::claim_pending(&pool, 10, STALE_AFTER)
        .await
        .unwrap();
    let err = importer.import_entity(&claimed[0]).await.unwrap_err();
    assert_matches!(err, WorkerError::Core(CoreError::NamespaceExhausted { .. }));

    assert!(!importer.process(&claimed[0]).await.unwrap());
    let entity = BulkImportEntityRepo::find_by_id(&pool, entity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.status, "failed");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_visibility_capped_by_destination_group(pool: PgPool) {
    destination_group(&pool, 10).await;
    let entity_id = BulkImportEntityRepo::create(
        &pool,
        &CreateBulkImportEntity {
            source_type: "project_entity".to_string(),
            source_full_path: "source/public".to_string(),
            destination_slug: "Public Project".to_string(),
            destination_namespace: Some("destination-group".to_string()),
            source_attributes: Some(json!({"visibility": "public"})),
        },
    )
    .await
    .unwrap()
    .id;

    ProjectImporter::new(pool.clone(), 3)
        .run_batch(10)
        .await
        .unwrap();

    let entity = BulkImportEntityRepo::find_by_id(&pool, entity_id)
        .await
        .unwrap()
        .unwrap();
    let project = ProjectRepo::find_by_id(&pool, entity.project_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.visibility_level, 10);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lost_race_is_re_resolved(pool: PgPool) {
    let group = destination_group(&pool, 20).await;
    existing_project(&pool, group, "Project", "elsewhere").await;
    let entity_id = queue(&pool, "Project", "destination-group").await;

    // First resolution sees "Project" as free; the insert then collides.
    let lookup = StaleNameLookup::new(&pool, 1);
    let summary = ProjectImporter::with_lookup(pool.clone(), lookup, 3)
        .run_batch(10)
        .await
        .unwrap();
    assert_eq!(summary.finished, 1);

    let entity = BulkImportEntityRepo::find_by_id(&pool, entity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.status, "finished");
    let project = ProjectRepo::find_by_id(&pool, entity.project_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.name, "Project_1");
    assert_eq!(project.path, "project");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_repeated_lost_races_give_conflict(pool: PgPool) {
    let group = destination_group(&pool, 20).await;
    existing_project(&pool, group, "Project", "elsewhere").await;
    let entity_id = queue(&pool, "Project", "destination-group").await;

    let lookup = StaleNameLookup::new(&pool, usize::MAX);
    let importer = ProjectImporter::with_lookup(pool.clone(), lookup, 2);

    let claimed = BulkImportEntityRepo::claim_pending(&pool, 10, STALE_AFTER)
        .await
        .unwrap();
    let err = importer.import_entity(&claimed[0]).await.unwrap_err();
    assert_matches!(err, WorkerError::Core(CoreError::Conflict(msg)) if msg.contains("2 times"));

    assert!(!importer.process(&claimed[0]).await.unwrap());
    let entity = BulkImportEntityRepo::find_by_id(&pool, entity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.status, "failed");
    assert!(entity
        .failure_reason
        .unwrap()
        .contains("taken concurrently"));
    assert_eq!(ProjectRepo::list_by_namespace(&pool, group).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_entity_no_longer_started_creates_nothing(pool: PgPool) {
    let group = destination_group(&pool, 20).await;
    let entity_id = queue(&pool, "Project", "destination-group").await;
    let importer = ProjectImporter::new(pool.clone(), 3);

    let claimed = BulkImportEntityRepo::claim_pending(&pool, 10, STALE_AFTER)
        .await
        .unwrap();
    BulkImportEntityRepo::mark_failed(&pool, entity_id, "cancelled")
        .await
        .unwrap();

    let err = importer.import_entity(&claimed[0]).await.unwrap_err();
    assert_matches!(err, WorkerError::Core(CoreError::Conflict(_)));
    assert!(ProjectRepo::list_by_namespace(&pool, group)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_abandoned_entity_is_reclaimed(pool: PgPool) {
    let entity_id = queue(&pool, "Orphan", "").await;
    let importer = ProjectImporter::new(pool.clone(), 3).with_stale_after(STALE_AFTER);

    // A worker claimed it and died before recording anything.
    BulkImportEntityRepo::claim_pending(&pool, 10, STALE_AFTER)
        .await
        .unwrap();
    assert_eq!(importer.run_batch(10).await.unwrap().claimed, 0);

    age_entity(&pool, entity_id).await;

    let summary = importer.run_batch(10).await.unwrap();
    assert_eq!(
        summary,
        BatchSummary {
            claimed: 1,
            finished: 1,
            failed: 0
        }
    );
    let entity = BulkImportEntityRepo::find_by_id(&pool, entity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.status, "finished");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_run_stops_on_cancel_with_zero_interval(pool: PgPool) {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let importer = ProjectImporter::new(pool, 3);
    importer::run(importer, worker_config(Duration::ZERO), cancel).await;
}
