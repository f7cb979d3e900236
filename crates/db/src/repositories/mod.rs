//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod bulk_import_entity_repo;
pub mod namespace_repo;
pub mod project_repo;

pub use bulk_import_entity_repo::BulkImportEntityRepo;
pub use namespace_repo::NamespaceRepo;
pub use project_repo::ProjectRepo;
