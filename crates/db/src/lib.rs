//! `transit-db`: PostgreSQL persistence for namespaces, projects and bulk
//! import entities.

use sqlx::postgres::PgPoolOptions;

pub mod lookup;
pub mod models;
pub mod repositories;

pub use lookup::PgDestinationLookup;

pub type DbPool = sqlx::PgPool;

/// Default maximum number of pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// Whether `err` is a PostgreSQL unique violation on one of our `uq_`
/// constraints.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && db_err
                    .constraint()
                    .is_some_and(|constraint| constraint.starts_with("uq_"))
        }
        _ => false,
    }
}
