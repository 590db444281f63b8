//! Shared helpers for database integration tests.

use acemusic_db::DbPool;
use tempfile::TempDir;

/// A migrated SQLite database living in a temporary directory.
///
/// The directory is removed when this value is dropped, so keep it alive
/// for the duration of the test.
pub struct TestDb {
    pub pool: DbPool,
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let pool = acemusic_db::create_pool(&url)
        .await
        .expect("create pool");
    acemusic_db::run_migrations(&pool)
        .await
        .expect("run migrations");
    TestDb { pool, _dir: dir }
}
