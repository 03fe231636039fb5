//! SQLite connection handling.
//!
//! One r2d2 pool serves every component that touches the database: engine
//! workers settling items, the settings store, the enrichment cache, and
//! facade reads. Each checkout is a short transaction, never held across
//! an HTTP call, so the pool can stay well under the worker ceiling.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use aph_core::{Error, Result};

use crate::migrations;

/// The shared connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// One checked-out connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool ceiling.
///
/// The engine runs at most 16 workers, but a worker only borrows a
/// connection for the instant it settles an item or reads a cache row.
/// Ten connections absorb a full pool of concurrent settles plus facade
/// traffic (job listings, progress catch-up) without ever queueing a
/// worker behind SQLite.
const MAX_CONNECTIONS: u32 = 10;

/// Pragmas applied to every file-backed connection.
///
/// WAL lets readers observe job state while another connection settles an
/// item, and `synchronous = NORMAL` is the durability level WAL is
/// specified for. The busy timeout absorbs writer collisions between
/// workers instead of surfacing `SQLITE_BUSY` into item results, and
/// foreign keys guard the jobs → job_items relationship.
const FILE_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 5000;
    PRAGMA foreign_keys = ON;
";

/// Open the application database, creating the file on first run, and
/// bring its schema up to date.
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch(FILE_PRAGMAS));
    build(manager)
}

/// Open a throwaway in-memory database (tests).
///
/// The URI names the database after a random UUID: connections *within*
/// the pool share state through `cache=shared`, while a second pool in a
/// parallel test gets a different name and therefore a different
/// database. WAL does not apply to memory databases, so only the foreign
/// key pragma carries over.
pub fn init_memory_pool() -> Result<DbPool> {
    let uri = format!(
        "file:{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    build(manager)
}

fn build(manager: SqliteConnectionManager) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(MAX_CONNECTIONS)
        .build(manager)
        .map_err(|e| Error::database(format!("connection pool construction: {e}")))?;

    // Migrate eagerly so the first caller sees a finished schema.
    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)?;

    Ok(pool)
}

/// Check a connection out of the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("database pool checkout: {e}")))
}
