//! aph-db: SQLite persistence for jobs, settings, caches, and schedules.
//!
//! Connection pooling via r2d2, embedded string migrations, and per-table
//! query modules. All functions take a `&Connection` so callers control
//! transactions and pooling.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod settings_store;

pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
pub use settings_store::SettingsStore;
