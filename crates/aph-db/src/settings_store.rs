//! Read-through handle over the settings tables.
//!
//! A [`SettingsStore`] is constructed once at startup and passed into
//! components at construction, which keeps the configuration store out of
//! hidden singletons. Reads go through the pool; writes are serialized by
//! SQLite and bump `settings_version`.

use std::collections::BTreeMap;

use aph_core::settings::{SettingType, SettingValue};
use aph_core::{BadgeType, Result};

use crate::pool::{get_conn, DbPool};
use crate::queries;

/// Shared-read, writer-serialized settings handle.
#[derive(Clone)]
pub struct SettingsStore {
    pool: DbPool,
}

impl SettingsStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Typed reads
    // -----------------------------------------------------------------------

    /// Read a string setting.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        let conn = get_conn(&self.pool)?;
        Ok(match queries::settings::get(&conn, key, SettingType::String)? {
            Some(v) => Some(v.expect_string()?.to_string()),
            None => None,
        })
    }

    /// Read an integer setting.
    pub fn get_integer(&self, key: &str) -> Result<Option<i64>> {
        let conn = get_conn(&self.pool)?;
        Ok(match queries::settings::get(&conn, key, SettingType::Integer)? {
            Some(v) => Some(v.expect_integer()?),
            None => None,
        })
    }

    /// Read a boolean setting.
    pub fn get_boolean(&self, key: &str) -> Result<Option<bool>> {
        let conn = get_conn(&self.pool)?;
        Ok(match queries::settings::get(&conn, key, SettingType::Boolean)? {
            Some(v) => Some(v.expect_boolean()?),
            None => None,
        })
    }

    /// Read a JSON setting.
    pub fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = get_conn(&self.pool)?;
        Ok(match queries::settings::get(&conn, key, SettingType::Json)? {
            Some(v) => Some(v.expect_json()?.clone()),
            None => None,
        })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write a setting under a category.
    pub fn set(&self, key: &str, value: SettingValue, category: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        queries::settings::set(&conn, key, &value, category)
    }

    /// All settings in a category.
    pub fn category(&self, category: &str) -> Result<Vec<(String, SettingValue)>> {
        let conn = get_conn(&self.pool)?;
        queries::settings::list_category(&conn, category)
    }

    /// Current settings version (bumped on every write).
    pub fn version(&self) -> Result<i64> {
        let conn = get_conn(&self.pool)?;
        queries::settings::version(&conn)
    }

    // -----------------------------------------------------------------------
    // Adjacent stores
    // -----------------------------------------------------------------------

    /// Look up a service API key in the default group.
    pub fn api_key(&self, service: &str) -> Result<Option<String>> {
        let conn = get_conn(&self.pool)?;
        queries::api_keys::get(&conn, service, "api_key", "default")
    }

    /// Store a service API key in the default group.
    pub fn set_api_key(&self, service: &str, value: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        queries::api_keys::set(&conn, service, "api_key", value, "default")
    }

    /// All configured values for one badge type.
    pub fn badge_settings(&self, badge_type: BadgeType) -> Result<BTreeMap<String, String>> {
        let conn = get_conn(&self.pool)?;
        queries::badge_settings::all_for(&conn, badge_type)
    }

    /// Enabled review sources in priority order.
    pub fn review_sources(&self) -> Result<Vec<crate::models::ReviewSourceRow>> {
        let conn = get_conn(&self.pool)?;
        queries::review_sources::list_enabled(&conn)
    }
}
