//! Typed key-value settings.
//!
//! Every row carries an explicit type tag. Reads present the expected type;
//! a declared/expected mismatch is `config_invalid`. Every write bumps
//! `settings_version` in the same transaction.

use chrono::Utc;
use rusqlite::Connection;

use aph_core::settings::{SettingType, SettingValue};
use aph_core::{Error, Result};

/// Read a setting, decoding under its declared type.
///
/// Returns `Ok(None)` when the key is absent; `config_invalid` when the
/// declared type does not match `expected` or the stored value fails to
/// decode.
pub fn get(conn: &Connection, key: &str, expected: SettingType) -> Result<Option<SettingValue>> {
    let row: Option<(String, String)> = match conn.query_row(
        "SELECT value, type FROM settings WHERE key = ?1",
        [key],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ) {
        Ok(r) => Some(r),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(Error::database(e)),
    };

    let Some((raw, ty_tag)) = row else {
        return Ok(None);
    };

    let declared = SettingType::parse(&ty_tag)
        .ok_or_else(|| Error::ConfigInvalid(format!("setting '{key}' has unknown type '{ty_tag}'")))?;
    if declared != expected {
        return Err(Error::ConfigInvalid(format!(
            "setting '{key}': wanted {expected}, stored {declared}"
        )));
    }

    SettingValue::decode(declared, &raw).map(Some)
}

/// Write a setting and bump the settings version atomically.
pub fn set(conn: &Connection, key: &str, value: &SettingValue, category: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e))?;

    tx.execute(
        "INSERT INTO settings (key, value, type, category, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             type = excluded.type,
             category = excluded.category,
             updated_at = excluded.updated_at",
        rusqlite::params![
            key,
            value.encode(),
            value.setting_type().as_str(),
            category,
            &now,
        ],
    )
    .map_err(|e| Error::database(e))?;

    tx.execute("UPDATE settings_version SET version = version + 1 WHERE id = 1", [])
        .map_err(|e| Error::database(e))?;

    tx.commit().map_err(|e| Error::database(e))?;
    Ok(())
}

/// All settings in a category as (key, value) pairs.
pub fn list_category(conn: &Connection, category: &str) -> Result<Vec<(String, SettingValue)>> {
    let mut stmt = conn
        .prepare("SELECT key, value, type FROM settings WHERE category = ?1 ORDER BY key")
        .map_err(|e| Error::database(e))?;
    let rows = stmt
        .query_map([category], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(|e| Error::database(e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e))?;

    let mut out = Vec::with_capacity(rows.len());
    for (key, raw, ty_tag) in rows {
        let ty = SettingType::parse(&ty_tag).ok_or_else(|| {
            Error::ConfigInvalid(format!("setting '{key}' has unknown type '{ty_tag}'"))
        })?;
        out.push((key, SettingValue::decode(ty, &raw)?));
    }
    Ok(out)
}

/// Current settings version.
pub fn version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT version FROM settings_version WHERE id = 1", [], |r| {
        r.get(0)
    })
    .map_err(|e| Error::database(e))
}
