//! Entity identifiers.
//!
//! Aphrodite mints exactly two kinds of IDs of its own, jobs and
//! schedules, and both are random UUIDs. Catalog items are different:
//! their identifiers belong to the upstream media server, so [`ItemId`]
//! wraps whatever string the catalog handed us and is never parsed,
//! validated, or generated locally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Identifier for a badging, revert, or restore job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Mint a fresh job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// Job IDs cross the CLI boundary as strings, so they parse back.
impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ---------------------------------------------------------------------------
// ScheduleId
// ---------------------------------------------------------------------------

/// Identifier for a stored schedule.
///
/// Narrower surface than [`JobId`]: schedules are only ever referenced
/// through database rows, so there is no string-parsing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(Uuid);

impl ScheduleId {
    /// Mint a fresh schedule ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ScheduleId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ---------------------------------------------------------------------------
// ItemId
// ---------------------------------------------------------------------------

/// Opaque catalog item identifier.
///
/// The upstream media server owns this value; aphrodite never parses it and
/// uses it only as a key (poster files, dedupe map, result rows).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap a catalog-provided identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_job_ids_do_not_collide() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn job_id_survives_the_cli_string_boundary() {
        let id = JobId::new();
        let roundtripped: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, roundtripped);

        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn job_id_serializes_as_bare_uuid() {
        let id = JobId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn schedule_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = ScheduleId::from(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn item_id_is_opaque() {
        let id = ItemId::new("f093bdd284a9b6e479a4a0c939f0ef56");
        assert_eq!(id.as_str(), "f093bdd284a9b6e479a4a0c939f0ef56");
        assert_eq!(id.to_string(), "f093bdd284a9b6e479a4a0c939f0ef56");
        // Anything the catalog sends is legal, UUID-shaped or not.
        let odd = ItemId::new("tt0133093/special");
        assert_eq!(odd.as_str(), "tt0133093/special");
    }

    #[test]
    fn item_id_serde_is_transparent() {
        let id = ItemId::new("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""abc""#);
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn item_id_works_as_a_map_key() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ItemId::new("a"));
        assert!(set.contains(&ItemId::new("a")));
        assert!(!set.contains(&ItemId::new("b")));
    }
}
