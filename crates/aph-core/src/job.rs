//! Job-domain types shared by the engine, database, and progress bus.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::media::BadgeType;

// ---------------------------------------------------------------------------
// JobType / JobStatus / ItemStatus
// ---------------------------------------------------------------------------

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Single,
    Batch,
    Revert,
    RestoreAll,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Batch => write!(f, "batch"),
            Self::Revert => write!(f, "revert"),
            Self::RestoreAll => write!(f, "restore_all"),
        }
    }
}

/// Job lifecycle status. Transitions only move forward:
/// `queued → running → {succeeded | partial | failed | cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Partial,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Partial | Self::Failed | Self::Cancelled
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal status of one work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ok,
    Skipped,
    Failed,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// JobProgress
// ---------------------------------------------------------------------------

/// Aggregate counters for a job.
///
/// Invariant: `done + failed + skipped <= total` at all times; equality holds
/// exactly when the job is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub total: u32,
    pub done: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl JobProgress {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Items accounted for so far.
    pub fn settled(&self) -> u32 {
        self.done + self.failed + self.skipped
    }

    /// Whether every item has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.settled() == self.total
    }
}

// ---------------------------------------------------------------------------
// BadgeMask
// ---------------------------------------------------------------------------

/// The set of badge types a job is allowed to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeMask(BTreeSet<BadgeType>);

impl BadgeMask {
    /// All four badge types enabled.
    pub fn all() -> Self {
        Self(BadgeType::ALL.iter().copied().collect())
    }

    /// No badge types enabled.
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn of(types: impl IntoIterator<Item = BadgeType>) -> Self {
        Self(types.into_iter().collect())
    }

    pub fn contains(&self, t: BadgeType) -> bool {
        self.0.contains(&t)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = BadgeType> + '_ {
        self.0.iter().copied()
    }
}

impl Default for BadgeMask {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_forward_only() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Partial));
        assert!(!JobStatus::Succeeded.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Succeeded));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Partial.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_display_matches_serde() {
        for s in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Partial,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
    }

    #[test]
    fn progress_accounting() {
        let mut p = JobProgress::new(5);
        assert!(!p.is_complete());
        p.done = 3;
        p.failed = 1;
        p.skipped = 1;
        assert_eq!(p.settled(), 5);
        assert!(p.is_complete());
    }

    #[test]
    fn badge_mask_membership() {
        let mask = BadgeMask::of([BadgeType::Audio, BadgeType::Review]);
        assert!(mask.contains(BadgeType::Audio));
        assert!(!mask.contains(BadgeType::Awards));
        assert!(BadgeMask::all().contains(BadgeType::Awards));
        assert!(BadgeMask::none().is_empty());
    }

    #[test]
    fn badge_mask_serde_is_a_list() {
        let mask = BadgeMask::of([BadgeType::Resolution, BadgeType::Audio]);
        let json = serde_json::to_string(&mask).unwrap();
        // BTreeSet ordering: audio < resolution per enum declaration order.
        assert_eq!(json, r#"["audio","resolution"]"#);
    }

    #[test]
    fn job_type_display() {
        assert_eq!(JobType::RestoreAll.to_string(), "restore_all");
        assert_eq!(JobType::Batch.to_string(), "batch");
    }
}
