//! Progress-event bus for job observers.
//!
//! A consumer usually subscribes *after* submitting a job, so live
//! broadcast alone would lose the first events of a fast job.
//! [`ProgressBus`] therefore keeps a bounded replay window next to the
//! broadcast channel: publishing appends to both, and a new observer
//! drains the window before switching to live delivery, deduplicating on
//! the per-job sequence numbers the engine stamps onto every event.

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ErrorKind;
use crate::ids::{ItemId, JobId};
use crate::job::{ItemStatus, JobStatus};

/// Replay-window length. Sized for a few in-flight jobs: a 100-item batch
/// emits roughly two hundred item events plus its status transitions.
const REPLAY_WINDOW: usize = 512;

/// What happened within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressKind {
    ItemStarted {
        item_id: ItemId,
    },
    ItemFinished {
        item_id: ItemId,
        status: ItemStatus,
        error_kind: Option<ErrorKind>,
    },
    JobStatus {
        status: JobStatus,
    },
}

/// One progress event, sequenced per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Monotonic per-job sequence number.
    pub seq: u64,
    pub job_id: JobId,
    #[serde(flatten)]
    pub kind: ProgressKind,
}

impl ProgressEvent {
    /// Whether this event terminates the job's progress stream.
    pub fn is_terminal(&self) -> bool {
        matches!(&self.kind, ProgressKind::JobStatus { status } if status.is_terminal())
    }
}

/// Live broadcast plus a bounded replay window.
pub struct ProgressBus {
    live: broadcast::Sender<ProgressEvent>,
    /// Recent events in publish order, oldest at the front.
    window: RwLock<VecDeque<ProgressEvent>>,
}

impl ProgressBus {
    /// `live_capacity` bounds the broadcast channel only; the replay
    /// window is always [`REPLAY_WINDOW`] events deep.
    pub fn new(live_capacity: usize) -> Self {
        let (live, _) = broadcast::channel(live_capacity);
        Self {
            live,
            window: RwLock::new(VecDeque::with_capacity(REPLAY_WINDOW)),
        }
    }

    /// Subscribe to live delivery. Call this *before* [`recent_for`] so
    /// no event can fall between replay and live.
    ///
    /// [`recent_for`]: ProgressBus::recent_for
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.live.subscribe()
    }

    /// Record an event in the replay window and hand it to live
    /// subscribers (of which there may be none; the window still kept it).
    pub fn publish(&self, event: ProgressEvent) {
        {
            let mut window = self.window.write();
            if window.len() == REPLAY_WINDOW {
                window.pop_front();
            }
            window.push_back(event.clone());
        }
        let _ = self.live.send(event);
    }

    /// One job's slice of the replay window, oldest first.
    pub fn recent_for(&self, job_id: JobId) -> Vec<ProgressEvent> {
        self.window
            .read()
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(job_id: JobId, seq: u64, kind: ProgressKind) -> ProgressEvent {
        ProgressEvent { seq, job_id, kind }
    }

    #[test]
    fn publish_and_receive() {
        let bus = ProgressBus::new(16);
        let mut rx = bus.subscribe();
        let job_id = JobId::new();

        bus.publish(event(
            job_id,
            0,
            ProgressKind::ItemStarted {
                item_id: ItemId::new("i1"),
            },
        ));

        let got = rx.try_recv().unwrap();
        assert_eq!(got.job_id, job_id);
        assert_eq!(got.seq, 0);
    }

    #[test]
    fn recent_for_filters_by_job() {
        let bus = ProgressBus::new(16);
        let a = JobId::new();
        let b = JobId::new();

        bus.publish(event(a, 0, ProgressKind::JobStatus { status: JobStatus::Running }));
        bus.publish(event(b, 0, ProgressKind::JobStatus { status: JobStatus::Running }));
        bus.publish(event(
            a,
            1,
            ProgressKind::JobStatus {
                status: JobStatus::Succeeded,
            },
        ));

        let events = bus.recent_for(a);
        assert_eq!(events.len(), 2);
        // Oldest first, monotonic seq.
        assert_eq!(events[0].seq, 0);
        assert_eq!(events[1].seq, 1);
    }

    #[test]
    fn terminal_detection() {
        let job_id = JobId::new();
        let running = event(job_id, 0, ProgressKind::JobStatus { status: JobStatus::Running });
        assert!(!running.is_terminal());

        let done = event(
            job_id,
            5,
            ProgressKind::JobStatus {
                status: JobStatus::Partial,
            },
        );
        assert!(done.is_terminal());

        let item = event(
            job_id,
            3,
            ProgressKind::ItemFinished {
                item_id: ItemId::new("x"),
                status: ItemStatus::Ok,
                error_kind: None,
            },
        );
        assert!(!item.is_terminal());
    }

    #[test]
    fn replay_window_evicts_oldest() {
        let bus = ProgressBus::new(16);
        let job_id = JobId::new();
        for seq in 0..600 {
            bus.publish(event(
                job_id,
                seq,
                ProgressKind::ItemStarted {
                    item_id: ItemId::new("i"),
                },
            ));
        }
        let events = bus.recent_for(job_id);
        assert_eq!(events.len(), REPLAY_WINDOW);
        // Eviction is oldest-first, so the window starts where the
        // overflow ended.
        assert_eq!(events[0].seq, 600 - REPLAY_WINDOW as u64);
        assert_eq!(events.last().unwrap().seq, 599);
    }

    #[test]
    fn event_serde_roundtrip() {
        let e = event(
            JobId::new(),
            7,
            ProgressKind::ItemFinished {
                item_id: ItemId::new("i9"),
                status: ItemStatus::Failed,
                error_kind: Some(ErrorKind::Timeout),
            },
        );
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains(r#""event":"item_finished""#));
        let back: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seq, 7);
    }
}
