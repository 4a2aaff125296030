//! Handling outcomes and pipeline statistics.

use crate::emitter::EmissionTarget;
use crate::report::SchemaViolation;
use adscope_core::{PageId, Timestamp};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandlingOutcome {
    /// Record built and emitted
    Emitted {
        /// Sink that received the record
        target: EmissionTarget,
    },
    /// Rejected by schema validation, never handled
    Dropped {
        /// Reason for rejection
        violation: SchemaViolation,
    },
    /// Identity lookup or emission failed; nothing was emitted
    Failed {
        /// Error description
        reason: String,
    },
    /// Handling exceeded the configured timeout
    TimedOut,
}

impl HandlingOutcome {
    /// Short label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Emitted { .. } => "emitted",
            Self::Dropped { .. } => "dropped",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// An outcome log entry.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeEntry {
    /// Unique entry id
    pub id: Uuid,
    /// When the outcome was recorded
    pub timestamp: Timestamp,
    /// Visit the message belonged to, when it got far enough to know
    pub visit_id: Option<PageId>,
    /// The outcome
    pub outcome: HandlingOutcome,
}

/// Bounded, most-recent-last log of handling outcomes.
#[derive(Debug)]
pub struct OutcomeLog {
    entries: Mutex<VecDeque<OutcomeEntry>>,
    capacity: usize,
}

impl OutcomeLog {
    /// Create a log that keeps at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Append an outcome, evicting the oldest entry when full.
    pub fn record(&self, visit_id: Option<PageId>, outcome: HandlingOutcome) {
        if self.capacity == 0 {
            return;
        }

        let entry = OutcomeEntry {
            id: Uuid::new_v4(),
            timestamp: Timestamp::now(),
            visit_id,
            outcome,
        };

        let mut entries = self.entries.lock().expect("acquire outcome log lock");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Copy of the retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<OutcomeEntry> {
        self.entries
            .lock()
            .expect("acquire outcome log lock")
            .iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("acquire outcome log lock").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters shared by the listener and its handlers.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    dropped: AtomicU64,
    emitted: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl PipelineStats {
    /// Count a message taken off the channel.
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a final outcome.
    pub fn record_outcome(&self, outcome: &HandlingOutcome) {
        let counter = match outcome {
            HandlingOutcome::Emitted { .. } => &self.emitted,
            HandlingOutcome::Dropped { .. } => &self.dropped,
            HandlingOutcome::Failed { .. } => &self.failed,
            HandlingOutcome::TimedOut => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Messages taken off the subscription
    pub received: u64,
    /// Messages rejected by schema validation
    pub dropped: u64,
    /// Records emitted
    pub emitted: u64,
    /// Reports whose identity lookup or emission failed
    pub failed: u64,
    /// Reports that exceeded the handler timeout
    pub timed_out: u64,
}

impl StatsSnapshot {
    /// Messages that reached a final outcome.
    #[must_use]
    pub fn settled(&self) -> u64 {
        self.dropped + self.emitted + self.failed + self.timed_out
    }
}
