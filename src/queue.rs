//! Ordered queue of accepted PDFs
//!
//! Queue order is merge order. Every structural change bumps the queue
//! revision and notifies the registered [`QueueObserver`]s before the
//! mutating call returns, so a previously computed merge result can never
//! outlive the contents it was computed from.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::ValidationError;
use crate::validate::{CandidateFile, Validator};

/// Render a byte count the way the queue summary shows it (`"3.50 MB"`)
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Session-unique identifier of a queue entry
///
/// Identifiers are handed out in increasing order and never reused, so they
/// stay valid as handles while entries move around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An accepted file at some position in the queue
#[derive(Debug, Clone)]
pub struct QueueEntry {
    id: EntryId,
    name: String,
    content: Arc<[u8]>,
}

impl QueueEntry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub(crate) fn shared_content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }
}

/// Direction for a one-step reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the front of the queue (earlier in the merged document)
    Backward,
    /// Toward the end of the queue (later in the merged document)
    Forward,
}

/// A candidate that did not make it into the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub reason: ValidationError,
}

/// Outcome of appending a batch of candidates
#[derive(Debug, Clone, Default)]
pub struct AppendReport {
    /// Identifiers of the accepted files, in input order
    pub accepted: Vec<EntryId>,
    /// Rejected files with their reasons, in input order
    pub rejected: Vec<Rejection>,
}

impl AppendReport {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

/// Consistent, read-only view of the queue at one revision
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    revision: u64,
    entries: Vec<QueueEntry>,
}

impl QueueSnapshot {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hook invoked synchronously after every structural queue change
pub trait QueueObserver: Send + Sync {
    fn queue_changed(&self);
}

/// Owner of the ordered queue
pub struct QueueStore {
    validator: Validator,
    entries: Vec<QueueEntry>,
    next_id: u64,
    revision: u64,
    observers: Vec<Arc<dyn QueueObserver>>,
}

impl QueueStore {
    /// Create an empty queue whose mutations notify `observers` in order
    pub fn new(validator: Validator, observers: Vec<Arc<dyn QueueObserver>>) -> Self {
        Self {
            validator,
            entries: Vec::new(),
            next_id: 1,
            revision: 0,
            observers,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Screen and append a batch of candidates, preserving input order
    ///
    /// Rejected candidates never block the accepted ones. Once the queue is
    /// full the rest of the batch is rejected with `QueueFull`.
    pub fn append(&mut self, candidates: Vec<CandidateFile>) -> AppendReport {
        let mut report = AppendReport::default();
        let mut total = self.total_size();

        for candidate in candidates {
            let verdict = self
                .validator
                .accept(&candidate)
                .and_then(|()| self.validator.check_aggregate(self.entries.len()))
                .and_then(|()| self.validator.check_total_size(total, candidate.size()));

            if let Err(reason) = verdict {
                debug!(file = candidate.name(), %reason, "Rejected candidate");
                report.rejected.push(Rejection {
                    name: candidate.name().to_string(),
                    reason,
                });
                continue;
            }

            let id = EntryId(self.next_id);
            self.next_id += 1;
            total += candidate.size();
            self.entries.push(QueueEntry {
                id,
                name: candidate.name().to_string(),
                content: Arc::clone(candidate.content()),
            });
            report.accepted.push(id);
        }

        if !report.accepted.is_empty() {
            debug!(
                accepted = report.accepted.len(),
                rejected = report.rejected.len(),
                len = self.entries.len(),
                "Appended files to queue"
            );
            self.changed();
        }

        report
    }

    /// Remove the entry with `id`, keeping the order of the rest
    ///
    /// Returns `None` (and changes nothing) if the id is not in the queue.
    pub fn remove(&mut self, id: EntryId) -> Option<QueueEntry> {
        let index = self.position(id)?;
        let entry = self.entries.remove(index);
        debug!(%id, name = entry.name(), "Removed file from queue");
        self.changed();
        Some(entry)
    }

    /// Swap the entry with its neighbour in `direction`
    ///
    /// Returns `false` for unknown ids and for moves past either end; those
    /// leave the queue untouched.
    pub fn move_adjacent(&mut self, id: EntryId, direction: Direction) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let target = match direction {
            Direction::Backward => index.checked_sub(1),
            Direction::Forward => Some(index + 1).filter(|&t| t < self.entries.len()),
        };
        let Some(target) = target else {
            return false;
        };

        self.entries.swap(index, target);
        debug!(%id, from = index, to = target, "Moved file in queue");
        self.changed();
        true
    }

    /// Empty the queue
    ///
    /// Always notifies observers, even when the queue was already empty.
    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("Cleared queue");
        self.changed();
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            revision: self.revision,
            entries: self.entries.clone(),
        }
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summed size of all entries in bytes (advisory)
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(QueueEntry::size).sum()
    }

    /// Counter bumped by every structural change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// One-line summary, e.g. `"3 files • 4.00 MB total"`
    pub fn summary(&self) -> String {
        let count = self.entries.len();
        format!(
            "{} file{} • {} total",
            count,
            if count == 1 { "" } else { "s" },
            format_megabytes(self.total_size())
        )
    }

    fn changed(&mut self) {
        self.revision += 1;
        for observer in &self.observers {
            observer.queue_changed();
        }
    }
}
