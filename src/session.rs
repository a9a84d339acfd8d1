//! One merge session: queue, current result and merge workflow wired together
//!
//! The queue is constructed with two mutation hooks, the orchestrator's status
//! board and the result manager, so every queue change resets a finished
//! status and drops the current result before the mutating call returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, PreconditionError, Result};
use crate::merge::{HttpTransport, MergeOrchestrator, MergeTransport, OrchestrationStatus};
use crate::queue::{AppendReport, Direction, EntryId, QueueEntry, QueueObserver, QueueSnapshot, QueueStore};
use crate::resource::{PreviewRef, ResourceHost, ResourceLifecycleManager, TempFileHost};
use crate::validate::{CandidateFile, Limits, Validator};

/// File name used when downloading into a directory
pub const DEFAULT_DOWNLOAD_NAME: &str = "merged.pdf";

/// Session talking HTTP to the merge service with temp-file previews
pub type HttpSession = Session<HttpTransport, TempFileHost>;

pub struct Session<T, H: ResourceHost> {
    queue: Mutex<QueueStore>,
    results: Arc<ResourceLifecycleManager<H>>,
    orchestrator: MergeOrchestrator<T>,
}

impl<T: MergeTransport, H: ResourceHost> Session<T, H> {
    pub fn new(limits: Limits, transport: T, host: H) -> Self {
        let results = Arc::new(ResourceLifecycleManager::new(host));
        let orchestrator = MergeOrchestrator::new(transport);
        let observers: Vec<Arc<dyn QueueObserver>> = vec![
            orchestrator.observer(),
            Arc::clone(&results) as Arc<dyn QueueObserver>,
        ];
        let queue = QueueStore::new(Validator::new(limits), observers);

        Self {
            queue: Mutex::new(queue),
            results,
            orchestrator,
        }
    }

    /// Screen and append files (file picker and drag-and-drop both land here)
    pub fn append(&self, files: Vec<CandidateFile>) -> AppendReport {
        self.queue.lock().append(files)
    }

    pub fn remove(&self, id: EntryId) -> Option<QueueEntry> {
        self.queue.lock().remove(id)
    }

    pub fn move_adjacent(&self, id: EntryId, direction: Direction) -> bool {
        self.queue.lock().move_adjacent(id, direction)
    }

    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.queue.lock().total_size()
    }

    /// Queue summary line, e.g. `"3 files • 4.00 MB total"`
    pub fn summary(&self) -> String {
        self.queue.lock().summary()
    }

    /// Merge the queue in its current order
    pub async fn submit(&self) -> std::result::Result<OrchestrationStatus, PreconditionError> {
        self.orchestrator.submit(&self.queue, &self.results).await
    }

    /// Abandon the in-flight merge, if any
    pub fn cancel(&self) -> bool {
        self.orchestrator.cancel()
    }

    pub fn status(&self) -> OrchestrationStatus {
        self.orchestrator.status()
    }

    /// The current merged result, if the queue has not changed since it was made
    pub fn current(&self) -> Option<Arc<PreviewRef<H>>> {
        self.results.current()
    }

    pub fn transport(&self) -> &T {
        self.orchestrator.transport()
    }

    pub fn host(&self) -> &H {
        self.results.host()
    }

    /// Write the current result to `dest`
    ///
    /// When `dest` is a directory the file is named `merged.pdf`. The result
    /// stays alive for the duration of the write even if the queue changes.
    pub fn download(&self, dest: &Path) -> Result<PathBuf> {
        let preview = self.current().ok_or(Error::NoResult)?;
        let path = if dest.is_dir() {
            dest.join(DEFAULT_DOWNLOAD_NAME)
        } else {
            dest.to_path_buf()
        };

        std::fs::write(&path, preview.bytes())?;
        info!(path = %path.display(), bytes = preview.len(), "Saved merged PDF");
        Ok(path)
    }
}

impl HttpSession {
    /// Session against the configured merge service, previews in the temp dir
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::new(config.limits, transport, TempFileHost::new()))
    }
}
