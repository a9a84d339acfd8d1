//! Lifetime management for merged-result handles
//!
//! A merged PDF is exposed to the presentation layer through a previewable
//! reference minted by the host environment (for the CLI, a temp file that a
//! viewer can open). Host handles must be released explicitly, exactly once.
//!
//! [`PreviewRef`] owns one host handle and releases it when dropped, so every
//! exit path (replacement, invalidation, teardown) releases it. The manager
//! hands out `Arc<PreviewRef>`: a reader that is still downloading or
//! displaying a result keeps the handle alive, and release happens when the
//! last holder lets go. Invalidation itself is immediate: `current()` returns
//! `None` as soon as `invalidate()` returns.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::Result;
use crate::queue::QueueObserver;

/// Host environment API for previewable references
pub trait ResourceHost: Send + Sync + 'static {
    /// Handle to one previewable reference
    type Handle: Send + Sync + 'static;

    /// Mint a previewable reference for `buffer`
    fn create(&self, buffer: &[u8]) -> Result<Self::Handle>;

    /// Give the reference back to the host
    fn release(&self, handle: Self::Handle);
}

/// A live merged result together with its previewable reference
pub struct PreviewRef<H: ResourceHost> {
    id: u64,
    host: Arc<H>,
    handle: Option<H::Handle>,
    buffer: Arc<[u8]>,
    created_at: DateTime<Local>,
}

impl<H: ResourceHost> PreviewRef<H> {
    /// Sequence number of this result within the session
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The host handle (for [`TempFileHost`], the preview file path)
    pub fn handle(&self) -> &H::Handle {
        // Only `Drop` takes the handle out.
        self.handle
            .as_ref()
            .unwrap_or_else(|| unreachable!("preview handle taken before drop"))
    }

    /// The merged PDF bytes
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

impl<H: ResourceHost> fmt::Debug for PreviewRef<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRef")
            .field("id", &self.id)
            .field("len", &self.buffer.len())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl<H: ResourceHost> Drop for PreviewRef<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(id = self.id, "Releasing preview reference");
            self.host.release(handle);
        }
    }
}

/// Owner of the (at most one) current merged result
pub struct ResourceLifecycleManager<H: ResourceHost> {
    host: Arc<H>,
    current: Mutex<Option<Arc<PreviewRef<H>>>>,
    next_id: AtomicU64,
}

impl<H: ResourceHost> ResourceLifecycleManager<H> {
    pub fn new(host: H) -> Self {
        Self {
            host: Arc::new(host),
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Replace the current result with `buffer`
    ///
    /// The previous result is invalidated before the new reference is
    /// created. If the host cannot create a reference, no result is current.
    pub fn publish(&self, buffer: impl Into<Arc<[u8]>>) -> Result<Arc<PreviewRef<H>>> {
        self.invalidate();

        let buffer = buffer.into();
        let handle = self.host.create(&buffer)?;
        let preview = Arc::new(PreviewRef {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            host: Arc::clone(&self.host),
            handle: Some(handle),
            buffer,
            created_at: Local::now(),
        });
        debug!(id = preview.id, len = preview.len(), "Published merged result");

        let displaced = self.current.lock().replace(Arc::clone(&preview));
        drop(displaced);
        Ok(preview)
    }

    /// Drop the current result, if any
    pub fn invalidate(&self) {
        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            debug!(id = previous.id, "Invalidated merged result");
        }
    }

    pub fn current(&self) -> Option<Arc<PreviewRef<H>>> {
        self.current.lock().clone()
    }
}

impl<H: ResourceHost> QueueObserver for ResourceLifecycleManager<H> {
    fn queue_changed(&self) {
        self.invalidate();
    }
}

/// Host that backs each previewable reference with a temp file
///
/// The file can be handed to a PDF viewer; releasing the handle deletes it.
#[derive(Debug, Clone)]
pub struct TempFileHost {
    dir: PathBuf,
}

impl TempFileHost {
    /// Place preview files in the system temp directory
    pub fn new() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for TempFileHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHost for TempFileHost {
    type Handle = TempPath;

    fn create(&self, buffer: &[u8]) -> Result<TempPath> {
        use std::io::Write;

        let mut file = tempfile::Builder::new()
            .prefix("unifypdf-merged-")
            .suffix(".pdf")
            .tempfile_in(&self.dir)?;
        file.write_all(buffer)?;
        file.flush()?;
        Ok(file.into_temp_path())
    }

    fn release(&self, handle: TempPath) {
        let path = handle.to_path_buf();
        if let Err(e) = handle.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove preview file");
        }
    }
}
