//! UnifyPDF client library
//!
//! Assembles an ordered queue of PDFs, has a remote merge service combine
//! them, and manages the merged result for preview and download:
//! - Validate candidate files against upload limits
//! - Keep the merge queue in order (append, remove, move, clear)
//! - Submit the queue to the merge service, one request at a time
//! - Hold the merged result and release its preview handle deterministically
//! - Inspect merged PDFs locally (page count, title, author)
//!
//! # Example
//!
//! ```no_run
//! use unifypdf::{CandidateFile, Config, HttpSession, OrchestrationStatus};
//! use std::path::Path;
//!
//! # async fn example() -> unifypdf::Result<()> {
//! let session = HttpSession::from_config(&Config::from_env())?;
//! session.append(vec![
//!     CandidateFile::from_path(Path::new("1. intro.pdf"))?,
//!     CandidateFile::from_path(Path::new("2. advanced.pdf"))?,
//! ]);
//!
//! if session.submit().await? == OrchestrationStatus::Succeeded {
//!     session.download(Path::new("merged.pdf"))?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod merge;
pub mod pdf;
pub mod queue;
pub mod resource;
pub mod session;
pub mod validate;

// Re-export commonly used items
pub use config::Config;
pub use error::{CollaboratorError, Error, PreconditionError, Result, ValidationError};
pub use merge::{HttpTransport, MergeOrchestrator, MergeRequest, MergeTransport, OrchestrationStatus};
pub use queue::{AppendReport, Direction, EntryId, QueueEntry, QueueSnapshot, QueueStore};
pub use resource::{PreviewRef, ResourceHost, ResourceLifecycleManager, TempFileHost};
pub use session::{HttpSession, Session};
pub use validate::{CandidateFile, Limits, Validator};
