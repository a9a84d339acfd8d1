//! Upload constraints for candidate files
//!
//! Validation is synchronous and side-effect free: it only produces a verdict.
//! The per-file checks run in a fixed order (type, then size), and the
//! aggregate checks are evaluated against the queue a candidate would join.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result, ValidationError};

/// Media type accepted by the merge service
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Default maximum number of files in one merge
pub const MAX_FILES: usize = 20;

/// Default per-file ceiling (25 MiB)
pub const MAX_FILE_SIZE_BYTES: u64 = 25 * 1024 * 1024;

/// Upload limits enforced by the [`Validator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of entries in the queue
    pub max_files: usize,
    /// Maximum size of any single file in bytes
    pub max_file_size: u64,
    /// Optional cap on the summed size of the whole queue
    pub max_total_size: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_files: MAX_FILES,
            max_file_size: MAX_FILE_SIZE_BYTES,
            max_total_size: None,
        }
    }
}

/// A user-selected file that has not been accepted yet
///
/// The content is shared, not copied, when the file moves into the queue.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    name: String,
    media_type: Option<String>,
    content: Arc<[u8]>,
}

impl CandidateFile {
    /// Create a candidate from a declared name, declared media type and content
    pub fn new(
        name: impl Into<String>,
        media_type: Option<String>,
        content: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type,
            content: content.into(),
        }
    }

    /// Load a candidate from disk
    ///
    /// The media type is declared as PDF when the content carries the `%PDF-`
    /// signature; otherwise only the extension can qualify the file.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = content
            .starts_with(b"%PDF-")
            .then(|| PDF_MEDIA_TYPE.to_string());

        Ok(Self::new(name, media_type, content))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// Byte length of the content
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub(crate) fn content(&self) -> &Arc<[u8]> {
        &self.content
    }

    /// True when either the declared type or the extension says PDF
    pub fn looks_like_pdf(&self) -> bool {
        self.media_type() == Some(PDF_MEDIA_TYPE) || self.name.to_lowercase().ends_with(".pdf")
    }
}

/// Pure predicate logic over candidates and queue aggregates
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    limits: Limits,
}

impl Validator {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Per-file acceptance: type first, then size
    pub fn accept(&self, candidate: &CandidateFile) -> std::result::Result<(), ValidationError> {
        if !candidate.looks_like_pdf() {
            return Err(ValidationError::UnsupportedType {
                name: candidate.name().to_string(),
            });
        }

        if candidate.size() > self.limits.max_file_size {
            return Err(ValidationError::FileTooLarge {
                name: candidate.name().to_string(),
                size: candidate.size(),
                limit: self.limits.max_file_size,
            });
        }

        Ok(())
    }

    /// Whether one more entry fits in a queue currently holding `current_count`
    pub fn check_aggregate(&self, current_count: usize) -> std::result::Result<(), ValidationError> {
        if current_count >= self.limits.max_files {
            return Err(ValidationError::QueueFull {
                limit: self.limits.max_files,
            });
        }
        Ok(())
    }

    /// Whether `additional` bytes fit under the optional aggregate cap
    pub fn check_total_size(
        &self,
        current_total: u64,
        additional: u64,
    ) -> std::result::Result<(), ValidationError> {
        match self.limits.max_total_size {
            Some(limit) if current_total.saturating_add(additional) > limit => {
                Err(ValidationError::TotalSizeExceeded { limit })
            }
            _ => Ok(()),
        }
    }
}
