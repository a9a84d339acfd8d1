//! Error types for the merge client

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Why a candidate file was not accepted into the queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither the media type nor the extension says PDF
    #[error("Unsupported file type: {name}. Only PDF files can be merged.")]
    UnsupportedType { name: String },

    /// File exceeds the per-file ceiling
    #[error("File too large: {name}. Max {} per file.", crate::queue::format_megabytes(*.limit))]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// Queue already holds the maximum number of entries
    #[error("Only {limit} files allowed per merge.")]
    QueueFull { limit: usize },

    /// Adding the file would exceed the configured aggregate cap
    #[error("Queue would exceed the {} total size limit.", crate::queue::format_megabytes(*.limit))]
    TotalSizeExceeded { limit: u64 },
}

/// Local checks that stop a merge before any request is sent
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Please add at least two PDFs.")]
    InsufficientFiles,

    #[error("A merge is already in progress.")]
    AlreadyInProgress,
}

/// Failures reported by, or on the way to, the merge service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Non-2xx response; the message is the service's own text when it sent one
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response
    #[error("Failed to merge PDFs: {0}")]
    Transport(String),

    /// The configured base URL cannot be turned into an endpoint
    #[error("Invalid merge service URL: {0}")]
    InvalidEndpoint(String),
}

impl CollaboratorError {
    /// Build a rejection from a status code and the (possibly empty) response body
    pub fn rejected(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("Merge failed with status {}", status)
        } else {
            body.to_string()
        };
        CollaboratorError::Rejected { status, message }
    }
}

/// Main error type for the merge client
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// No files matched pattern
    #[error("No PDF files found matching pattern: {0}")]
    NoFilesMatched(String),

    /// Download or open requested with no current merge result
    #[error("No merged PDF is available")]
    NoResult,

    /// General error
    #[error("{0}")]
    General(String),
}
