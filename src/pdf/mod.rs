//! Local PDF inspection

pub mod metadata;

// Re-export commonly used items
pub use metadata::{count_pages, extract_metadata, inspect_bytes, PdfMetadata};
