//! Merge workflow against the remote merge service

pub mod orchestrator;
pub mod transport;

// Re-export commonly used items
pub use orchestrator::{MergeOrchestrator, OrchestrationStatus, StatusBoard, MIN_FILES};
pub use transport::{merge_endpoint, HttpTransport, MergePart, MergeRequest, MergeTransport};
