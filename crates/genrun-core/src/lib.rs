//! Genrun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime
//! - Filesystem
//!
//! All types here describe generation tasks, their results, and the
//! lifecycle of remote generation jobs.

pub mod error;
pub mod ids;
pub mod image;
pub mod result;
pub mod spec;
pub mod status;
pub mod video;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{JobHandle, TaskId};
pub use image::{extension_for_mime, mime_for_extension, ImageReference};
pub use result::{BatchRequest, BatchResult, FailureKind, TaskResult};
pub use spec::{SizeClass, TaskSpec};
pub use status::JobStatus;
pub use video::{AspectRatio, VideoRequest};
