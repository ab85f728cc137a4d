//! HTTP clients for Genrun's remote boundaries.
//!
//! Three boundaries are covered:
//! - a synchronous generation call ([`GenerationClient`])
//! - a job-based provider with submit and status endpoints ([`JobClient`])
//! - plain byte downloads ([`HttpFetcher`])
//!
//! Each is also described by an async trait so callers can substitute fakes.

pub mod backend;
pub mod error;
pub mod fetch;
pub mod generation;
pub mod jobs;

pub use backend::{FetchedBytes, Fetcher, GenerationBackend, JobBackend, StatusQuery};
pub use error::ClientError;
pub use fetch::HttpFetcher;
pub use generation::{ContentPart, GenerationClient, GenerationRequest, Message, MessageContent};
pub use jobs::{JobClient, JobSubmission};
