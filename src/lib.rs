//! Eventlens: a photo library for event photographers.
//!
//! Uploads are stored, enriched by remote analysis functions and recorded in
//! SQLite; the library can then be searched by meaning or by face and shared
//! through expiring, optionally face-gated links.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod functions;
pub mod logging;
pub mod pipeline;
pub mod storage;

pub use config::Config;
pub use error::{PipelineError, ServiceError, SoftFailure};
pub use pipeline::Context;
