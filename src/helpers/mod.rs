//! Plumbing used by the dependency pipeline
//!
//! - **acquire**: hosting client (probes, release lookups) and retrying downloads
//! - **build**: archive detection and extraction
//! - **internal**: progress bars, hashing, filesystem moves

pub mod acquire;
pub mod build;
pub mod internal;
