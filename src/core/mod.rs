//! Core types shared across the pipeline: output, errors, project configuration.

pub mod config;
pub mod error;
pub mod output;

pub use config::{ConfigKind, InstallTarget, ProjectConfig, ServerKind, TargetOs};
pub use error::{DependError, Result};
