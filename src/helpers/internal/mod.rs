//! Internal utility modules shared by the pipeline stages.

pub mod fs_utils;
pub mod hash;
pub mod progress;
