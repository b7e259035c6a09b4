//! Archive unpacking.

pub mod extract;

pub use extract::{ArchiveFormat, ExtractOutcome, archive_stem, detect_format, extract};
