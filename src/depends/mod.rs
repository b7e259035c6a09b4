//! The dependency pipeline
//!
//! Data flows one way: [`reference`] parses input, [`resolve`] turns it into a
//! verified URL (ranking release assets with [`select`]), the downloader in
//! `helpers::acquire` fetches it, and [`install`] places the extracted files,
//! calling [`mutate`] and [`fingerprint`] for each one. [`pipeline`] drives a
//! whole batch.

pub mod fingerprint;
pub mod install;
pub mod mutate;
pub mod pipeline;
pub mod prompt;
pub mod reference;
pub mod resolve;
pub mod select;

pub use fingerprint::{Fingerprint, FingerprintRecorder};
pub use install::{Classification, InstallReport, Installer, PlacedFile};
pub use mutate::Mutation;
pub use pipeline::{BatchReport, Outcome, Pipeline, ReferenceOutcome};
pub use prompt::{Confirm, FixedAnswer, TerminalConfirm};
pub use reference::{Host, RepositoryReference};
pub use resolve::{ResolvedDownload, Resolver};
pub use select::select_best;
