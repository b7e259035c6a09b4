//! Dependency manager for SA-MP and open.mp Pawn projects
//!
//! Takes short repository references, finds a downloadable archive for each,
//! and places its contents into the project: headers into the compiler's
//! include folder, plugin binaries into `plugins/` (registered in the server
//! config), and an `#include` line into the entry source.
//!
//! # References
//!
//! ```text
//! Y-Less/sscanf                 GitHub, default branch
//! Y-Less/sscanf?latest          newest release
//! Y-Less/sscanf:v2.13.8         specific tag
//! gitlab/owner/repo             GitLab shorthand
//! https://gitea.com/owner/repo  full URL
//! git.example.org/owner/repo    custom host
//! ```
//!
//! # Project configuration
//!
//! Read from `watchdogs.toml` in the project root; see [`core::config`].
//!
//! # Example
//!
//! ```no_run
//! use pawn_deps::{FixedAnswer, HostingClient, Pipeline, ProjectConfig};
//! use std::path::Path;
//!
//! let config = ProjectConfig::load(Path::new(".")).unwrap();
//! let target = config.install_target();
//! let client = HostingClient::new(config.github_token.clone());
//! let confirm = FixedAnswer(true);
//!
//! let report = Pipeline::new(&client, &target, &confirm).run(&["Y-Less/sscanf?latest"]);
//! report.print_summary();
//! ```

pub mod core;
pub mod depends;
pub mod helpers;

pub use crate::core::output;
pub use crate::core::{ConfigKind, DependError, InstallTarget, ProjectConfig, Result, ServerKind, TargetOs};
pub use depends::{
    BatchReport, Confirm, FixedAnswer, Outcome, Pipeline, RepositoryReference, TerminalConfirm,
};
pub use helpers::acquire::HostingClient;
