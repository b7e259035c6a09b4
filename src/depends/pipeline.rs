//! Batch install: parse, resolve and download every reference, then
//! extract and install what was fetched.
//!
//! No failure stops the batch. Each reference ends with exactly one
//! [`Outcome`], reported in input order. A reference listed twice is
//! fetched once, and no two downloads in a batch share a file name.

use crate::core::config::InstallTarget;
use crate::core::error::{DependError, Result};
use crate::core::output;
use crate::depends::fingerprint::FingerprintRecorder;
use crate::depends::install::{Classification, Installer};
use crate::depends::prompt::Confirm;
use crate::depends::reference::RepositoryReference;
use crate::depends::resolve::Resolver;
use crate::helpers::acquire::download::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, DownloadRequest, Downloader,
};
use crate::helpers::acquire::http::HostingClient;
use crate::helpers::build::extract::{ExtractOutcome, archive_stem, extract};
use crate::helpers::internal::hash::HashAlgorithm;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extraction area inside the project root, removed once empty
pub const STAGING_DIR: &str = ".pawndeps";

#[derive(Debug)]
pub enum Outcome {
    /// Extracted and placed. `errors` counts files that could not be placed.
    Installed {
        headers: usize,
        plugins: usize,
        errors: usize,
    },
    /// Downloaded but not an archive; left in the project root.
    Saved(PathBuf),
    /// Listed earlier in the same batch; not fetched again.
    Duplicate,
    Failed(DependError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }

    fn describe(&self) -> String {
        match self {
            Outcome::Installed {
                headers,
                plugins,
                errors: 0,
            } => format!("installed ({} headers, {} plugins)", headers, plugins),
            Outcome::Installed {
                headers,
                plugins,
                errors,
            } => format!(
                "installed ({} headers, {} plugins, {} files failed)",
                headers, plugins, errors
            ),
            Outcome::Saved(path) => format!("saved {} (not an archive)", path.display()),
            Outcome::Duplicate => "skipped (already listed in this batch)".to_string(),
            Outcome::Failed(e) => format!("failed: {}", e),
        }
    }
}

#[derive(Debug)]
pub struct ReferenceOutcome {
    pub input: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ReferenceOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome_of(&self, input: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.input == input)
            .map(|o| &o.outcome)
    }

    /// One line per reference, then the totals.
    pub fn print_summary(&self) {
        output::action("Summary");
        for o in &self.outcomes {
            output::outcome(&o.input, &o.outcome.describe(), o.outcome.is_success());
        }
        let line = format!("installed {}, failed {}", self.succeeded(), self.failed());
        if self.failed() == 0 {
            output::success(&line);
        } else {
            output::warning(&line);
        }
    }
}

/// A download waiting for extraction.
struct Fetched {
    index: usize,
    archive: PathBuf,
}

/// Reserve a download name for `reference`. Names are compared without
/// case; a taken name gets an `owner-repo-` prefix, then a counter.
fn claim_filename(
    claimed: &mut HashSet<String>,
    reference: &RepositoryReference,
    filename: &str,
) -> String {
    let mut candidate = filename.to_string();
    let mut round = 1;
    while !claimed.insert(candidate.to_lowercase()) {
        round += 1;
        candidate = match round {
            2 => format!("{}-{}-{}", reference.owner, reference.name, filename),
            n => format!("{}-{}-{}-{}", reference.owner, reference.name, n, filename),
        };
    }
    candidate
}

pub struct Pipeline<'a> {
    client: &'a HostingClient,
    target: &'a InstallTarget,
    confirm: &'a dyn Confirm,
    branch: String,
    fingerprint: HashAlgorithm,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<'a> Pipeline<'a> {
    pub fn new(client: &'a HostingClient, target: &'a InstallTarget, confirm: &'a dyn Confirm) -> Self {
        Self {
            client,
            target,
            confirm,
            branch: "main".to_string(),
            fingerprint: HashAlgorithm::Sha256,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_fingerprint(mut self, algorithm: HashAlgorithm) -> Self {
        self.fingerprint = algorithm;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_delay = retry_delay;
        self
    }

    pub fn run<S: AsRef<str>>(&self, inputs: &[S]) -> BatchReport {
        let mut outcomes: Vec<Option<Outcome>> = inputs.iter().map(|_| None).collect();
        let mut fetched = Vec::new();
        let mut seen = HashSet::new();
        let mut claimed = HashSet::new();

        for (index, input) in inputs.iter().enumerate() {
            let input = input.as_ref().trim();
            output::action_numbered(index + 1, inputs.len(), input);
            let result = RepositoryReference::parse(input).and_then(|reference| {
                if seen.insert(reference.to_string()) {
                    self.fetch(&reference, &mut claimed).map(Some)
                } else {
                    Ok(None)
                }
            });
            match result {
                Ok(Some(archive)) => fetched.push(Fetched { index, archive }),
                Ok(None) => {
                    output::skip(&format!("{} is already in this batch", input));
                    outcomes[index] = Some(Outcome::Duplicate);
                }
                Err(e) => {
                    output::error(&format!("{}: {}", input, e));
                    outcomes[index] = Some(Outcome::Failed(e));
                }
            }
        }

        if !fetched.is_empty() {
            output::action(&format!("Installing {} downloaded package(s)", fetched.len()));
        }
        for item in fetched {
            outcomes[item.index] = Some(self.unpack_and_install(&item.archive));
        }

        BatchReport {
            outcomes: inputs
                .iter()
                .zip(outcomes)
                .map(|(input, outcome)| ReferenceOutcome {
                    input: input.as_ref().trim().to_string(),
                    outcome: outcome.unwrap_or_else(|| {
                        Outcome::Failed(DependError::NotFound(input.as_ref().to_string()))
                    }),
                })
                .collect(),
        }
    }

    /// Resolve and download one reference into the project root.
    fn fetch(
        &self,
        reference: &RepositoryReference,
        claimed: &mut HashSet<String>,
    ) -> Result<PathBuf> {
        output::sub_action("resolve");
        let resolver = Resolver::new(self.client, self.target.os, self.branch.as_str());
        let resolved = resolver.resolve(reference)?;
        output::detail(&resolved.url);

        let filename = claim_filename(claimed, reference, &resolved.filename);
        let request = DownloadRequest {
            filename: &filename,
            ..resolved.request()
        };

        output::sub_action("download");
        Downloader::new(self.client)
            .with_retry(self.max_attempts, self.retry_delay)
            .fetch(&request, &self.target.root)
    }

    /// A download that is not an archive stays in the project root, minus
    /// the `.zip` it was named with.
    fn keep_as_file(&self, download: &Path) -> Outcome {
        let restored = download
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
            .then(|| download.with_extension(""))
            .filter(|plain| !plain.exists());

        let saved = match restored {
            Some(plain) => match std::fs::rename(download, &plain) {
                Ok(()) => plain,
                Err(e) => {
                    output::warning(&format!("cannot rename {}: {}", download.display(), e));
                    download.to_path_buf()
                }
            },
            None => download.to_path_buf(),
        };
        output::skip(&format!("not an archive, saved as {}", saved.display()));
        Outcome::Saved(saved)
    }

    fn unpack_and_install(&self, archive: &Path) -> Outcome {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let staging = self.target.root.join(STAGING_DIR);
        let dest = staging.join(archive_stem(&name));

        output::sub_action(&format!("unpack {}", name));
        if dest.exists()
            && let Err(e) = std::fs::remove_dir_all(&dest)
        {
            return Outcome::Failed(DependError::fs(&dest, e));
        }

        match extract(archive, &dest) {
            Ok(ExtractOutcome::Extracted) => {}
            Ok(ExtractOutcome::NotAnArchive) => {
                let _ = std::fs::remove_dir(&staging);
                return self.keep_as_file(archive);
            }
            Err(e) => {
                output::error(&format!("cannot extract {}: {}", name, e));
                let _ = std::fs::remove_dir_all(&dest);
                let _ = std::fs::remove_dir(&staging);
                return Outcome::Failed(e);
            }
        }

        if self.confirm.confirm(&format!("Remove archive {}?", name))
            && let Err(e) = std::fs::remove_file(archive)
        {
            output::warning(&format!("cannot remove {}: {}", archive.display(), e));
        }

        output::sub_action(&format!("install {}", archive_stem(&name)));
        let installer = Installer::new(self.target, FingerprintRecorder::new(self.fingerprint));
        let report = installer.install(&dest);
        // Only succeeds once the last package has left the staging area.
        let _ = std::fs::remove_dir(&staging);

        Outcome::Installed {
            headers: report.count(Classification::IncludeHeader),
            plugins: report.count(Classification::PluginBinary),
            errors: report.failures.len(),
        }
    }
}
