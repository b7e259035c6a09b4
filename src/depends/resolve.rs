//! Release resolution: reference -> one verified download URL
//!
//! GitHub references walk a fallback ladder:
//!
//! 1. `latest`/`newer` asks the releases API for the newest tag; if that
//!    fails the reference is treated as untagged (branch ladder).
//! 2. A concrete tag uses the release's assets (ranked by [`select_best`]),
//!    else probes the tag's `.tar.gz` then `.zip` source archive.
//! 3. No tag probes branch archives for `[branch, main, master]`.
//!
//! Other hosts have no API step: their archive URL templates are probed directly.
//! Every URL is probed before it is returned, except assets handed back by a
//! successful releases API call.

use crate::core::config::TargetOs;
use crate::core::error::{DependError, Result};
use crate::core::output;
use crate::depends::reference::{Host, RepositoryReference};
use crate::depends::select::select_best;
use crate::helpers::acquire::download::DownloadRequest;
use crate::helpers::acquire::http::{HostingClient, Release};
use crate::helpers::build::extract::detect_format;

const FALLBACK_BRANCHES: &[&str] = &["main", "master"];

/// A verified download location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDownload {
    pub url: String,
    /// Local file name; always ends in an archive extension the extractor knows
    pub filename: String,
    /// Whether the host should receive the GitHub token
    pub authenticated: bool,
}

impl ResolvedDownload {
    pub fn request(&self) -> DownloadRequest<'_> {
        DownloadRequest {
            url: &self.url,
            filename: &self.filename,
            authenticated: self.authenticated,
        }
    }
}

/// Short tar suffixes and their long spelling.
const SHORT_SUFFIXES: &[(&str, &str)] = &[
    (".tgz", ".tar.gz"),
    (".txz", ".tar.xz"),
    (".tbz2", ".tar.bz2"),
    (".tzst", ".tar.zst"),
];

/// Local file name for an asset called `name`.
///
/// Short tar suffixes are spelled out (`pkg.tgz` -> `pkg.tar.gz`) and a name
/// with no archive extension gets `.zip` appended. The extractor goes by
/// content, so the appended suffix never decides how the file is unpacked.
pub fn local_filename(name: &str) -> String {
    let lower = name.to_lowercase();
    if let Some((short, long)) = SHORT_SUFFIXES.iter().find(|(s, _)| lower.ends_with(s)) {
        return format!("{}{}", &name[..name.len() - short.len()], long);
    }
    match detect_format(name) {
        Some(_) => name.to_string(),
        None => format!("{}.zip", name),
    }
}

/// Local file name for a download URL: [`local_filename`] of its last path
/// segment, or `<repo>.tar.gz` when the URL has no usable segment.
pub fn suggested_filename(url: &str, repo: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path
        .strip_prefix("https://")
        .or_else(|| path.strip_prefix("http://"))
        .unwrap_or(path);

    match path.trim_end_matches('/').split_once('/').map(|(_, p)| p) {
        Some(rest) => match rest.rsplit('/').next().filter(|s| !s.is_empty()) {
            Some(seg) => local_filename(seg),
            None => format!("{}.tar.gz", repo),
        },
        None => format!("{}.tar.gz", repo),
    }
}

/// Archive URL of `git_ref` for hosts addressed by URL template. `base` is
/// the host's scheme and authority, e.g. `https://gitlab.com`.
pub fn archive_url(base: &str, reference: &RepositoryReference, git_ref: &str) -> String {
    let RepositoryReference { owner, name, .. } = reference;
    match reference.host {
        Host::GitHub => format!("{base}/{owner}/{name}/archive/{git_ref}.zip"),
        Host::GitLab => format!("{base}/{owner}/{name}/-/archive/{git_ref}/{name}-{git_ref}.tar.gz"),
        Host::Gitea | Host::Custom => format!("{base}/{owner}/{name}/archive/{git_ref}.tar.gz"),
        Host::SourceForge => format!("{base}/projects/{name}/files/{git_ref}/download"),
    }
}

/// Tags and branches may contain `/`; keep file names flat.
fn flat(git_ref: &str) -> String {
    git_ref.replace(['/', '\\'], "-")
}

pub struct Resolver<'a> {
    client: &'a HostingClient,
    os: TargetOs,
    branch: String,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a HostingClient, os: TargetOs, branch: impl Into<String>) -> Self {
        Self {
            client,
            os,
            branch: branch.into(),
        }
    }

    /// Branches tried when no tag is known, caller's choice first.
    fn branch_ladder(&self) -> Vec<&str> {
        let mut ladder = vec![self.branch.as_str()];
        for b in FALLBACK_BRANCHES {
            if !ladder.contains(b) {
                ladder.push(b);
            }
        }
        ladder
    }

    pub fn resolve(&self, reference: &RepositoryReference) -> Result<ResolvedDownload> {
        let resolved = match reference.host {
            Host::GitHub if reference.domain == "github.com" => self.resolve_github(reference),
            _ => self.resolve_templated(reference),
        };
        resolved.ok_or_else(|| DependError::NotFound(reference.to_string()))
    }

    fn resolve_github(&self, r: &RepositoryReference) -> Option<ResolvedDownload> {
        let mut tag = r.tag.clone();
        let mut known_release: Option<Release> = None;

        if r.wants_latest() {
            match self.client.latest_release(&r.owner, &r.name) {
                Ok(release) => {
                    output::detail(&format!("latest release: {}", release.tag_name));
                    tag = Some(release.tag_name.clone());
                    known_release = Some(release);
                }
                Err(e) => {
                    output::warning(&format!(
                        "cannot look up latest release of {}/{} ({}); trying branches",
                        r.owner, r.name, e
                    ));
                    tag = None;
                }
            }
        }

        let Some(tag) = tag else {
            return self.probe_github_branches(r);
        };

        let release = match known_release {
            Some(release) => Ok(release),
            None => self.client.release_by_tag(&r.owner, &r.name, &tag),
        };

        match release {
            Ok(release) if !release.assets.is_empty() => {
                if let Some(asset) = select_best(&release.assets, self.os) {
                    output::detail(&format!("selected asset {}", asset.file_name()));
                    let url = asset.browser_download_url.clone();
                    let filename = match asset.file_name() {
                        "" => suggested_filename(&url, &r.name),
                        name => local_filename(name),
                    };
                    return Some(ResolvedDownload {
                        url,
                        filename,
                        authenticated: true,
                    });
                }
            }
            Ok(_) => output::detail(&format!("release {} has no assets", tag)),
            Err(e) => output::detail(&format!("no release for tag {}: {}", tag, e)),
        }

        ["tar.gz", "zip"].iter().find_map(|ext| {
            let url = format!(
                "{}/{}/{}/archive/refs/tags/{}.{}",
                self.client.web_base(),
                r.owner,
                r.name,
                tag,
                ext
            );
            self.probe(&url, true).then(|| ResolvedDownload {
                url,
                filename: format!("{}-{}.{}", r.name, flat(&tag), ext),
                authenticated: true,
            })
        })
    }

    fn probe_github_branches(&self, r: &RepositoryReference) -> Option<ResolvedDownload> {
        self.branch_ladder().into_iter().find_map(|branch| {
            let url = format!(
                "{}/{}/{}/archive/refs/heads/{}.zip",
                self.client.web_base(),
                r.owner,
                r.name,
                branch
            );
            self.probe(&url, true).then(|| ResolvedDownload {
                url,
                filename: format!("{}-{}.zip", r.name, flat(branch)),
                authenticated: true,
            })
        })
    }

    fn resolve_templated(&self, r: &RepositoryReference) -> Option<ResolvedDownload> {
        let explicit_tag = r.tag.as_deref().filter(|_| !r.wants_latest());
        let refs: Vec<&str> = match (r.host, explicit_tag) {
            (_, Some(tag)) => vec![tag],
            (Host::SourceForge, None) => vec!["latest"],
            _ => self.branch_ladder(),
        };

        let ext = match r.host {
            Host::GitHub | Host::SourceForge => "zip",
            _ => "tar.gz",
        };

        let base = self.client.host_base(&r.domain);
        refs.into_iter().find_map(|git_ref| {
            let url = archive_url(&base, r, git_ref);
            self.probe(&url, false).then(|| ResolvedDownload {
                url,
                filename: format!("{}-{}.{}", r.name, flat(git_ref), ext),
                authenticated: false,
            })
        })
    }

    fn probe(&self, url: &str, authenticated: bool) -> bool {
        let reachable = self.client.probe(url, authenticated);
        output::detail(&format!(
            "{} {}",
            if reachable { "found" } else { "missing" },
            url
        ));
        reachable
    }
}
