//! Read-only HTTP client for dependency hosts
//!
//! Wraps a `ureq` agent with existence probes (HEAD), GitHub release lookups
//! and streaming GETs. The GitHub token is only attached to requests the
//! caller marks as authenticated, so it never reaches third-party hosts.
//!
//! ## GitHub Authentication
//!
//! Set `github_tokens` under `[depends]` in `watchdogs.toml`, or export
//! `GITHUB_TOKEN`, to raise the API rate limit from 60/hr to 5000/hr.

use crate::core::error::{DependError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Default HTTP timeout in seconds
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Downloads get a longer budget than API calls and probes
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Default GitHub API base URL
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Default GitHub web base URL (source archives live here)
pub const GITHUB_WEB_BASE: &str = "https://github.com";

const USER_AGENT: &str = concat!("pawndeps/", env!("CARGO_PKG_VERSION"));

/// Get HTTP timeout from `PAWNDEPS_HTTP_TIMEOUT` or use default.
/// Only reads the env var once.
fn get_http_timeout() -> Duration {
    static TIMEOUT: OnceLock<Duration> = OnceLock::new();
    *TIMEOUT.get_or_init(|| {
        let secs = std::env::var("PAWNDEPS_HTTP_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        Duration::from_secs(secs.clamp(5, 300))
    })
}

/// A GitHub release as returned by `/releases/latest` and `/releases/tags/{tag}`
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// One downloadable file attached to a release
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    #[serde(default)]
    pub name: String,
    pub browser_download_url: String,
}

impl ReleaseAsset {
    /// The asset's file name, or the last URL segment when the API left it blank.
    pub fn file_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        let url = self.browser_download_url.as_str();
        let path = url.split(['?', '#']).next().unwrap_or(url);
        path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
    }
}

impl AsRef<str> for ReleaseAsset {
    fn as_ref(&self) -> &str {
        self.file_name()
    }
}

/// HTTP client bound to a GitHub API/web base and an optional token.
#[derive(Clone)]
pub struct HostingClient {
    agent: ureq::Agent,
    api_base: String,
    web_base: String,
    /// Per-domain base URLs for non-GitHub hosts
    hosts: HashMap<String, String>,
    token: Option<String>,
}

impl std::fmt::Debug for HostingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostingClient")
            .field("api_base", &self.api_base)
            .field("web_base", &self.web_base)
            .field("hosts", &self.hosts)
            .field("token", &self.token.as_ref().map(|_| "****"))
            .finish()
    }
}

impl HostingClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_bases(GITHUB_API_BASE, GITHUB_WEB_BASE, token)
    }

    /// Point the client at different GitHub bases (mirrors, test servers).
    pub fn with_bases(api_base: &str, web_base: &str, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(get_http_timeout())
            .build();
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_string(),
            web_base: web_base.trim_end_matches('/').to_string(),
            hosts: HashMap::new(),
            token,
        }
    }

    /// Serve `domain` from `base` instead of `https://{domain}`.
    pub fn with_host_base(mut self, domain: &str, base: &str) -> Self {
        self.hosts.insert(
            domain.to_ascii_lowercase(),
            base.trim_end_matches('/').to_string(),
        );
        self
    }

    pub fn web_base(&self) -> &str {
        &self.web_base
    }

    /// Base URL for archives on a non-GitHub `domain`.
    pub fn host_base(&self, domain: &str) -> String {
        self.hosts
            .get(&domain.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| format!("https://{}", domain))
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn authorize(&self, request: ureq::Request, authenticated: bool) -> ureq::Request {
        match (&self.token, authenticated) {
            (Some(token), true) => request.set("Authorization", &format!("Bearer {}", token)),
            _ => request,
        }
    }

    /// Create a GitHub API request builder with proper headers and auth.
    fn github_request(&self, url: &str) -> ureq::Request {
        let request = self
            .agent
            .get(url)
            .timeout(get_http_timeout())
            .set("Accept", "application/vnd.github.v3+json");
        self.authorize(request, true)
    }

    fn fetch_release(&self, url: &str, what: &str) -> Result<Release> {
        let response = self.github_request(url).call().map_err(|e| match e {
            ureq::Error::Status(403, _) => DependError::transport(
                url,
                "GitHub API rate limit exceeded. Try again later or set a GitHub token.",
            ),
            ureq::Error::Status(404, _) => DependError::NotFound(what.to_string()),
            other => DependError::transport(url, other),
        })?;

        response
            .into_json::<Release>()
            .map_err(|e| DependError::transport(url, format!("failed to parse GitHub response: {}", e)))
    }

    /// Most recent published release of `owner/repo`.
    pub fn latest_release(&self, owner: &str, repo: &str) -> Result<Release> {
        let url = format!("{}/repos/{}/{}/releases/latest", self.api_base, owner, repo);
        self.fetch_release(&url, &format!("latest release of {}/{}", owner, repo))
    }

    /// Release of `owner/repo` published under `tag`.
    pub fn release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.api_base, owner, repo, tag
        );
        self.fetch_release(&url, &format!("release {} of {}/{}", tag, owner, repo))
    }

    /// Existence check: HEAD with redirects followed, 2xx-3xx counts as reachable.
    pub fn probe(&self, url: &str, authenticated: bool) -> bool {
        let request = self.agent.head(url).timeout(get_http_timeout());
        match self.authorize(request, authenticated).call() {
            Ok(response) => (200..400).contains(&response.status()),
            Err(_) => false,
        }
    }

    /// Start a streaming GET. Non-2xx statuses are errors.
    pub fn get(&self, url: &str, authenticated: bool) -> Result<ureq::Response> {
        let request = self
            .agent
            .get(url)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS));
        self.authorize(request, authenticated)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => DependError::transport(url, format!("HTTP {}", code)),
                other => DependError::transport(url, other),
            })
    }
}
