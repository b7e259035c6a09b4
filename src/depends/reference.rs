//! Dependency reference parsing
//!
//! Accepted shapes, checked in order:
//!
//! - `github/owner/repo`, `gitlab/owner/repo`, `gitea/owner/repo`, `sourceforge/owner/repo`
//! - `https://github.com/owner/repo` (any scheme-prefixed URL)
//! - `domain.tld/owner/repo` (known domains map to their host, others are custom)
//! - `owner/repo` (GitHub)
//!
//! Any of them may end in `?tag` or `:tag`. Parsing is pure string work.

use crate::core::error::{DependError, Result};
use std::fmt;
use std::str::FromStr;

/// Hosting service a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    GitHub,
    GitLab,
    Gitea,
    SourceForge,
    Custom,
}

impl Host {
    pub fn default_domain(&self) -> Option<&'static str> {
        match self {
            Self::GitHub => Some("github.com"),
            Self::GitLab => Some("gitlab.com"),
            Self::Gitea => Some("gitea.com"),
            Self::SourceForge => Some("sourceforge.net"),
            Self::Custom => None,
        }
    }

    fn from_shorthand(segment: &str) -> Option<Self> {
        match segment {
            "github" => Some(Self::GitHub),
            "gitlab" => Some(Self::GitLab),
            "gitea" => Some(Self::Gitea),
            "sourceforge" => Some(Self::SourceForge),
            _ => None,
        }
    }

    fn from_domain(domain: &str) -> Self {
        let domain = domain.to_ascii_lowercase();
        if domain.contains("github") {
            Self::GitHub
        } else if domain.contains("gitlab") {
            Self::GitLab
        } else if domain.contains("gitea") {
            Self::Gitea
        } else if domain.contains("sourceforge") {
            Self::SourceForge
        } else {
            Self::Custom
        }
    }

    fn shorthand(&self) -> Option<&'static str> {
        match self {
            Self::GitHub => Some("github"),
            Self::GitLab => Some("gitlab"),
            Self::Gitea => Some("gitea"),
            Self::SourceForge => Some("sourceforge"),
            Self::Custom => None,
        }
    }
}

/// A parsed dependency reference. `owner` and `name` are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    pub host: Host,
    pub domain: String,
    pub owner: String,
    pub name: String,
    pub tag: Option<String>,
}

impl RepositoryReference {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &'static str| DependError::InvalidReference {
            input: input.to_string(),
            reason,
        };

        let raw = input.trim();
        if raw.is_empty() {
            return Err(invalid("empty reference"));
        }

        let raw = raw
            .strip_prefix("https://")
            .or_else(|| raw.strip_prefix("http://"))
            .unwrap_or(raw);

        // `host:8080/owner/repo` is a port, not a tag.
        let (path, tag) = match raw.rfind(['?', ':']).filter(|&i| !raw[i..].contains('/')) {
            Some(idx) => {
                let tag = raw[idx + 1..].trim();
                (&raw[..idx], (!tag.is_empty()).then(|| tag.to_string()))
            }
            None => (raw, None),
        };

        let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();

        let (host, domain, rest) = match segments.as_slice() {
            [first, rest @ ..] if Host::from_shorthand(first).is_some() => {
                let host = Host::from_shorthand(first).unwrap_or(Host::GitHub);
                let domain = host.default_domain().unwrap_or_default().to_string();
                (host, domain, rest)
            }
            [first, rest @ ..] if first.contains('.') => {
                (Host::from_domain(first), first.to_string(), rest)
            }
            all => (Host::GitHub, "github.com".to_string(), all),
        };

        let owner = rest.first().map(|s| s.trim()).unwrap_or_default();
        let name = rest
            .get(1)
            .map(|s| s.trim())
            .map(|s| s.strip_suffix(".git").unwrap_or(s))
            .unwrap_or_default();

        if owner.is_empty() {
            return Err(invalid("missing owner"));
        }
        if name.is_empty() {
            return Err(invalid("missing repository name"));
        }

        Ok(Self {
            host,
            domain,
            owner: owner.to_string(),
            name: name.to_string(),
            tag,
        })
    }

    /// True when the tag asks for the newest published release.
    pub fn wants_latest(&self) -> bool {
        matches!(self.tag.as_deref(), Some("latest") | Some("newer"))
    }
}

impl FromStr for RepositoryReference {
    type Err = DependError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let is_default_domain = self.host.default_domain() == Some(self.domain.as_str());
        match (self.host, self.host.shorthand()) {
            (Host::GitHub, _) if is_default_domain => {}
            (_, Some(short)) if is_default_domain => write!(f, "{}/", short)?,
            _ => write!(f, "{}/", self.domain)?,
        }
        write!(f, "{}/{}", self.owner, self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, "?{}", tag)?;
        }
        Ok(())
    }
}
