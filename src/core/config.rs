//! Project configuration (`watchdogs.toml`) and the install target derived from it.
//!
//! ```toml
//! [general]
//! os = "linux"
//! config = "server.cfg"
//!
//! [compiler]
//! input = "gamemodes/main.pwn"
//!
//! [depends]
//! github_tokens = "ghp_..."
//! root_patterns = "lib log config"
//!
//! [dependencies]
//! packages = ["Y-Less/sscanf?latest", "samp-incognito/samp-streamer-plugin:latest"]
//! ```

use crate::core::error::{DependError, Result};
use crate::helpers::internal::hash::HashAlgorithm;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name of the project configuration, relative to the project root
pub const PROJECT_FILE: &str = "watchdogs.toml";

/// Prefixes of top-level files that belong in the project root, not `plugins/`
const DEFAULT_ROOT_PATTERNS: &str = "lib log config msvc vcruntime ucrt";

const DEFAULT_BRANCH: &str = "main";

/// Value written by project generators before the user fills in a real token
const TOKEN_PLACEHOLDER: &str = "DO_HERE";

/// Operating system whose plugin binaries should be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    Windows,
    Linux,
}

impl TargetOs {
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" | "win" | "win32" => Some(Self::Windows),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }

    /// Extension (without dot) of loadable plugin binaries on this OS
    pub fn plugin_extension(&self) -> &'static str {
        match self {
            Self::Windows => "dll",
            Self::Linux => "so",
        }
    }
}

/// Which server flavor the project targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Samp,
    OpenMp,
}

impl ServerKind {
    /// Directory holding the Pawn compiler and its `include/` folder
    pub fn compiler_dir(&self) -> &'static str {
        match self {
            Self::Samp => "pawno",
            Self::OpenMp => "qawno",
        }
    }

    /// Include directive new includes are inserted after
    pub fn anchor_include(&self) -> &'static str {
        match self {
            Self::Samp => "a_samp",
            Self::OpenMp => "open.mp",
        }
    }

    pub fn default_config(&self) -> &'static str {
        match self {
            Self::Samp => "server.cfg",
            Self::OpenMp => "config.json",
        }
    }

    /// Guess the flavor from the files already present in the project root.
    pub fn detect(root: &Path) -> Self {
        if root.join("qawno").is_dir() && root.join("components").is_dir() {
            Self::OpenMp
        } else if root.join("pawno").is_dir() || root.join("server.cfg").is_file() {
            Self::Samp
        } else if root.join("config.json").is_file() {
            Self::OpenMp
        } else {
            Self::Samp
        }
    }
}

/// Shape of the server configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// Line-oriented `key value` file (`server.cfg`)
    CfgLines,
    /// JSON document with a `pawn.legacy_plugins` array (`config.json`)
    Json,
}

impl ConfigKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::CfgLines,
        }
    }
}

/// Where installed files go, derived once per run from the project.
#[derive(Debug, Clone)]
pub struct InstallTarget {
    pub root: PathBuf,
    pub server_kind: ServerKind,
    pub os: TargetOs,
    pub include_dir: PathBuf,
    pub plugins_dir: PathBuf,
    pub components_dir: Option<PathBuf>,
    pub config_path: PathBuf,
    pub config_kind: ConfigKind,
    pub entry_source: Option<PathBuf>,
    pub root_patterns: Vec<String>,
}

impl InstallTarget {
    /// Conventional layout for `kind` rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, server_kind: ServerKind, os: TargetOs) -> Self {
        let root = root.into();
        let config_path = root.join(server_kind.default_config());
        Self {
            include_dir: root.join(server_kind.compiler_dir()).join("include"),
            plugins_dir: root.join("plugins"),
            components_dir: match server_kind {
                ServerKind::OpenMp => Some(root.join("components")),
                ServerKind::Samp => None,
            },
            config_kind: ConfigKind::from_path(&config_path),
            config_path,
            entry_source: None,
            root_patterns: split_patterns(DEFAULT_ROOT_PATTERNS),
            server_kind,
            os,
            root,
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = self.root.join(path.into());
        self.config_kind = ConfigKind::from_path(&self.config_path);
        self
    }

    pub fn with_entry_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry_source = Some(self.root.join(path.into()));
        self
    }

    pub fn with_root_patterns(mut self, patterns: Vec<String>) -> Self {
        self.root_patterns = patterns;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProjectToml {
    general: Option<GeneralToml>,
    compiler: Option<CompilerToml>,
    depends: Option<DependsToml>,
    dependencies: Option<DependenciesToml>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneralToml {
    os: Option<String>,
    config: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CompilerToml {
    input: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DependsToml {
    github_tokens: Option<String>,
    root_patterns: Option<String>,
    branch: Option<String>,
    fingerprint: Option<String>,
    aio_repo: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct DependenciesToml {
    #[serde(default)]
    packages: Vec<String>,
}

/// Resolved project settings.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub os: TargetOs,
    pub server_kind: ServerKind,
    pub config_path: PathBuf,
    pub entry_source: Option<PathBuf>,
    pub github_token: Option<String>,
    pub root_patterns: Vec<String>,
    pub branch: String,
    pub fingerprint: HashAlgorithm,
    pub packages: Vec<String>,
}

impl ProjectConfig {
    /// Load `watchdogs.toml` from `root`. A missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(PROJECT_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(DependError::fs(&path, e)),
        };
        Self::from_toml_str(root, &content)
    }

    pub fn from_toml_str(root: &Path, content: &str) -> Result<Self> {
        let parsed: ProjectToml = toml::from_str(content).map_err(|e| DependError::ConfigParse {
            path: root.join(PROJECT_FILE),
            message: e.to_string(),
        })?;

        let general = parsed.general.unwrap_or_default();
        let depends = parsed.depends.unwrap_or_default();

        let os = match general.os.as_deref() {
            Some(raw) => TargetOs::parse(raw).ok_or_else(|| DependError::ConfigParse {
                path: root.join(PROJECT_FILE),
                message: format!("unknown os '{}' (expected windows or linux)", raw),
            })?,
            None => TargetOs::host(),
        };

        let server_kind = match general.config.as_deref().map(Path::new) {
            Some(p) if ConfigKind::from_path(p) == ConfigKind::Json => ServerKind::OpenMp,
            Some(p) if p.extension().is_some_and(|e| e.eq_ignore_ascii_case("cfg")) => {
                ServerKind::Samp
            }
            _ => ServerKind::detect(root),
        };

        let config_path = root.join(
            general
                .config
                .unwrap_or_else(|| server_kind.default_config().to_string()),
        );

        let fingerprint = match depends.fingerprint.as_deref() {
            Some(raw) => HashAlgorithm::parse(raw).ok_or_else(|| DependError::ConfigParse {
                path: root.join(PROJECT_FILE),
                message: format!("unknown fingerprint algorithm '{}'", raw),
            })?,
            None => HashAlgorithm::Sha256,
        };

        let mut packages = parsed.dependencies.map(|d| d.packages).unwrap_or_default();
        for legacy in depends.aio_repo.unwrap_or_default() {
            if !packages.contains(&legacy) {
                packages.push(legacy);
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            os,
            server_kind,
            config_path,
            entry_source: parsed
                .compiler
                .and_then(|c| c.input)
                .filter(|s| !s.trim().is_empty())
                .map(|s| root.join(s)),
            github_token: usable_token(depends.github_tokens.as_deref()),
            root_patterns: split_patterns(
                depends
                    .root_patterns
                    .as_deref()
                    .unwrap_or(DEFAULT_ROOT_PATTERNS),
            ),
            branch: depends
                .branch
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            fingerprint,
            packages,
        })
    }

    pub fn install_target(&self) -> InstallTarget {
        let target = InstallTarget::new(&self.root, self.server_kind, self.os)
            .with_config_path(&self.config_path)
            .with_root_patterns(self.root_patterns.clone());
        match &self.entry_source {
            Some(source) => target.with_entry_source(source),
            None => target,
        }
    }
}

/// Filter out empty tokens and the generator placeholder.
pub fn usable_token(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|t| !t.is_empty() && !t.contains(TOKEN_PLACEHOLDER))
        .map(str::to_string)
}

fn split_patterns(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(|s| s.to_ascii_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = ProjectConfig::load(dir.path()).unwrap();

        assert_eq!(cfg.server_kind, ServerKind::Samp);
        assert_eq!(cfg.config_path, dir.path().join("server.cfg"));
        assert_eq!(cfg.branch, "main");
        assert!(cfg.entry_source.is_none());
        assert!(cfg.root_patterns.contains(&"lib".to_string()));
    }

    #[test]
    fn test_full_config() {
        let dir = TempDir::new().unwrap();
        let toml = r#"
[general]
os = "windows"
config = "config.json"

[compiler]
input = "gamemodes/main.pwn"

[depends]
github_tokens = "ghp_secret"
root_patterns = "LIB log"
branch = "develop"
fingerprint = "blake3"

[dependencies]
packages = ["Y-Less/sscanf?latest", "pawn-lang/YSI-Includes"]
"#;
        let cfg = ProjectConfig::from_toml_str(dir.path(), toml).unwrap();

        assert_eq!(cfg.os, TargetOs::Windows);
        assert_eq!(cfg.server_kind, ServerKind::OpenMp);
        assert_eq!(cfg.entry_source, Some(dir.path().join("gamemodes/main.pwn")));
        assert_eq!(cfg.github_token.as_deref(), Some("ghp_secret"));
        assert_eq!(cfg.root_patterns, vec!["lib", "log"]);
        assert_eq!(cfg.branch, "develop");
        assert!(matches!(cfg.fingerprint, HashAlgorithm::Blake3));
        assert_eq!(cfg.packages.len(), 2);

        let target = cfg.install_target();
        assert_eq!(target.config_path, dir.path().join("config.json"));
        assert_eq!(target.config_kind, ConfigKind::Json);
        assert_eq!(target.entry_source, cfg.entry_source);
        assert_eq!(target.root_patterns, vec!["lib", "log"]);
    }

    #[test]
    fn test_placeholder_token_ignored() {
        assert_eq!(usable_token(Some("DO_HERE")), None);
        assert_eq!(usable_token(Some("   ")), None);
        assert_eq!(usable_token(None), None);
        assert_eq!(usable_token(Some(" tok ")), Some("tok".to_string()));
    }

    #[test]
    fn test_aio_repo_merged_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let toml = r#"
[depends]
aio_repo = ["Y-Less/sscanf:latest", "a/b"]

[dependencies]
packages = ["a/b"]
"#;
        let cfg = ProjectConfig::from_toml_str(dir.path(), toml).unwrap();
        assert_eq!(cfg.packages, vec!["a/b", "Y-Less/sscanf:latest"]);
    }

    #[test]
    fn test_malformed_toml_is_config_parse_error() {
        let dir = TempDir::new().unwrap();
        let err = ProjectConfig::from_toml_str(dir.path(), "[general\nos=").unwrap_err();
        assert!(matches!(err, DependError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_os_rejected() {
        let dir = TempDir::new().unwrap();
        let err = ProjectConfig::from_toml_str(dir.path(), "[general]\nos = \"beos\"").unwrap_err();
        assert!(err.to_string().contains("beos"));
    }

    #[test]
    fn test_detect_open_mp_layout() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("qawno")).unwrap();
        std::fs::create_dir_all(dir.path().join("components")).unwrap();
        assert_eq!(ServerKind::detect(dir.path()), ServerKind::OpenMp);

        let cfg = ProjectConfig::load(dir.path()).unwrap();
        let target = cfg.install_target();
        assert_eq!(target.include_dir, dir.path().join("qawno/include"));
        assert_eq!(target.components_dir, Some(dir.path().join("components")));
        assert_eq!(target.config_kind, ConfigKind::Json);
    }

    #[test]
    fn test_detect_samp_layout() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("server.cfg"), "hostname test\n").unwrap();
        assert_eq!(ServerKind::detect(dir.path()), ServerKind::Samp);

        let target = InstallTarget::new(dir.path(), ServerKind::Samp, TargetOs::Linux);
        assert_eq!(target.include_dir, dir.path().join("pawno/include"));
        assert!(target.components_dir.is_none());
        assert_eq!(target.config_kind, ConfigKind::CfgLines);
    }
}
