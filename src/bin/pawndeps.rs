//! pawndeps - dependency installer for Pawn server projects
//!
//! Usage:
//!   pawndeps install <refs...>     Install the given references
//!   pawndeps install               Install [dependencies].packages from watchdogs.toml

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pawn_deps::{
    Confirm, FixedAnswer, HostingClient, Pipeline, ProjectConfig, TargetOs, TerminalConfirm,
    core::config::usable_token, output,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pawndeps")]
#[command(about = "Dependency installer for SA-MP and open.mp Pawn projects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (directory holding watchdogs.toml)
    #[arg(short = 'C', long = "project", global = true, default_value = ".")]
    project: PathBuf,

    /// GitHub token; overrides [depends].github_tokens
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Branch tried first for untagged references
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Target OS for plugin binaries (windows or linux)
    #[arg(long, global = true, value_parser = parse_os)]
    os: Option<TargetOs>,

    /// Answer yes to every prompt
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Keep downloaded archives after extraction
    #[arg(long, global = true, conflicts_with = "yes")]
    keep_archives: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install dependencies into the project
    Install {
        /// References like `owner/repo`, `owner/repo?latest`, `gitlab/owner/repo:v1.0`
        refs: Vec<String>,
    },
}

fn parse_os(s: &str) -> std::result::Result<TargetOs, String> {
    TargetOs::parse(s).ok_or_else(|| format!("unknown os '{}' (expected windows or linux)", s))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.project.is_dir() {
        bail!("project directory not found: {}", cli.project.display());
    }
    let root = cli
        .project
        .canonicalize()
        .with_context(|| format!("Failed to resolve project directory: {}", cli.project.display()))?;

    let mut config = ProjectConfig::load(&root)
        .with_context(|| format!("Failed to load {}", root.join("watchdogs.toml").display()))?;
    if let Some(os) = cli.os {
        config.os = os;
    }
    if let Some(branch) = cli.branch {
        config.branch = branch;
    }
    if let Some(token) = usable_token(cli.token.as_deref()) {
        config.github_token = Some(token);
    }

    match cli.command {
        Commands::Install { refs } => {
            let refs = if refs.is_empty() {
                config.packages.clone()
            } else {
                refs
            };
            if refs.is_empty() {
                output::info("Nothing to install (no references given, no [dependencies].packages)");
                return Ok(());
            }

            let target = config.install_target();
            output::info(&format!(
                "Project {} ({:?}, {})",
                root.display(),
                target.server_kind,
                target.os.name()
            ));

            let client = HostingClient::new(config.github_token.clone());
            let confirm: Box<dyn Confirm> = if cli.yes {
                Box::new(FixedAnswer(true))
            } else if cli.keep_archives {
                Box::new(FixedAnswer(false))
            } else {
                Box::new(TerminalConfirm)
            };

            let report = Pipeline::new(&client, &target, confirm.as_ref())
                .with_branch(config.branch.as_str())
                .with_fingerprint(config.fingerprint)
                .run(&refs);
            report.print_summary();
        }
    }

    Ok(())
}
