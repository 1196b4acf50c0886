//! flambda-switch - opam switch variants for flambda2 commits
//!
//! Clones (or refreshes) the flambda opam repository, copies the
//! `ocaml-variants.5.2.0+flambda2-*` template package under a new name,
//! points it at an arbitrary flambda-backend commit and optionally creates
//! the matching opam switch.
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]

pub mod cmd;
pub mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use flambda_switch_core::config::{Config, ConfigFile};
use flambda_switch_core::pipeline::Request;
use flambda_switch_core::prompt::{Confirm, FixedAnswer};
use flambda_switch_core::variant::VariantName;
use flambda_switch_core::SwitchError;

const EXAMPLES: &str = "\
Examples:
  # Create switch package with auto-calculated checksum
  flambda-switch --name my-test --commit 82e4553f8d75eb4e6f8e94cd9bf90369968f64d5

  # Create switch package with provided checksum
  flambda-switch --name my-test --commit abc123def --checksum c390e80899a92df4b39685987247b202bb0ce992084bd5c6139f1a029f39d43d

  # Use custom repository directory
  flambda-switch --name my-test --commit abc123def --repo-dir /path/to/opam-repo

  # Create both package and switch
  flambda-switch --name my-test --commit abc123def --create-switch";

#[derive(Debug, Parser)]
#[command(name = "flambda-switch")]
#[command(
    author,
    version,
    about = "Automate flambda2 switch creation for OCaml performance monitoring",
    after_help = EXAMPLES
)]
pub struct Cli {
    /// Name for the flambda2 variant (will be used as 5.2.0+NAME)
    #[arg(long)]
    pub name: VariantName,

    /// Git commit hash from the flambda-backend repository
    #[arg(long)]
    pub commit: String,

    /// SHA256 checksum of the source archive (calculated if not provided)
    #[arg(long)]
    pub checksum: Option<String>,

    /// Directory to clone/use opam-repository-flambda [default: ~/opam-repository-flambda]
    #[arg(long, env = "FLAMBDA_SWITCH_REPO_DIR")]
    pub repo_dir: Option<PathBuf>,

    /// GitHub user to take the commit from [default: ocaml-flambda]
    #[arg(long)]
    pub user: Option<String>,

    /// GitHub repository to take the commit from [default: flambda-backend]
    #[arg(long)]
    pub repo: Option<String>,

    /// Skip cloning/updating the repository (assume it already exists)
    #[arg(long)]
    pub skip_clone: bool,

    /// Also create the opam switch after creating the package
    #[arg(long)]
    pub create_switch: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, conflicts_with = "no")]
    pub yes: bool,

    /// Answer no to every confirmation prompt
    #[arg(long)]
    pub no: bool,

    /// TOML file overriding repository, template and tool settings
    #[arg(long, env = "FLAMBDA_SWITCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// git executable
    #[arg(long, env = "FLAMBDA_SWITCH_GIT", hide = true)]
    pub git: Option<String>,

    /// opam executable
    #[arg(long, env = "FLAMBDA_SWITCH_OPAM", hide = true)]
    pub opam: Option<String>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Assemble the run configuration: defaults, then the overrides file,
    /// then the executable overrides.
    pub fn load_config(&self) -> Result<Config, SwitchError> {
        let mut config = Config::resolve(self.repo_dir.clone())?;
        if let Some(path) = &self.config {
            config.apply(ConfigFile::load(path)?);
        }
        if let Some(git) = &self.git {
            config.git_program.clone_from(git);
        }
        if let Some(opam) = &self.opam {
            config.opam_program.clone_from(opam);
        }
        Ok(config)
    }

    /// The pipeline request, falling back to `config` for the GitHub source.
    pub fn request(&self, config: &Config) -> Request {
        Request {
            name: self.name.clone(),
            commit: self.commit.clone(),
            checksum: self.checksum.clone(),
            user: self
                .user
                .clone()
                .unwrap_or_else(|| config.github_user.clone()),
            repo: self
                .repo
                .clone()
                .unwrap_or_else(|| config.github_repo.clone()),
            skip_clone: self.skip_clone,
            create_switch: self.create_switch,
        }
    }

    /// Confirmation policy selected by `--yes` / `--no`.
    pub fn confirm_policy(&self) -> Arc<dyn Confirm> {
        if self.yes {
            Arc::new(FixedAnswer(true))
        } else if self.no {
            Arc::new(FixedAnswer(false))
        } else {
            Arc::new(ui::TerminalPrompt)
        }
    }
}
