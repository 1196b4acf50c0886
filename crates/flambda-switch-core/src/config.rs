//! Process-wide configuration.
//!
//! Everything the tool treats as a constant (where the opam repository lives,
//! which template package is cloned, which literals get rewritten) is carried
//! by [`Config`]. It is built once at startup and handed down, so tests can run
//! against a scratch checkout without touching the environment.
//!
//! A TOML overrides file may replace any field:
//!
//! ```toml
//! branch = "with-extensions"
//! template_variant = "flambda2-82e4553f"
//! template_url = "https://github.com/ocaml-flambda/flambda-backend/archive/82e4553f8d75eb4e6f8e94cd9bf90369968f64d5.tar.gz"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::variant::VariantName;

/// Upstream opam repository carrying the flambda2 template packages.
pub const DEFAULT_REMOTE_URL: &str = "https://github.com/bclement-ocp/opam-repository-flambda";
/// Branch of [`DEFAULT_REMOTE_URL`] that holds the templates.
pub const DEFAULT_BRANCH: &str = "with-extensions";
/// Name the checkout is registered under in opam.
pub const DEFAULT_OPAM_REPO_ID: &str = "with-extensions";
/// Package family directory under `packages/`.
pub const DEFAULT_PACKAGE_FAMILY: &str = "ocaml-variants";
/// Compiler version every variant is based on.
pub const DEFAULT_BASE_VERSION: &str = "5.2.0";
/// Variant suffix of the template package.
pub const DEFAULT_TEMPLATE_VARIANT: &str = "flambda2-82e4553f";
/// Source URL literal found in the template `opam` file.
pub const DEFAULT_TEMPLATE_URL: &str = "https://github.com/ocaml-flambda/flambda-backend/archive/82e4553f8d75eb4e6f8e94cd9bf90369968f64d5.tar.gz";
/// Checksum literal found in the template `opam` file.
pub const DEFAULT_TEMPLATE_CHECKSUM: &str =
    "sha256=c390e80899a92df4b39685987247b202bb0ce992084bd5c6139f1a029f39d43d";
/// Host serving source archives.
pub const DEFAULT_ARCHIVE_HOST: &str = "github.com";
/// GitHub organisation the commit is taken from by default.
pub const DEFAULT_GITHUB_USER: &str = "ocaml-flambda";
/// GitHub repository the commit is taken from by default.
pub const DEFAULT_GITHUB_REPO: &str = "flambda-backend";
/// Directory name of the checkout under the user's home.
pub const DEFAULT_REPO_DIR_NAME: &str = "opam-repository-flambda";

/// Errors raised while assembling a [`Config`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The overrides file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        /// Path of the overrides file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The overrides file is not valid TOML or has unknown keys.
    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        /// Path of the overrides file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// No `--repo-dir` was given and the home directory is unknown.
    #[error("Could not determine home directory. Pass --repo-dir explicitly.")]
    NoHomeDir,
}

/// Returns the default checkout location (`~/opam-repository-flambda`), or
/// `None` if the user's home cannot be resolved.
pub fn default_repo_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(DEFAULT_REPO_DIR_NAME))
}

/// Resolved configuration for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Local checkout of the opam repository.
    pub repo_dir: PathBuf,
    /// Remote cloned into `repo_dir`.
    pub remote_url: String,
    /// Branch checked out in `repo_dir`.
    pub branch: String,
    /// Name the checkout is registered under in opam.
    pub opam_repo_id: String,
    /// Package family directory, e.g. `ocaml-variants`.
    pub package_family: String,
    /// Base compiler version, e.g. `5.2.0`.
    pub base_version: String,
    /// Variant suffix of the template package.
    pub template_variant: String,
    /// URL literal rewritten in the template `opam` file.
    pub template_url: String,
    /// Checksum literal rewritten in the template `opam` file.
    pub template_checksum: String,
    /// Host serving source archives.
    pub archive_host: String,
    /// Default GitHub user for the archive URL.
    pub github_user: String,
    /// Default GitHub repository for the archive URL.
    pub github_repo: String,
    /// Version control executable.
    pub git_program: String,
    /// Package manager executable.
    pub opam_program: String,
}

impl Config {
    /// Build the stock configuration rooted at `repo_dir`.
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            opam_repo_id: DEFAULT_OPAM_REPO_ID.to_string(),
            package_family: DEFAULT_PACKAGE_FAMILY.to_string(),
            base_version: DEFAULT_BASE_VERSION.to_string(),
            template_variant: DEFAULT_TEMPLATE_VARIANT.to_string(),
            template_url: DEFAULT_TEMPLATE_URL.to_string(),
            template_checksum: DEFAULT_TEMPLATE_CHECKSUM.to_string(),
            archive_host: DEFAULT_ARCHIVE_HOST.to_string(),
            github_user: DEFAULT_GITHUB_USER.to_string(),
            github_repo: DEFAULT_GITHUB_REPO.to_string(),
            git_program: "git".to_string(),
            opam_program: "opam".to_string(),
        }
    }

    /// Build the stock configuration, falling back to [`default_repo_dir`]
    /// when `repo_dir` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] if no directory was given and the
    /// home directory cannot be resolved.
    pub fn resolve(repo_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let repo_dir = match repo_dir {
            Some(dir) => dir,
            None => default_repo_dir().ok_or(ConfigError::NoHomeDir)?,
        };
        Ok(Self::new(repo_dir))
    }

    /// Apply every field set in `overrides`.
    pub fn apply(&mut self, overrides: ConfigFile) {
        let ConfigFile {
            remote_url,
            branch,
            opam_repo_id,
            package_family,
            base_version,
            template_variant,
            template_url,
            template_checksum,
            archive_host,
            github_user,
            github_repo,
            git_program,
            opam_program,
        } = overrides;

        let fields = [
            (&mut self.remote_url, remote_url),
            (&mut self.branch, branch),
            (&mut self.opam_repo_id, opam_repo_id),
            (&mut self.package_family, package_family),
            (&mut self.base_version, base_version),
            (&mut self.template_variant, template_variant),
            (&mut self.template_url, template_url),
            (&mut self.template_checksum, template_checksum),
            (&mut self.archive_host, archive_host),
            (&mut self.github_user, github_user),
            (&mut self.github_repo, github_repo),
            (&mut self.git_program, git_program),
            (&mut self.opam_program, opam_program),
        ];
        for (slot, value) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }

    /// `<repo>/packages/<family>`
    pub fn packages_dir(&self) -> PathBuf {
        self.repo_dir.join("packages").join(&self.package_family)
    }

    /// Directory name of the package for `variant`, e.g.
    /// `ocaml-variants.5.2.0+my-test`.
    pub fn package_dir_name(&self, variant: &str) -> String {
        format!("{}.{}", self.package_family, self.switch_name(variant))
    }

    /// Template package directory inside the checkout.
    pub fn template_dir(&self) -> PathBuf {
        self.packages_dir()
            .join(self.package_dir_name(&self.template_variant))
    }

    /// Destination package directory for `variant`.
    pub fn variant_dir(&self, variant: &VariantName) -> PathBuf {
        self.packages_dir()
            .join(self.package_dir_name(variant.as_str()))
    }

    /// Switch name for `variant`, e.g. `5.2.0+my-test`.
    pub fn switch_name(&self, variant: &str) -> String {
        format!("{}+{}", self.base_version, variant)
    }

    /// `--repos` argument binding the checkout ahead of opam's default
    /// repository.
    pub fn repos_arg(&self) -> String {
        format!(
            "{}={},default",
            self.opam_repo_id,
            self.repo_dir.display()
        )
    }
}

/// TOML overrides for [`Config`]. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Overrides [`Config::remote_url`].
    pub remote_url: Option<String>,
    /// Overrides [`Config::branch`].
    pub branch: Option<String>,
    /// Overrides [`Config::opam_repo_id`].
    pub opam_repo_id: Option<String>,
    /// Overrides [`Config::package_family`].
    pub package_family: Option<String>,
    /// Overrides [`Config::base_version`].
    pub base_version: Option<String>,
    /// Overrides [`Config::template_variant`].
    pub template_variant: Option<String>,
    /// Overrides [`Config::template_url`].
    pub template_url: Option<String>,
    /// Overrides [`Config::template_checksum`].
    pub template_checksum: Option<String>,
    /// Overrides [`Config::archive_host`].
    pub archive_host: Option<String>,
    /// Overrides [`Config::github_user`].
    pub github_user: Option<String>,
    /// Overrides [`Config::github_repo`].
    pub github_repo: Option<String>,
    /// Overrides [`Config::git_program`].
    pub git_program: Option<String>,
    /// Overrides [`Config::opam_program`].
    pub opam_program: Option<String>,
}

impl ConfigFile {
    /// Parse overrides from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse an overrides file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config overrides from {}", path.display());
        Self::parse(path, &content)
    }
}
