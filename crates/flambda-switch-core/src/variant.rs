//! Variant package materialization.
//!
//! A variant is a copy of the template package directory whose `opam` file
//! has had the template's source URL and checksum literals swapped for the
//! requested commit's. Work is split in two so that nothing destructive
//! happens before the checksum is known:
//!
//! - [`prepare`] checks the template exists and settles the overwrite
//!   question, producing a [`VariantPlan`].
//! - [`VariantPlan::apply`] removes any previous variant, copies the
//!   template and rewrites the descriptor.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::checksum::Checksum;
use crate::config::Config;
use crate::prompt::Confirm;
use crate::Reporter;

/// File name of the package descriptor inside a package directory.
pub const DESCRIPTOR_FILE: &str = "opam";

/// Errors while creating a variant package.
#[derive(Error, Debug)]
pub enum VariantError {
    /// The requested name is not a safe package suffix.
    #[error("Invalid variant name '{name}': {reason}")]
    InvalidName {
        /// Name as given.
        name: String,
        /// Rule that was broken.
        reason: &'static str,
    },

    /// The template package is absent from the checkout.
    #[error("Template directory not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// Recursive copy of the template failed.
    #[error("Failed to copy {} to {}: {message}", .from.display(), .to.display())]
    Copy {
        /// Template directory.
        from: PathBuf,
        /// Destination directory.
        to: PathBuf,
        /// Error reported by the copy.
        message: String,
    },

    /// Reading, writing or removing a file failed.
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The overwrite answer could not be read.
    #[error("Failed to read confirmation: {0}")]
    Prompt(std::io::Error),
}

impl VariantError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A validated variant suffix, safe to splice into a directory and switch
/// name.
///
/// # Example
///
/// ```
/// use flambda_switch_core::variant::VariantName;
///
/// assert!(VariantName::new("my-test").is_ok());
/// assert!(VariantName::new("../escape").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantName(String);

impl VariantName {
    /// Validate `name`: non-empty, ASCII alphanumerics plus `-_.~`, and not
    /// `.` or `..`.
    ///
    /// # Errors
    ///
    /// Returns [`VariantError::InvalidName`] describing the first rule broken.
    pub fn new(name: &str) -> Result<Self, VariantError> {
        let invalid = |reason| VariantError::InvalidName {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name == "." || name == ".." {
            return Err(invalid("name is a relative path component"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
        {
            return Err(invalid(
                "only ASCII letters, digits, '-', '_', '.' and '~' are allowed",
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VariantName {
    type Err = VariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How many times each template literal was replaced in the descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Substitution {
    /// Occurrences of the template URL replaced.
    pub url_replacements: usize,
    /// Occurrences of the template checksum replaced.
    pub checksum_replacements: usize,
}

impl Substitution {
    /// Both literals were found at least once.
    pub fn is_complete(&self) -> bool {
        self.url_replacements > 0 && self.checksum_replacements > 0
    }
}

/// Replace every occurrence of the template URL and checksum literals in
/// `content`.
pub fn rewrite_descriptor(
    content: &str,
    template_url: &str,
    new_url: &str,
    template_checksum: &str,
    new_checksum: &str,
) -> (String, Substitution) {
    let report = Substitution {
        url_replacements: count_occurrences(content, template_url),
        checksum_replacements: count_occurrences(content, template_checksum),
    };

    let rewritten = content
        .replace(template_url, new_url)
        .replace(template_checksum, new_checksum);

    (rewritten, report)
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        0
    } else {
        haystack.matches(needle).count()
    }
}

/// A variant ready to be written: template located, overwrite settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPlan {
    /// Variant being created.
    pub name: VariantName,
    /// Template package directory.
    pub template_dir: PathBuf,
    /// Package directory to write.
    pub dest_dir: PathBuf,
    /// The destination exists and the user agreed to replace it.
    pub replace_existing: bool,
}

/// Result of [`prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// Go ahead with the plan.
    Ready(VariantPlan),
    /// The destination exists and the user declined to overwrite it.
    Declined {
        /// The existing, untouched variant directory.
        dest_dir: PathBuf,
    },
}

/// Locate the template and, if the destination already exists, ask whether
/// to overwrite it. Touches nothing on disk.
///
/// # Errors
///
/// Returns [`VariantError::TemplateNotFound`] if the template directory is
/// missing, or [`VariantError::Prompt`] if the answer cannot be read.
pub fn prepare(
    config: &Config,
    name: &VariantName,
    confirm: &dyn Confirm,
    reporter: &dyn Reporter,
) -> Result<Prepared, VariantError> {
    let template_dir = config.template_dir();
    let dest_dir = config.variant_dir(name);

    if !template_dir.is_dir() {
        return Err(VariantError::TemplateNotFound(template_dir));
    }

    let mut replace_existing = false;
    if dest_dir.exists() {
        reporter.warning(&format!(
            "Variant directory already exists: {}",
            dest_dir.display()
        ));
        if !confirm
            .confirm("Do you want to overwrite it? (y/N): ")
            .map_err(VariantError::Prompt)?
        {
            reporter.info("Aborted.");
            return Ok(Prepared::Declined { dest_dir });
        }
        replace_existing = true;
    }

    Ok(Prepared::Ready(VariantPlan {
        name: name.clone(),
        template_dir,
        dest_dir,
        replace_existing,
    }))
}

impl VariantPlan {
    /// Write the variant: drop the old tree if agreed, copy the template and
    /// rewrite its descriptor to point at `url` / `checksum`.
    ///
    /// A literal missing from the template is reported as a warning, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the old tree cannot be removed, the copy fails, or
    /// the descriptor cannot be read or written.
    pub fn apply(
        &self,
        config: &Config,
        url: &str,
        checksum: &Checksum,
        reporter: &dyn Reporter,
    ) -> Result<Substitution, VariantError> {
        if self.replace_existing && self.dest_dir.exists() {
            tracing::debug!("removing previous variant at {}", self.dest_dir.display());
            std::fs::remove_dir_all(&self.dest_dir)
                .map_err(|e| VariantError::io(&self.dest_dir, e))?;
        }

        reporter.info(&format!(
            "Creating variant package: {}",
            self.dest_dir.display()
        ));
        copy_tree(&self.template_dir, &self.dest_dir)?;

        let descriptor = self.dest_dir.join(DESCRIPTOR_FILE);
        let content = std::fs::read_to_string(&descriptor)
            .map_err(|e| VariantError::io(&descriptor, e))?;

        let new_checksum = checksum.to_string();
        let (rewritten, report) = rewrite_descriptor(
            &content,
            &config.template_url,
            url,
            &config.template_checksum,
            &new_checksum,
        );
        tracing::debug!(?report, "rewrote {}", descriptor.display());

        if report.url_replacements == 0 {
            tracing::warn!(literal = %config.template_url, "template URL not found in descriptor");
            reporter.warning(&format!(
                "Template URL not found in {}; source URL left unchanged",
                descriptor.display()
            ));
        }
        if report.checksum_replacements == 0 {
            tracing::warn!(literal = %config.template_checksum, "template checksum not found in descriptor");
            reporter.warning(&format!(
                "Template checksum not found in {}; checksum left unchanged",
                descriptor.display()
            ));
        }

        std::fs::write(&descriptor, rewritten).map_err(|e| VariantError::io(&descriptor, e))?;
        Ok(report)
    }
}

/// Outcome of [`materialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// The variant was written.
    Created {
        /// New variant directory.
        dest_dir: PathBuf,
        /// What the descriptor rewrite replaced.
        substitution: Substitution,
    },
    /// An existing variant was kept.
    Declined {
        /// The existing variant directory.
        dest_dir: PathBuf,
    },
}

/// [`prepare`] then [`VariantPlan::apply`] in one step, for callers that
/// already hold the checksum.
///
/// # Errors
///
/// See [`prepare`] and [`VariantPlan::apply`].
pub fn materialize(
    config: &Config,
    name: &VariantName,
    url: &str,
    checksum: &Checksum,
    confirm: &dyn Confirm,
    reporter: &dyn Reporter,
) -> Result<MaterializeOutcome, VariantError> {
    match prepare(config, name, confirm, reporter)? {
        Prepared::Declined { dest_dir } => Ok(MaterializeOutcome::Declined { dest_dir }),
        Prepared::Ready(plan) => {
            let substitution = plan.apply(config, url, checksum, reporter)?;
            Ok(MaterializeOutcome::Created {
                dest_dir: plan.dest_dir,
                substitution,
            })
        }
    }
}

/// Recursively copy the contents of `src` into `dst`, creating `dst`.
fn copy_tree(src: &Path, dst: &Path) -> Result<(), VariantError> {
    std::fs::create_dir_all(dst).map_err(|e| VariantError::io(dst, e))?;
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new().content_only(true),
    )
    .map_err(|e| VariantError::Copy {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use crate::prompt::FixedAnswer;
    use crate::testing::{RecordingReporter, TEMPLATE_OPAM, scratch_checkout};

    const NEW_URL: &str = "https://github.com/ocaml-flambda/flambda-backend/archive/abc123.tar.gz";

    fn name(s: &str) -> VariantName {
        VariantName::new(s).unwrap()
    }

    #[test]
    fn test_variant_name_rules() {
        assert!(VariantName::new("my-test").is_ok());
        assert!(VariantName::new("flambda2_o3.v2~rc").is_ok());
        for bad in ["", ".", "..", "a/b", "a b", "x\\y", "caf\u{e9}"] {
            assert!(VariantName::new(bad).is_err(), "{bad:?} should be rejected");
        }
        assert_eq!("my-test".parse::<VariantName>().unwrap().as_str(), "my-test");
    }

    #[test]
    fn test_rewrite_replaces_both_literals() {
        let (out, report) = rewrite_descriptor(
            TEMPLATE_OPAM,
            crate::config::DEFAULT_TEMPLATE_URL,
            NEW_URL,
            crate::config::DEFAULT_TEMPLATE_CHECKSUM,
            "sha256=deadbeef",
        );
        assert!(out.contains(NEW_URL));
        assert!(out.contains("sha256=deadbeef"));
        assert!(!out.contains(crate::config::DEFAULT_TEMPLATE_URL));
        assert!(!out.contains(crate::config::DEFAULT_TEMPLATE_CHECKSUM));
        assert_eq!(report.url_replacements, 1);
        assert_eq!(report.checksum_replacements, 1);
        assert!(report.is_complete());
    }

    #[test]
    fn test_rewrite_without_literals_is_noop() {
        let content = "opam-version: \"2.0\"\nurl {\n  src: \"https://example.invalid/x.tar.gz\"\n}\n";
        let (out, report) = rewrite_descriptor(
            content,
            crate::config::DEFAULT_TEMPLATE_URL,
            NEW_URL,
            crate::config::DEFAULT_TEMPLATE_CHECKSUM,
            "sha256=deadbeef",
        );
        assert_eq!(out, content);
        assert!(!report.is_complete());
        assert_eq!(report, Substitution::default());
    }

    #[test]
    fn test_materialize_scenario() {
        let (_tmp, config) = scratch_checkout();
        let outcome = materialize(
            &config,
            &name("my-test"),
            NEW_URL,
            &Checksum::from_user("deadbeef"),
            &FixedAnswer(false),
            &NullReporter,
        )
        .unwrap();

        let MaterializeOutcome::Created {
            dest_dir,
            substitution,
        } = outcome
        else {
            panic!("expected variant to be created");
        };
        assert!(substitution.is_complete());
        assert_eq!(
            dest_dir.file_name().unwrap().to_str().unwrap(),
            "ocaml-variants.5.2.0+my-test"
        );

        let opam = std::fs::read_to_string(dest_dir.join("opam")).unwrap();
        assert!(opam.contains(NEW_URL));
        assert!(opam.contains("sha256=deadbeef"));
        assert!(!opam.contains(&config.template_url));
        assert!(!opam.contains(&config.template_checksum));

        // Subdirectories come along and the template itself is untouched.
        assert!(dest_dir.join("files/fix.patch").exists());
        let template = std::fs::read_to_string(config.template_dir().join("opam")).unwrap();
        assert_eq!(template, TEMPLATE_OPAM);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, config) = scratch_checkout();
        let script = config.template_dir().join("files/configure.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let outcome = materialize(
            &config,
            &name("perm"),
            NEW_URL,
            &Checksum::from_user("deadbeef"),
            &FixedAnswer(true),
            &NullReporter,
        )
        .unwrap();
        let MaterializeOutcome::Created { dest_dir, .. } = outcome else {
            panic!("expected variant to be created");
        };
        let mode = std::fs::metadata(dest_dir.join("files/configure.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_missing_template() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::new(tmp.path());
        let err = prepare(&config, &name("x"), &FixedAnswer(true), &NullReporter).unwrap_err();
        assert!(matches!(err, VariantError::TemplateNotFound(_)));
        assert!(!config.variant_dir(&name("x")).exists());
    }

    #[test]
    fn test_declined_overwrite_leaves_variant_untouched() {
        let (_tmp, config) = scratch_checkout();
        let variant = name("my-test");
        let first = materialize(
            &config,
            &variant,
            NEW_URL,
            &Checksum::from_user("deadbeef"),
            &FixedAnswer(false),
            &NullReporter,
        )
        .unwrap();
        assert!(matches!(first, MaterializeOutcome::Created { .. }));

        let descriptor = config.variant_dir(&variant).join("opam");
        let before = std::fs::read(&descriptor).unwrap();

        let second = materialize(
            &config,
            &variant,
            "https://example.invalid/other.tar.gz",
            &Checksum::from_user("cafebabe"),
            &FixedAnswer(false),
            &NullReporter,
        )
        .unwrap();
        assert!(matches!(second, MaterializeOutcome::Declined { .. }));
        assert_eq!(std::fs::read(&descriptor).unwrap(), before);
    }

    #[test]
    fn test_accepted_overwrite_replaces_tree() {
        let (_tmp, config) = scratch_checkout();
        let variant = name("my-test");
        let stale = config.variant_dir(&variant);
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("stale-file"), "old").unwrap();

        let outcome = materialize(
            &config,
            &variant,
            NEW_URL,
            &Checksum::from_user("sha256=deadbeef"),
            &FixedAnswer(true),
            &NullReporter,
        )
        .unwrap();
        assert!(matches!(outcome, MaterializeOutcome::Created { .. }));
        assert!(!stale.join("stale-file").exists());
        assert!(stale.join("opam").exists());
    }

    #[test]
    fn test_prepare_does_not_delete_before_apply() {
        let (_tmp, config) = scratch_checkout();
        let variant = name("keep");
        let existing = config.variant_dir(&variant);
        std::fs::create_dir_all(&existing).unwrap();
        std::fs::write(existing.join("opam"), "old").unwrap();

        let prepared = prepare(&config, &variant, &FixedAnswer(true), &NullReporter).unwrap();
        let Prepared::Ready(plan) = prepared else {
            panic!("expected a plan");
        };
        assert!(plan.replace_existing);
        assert_eq!(std::fs::read_to_string(existing.join("opam")).unwrap(), "old");
    }

    #[test]
    fn test_diverged_template_warns() {
        let (_tmp, mut config) = scratch_checkout();
        config.template_url = "https://example.invalid/not-in-template.tar.gz".to_string();
        let reporter = RecordingReporter::default();

        let outcome = materialize(
            &config,
            &name("drift"),
            NEW_URL,
            &Checksum::from_user("deadbeef"),
            &FixedAnswer(true),
            &reporter,
        )
        .unwrap();
        let MaterializeOutcome::Created { substitution, .. } = outcome else {
            panic!("expected variant to be created");
        };
        assert_eq!(substitution.url_replacements, 0);
        assert_eq!(substitution.checksum_replacements, 1);
        assert!(
            reporter
                .warnings()
                .iter()
                .any(|w| w.contains("Template URL not found"))
        );
    }
}
