//! opam switch creation.

use crate::{Reporter, SwitchError};
use crate::config::Config;
use crate::process::{CommandRunner, Invocation};
use crate::prompt::Confirm;
use crate::variant::VariantName;

/// What [`create_switch`] ended up doing. Both carry the switch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// A new switch was created.
    Created(String),
    /// The switch already existed and the user chose to keep it.
    Reused(String),
}

impl SwitchOutcome {
    /// Name of the switch, e.g. `5.2.0+my-test`.
    pub fn name(&self) -> &str {
        match self {
            Self::Created(name) | Self::Reused(name) => name,
        }
    }
}

/// Split `opam switch list --short` output into switch names.
pub fn parse_switch_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Create the switch for `variant`, bound to the checkout and then opam's
/// default repository.
///
/// # Errors
///
/// Returns [`SwitchError::Command`] for any failed `opam` call other than the
/// initial `opam update`, whose failure is only reported as a warning, and
/// [`SwitchError::Prompt`] if the recreate answer cannot be read.
pub fn create_switch(
    config: &Config,
    variant: &VariantName,
    runner: &dyn CommandRunner,
    confirm: &dyn Confirm,
    reporter: &dyn Reporter,
) -> Result<SwitchOutcome, SwitchError> {
    let opam = config.opam_program.as_str();
    let switch_name = config.switch_name(variant.as_str());

    reporter.info("Updating opam repositories...");
    // Expected to fail until the repository has been registered once.
    if let Err(e) = runner.run(&Invocation::new(
        opam,
        ["update", config.opam_repo_id.as_str()],
    )) {
        tracing::warn!("opam update failed: {e}");
        reporter.warning(&format!("{e} (continuing)"));
    }

    reporter.info(&format!("Creating opam switch: {switch_name}"));
    let listing = runner.run(&Invocation::new(opam, ["switch", "list", "--short"]).capture())?;
    let existing = parse_switch_list(&listing.stdout);
    tracing::debug!(count = existing.len(), "existing switches");

    if existing.contains(&switch_name) {
        reporter.warning(&format!("Switch {switch_name} already exists."));
        if !confirm
            .confirm("Do you want to remove and recreate it? (y/N): ")
            .map_err(SwitchError::Prompt)?
        {
            reporter.info("Using existing switch.");
            return Ok(SwitchOutcome::Reused(switch_name));
        }
        runner.run(&Invocation::new(
            opam,
            ["switch", "remove", switch_name.as_str()],
        ))?;
    }

    let repos = config.repos_arg();
    runner.run(&Invocation::new(
        opam,
        ["switch", "create", switch_name.as_str(), "--repos", repos.as_str()],
    ))?;

    Ok(SwitchOutcome::Created(switch_name))
}
