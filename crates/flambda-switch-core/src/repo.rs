//! opam repository checkout management.

use crate::Reporter;
use crate::config::Config;
use crate::process::{CommandError, CommandRunner, Invocation};

/// What [`sync_repository`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The checkout did not exist and was cloned.
    Cloned,
    /// An existing checkout was fetched, checked out and pulled.
    Updated,
}

/// Make sure `config.repo_dir` holds an up-to-date checkout of
/// `config.remote_url` on `config.branch`.
///
/// # Errors
///
/// Returns the first [`CommandError`] from `git`; later steps are skipped.
pub fn sync_repository(
    config: &Config,
    runner: &dyn CommandRunner,
    reporter: &dyn Reporter,
) -> Result<SyncOutcome, CommandError> {
    let git = config.git_program.as_str();
    let dir = &config.repo_dir;

    if dir.exists() {
        reporter.info(&format!("Repository already exists at {}", dir.display()));
        for args in [
            vec!["fetch"],
            vec!["checkout", config.branch.as_str()],
            vec!["pull"],
        ] {
            runner.run(&Invocation::new(git, args).current_dir(dir))?;
        }
        Ok(SyncOutcome::Updated)
    } else {
        reporter.info(&format!("Cloning repository to {}", dir.display()));
        let path = dir.to_string_lossy().into_owned();
        runner.run(&Invocation::new(
            git,
            [
                "clone",
                "--branch",
                config.branch.as_str(),
                config.remote_url.as_str(),
                path.as_str(),
            ],
        ))?;
        Ok(SyncOutcome::Cloned)
    }
}
