//! End-to-end flow: sync, resolve checksum, materialize, create switch.

use std::path::PathBuf;

use crate::checksum::{ArchiveSource, resolve_checksum};
use crate::context::Context;
use crate::repo::sync_repository;
use crate::switch::{SwitchOutcome, create_switch};
use crate::variant::{self, Prepared, VariantName};
use crate::SwitchError;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Variant suffix, e.g. `my-test`.
    pub name: VariantName,
    /// flambda-backend commit the variant builds.
    pub commit: String,
    /// Pre-computed checksum; downloaded and hashed when `None`.
    pub checksum: Option<String>,
    /// GitHub user owning the commit.
    pub user: String,
    /// GitHub repository holding the commit.
    pub repo: String,
    /// Use the checkout as is; it must already exist.
    pub skip_clone: bool,
    /// Also create the opam switch.
    pub create_switch: bool,
}

/// How a run ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every requested stage ran.
    Completed {
        /// The written variant package directory.
        package_dir: PathBuf,
        /// The switch, when one was requested.
        switch: Option<SwitchOutcome>,
    },
    /// The variant directory existed and the user declined to overwrite it.
    /// Nothing after the repository sync ran.
    Declined {
        /// The existing, untouched variant directory.
        package_dir: PathBuf,
    },
}

/// Run a synchronous stage on the blocking pool. Stages wait on child
/// processes and terminal input, which must not stall the runtime workers.
async fn blocking<T, F>(ctx: &Context, stage: F) -> Result<T, SwitchError>
where
    T: Send + 'static,
    F: FnOnce(&Context) -> Result<T, SwitchError> + Send + 'static,
{
    let ctx = ctx.clone();
    tokio::task::spawn_blocking(move || stage(&ctx))
        .await
        .map_err(|e| SwitchError::context("Stage task failed", e))?
}

/// Run every stage for `request`.
///
/// # Errors
///
/// Returns [`SwitchError::CheckoutMissing`] when `skip_clone` is set and the
/// checkout is absent, and otherwise the first failing stage's error.
pub async fn run(ctx: &Context, request: &Request) -> Result<PipelineOutcome, SwitchError> {
    let config = &ctx.config;
    let reporter = ctx.reporter.as_ref();

    if request.skip_clone {
        if !config.repo_dir.exists() {
            return Err(SwitchError::CheckoutMissing(config.repo_dir.clone()));
        }
        tracing::debug!("skipping repository sync");
    } else {
        reporter.section("Syncing repository");
        let outcome = blocking(ctx, |ctx| {
            Ok(sync_repository(
                &ctx.config,
                ctx.runner.as_ref(),
                ctx.reporter.as_ref(),
            )?)
        })
        .await?;
        tracing::info!(?outcome, "repository ready at {}", config.repo_dir.display());
    }

    reporter.section("Creating variant package");
    let name = request.name.clone();
    let prepared = blocking(ctx, move |ctx| {
        Ok(variant::prepare(
            &ctx.config,
            &name,
            ctx.confirm.as_ref(),
            ctx.reporter.as_ref(),
        )?)
    })
    .await?;
    let plan = match prepared {
        Prepared::Ready(plan) => plan,
        Prepared::Declined { dest_dir } => {
            return Ok(PipelineOutcome::Declined {
                package_dir: dest_dir,
            });
        }
    };

    let source = ArchiveSource::new(
        &config.archive_host,
        &request.user,
        &request.repo,
        &request.commit,
    );
    let url = source.url();
    let checksum =
        resolve_checksum(request.checksum.as_deref(), &source, &ctx.client, reporter).await?;

    let plan = blocking(ctx, move |ctx| {
        plan.apply(&ctx.config, &url, &checksum, ctx.reporter.as_ref())?;
        Ok(plan)
    })
    .await?;
    reporter.info(&format!("Updated opam file with commit {}", request.commit));

    let switch = if request.create_switch {
        reporter.section("Creating switch");
        let name = request.name.clone();
        Some(
            blocking(ctx, move |ctx| {
                create_switch(
                    &ctx.config,
                    &name,
                    ctx.runner.as_ref(),
                    ctx.confirm.as_ref(),
                    ctx.reporter.as_ref(),
                )
            })
            .await?,
        )
    } else {
        None
    };

    Ok(PipelineOutcome::Completed {
        package_dir: plan.dest_dir,
        switch,
    })
}
