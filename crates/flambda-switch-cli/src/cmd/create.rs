//! Create command
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use flambda_switch_core::context::{Context, http_client};
use flambda_switch_core::pipeline::{self, PipelineOutcome};
use flambda_switch_core::process::SystemRunner;
use flambda_switch_core::Reporter;

use crate::Cli;
use crate::ui::Output;

/// Sync the repository, create the variant package and, if asked, the
/// switch. A declined overwrite is not an error but still exits non-zero.
pub async fn create(cli: Cli, output: Output) -> Result<ExitCode> {
    let config = cli
        .load_config()
        .context("Failed to load configuration")?;
    let request = cli.request(&config);
    tracing::debug!(?config, ?request, "starting run");

    let reporter: Arc<dyn Reporter> = Arc::new(output.clone());
    let runner = Arc::new(SystemRunner::new(reporter.clone()));
    let ctx = Context::new(
        config,
        runner,
        cli.confirm_policy(),
        reporter,
        http_client()?,
    );

    match pipeline::run(&ctx, &request).await? {
        PipelineOutcome::Declined { .. } => Ok(ExitCode::FAILURE),
        PipelineOutcome::Completed {
            switch: Some(switch),
            ..
        } => {
            let name = switch.name();
            println!();
            output.success(&format!(
                "Success! Created package variant and switch: {name}"
            ));
            output.plain(&format!("To use this switch, run: opam switch {name}"));
            Ok(ExitCode::SUCCESS)
        }
        PipelineOutcome::Completed { switch: None, .. } => {
            println!();
            output.success(&format!(
                "Success! Created package variant: {}",
                ctx.config.switch_name(request.name.as_str())
            ));
            output.plain("Use --create-switch to also create the opam switch");
            Ok(ExitCode::SUCCESS)
        }
    }
}
