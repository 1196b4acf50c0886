//! Shared run context.
//!
//! This module defines the `Context` struct, which groups the configuration
//! and the injected collaborators every stage needs.

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::process::CommandRunner;
use crate::prompt::Confirm;
use crate::{Reporter, SwitchError};

/// Groups common state used by the pipeline stages.
#[derive(Clone)]
pub struct Context {
    /// Resolved configuration.
    pub config: Config,
    /// Runs `git` and `opam`.
    pub runner: Arc<dyn CommandRunner>,
    /// Answers overwrite/recreate questions.
    pub confirm: Arc<dyn Confirm>,
    /// User-facing progress.
    pub reporter: Arc<dyn Reporter>,
    /// Client for archive downloads.
    pub client: reqwest::Client,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Bundle the collaborators for one run.
    pub fn new(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        confirm: Arc<dyn Confirm>,
        reporter: Arc<dyn Reporter>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            runner,
            confirm,
            reporter,
            client,
        }
    }
}

/// HTTP client used for archive downloads.
///
/// # Errors
///
/// Returns [`SwitchError::Context`] if the TLS backend cannot be initialized.
pub fn http_client() -> Result<reqwest::Client, SwitchError> {
    reqwest::Client::builder()
        .user_agent(crate::USER_AGENT)
        .build()
        .map_err(|e| SwitchError::context("Failed to build HTTP client", e))
}
