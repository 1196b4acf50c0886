//! Domain-specific errors for switch operations

use std::path::PathBuf;

use thiserror::Error;

use crate::checksum::DownloadError;
use crate::config::ConfigError;
use crate::process::CommandError;
use crate::variant::VariantError;

/// Any failure that ends a run.
#[derive(Error, Debug)]
pub enum SwitchError {
    /// `--skip-clone` was given but there is no checkout.
    #[error("Repository directory {} does not exist", .0.display())]
    CheckoutMissing(PathBuf),

    /// Variant package creation failed.
    #[error(transparent)]
    Variant(#[from] VariantError),

    /// A `git` or `opam` call failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The source archive could not be hashed.
    #[error("Checksum download failed: {0}")]
    Download(#[from] DownloadError),

    /// Configuration could not be assembled.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A confirmation answer could not be read.
    #[error("Failed to read confirmation: {0}")]
    Prompt(std::io::Error),

    /// Anything else, with a short description of what was attempted.
    #[error("{context}: {message}")]
    Context {
        /// What was being attempted.
        context: &'static str,
        /// Underlying error text.
        message: String,
    },
}

impl SwitchError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }
}
