//! flambda-switch core
//!
//! Builds opam switch variants that pin the OCaml compiler to an arbitrary
//! flambda-backend commit.
//!
//! # Pipeline
//!
//! 1. [`repo`]: clone or refresh the opam repository checkout.
//! 2. [`checksum`]: normalize a user checksum or hash the source archive.
//! 3. [`variant`]: copy the template package and rewrite its `opam` file.
//! 4. [`switch`]: optionally create the opam switch bound to the checkout.
//!
//! [`pipeline`] strings the stages together. External tools are driven through
//! [`process::CommandRunner`], confirmations through [`prompt::Confirm`] and
//! user-facing output through [`Reporter`], so every stage can be exercised
//! without a terminal, `git` or `opam`.

pub mod checksum;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod prompt;
pub mod repo;
pub mod reporter;
pub mod switch;
pub mod variant;

#[cfg(test)]
pub(crate) mod testing;

pub use checksum::Checksum;
pub use config::Config;
pub use context::Context;
pub use error::SwitchError;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for archive downloads
pub const USER_AGENT: &str = concat!("flambda-switch/", env!("CARGO_PKG_VERSION"));
