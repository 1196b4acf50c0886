//! Terminal UI: reporter output and confirmation prompts.

pub mod output;
pub mod prompt;

pub use output::{Output, Severity};
pub use prompt::TerminalPrompt;
