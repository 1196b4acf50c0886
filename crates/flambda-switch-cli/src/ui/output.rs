//! Terminal reporter.
//!
//! Plain line-oriented output: no live redraws, since `git` and `opam` write
//! to the same terminal while they run.

use crossterm::style::Stylize;
use flambda_switch_core::Reporter;

/// Message severity for a footer line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// Icons prefixed to footer lines.
#[derive(Debug, Clone, Copy)]
pub struct Icons {
    pub success: &'static str,
    pub warning: &'static str,
    pub error: &'static str,
    pub section: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            success: "✓",
            warning: "⚠",
            error: "✗",
            section: "●",
        }
    }
}

/// A cloneable handle printing reporter events to the console.
#[derive(Debug, Clone, Default)]
pub struct Output {
    quiet: bool,
    icons: Icons,
}

impl Output {
    /// Create a new output handle. `quiet` hides sections, command echoes and
    /// informational lines; warnings, errors and results are always shown.
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            icons: Icons::default(),
        }
    }

    /// Print a message with the icon and colour for `severity`.
    pub fn footer(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Success => println!("{} {}", self.icons.success.green(), message.green()),
            Severity::Warning => {
                println!("{} {}", self.icons.warning.yellow(), message.yellow());
            }
            Severity::Error => eprintln!("{} {}", self.icons.error.red(), message.red()),
        }
    }

    /// Print an unstyled line regardless of `quiet`.
    pub fn plain(&self, message: &str) {
        println!("{message}");
    }
}

impl Reporter for Output {
    fn section(&self, title: &str) {
        if !self.quiet {
            println!();
            println!("{} {}", self.icons.section.cyan(), title.bold());
        }
    }

    fn command(&self, line: &str) {
        if !self.quiet {
            println!("  {} {}", "Running:".dark_grey(), line.dark_grey());
        }
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {msg}");
        }
    }

    fn success(&self, msg: &str) {
        self.footer(msg, Severity::Success);
    }

    fn warning(&self, msg: &str) {
        self.footer(msg, Severity::Warning);
    }

    fn error(&self, msg: &str) {
        self.footer(msg, Severity::Error);
    }
}
