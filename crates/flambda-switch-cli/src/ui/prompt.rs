//! Interactive confirmation on the controlling terminal.

use std::io::{self, BufRead, Write};

use crossterm::style::Stylize;
use flambda_switch_core::prompt::{Confirm, is_affirmative};

/// Asks on stdout and reads a line from stdin. EOF counts as "no".
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&self, question: &str) -> io::Result<bool> {
        print!("  {} {question}", "?".bold().yellow());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(is_affirmative(&input))
    }
}
