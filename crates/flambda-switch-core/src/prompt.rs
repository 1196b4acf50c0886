//! Confirmation gates before destructive actions.

use std::io;

/// Decides whether a destructive action may proceed.
pub trait Confirm: Send + Sync {
    /// Ask `question`; `Ok(true)` means go ahead.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer could not be read.
    fn confirm(&self, question: &str) -> io::Result<bool>;
}

impl<T: Confirm + ?Sized> Confirm for std::sync::Arc<T> {
    fn confirm(&self, question: &str) -> io::Result<bool> {
        (**self).confirm(question)
    }
}

/// Answers every question the same way (`--yes` / `--no`, tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, question: &str) -> io::Result<bool> {
        tracing::debug!(answer = self.0, "auto-answered: {question}");
        Ok(self.0)
    }
}

/// Interprets a free-text reply: only `y` or `Y`, followed by nothing but the
/// line terminator, counts as yes.
pub fn is_affirmative(reply: &str) -> bool {
    reply
        .trim_end_matches(['\n', '\r'])
        .eq_ignore_ascii_case("y")
}
