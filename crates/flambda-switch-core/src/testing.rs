//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use tempfile::TempDir;

use crate::Reporter;
use crate::config::{Config, DEFAULT_TEMPLATE_CHECKSUM, DEFAULT_TEMPLATE_URL};
use crate::process::{CommandError, CommandOutput, CommandRunner, Invocation};

/// Trimmed-down copy of the real template descriptor.
pub(crate) const TEMPLATE_OPAM: &str = concat!(
    "opam-version: \"2.0\"\n",
    "synopsis: \"OCaml 5.2.0, with flambda2\"\n",
    "depends: [\n  \"ocaml\" {= \"5.2.0\" & post}\n]\n",
    "url {\n",
    "  src: \"https://github.com/ocaml-flambda/flambda-backend/archive/82e4553f8d75eb4e6f8e94cd9bf90369968f64d5.tar.gz\"\n",
    "  checksum: \"sha256=c390e80899a92df4b39685987247b202bb0ce992084bd5c6139f1a029f39d43d\"\n",
    "}\n",
);

/// A checkout containing only the template package (with an `opam` file and
/// a `files/` subdirectory).
pub(crate) fn scratch_checkout() -> (TempDir, Config) {
    debug_assert!(TEMPLATE_OPAM.contains(DEFAULT_TEMPLATE_URL));
    debug_assert!(TEMPLATE_OPAM.contains(DEFAULT_TEMPLATE_CHECKSUM));

    let tmp = tempfile::tempdir().unwrap();
    let config = Config::new(tmp.path().join("opam-repository-flambda"));
    let template = config.template_dir();
    std::fs::create_dir_all(template.join("files")).unwrap();
    std::fs::write(template.join("opam"), TEMPLATE_OPAM).unwrap();
    std::fs::write(template.join("files/fix.patch"), "--- a\n+++ b\n").unwrap();
    (tmp, config)
}

/// Reporter that keeps every message for later assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    messages: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingReporter {
    fn push(&self, kind: &'static str, msg: &str) {
        self.messages.lock().unwrap().push((kind, msg.to_string()));
    }

    fn of_kind(&self, kind: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub(crate) fn warnings(&self) -> Vec<String> {
        self.of_kind("warning")
    }
}

impl Reporter for RecordingReporter {
    fn section(&self, title: &str) {
        self.push("section", title);
    }
    fn command(&self, line: &str) {
        self.push("command", line);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn success(&self, msg: &str) {
        self.push("success", msg);
    }
    fn warning(&self, msg: &str) {
        self.push("warning", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
}

/// Runner that records invocations and replays scripted results in order.
/// Once the script runs out every command succeeds with empty output.
#[derive(Debug, Default)]
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<Invocation>>,
    script: Mutex<VecDeque<Result<CommandOutput, i32>>>,
}

impl ScriptedRunner {
    /// Queue a successful result with `stdout`.
    pub(crate) fn then_stdout(self, stdout: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(CommandOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }));
        self
    }

    /// Queue a success with no output.
    pub(crate) fn then_ok(self) -> Self {
        self.then_stdout("")
    }

    /// Queue a non-zero exit.
    pub(crate) fn then_fail(self, code: i32) -> Self {
        self.script.lock().unwrap().push_back(Err(code));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Each call rendered as `program arg...`.
    pub(crate) fn lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(invocation.clone());
        match self.script.lock().unwrap().pop_front() {
            None => Ok(CommandOutput {
                code: Some(0),
                ..CommandOutput::default()
            }),
            Some(Ok(out)) => Ok(out),
            Some(Err(code)) => Err(CommandError::Failed {
                command: invocation.to_string(),
                code: Some(code),
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}
