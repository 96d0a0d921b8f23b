//! Completion backend that shells out to an external command.
//!
//! The command receives the user prompt on stdin and the system prompt in
//! the `SLIDEMOB_SYSTEM_PROMPT` environment variable, and must print the
//! completion on stdout. Any language-model client can be wrapped this way.

use slidemob_core::{CompletionBackend, TransformError, TransformResult};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

pub const SYSTEM_PROMPT_ENV: &str = "SLIDEMOB_SYSTEM_PROMPT";

#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    /// Build a backend from a command line such as `llm -m gpt-4o`.
    /// Arguments are split on whitespace.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl CompletionBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.program
    }

    fn complete(&self, system: &str, prompt: &str) -> TransformResult<String> {
        log::trace!("Running {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(SYSTEM_PROMPT_ENV, system)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TransformError::Request(format!("Failed to run {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command may exit without reading its input.
            match stdin.write_all(prompt.as_bytes()) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(TransformError::Request(format!(
                        "Failed to write prompt to {}: {}",
                        self.program, e
                    )));
                }
                _ => {}
            }
        }

        let output = child.wait_with_output().map_err(|e| {
            TransformError::Request(format!("Failed to wait for {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransformError::Backend(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
