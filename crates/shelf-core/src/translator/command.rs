//! Translator backed by an external shell command.
//!
//! The command runs under `sh -c`. Library source is written to its stdin,
//! the data model and auth token are exported as `SHELF_MODEL` and
//! `SHELF_AUTH_TOKEN`, and stdout must be a JSON compile result.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, instrument};

use super::{CompileResult, Translator, TranslatorError, TranslatorResult};
use crate::config::Config;

/// Environment variable carrying the data model.
pub const MODEL_ENV: &str = "SHELF_MODEL";

/// Environment variable carrying the caller's auth token.
pub const AUTH_TOKEN_ENV: &str = "SHELF_AUTH_TOKEN";

/// A [`Translator`] that shells out to a configured command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTranslator {
    command: String,
}

impl CommandTranslator {
    /// Translator for the given shell command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Translator from the `[translator]` config section, if one is set.
    pub fn from_config(config: &Config) -> Option<Self> {
        config.translator_command().map(Self::new)
    }

    /// The shell command.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the command's program can be found on `PATH`.
    ///
    /// Only the first word is checked; shell builtins and pipelines are
    /// reported as unavailable even if `sh` could run them.
    pub fn is_available(&self) -> bool {
        self.command
            .split_whitespace()
            .next()
            .is_some_and(|program| which::which(program).is_ok())
    }
}

impl Translator for CommandTranslator {
    #[instrument(skip(self, source, auth_token), fields(command = %self.command))]
    fn translate(
        &self,
        source: &str,
        model: &str,
        auth_token: Option<&str>,
    ) -> TranslatorResult<CompileResult> {
        debug!(bytes = source.len(), "running translator");

        let mut cmd = Command::new("sh");
        cmd.args(["-c", &self.command])
            .env(MODEL_ENV, model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match auth_token {
            Some(token) => cmd.env(AUTH_TOKEN_ENV, token),
            None => cmd.env_remove(AUTH_TOKEN_ENV),
        };

        let mut child = cmd.spawn()?;

        // Feed stdin from a separate thread so a chatty translator cannot
        // deadlock against a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let source = source.to_owned();
            std::thread::spawn(move || stdin.write_all(source.as_bytes()))
        });

        let output = child.wait_with_output()?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // The translator may exit without reading all input
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(TranslatorError::Exec(std::io::Error::other(
                        "stdin writer panicked",
                    )));
                }
            }
        }

        if !output.status.success() {
            return Err(TranslatorError::Failed {
                command: self.command.clone(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        CompileResult::parse(&stdout)
    }
}
