//! Validation of library source against an external compiler.
//!
//! A [`Translator`] turns library source into a [`CompileResult`], the
//! compiler's structured JSON output. The lifecycle service only cares about
//! one thing in that payload: whether its `errors` list is non-empty.

mod command;
mod scripted;

pub use command::CommandTranslator;
pub use scripted::{ScriptedTranslator, TranslateCall};

use serde_json::Value;
use thiserror::Error;

/// Errors from invoking a translator or reading its output.
#[derive(Error, Debug)]
pub enum TranslatorError {
    /// The translator process could not be started or talked to.
    #[error("failed to run translator: {0}")]
    Exec(#[from] std::io::Error),

    /// The translator exited unsuccessfully.
    #[error("translator command failed: {command}")]
    Failed {
        /// The command that failed.
        command: String,
        /// The exit code, if available.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },

    /// The translator's output was not the expected JSON shape.
    #[error("malformed translator output: {0}")]
    Malformed(String),

    /// No translator is configured.
    #[error("no translator configured (set [translator] command)")]
    NotConfigured,
}

/// Result alias for translator operations.
pub type TranslatorResult<T> = Result<T, TranslatorError>;

/// Compiles library source.
pub trait Translator: Send + Sync {
    /// Translate `source`, written against `model`, forwarding the caller's
    /// auth token when there is one.
    fn translate(
        &self,
        source: &str,
        model: &str,
        auth_token: Option<&str>,
    ) -> TranslatorResult<CompileResult>;
}

/// Structured compiler output.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult(Value);

impl CompileResult {
    /// Wrap an already-parsed payload.
    pub const fn new(payload: Value) -> Self {
        Self(payload)
    }

    /// Parse a payload from JSON text.
    pub fn parse(text: &str) -> TranslatorResult<Self> {
        serde_json::from_str(text)
            .map(Self)
            .map_err(|e| TranslatorError::Malformed(e.to_string()))
    }

    /// A payload with an empty error list.
    pub fn clean() -> Self {
        Self(serde_json::json!({ "errors": [] }))
    }

    /// A payload reporting the given error messages.
    pub fn with_errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let errors: Vec<Value> = messages
            .into_iter()
            .map(|message| serde_json::json!({ "message": message.into() }))
            .collect();
        Self(serde_json::json!({ "errors": errors }))
    }

    /// The raw payload.
    pub const fn payload(&self) -> &Value {
        &self.0
    }

    /// Whether the compiler reported errors.
    ///
    /// An absent or `null` `errors` field, or an empty list, means no errors.
    /// Any other shape is [`TranslatorError::Malformed`].
    pub fn has_errors(&self) -> TranslatorResult<bool> {
        Ok(!self.errors()?.is_empty())
    }

    /// Human-readable messages for each reported error.
    pub fn error_messages(&self) -> TranslatorResult<Vec<String>> {
        Ok(self
            .errors()?
            .iter()
            .map(|entry| match entry {
                Value::String(message) => message.clone(),
                Value::Object(fields) => fields
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| entry.to_string(), str::to_string),
                other => other.to_string(),
            })
            .collect())
    }

    fn errors(&self) -> TranslatorResult<&[Value]> {
        let fields = self
            .0
            .as_object()
            .ok_or_else(|| TranslatorError::Malformed("payload is not a JSON object".into()))?;
        match fields.get("errors") {
            None | Some(Value::Null) => Ok(Default::default()),
            Some(Value::Array(errors)) => Ok(errors.as_slice()),
            Some(other) => Err(TranslatorError::Malformed(format!(
                "`errors` must be a list, got {other}"
            ))),
        }
    }
}

/// A translator that always fails with [`TranslatorError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTranslator;

impl Translator for UnconfiguredTranslator {
    fn translate(
        &self,
        _source: &str,
        _model: &str,
        _auth_token: Option<&str>,
    ) -> TranslatorResult<CompileResult> {
        Err(TranslatorError::NotConfigured)
    }
}
