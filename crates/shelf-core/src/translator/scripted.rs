//! Scripted translator for deterministic testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CompileResult, Translator, TranslatorError, TranslatorResult};

/// One recorded call to [`ScriptedTranslator::translate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateCall {
    /// Source text passed in.
    pub source: String,
    /// Data model passed in.
    pub model: String,
    /// Auth token passed in.
    pub auth_token: Option<String>,
}

/// Planned response for the next call.
#[derive(Debug, Clone)]
enum Reply {
    Result(CompileResult),
    Malformed(String),
    Transport(String),
}

/// A [`Translator`] that replays queued responses.
///
/// When the queue is empty every call returns a clean result. Clones share
/// the queue and the call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTranslator {
    inner: Arc<Mutex<ScriptedInner>>,
}

#[derive(Debug, Default)]
struct ScriptedInner {
    replies: VecDeque<Reply>,
    calls: Vec<TranslateCall>,
}

impl ScriptedTranslator {
    /// Translator that reports every source as clean.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful compile result.
    #[must_use]
    pub fn then_result(self, result: CompileResult) -> Self {
        self.lock().replies.push_back(Reply::Result(result));
        self
    }

    /// Queue a result reporting compile errors.
    #[must_use]
    pub fn then_errors<I, S>(self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.then_result(CompileResult::with_errors(messages))
    }

    /// Queue a malformed-payload failure.
    #[must_use]
    pub fn then_malformed(self, message: impl Into<String>) -> Self {
        self.lock().replies.push_back(Reply::Malformed(message.into()));
        self
    }

    /// Queue a transport failure.
    #[must_use]
    pub fn then_unreachable(self, message: impl Into<String>) -> Self {
        self.lock().replies.push_back(Reply::Transport(message.into()));
        self
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<TranslateCall> {
        self.lock().calls.clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Translator for ScriptedTranslator {
    fn translate(
        &self,
        source: &str,
        model: &str,
        auth_token: Option<&str>,
    ) -> TranslatorResult<CompileResult> {
        let mut inner = self.lock();
        inner.calls.push(TranslateCall {
            source: source.to_string(),
            model: model.to_string(),
            auth_token: auth_token.map(str::to_string),
        });
        match inner.replies.pop_front() {
            None => Ok(CompileResult::clean()),
            Some(Reply::Result(result)) => Ok(result),
            Some(Reply::Malformed(message)) => Err(TranslatorError::Malformed(message)),
            Some(Reply::Transport(message)) => Err(TranslatorError::Exec(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, message),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_queue_then_defaults_to_clean() {
        let translator = ScriptedTranslator::new()
            .then_errors(["bad"])
            .then_malformed("junk");

        assert!(translator.translate("a", "m", None).unwrap().has_errors().unwrap());
        assert!(matches!(
            translator.translate("b", "m", None),
            Err(TranslatorError::Malformed(_))
        ));
        assert!(!translator.translate("c", "m", None).unwrap().has_errors().unwrap());
        assert_eq!(translator.call_count(), 3);
    }

    #[test]
    fn records_arguments() {
        let translator = ScriptedTranslator::new();
        translator.translate("src", "fhir", Some("tok")).unwrap();
        assert_eq!(
            translator.calls(),
            vec![TranslateCall {
                source: "src".into(),
                model: "fhir".into(),
                auth_token: Some("tok".into()),
            }]
        );
    }
}
