use tracing::Level;

use super::RuleHook;
use crate::EvaluationError;

/// Logs every test and apply of the wrapped rule through `tracing`.
///
/// Since every application handles errors differently, failures are not
/// logged unless enabled with [`log_errors`](Self::log_errors). When enabled
/// they are emitted at `ERROR` whatever the configured level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleLogger {
    level: Level,
    log_errors: bool,
}

impl Default for RuleLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            log_errors: false,
        }
    }
}

impl RuleLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Level used for the test/apply events. Defaults to `DEBUG`.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, rule: &str, message: &str) {
        match self.level {
            Level::ERROR => tracing::error!(rule, "{message}"),
            Level::WARN => tracing::warn!(rule, "{message}"),
            Level::INFO => tracing::info!(rule, "{message}"),
            Level::DEBUG => tracing::debug!(rule, "{message}"),
            _ => tracing::trace!(rule, "{message}"),
        }
    }
}

impl<F, B> RuleHook<F, B> for RuleLogger {
    fn before_test(&self, rule: &str, _facts: &F) -> Result<bool, EvaluationError> {
        self.emit(rule, "testing rule");
        Ok(true)
    }

    fn after_test(&self, rule: &str, _facts: &F, applies: bool) {
        if applies {
            self.emit(rule, "rule applies");
        } else {
            self.emit(rule, "rule does not apply");
        }
    }

    fn on_test_error(
        &self,
        rule: &str,
        _facts: &F,
        error: EvaluationError,
    ) -> Result<bool, EvaluationError> {
        if self.log_errors {
            tracing::error!(rule, error = %error, "an error occurred while testing rule");
        }
        Err(error)
    }

    fn before_apply(&self, rule: &str, _facts: &F) -> Result<(), EvaluationError> {
        self.emit(rule, "applying rule");
        Ok(())
    }

    fn after_apply(&self, rule: &str, _facts: &F, result: B) -> Result<B, EvaluationError> {
        self.emit(rule, "rule applied");
        Ok(result)
    }

    fn on_apply_error(
        &self,
        rule: &str,
        _facts: &F,
        error: EvaluationError,
    ) -> Result<B, EvaluationError> {
        if self.log_errors {
            tracing::error!(rule, error = %error, "an error occurred while applying rule");
        }
        Err(error)
    }
}
