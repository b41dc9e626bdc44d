//! Interception points around a rule's condition and action.
//!
//! A [`HookableRule`] runs an ordered pipeline of [`RuleHook`]s around a
//! delegate rule. The first hook is the outermost layer: its `before_*`
//! method runs first and its `after_*`/`on_*_error` methods run last. An
//! error raised inside a layer, including by that layer's own `before_*` or
//! `after_apply`, is offered to the same layer's error hook before it
//! travels outward.

mod logger;

use std::fmt;
use std::sync::Arc;

pub use logger::RuleLogger;

use crate::{EvaluationError, Rule, SharedRule};

/// Callbacks invoked around a rule's evaluation. Every method defaults to a
/// transparent pass-through.
pub trait RuleHook<F, B>: Send + Sync {
    /// Runs before the condition. Returning `false` vetoes the test: the
    /// condition is skipped and the rule does not apply.
    ///
    /// # Errors
    ///
    /// An error is handled as if the condition had raised it.
    fn before_test(&self, _rule: &str, _facts: &F) -> Result<bool, EvaluationError> {
        Ok(true)
    }

    /// Runs after a successful test with its outcome.
    fn after_test(&self, _rule: &str, _facts: &F, _applies: bool) {}

    /// Runs when the test failed. Either propagate `error` or substitute an outcome.
    ///
    /// # Errors
    ///
    /// The default implementation returns `error` unchanged.
    fn on_test_error(
        &self,
        _rule: &str,
        _facts: &F,
        error: EvaluationError,
    ) -> Result<bool, EvaluationError> {
        Err(error)
    }

    /// Runs before the action.
    ///
    /// # Errors
    ///
    /// An error is handled as if the action had raised it.
    fn before_apply(&self, _rule: &str, _facts: &F) -> Result<(), EvaluationError> {
        Ok(())
    }

    /// Runs after a successful action and may replace its result.
    ///
    /// # Errors
    ///
    /// An error is handled as if the action had raised it.
    fn after_apply(&self, _rule: &str, _facts: &F, result: B) -> Result<B, EvaluationError> {
        Ok(result)
    }

    /// Runs when the action failed. Either propagate `error` or substitute a result.
    ///
    /// # Errors
    ///
    /// The default implementation returns `error` unchanged.
    fn on_apply_error(
        &self,
        _rule: &str,
        _facts: &F,
        error: EvaluationError,
    ) -> Result<B, EvaluationError> {
        Err(error)
    }
}

/// A rule wrapped in a pipeline of [`RuleHook`]s.
///
/// `HookableRule` is itself a [`Rule`], so wrappers compose by plain
/// delegation: a logged rule can be handed to a rules graph, which wraps it
/// again in its own memoizing hook.
///
/// # Example
///
/// ```
/// use rulegraph::{CompositeRule, EvaluationError, HookableRule, Rule, RuleHook};
///
/// struct Fallback;
///
/// impl RuleHook<i64, i64> for Fallback {
///     fn on_apply_error(&self, _rule: &str, _facts: &i64, _error: EvaluationError)
///         -> Result<i64, EvaluationError> {
///         Ok(0)
///     }
/// }
///
/// let inverse = CompositeRule::new("inverse")
///     .when(|_: &i64| true)
///     .try_then(|n: &i64| {
///         if *n == 0 {
///             Err(EvaluationError::custom("division by zero"))
///         } else {
///             Ok(100 / n)
///         }
///     });
/// let safe = HookableRule::new(inverse).with_hook(Fallback);
///
/// assert_eq!(safe.apply(&4).unwrap(), 25);
/// assert_eq!(safe.apply(&0).unwrap(), 0);
/// ```
pub struct HookableRule<F, B> {
    delegate: SharedRule<F, B>,
    hooks: Vec<Arc<dyn RuleHook<F, B>>>,
}

impl<F, B> HookableRule<F, B> {
    /// Wrap `rule` with an empty pipeline.
    pub fn new(rule: impl Rule<F, B> + 'static) -> Self {
        Self::from_shared(Arc::new(rule))
    }

    /// Wrap an already shared rule with an empty pipeline.
    pub fn from_shared(rule: SharedRule<F, B>) -> Self {
        Self {
            delegate: rule,
            hooks: Vec::new(),
        }
    }

    /// Append `hook` as the innermost layer of the pipeline.
    #[must_use]
    pub fn with_hook(mut self, hook: impl RuleHook<F, B> + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Append an already shared hook as the innermost layer of the pipeline.
    #[must_use]
    pub fn with_shared_hook(mut self, hook: Arc<dyn RuleHook<F, B>>) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn delegate(&self) -> &SharedRule<F, B> {
        &self.delegate
    }

    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    fn test_layer(&self, layer: usize, facts: &F) -> Result<bool, EvaluationError> {
        let Some(hook) = self.hooks.get(layer) else {
            return self.delegate.test(facts);
        };
        let id = self.delegate.id();
        let outcome = hook.before_test(id, facts).and_then(|proceed| {
            if proceed {
                self.test_layer(layer + 1, facts)
            } else {
                Ok(false)
            }
        });
        match outcome {
            Ok(applies) => {
                hook.after_test(id, facts, applies);
                Ok(applies)
            }
            Err(error) => hook.on_test_error(id, facts, error),
        }
    }

    fn apply_layer(&self, layer: usize, facts: &F) -> Result<B, EvaluationError> {
        let Some(hook) = self.hooks.get(layer) else {
            return self.delegate.apply(facts);
        };
        let id = self.delegate.id();
        hook.before_apply(id, facts)
            .and_then(|()| self.apply_layer(layer + 1, facts))
            .and_then(|result| hook.after_apply(id, facts, result))
            .or_else(|error| hook.on_apply_error(id, facts, error))
    }
}

impl<F, B> Rule<F, B> for HookableRule<F, B> {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn priority(&self) -> i32 {
        self.delegate.priority()
    }

    fn test(&self, facts: &F) -> Result<bool, EvaluationError> {
        self.test_layer(0, facts)
    }

    fn apply(&self, facts: &F) -> Result<B, EvaluationError> {
        self.apply_layer(0, facts)
    }
}

impl<F, B> fmt::Debug for HookableRule<F, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookableRule")
            .field("id", &self.delegate.id())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
