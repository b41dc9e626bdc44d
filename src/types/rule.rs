use std::cmp::Ordering;
use std::sync::Arc;

use super::error::EvaluationError;

/// The union of a condition and an action evaluated against facts of type `F`.
///
/// [`test`](Rule::test) tells whether the rule can be applied to the facts,
/// [`apply`](Rule::apply) applies it and produces a result. Both may fail;
/// the failure travels as an [`EvaluationError`].
///
/// Rules are immutable and live across many evaluations, so they must be
/// shareable between threads.
pub trait Rule<F, B>: Send + Sync {
    /// Identifier, unique within a rule collection.
    fn id(&self) -> &str;

    /// Higher priorities are preferred. Defaults to `0`.
    fn priority(&self) -> i32 {
        0
    }

    /// # Errors
    ///
    /// Returns whatever the condition raised.
    fn test(&self, facts: &F) -> Result<bool, EvaluationError>;

    /// # Errors
    ///
    /// Returns whatever the action raised.
    fn apply(&self, facts: &F) -> Result<B, EvaluationError>;
}

/// A rule shared between collections, sessions and threads.
pub type SharedRule<F, B> = Arc<dyn Rule<F, B>>;

impl<F, B, R> Rule<F, B> for Arc<R>
where
    R: Rule<F, B> + ?Sized,
{
    fn id(&self) -> &str {
        (**self).id()
    }

    fn priority(&self) -> i32 {
        (**self).priority()
    }

    fn test(&self, facts: &F) -> Result<bool, EvaluationError> {
        (**self).test(facts)
    }

    fn apply(&self, facts: &F) -> Result<B, EvaluationError> {
        (**self).apply(facts)
    }
}

/// Total order over rules: higher priority first, then ascending id.
///
/// Two rules with the same id compare equal whatever their priorities.
pub fn compare_rules<F, B>(a: &dyn Rule<F, B>, b: &dyn Rule<F, B>) -> Ordering {
    if a.id() == b.id() {
        return Ordering::Equal;
    }
    b.priority()
        .cmp(&a.priority())
        .then_with(|| a.id().cmp(b.id()))
}
