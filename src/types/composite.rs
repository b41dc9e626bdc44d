use std::fmt;
use std::sync::Arc;

use super::error::EvaluationError;
use super::rule::Rule;

type Condition<F> = Arc<dyn Fn(&F) -> Result<bool, EvaluationError> + Send + Sync>;
type Action<F, B> = Arc<dyn Fn(&F) -> Result<B, EvaluationError> + Send + Sync>;

/// An immutable [`Rule`] assembled from closures with a fluent API.
///
/// Every method returns a modified copy. A rule with an *else* path always
/// applies: its condition only selects which branch the action runs.
///
/// # Example
///
/// ```
/// use rulegraph::{CompositeRule, Rule};
///
/// let even = CompositeRule::<i64, String>::new("even")
///     .with_priority(1)
///     .when(|n| n % 2 == 0)
///     .then(|n| format!("{n} is even"));
///
/// assert!(even.test(&4).unwrap());
/// assert!(!even.test(&3).unwrap());
/// assert_eq!(even.apply(&4).unwrap(), "4 is even");
/// ```
pub struct CompositeRule<F, B> {
    id: String,
    priority: i32,
    condition: Condition<F>,
    then_action: Option<Action<F, B>>,
    then_value: Option<B>,
    else_action: Option<Action<F, B>>,
    else_value: Option<B>,
}

impl<F: 'static, B: 'static> CompositeRule<F, B> {
    /// A never-applying rule with priority `0` and no action.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            condition: Arc::new(|_: &F| -> Result<bool, EvaluationError> { Ok(false) }),
            then_action: None,
            then_value: None,
            else_action: None,
            else_value: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Use `predicate` as the condition.
    #[must_use]
    pub fn when<P>(self, predicate: P) -> Self
    where
        P: Fn(&F) -> bool + Send + Sync + 'static,
    {
        self.try_when(move |facts: &F| Ok(predicate(facts)))
    }

    /// Use a fallible `predicate` as the condition, typically one that asks
    /// other rules for their outcome.
    #[must_use]
    pub fn try_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&F) -> Result<bool, EvaluationError> + Send + Sync + 'static,
    {
        self.condition = Arc::new(predicate);
        self
    }

    /// Use `function` as the action. Clears a previous [`then_return`](Self::then_return).
    #[must_use]
    pub fn then<G>(self, function: G) -> Self
    where
        G: Fn(&F) -> B + Send + Sync + 'static,
    {
        self.try_then(move |facts: &F| Ok(function(facts)))
    }

    /// Fallible version of [`then`](Self::then).
    #[must_use]
    pub fn try_then<G>(mut self, function: G) -> Self
    where
        G: Fn(&F) -> Result<B, EvaluationError> + Send + Sync + 'static,
    {
        self.then_action = Some(Arc::new(function));
        self.then_value = None;
        self
    }

    /// Return `value` when the rule applies. If an action is also set it
    /// still runs, but its value is discarded.
    #[must_use]
    pub fn then_return(mut self, value: B) -> Self {
        self.then_value = Some(value);
        self
    }

    /// Use `function` on the else path. The rule then always applies.
    #[must_use]
    pub fn or_else<G>(self, function: G) -> Self
    where
        G: Fn(&F) -> B + Send + Sync + 'static,
    {
        self.try_or_else(move |facts: &F| Ok(function(facts)))
    }

    /// Fallible version of [`or_else`](Self::or_else).
    #[must_use]
    pub fn try_or_else<G>(mut self, function: G) -> Self
    where
        G: Fn(&F) -> Result<B, EvaluationError> + Send + Sync + 'static,
    {
        self.else_action = Some(Arc::new(function));
        self.else_value = None;
        self
    }

    /// Return `value` on the else path. The rule then always applies.
    #[must_use]
    pub fn or_else_return(mut self, value: B) -> Self {
        self.else_value = Some(value);
        self
    }
}

impl<F, B> CompositeRule<F, B> {
    fn has_else(&self) -> bool {
        self.else_action.is_some() || self.else_value.is_some()
    }
}

impl<F, B> Rule<F, B> for CompositeRule<F, B>
where
    B: Clone + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn test(&self, facts: &F) -> Result<bool, EvaluationError> {
        if self.has_else() {
            return Ok(true);
        }
        (self.condition)(facts)
    }

    fn apply(&self, facts: &F) -> Result<B, EvaluationError> {
        // With an else path the condition is deferred to here and only picks the branch.
        let then_path = if self.has_else() {
            (self.condition)(facts)?
        } else {
            true
        };

        let (action, value) = if then_path {
            (&self.then_action, &self.then_value)
        } else {
            (&self.else_action, &self.else_value)
        };

        match (action, value) {
            (Some(action), Some(value)) => {
                action(facts)?;
                Ok(value.clone())
            }
            (Some(action), None) => action(facts),
            (None, Some(value)) => Ok(value.clone()),
            (None, None) => Err(EvaluationError::MissingAction {
                rule: self.id.clone(),
            }),
        }
    }
}

impl<F, B: Clone> Clone for CompositeRule<F, B> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            priority: self.priority,
            condition: Arc::clone(&self.condition),
            then_action: self.then_action.clone(),
            then_value: self.then_value.clone(),
            else_action: self.else_action.clone(),
            else_value: self.else_value.clone(),
        }
    }
}

impl<F, B> fmt::Debug for CompositeRule<F, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeRule")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("has_else", &self.has_else())
            .finish_non_exhaustive()
    }
}

impl<F, B> fmt::Display for CompositeRule<F, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
