use std::collections::HashMap;
use std::fmt;
use std::slice;
use std::sync::Arc;

use super::composite::CompositeRule;
use super::error::EvaluationError;
use super::rule::{Rule, SharedRule};
use crate::evaluate::{Direct, GraphStrategy, RulesEngine};
use crate::session::{EvaluationContext, EvaluationSession};

/// A collection of rules that may ask each other for their outcome.
///
/// Rules are written against an [`EvaluationContext`] instead of the raw
/// facts. Every call to [`apply_first`](Self::apply_first) or
/// [`apply_all`](Self::apply_all) creates a fresh session: each rule is
/// tested and applied at most once for that call, however many other rules
/// reference it, and a circular reference fails the call with a
/// [`CyclicDependency`](EvaluationError::CyclicDependency) root cause.
///
/// # Example
///
/// ```
/// use rulegraph::{EvaluationContext, RulesGraph};
///
/// type Ctx = EvaluationContext<u32, String>;
///
/// let graph = RulesGraph::<u32, String>::new()
///     .add(|r| r.with_id("adult").when(|ctx: &Ctx| *ctx.facts() >= 18).then_return("adult".into()))
///     .add(|r| {
///         r.with_id("voter")
///             .with_priority(1)
///             .try_when(|ctx: &Ctx| ctx.rule("adult")?.applies())
///             .then_return("voter".into())
///     });
///
/// assert_eq!(graph.apply_first(30).unwrap().as_deref(), Some("voter"));
/// assert_eq!(graph.apply_all(30).unwrap().len(), 2);
/// assert_eq!(graph.apply_first(12).unwrap(), None);
/// ```
pub struct RulesGraph<A, B> {
    rules: Vec<SharedRule<EvaluationContext<A, B>, B>>,
    engine: RulesEngine<GraphStrategy>,
}

impl<A, B> RulesGraph<A, B>
where
    A: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            engine: RulesEngine::graph(),
        }
    }

    pub fn from_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = SharedRule<EvaluationContext<A, B>, B>>,
    {
        Self {
            rules: rules.into_iter().collect(),
            engine: RulesEngine::graph(),
        }
    }

    /// Define a rule with the fluent API. The closure receives an
    /// always-applying [`CompositeRule`] whose id is the current number of
    /// rules.
    #[must_use]
    pub fn add<R>(self, build: impl FnOnce(CompositeRule<EvaluationContext<A, B>, B>) -> R) -> Self
    where
        R: Rule<EvaluationContext<A, B>, B> + 'static,
    {
        let seed = CompositeRule::new(self.rules.len().to_string())
            .when(|_: &EvaluationContext<A, B>| true);
        self.push(build(seed))
    }

    #[must_use]
    pub fn push(self, rule: impl Rule<EvaluationContext<A, B>, B> + 'static) -> Self {
        self.push_shared(Arc::new(rule))
    }

    #[must_use]
    pub fn push_shared(mut self, rule: SharedRule<EvaluationContext<A, B>, B>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Reconfigure the engine, e.g. to change ordering or traversal.
    #[must_use]
    pub fn set_rules_engine(
        mut self,
        configure: impl FnOnce(RulesEngine<GraphStrategy>) -> RulesEngine<GraphStrategy>,
    ) -> Self {
        self.engine = configure(self.engine);
        self
    }

    #[must_use]
    pub fn rules_engine(&self) -> &RulesEngine<GraphStrategy> {
        &self.engine
    }

    /// A fresh session over `facts`, for inspecting rules one by one.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::DuplicateRule`] if two rules share an id.
    pub fn session(&self, facts: A) -> Result<EvaluationContext<A, B>, EvaluationError> {
        Ok(EvaluationSession::new(self.rules.iter().cloned(), facts)?.into_context())
    }

}

impl<A, B> RulesGraph<A, B>
where
    A: fmt::Debug + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Result of the first applicable rule.
    ///
    /// # Errors
    ///
    /// Returns the first failure met, including cyclic references. A
    /// failure raised by a rule records the facts it was evaluated against.
    pub fn apply_first(&self, facts: A) -> Result<Option<B>, EvaluationError> {
        let ctx = self.session(facts)?;
        self.engine
            .apply_first(&self.rules, &ctx)
            .map_err(|e| e.with_facts(ctx.facts()))
    }

    /// Results of every applicable rule, keyed by rule id.
    ///
    /// # Errors
    ///
    /// Returns the first failure met, including cyclic references. A
    /// failure raised by a rule records the facts it was evaluated against.
    pub fn apply_all(&self, facts: A) -> Result<HashMap<String, B>, EvaluationError> {
        let ctx = self.session(facts)?;
        self.engine
            .apply_all(&self.rules, &ctx)
            .map_err(|e| e.with_facts(ctx.facts()))
    }
}

impl<A, B> RulesGraph<A, B> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, SharedRule<EvaluationContext<A, B>, B>> {
        self.rules.iter()
    }
}

impl<A, B> Default for RulesGraph<A, B>
where
    A: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, B> FromIterator<SharedRule<EvaluationContext<A, B>, B>> for RulesGraph<A, B>
where
    A: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = SharedRule<EvaluationContext<A, B>, B>>>(iter: I) -> Self {
        Self::from_rules(iter)
    }
}

impl<A, B> fmt::Debug for RulesGraph<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulesGraph")
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .field("engine", &self.engine)
            .finish()
    }
}

/// A collection of independent rules evaluated directly against the facts.
///
/// ```
/// use rulegraph::Rules;
///
/// let rules = Rules::<i64, &str>::new()
///     .add(|r| r.with_id("negative").when(|n: &i64| *n < 0).then_return("negative"))
///     .add(|r| r.with_id("zero").when(|n: &i64| *n == 0).then_return("zero"));
///
/// assert_eq!(rules.apply_first(&-3).unwrap(), Some("negative"));
/// assert_eq!(rules.apply_first(&7).unwrap(), None);
/// ```
pub struct Rules<F, B> {
    rules: Vec<SharedRule<F, B>>,
    engine: RulesEngine<Direct>,
}

impl<F, B> Rules<F, B>
where
    F: Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            engine: RulesEngine::new(),
        }
    }

    pub fn from_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = SharedRule<F, B>>,
    {
        Self {
            rules: rules.into_iter().collect(),
            engine: RulesEngine::new(),
        }
    }

    /// Define a rule with the fluent API. The closure receives an
    /// always-applying [`CompositeRule`] whose id is the current number of
    /// rules.
    #[must_use]
    pub fn add<R>(self, build: impl FnOnce(CompositeRule<F, B>) -> R) -> Self
    where
        R: Rule<F, B> + 'static,
    {
        let seed = CompositeRule::new(self.rules.len().to_string()).when(|_: &F| true);
        self.push(build(seed))
    }

    #[must_use]
    pub fn push(self, rule: impl Rule<F, B> + 'static) -> Self {
        self.push_shared(Arc::new(rule))
    }

    #[must_use]
    pub fn push_shared(mut self, rule: SharedRule<F, B>) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn set_rules_engine(
        mut self,
        configure: impl FnOnce(RulesEngine<Direct>) -> RulesEngine<Direct>,
    ) -> Self {
        self.engine = configure(self.engine);
        self
    }

    #[must_use]
    pub fn rules_engine(&self) -> &RulesEngine<Direct> {
        &self.engine
    }

}

impl<F, B> Rules<F, B>
where
    F: fmt::Debug + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// # Errors
    ///
    /// Returns the first failure met, with the facts recorded on it.
    pub fn apply_first(&self, facts: &F) -> Result<Option<B>, EvaluationError> {
        self.engine
            .apply_first(&self.rules, facts)
            .map_err(|e| e.with_facts(facts))
    }

    /// # Errors
    ///
    /// Returns the first failure met, with the facts recorded on it.
    pub fn apply_all(&self, facts: &F) -> Result<HashMap<String, B>, EvaluationError> {
        self.engine
            .apply_all(&self.rules, facts)
            .map_err(|e| e.with_facts(facts))
    }
}

impl<F, B> Rules<F, B> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, SharedRule<F, B>> {
        self.rules.iter()
    }
}

impl<F, B> Default for Rules<F, B>
where
    F: Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<F, B> FromIterator<SharedRule<F, B>> for Rules<F, B>
where
    F: Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = SharedRule<F, B>>>(iter: I) -> Self {
        Self::from_rules(iter)
    }
}

impl<F, B> fmt::Debug for Rules<F, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .field("engine", &self.engine)
            .finish()
    }
}
