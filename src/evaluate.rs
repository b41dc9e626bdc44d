use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use crate::session::EvaluationContext;
use crate::{compare_rules, EvaluationError, Phase, Rule, SharedRule};

/// Decides which rule objects the engine actually evaluates.
pub trait EvaluationStrategy<F, B>: Send + Sync {
    /// Map the rules handed to the engine to the rules it evaluates.
    ///
    /// # Errors
    ///
    /// Returns an error when a rule cannot be resolved against `facts`.
    fn resolve(
        &self,
        rules: &[SharedRule<F, B>],
        facts: &F,
    ) -> Result<Vec<SharedRule<F, B>>, EvaluationError>;
}

/// Evaluates the rules as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

impl<F, B> EvaluationStrategy<F, B> for Direct {
    fn resolve(
        &self,
        rules: &[SharedRule<F, B>],
        _facts: &F,
    ) -> Result<Vec<SharedRule<F, B>>, EvaluationError> {
        Ok(rules.to_vec())
    }
}

/// Evaluates each rule through its proxy in the session carried by the
/// facts, so that outcomes are memoized and cross references are tracked.
///
/// Only available when the facts are an [`EvaluationContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphStrategy;

impl<A, B> EvaluationStrategy<EvaluationContext<A, B>, B> for GraphStrategy
where
    A: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn resolve(
        &self,
        rules: &[SharedRule<EvaluationContext<A, B>, B>],
        facts: &EvaluationContext<A, B>,
    ) -> Result<Vec<SharedRule<EvaluationContext<A, B>, B>>, EvaluationError> {
        let session = facts.session();
        rules
            .iter()
            .map(|rule| {
                let proxy = session.proxy(rule.id())?;
                Ok(Arc::clone(proxy) as SharedRule<EvaluationContext<A, B>, B>)
            })
            .collect()
    }
}

/// Order in which the engine visits the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleOrder {
    /// Higher priority first, ties broken by ascending id.
    #[default]
    Priority,
    /// The order the rules were given in.
    Insertion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    #[default]
    Sequential,
    /// Spread the rules over the rayon thread pool.
    Parallel,
}

type ErrorMapper = Arc<dyn Fn(EvaluationError) -> EvaluationError + Send + Sync>;

/// Stateless evaluator of rule lists.
///
/// The engine is configured with a builder-style API and is cheap to clone.
/// Any failure raised by a rule aborts the call and is reported as an
/// [`EvaluationError::RuleEvaluation`] naming the rule and phase.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use rulegraph::{CompositeRule, RulesEngine, SharedRule};
///
/// let rules: Vec<SharedRule<i64, &str>> = vec![
///     Arc::new(CompositeRule::new("small").when(|n: &i64| *n < 10).then_return("small")),
///     Arc::new(CompositeRule::new("even").with_priority(1).when(|n: &i64| n % 2 == 0).then_return("even")),
/// ];
/// let engine = RulesEngine::new();
///
/// assert_eq!(engine.apply_first(&rules, &4).unwrap(), Some("even"));
/// assert_eq!(engine.apply_all(&rules, &4).unwrap().len(), 2);
/// ```
pub struct RulesEngine<S = Direct> {
    strategy: S,
    order: RuleOrder,
    traversal: Traversal,
    error_mapper: Option<ErrorMapper>,
}

impl RulesEngine<Direct> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RulesEngine<GraphStrategy> {
    /// An engine evaluating rules through the session carried by their facts.
    #[must_use]
    pub fn graph() -> Self {
        RulesEngine::new().with_strategy(GraphStrategy)
    }
}

impl Default for RulesEngine<Direct> {
    fn default() -> Self {
        Self {
            strategy: Direct,
            order: RuleOrder::default(),
            traversal: Traversal::default(),
            error_mapper: None,
        }
    }
}

impl<S> RulesEngine<S> {
    #[must_use]
    pub fn with_strategy<T>(self, strategy: T) -> RulesEngine<T> {
        RulesEngine {
            strategy,
            order: self.order,
            traversal: self.traversal,
            error_mapper: self.error_mapper,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: RuleOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Shorthand for `with_traversal(Traversal::Parallel)`.
    #[must_use]
    pub fn parallel(self) -> Self {
        self.with_traversal(Traversal::Parallel)
    }

    /// Transform every failure before it is returned, replacing any
    /// previously configured mapping.
    #[must_use]
    pub fn with_error_mapping<M>(mut self, mapper: M) -> Self
    where
        M: Fn(EvaluationError) -> EvaluationError + Send + Sync + 'static,
    {
        self.error_mapper = Some(Arc::new(mapper));
        self
    }

    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    #[must_use]
    pub fn order(&self) -> RuleOrder {
        self.order
    }

    #[must_use]
    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    /// Apply the first rule, in the configured order, whose condition holds.
    ///
    /// With parallel traversal every condition is tested before the winner
    /// is applied, so a failing condition aborts the call even when it comes
    /// after the winner.
    ///
    /// # Errors
    ///
    /// Returns the first failure met, wrapped with the failing rule and phase.
    pub fn apply_first<F, B>(
        &self,
        rules: &[SharedRule<F, B>],
        facts: &F,
    ) -> Result<Option<B>, EvaluationError>
    where
        S: EvaluationStrategy<F, B>,
        F: Sync,
        B: Send,
    {
        let rules = self.prepare(rules, facts)?;
        let winner = match self.traversal {
            Traversal::Sequential => {
                let mut winner = None;
                for rule in &rules {
                    if self.test(rule, facts)? {
                        winner = Some(rule);
                        break;
                    }
                }
                winner
            }
            Traversal::Parallel => {
                let outcomes = rules
                    .par_iter()
                    .map(|rule| self.test(rule, facts))
                    .collect::<Result<Vec<_>, _>>()?;
                rules
                    .iter()
                    .zip(outcomes)
                    .find_map(|(rule, applies)| applies.then_some(rule))
            }
        };
        winner.map(|rule| self.apply(rule, facts)).transpose()
    }

    /// Apply every rule whose condition holds, keyed by rule id.
    ///
    /// # Errors
    ///
    /// Returns the first failure met, wrapped with the failing rule and
    /// phase. No partial result is returned.
    pub fn apply_all<F, B>(
        &self,
        rules: &[SharedRule<F, B>],
        facts: &F,
    ) -> Result<HashMap<String, B>, EvaluationError>
    where
        S: EvaluationStrategy<F, B>,
        F: Sync,
        B: Send,
    {
        let rules = self.prepare(rules, facts)?;
        let fire = |rule: &SharedRule<F, B>| -> Result<Option<(String, B)>, EvaluationError> {
            if self.test(rule, facts)? {
                Ok(Some((rule.id().to_owned(), self.apply(rule, facts)?)))
            } else {
                Ok(None)
            }
        };
        let fired = match self.traversal {
            Traversal::Sequential => rules.iter().map(fire).collect::<Result<Vec<_>, _>>()?,
            Traversal::Parallel => rules.par_iter().map(fire).collect::<Result<Vec<_>, _>>()?,
        };
        Ok(fired.into_iter().flatten().collect())
    }

    fn prepare<F, B>(
        &self,
        rules: &[SharedRule<F, B>],
        facts: &F,
    ) -> Result<Vec<SharedRule<F, B>>, EvaluationError>
    where
        S: EvaluationStrategy<F, B>,
    {
        let mut resolved = self.strategy.resolve(rules, facts)?;
        if self.order == RuleOrder::Priority {
            resolved.sort_by(|a, b| compare_rules(a.as_ref(), b.as_ref()));
        }
        tracing::trace!(
            rules = resolved.len(),
            order = ?self.order,
            traversal = ?self.traversal,
            "evaluating rules"
        );
        Ok(resolved)
    }

    fn test<F, B>(&self, rule: &SharedRule<F, B>, facts: &F) -> Result<bool, EvaluationError> {
        let applies = rule
            .test(facts)
            .map_err(|e| self.fail(rule.id(), Phase::Condition, e))?;
        tracing::trace!(rule = rule.id(), applies, "rule tested");
        Ok(applies)
    }

    fn apply<F, B>(&self, rule: &SharedRule<F, B>, facts: &F) -> Result<B, EvaluationError> {
        let result = rule
            .apply(facts)
            .map_err(|e| self.fail(rule.id(), Phase::Action, e))?;
        tracing::trace!(rule = rule.id(), "rule applied");
        Ok(result)
    }

    fn fail(&self, rule: &str, phase: Phase, source: EvaluationError) -> EvaluationError {
        let error = EvaluationError::evaluation(rule, phase, source);
        match &self.error_mapper {
            Some(mapper) => mapper(error),
            None => error,
        }
    }
}

impl<S: Clone> Clone for RulesEngine<S> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy.clone(),
            order: self.order,
            traversal: self.traversal,
            error_mapper: self.error_mapper.clone(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for RulesEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulesEngine")
            .field("strategy", &self.strategy)
            .field("order", &self.order)
            .field("traversal", &self.traversal)
            .field("error_mapping", &self.error_mapper.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::session::EvaluationSession;
    use crate::CompositeRule;

    fn rule(id: &str, applies: bool, result: i64) -> SharedRule<i64, i64> {
        Arc::new(
            CompositeRule::new(id)
                .when(move |_: &i64| applies)
                .then_return(result),
        )
    }

    fn counted(id: &str, applies: bool, tests: &Arc<AtomicUsize>) -> SharedRule<i64, i64> {
        let tests = Arc::clone(tests);
        Arc::new(
            CompositeRule::new(id)
                .when(move |_: &i64| {
                    tests.fetch_add(1, Ordering::SeqCst);
                    applies
                })
                .then_return(1),
        )
    }

    fn broken_condition(id: &str) -> SharedRule<i64, i64> {
        Arc::new(
            CompositeRule::new(id)
                .try_when(|_: &i64| Err(EvaluationError::custom("bad condition")))
                .then_return(0),
        )
    }

    fn broken_action(id: &str) -> SharedRule<i64, i64> {
        Arc::new(
            CompositeRule::new(id)
                .when(|_: &i64| true)
                .try_then(|_: &i64| Err(EvaluationError::custom("bad action"))),
        )
    }

    #[test]
    fn no_rule_matches() {
        let rules = vec![rule("a", false, 1)];
        let engine = RulesEngine::new();
        assert_eq!(engine.apply_first(&rules, &0).unwrap(), None);
        assert!(engine.apply_all(&rules, &0).unwrap().is_empty());
    }

    #[test]
    fn empty_rule_list() {
        let engine = RulesEngine::new().parallel();
        assert_eq!(engine.apply_first::<i64, i64>(&[], &0).unwrap(), None);
        assert!(engine.apply_all::<i64, i64>(&[], &0).unwrap().is_empty());
    }

    #[test]
    fn apply_first_stops_at_first_match() {
        let tests = Arc::new(AtomicUsize::new(0));
        let rules = vec![
            counted("a", false, &tests),
            counted("b", true, &tests),
            counted("c", false, &tests),
        ];
        let first = RulesEngine::new()
            .with_order(RuleOrder::Insertion)
            .apply_first(&rules, &0)
            .unwrap();
        assert_eq!(first, Some(1));
        assert_eq!(tests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn apply_all_collects_matches() {
        let rules = vec![rule("a", true, 1), rule("b", false, 2), rule("c", true, 3)];
        let all = RulesEngine::new().apply_all(&rules, &0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"], 1);
        assert_eq!(all["c"], 3);
    }

    #[test]
    fn priority_order_prefers_higher_priority() {
        let low: SharedRule<i64, i64> = Arc::new(
            CompositeRule::new("a")
                .when(|_: &i64| true)
                .then_return(1),
        );
        let high: SharedRule<i64, i64> = Arc::new(
            CompositeRule::new("z")
                .with_priority(5)
                .when(|_: &i64| true)
                .then_return(2),
        );
        let rules = vec![low, high];

        let engine = RulesEngine::new();
        assert_eq!(engine.apply_first(&rules, &0).unwrap(), Some(2));
        let engine = engine.with_order(RuleOrder::Insertion);
        assert_eq!(engine.apply_first(&rules, &0).unwrap(), Some(1));
    }

    #[test]
    fn ties_are_broken_by_id() {
        let rules = vec![rule("b", true, 2), rule("a", true, 1)];
        assert_eq!(RulesEngine::new().apply_first(&rules, &0).unwrap(), Some(1));
    }

    #[test]
    fn condition_failure_is_wrapped() {
        let rules = vec![broken_condition("bad")];
        let err = RulesEngine::new().apply_first(&rules, &0).unwrap_err();
        assert!(matches!(
            &err,
            EvaluationError::RuleEvaluation { rule, phase: Phase::Condition, .. } if rule == "bad"
        ));
        assert_eq!(err.root_cause().to_string(), "bad condition");
    }

    #[test]
    fn action_failure_is_wrapped() {
        let rules = vec![broken_action("bad")];
        let err = RulesEngine::new().apply_all(&rules, &0).unwrap_err();
        assert!(matches!(
            &err,
            EvaluationError::RuleEvaluation { phase: Phase::Action, .. }
        ));
        assert_eq!(err.rule(), Some("bad"));
    }

    #[test]
    fn error_mapping_is_applied() {
        let engine = RulesEngine::new().with_error_mapping(|e| {
            EvaluationError::custom(format!("mapped: {}", e.root_cause()))
        });
        let conditions = vec![broken_condition("c")];
        let actions = vec![broken_action("a")];
        assert_eq!(
            engine.apply_first(&conditions, &0).unwrap_err().to_string(),
            "mapped: bad condition"
        );
        assert_eq!(
            engine.apply_all(&actions, &0).unwrap_err().to_string(),
            "mapped: bad action"
        );
    }

    #[test]
    fn parallel_matches_sequential() {
        let rules: Vec<SharedRule<i64, i64>> = (0..64)
            .map(|i| rule(&format!("r{i:02}"), i % 3 == 0, i))
            .collect();
        let sequential = RulesEngine::new();
        let parallel = RulesEngine::new().parallel();

        assert_eq!(
            sequential.apply_all(&rules, &0).unwrap(),
            parallel.apply_all(&rules, &0).unwrap()
        );
        assert_eq!(
            sequential.apply_first(&rules, &0).unwrap(),
            parallel.apply_first(&rules, &0).unwrap()
        );
    }

    #[test]
    fn parallel_traversal_runs_every_rule_on_the_pool() {
        let pooled = Arc::new(AtomicUsize::new(0));
        let rules: Vec<SharedRule<i64, i64>> = (0i64..64)
            .map(|i| {
                let pooled = Arc::clone(&pooled);
                Arc::new(
                    CompositeRule::new(format!("r{i:02}"))
                        .when(move |_: &i64| {
                            if rayon::current_thread_index().is_some() {
                                pooled.fetch_add(1, Ordering::SeqCst);
                            }
                            true
                        })
                        .then_return(i),
                ) as SharedRule<i64, i64>
            })
            .collect();

        let all = RulesEngine::new().parallel().apply_all(&rules, &0).unwrap();
        assert_eq!(all.len(), 64);
        assert_eq!(pooled.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn parallel_graph_is_not_held_back_by_a_blocked_rule() {
        type Ctx = EvaluationContext<i64, i64>;
        let slow: SharedRule<Ctx, i64> = Arc::new(
            CompositeRule::new("slow")
                .with_priority(10)
                .when(|_: &Ctx| {
                    std::thread::sleep(std::time::Duration::from_millis(30));
                    true
                })
                .then_return(1),
        );
        let mut rules = vec![slow];
        rules.extend((0i64..32).map(|i| {
            Arc::new(
                CompositeRule::new(format!("reader{i:02}"))
                    .try_when(|ctx: &Ctx| ctx.rule("slow")?.applies())
                    .then(move |_: &Ctx| i),
            ) as SharedRule<Ctx, i64>
        }));
        let ctx = EvaluationSession::new(rules.clone(), 0)
            .unwrap()
            .into_context();

        let all = RulesEngine::graph()
            .parallel()
            .apply_all(&rules, &ctx)
            .unwrap();
        assert_eq!(all.len(), 33);
        assert_eq!(ctx.session().graph().edge_count(), 32);
    }

    #[test]
    fn strategy_is_exposed() {
        let engine = RulesEngine::graph();
        assert!(matches!(engine.strategy(), GraphStrategy));
        assert!(matches!(RulesEngine::new().strategy(), Direct));
    }

    #[test]
    fn parallel_failure_aborts() {
        let mut rules: Vec<SharedRule<i64, i64>> =
            (0..16).map(|i| rule(&format!("r{i:02}"), true, i)).collect();
        rules.push(broken_action("zz"));
        let err = RulesEngine::new()
            .parallel()
            .apply_all(&rules, &0)
            .unwrap_err();
        assert_eq!(err.rule(), Some("zz"));
    }

    #[test]
    fn graph_strategy_resolves_proxies() {
        type Ctx = EvaluationContext<i64, i64>;
        let rules: Vec<SharedRule<Ctx, i64>> = vec![Arc::new(
            CompositeRule::new("double")
                .when(|_: &Ctx| true)
                .then(|ctx: &Ctx| ctx.facts() * 2),
        )];
        let ctx = EvaluationSession::new(rules.clone(), 21)
            .unwrap()
            .into_context();

        let engine = RulesEngine::graph();
        assert_eq!(engine.apply_first(&rules, &ctx).unwrap(), Some(42));
        let proxy = ctx.session().proxy("double").unwrap();
        assert_eq!(proxy.memoized_result(), Some(42));
    }

    #[test]
    fn graph_strategy_rejects_foreign_rules() {
        type Ctx = EvaluationContext<i64, i64>;
        let known: SharedRule<Ctx, i64> = Arc::new(CompositeRule::new("known"));
        let foreign: SharedRule<Ctx, i64> = Arc::new(CompositeRule::new("foreign"));
        let ctx = EvaluationSession::new(vec![known], 0)
            .unwrap()
            .into_context();

        let err = RulesEngine::graph()
            .apply_all(&[foreign], &ctx)
            .unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownRule { id } if id == "foreign"));
    }

    #[test]
    fn configuration_is_kept_across_strategy_change() {
        let engine = RulesEngine::new()
            .with_order(RuleOrder::Insertion)
            .parallel()
            .with_strategy(GraphStrategy);
        assert_eq!(engine.order(), RuleOrder::Insertion);
        assert_eq!(engine.traversal(), Traversal::Parallel);
    }
}
