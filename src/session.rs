//! One evaluation of a rule collection against one facts value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::DependencyGraph;
use crate::proxy::RuleProxy;
use crate::{EvaluationError, Rule, RuleStatus, SharedRule, Vertex};

/// Per-call state of a rules graph: the facts, one [`RuleProxy`] per rule,
/// the dependency graph discovered so far and one lock per rule phase.
///
/// Everything is built eagerly when the session is created; no rule body
/// runs until a proxy is asked for an outcome. A session is discarded at the
/// end of the call that created it.
pub struct EvaluationSession<A, B> {
    facts: A,
    order: Vec<String>,
    proxies: HashMap<String, Arc<RuleProxy<A, B>>>,
    graph: Mutex<DependencyGraph>,
    locks: HashMap<Vertex, Mutex<()>>,
}

impl<A, B> EvaluationSession<A, B>
where
    A: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Wrap every rule in a proxy bound to `facts`.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::DuplicateRule`] if two rules share an id.
    pub fn new<I>(rules: I, facts: A) -> Result<Self, EvaluationError>
    where
        I: IntoIterator<Item = SharedRule<EvaluationContext<A, B>, B>>,
    {
        let mut order = Vec::new();
        let mut proxies = HashMap::new();
        let mut locks = HashMap::new();

        for rule in rules {
            let id = rule.id().to_owned();
            if proxies.contains_key(&id) {
                return Err(EvaluationError::DuplicateRule { id });
            }
            let proxy = RuleProxy::new(rule);
            locks.insert(proxy.condition_vertex().clone(), Mutex::new(()));
            locks.insert(proxy.action_vertex().clone(), Mutex::new(()));
            proxies.insert(id.clone(), Arc::new(proxy));
            order.push(id);
        }

        tracing::debug!(rules = order.len(), "evaluation session created");
        Ok(Self {
            facts,
            order,
            proxies,
            graph: Mutex::new(DependencyGraph::new()),
            locks,
        })
    }

    /// The root context handed to the engine: it carries no caller, so the
    /// top-level test and apply calls record no dependency.
    #[must_use]
    pub fn into_context(self) -> EvaluationContext<A, B> {
        EvaluationContext {
            session: Arc::new(self),
            caller: None,
        }
    }
}

impl<A, B> EvaluationSession<A, B> {
    #[must_use]
    pub fn facts(&self) -> &A {
        &self.facts
    }

    /// # Errors
    ///
    /// Returns [`EvaluationError::UnknownRule`] if no rule has this id.
    pub fn proxy(&self, id: &str) -> Result<&Arc<RuleProxy<A, B>>, EvaluationError> {
        self.proxies
            .get(id)
            .ok_or_else(|| EvaluationError::UnknownRule { id: id.to_owned() })
    }

    /// Rule ids in the order the rules were handed to the session.
    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// A snapshot of the dependencies recorded so far.
    #[must_use]
    pub fn graph(&self) -> DependencyGraph {
        self.graph.lock().clone()
    }

    pub(crate) fn add_edge(&self, from: &Vertex, to: &Vertex) -> Result<(), EvaluationError> {
        let mut graph = self.graph.lock();
        match graph.add_edge(from, to) {
            Ok(()) => {
                tracing::trace!(%from, %to, "dependency recorded");
                Ok(())
            }
            Err(cycle) => {
                tracing::debug!(%from, %to, %cycle, "dependency rejected");
                Err(cycle.into())
            }
        }
    }

    pub(crate) fn phase_lock(&self, vertex: &Vertex) -> Result<&Mutex<()>, EvaluationError> {
        self.locks
            .get(vertex)
            .ok_or_else(|| EvaluationError::UnknownRule {
                id: vertex.rule_id().to_owned(),
            })
    }
}

impl<A, B> fmt::Debug for EvaluationSession<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph.lock();
        f.debug_struct("EvaluationSession")
            .field("rules", &self.order)
            .field("vertices", &graph.vertex_count())
            .field("edges", &graph.edge_count())
            .finish_non_exhaustive()
    }
}

/// The facts as seen by the rules of a rules graph.
///
/// Besides the facts themselves, the context gives a rule access to the
/// outcome of every other rule of the same session through
/// [`rule`](Self::rule). It also remembers which rule phase is asking, so
/// that each cross-rule reference is recorded in the session's dependency
/// graph.
pub struct EvaluationContext<A, B> {
    session: Arc<EvaluationSession<A, B>>,
    caller: Option<Vertex>,
}

impl<A, B> EvaluationContext<A, B> {
    #[must_use]
    pub fn facts(&self) -> &A {
        &self.session.facts
    }

    #[must_use]
    pub fn session(&self) -> &Arc<EvaluationSession<A, B>> {
        &self.session
    }

    /// The rule phase currently evaluating, `None` at the top level.
    #[must_use]
    pub fn caller(&self) -> Option<&Vertex> {
        self.caller.as_ref()
    }

    /// Handle on another rule of the session.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::UnknownRule`] if no rule has this id.
    pub fn rule(&self, id: &str) -> Result<RuleContext<'_, A, B>, EvaluationError> {
        let proxy = self.session.proxy(id)?;
        Ok(RuleContext { ctx: self, proxy })
    }

    pub(crate) fn enter(&self, vertex: Vertex) -> Self {
        Self {
            session: Arc::clone(&self.session),
            caller: Some(vertex),
        }
    }
}

impl<A, B> Clone for EvaluationContext<A, B> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            caller: self.caller.clone(),
        }
    }
}

impl<A, B> fmt::Debug for EvaluationContext<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("caller", &self.caller)
            .field("session", &self.session)
            .finish()
    }
}

/// Outcome of one rule, evaluated lazily on first access.
pub struct RuleContext<'a, A, B> {
    ctx: &'a EvaluationContext<A, B>,
    proxy: &'a Arc<RuleProxy<A, B>>,
}

impl<A, B> RuleContext<'_, A, B> {
    #[must_use]
    pub fn id(&self) -> &str {
        self.proxy.condition_vertex().rule_id()
    }

    /// The status as it stands, without forcing any evaluation.
    #[must_use]
    pub fn current_status(&self) -> RuleStatus {
        self.proxy.current_status()
    }
}

impl<A, B> RuleContext<'_, A, B>
where
    A: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Whether the rule's condition holds.
    ///
    /// # Errors
    ///
    /// Returns the condition's failure, or a cyclic dependency error if the
    /// asking phase is itself needed by this condition.
    pub fn applies(&self) -> Result<bool, EvaluationError> {
        self.proxy.test(self.ctx)
    }

    /// Whether the rule's action ran successfully. Applies the rule if its
    /// condition holds.
    ///
    /// # Errors
    ///
    /// Returns the failure of either phase.
    pub fn applied(&self) -> Result<bool, EvaluationError> {
        Ok(self.status()? == RuleStatus::Applied)
    }

    /// The rule's action result, or `None` if its condition does not hold.
    ///
    /// # Errors
    ///
    /// Returns the failure of either phase.
    pub fn result(&self) -> Result<Option<B>, EvaluationError> {
        if self.proxy.test(self.ctx)? {
            self.proxy.apply(self.ctx).map(Some)
        } else {
            Ok(None)
        }
    }

    /// The rule's final status, after testing and, when it applies,
    /// applying it.
    ///
    /// # Errors
    ///
    /// Returns the failure of either phase.
    pub fn status(&self) -> Result<RuleStatus, EvaluationError> {
        if self.proxy.test(self.ctx)? {
            self.proxy.apply(self.ctx)?;
        }
        Ok(self.proxy.current_status())
    }
}

impl<A, B> fmt::Debug for RuleContext<'_, A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleContext")
            .field("id", &self.id())
            .field("status", &self.current_status())
            .finish()
    }
}
