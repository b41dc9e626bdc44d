//! Lazy, memoized evaluation of one rule within one session.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::hook::{HookableRule, RuleHook};
use crate::session::EvaluationContext;
use crate::{EvaluationError, Phase, Rule, RuleStatus, SharedRule, Vertex};

/// What a proxy remembers about its rule during one session.
#[derive(Debug)]
pub(crate) struct ProxyState<B> {
    status: RuleStatus,
    result: Option<B>,
    failure: Option<EvaluationError>,
}

impl<B> ProxyState<B> {
    fn new() -> Self {
        Self {
            status: RuleStatus::Waiting,
            result: None,
            failure: None,
        }
    }

    /// The stored failure, or an inconsistency report when the status does
    /// not allow the requested phase.
    fn replay(&self, rule: &str, phase: Phase) -> EvaluationError {
        self.failure
            .clone()
            .unwrap_or_else(|| EvaluationError::InconsistentState {
                rule: rule.to_owned(),
                phase,
                status: self.status,
            })
    }
}

/// Hook driving the status machine around the delegate's bodies.
struct Memoizer<B> {
    state: Arc<Mutex<ProxyState<B>>>,
}

impl<A, B> RuleHook<EvaluationContext<A, B>, B> for Memoizer<B>
where
    B: Clone + Send,
{
    fn before_test(
        &self,
        _rule: &str,
        _facts: &EvaluationContext<A, B>,
    ) -> Result<bool, EvaluationError> {
        self.state.lock().status = RuleStatus::Testing;
        Ok(true)
    }

    fn after_test(&self, _rule: &str, _facts: &EvaluationContext<A, B>, applies: bool) {
        self.state.lock().status = if applies {
            RuleStatus::TestTrue
        } else {
            RuleStatus::TestFalse
        };
    }

    fn on_test_error(
        &self,
        _rule: &str,
        _facts: &EvaluationContext<A, B>,
        error: EvaluationError,
    ) -> Result<bool, EvaluationError> {
        let mut state = self.state.lock();
        state.status = RuleStatus::TestFailed;
        state.failure = Some(error.clone());
        Err(error)
    }

    fn before_apply(
        &self,
        _rule: &str,
        _facts: &EvaluationContext<A, B>,
    ) -> Result<(), EvaluationError> {
        self.state.lock().status = RuleStatus::Applying;
        Ok(())
    }

    fn after_apply(
        &self,
        _rule: &str,
        _facts: &EvaluationContext<A, B>,
        result: B,
    ) -> Result<B, EvaluationError> {
        let mut state = self.state.lock();
        state.status = RuleStatus::Applied;
        state.result = Some(result.clone());
        Ok(result)
    }

    fn on_apply_error(
        &self,
        _rule: &str,
        _facts: &EvaluationContext<A, B>,
        error: EvaluationError,
    ) -> Result<B, EvaluationError> {
        let mut state = self.state.lock();
        state.status = RuleStatus::ApplyFailed;
        state.failure = Some(error.clone());
        Err(error)
    }
}

/// Stand-in for a rule inside an evaluation session.
///
/// The first call to [`test`](Rule::test) or [`apply`](Rule::apply) runs
/// the delegate's body; every later call, from any thread, gets the
/// memoized outcome or the memoized failure. Each call made from inside
/// another rule's body first records the dependency in the session graph,
/// so a circular reference is rejected before any lock is taken.
pub struct RuleProxy<A, B> {
    core: HookableRule<EvaluationContext<A, B>, B>,
    state: Arc<Mutex<ProxyState<B>>>,
    condition: Vertex,
    action: Vertex,
}

impl<A, B> RuleProxy<A, B>
where
    A: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(rule: SharedRule<EvaluationContext<A, B>, B>) -> Self {
        let state = Arc::new(Mutex::new(ProxyState::new()));
        let id: Arc<str> = Arc::from(rule.id());
        let core = HookableRule::from_shared(rule).with_hook(Memoizer {
            state: Arc::clone(&state),
        });
        Self {
            core,
            state,
            condition: Vertex::condition(Arc::clone(&id)),
            action: Vertex::action(id),
        }
    }
}

impl<A, B> RuleProxy<A, B> {
    #[must_use]
    pub fn condition_vertex(&self) -> &Vertex {
        &self.condition
    }

    #[must_use]
    pub fn action_vertex(&self) -> &Vertex {
        &self.action
    }

    /// The status as it stands, without forcing any evaluation.
    #[must_use]
    pub fn current_status(&self) -> RuleStatus {
        self.state.lock().status
    }

    /// The failure stored by a failed phase, if any.
    #[must_use]
    pub fn failure(&self) -> Option<EvaluationError> {
        self.state.lock().failure.clone()
    }

    /// The delegate rule the proxy stands for.
    #[must_use]
    pub fn delegate(&self) -> &SharedRule<EvaluationContext<A, B>, B> {
        self.core.delegate()
    }
}

impl<A, B: Clone> RuleProxy<A, B> {
    /// The memoized action result, without forcing any evaluation.
    #[must_use]
    pub fn memoized_result(&self) -> Option<B> {
        self.state.lock().result.clone()
    }
}

impl<A, B> Rule<EvaluationContext<A, B>, B> for RuleProxy<A, B>
where
    A: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn id(&self) -> &str {
        self.core.id()
    }

    fn priority(&self) -> i32 {
        self.core.priority()
    }

    fn test(&self, ctx: &EvaluationContext<A, B>) -> Result<bool, EvaluationError> {
        let session = ctx.session();
        if let Some(caller) = ctx.caller() {
            session.add_edge(caller, &self.condition)?;
        }
        let inner = ctx.enter(self.condition.clone());

        let _phase = session.phase_lock(&self.condition)?.lock();
        let status = self.current_status();
        match status {
            RuleStatus::Waiting => self.core.test(&inner),
            RuleStatus::TestFalse => Ok(false),
            held if held.condition_holds() => Ok(true),
            _ => Err(self.state.lock().replay(self.id(), Phase::Condition)),
        }
    }

    fn apply(&self, ctx: &EvaluationContext<A, B>) -> Result<B, EvaluationError> {
        let session = ctx.session();
        if let Some(caller) = ctx.caller() {
            session.add_edge(caller, &self.action)?;
        }
        let inner = ctx.enter(self.action.clone());

        let _phase = session.phase_lock(&self.action)?.lock();
        let status = self.current_status();
        match status {
            RuleStatus::TestTrue => self.core.apply(&inner),
            RuleStatus::Applied => {
                let state = self.state.lock();
                state
                    .result
                    .clone()
                    .ok_or_else(|| state.replay(self.id(), Phase::Action))
            }
            _ => Err(self.state.lock().replay(self.id(), Phase::Action)),
        }
    }
}

impl<A, B> fmt::Debug for RuleProxy<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleProxy")
            .field("id", &self.condition.rule_id())
            .field("status", &self.current_status())
            .finish_non_exhaustive()
    }
}
