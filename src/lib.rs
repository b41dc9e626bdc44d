mod evaluate;
mod graph;
mod hook;
mod proxy;
mod session;
mod types;

pub use evaluate::{Direct, EvaluationStrategy, GraphStrategy, RuleOrder, RulesEngine, Traversal};
pub use graph::DependencyGraph;
pub use hook::{HookableRule, RuleHook, RuleLogger};
pub use proxy::RuleProxy;
pub use session::{EvaluationContext, EvaluationSession, RuleContext};
pub use types::{
    compare_rules, CompositeRule, CyclicDependencyError, EvaluationError, Phase, Rule, RuleStatus,
    Rules, RulesGraph, SharedRule, Vertex,
};
