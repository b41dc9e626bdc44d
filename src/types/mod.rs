mod collection;
mod composite;
mod error;
mod rule;
mod status;
mod vertex;

pub use collection::{Rules, RulesGraph};
pub use composite::CompositeRule;
pub use error::{CyclicDependencyError, EvaluationError};
pub use rule::{compare_rules, Rule, SharedRule};
pub use status::RuleStatus;
pub use vertex::{Phase, Vertex};
