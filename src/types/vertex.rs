use std::fmt;
use std::sync::Arc;

/// The two units of lazy work a rule is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Condition,
    Action,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition => f.write_str("CONDITION"),
            Self::Action => f.write_str("ACTION"),
        }
    }
}

/// A `(rule id, phase)` pair identifying one node of a session's dependency graph.
///
/// Vertices are compared and hashed by identity only, so two vertices built
/// independently for the same rule and phase are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vertex {
    rule_id: Arc<str>,
    phase: Phase,
}

impl Vertex {
    pub fn new(rule_id: impl Into<Arc<str>>, phase: Phase) -> Self {
        Self {
            rule_id: rule_id.into(),
            phase,
        }
    }

    pub fn condition(rule_id: impl Into<Arc<str>>) -> Self {
        Self::new(rule_id, Phase::Condition)
    }

    pub fn action(rule_id: impl Into<Arc<str>>) -> Self {
        Self::new(rule_id, Phase::Action)
    }

    #[must_use]
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.rule_id, self.phase)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn vertex_identity() {
        let a = Vertex::condition("even");
        let b = Vertex::new(String::from("even"), Phase::Condition);
        assert_eq!(a, b);

        let set: HashSet<Vertex> = [a, b, Vertex::action("even")].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn vertex_display() {
        assert_eq!(Vertex::condition("even").to_string(), "even (CONDITION)");
        assert_eq!(Vertex::action("odd").to_string(), "odd (ACTION)");
    }
}
