use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::status::RuleStatus;
use super::vertex::{Phase, Vertex};

/// Raised when a new cross-rule reference would close a loop in the
/// session's dependency graph.
///
/// `cycle_path` starts with the source of the rejected edge, walks the
/// already committed path back from the edge's target, and ends where it
/// started: `from -> to -> ... -> from`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cyclic dependency detected: {}", render(.cycle_path))]
pub struct CyclicDependencyError {
    pub cycle_path: Vec<Vertex>,
    pub edge: (Vertex, Vertex),
}

impl CyclicDependencyError {
    /// Build the error from the rejected edge and the committed path
    /// `to ⇝ from` that it would have closed.
    pub(crate) fn new(from: Vertex, to: Vertex, path_back: Vec<Vertex>) -> Self {
        let mut cycle_path = Vec::with_capacity(path_back.len() + 1);
        cycle_path.push(from.clone());
        cycle_path.extend(path_back);
        if cycle_path.last() != Some(&from) {
            cycle_path.push(from.clone());
        }
        Self {
            cycle_path,
            edge: (from, to),
        }
    }

    /// Rule ids taking part in the cycle, in path order, without the closing repeat.
    #[must_use]
    pub fn rule_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        let open = &self.cycle_path[..self.cycle_path.len().saturating_sub(1)];
        for vertex in open {
            if !ids.contains(&vertex.rule_id()) {
                ids.push(vertex.rule_id());
            }
        }
        ids
    }
}

fn render(path: &[Vertex]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Everything that can go wrong while evaluating rules.
///
/// The type is cheap to clone: a failure raised by a rule body is stored once
/// by the rule's proxy and handed back by value to every later caller.
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    #[error("rule '{id}' not found")]
    UnknownRule { id: String },

    #[error("duplicate rule id '{id}'")]
    DuplicateRule { id: String },

    #[error(transparent)]
    CyclicDependency(#[from] CyclicDependencyError),

    #[error("an error occurred during the evaluation of the {phase} of rule '{rule}'")]
    RuleEvaluation {
        rule: String,
        phase: Phase,
        /// `Debug` rendering of the facts, when the caller could provide one.
        facts: Option<String>,
        #[source]
        source: Box<EvaluationError>,
    },

    #[error("unexpected status '{status}' for the {phase} of rule '{rule}'")]
    InconsistentState {
        rule: String,
        phase: Phase,
        status: RuleStatus,
    },

    #[error("rule '{rule}' has no action")]
    MissingAction { rule: String },

    #[error("{0}")]
    Custom(Arc<dyn StdError + Send + Sync>),
}

impl EvaluationError {
    /// Wrap an arbitrary failure raised from inside a rule body.
    pub fn custom(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Custom(Arc::from(error.into()))
    }

    pub(crate) fn evaluation(rule: &str, phase: Phase, source: EvaluationError) -> Self {
        Self::RuleEvaluation {
            rule: rule.to_owned(),
            phase,
            facts: None,
            source: Box::new(source),
        }
    }

    /// Record the facts a wrapped rule failure was raised against. Other
    /// variants are returned unchanged.
    #[must_use]
    pub fn with_facts(self, facts: &impl fmt::Debug) -> Self {
        match self {
            Self::RuleEvaluation {
                rule,
                phase,
                source,
                ..
            } => Self::RuleEvaluation {
                rule,
                phase,
                facts: Some(format!("{facts:?}")),
                source,
            },
            other => other,
        }
    }

    /// The facts recorded by [`with_facts`](Self::with_facts), if any.
    #[must_use]
    pub fn facts(&self) -> Option<&str> {
        match self {
            Self::RuleEvaluation { facts, .. } => facts.as_deref(),
            _ => None,
        }
    }

    /// The innermost error, with every [`RuleEvaluation`](Self::RuleEvaluation)
    /// wrapper peeled off.
    #[must_use]
    pub fn root_cause(&self) -> &EvaluationError {
        let mut current = self;
        while let Self::RuleEvaluation { source, .. } = current {
            current = source;
        }
        current
    }

    /// The cycle behind this failure, if it was caused by one.
    #[must_use]
    pub fn cyclic_dependency(&self) -> Option<&CyclicDependencyError> {
        match self.root_cause() {
            Self::CyclicDependency(cycle) => Some(cycle),
            _ => None,
        }
    }

    /// Id of the rule whose evaluation failed, when the failure was wrapped
    /// by the engine.
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::RuleEvaluation { rule, .. } => Some(rule),
            _ => None,
        }
    }
}
