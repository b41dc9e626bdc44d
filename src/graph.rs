//! Per-session dependency graph between rule phases.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::{CyclicDependencyError, Vertex};

/// A directed graph whose edges record that one rule phase asked for the
/// outcome of another: `from -> to` means `from` depends on `to`.
///
/// The graph grows incrementally and is acyclic at all times: an edge that
/// would close a loop is rejected and leaves the graph untouched.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<Vertex, ()>,
    index: HashMap<Vertex, NodeIndex>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` depends on `to`.
    ///
    /// Since the graph is acyclic before the insertion, the new edge closes a
    /// cycle exactly when `to` already reaches `from`, so that single
    /// reachability query is all that is checked.
    ///
    /// # Errors
    ///
    /// Returns [`CyclicDependencyError`] carrying the cycle the edge would
    /// have closed. Nothing is inserted in that case, not even the vertices.
    pub fn add_edge(&mut self, from: &Vertex, to: &Vertex) -> Result<(), CyclicDependencyError> {
        if let Some(path_back) = self.path(to, from) {
            return Err(CyclicDependencyError::new(
                from.clone(),
                to.clone(),
                path_back,
            ));
        }
        let from_idx = self.insert_vertex(from);
        let to_idx = self.insert_vertex(to);
        self.graph.update_edge(from_idx, to_idx, ());
        Ok(())
    }

    /// Shortest committed path from `from` to `to`, both ends included.
    ///
    /// A vertex always reaches itself, even when it is not in the graph yet.
    #[must_use]
    pub fn path(&self, from: &Vertex, to: &Vertex) -> Option<Vec<Vertex>> {
        if from == to {
            return Some(vec![from.clone()]);
        }
        let start = *self.index.get(from)?;
        let goal = *self.index.get(to)?;

        let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut seen: HashSet<NodeIndex> = HashSet::from([start]);
        let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            if node == goal {
                return Some(self.unwind(&parents, goal));
            }
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if seen.insert(next) {
                    parents.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn reaches(&self, from: &Vertex, to: &Vertex) -> bool {
        self.path(from, to).is_some()
    }

    #[must_use]
    pub fn contains_vertex(&self, vertex: &Vertex) -> bool {
        self.index.contains_key(vertex)
    }

    #[must_use]
    pub fn contains_edge(&self, from: &Vertex, to: &Vertex) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// Vertices `vertex` depends on.
    #[must_use]
    pub fn dependencies_of(&self, vertex: &Vertex) -> Vec<&Vertex> {
        self.neighbors(vertex, Direction::Outgoing)
    }

    /// Vertices depending on `vertex`.
    #[must_use]
    pub fn dependents_of(&self, vertex: &Vertex) -> Vec<&Vertex> {
        self.neighbors(vertex, Direction::Incoming)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All vertices, in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// All edges as `(from, to)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&Vertex, &Vertex)> {
        self.graph.edge_indices().filter_map(|edge| {
            self.graph
                .edge_endpoints(edge)
                .map(|(a, b)| (&self.graph[a], &self.graph[b]))
        })
    }

    fn insert_vertex(&mut self, vertex: &Vertex) -> NodeIndex {
        if let Some(&idx) = self.index.get(vertex) {
            return idx;
        }
        let idx = self.graph.add_node(vertex.clone());
        self.index.insert(vertex.clone(), idx);
        idx
    }

    fn neighbors(&self, vertex: &Vertex, direction: Direction) -> Vec<&Vertex> {
        let Some(&idx) = self.index.get(vertex) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| &self.graph[n])
            .collect()
    }

    fn unwind(&self, parents: &HashMap<NodeIndex, NodeIndex>, goal: NodeIndex) -> Vec<Vertex> {
        let mut path = vec![self.graph[goal].clone()];
        let mut current = goal;
        while let Some(&parent) = parents.get(&current) {
            path.push(self.graph[parent].clone());
            current = parent;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(id: &str) -> Vertex {
        Vertex::condition(id)
    }

    fn action(id: &str) -> Vertex {
        Vertex::action(id)
    }

    #[test]
    fn linear_chain_is_accepted() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&action("b"), &cond("a")).unwrap();
        graph.add_edge(&action("b"), &action("a")).unwrap();
        graph.add_edge(&action("c"), &action("b")).unwrap();

        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.reaches(&action("c"), &action("a")));
        assert!(!graph.reaches(&action("a"), &action("c")));

        let mut vertices: Vec<String> = graph.vertices().map(ToString::to_string).collect();
        vertices.sort();
        assert_eq!(
            vertices,
            vec!["a (ACTION)", "a (CONDITION)", "b (ACTION)", "c (ACTION)"]
        );
    }

    #[test]
    fn diamond_is_accepted() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&action("d"), &action("b")).unwrap();
        graph.add_edge(&action("d"), &action("c")).unwrap();
        graph.add_edge(&action("b"), &action("a")).unwrap();
        graph.add_edge(&action("c"), &action("a")).unwrap();

        let mut deps: Vec<String> = graph
            .dependencies_of(&action("d"))
            .into_iter()
            .map(ToString::to_string)
            .collect();
        deps.sort();
        assert_eq!(deps, vec!["b (ACTION)", "c (ACTION)"]);
        assert_eq!(graph.dependents_of(&action("a")).len(), 2);
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&action("x"), &action("y")).unwrap();

        let err = graph.add_edge(&action("y"), &action("x")).unwrap_err();
        assert_eq!(
            err.cycle_path,
            vec![action("y"), action("x"), action("y")]
        );
        assert_eq!(err.edge, (action("y"), action("x")));
        assert!(!graph.contains_edge(&action("y"), &action("x")));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn rejection_leaves_graph_untouched() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&action("a"), &action("b")).unwrap();
        graph.add_edge(&action("b"), &action("c")).unwrap();
        let before: Vec<(String, String)> = graph
            .edges()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();

        assert!(graph.add_edge(&action("c"), &action("a")).is_err());

        let after: Vec<(String, String)> = graph
            .edges()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(graph.vertex_count(), 3);
    }

    #[test]
    fn self_reference_is_rejected_without_inserting_vertex() {
        let mut graph = DependencyGraph::new();
        let err = graph.add_edge(&cond("a"), &cond("a")).unwrap_err();
        assert_eq!(err.cycle_path, vec![cond("a"), cond("a")]);
        assert!(graph.is_empty());
    }

    #[test]
    fn three_node_cycle_reports_full_path() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&action("a"), &action("b")).unwrap();
        graph.add_edge(&action("b"), &action("c")).unwrap();

        let err = graph.add_edge(&action("c"), &action("a")).unwrap_err();
        assert_eq!(
            err.cycle_path,
            vec![action("c"), action("a"), action("b"), action("c")]
        );
        assert_eq!(err.cycle_path.first(), err.cycle_path.last());
    }

    #[test]
    fn phases_are_distinct_vertices() {
        // a's action needs b's condition, b's action needs a's condition: no cycle.
        let mut graph = DependencyGraph::new();
        graph.add_edge(&action("a"), &cond("b")).unwrap();
        graph.add_edge(&action("b"), &cond("a")).unwrap();
        assert_eq!(graph.vertex_count(), 4);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&action("a"), &action("b")).unwrap();
        graph.add_edge(&action("a"), &action("b")).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn path_is_shortest() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&action("a"), &action("b")).unwrap();
        graph.add_edge(&action("b"), &action("c")).unwrap();
        graph.add_edge(&action("a"), &action("c")).unwrap();
        assert_eq!(
            graph.path(&action("a"), &action("c")),
            Some(vec![action("a"), action("c")])
        );
        assert_eq!(graph.path(&action("c"), &action("a")), None);
    }

    #[test]
    fn unknown_vertices_have_no_neighbors() {
        let graph = DependencyGraph::new();
        assert!(graph.dependencies_of(&action("nope")).is_empty());
        assert!(!graph.contains_vertex(&action("nope")));
        assert!(!graph.contains_edge(&action("a"), &action("b")));
    }
}
