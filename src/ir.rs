use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_NODE_KIND: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    TopDown,
    LeftRight,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" | "TB" => Some(Self::TopDown),
            "LR" => Some(Self::LeftRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalNode {
    pub key: String,
    pub text: String,
    pub kind: String,
    pub is_optimizable: bool,
    pub optimization_reason: String,
}

impl CanonicalNode {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            kind: DEFAULT_NODE_KIND.to_string(),
            is_optimizable: false,
            optimization_reason: String::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn optimizable(mut self, reason: impl Into<String>) -> Self {
        self.is_optimizable = true;
        self.optimization_reason = reason.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalEdge {
    pub from: String,
    pub to: String,
    pub text: String,
}

impl CanonicalEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            text: String::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Shape-independent graph every downstream stage works on.
///
/// Built once per payload by the normalizer and never mutated afterwards.
/// Node keys are unique and every edge endpoint names an existing node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalGraph {
    nodes: Vec<CanonicalNode>,
    edges: Vec<CanonicalEdge>,
}

impl CanonicalGraph {
    /// Builds a graph from raw parts, enforcing both invariants: later
    /// duplicate keys and edges with an unknown endpoint are dropped.
    pub fn from_parts(nodes: Vec<CanonicalNode>, edges: Vec<CanonicalEdge>) -> Self {
        let mut kept: Vec<CanonicalNode> = Vec::with_capacity(nodes.len());
        let mut seen: HashMap<String, usize> = HashMap::new();
        for node in nodes {
            if seen.contains_key(&node.key) {
                tracing::warn!(key = %node.key, "dropping node with duplicate key");
                continue;
            }
            seen.insert(node.key.clone(), kept.len());
            kept.push(node);
        }

        let edges = edges
            .into_iter()
            .filter(|edge| {
                let known = seen.contains_key(&edge.from) && seen.contains_key(&edge.to);
                if !known {
                    tracing::debug!(
                        from = %edge.from,
                        to = %edge.to,
                        "dropping edge that references an unknown node"
                    );
                }
                known
            })
            .collect();

        Self { nodes: kept, edges }
    }

    pub fn nodes(&self) -> &[CanonicalNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CanonicalEdge] {
        &self.edges
    }

    pub fn node(&self, key: &str) -> Option<&CanonicalNode> {
        self.nodes.iter().find(|node| node.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declaration index of every node, used as the tie breaker during layout.
    pub fn node_order(&self) -> HashMap<String, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.key.clone(), idx))
            .collect()
    }

    pub fn optimizable_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_optimizable).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_drops_dangling_edges() {
        let graph = CanonicalGraph::from_parts(
            vec![CanonicalNode::new("a", "A"), CanonicalNode::new("b", "B")],
            vec![
                CanonicalEdge::new("a", "b"),
                CanonicalEdge::new("a", "ghost"),
                CanonicalEdge::new("ghost", "b"),
            ],
        );
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0], CanonicalEdge::new("a", "b"));
    }

    #[test]
    fn from_parts_keeps_first_duplicate_key() {
        let graph = CanonicalGraph::from_parts(
            vec![
                CanonicalNode::new("a", "First"),
                CanonicalNode::new("b", "B"),
                CanonicalNode::new("a", "Second"),
            ],
            Vec::new(),
        );
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.node("a").map(|n| n.text.as_str()), Some("First"));
        assert_eq!(graph.node_order().get("b"), Some(&1));
    }

    #[test]
    fn node_defaults_to_default_kind() {
        let node = CanonicalNode::new("x", "X");
        assert_eq!(node.kind, DEFAULT_NODE_KIND);
        assert!(!node.is_optimizable);
        assert!(node.optimization_reason.is_empty());
    }
}
