//! Maps either payload shape onto a [`CanonicalGraph`].
//!
//! Malformed entries and edges with an unknown endpoint are dropped with a
//! debug log. Optimizable ids that match no step are ignored.

use std::collections::HashMap;

use serde_json::Value;

use crate::ir::{CanonicalEdge, CanonicalGraph, CanonicalNode, DEFAULT_NODE_KIND};
use crate::payload::{OptimizableStep, WireScalar, WorkflowPayload};

pub const GENERIC_OPTIMIZATION_REASON: &str = "This step can be optimized";

/// Maps a resolved payload onto the canonical graph.
///
/// Pure: the same payload always yields an equal graph. Edges that point at
/// unknown nodes are dropped instead of failing.
pub fn normalize(payload: &WorkflowPayload) -> CanonicalGraph {
    let reasons = optimizable_reasons(payload.optimizable());

    let (nodes, edges): (Vec<CanonicalNode>, Vec<CanonicalEdge>) = match payload {
        WorkflowPayload::Graph(graph) => (
            graph
                .nodes
                .iter()
                .map(|node| build_node(&node.id, node.label.as_ref(), node.kind.as_deref(), &reasons))
                .collect(),
            graph
                .edges
                .iter()
                .map(|edge| build_edge(&edge.source, &edge.target, edge.label.as_ref()))
                .collect(),
        ),
        WorkflowPayload::Steps(steps) => (
            steps
                .steps
                .iter()
                .map(|step| build_node(&step.id, step.label.as_ref(), step.kind.as_deref(), &reasons))
                .collect(),
            steps
                .dependencies
                .iter()
                .map(|dep| build_edge(&dep.from, &dep.to, dep.label.as_ref()))
                .collect(),
        ),
    };

    let graph = CanonicalGraph::from_parts(nodes, edges);
    tracing::debug!(
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        optimizable = graph.optimizable_count(),
        "normalized workflow"
    );
    graph
}

/// Detects the wire shape of `value` and normalizes it. Unrecognized
/// payloads produce an empty graph.
pub fn normalize_value(value: &Value) -> CanonicalGraph {
    WorkflowPayload::detect(value)
        .map(|payload| normalize(&payload))
        .unwrap_or_default()
}

fn optimizable_reasons(entries: &[OptimizableStep]) -> HashMap<String, String> {
    let mut reasons = HashMap::new();
    for entry in entries {
        let (id, reason) = match entry {
            OptimizableStep::Id(id) => (scalar_text(id), None),
            OptimizableStep::Annotated { id, reason } => (scalar_text(id), reason.as_deref()),
        };
        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(GENERIC_OPTIMIZATION_REASON);
        reasons.entry(id).or_insert_with(|| reason.to_string());
    }
    reasons
}

fn build_node(
    id: &WireScalar,
    label: Option<&WireScalar>,
    kind: Option<&str>,
    reasons: &HashMap<String, String>,
) -> CanonicalNode {
    let key = scalar_text(id);
    let text = label.map(scalar_text).unwrap_or_else(|| key.clone());
    let reason = reasons.get(&key).cloned();
    let kind = kind.filter(|kind| !kind.is_empty()).unwrap_or(DEFAULT_NODE_KIND);
    let node = CanonicalNode::new(key, text).with_kind(kind);
    match reason {
        Some(reason) => node.optimizable(reason),
        None => node,
    }
}

fn build_edge(from: &WireScalar, to: &WireScalar, label: Option<&WireScalar>) -> CanonicalEdge {
    CanonicalEdge::new(scalar_text(from), scalar_text(to))
        .with_text(label.map(scalar_text).unwrap_or_default())
}

fn scalar_text(value: &WireScalar) -> String {
    value.clone().into_string()
}
