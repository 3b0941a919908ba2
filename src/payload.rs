//! Wire shapes of the workflow payload returned by the analysis backend.
//!
//! Two incompatible shapes exist in the wild. [`WorkflowPayload::detect`] is
//! the single place that inspects raw JSON and decides which one was sent;
//! everything downstream works on the resolved enum.

use serde::Deserialize;
use serde_json::{Map, Value};

const OPTIMIZABLE_KEYS_GRAPH: [&str; 2] = ["optimizableSteps", "optimizable_steps"];
const OPTIMIZABLE_KEYS_STEPS: [&str; 2] = ["optimizable_steps", "optimizableSteps"];

/// A scalar the backend uses for ids and labels. Numbers are accepted and
/// rendered in their JSON decimal form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireScalar {
    Text(String),
    Number(serde_json::Number),
}

impl WireScalar {
    pub fn into_string(self) -> String {
        match self {
            WireScalar::Text(text) => text,
            WireScalar::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireNode {
    pub id: WireScalar,
    #[serde(default)]
    pub label: Option<WireScalar>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireEdge {
    #[serde(default)]
    pub id: Option<WireScalar>,
    pub source: WireScalar,
    pub target: WireScalar,
    #[serde(default)]
    pub label: Option<WireScalar>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireStep {
    pub id: WireScalar,
    #[serde(default)]
    pub label: Option<WireScalar>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireDependency {
    pub from: WireScalar,
    pub to: WireScalar,
    #[serde(default)]
    pub label: Option<WireScalar>,
}

/// One entry of an optimizable list: either a bare id or an id with a reason.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptimizableStep {
    Id(WireScalar),
    Annotated {
        id: WireScalar,
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Shape A: `{ nodes, edges, optimizableSteps }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphPayload {
    pub nodes: Vec<WireNode>,
    pub edges: Vec<WireEdge>,
    pub optimizable: Vec<OptimizableStep>,
}

/// Shape B: `{ steps, dependencies, optimizable_steps }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepsPayload {
    pub steps: Vec<WireStep>,
    pub dependencies: Vec<WireDependency>,
    pub optimizable: Vec<OptimizableStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowPayload {
    Graph(GraphPayload),
    Steps(StepsPayload),
}

impl WorkflowPayload {
    /// Resolves the wire shape of `value`.
    ///
    /// `nodes`/`edges` arrays select the graph shape and win over
    /// `steps`/`dependencies` when both are present. Returns `None` for
    /// anything else. Entries that fail to decode are skipped.
    pub fn detect(value: &Value) -> Option<Self> {
        let Some(object) = value.as_object() else {
            tracing::warn!("workflow payload is not a JSON object");
            return None;
        };

        if has_array(object, "nodes") || has_array(object, "edges") {
            return Some(Self::Graph(GraphPayload {
                nodes: decode_list(object, "nodes"),
                edges: decode_list(object, "edges"),
                optimizable: decode_optimizable(object, &OPTIMIZABLE_KEYS_GRAPH),
            }));
        }

        if has_array(object, "steps") || has_array(object, "dependencies") {
            return Some(Self::Steps(StepsPayload {
                steps: decode_list(object, "steps"),
                dependencies: decode_list(object, "dependencies"),
                optimizable: decode_optimizable(object, &OPTIMIZABLE_KEYS_STEPS),
            }));
        }

        tracing::warn!("workflow payload matches no known shape");
        None
    }

    pub fn optimizable(&self) -> &[OptimizableStep] {
        match self {
            WorkflowPayload::Graph(payload) => &payload.optimizable,
            WorkflowPayload::Steps(payload) => &payload.optimizable,
        }
    }
}

/// Picks the workflow out of an analysis response.
///
/// Accepts either a bare payload or an object carrying a `workflow` field.
/// A missing or `null` workflow means there is nothing to render.
pub fn extract_workflow(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Object(object) if object.contains_key("workflow") => match object.get("workflow")
        {
            Some(Value::Null) | None => None,
            Some(workflow) => Some(workflow),
        },
        other => Some(other),
    }
}

fn has_array(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).is_some_and(Value::is_array)
}

fn decode_list<T>(object: &Map<String, Value>, key: &str) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(items) = object.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match T::deserialize(item) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::warn!(list = key, index = idx, error = %err, "skipping malformed entry");
                None
            }
        })
        .collect()
}

fn decode_optimizable(object: &Map<String, Value>, keys: &[&str]) -> Vec<OptimizableStep> {
    keys.iter()
        .find(|key| has_array(object, key))
        .map(|key| decode_list(object, key))
        .unwrap_or_default()
}
