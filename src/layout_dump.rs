use crate::ir::{CanonicalGraph, CanonicalNode};
use crate::layout::Layout;
use crate::style::edge_is_highlighted;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub direction: String,
    pub width: f32,
    pub height: f32,
    pub ranks: usize,
    pub optimizable: usize,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub key: String,
    pub kind: String,
    pub text: String,
    pub optimizable: bool,
    pub reason: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rank: usize,
    pub order: usize,
    pub label_lines: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub highlighted: bool,
    pub reversed: bool,
    pub self_loop: bool,
    pub points: Vec<[f32; 2]>,
    pub label_anchor: Option<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout, graph: &CanonicalGraph) -> Self {
        let by_key: HashMap<&str, &CanonicalNode> = graph
            .nodes()
            .iter()
            .map(|node| (node.key.as_str(), node))
            .collect();

        let nodes = layout
            .nodes
            .iter()
            .filter_map(|node| {
                let source = by_key.get(node.key.as_str())?;
                Some(NodeDump {
                    key: node.key.clone(),
                    kind: source.kind.clone(),
                    text: source.text.clone(),
                    optimizable: source.is_optimizable,
                    reason: source
                        .is_optimizable
                        .then(|| source.optimization_reason.clone()),
                    x: node.x,
                    y: node.y,
                    width: node.width,
                    height: node.height,
                    rank: node.rank,
                    order: node.order,
                    label_lines: node.label.lines.clone(),
                })
            })
            .collect();

        let edges = layout
            .edges
            .iter()
            .zip(graph.edges())
            .map(|(edge, source)| EdgeDump {
                from: edge.from.clone(),
                to: edge.to.clone(),
                label: (!source.text.is_empty()).then(|| source.text.clone()),
                highlighted: edge_is_highlighted(
                    by_key.get(source.from.as_str()).copied(),
                    by_key.get(source.to.as_str()).copied(),
                ),
                reversed: edge.reversed,
                self_loop: edge.self_loop,
                points: edge.points.iter().map(|(x, y)| [*x, *y]).collect(),
                label_anchor: edge.label_anchor.map(|(x, y)| [x, y]),
            })
            .collect();

        LayoutDump {
            direction: format!("{:?}", layout.direction),
            width: layout.width,
            height: layout.height,
            ranks: layout.rank_count(),
            optimizable: graph.optimizable_count(),
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &Layout, graph: &CanonicalGraph) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, graph);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::CanonicalEdge;
    use crate::layout::compute_layout;
    use crate::theme::Theme;

    #[test]
    fn dump_carries_flags_and_geometry() {
        let graph = CanonicalGraph::from_parts(
            vec![
                CanonicalNode::new("s1", "Load"),
                CanonicalNode::new("s2", "Transform").optimizable("vectorize loop"),
            ],
            vec![CanonicalEdge::new("s1", "s2")],
        );
        let config = LayoutConfig {
            fast_text_metrics: true,
            ..LayoutConfig::default()
        };
        let layout = compute_layout(&graph, &Theme::modern(), &config);
        let dump = LayoutDump::from_layout(&layout, &graph);

        assert_eq!(dump.direction, "TopDown");
        assert_eq!(dump.ranks, 2);
        assert_eq!(dump.optimizable, 1);
        assert_eq!(dump.nodes.len(), 2);
        assert_eq!(dump.nodes[1].reason.as_deref(), Some("vectorize loop"));
        assert_eq!(dump.nodes[0].reason, None);
        assert!(dump.edges[0].highlighted);
        assert!(dump.edges[0].points.len() >= 2);

        let json = serde_json::to_value(&dump).expect("serializable");
        assert_eq!(json["edges"][0]["from"], "s1");
    }
}
