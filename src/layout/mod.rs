//! Layered layout of a canonical graph.
//!
//! The pipeline follows the usual Sugiyama stages: cycle breaking and
//! longest-path ranking, virtual nodes for long edges, median crossing
//! reduction, coordinate assignment along the cross axis, then edge routing
//! through the virtual node positions.

mod ranking;
mod text;
pub(crate) mod types;
pub use types::*;
use ranking::*;
use text::*;

use crate::config::LayoutConfig;
use crate::ir::{CanonicalGraph, Direction};
use crate::theme::Theme;
use std::collections::{BTreeMap, HashMap};

// Virtual nodes only need room for a line, not a box.
const VIRTUAL_SPACING_SCALE: f32 = 0.5;
const PORT_STEP_MAX: f32 = 16.0;
const LABEL_PAD_X: f32 = 6.0;
const LABEL_PAD_Y: f32 = 4.0;
const LABEL_GAP_PAD: f32 = 16.0;

#[derive(Debug, Clone, Copy)]
struct Slot {
    cross: f32,
    cross_size: f32,
    main_size: f32,
    is_virtual: bool,
}

pub fn compute_layout(graph: &CanonicalGraph, theme: &Theme, config: &LayoutConfig) -> Layout {
    if graph.is_empty() {
        return Layout::empty(config.direction);
    }
    let horizontal = is_horizontal(config.direction);

    let node_ids: Vec<String> = graph.nodes().iter().map(|node| node.key.clone()).collect();
    let node_order = graph.node_order();

    let mut labels: HashMap<String, TextBlock> = HashMap::new();
    let mut slots: HashMap<String, Slot> = HashMap::new();
    for node in graph.nodes() {
        let label = measure_label(&node.text, theme, config);
        let (width, height) = node_size(&label, config);
        let (cross_size, main_size) = if horizontal { (height, width) } else { (width, height) };
        slots.insert(
            node.key.clone(),
            Slot {
                cross: 0.0,
                cross_size,
                main_size,
                is_virtual: false,
            },
        );
        labels.insert(node.key.clone(), label);
    }

    let edge_labels: Vec<Option<TextBlock>> = graph
        .edges()
        .iter()
        .map(|edge| {
            if edge.text.trim().is_empty() {
                None
            } else {
                Some(measure_edge_label(&edge.text, theme, config))
            }
        })
        .collect();

    let ranking = compute_ranks(&node_ids, graph.edges(), &node_order);
    let mut layering = build_layers(&node_ids, &ranking, &node_order);
    order_rank_nodes(
        &mut layering.layers,
        &layering.segments,
        &layering.node_order,
        config.order_passes,
    );
    for id in &layering.virtual_nodes {
        slots.insert(
            id.clone(),
            Slot {
                cross: 0.0,
                cross_size: 0.0,
                main_size: 0.0,
                is_virtual: true,
            },
        );
    }

    assign_cross_positions(&layering, &mut slots, config);
    let main_centers = assign_main_positions(&layering, &ranking, &slots, &edge_labels, config);

    let mut centers: HashMap<String, (f32, f32)> = HashMap::new();
    for (rank, bucket) in layering.layers.iter().enumerate() {
        for id in bucket {
            let Some(slot) = slots.get(id) else {
                continue;
            };
            let main = main_centers[rank];
            let center = if horizontal { (main, slot.cross) } else { (slot.cross, main) };
            centers.insert(id.clone(), center);
        }
    }

    let mut nodes: Vec<NodeLayout> = Vec::with_capacity(node_ids.len());
    for (rank, bucket) in layering.layers.iter().enumerate() {
        for (order, id) in bucket.iter().enumerate() {
            if layering.virtual_nodes.contains(id) {
                continue;
            }
            let (Some(slot), Some(label), Some(&(cx, cy))) =
                (slots.get(id), labels.remove(id), centers.get(id))
            else {
                continue;
            };
            let (width, height) = if horizontal {
                (slot.main_size, slot.cross_size)
            } else {
                (slot.cross_size, slot.main_size)
            };
            nodes.push(NodeLayout {
                key: id.clone(),
                x: cx - width / 2.0,
                y: cy - height / 2.0,
                width,
                height,
                rank,
                order,
                label,
            });
        }
    }
    // Keep declaration order so identical input yields identical output.
    nodes.sort_by_key(|node| node_order.get(&node.key).copied().unwrap_or(usize::MAX));

    let mut edges = route_edges(graph, &ranking, &layering, &nodes, &centers, config);
    for (edge, label) in edges.iter_mut().zip(edge_labels) {
        if let Some(label) = label {
            edge.label_anchor = Some(polyline_midpoint(&edge.points));
            edge.label = Some(label);
        }
    }

    let mut layout = Layout {
        direction: config.direction,
        nodes,
        edges,
        width: 0.0,
        height: 0.0,
    };
    normalize_layout(&mut layout, config.margin);
    tracing::debug!(
        nodes = layout.nodes.len(),
        edges = layout.edges.len(),
        ranks = layout.rank_count(),
        width = layout.width,
        height = layout.height,
        "computed layered layout"
    );
    layout
}

fn is_horizontal(direction: Direction) -> bool {
    matches!(direction, Direction::LeftRight)
}

fn node_size(label: &TextBlock, config: &LayoutConfig) -> (f32, f32) {
    let width = (label.width + config.node_padding_x * 2.0).max(config.min_node_width);
    let height = (label.height + config.node_padding_y * 2.0).max(config.min_node_height);
    (width, height)
}

fn separation(a: &Slot, b: &Slot, config: &LayoutConfig) -> f32 {
    let spacing = if a.is_virtual || b.is_virtual {
        config.node_spacing * VIRTUAL_SPACING_SCALE
    } else {
        config.node_spacing
    };
    (a.cross_size + b.cross_size) / 2.0 + spacing
}

/// Places every layer along the cross axis. Layers start packed and centered
/// on a shared axis, then alternate sweeps pull each node toward the median of
/// its neighbours in the previous layer while keeping the layer order and
/// the minimum separation.
fn assign_cross_positions(layering: &Layering, slots: &mut HashMap<String, Slot>, config: &LayoutConfig) {
    for bucket in &layering.layers {
        let mut cursor = 0.0f32;
        let mut prev: Option<Slot> = None;
        for id in bucket {
            let Some(slot) = slots.get_mut(id) else {
                continue;
            };
            if let Some(prev) = prev {
                cursor += separation(&prev, slot, config);
            }
            slot.cross = cursor;
            prev = Some(*slot);
        }
        let shift = -cursor / 2.0;
        for id in bucket {
            if let Some(slot) = slots.get_mut(id) {
                slot.cross += shift;
            }
        }
    }

    let mut upper: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut lower: HashMap<&str, Vec<&str>> = HashMap::new();
    for segment in &layering.segments {
        upper
            .entry(segment.to.as_str())
            .or_default()
            .push(segment.from.as_str());
        lower
            .entry(segment.from.as_str())
            .or_default()
            .push(segment.to.as_str());
    }

    let layer_count = layering.layers.len();
    for pass in 0..config.position_passes {
        let downward = pass % 2 == 0;
        let neighbors = if downward { &upper } else { &lower };
        let ranks: Vec<usize> = if downward {
            (1..layer_count).collect()
        } else {
            (0..layer_count.saturating_sub(1)).rev().collect()
        };
        for rank in ranks {
            let bucket = &layering.layers[rank];
            let desired: Vec<f32> = bucket
                .iter()
                .map(|id| {
                    let current = slots.get(id).map(|slot| slot.cross).unwrap_or(0.0);
                    let mut values: Vec<f32> = neighbors
                        .get(id.as_str())
                        .into_iter()
                        .flatten()
                        .filter_map(|other| slots.get(*other).map(|slot| slot.cross))
                        .collect();
                    median(&mut values).unwrap_or(current)
                })
                .collect();
            place_layer(bucket, &desired, slots, config);
        }
    }
}

/// Moves a layer as close to `desired` as the separation constraints allow:
/// a left-to-right sweep resolves overlaps, then the whole layer is shifted
/// by the mean residual so it is not biased to one side.
fn place_layer(bucket: &[String], desired: &[f32], slots: &mut HashMap<String, Slot>, config: &LayoutConfig) {
    let mut placed: Vec<f32> = Vec::with_capacity(bucket.len());
    let mut prev: Option<Slot> = None;
    for (id, target) in bucket.iter().zip(desired) {
        let Some(slot) = slots.get(id).copied() else {
            placed.push(*target);
            continue;
        };
        let position = match (prev, placed.last()) {
            (Some(prev), Some(last)) => (*target).max(last + separation(&prev, &slot, config)),
            _ => *target,
        };
        placed.push(position);
        prev = Some(slot);
    }
    if placed.is_empty() {
        return;
    }
    let residual: f32 = desired
        .iter()
        .zip(&placed)
        .map(|(want, got)| want - got)
        .sum::<f32>()
        / placed.len() as f32;
    for (id, position) in bucket.iter().zip(placed) {
        if let Some(slot) = slots.get_mut(id) {
            slot.cross = position + residual;
        }
    }
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    })
}

/// Center of every layer along the main axis. A gap that hosts an edge label
/// grows so the label fits between the two layers.
fn assign_main_positions(
    layering: &Layering,
    ranking: &Ranking,
    slots: &HashMap<String, Slot>,
    edge_labels: &[Option<TextBlock>],
    config: &LayoutConfig,
) -> Vec<f32> {
    let horizontal = is_horizontal(config.direction);
    let layer_count = layering.layers.len();

    let thickness: Vec<f32> = layering
        .layers
        .iter()
        .map(|bucket| {
            bucket
                .iter()
                .filter_map(|id| slots.get(id))
                .map(|slot| slot.main_size)
                .fold(0.0, f32::max)
        })
        .collect();

    let mut gaps = vec![config.rank_spacing; layer_count];
    for (oriented, label) in ranking.oriented.iter().zip(edge_labels) {
        let (Some(edge), Some(label)) = (oriented, label) else {
            continue;
        };
        let lo = ranking.ranks.get(&edge.upper).copied().unwrap_or(0);
        let hi = ranking.ranks.get(&edge.lower).copied().unwrap_or(0);
        if hi <= lo {
            continue;
        }
        let mid_gap = lo + (hi - lo - 1) / 2;
        let label_extent = if horizontal {
            label.width + LABEL_PAD_X * 2.0
        } else {
            label.height + LABEL_PAD_Y * 2.0
        };
        let needed = label_extent + LABEL_GAP_PAD;
        gaps[mid_gap] = gaps[mid_gap].max(needed);
    }

    let mut centers = Vec::with_capacity(layer_count);
    let mut cursor = 0.0f32;
    for rank in 0..layer_count {
        centers.push(cursor + thickness[rank] / 2.0);
        cursor += thickness[rank] + gaps[rank];
    }
    centers
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Side {
    Leading,
    Trailing,
}

/// Routes every canonical edge. Chains run from the trailing border of the
/// upper node through the virtual node centers to the leading border of the
/// lower node; reversed edges are flipped back to their declared direction.
fn route_edges(
    graph: &CanonicalGraph,
    ranking: &Ranking,
    layering: &Layering,
    nodes: &[NodeLayout],
    centers: &HashMap<String, (f32, f32)>,
    config: &LayoutConfig,
) -> Vec<EdgeLayout> {
    let horizontal = is_horizontal(config.direction);
    let by_key: HashMap<&str, &NodeLayout> = nodes.iter().map(|node| (node.key.as_str(), node)).collect();
    let cross_of = |id: &str| -> f32 {
        centers
            .get(id)
            .map(|(x, y)| if horizontal { *y } else { *x })
            .unwrap_or(0.0)
    };

    // Spread attachment points of edges sharing a node side, ordered by the
    // position of the node at the other end.
    let mut ports: BTreeMap<(String, Side), Vec<(f32, usize)>> = BTreeMap::new();
    for (edge_idx, chain) in layering.chains.iter().enumerate() {
        let Some(chain) = chain else {
            continue;
        };
        if chain.len() < 2 {
            continue;
        }
        let first = &chain[0];
        let last = &chain[chain.len() - 1];
        ports
            .entry((first.clone(), Side::Trailing))
            .or_default()
            .push((cross_of(&chain[1]), edge_idx));
        ports
            .entry((last.clone(), Side::Leading))
            .or_default()
            .push((cross_of(&chain[chain.len() - 2]), edge_idx));
    }
    let mut offsets: HashMap<(usize, Side), f32> = HashMap::new();
    for ((key, side), mut entries) in ports {
        entries.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        let Some(node) = by_key.get(key.as_str()) else {
            continue;
        };
        let span = if horizontal { node.height } else { node.width };
        let count = entries.len();
        let step = (span / (count as f32 + 1.0)).min(PORT_STEP_MAX);
        for (i, (_, edge_idx)) in entries.into_iter().enumerate() {
            let offset = (i as f32 - (count as f32 - 1.0) / 2.0) * step;
            offsets.insert((edge_idx, side), offset);
        }
    }

    let mut edges = Vec::with_capacity(graph.edges().len());
    for (edge_idx, edge) in graph.edges().iter().enumerate() {
        let reversed = ranking.oriented[edge_idx]
            .as_ref()
            .is_some_and(|oriented| oriented.reversed);
        let mut points = Vec::new();
        if edge.is_self_loop() {
            if let Some(node) = by_key.get(edge.from.as_str()) {
                points = self_loop_points(node, horizontal, config.self_loop_size);
            }
        } else if let Some(chain) = &layering.chains[edge_idx] {
            let upper = by_key.get(chain[0].as_str());
            let lower = by_key.get(chain[chain.len() - 1].as_str());
            if let (Some(upper), Some(lower)) = (upper, lower) {
                let start_offset = offsets.get(&(edge_idx, Side::Trailing)).copied().unwrap_or(0.0);
                let end_offset = offsets.get(&(edge_idx, Side::Leading)).copied().unwrap_or(0.0);
                points.push(border_point(upper, Side::Trailing, start_offset, horizontal));
                for id in &chain[1..chain.len() - 1] {
                    if let Some(center) = centers.get(id) {
                        points.push(*center);
                    }
                }
                points.push(border_point(lower, Side::Leading, end_offset, horizontal));
            }
            if reversed {
                points.reverse();
            }
        }
        edges.push(EdgeLayout {
            from: edge.from.clone(),
            to: edge.to.clone(),
            points,
            label: None,
            label_anchor: None,
            reversed,
            self_loop: edge.is_self_loop(),
        });
    }
    edges
}

fn border_point(node: &NodeLayout, side: Side, offset: f32, horizontal: bool) -> (f32, f32) {
    let (cx, cy) = node.center();
    match (horizontal, side) {
        (false, Side::Trailing) => (cx + offset, node.y + node.height),
        (false, Side::Leading) => (cx + offset, node.y),
        (true, Side::Trailing) => (node.x + node.width, cy + offset),
        (true, Side::Leading) => (node.x, cy + offset),
    }
}

fn self_loop_points(node: &NodeLayout, horizontal: bool, size: f32) -> Vec<(f32, f32)> {
    let (cx, cy) = node.center();
    if horizontal {
        let bottom = node.y + node.height;
        let half = node.width / 4.0;
        vec![
            (cx - half, bottom),
            (cx - half, bottom + size),
            (cx + half, bottom + size),
            (cx + half, bottom),
        ]
    } else {
        let right = node.x + node.width;
        let half = node.height / 4.0;
        vec![
            (right, cy - half),
            (right + size, cy - half),
            (right + size, cy + half),
            (right, cy + half),
        ]
    }
}

/// Point halfway along the polyline by arc length.
pub(crate) fn polyline_midpoint(points: &[(f32, f32)]) -> (f32, f32) {
    match points {
        [] => (0.0, 0.0),
        [only] => *only,
        _ => {
            let lengths: Vec<f32> = points
                .windows(2)
                .map(|pair| ((pair[1].0 - pair[0].0).powi(2) + (pair[1].1 - pair[0].1).powi(2)).sqrt())
                .collect();
            let total: f32 = lengths.iter().sum();
            if total <= f32::EPSILON {
                return points[0];
            }
            let mut remaining = total / 2.0;
            for (pair, length) in points.windows(2).zip(lengths) {
                if remaining <= length && length > 0.0 {
                    let t = remaining / length;
                    return (
                        pair[0].0 + (pair[1].0 - pair[0].0) * t,
                        pair[0].1 + (pair[1].1 - pair[0].1) * t,
                    );
                }
                remaining -= length;
            }
            points[points.len() - 1]
        }
    }
}

/// Shifts everything so the content starts at `margin` and rounds the
/// overall size up to whole pixels.
fn normalize_layout(layout: &mut Layout, margin: f32) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    let mut include = |x: f32, y: f32| {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    };
    for node in &layout.nodes {
        include(node.x, node.y);
        include(node.x + node.width, node.y + node.height);
    }
    for edge in &layout.edges {
        for point in &edge.points {
            include(point.0, point.1);
        }
        if let (Some(label), Some((ax, ay))) = (&edge.label, edge.label_anchor) {
            let half_w = label.width / 2.0 + LABEL_PAD_X;
            let half_h = label.height / 2.0 + LABEL_PAD_Y;
            include(ax - half_w, ay - half_h);
            include(ax + half_w, ay + half_h);
        }
    }
    if min_x > max_x || min_y > max_y {
        return;
    }

    let shift_x = margin - min_x;
    let shift_y = margin - min_y;
    for node in &mut layout.nodes {
        node.x += shift_x;
        node.y += shift_y;
    }
    for edge in &mut layout.edges {
        for point in &mut edge.points {
            point.0 += shift_x;
            point.1 += shift_y;
        }
        if let Some(anchor) = edge.label_anchor.as_mut() {
            anchor.0 += shift_x;
            anchor.1 += shift_y;
        }
    }
    layout.width = (max_x - min_x + margin * 2.0).ceil();
    layout.height = (max_y - min_y + margin * 2.0).ceil();
}
