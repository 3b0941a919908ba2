use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::ir::CanonicalEdge;

/// Edge between two adjacent layers, after long edges were split at
/// virtual nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct LayerEdge {
    pub from: String,
    pub to: String,
}

/// Canonical edge oriented along the layer direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct OrientedEdge {
    pub upper: String,
    pub lower: String,
    pub reversed: bool,
}

#[derive(Debug, Clone)]
pub(super) struct Ranking {
    pub ranks: HashMap<String, usize>,
    /// One entry per canonical edge; `None` for self-loops.
    pub oriented: Vec<Option<OrientedEdge>>,
}

#[derive(Debug, Clone)]
pub(super) struct Layering {
    pub layers: Vec<Vec<String>>,
    pub segments: Vec<LayerEdge>,
    /// Per canonical edge, the oriented node chain through its virtual nodes.
    pub chains: Vec<Option<Vec<String>>>,
    pub virtual_nodes: HashSet<String>,
    pub node_order: HashMap<String, usize>,
}

/// Topological order of `node_ids` that breaks cycles at the node declared
/// earliest. Ties between ready nodes are broken by declaration order.
pub(super) fn acyclic_order(
    node_ids: &[String],
    edges: &[CanonicalEdge],
    node_order: &HashMap<String, usize>,
) -> Vec<String> {
    let set: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indeg: HashMap<&str, usize> = set.iter().map(|id| (*id, 0)).collect();

    for edge in edges {
        if edge.is_self_loop() || !set.contains(edge.from.as_str()) || !set.contains(edge.to.as_str()) {
            continue;
        }
        adj.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        if let Some(deg) = indeg.get_mut(edge.to.as_str()) {
            *deg += 1;
        }
    }

    let order_key = |id: &str| -> usize { node_order.get(id).copied().unwrap_or(usize::MAX) };

    let mut ready: BinaryHeap<Reverse<(usize, &str)>> = BinaryHeap::new();
    for id in &set {
        if indeg.get(id).copied().unwrap_or(0) == 0 {
            ready.push(Reverse((order_key(id), *id)));
        }
    }

    let mut order: Vec<String> = Vec::with_capacity(set.len());
    let mut processed: HashSet<&str> = HashSet::new();
    loop {
        while let Some(Reverse((_key, id))) = ready.pop() {
            if !processed.insert(id) {
                continue;
            }
            order.push(id.to_string());
            for next in adj.get(id).into_iter().flatten() {
                if processed.contains(next) {
                    continue;
                }
                if let Some(deg) = indeg.get_mut(next) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push(Reverse((order_key(next), *next)));
                    }
                }
            }
        }

        if processed.len() >= set.len() {
            break;
        }

        // Cycle: restart from the earliest declared node still pending; its
        // remaining incoming edges become back edges.
        let next = set
            .iter()
            .filter(|id| !processed.contains(*id))
            .min_by_key(|id| (order_key(id), **id));
        match next {
            Some(id) => ready.push(Reverse((order_key(id), *id))),
            None => break,
        }
    }

    order
}

/// Longest-path layering over the cycle-free orientation of `edges`.
/// Sources are then pulled down next to their closest child so they do not
/// all pile up in the first layer.
pub(super) fn compute_ranks(
    node_ids: &[String],
    edges: &[CanonicalEdge],
    node_order: &HashMap<String, usize>,
) -> Ranking {
    let order = acyclic_order(node_ids, edges, node_order);
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();

    let oriented: Vec<Option<OrientedEdge>> = edges
        .iter()
        .map(|edge| {
            if edge.is_self_loop() {
                return None;
            }
            let from = *position.get(edge.from.as_str())?;
            let to = *position.get(edge.to.as_str())?;
            Some(if from < to {
                OrientedEdge {
                    upper: edge.from.clone(),
                    lower: edge.to.clone(),
                    reversed: false,
                }
            } else {
                OrientedEdge {
                    upper: edge.to.clone(),
                    lower: edge.from.clone(),
                    reversed: true,
                }
            })
        })
        .collect();

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_parent: HashSet<&str> = HashSet::new();
    for edge in oriented.iter().flatten() {
        children
            .entry(edge.upper.as_str())
            .or_default()
            .push(edge.lower.as_str());
        has_parent.insert(edge.lower.as_str());
    }

    let mut ranks: HashMap<String, usize> = HashMap::new();
    for id in &order {
        let rank = *ranks.entry(id.clone()).or_insert(0);
        for child in children.get(id.as_str()).into_iter().flatten() {
            let entry = ranks.entry(child.to_string()).or_insert(0);
            *entry = (*entry).max(rank + 1);
        }
    }

    for id in order.iter().rev() {
        if has_parent.contains(id.as_str()) {
            continue;
        }
        let Some(kids) = children.get(id.as_str()) else {
            continue;
        };
        let closest = kids
            .iter()
            .filter_map(|kid| ranks.get(*kid).copied())
            .min()
            .unwrap_or(1);
        if let Some(rank) = ranks.get_mut(id) {
            *rank = closest.saturating_sub(1);
        }
    }

    Ranking { ranks, oriented }
}

/// Buckets nodes by rank and splits edges spanning several ranks with
/// virtual nodes so every segment joins adjacent layers.
pub(super) fn build_layers(
    node_ids: &[String],
    ranking: &Ranking,
    node_order: &HashMap<String, usize>,
) -> Layering {
    let max_rank = ranking.ranks.values().copied().max().unwrap_or(0);
    let mut layers: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
    for id in node_ids {
        let rank = ranking.ranks.get(id).copied().unwrap_or(0);
        layers[rank].push(id.clone());
    }

    let mut order_map = node_order.clone();
    let mut segments = Vec::new();
    let mut chains = Vec::with_capacity(ranking.oriented.len());
    let mut virtual_nodes = HashSet::new();
    let real_ids: HashSet<&str> = node_ids.iter().map(String::as_str).collect();

    for (edge_idx, oriented) in ranking.oriented.iter().enumerate() {
        let Some(edge) = oriented else {
            chains.push(None);
            continue;
        };
        let upper_rank = ranking.ranks.get(&edge.upper).copied().unwrap_or(0);
        let lower_rank = ranking.ranks.get(&edge.lower).copied().unwrap_or(0);
        let mut chain = vec![edge.upper.clone()];
        for rank in (upper_rank + 1)..lower_rank {
            let id = virtual_id(edge_idx, rank, &real_ids, &virtual_nodes);
            order_map.insert(id.clone(), order_map.len());
            layers[rank].push(id.clone());
            virtual_nodes.insert(id.clone());
            chain.push(id);
        }
        chain.push(edge.lower.clone());
        for pair in chain.windows(2) {
            segments.push(LayerEdge {
                from: pair[0].clone(),
                to: pair[1].clone(),
            });
        }
        chains.push(Some(chain));
    }

    Layering {
        layers,
        segments,
        chains,
        virtual_nodes,
        node_order: order_map,
    }
}

/// Id of the virtual node of edge `edge_idx` on layer `rank`. Node keys come
/// from the payload, so the id is padded until it clashes with neither a
/// real key nor another virtual node.
fn virtual_id(
    edge_idx: usize,
    rank: usize,
    real_ids: &HashSet<&str>,
    virtual_nodes: &HashSet<String>,
) -> String {
    let mut id = format!("__virtual_{edge_idx}_{rank}__");
    while real_ids.contains(id.as_str()) || virtual_nodes.contains(&id) {
        id.insert(0, '_');
    }
    id
}

/// Median-heuristic crossing reduction. Alternates downward and upward
/// sweeps and keeps the ordering with the fewest crossings seen.
pub(super) fn order_rank_nodes(
    rank_nodes: &mut [Vec<String>],
    edges: &[LayerEdge],
    node_order: &HashMap<String, usize>,
    passes: usize,
) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let mut incoming: HashMap<String, Vec<String>> = HashMap::new();
    let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
    for edge in edges {
        outgoing
            .entry(edge.from.clone())
            .or_default()
            .push(edge.to.clone());
        incoming
            .entry(edge.to.clone())
            .or_default()
            .push(edge.from.clone());
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    let update_positions = |rank_nodes: &[Vec<String>], positions: &mut HashMap<String, usize>| {
        positions.clear();
        for bucket in rank_nodes {
            for (idx, node_id) in bucket.iter().enumerate() {
                positions.insert(node_id.clone(), idx);
            }
        }
    };
    update_positions(rank_nodes, &mut positions);

    let sort_bucket = |bucket: &mut Vec<String>,
                       neighbors: &HashMap<String, Vec<String>>,
                       positions: &HashMap<String, usize>| {
        let current_positions: HashMap<String, usize> = bucket
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        bucket.sort_by(|a, b| {
            let a_score = median_position(a, neighbors, positions, &current_positions);
            let b_score = median_position(b, neighbors, positions, &current_positions);
            match a_score.partial_cmp(&b_score) {
                Some(std::cmp::Ordering::Equal) | None => {
                    let a_pos = current_positions.get(a).copied().unwrap_or(0);
                    let b_pos = current_positions.get(b).copied().unwrap_or(0);
                    a_pos.cmp(&b_pos).then_with(|| {
                        node_order
                            .get(a)
                            .copied()
                            .unwrap_or(usize::MAX)
                            .cmp(&node_order.get(b).copied().unwrap_or(usize::MAX))
                    })
                }
                Some(ordering) => ordering,
            }
        });
    };

    let mut best = rank_nodes.to_vec();
    let mut best_crossings = count_crossings(rank_nodes, edges);

    for _ in 0..passes.max(1) {
        if best_crossings == 0 {
            break;
        }
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() > 1 {
                sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
                update_positions(rank_nodes, &mut positions);
            }
        }
        for rank in (0..rank_nodes.len() - 1).rev() {
            if rank_nodes[rank].len() > 1 {
                sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
                update_positions(rank_nodes, &mut positions);
            }
        }
        let crossings = count_crossings(rank_nodes, edges);
        if crossings < best_crossings {
            best_crossings = crossings;
            best = rank_nodes.to_vec();
        }
    }

    for (slot, bucket) in rank_nodes.iter_mut().zip(best) {
        *slot = bucket;
    }
}

pub(super) fn median_position(
    node_id: &str,
    neighbors: &HashMap<String, Vec<String>>,
    positions: &HashMap<String, usize>,
    current_positions: &HashMap<String, usize>,
) -> f32 {
    let fallback = current_positions.get(node_id).copied().unwrap_or(0) as f32;
    let Some(list) = neighbors.get(node_id) else {
        return fallback;
    };
    let mut values: Vec<f32> = list
        .iter()
        .filter_map(|neighbor| positions.get(neighbor).map(|pos| *pos as f32))
        .collect();
    if values.is_empty() {
        return fallback;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

/// Number of pairwise segment crossings between adjacent layers.
pub(super) fn count_crossings(rank_nodes: &[Vec<String>], edges: &[LayerEdge]) -> usize {
    let mut position: HashMap<&str, (usize, usize)> = HashMap::new();
    for (rank, bucket) in rank_nodes.iter().enumerate() {
        for (idx, id) in bucket.iter().enumerate() {
            position.insert(id.as_str(), (rank, idx));
        }
    }

    let mut by_gap: HashMap<usize, Vec<(usize, usize)>> = HashMap::new();
    for edge in edges {
        let (Some(&(from_rank, from_idx)), Some(&(to_rank, to_idx))) =
            (position.get(edge.from.as_str()), position.get(edge.to.as_str()))
        else {
            continue;
        };
        if to_rank == from_rank + 1 {
            by_gap.entry(from_rank).or_default().push((from_idx, to_idx));
        }
    }

    let mut crossings = 0;
    for pairs in by_gap.values() {
        for (i, a) in pairs.iter().enumerate() {
            for b in &pairs[i + 1..] {
                if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
                    crossings += 1;
                }
            }
        }
    }
    crossings
}
