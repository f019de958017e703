//! In-crate layered placement, used when dagre yields nothing usable.
//!
//! Longest-path ranks (cycles broken by declaration order), dummy vertices
//! on arcs spanning several ranks, median crossing reduction, then a
//! barycenter pass that packs each rank along the cross axis. Nothing here
//! depends on hash iteration order.

use std::collections::HashMap;

use super::LayoutDirection;
use super::ranking::{LayoutArc, compute_ranks, order_rank_nodes};
use crate::collision::Size;
use crate::config::LayoutConfig;
use crate::model::Position;

#[derive(Debug, Clone)]
struct Vertex {
    /// Extent along the rank axis.
    main: f64,
    /// Extent across ranks.
    cross: f64,
}

/// Node centers keyed by id, before translation to the margins.
pub(super) fn assign_centers(
    node_ids: &[String],
    sizes: &HashMap<String, Size>,
    arcs: &[LayoutArc],
    direction: LayoutDirection,
    config: &LayoutConfig,
) -> HashMap<String, Position> {
    let mut order_map: HashMap<String, usize> = HashMap::new();
    for (idx, id) in node_ids.iter().enumerate() {
        order_map.entry(id.clone()).or_insert(idx);
    }

    let mut vertices: HashMap<String, Vertex> = HashMap::new();
    for (id, size) in sizes {
        let vertex = if direction.is_horizontal() {
            Vertex {
                main: size.width,
                cross: size.height,
            }
        } else {
            Vertex {
                main: size.height,
                cross: size.width,
            }
        };
        vertices.insert(id.clone(), vertex);
    }

    let ranks = compute_ranks(node_ids, arcs, &order_map);
    let max_rank = ranks.values().copied().max().unwrap_or(0);

    let mut rank_nodes: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
    for node_id in unique_ids(node_ids) {
        let rank = ranks.get(node_id).copied().unwrap_or(0);
        rank_nodes[rank].push(node_id.clone());
    }

    let mut expanded: Vec<LayoutArc> = Vec::new();
    let mut dummy_counter = 0usize;
    for arc in arcs {
        let (Some(&from_rank), Some(&to_rank)) = (ranks.get(&arc.from), ranks.get(&arc.to)) else {
            continue;
        };
        // Arcs closing a cycle point upwards; route them as if reversed.
        let (from, to, from_rank, to_rank) = match from_rank.cmp(&to_rank) {
            std::cmp::Ordering::Less => (&arc.from, &arc.to, from_rank, to_rank),
            std::cmp::Ordering::Greater => (&arc.to, &arc.from, to_rank, from_rank),
            std::cmp::Ordering::Equal => continue,
        };
        let mut prev = from.clone();
        for step in 1..(to_rank - from_rank) {
            // Node ids are free text, so skip any name a node already owns.
            let dummy_id = loop {
                let candidate = format!("__dummy_{dummy_counter}__");
                dummy_counter += 1;
                if !order_map.contains_key(&candidate) {
                    break candidate;
                }
            };
            order_map.insert(dummy_id.clone(), order_map.len());
            vertices.insert(
                dummy_id.clone(),
                Vertex {
                    main: 0.0,
                    cross: 0.0,
                },
            );
            rank_nodes[from_rank + step].push(dummy_id.clone());
            expanded.push(LayoutArc {
                from: prev,
                to: dummy_id.clone(),
            });
            prev = dummy_id;
        }
        expanded.push(LayoutArc {
            from: prev,
            to: to.clone(),
        });
    }

    order_rank_nodes(&mut rank_nodes, &expanded, &order_map, config.order_passes);

    let main_pos = assign_rank_centers(&rank_nodes, &vertices, config);
    let cross_pos = assign_cross_centers(&rank_nodes, &vertices, &expanded, config);

    let mut centers = HashMap::new();
    for node_id in node_ids {
        let (Some(&main), Some(&cross)) = (main_pos.get(node_id), cross_pos.get(node_id)) else {
            continue;
        };
        let main = if direction.is_reversed() { -main } else { main };
        let center = if direction.is_horizontal() {
            Position::new(main, cross)
        } else {
            Position::new(cross, main)
        };
        centers.insert(node_id.clone(), center);
    }
    centers
}

/// Declaration order with repeated ids dropped.
fn unique_ids(node_ids: &[String]) -> impl Iterator<Item = &String> {
    let mut seen = std::collections::HashSet::new();
    node_ids.iter().filter(move |id| seen.insert(*id))
}

fn assign_rank_centers(
    rank_nodes: &[Vec<String>],
    vertices: &HashMap<String, Vertex>,
    config: &LayoutConfig,
) -> HashMap<String, f64> {
    let mut centers = HashMap::new();
    let mut cursor = 0.0;
    for bucket in rank_nodes {
        let thickness = bucket
            .iter()
            .filter_map(|id| vertices.get(id))
            .map(|vertex| vertex.main)
            .fold(0.0, f64::max);
        let center = cursor + thickness / 2.0;
        for node_id in bucket {
            centers.insert(node_id.clone(), center);
        }
        cursor += thickness + config.rank_spacing;
    }
    centers
}

fn assign_cross_centers(
    rank_nodes: &[Vec<String>],
    vertices: &HashMap<String, Vertex>,
    arcs: &[LayoutArc],
    config: &LayoutConfig,
) -> HashMap<String, f64> {
    let half = |id: &str| vertices.get(id).map(|vertex| vertex.cross / 2.0).unwrap_or(0.0);

    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for arc in arcs {
        incoming.entry(arc.to.as_str()).or_default().push(arc.from.as_str());
        outgoing.entry(arc.from.as_str()).or_default().push(arc.to.as_str());
    }

    // Seed: each rank packed tightly and centred on zero.
    let mut cross_pos: HashMap<String, f64> = HashMap::new();
    for bucket in rank_nodes {
        let desired: Vec<f64> = vec![0.0; bucket.len()];
        for (node_id, center) in pack_rank(bucket, &desired, &half, config.node_spacing) {
            cross_pos.insert(node_id, center);
        }
    }

    let place_rank = |bucket: &Vec<String>,
                          neighbors: &HashMap<&str, Vec<&str>>,
                          cross_pos: &mut HashMap<String, f64>| {
        if bucket.is_empty() {
            return;
        }
        let desired: Vec<f64> = bucket
            .iter()
            .map(|node_id| {
                let current = cross_pos.get(node_id).copied().unwrap_or(0.0);
                let Some(list) = neighbors.get(node_id.as_str()) else {
                    return current;
                };
                let placed: Vec<f64> = list
                    .iter()
                    .filter_map(|neighbor| cross_pos.get(*neighbor).copied())
                    .collect();
                if placed.is_empty() {
                    current
                } else {
                    placed.iter().sum::<f64>() / placed.len() as f64
                }
            })
            .collect();
        for (node_id, center) in pack_rank(bucket, &desired, &half, config.node_spacing) {
            cross_pos.insert(node_id, center);
        }
    };

    for _ in 0..2 {
        for bucket in rank_nodes.iter().skip(1) {
            place_rank(bucket, &incoming, &mut cross_pos);
        }
        for bucket in rank_nodes.iter().rev().skip(1) {
            place_rank(bucket, &outgoing, &mut cross_pos);
        }
    }

    cross_pos
}

/// Places a rank in its fixed order, as close to `desired` as spacing allows,
/// then shifts the whole rank so its mean matches the desired mean.
fn pack_rank(
    bucket: &[String],
    desired: &[f64],
    half: &impl Fn(&str) -> f64,
    spacing: f64,
) -> Vec<(String, f64)> {
    let mut assigned: Vec<(String, f64)> = Vec::with_capacity(bucket.len());
    let mut prev: Option<(f64, f64)> = None;
    for (node_id, want) in bucket.iter().zip(desired) {
        let node_half = half(node_id);
        let center = match prev {
            Some((prev_center, prev_half)) => {
                want.max(prev_center + prev_half + node_half + spacing)
            }
            None => *want,
        };
        assigned.push((node_id.clone(), center));
        prev = Some((center, node_half));
    }
    if assigned.is_empty() {
        return assigned;
    }
    let count = assigned.len() as f64;
    let desired_mean = desired.iter().sum::<f64>() / count;
    let actual_mean = assigned.iter().map(|(_, center)| *center).sum::<f64>() / count;
    let delta = desired_mean - actual_mean;
    for (_, center) in &mut assigned {
        *center += delta;
    }
    assigned
}
