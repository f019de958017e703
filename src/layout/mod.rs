//! Layered auto-layout for platform diagrams.
//!
//! Every edge is treated as a plain `source -> target` dependency; direction
//! semantics, handles and labels play no part. Placement runs through dagre
//! and falls back to the in-crate layered pass when dagre leaves a node
//! unplaced. Either way the result is translated so the top-left node sits
//! on the configured margins.

mod dagre;
mod manual;
mod ranking;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::collision::{Size, node_size};
use crate::config::{LayoutConfig, NodeMetrics};
use crate::model::{Edge, Node, Position};
use ranking::LayoutArc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutDirection {
    #[default]
    #[serde(rename = "TB", alias = "TD")]
    TopBottom,
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
    #[serde(rename = "BT")]
    BottomTop,
}

impl LayoutDirection {
    pub const ALL: [LayoutDirection; 4] = [
        Self::TopBottom,
        Self::LeftRight,
        Self::RightLeft,
        Self::BottomTop,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "TB" | "TD" => Some(Self::TopBottom),
            "LR" => Some(Self::LeftRight),
            "RL" => Some(Self::RightLeft),
            "BT" => Some(Self::BottomTop),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::TopBottom => "TB",
            Self::LeftRight => "LR",
            Self::RightLeft => "RL",
            Self::BottomTop => "BT",
        }
    }

    /// Ranks advance along x.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }

    /// Ranks advance towards negative coordinates before translation.
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::RightLeft | Self::BottomTop)
    }
}

/// Lays out with the default spacing and footprint rules.
pub fn layout(nodes: &[Node], edges: &[Edge], direction: LayoutDirection) -> Vec<Node> {
    layout_with(
        nodes,
        edges,
        direction,
        &LayoutConfig::default(),
        &NodeMetrics::default(),
    )
}

/// Returns a copy of `nodes` where only `position` (top-left) has changed.
pub fn layout_with(
    nodes: &[Node],
    edges: &[Edge],
    direction: LayoutDirection,
    config: &LayoutConfig,
    metrics: &NodeMetrics,
) -> Vec<Node> {
    if nodes.is_empty() {
        return Vec::new();
    }

    let node_ids: Vec<String> = nodes.iter().map(|node| node.id.clone()).collect();
    let known: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    let sizes: HashMap<String, Size> = nodes
        .iter()
        .map(|node| (node.id.clone(), node_size(node, metrics)))
        .collect();
    let arcs = collect_arcs(edges, &known);

    let centers = dagre::assign_centers(&node_ids, &sizes, &arcs, direction, config)
        .unwrap_or_else(|| manual::assign_centers(&node_ids, &sizes, &arcs, direction, config));

    let mut positioned: Vec<Node> = nodes.to_vec();
    for node in &mut positioned {
        let (Some(size), Some(center)) = (sizes.get(&node.id), centers.get(&node.id)) else {
            continue;
        };
        node.position = Position::new(center.x - size.width / 2.0, center.y - size.height / 2.0);
    }

    let min_x = positioned
        .iter()
        .map(|node| node.position.x)
        .fold(f64::INFINITY, f64::min);
    let min_y = positioned
        .iter()
        .map(|node| node.position.y)
        .fold(f64::INFINITY, f64::min);
    let dx = config.margin_x - min_x;
    let dy = config.margin_y - min_y;
    for node in &mut positioned {
        node.position.x += dx;
        node.position.y += dy;
    }

    positioned
}

/// One arc per edge between distinct known nodes; parallel edges collapse.
fn collect_arcs(edges: &[Edge], known: &HashSet<&str>) -> Vec<LayoutArc> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut arcs = Vec::new();
    for edge in edges {
        if edge.source == edge.target {
            continue;
        }
        if !known.contains(edge.source.as_str()) || !known.contains(edge.target.as_str()) {
            continue;
        }
        if !seen.insert((edge.source.as_str(), edge.target.as_str())) {
            continue;
        }
        arcs.push(LayoutArc {
            from: edge.source.clone(),
            to: edge.target.clone(),
        });
    }
    arcs
}
