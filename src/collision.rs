//! Keeps a dragged platform from landing on top of its neighbours.
//!
//! The resolver is a short relaxation loop: while the moved node's padded box
//! intersects any other node, nudge it away from each offender along the
//! vector between their positions. It is O(N) per pass and capped, which is
//! plenty for interactively sized diagrams.

use crate::config::{CollisionConfig, NodeMetrics};
use crate::model::{Node, Position};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn at(position: Position, size: Size) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        }
    }

    /// Boxes overlap unless separated by more than `padding` on some axis.
    pub fn overlaps(&self, other: &Rect, padding: f64) -> bool {
        !(self.x + self.width + padding < other.x
            || other.x + other.width + padding < self.x
            || self.y + self.height + padding < other.y
            || other.y + other.height + padding < self.y)
    }
}

pub fn node_size(node: &Node, metrics: &NodeMetrics) -> Size {
    let rows = node.data.attributes.len() as f64;
    let height = metrics.base_height + rows * metrics.attribute_height + metrics.padding;
    Size {
        width: metrics.width,
        height: height.max(metrics.min_height),
    }
}

pub fn node_rect(node: &Node, metrics: &NodeMetrics) -> Rect {
    Rect::at(node.position, node_size(node, metrics))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub position: Position,
    pub iterations: usize,
    /// False when the iteration cap was hit with an overlap still present.
    pub converged: bool,
}

/// Non-overlapping position for `moved` using the default footprint rules.
pub fn resolve(moved: &Node, all_nodes: &[Node], padding: f64) -> Position {
    let config = CollisionConfig {
        padding,
        ..CollisionConfig::default()
    };
    resolve_with(moved, all_nodes, &config, &NodeMetrics::default()).position
}

pub fn resolve_with(
    moved: &Node,
    all_nodes: &[Node],
    config: &CollisionConfig,
    metrics: &NodeMetrics,
) -> Resolution {
    let size = node_size(moved, metrics);
    let others: Vec<(Position, Rect)> = all_nodes
        .iter()
        .filter(|node| node.id != moved.id)
        .map(|node| (node.position, node_rect(node, metrics)))
        .collect();

    let mut position = moved.position;
    let mut iterations = 0;
    let mut has_collision = true;

    while has_collision && iterations < config.max_iterations {
        has_collision = false;
        for (other_position, other_rect) in &others {
            if !Rect::at(position, size).overlaps(other_rect, config.padding) {
                continue;
            }
            has_collision = true;
            let dx = position.x - other_position.x;
            let dy = position.y - other_position.y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance == 0.0 {
                continue;
            }
            position.x += dx / distance * config.step;
            position.y += dy / distance * config.step;
        }
        iterations += 1;
    }

    let rect = Rect::at(position, size);
    let converged = others
        .iter()
        .all(|(_, other_rect)| !rect.overlaps(other_rect, config.padding));

    Resolution {
        position,
        iterations,
        converged,
    }
}
