use std::collections::HashMap;

use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};

use super::LayoutDirection;
use super::ranking::LayoutArc;
use crate::collision::Size;
use crate::config::LayoutConfig;
use crate::model::Position;

/// Node centers from dagre, or `None` when any node comes back unplaced or
/// with a non-finite coordinate.
pub(super) fn assign_centers(
    node_ids: &[String],
    sizes: &HashMap<String, Size>,
    arcs: &[LayoutArc],
    direction: LayoutDirection,
    config: &LayoutConfig,
) -> Option<HashMap<String, Position>> {
    if node_ids.is_empty() {
        return None;
    }

    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some(dagre_rankdir(direction).to_string());
    graph_config.nodesep = Some(config.node_spacing as f32);
    graph_config.ranksep = Some(config.rank_spacing as f32);
    graph_config.marginx = Some(config.margin_x as f32);
    graph_config.marginy = Some(config.margin_y as f32);
    dagre_graph.set_graph(graph_config);

    for node_id in node_ids {
        let size = sizes.get(node_id)?;
        let mut node = DagreNode::default();
        node.width = size.width as f32;
        node.height = size.height as f32;
        dagre_graph.set_node(node_id.clone(), Some(node));
    }

    for arc in arcs {
        let _ = dagre_graph.set_edge(&arc.from, &arc.to, Some(DagreEdge::default()), None);
    }

    dagre_layout::run_layout(&mut dagre_graph);

    let mut centers = HashMap::new();
    for node_id in node_ids {
        let placed = dagre_graph.node(node_id)?;
        let center = Position::new(f64::from(placed.x), f64::from(placed.y));
        if !center.x.is_finite() || !center.y.is_finite() {
            return None;
        }
        centers.insert(node_id.clone(), center);
    }
    Some(centers)
}

fn dagre_rankdir(direction: LayoutDirection) -> &'static str {
    match direction {
        LayoutDirection::TopBottom => "tb",
        LayoutDirection::BottomTop => "bt",
        LayoutDirection::LeftRight => "lr",
        LayoutDirection::RightLeft => "rl",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_follows_rankdir() {
        let node_ids: Vec<String> = vec!["A".into(), "B".into()];
        let sizes: HashMap<String, Size> = node_ids
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    Size {
                        width: 250.0,
                        height: 150.0,
                    },
                )
            })
            .collect();
        let arcs = vec![LayoutArc {
            from: "A".into(),
            to: "B".into(),
        }];
        let config = LayoutConfig::default();
        let lr = assign_centers(&node_ids, &sizes, &arcs, LayoutDirection::LeftRight, &config)
            .unwrap();
        assert!(lr["A"].x < lr["B"].x);
        let tb = assign_centers(&node_ids, &sizes, &arcs, LayoutDirection::TopBottom, &config)
            .unwrap();
        assert!(tb["A"].y < tb["B"].y);
    }
}
