//! Edge direction semantics: handle typing, creation defaults, reversal,
//! in-place updates and the two-step reconnection flow.

use crate::error::{EngineError, Result};
use crate::model::{
    ConnectionType, DEFAULT_EDGE_TYPE, DEFAULT_REQUEST_LABEL, DEFAULT_RESPONSE_LABEL, Diagram,
    DirectionType, Edge, EdgeData, EdgeEndpoint, EdgeStyle, EdgeVisualType, HandlePosition,
    HandleRole, Marker, Reconnectable,
};

/// A connection request as produced by a drag gesture on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Connection {
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: Some(source_handle.into()),
            target_handle: Some(target_handle.into()),
        }
    }
}

/// Checks endpoint presence and handle roles. A source handle must end in
/// `-source`, a target handle in `-target`.
pub fn validate_connection(connection: &Connection) -> Result<()> {
    if connection.source.is_empty() || connection.target.is_empty() {
        return Err(EngineError::InvalidConnection(
            "source and target are required".to_string(),
        ));
    }
    let source_handle = connection.source_handle.as_deref().unwrap_or_default();
    if !source_handle.ends_with(HandleRole::Source.suffix()) {
        return Err(EngineError::InvalidConnection(format!(
            "source handle '{source_handle}' is not a source handle"
        )));
    }
    let target_handle = connection.target_handle.as_deref().unwrap_or_default();
    if !target_handle.ends_with(HandleRole::Target.suffix()) {
        return Err(EngineError::InvalidConnection(format!(
            "target handle '{target_handle}' is not a target handle"
        )));
    }
    Ok(())
}

pub fn is_valid_connection(connection: &Connection) -> bool {
    validate_connection(connection).is_ok()
}

pub fn edge_id(source: &str, target: &str, millis: i64) -> String {
    format!("e{source}-{target}-{millis}")
}

/// Builds a new edge stamped with the current wall-clock time.
pub fn create_edge(connection: &Connection) -> Result<Edge> {
    create_edge_at(connection, chrono::Utc::now().timestamp_millis())
}

pub fn create_edge_at(connection: &Connection, millis: i64) -> Result<Edge> {
    validate_connection(connection)?;
    Ok(Edge {
        id: edge_id(&connection.source, &connection.target, millis),
        source: connection.source.clone(),
        target: connection.target.clone(),
        source_handle: connection.source_handle.clone(),
        target_handle: connection.target_handle.clone(),
        kind: DEFAULT_EDGE_TYPE.to_string(),
        label: String::new(),
        animated: false,
        reconnectable: Some(reconnectable_for(DirectionType::Unidirectional)),
        marker_end: Some(Marker::arrow_closed()),
        marker_start: None,
        style: None,
        data: EdgeData {
            visual_type: EdgeVisualType::Smoothstep,
            direction_type: DirectionType::Unidirectional,
            connection_type: ConnectionType::None,
            ..EdgeData::default()
        },
    })
}

/// Swaps a trailing `-source` and `-target`. Anything else passes through.
pub fn convert_handle_type(handle_id: Option<&str>) -> Option<String> {
    let handle_id = handle_id?;
    if let Some(position) = handle_id.strip_suffix(HandleRole::Source.suffix()) {
        return Some(format!("{position}{}", HandleRole::Target.suffix()));
    }
    if let Some(position) = handle_id.strip_suffix(HandleRole::Target.suffix()) {
        return Some(format!("{position}{}", HandleRole::Source.suffix()));
    }
    Some(handle_id.to_string())
}

/// Unidirectional edges keep their source fixed.
pub fn reconnectable_for(direction: DirectionType) -> Reconnectable {
    match direction {
        DirectionType::Unidirectional => Reconnectable::Endpoint(EdgeEndpoint::Target),
        DirectionType::Bidirectional => Reconnectable::Flag(true),
    }
}

pub fn update_reconnectable(edge: &mut Edge) {
    edge.reconnectable = Some(reconnectable_for(edge.data.direction_type));
}

/// The stored rule, or the one implied by the direction type when absent.
fn effective_reconnectable(edge: &Edge) -> Reconnectable {
    edge.reconnectable
        .unwrap_or_else(|| reconnectable_for(edge.data.direction_type))
}

fn ensure_movable(edge: &Edge, endpoint: EdgeEndpoint) -> Result<()> {
    if effective_reconnectable(edge).allows(endpoint) {
        Ok(())
    } else {
        Err(EngineError::Reconnect(format!(
            "{} endpoint of edge '{}' cannot be moved",
            endpoint.as_str(),
            edge.id
        )))
    }
}

/// Flips the flow of `edge`, keeping its id and visual fields.
pub fn reverse(edge: &Edge) -> Edge {
    let data = &edge.data;
    Edge {
        id: edge.id.clone(),
        source: edge.target.clone(),
        target: edge.source.clone(),
        source_handle: convert_handle_type(edge.target_handle.as_deref()),
        target_handle: convert_handle_type(edge.source_handle.as_deref()),
        kind: edge.kind.clone(),
        label: edge.label.clone(),
        animated: edge.animated,
        // An edge that never carried the field stays without it.
        reconnectable: edge
            .reconnectable
            .map(|_| reconnectable_for(data.direction_type)),
        marker_end: edge.marker_end.clone(),
        marker_start: edge.marker_start.clone(),
        style: edge.style.clone(),
        data: EdgeData {
            request_label: non_empty_or(&data.response_label, DEFAULT_RESPONSE_LABEL),
            response_label: non_empty_or(&data.request_label, DEFAULT_REQUEST_LABEL),
            request_parameters: data.response_parameters.clone(),
            response_parameters: data.request_parameters.clone(),
            ..data.clone()
        },
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// An edge is broken when a handle sits in the wrong role slot.
pub fn is_broken(edge: &Edge) -> bool {
    let source_wrong = edge
        .source_handle
        .as_deref()
        .is_some_and(|handle| handle.ends_with(HandleRole::Target.suffix()));
    let target_wrong = edge
        .target_handle
        .as_deref()
        .is_some_and(|handle| handle.ends_with(HandleRole::Source.suffix()));
    source_wrong || target_wrong
}

/// Drops broken edges and edges whose endpoints are missing. Returns how many
/// were removed.
pub fn prune_broken_edges(diagram: &mut Diagram) -> usize {
    let before = diagram.edges.len();
    let nodes = &diagram.nodes;
    diagram.edges.retain(|edge| {
        !is_broken(edge)
            && nodes.iter().any(|node| node.id == edge.source)
            && nodes.iter().any(|node| node.id == edge.target)
    });
    before - diagram.edges.len()
}

/// Partial edge update from the editor panel. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeUpdate {
    pub label: Option<String>,
    pub animated: Option<bool>,
    pub style: Option<EdgeStyle>,
    pub visual_type: Option<EdgeVisualType>,
    pub direction_type: Option<DirectionType>,
    pub connection_type: Option<ConnectionType>,
    pub request_label: Option<String>,
    pub response_label: Option<String>,
    pub request_parameters: Option<Vec<String>>,
    pub response_parameters: Option<Vec<String>>,
}

/// Merges `update` into `edge`. The label is mirrored into `data.label`, and
/// `reconnectable` follows the resulting direction type.
pub fn apply_update(edge: &mut Edge, update: EdgeUpdate) {
    if let Some(label) = update.label {
        edge.data.label = label.clone();
        edge.label = label;
    }
    if let Some(animated) = update.animated {
        edge.animated = animated;
    }
    if let Some(style) = update.style {
        edge.style = Some(style);
    }
    let data = &mut edge.data;
    if let Some(v) = update.visual_type {
        data.visual_type = v;
    }
    if let Some(v) = update.direction_type {
        data.direction_type = v;
    }
    if let Some(v) = update.connection_type {
        data.connection_type = v;
    }
    if let Some(v) = update.request_label {
        data.request_label = v;
    }
    if let Some(v) = update.response_label {
        data.response_label = v;
    }
    if let Some(v) = update.request_parameters {
        data.request_parameters = v;
    }
    if let Some(v) = update.response_parameters {
        data.response_parameters = v;
    }
    update_reconnectable(edge);
}

/// A fully specified endpoint move, produced by [`ReconnectState::pick_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconnect {
    pub edge_id: String,
    pub endpoint: EdgeEndpoint,
    pub node_id: String,
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReconnectState {
    #[default]
    Idle,
    HandleChosen {
        edge_id: String,
        endpoint: EdgeEndpoint,
    },
    PositionChosen {
        edge_id: String,
        endpoint: EdgeEndpoint,
        position: HandlePosition,
    },
}

impl ReconnectState {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Starts moving `endpoint` of `edge`. Fails if the edge does not allow it.
    pub fn begin(&mut self, edge: &Edge, endpoint: EdgeEndpoint) -> Result<()> {
        ensure_movable(edge, endpoint)?;
        *self = Self::HandleChosen {
            edge_id: edge.id.clone(),
            endpoint,
        };
        Ok(())
    }

    /// Picks (or re-picks) the handle position the endpoint will attach to.
    pub fn choose_position(&mut self, position: HandlePosition) -> Result<()> {
        let (edge_id, endpoint) = match self {
            Self::Idle => {
                return Err(EngineError::Reconnect(
                    "no reconnection in progress".to_string(),
                ));
            }
            Self::HandleChosen { edge_id, endpoint }
            | Self::PositionChosen {
                edge_id, endpoint, ..
            } => (std::mem::take(edge_id), *endpoint),
        };
        *self = Self::PositionChosen {
            edge_id,
            endpoint,
            position,
        };
        Ok(())
    }

    /// Completes the flow once a position is known. Before that a node click
    /// is ignored and the state is kept.
    pub fn pick_node(&mut self, node_id: &str) -> Option<Reconnect> {
        let Self::PositionChosen {
            edge_id,
            endpoint,
            position,
        } = self
        else {
            return None;
        };
        let reconnect = Reconnect {
            edge_id: std::mem::take(edge_id),
            endpoint: *endpoint,
            node_id: node_id.to_string(),
            handle: format!("{}{}", position.as_str(), endpoint.role().suffix()),
        };
        *self = Self::Idle;
        Some(reconnect)
    }

    pub fn cancel(&mut self) {
        *self = Self::Idle;
    }
}

/// Moves one endpoint of the referenced edge. Fails closed: nothing changes
/// when the edge or node is unknown, or when the edge no longer lets that
/// endpoint move (its direction type may have changed mid-flow).
pub fn apply_reconnect(diagram: &mut Diagram, reconnect: &Reconnect) -> Result<()> {
    if !diagram.contains_node(&reconnect.node_id) {
        return Err(EngineError::UnknownNode(reconnect.node_id.clone()));
    }
    let edge = diagram
        .edge_mut(&reconnect.edge_id)
        .ok_or_else(|| EngineError::UnknownEdge(reconnect.edge_id.clone()))?;
    ensure_movable(edge, reconnect.endpoint)?;
    match reconnect.endpoint {
        EdgeEndpoint::Source => {
            edge.source = reconnect.node_id.clone();
            edge.source_handle = Some(reconnect.handle.clone());
        }
        EdgeEndpoint::Target => {
            edge.target = reconnect.node_id.clone();
            edge.target_handle = Some(reconnect.handle.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Position};

    fn connection(source_handle: &str, target_handle: &str) -> Connection {
        Connection::new("A", source_handle, "B", target_handle)
    }

    fn full_edge() -> Edge {
        let mut edge = create_edge_at(&connection("right-source", "left-target"), 1_700_000_000_000)
            .unwrap();
        edge.animated = true;
        edge.label = "HTTP/REST".to_string();
        edge.data.request_label = "GET /users".to_string();
        edge.data.response_label = "200 OK".to_string();
        edge.data.request_parameters = vec!["id".to_string(), "page".to_string()];
        edge.data.response_parameters = vec!["users".to_string()];
        edge
    }

    #[test]
    fn validates_handle_roles() {
        assert!(is_valid_connection(&connection("right-source", "left-target")));
        assert!(!is_valid_connection(&connection("right-target", "left-target")));
        assert!(!is_valid_connection(&connection("right-source", "left-source")));
        assert!(!is_valid_connection(&Connection {
            source: "A".to_string(),
            target: "B".to_string(),
            ..Connection::default()
        }));
        assert!(!is_valid_connection(&Connection::new("", "right-source", "B", "left-target")));
    }

    #[test]
    fn created_edge_has_defaults() {
        let edge = create_edge_at(&connection("bottom-source", "top-target"), 42).unwrap();
        assert_eq!(edge.id, "eA-B-42");
        assert_eq!(edge.kind, "custom");
        assert_eq!(edge.reconnectable, Some(Reconnectable::Endpoint(EdgeEndpoint::Target)));
        assert_eq!(edge.marker_end, Some(Marker::arrow_closed()));
        assert_eq!(edge.data.direction_type, DirectionType::Unidirectional);
        assert_eq!(edge.data.connection_type, ConnectionType::None);
        assert!(edge.data.request_parameters.is_empty());
        assert!(create_edge_at(&connection("bottom-target", "top-target"), 42).is_err());
    }

    #[test]
    fn converts_handle_suffix_only() {
        assert_eq!(convert_handle_type(Some("right-source")).as_deref(), Some("right-target"));
        assert_eq!(convert_handle_type(Some("left-target")).as_deref(), Some("left-source"));
        assert_eq!(convert_handle_type(Some("custom")).as_deref(), Some("custom"));
        assert_eq!(convert_handle_type(Some("")).as_deref(), Some(""));
        assert_eq!(convert_handle_type(None), None);
    }

    #[test]
    fn reverse_swaps_endpoints_and_handles() {
        let edge = create_edge_at(&connection("right-source", "left-target"), 1).unwrap();
        let reversed = reverse(&edge);
        assert_eq!(reversed.id, edge.id);
        assert_eq!(reversed.source, "B");
        assert_eq!(reversed.target, "A");
        assert_eq!(reversed.source_handle.as_deref(), Some("left-source"));
        assert_eq!(reversed.target_handle.as_deref(), Some("right-target"));
    }

    #[test]
    fn reverse_swaps_request_and_response() {
        let edge = full_edge();
        let reversed = reverse(&edge);
        assert_eq!(reversed.data.request_label, "200 OK");
        assert_eq!(reversed.data.response_label, "GET /users");
        assert_eq!(reversed.data.request_parameters, vec!["users"]);
        assert_eq!(reversed.data.response_parameters, vec!["id", "page"]);
        assert!(reversed.animated);
        assert_eq!(reversed.label, "HTTP/REST");
        assert_eq!(reversed.marker_end, edge.marker_end);
    }

    #[test]
    fn reverse_is_an_involution() {
        let mut edge = full_edge();
        assert_eq!(reverse(&reverse(&edge)), edge);
        edge.data.direction_type = DirectionType::Bidirectional;
        update_reconnectable(&mut edge);
        assert_eq!(reverse(&reverse(&edge)), edge);

        let bare = Edge::between("e", "A", "B").with_handles("right-source", "left-target");
        assert_eq!(bare.reconnectable, None);
        assert_eq!(reverse(&bare).reconnectable, None);
        assert_eq!(reverse(&reverse(&bare)), bare);
    }

    #[test]
    fn reverse_fills_empty_labels() {
        let mut edge = full_edge();
        edge.data.request_label.clear();
        edge.data.response_label.clear();
        let reversed = reverse(&edge);
        assert_eq!(reversed.data.request_label, "response");
        assert_eq!(reversed.data.response_label, "request");
    }

    #[test]
    fn update_recomputes_reconnectable() {
        let mut edge = full_edge();
        apply_update(
            &mut edge,
            EdgeUpdate {
                label: Some("gRPC".to_string()),
                direction_type: Some(DirectionType::Bidirectional),
                ..EdgeUpdate::default()
            },
        );
        assert_eq!(edge.label, "gRPC");
        assert_eq!(edge.data.label, "gRPC");
        assert_eq!(edge.reconnectable, Some(Reconnectable::Flag(true)));
        assert_eq!(edge.data.request_label, "GET /users");
        apply_update(
            &mut edge,
            EdgeUpdate {
                direction_type: Some(DirectionType::Unidirectional),
                ..EdgeUpdate::default()
            },
        );
        assert_eq!(edge.reconnectable, Some(Reconnectable::Endpoint(EdgeEndpoint::Target)));
    }

    #[test]
    fn prunes_broken_and_dangling_edges() {
        let mut diagram = Diagram::from_parts(
            vec![
                Node::platform("A", Position::default()),
                Node::platform("B", Position::default()),
            ],
            vec![
                Edge::between("ok", "A", "B").with_handles("right-source", "left-target"),
                Edge::between("swapped", "A", "B").with_handles("right-target", "left-target"),
                Edge::between("dangling", "A", "Z").with_handles("right-source", "left-target"),
                Edge::between("bare", "B", "A"),
            ],
        );
        assert_eq!(prune_broken_edges(&mut diagram), 2);
        let ids: Vec<&str> = diagram.edges.iter().map(|edge| edge.id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "bare"]);
    }

    #[test]
    fn reconnect_flow_requires_position_before_node() {
        let edge = full_edge();
        let mut state = ReconnectState::default();
        assert!(state.begin(&edge, EdgeEndpoint::Source).is_err());
        assert_eq!(state, ReconnectState::Idle);

        state.begin(&edge, EdgeEndpoint::Target).unwrap();
        assert_eq!(state.pick_node("C"), None);
        assert!(state.is_active());

        state.choose_position(HandlePosition::Top).unwrap();
        let reconnect = state.pick_node("C").unwrap();
        assert_eq!(state, ReconnectState::Idle);
        assert_eq!(reconnect.handle, "top-target");
        assert_eq!(reconnect.node_id, "C");
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut state = ReconnectState::default();
        assert!(state.choose_position(HandlePosition::Left).is_err());
        state.begin(&full_edge(), EdgeEndpoint::Target).unwrap();
        state.choose_position(HandlePosition::Left).unwrap();
        state.cancel();
        assert_eq!(state.pick_node("A"), None);
    }

    #[test]
    fn apply_reconnect_fails_closed() {
        let mut diagram = Diagram::from_parts(
            vec![
                Node::platform("A", Position::default()),
                Node::platform("B", Position::default()),
            ],
            vec![full_edge()],
        );
        let edge_id = diagram.edges[0].id.clone();
        let before = diagram.clone();
        let bad = Reconnect {
            edge_id,
            endpoint: EdgeEndpoint::Target,
            node_id: "missing".to_string(),
            handle: "top-target".to_string(),
        };
        assert!(apply_reconnect(&mut diagram, &bad).is_err());
        assert_eq!(diagram, before);

        let good = Reconnect {
            node_id: "A".to_string(),
            ..bad
        };
        apply_reconnect(&mut diagram, &good).unwrap();
        assert_eq!(diagram.edges[0].target, "A");
        assert_eq!(diagram.edges[0].target_handle.as_deref(), Some("top-target"));
    }
}
