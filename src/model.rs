use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_NODE_COLOR: &str = "#3b82f6";
pub const DEFAULT_NODE_TYPE: &str = "platform";
pub const DEFAULT_EDGE_TYPE: &str = "custom";
pub const DEFAULT_DIAGRAM_NAME: &str = "Untitled Diagram";
pub const DEFAULT_REQUEST_LABEL: &str = "request";
pub const DEFAULT_RESPONSE_LABEL: &str = "response";

/// Named colours offered for platforms, in palette order.
pub const NODE_COLORS: [(&str, &str); 10] = [
    ("Blue", "#3b82f6"),
    ("Green", "#22c55e"),
    ("Purple", "#8b5cf6"),
    ("Orange", "#f97316"),
    ("Pink", "#ec4899"),
    ("Teal", "#14b8a6"),
    ("Red", "#ef4444"),
    ("Indigo", "#6366f1"),
    ("Yellow", "#eab308"),
    ("Gray", "#64748b"),
];

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(top|right|bottom|left)-(source|target)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Attribute {
    pub fn new(id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default = "default_node_name")]
    pub name: String,
    #[serde(default = "default_node_color")]
    pub color: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            color: default_node_color(),
            attributes: Vec::new(),
        }
    }
}

/// A platform vertex. Addressed by its top-left `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type", default = "default_node_type")]
    pub kind: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    /// A fresh platform the way the editor creates one: `Platform <id>`,
    /// default colour, no attributes.
    pub fn platform(id: impl Into<String>, position: Position) -> Self {
        let id = id.into();
        Self {
            data: NodeData {
                name: format!("Platform {id}"),
                color: DEFAULT_NODE_COLOR.to_string(),
                attributes: Vec::new(),
            },
            id,
            kind: DEFAULT_NODE_TYPE.to_string(),
            position,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.data.name = name.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.data.color = color.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let id = format!("attr-{}-{}", self.id, self.data.attributes.len());
        self.data.attributes.push(Attribute::new(id, key, value));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlePosition {
    Top,
    Right,
    Bottom,
    Left,
}

impl HandlePosition {
    pub const ALL: [HandlePosition; 4] = [Self::Top, Self::Right, Self::Bottom, Self::Left];

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "top" => Some(Self::Top),
            "right" => Some(Self::Right),
            "bottom" => Some(Self::Bottom),
            "left" => Some(Self::Left),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Left => "left",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleRole {
    Source,
    Target,
}

impl HandleRole {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Source => "-source",
            Self::Target => "-target",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Source => Self::Target,
            Self::Target => Self::Source,
        }
    }

    /// Role encoded in a handle id's suffix, whatever its position part.
    pub fn of(handle_id: &str) -> Option<Self> {
        if handle_id.ends_with(Self::Source.suffix()) {
            Some(Self::Source)
        } else if handle_id.ends_with(Self::Target.suffix()) {
            Some(Self::Target)
        } else {
            None
        }
    }
}

/// A connection point: `<position>-<role>`, e.g. `right-source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub position: HandlePosition,
    pub role: HandleRole,
}

impl Handle {
    pub fn new(position: HandlePosition, role: HandleRole) -> Self {
        Self { position, role }
    }

    pub fn parse(handle_id: &str) -> Option<Self> {
        let caps = HANDLE_RE.captures(handle_id)?;
        let position = HandlePosition::from_token(caps.get(1)?.as_str())?;
        let role = match caps.get(2)?.as_str() {
            "source" => HandleRole::Source,
            _ => HandleRole::Target,
        };
        Some(Self { position, role })
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.position.as_str(), self.role.suffix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionType {
    #[default]
    Unidirectional,
    Bidirectional,
}

impl DirectionType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "unidirectional" => Some(Self::Unidirectional),
            "bidirectional" => Some(Self::Bidirectional),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unidirectional => "unidirectional",
            Self::Bidirectional => "bidirectional",
        }
    }
}

/// Whether a unidirectional edge reads as a request or a response. Purely
/// presentational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    None,
    Request,
    Response,
}

impl ConnectionType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "none" => Some(Self::None),
            "request" => Some(Self::Request),
            "response" => Some(Self::Response),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeVisualType {
    #[default]
    Smoothstep,
    Straight,
    #[serde(alias = "default")]
    Bezier,
}

impl EdgeVisualType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "smoothstep" => Some(Self::Smoothstep),
            "straight" => Some(Self::Straight),
            "bezier" | "default" => Some(Self::Bezier),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Smoothstep => "smoothstep",
            Self::Straight => "straight",
            Self::Bezier => "bezier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeEndpoint {
    Source,
    Target,
}

impl EdgeEndpoint {
    pub fn role(self) -> HandleRole {
        match self {
            Self::Source => HandleRole::Source,
            Self::Target => HandleRole::Target,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

/// Which endpoints may be re-dragged. Serialized the way the canvas expects
/// it: a boolean for all-or-nothing, or the name of the single endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reconnectable {
    Flag(bool),
    Endpoint(EdgeEndpoint),
}

impl Reconnectable {
    pub fn allows(self, endpoint: EdgeEndpoint) -> bool {
        match self {
            Self::Flag(flag) => flag,
            Self::Endpoint(allowed) => allowed == endpoint,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "true" => Some(Self::Flag(true)),
            "false" => Some(Self::Flag(false)),
            "source" => Some(Self::Endpoint(EdgeEndpoint::Source)),
            "target" => Some(Self::Endpoint(EdgeEndpoint::Target)),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag(true) => "true",
            Self::Flag(false) => "false",
            Self::Endpoint(endpoint) => endpoint.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Arrow,
    ArrowClosed,
}

impl MarkerKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "arrow" => Some(Self::Arrow),
            "arrowclosed" => Some(Self::ArrowClosed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arrow => "arrow",
            Self::ArrowClosed => "arrowclosed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Marker {
    pub fn arrow_closed() -> Self {
        Self {
            kind: MarkerKind::ArrowClosed,
            width: Some(20.0),
            height: Some(20.0),
            color: None,
        }
    }
}

/// Inline CSS-like style carried verbatim for the canvas.
pub type EdgeStyle = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub visual_type: EdgeVisualType,
    #[serde(default)]
    pub direction_type: DirectionType,
    #[serde(default)]
    pub connection_type: ConnectionType,
    #[serde(default = "default_request_label")]
    pub request_label: String,
    #[serde(default = "default_response_label")]
    pub response_label: String,
    #[serde(default)]
    pub request_parameters: Vec<String>,
    #[serde(default)]
    pub response_parameters: Vec<String>,
}

impl Default for EdgeData {
    fn default() -> Self {
        Self {
            label: String::new(),
            visual_type: EdgeVisualType::default(),
            direction_type: DirectionType::default(),
            connection_type: ConnectionType::default(),
            request_label: default_request_label(),
            response_label: default_response_label(),
            request_parameters: Vec::new(),
            response_parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(rename = "type", default = "default_edge_type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnectable: Option<Reconnectable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_end: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_start: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
    #[serde(default)]
    pub data: EdgeData,
}

impl Edge {
    /// Bare edge between two nodes with no handles and default data.
    pub fn between(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            kind: DEFAULT_EDGE_TYPE.to_string(),
            label: String::new(),
            animated: false,
            reconnectable: None,
            marker_end: None,
            marker_start: None,
            style: None,
            data: EdgeData::default(),
        }
    }

    pub fn with_handles(mut self, source_handle: &str, target_handle: &str) -> Self {
        self.source_handle = Some(source_handle.to_string());
        self.target_handle = Some(target_handle.to_string());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Free-form document metadata. `name` and `created` are the known keys;
/// anything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default = "default_diagram_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::named(DEFAULT_DIAGRAM_NAME)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagram {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|edge| edge.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// `max(numeric ids) + 1`. Only ids that are entirely an unsigned decimal
    /// count, so `"-3"` or `"12abc"` are ignored rather than read by prefix.
    /// When the maximum is `u64::MAX` the smallest free positive id is used.
    pub fn next_node_id(&self) -> String {
        let max_id = self
            .nodes
            .iter()
            .filter_map(|node| node.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        if let Some(next) = max_id.checked_add(1) {
            return next.to_string();
        }
        (1u64..)
            .map(|candidate| candidate.to_string())
            .find(|candidate| !self.contains_node(candidate))
            .unwrap_or_default()
    }

    /// The three-platform demo diagram the editor ships with.
    pub fn sample() -> Self {
        let mut frontend = Node::platform("1", Position::new(100.0, 100.0))
            .with_name("Frontend App")
            .with_color("#3b82f6");
        let mut gateway = Node::platform("2", Position::new(500.0, 100.0))
            .with_name("API Gateway")
            .with_color("#8b5cf6");
        let mut database = Node::platform("3", Position::new(500.0, 350.0))
            .with_name("PostgreSQL")
            .with_color("#22c55e");

        frontend.data.attributes = vec![
            Attribute::new("attr1", "Framework", "React"),
            Attribute::new("attr2", "Port", "3000"),
        ];
        gateway.data.attributes = vec![
            Attribute::new("attr3", "Type", "REST"),
            Attribute::new("attr4", "Auth", "JWT"),
        ];
        database.data.attributes = vec![
            Attribute::new("attr5", "Type", "Database"),
            Attribute::new("attr6", "Port", "5432"),
        ];

        let mut http = Edge::between("e1-2", "1", "2")
            .with_handles("right-source", "left-target")
            .with_label("HTTP/REST");
        http.animated = true;
        http.kind = "smoothstep".to_string();
        let mut sql = Edge::between("e2-3", "2", "3")
            .with_handles("bottom-source", "top-target")
            .with_label("SQL Queries");
        sql.kind = "smoothstep".to_string();

        Self {
            nodes: vec![frontend, gateway, database],
            edges: vec![http, sql],
        }
    }
}

fn default_node_name() -> String {
    "Unnamed".to_string()
}

fn default_node_color() -> String {
    DEFAULT_NODE_COLOR.to_string()
}

fn default_node_type() -> String {
    DEFAULT_NODE_TYPE.to_string()
}

fn default_edge_type() -> String {
    DEFAULT_EDGE_TYPE.to_string()
}

fn default_request_label() -> String {
    DEFAULT_REQUEST_LABEL.to_string()
}

fn default_response_label() -> String {
    DEFAULT_RESPONSE_LABEL.to_string()
}

fn default_diagram_name() -> String {
    DEFAULT_DIAGRAM_NAME.to_string()
}
