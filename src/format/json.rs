use serde::{Deserialize, Serialize};

use super::{FORMAT_VERSION, Imported, backfill_attribute_ids, stamped};
use crate::error::{EngineError, Result};
use crate::model::{Diagram, Edge, Metadata, Node};

#[derive(Serialize)]
struct DiagramFileOut<'a> {
    version: &'a str,
    metadata: &'a Metadata,
    nodes: &'a [Node],
    edges: &'a [Edge],
}

#[derive(Deserialize)]
struct DiagramFileIn {
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    nodes: Option<Vec<Node>>,
    #[serde(default)]
    edges: Option<Vec<Edge>>,
}

/// Pretty-printed `{version, metadata, nodes, edges}` document.
pub fn to_json(diagram: &Diagram, metadata: &Metadata) -> Result<String> {
    let metadata = stamped(metadata);
    let file = DiagramFileOut {
        version: FORMAT_VERSION,
        metadata: &metadata,
        nodes: &diagram.nodes,
        edges: &diagram.edges,
    };
    serde_json::to_string_pretty(&file).map_err(|err| EngineError::parse("JSON", err.to_string()))
}

/// The bare `{nodes, edges}` payload, compact, as embedded in HTML exports.
pub fn to_payload(diagram: &Diagram) -> Result<String> {
    serde_json::to_string(diagram).map_err(|err| EngineError::parse("JSON", err.to_string()))
}

pub fn from_json(text: &str) -> Result<Imported> {
    let file: DiagramFileIn =
        serde_json::from_str(text).map_err(|err| EngineError::parse("JSON", err.to_string()))?;
    let nodes = file.nodes.ok_or(EngineError::MissingCollection("nodes"))?;
    let edges = file.edges.ok_or(EngineError::MissingCollection("edges"))?;
    let mut diagram = Diagram::from_parts(nodes, edges);
    backfill_attribute_ids(&mut diagram);
    Ok(Imported {
        diagram,
        metadata: file.metadata.unwrap_or_default(),
    })
}
