//! `<diagram version="1.0">` element schema.
//!
//! Free text lives in element content or attributes and is always escaped on
//! write; the reader relies on `roxmltree` for unescaping. Characters XML 1.0
//! cannot carry at all (C0 controls other than tab, LF and CR, lone
//! surrogate-range code points, U+FFFE/U+FFFF) make the writer fail with
//! `EngineError::Export`; JSON has no such limit. Edge style entries
//! are stored as `<property name value/>` pairs whose value is a JSON literal.

use std::fmt::Write as _;

use roxmltree::{Document, Node as XmlNode};
use serde_json::Value;

use super::{FORMAT_VERSION, Imported, backfill_attribute_ids, escape_attr, escape_xml, stamped};
use crate::error::{EngineError, Result};
use crate::model::{
    Attribute, ConnectionType, DEFAULT_EDGE_TYPE, DEFAULT_NODE_COLOR, DEFAULT_NODE_TYPE, Diagram,
    DirectionType, Edge, EdgeData, EdgeStyle, EdgeVisualType, Marker, MarkerKind, Metadata, Node,
    NodeData, Position, Reconnectable,
};

pub fn to_xml(diagram: &Diagram, metadata: &Metadata) -> Result<String> {
    let metadata = stamped(metadata);
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(xml, "<diagram version=\"{FORMAT_VERSION}\">");

    xml.push_str("  <metadata>\n");
    let _ = writeln!(xml, "    <name>{}</name>", escape_text(&metadata.name));
    if let Some(created) = &metadata.created {
        let _ = writeln!(xml, "    <created>{}</created>", escape_text(created));
    }
    xml.push_str("  </metadata>\n");

    xml.push_str("  <nodes>\n");
    for node in &diagram.nodes {
        write_node(&mut xml, node);
    }
    xml.push_str("  </nodes>\n");

    xml.push_str("  <edges>\n");
    for edge in &diagram.edges {
        write_edge(&mut xml, edge);
    }
    xml.push_str("  </edges>\n");

    xml.push_str("</diagram>\n");

    if let Some(bad) = xml.chars().find(|ch| !is_xml_char(*ch)) {
        return Err(EngineError::Export(format!(
            "Cannot export XML: character U+{:04X} is not allowed in XML 1.0",
            u32::from(bad)
        )));
    }
    Ok(xml)
}

fn is_xml_char(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

fn escape_text(input: &str) -> String {
    escape_xml(input).replace('\r', "&#13;")
}

fn write_node(xml: &mut String, node: &Node) {
    let _ = writeln!(
        xml,
        "    <node id=\"{}\" type=\"{}\">",
        escape_attr(&node.id),
        escape_attr(&node.kind)
    );
    let _ = writeln!(
        xml,
        "      <position x=\"{}\" y=\"{}\"/>",
        node.position.x, node.position.y
    );
    xml.push_str("      <data>\n");
    let _ = writeln!(xml, "        <name>{}</name>", escape_text(&node.data.name));
    let _ = writeln!(xml, "        <color>{}</color>", escape_text(&node.data.color));
    if !node.data.attributes.is_empty() {
        xml.push_str("        <attributes>\n");
        for attr in &node.data.attributes {
            let _ = writeln!(
                xml,
                "          <attribute id=\"{}\" key=\"{}\" value=\"{}\"/>",
                escape_attr(&attr.id),
                escape_attr(&attr.key),
                escape_attr(&attr.value)
            );
        }
        xml.push_str("        </attributes>\n");
    }
    xml.push_str("      </data>\n");
    xml.push_str("    </node>\n");
}

fn write_edge(xml: &mut String, edge: &Edge) {
    let _ = write!(
        xml,
        "    <edge id=\"{}\" source=\"{}\" target=\"{}\"",
        escape_attr(&edge.id),
        escape_attr(&edge.source),
        escape_attr(&edge.target)
    );
    if let Some(handle) = &edge.source_handle {
        let _ = write!(xml, " sourceHandle=\"{}\"", escape_attr(handle));
    }
    if let Some(handle) = &edge.target_handle {
        let _ = write!(xml, " targetHandle=\"{}\"", escape_attr(handle));
    }
    let _ = write!(
        xml,
        " label=\"{}\" animated=\"{}\" type=\"{}\"",
        escape_attr(&edge.label),
        edge.animated,
        escape_attr(&edge.kind)
    );
    if let Some(reconnectable) = edge.reconnectable {
        let _ = write!(xml, " reconnectable=\"{}\"", reconnectable.as_str());
    }
    xml.push_str(">\n");

    if let Some(marker) = &edge.marker_end {
        write_marker(xml, "markerEnd", marker);
    }
    if let Some(marker) = &edge.marker_start {
        write_marker(xml, "markerStart", marker);
    }
    if let Some(style) = &edge.style {
        xml.push_str("      <style>\n");
        for (name, value) in style {
            let _ = writeln!(
                xml,
                "        <property name=\"{}\" value=\"{}\"/>",
                escape_attr(name),
                escape_attr(&value.to_string())
            );
        }
        xml.push_str("      </style>\n");
    }

    let data = &edge.data;
    xml.push_str("      <data>\n");
    let _ = writeln!(xml, "        <label>{}</label>", escape_text(&data.label));
    let _ = writeln!(xml, "        <visualType>{}</visualType>", data.visual_type.as_str());
    let _ = writeln!(
        xml,
        "        <directionType>{}</directionType>",
        data.direction_type.as_str()
    );
    let _ = writeln!(
        xml,
        "        <connectionType>{}</connectionType>",
        data.connection_type.as_str()
    );
    let _ = writeln!(
        xml,
        "        <requestLabel>{}</requestLabel>",
        escape_text(&data.request_label)
    );
    let _ = writeln!(
        xml,
        "        <responseLabel>{}</responseLabel>",
        escape_text(&data.response_label)
    );
    write_parameters(xml, "requestParameters", &data.request_parameters);
    write_parameters(xml, "responseParameters", &data.response_parameters);
    xml.push_str("      </data>\n");
    xml.push_str("    </edge>\n");
}

fn write_marker(xml: &mut String, tag: &str, marker: &Marker) {
    let _ = write!(xml, "      <{tag} type=\"{}\"", marker.kind.as_str());
    if let Some(width) = marker.width {
        let _ = write!(xml, " width=\"{width}\"");
    }
    if let Some(height) = marker.height {
        let _ = write!(xml, " height=\"{height}\"");
    }
    if let Some(color) = &marker.color {
        let _ = write!(xml, " color=\"{}\"", escape_attr(color));
    }
    xml.push_str("/>\n");
}

fn write_parameters(xml: &mut String, tag: &str, parameters: &[String]) {
    if parameters.is_empty() {
        let _ = writeln!(xml, "        <{tag}/>");
        return;
    }
    let _ = writeln!(xml, "        <{tag}>");
    for parameter in parameters {
        let _ = writeln!(xml, "          <parameter>{}</parameter>", escape_text(parameter));
    }
    let _ = writeln!(xml, "        </{tag}>");
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::parse("XML", message)
}

fn child<'a, 'input>(node: XmlNode<'a, 'input>, tag: &str) -> Option<XmlNode<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn children<'a, 'input>(
    node: XmlNode<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = XmlNode<'a, 'input>> + 'a
where
    'input: 'a,
{
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

/// Element content, or `None` when the element is absent.
fn child_text(node: XmlNode, tag: &str) -> Option<String> {
    child(node, tag).map(|el| el.text().unwrap_or_default().to_string())
}

fn parse_number(el: XmlNode, name: &str) -> Result<f64> {
    match el.attribute(name) {
        None => Ok(0.0),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(format!("{name}=\"{raw}\" is not a number"))),
    }
}

fn parse_token<T>(raw: &str, what: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    parse(raw.trim()).ok_or_else(|| invalid(format!("unknown {what} '{raw}'")))
}

pub fn from_xml(text: &str) -> Result<Imported> {
    let doc = Document::parse(text).map_err(|err| invalid(err.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "diagram" {
        return Err(invalid(format!(
            "expected <diagram> root, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut metadata = Metadata::default();
    if let Some(meta) = child(root, "metadata") {
        if let Some(name) = child_text(meta, "name") {
            metadata.name = name;
        }
        metadata.created = child_text(meta, "created");
    }

    let nodes_el = child(root, "nodes").ok_or(EngineError::MissingCollection("nodes"))?;
    let edges_el = child(root, "edges").ok_or(EngineError::MissingCollection("edges"))?;

    let nodes = children(nodes_el, "node")
        .map(read_node)
        .collect::<Result<Vec<_>>>()?;
    let edges = children(edges_el, "edge")
        .map(read_edge)
        .collect::<Result<Vec<_>>>()?;

    let mut diagram = Diagram::from_parts(nodes, edges);
    backfill_attribute_ids(&mut diagram);
    Ok(Imported { diagram, metadata })
}

fn read_node(el: XmlNode) -> Result<Node> {
    let id = el
        .attribute("id")
        .ok_or_else(|| invalid("<node> without id"))?
        .to_string();
    let kind = el.attribute("type").unwrap_or(DEFAULT_NODE_TYPE).to_string();
    let position = match child(el, "position") {
        Some(pos) => Position::new(parse_number(pos, "x")?, parse_number(pos, "y")?),
        None => Position::default(),
    };

    let mut data = NodeData::default();
    if let Some(data_el) = child(el, "data") {
        if let Some(name) = child_text(data_el, "name") {
            data.name = name;
        }
        data.color = child_text(data_el, "color")
            .filter(|color| !color.is_empty())
            .unwrap_or_else(|| DEFAULT_NODE_COLOR.to_string());
        if let Some(attrs) = child(data_el, "attributes") {
            data.attributes = children(attrs, "attribute")
                .map(|attr| Attribute {
                    id: attr.attribute("id").unwrap_or_default().to_string(),
                    key: attr.attribute("key").unwrap_or_default().to_string(),
                    value: attr.attribute("value").unwrap_or_default().to_string(),
                })
                .collect();
        }
    }

    Ok(Node {
        id,
        kind,
        position,
        data,
    })
}

fn read_edge(el: XmlNode) -> Result<Edge> {
    let required = |name: &str| {
        el.attribute(name)
            .map(str::to_string)
            .ok_or_else(|| invalid(format!("<edge> without {name}")))
    };
    let mut edge = Edge::between(required("id")?, required("source")?, required("target")?);
    edge.source_handle = el.attribute("sourceHandle").map(str::to_string);
    edge.target_handle = el.attribute("targetHandle").map(str::to_string);
    edge.label = el.attribute("label").unwrap_or_default().to_string();
    edge.animated = el.attribute("animated") == Some("true");
    edge.kind = el.attribute("type").unwrap_or(DEFAULT_EDGE_TYPE).to_string();
    edge.reconnectable = el
        .attribute("reconnectable")
        .map(|raw| parse_token(raw, "reconnectable value", Reconnectable::from_token))
        .transpose()?;
    edge.marker_end = child(el, "markerEnd").map(read_marker).transpose()?;
    edge.marker_start = child(el, "markerStart").map(read_marker).transpose()?;
    edge.style = child(el, "style").map(read_style);
    if let Some(data_el) = child(el, "data") {
        edge.data = read_edge_data(data_el)?;
    }
    Ok(edge)
}

fn read_marker(el: XmlNode) -> Result<Marker> {
    let kind = parse_token(
        el.attribute("type").unwrap_or("arrowclosed"),
        "marker type",
        MarkerKind::from_token,
    )?;
    let number = |name: &str| -> Result<Option<f64>> {
        match el.attribute(name) {
            Some(_) => parse_number(el, name).map(Some),
            None => Ok(None),
        }
    };
    Ok(Marker {
        kind,
        width: number("width")?,
        height: number("height")?,
        color: el.attribute("color").map(str::to_string),
    })
}

fn read_style(el: XmlNode) -> EdgeStyle {
    children(el, "property")
        .filter_map(|prop| {
            let name = prop.attribute("name")?.to_string();
            let raw = prop.attribute("value").unwrap_or_default();
            let value = serde_json::from_str::<Value>(raw)
                .unwrap_or_else(|_| Value::String(raw.to_string()));
            Some((name, value))
        })
        .collect()
}

fn read_edge_data(el: XmlNode) -> Result<EdgeData> {
    let mut data = EdgeData::default();
    if let Some(label) = child_text(el, "label") {
        data.label = label;
    }
    if let Some(raw) = child_text(el, "visualType") {
        data.visual_type = parse_token(&raw, "visual type", EdgeVisualType::from_token)?;
    }
    if let Some(raw) = child_text(el, "directionType") {
        data.direction_type = parse_token(&raw, "direction type", DirectionType::from_token)?;
    }
    if let Some(raw) = child_text(el, "connectionType") {
        data.connection_type = parse_token(&raw, "connection type", ConnectionType::from_token)?;
    }
    if let Some(label) = child_text(el, "requestLabel") {
        data.request_label = label;
    }
    if let Some(label) = child_text(el, "responseLabel") {
        data.response_label = label;
    }
    if let Some(params) = child(el, "requestParameters") {
        data.request_parameters = read_parameters(params);
    }
    if let Some(params) = child(el, "responseParameters") {
        data.response_parameters = read_parameters(params);
    }
    Ok(data)
}

fn read_parameters(el: XmlNode) -> Vec<String> {
    children(el, "parameter")
        .map(|param| param.text().unwrap_or_default().to_string())
        .collect()
}
