use crate::collision::{Rect, node_rect};
use crate::config::{NodeMetrics, RenderConfig};
use crate::error::{EngineError, Result as EngineResult};
use crate::format::escape_xml;
use crate::host::{ImageFormat, Rasterizer};
use crate::model::{
    ConnectionType, Diagram, DirectionType, Edge, EdgeVisualType, Handle, HandlePosition, HandleRole,
    Node,
};
use crate::theme::Theme;
use anyhow::Result;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

const CANVAS_MARGIN: f64 = 40.0;
const HEADER_HEIGHT: f64 = 40.0;
const ROW_HEIGHT: f64 = 28.0;
const PARALLEL_OFFSET: f64 = 6.0;
const STEP_STUB: f64 = 24.0;

pub fn render_svg(diagram: &Diagram, theme: &Theme, metrics: &NodeMetrics) -> String {
    let rects: HashMap<&str, Rect> = diagram
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), node_rect(node, metrics)))
        .collect();

    let (min_x, min_y, max_x, max_y) = bounds(rects.values());
    let view_x = min_x - CANVAS_MARGIN;
    let view_y = min_y - CANVAS_MARGIN;
    let width = (max_x - min_x + CANVAS_MARGIN * 2.0).max(200.0);
    let height = (max_y - min_y + CANVAS_MARGIN * 2.0).max(200.0);

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"{view_x:.2} {view_y:.2} {width:.2} {height:.2}\">",
    );
    let _ = write!(
        svg,
        "<rect x=\"{view_x:.2}\" y=\"{view_y:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    );

    svg.push_str("<defs>");
    for (id, color) in [
        ("arrow-line", &theme.line_color),
        ("arrow-request", &theme.request_color),
        ("arrow-response", &theme.response_color),
    ] {
        let _ = write!(
            svg,
            "<marker id=\"{id}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"7\" markerHeight=\"7\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{color}\"/></marker>"
        );
    }
    svg.push_str("</defs>");

    for edge in &diagram.edges {
        let (Some(source), Some(target)) = (
            rects.get(edge.source.as_str()),
            rects.get(edge.target.as_str()),
        ) else {
            continue;
        };
        render_edge(&mut svg, edge, source, target, theme);
    }

    for node in &diagram.nodes {
        if let Some(rect) = rects.get(node.id.as_str()) {
            render_node(&mut svg, node, rect, theme);
        }
    }

    svg.push_str("</svg>");
    svg
}

fn bounds<'a>(rects: impl Iterator<Item = &'a Rect>) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for rect in rects {
        min_x = min_x.min(rect.x);
        min_y = min_y.min(rect.y);
        max_x = max_x.max(rect.x + rect.width);
        max_y = max_y.max(rect.y + rect.height);
    }
    if !min_x.is_finite() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    (min_x, min_y, max_x, max_y)
}

fn render_node(svg: &mut String, node: &Node, rect: &Rect, theme: &Theme) {
    let _ = write!(
        svg,
        "<g class=\"platform\" data-id=\"{}\">",
        escape_xml(&node.id)
    );
    let _ = write!(
        svg,
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
        rect.x, rect.y, rect.width, rect.height, theme.node_fill, theme.node_border
    );
    let color = escape_xml(&node.data.color);
    let _ = write!(
        svg,
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{HEADER_HEIGHT:.2}\" rx=\"8\" ry=\"8\" fill=\"{color}\"/>",
        rect.x, rect.y, rect.width
    );
    // Square off the header's lower corners.
    let _ = write!(
        svg,
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"8\" fill=\"{color}\"/>",
        rect.x,
        rect.y + HEADER_HEIGHT - 8.0,
        rect.width
    );
    let _ = write!(
        svg,
        "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" font-weight=\"600\" fill=\"{}\">{}</text>",
        rect.x + 14.0,
        rect.y + HEADER_HEIGHT / 2.0 + theme.font_size as f64 * 0.35,
        escape_xml(&theme.font_family),
        theme.font_size + 1.0,
        theme.header_text_color,
        escape_xml(&node.data.name)
    );
    for (idx, attr) in node.data.attributes.iter().enumerate() {
        let y = rect.y + HEADER_HEIGHT + 24.0 + idx as f64 * ROW_HEIGHT;
        let _ = write!(
            svg,
            "<text x=\"{:.2}\" y=\"{y:.2}\" font-family=\"{}\" font-size=\"{}\"><tspan fill=\"{}\">{}: </tspan><tspan fill=\"{}\">{}</tspan></text>",
            rect.x + 14.0,
            escape_xml(&theme.font_family),
            theme.font_size,
            theme.muted_text_color,
            escape_xml(&attr.key),
            theme.text_color,
            escape_xml(&attr.value)
        );
    }
    svg.push_str("</g>");
}

fn default_position(role: HandleRole) -> HandlePosition {
    match role {
        HandleRole::Source => HandlePosition::Right,
        HandleRole::Target => HandlePosition::Left,
    }
}

fn handle_position(handle: Option<&str>, role: HandleRole) -> HandlePosition {
    handle
        .and_then(Handle::parse)
        .map(|handle| handle.position)
        .unwrap_or_else(|| default_position(role))
}

fn anchor(rect: &Rect, position: HandlePosition) -> (f64, f64) {
    match position {
        HandlePosition::Top => (rect.x + rect.width / 2.0, rect.y),
        HandlePosition::Right => (rect.x + rect.width, rect.y + rect.height / 2.0),
        HandlePosition::Bottom => (rect.x + rect.width / 2.0, rect.y + rect.height),
        HandlePosition::Left => (rect.x, rect.y + rect.height / 2.0),
    }
}

fn normal(position: HandlePosition) -> (f64, f64) {
    match position {
        HandlePosition::Top => (0.0, -1.0),
        HandlePosition::Right => (1.0, 0.0),
        HandlePosition::Bottom => (0.0, 1.0),
        HandlePosition::Left => (-1.0, 0.0),
    }
}

fn render_edge(svg: &mut String, edge: &Edge, source: &Rect, target: &Rect, theme: &Theme) {
    let source_side = handle_position(edge.source_handle.as_deref(), HandleRole::Source);
    let target_side = handle_position(edge.target_handle.as_deref(), HandleRole::Target);
    let start = anchor(source, source_side);
    let end = anchor(target, target_side);
    let visual = edge.data.visual_type;

    let _ = write!(svg, "<g class=\"edge\" data-id=\"{}\">", escape_xml(&edge.id));
    match edge.data.direction_type {
        DirectionType::Unidirectional => {
            let (color, marker, dashed) = match edge.data.connection_type {
                ConnectionType::None => (&theme.line_color, "arrow-line", false),
                ConnectionType::Request => (&theme.request_color, "arrow-request", false),
                ConnectionType::Response => (&theme.response_color, "arrow-response", true),
            };
            let d = edge_path(visual, start, source_side, end, target_side, (0.0, 0.0));
            push_path(svg, &d, color, marker, dashed, edge.animated);
        }
        DirectionType::Bidirectional => {
            let (nx, ny) = perpendicular(start, end);
            let up = (nx * PARALLEL_OFFSET, ny * PARALLEL_OFFSET);
            let down = (-up.0, -up.1);
            let request = edge_path(visual, start, source_side, end, target_side, up);
            push_path(svg, &request, &theme.request_color, "arrow-request", false, edge.animated);
            let response = edge_path(visual, end, target_side, start, source_side, down);
            push_path(svg, &response, &theme.response_color, "arrow-response", true, edge.animated);
        }
    }

    let mid = ((start.0 + end.0) / 2.0, (start.1 + end.1) / 2.0);
    let label = if edge.label.is_empty() {
        edge.data.label.as_str()
    } else {
        edge.label.as_str()
    };
    if !label.is_empty() {
        push_label(svg, mid, label, &theme.text_color, theme);
    }
    if edge.data.direction_type == DirectionType::Bidirectional {
        let (nx, ny) = perpendicular(start, end);
        let offset = theme.font_size as f64 * 1.8;
        let request_at = (mid.0 + nx * offset, mid.1 + ny * offset);
        let response_at = (mid.0 - nx * offset, mid.1 - ny * offset);
        push_label(svg, request_at, &edge.data.request_label, &theme.request_color, theme);
        push_label(svg, response_at, &edge.data.response_label, &theme.response_color, theme);
    }
    svg.push_str("</g>");
}

fn perpendicular(start: (f64, f64), end: (f64, f64)) -> (f64, f64) {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return (0.0, -1.0);
    }
    (-dy / len, dx / len)
}

fn edge_path(
    visual: EdgeVisualType,
    start: (f64, f64),
    start_side: HandlePosition,
    end: (f64, f64),
    end_side: HandlePosition,
    shift: (f64, f64),
) -> String {
    let start = (start.0 + shift.0, start.1 + shift.1);
    let end = (end.0 + shift.0, end.1 + shift.1);
    match visual {
        EdgeVisualType::Straight => points_to_path(&[start, end]),
        EdgeVisualType::Bezier => {
            let dist = ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt();
            let pull = (dist * 0.4).max(40.0);
            let (sx, sy) = normal(start_side);
            let (ex, ey) = normal(end_side);
            format!(
                "M {:.2} {:.2} C {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
                start.0,
                start.1,
                start.0 + sx * pull,
                start.1 + sy * pull,
                end.0 + ex * pull,
                end.1 + ey * pull,
                end.0,
                end.1
            )
        }
        EdgeVisualType::Smoothstep => {
            let (sx, sy) = normal(start_side);
            let (ex, ey) = normal(end_side);
            let a = (start.0 + sx * STEP_STUB, start.1 + sy * STEP_STUB);
            let b = (end.0 + ex * STEP_STUB, end.1 + ey * STEP_STUB);
            let horizontal = matches!(start_side, HandlePosition::Left | HandlePosition::Right);
            let middle = if horizontal {
                let mx = (a.0 + b.0) / 2.0;
                [(mx, a.1), (mx, b.1)]
            } else {
                let my = (a.1 + b.1) / 2.0;
                [(a.0, my), (b.0, my)]
            };
            points_to_path(&[start, a, middle[0], middle[1], b, end])
        }
    }
}

fn push_path(svg: &mut String, d: &str, color: &str, marker: &str, dashed: bool, animated: bool) {
    let dash = if dashed || animated {
        " stroke-dasharray=\"6 4\""
    } else {
        ""
    };
    let _ = write!(
        svg,
        "<path d=\"{d}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"1.6\"{dash} marker-end=\"url(#{marker})\"/>"
    );
}

fn push_label(svg: &mut String, at: (f64, f64), text: &str, color: &str, theme: &Theme) {
    let font_size = theme.font_size as f64;
    let width = text.chars().count() as f64 * font_size * 0.6 + 12.0;
    let height = font_size + 8.0;
    let _ = write!(
        svg,
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" rx=\"4\" ry=\"4\" fill=\"{}\" stroke=\"{color}\" stroke-width=\"0.8\"/>",
        at.0 - width / 2.0,
        at.1 - height / 2.0,
        theme.edge_label_background
    );
    let _ = write!(
        svg,
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{color}\">{}</text>",
        at.0,
        at.1 + font_size * 0.35,
        escape_xml(&theme.font_family),
        theme.font_size,
        escape_xml(text)
    );
}

fn points_to_path(points: &[(f64, f64)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    let _ = write!(d, "M {:.2} {:.2}", points[0].0, points[0].1);
    for point in points.iter().skip(1) {
        let _ = write!(d, " L {:.2} {:.2}", point.0, point.1);
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn rasterize_png(svg: &str, render_cfg: &RenderConfig) -> Result<Vec<u8>> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| anyhow::anyhow!("invalid render size"))?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let scale = if render_cfg.scale > 0.0 { render_cfg.scale } else { 1.0 };
    let width = (size.width() as f32 * scale).ceil() as u32;
    let height = (size.height() as f32 * scale).ceil() as u32;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap_mut,
    );
    Ok(pixmap.encode_png()?)
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let bytes = rasterize_png(svg, render_cfg)?;
    std::fs::write(output, bytes)?;
    Ok(())
}

/// Built-in rasterizer: SVG always, PNG when built with the `png` feature.
#[derive(Debug, Clone, Default)]
pub struct SvgRasterizer {
    pub theme: Theme,
    pub metrics: NodeMetrics,
    pub render: RenderConfig,
}

impl SvgRasterizer {
    pub fn new(theme: Theme, metrics: NodeMetrics, render: RenderConfig) -> Self {
        Self {
            theme,
            metrics,
            render,
        }
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, diagram: &Diagram, format: ImageFormat) -> EngineResult<Vec<u8>> {
        let svg = render_svg(diagram, &self.theme, &self.metrics);
        match format {
            ImageFormat::Svg => Ok(svg.into_bytes()),
            #[cfg(feature = "png")]
            ImageFormat::Png => {
                rasterize_png(&svg, &self.render).map_err(|err| EngineError::Export(err.to_string()))
            }
            #[cfg(not(feature = "png"))]
            ImageFormat::Png => Err(EngineError::Export(
                "PNG output requires the png feature".to_string(),
            )),
            ImageFormat::Jpeg | ImageFormat::Pdf => Err(EngineError::Export(format!(
                "{} output is not supported by the built-in rasterizer",
                format.as_str().to_ascii_uppercase()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{Connection, create_edge_at};

    #[test]
    fn render_sample_diagram() {
        let svg = render_svg(&Diagram::sample(), &Theme::modern(), &NodeMetrics::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Frontend App"));
        assert!(svg.contains("Framework: "));
        assert!(svg.contains("HTTP/REST"));
        assert_eq!(svg.matches("class=\"platform\"").count(), 3);
    }

    #[test]
    fn bidirectional_edges_draw_two_lines() {
        let mut diagram = Diagram::sample();
        let mut edge =
            create_edge_at(&Connection::new("1", "bottom-source", "3", "left-target"), 5).unwrap();
        edge.data.direction_type = DirectionType::Bidirectional;
        diagram.edges = vec![edge];
        let svg = render_svg(&diagram, &Theme::modern(), &NodeMetrics::default());
        assert!(svg.contains("url(#arrow-request)"));
        assert!(svg.contains("url(#arrow-response)"));
        assert_eq!(svg.matches("fill=\"none\"").count(), 2);
    }

    #[test]
    fn escapes_node_text() {
        let mut diagram = Diagram::sample();
        diagram.nodes[0].data.name = "<script>".to_string();
        let svg = render_svg(&diagram, &Theme::dark(), &NodeMetrics::default());
        assert!(svg.contains("&lt;script&gt;"));
        assert!(!svg.contains("<script>"));
    }

    #[test]
    fn empty_diagram_still_renders() {
        let svg = render_svg(&Diagram::new(), &Theme::modern(), &NodeMetrics::default());
        assert!(svg.contains("width=\"200.00\""));
    }

    #[test]
    fn rasterizer_rejects_unsupported_formats() {
        let rasterizer = SvgRasterizer::default();
        let diagram = Diagram::sample();
        let bytes = rasterizer.rasterize(&diagram, ImageFormat::Svg).unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("<svg"));
        assert!(matches!(
            rasterizer.rasterize(&diagram, ImageFormat::Pdf),
            Err(EngineError::Export(_))
        ));
    }
}
