use archgraph::config::NodeMetrics;
use archgraph::edge::reverse;
use archgraph::format::{Format, Imported, export, import};
use archgraph::layout::{LayoutDirection, layout};
use archgraph::model::Edge;
use archgraph::render::render_svg;
use archgraph::theme::Theme;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SvgOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
}

fn build_theme(options: SvgOptions) -> Theme {
    let mut theme = if options.theme.as_deref() == Some("dark") {
        Theme::dark()
    } else {
        Theme::modern()
    };

    if let Some(font_family) = options.font_family {
        theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        theme.font_size = font_size;
    }

    theme
}

fn js_error(error: impl ToString) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn parse_target(to: &str) -> Result<Format, JsValue> {
    match Format::from_token(to) {
        Some(Format::Auto) | None => Err(js_error(format!("unsupported target format '{to}'"))),
        Some(format) => Ok(format),
    }
}

/// Reads JSON or XML and writes it back as `to` (`json` or `xml`).
#[wasm_bindgen]
pub fn convert_diagram(text: &str, to: &str) -> Result<String, JsValue> {
    let format = parse_target(to)?;
    let Imported { diagram, metadata } = import(text, Format::Auto).map_err(js_error)?;
    export(&diagram, &metadata, format).map_err(js_error)
}

/// Lays the diagram out in `direction` (`TB`, `LR`, `RL`, `BT`) and returns
/// it as JSON.
#[wasm_bindgen]
pub fn layout_diagram(text: &str, direction: &str) -> Result<String, JsValue> {
    let direction = LayoutDirection::from_token(direction)
        .ok_or_else(|| js_error(format!("unknown direction '{direction}'")))?;
    let Imported {
        mut diagram,
        metadata,
    } = import(text, Format::Auto).map_err(js_error)?;
    diagram.nodes = layout(&diagram.nodes, &diagram.edges, direction);
    export(&diagram, &metadata, Format::Json).map_err(js_error)
}

/// Takes one edge as JSON and returns its reversal as JSON.
#[wasm_bindgen]
pub fn reverse_edge(edge_json: &str) -> Result<String, JsValue> {
    let edge: Edge = serde_json::from_str(edge_json).map_err(js_error)?;
    serde_json::to_string(&reverse(&edge)).map_err(js_error)
}

#[wasm_bindgen]
pub fn render_diagram_svg(text: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<SvgOptions>(&raw_options).map_err(js_error)?
    } else {
        SvgOptions::default()
    };

    let imported = import(text, Format::Auto).map_err(js_error)?;
    Ok(render_svg(
        &imported.diagram,
        &build_theme(options),
        &NodeMetrics::default(),
    ))
}
