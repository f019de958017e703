use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Footprint rules for a platform box. Height grows with the attribute list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub width: f64,
    pub base_height: f64,
    pub attribute_height: f64,
    pub padding: f64,
    pub min_height: f64,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            width: 250.0,
            base_height: 120.0,
            attribute_height: 28.0,
            padding: 40.0,
            min_height: 150.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionConfig {
    pub padding: f64,
    pub step: f64,
    pub max_iterations: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            padding: 20.0,
            step: 20.0,
            max_iterations: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_spacing: f64,
    pub rank_spacing: f64,
    pub margin_x: f64,
    pub margin_y: f64,
    pub order_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: 100.0,
            rank_spacing: 150.0,
            margin_x: 50.0,
            margin_y: 50.0,
            order_passes: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    /// Pixel ratio used when rasterizing.
    pub scale: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
            scale: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub collision: CollisionConfig,
    pub metrics: NodeMetrics,
    pub history: HistoryConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::modern();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            collision: CollisionConfig::default(),
            metrics: NodeMetrics::default(),
            history: HistoryConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    node_fill: Option<String>,
    node_border: Option<String>,
    text_color: Option<String>,
    line_color: Option<String>,
    request_color: Option<String>,
    response_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    node_spacing: Option<f64>,
    rank_spacing: Option<f64>,
    margin_x: Option<f64>,
    margin_y: Option<f64>,
    order_passes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollisionConfigFile {
    padding: Option<f64>,
    step: Option<f64>,
    max_iterations: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeMetricsFile {
    width: Option<f64>,
    base_height: Option<f64>,
    attribute_height: Option<f64>,
    padding: Option<f64>,
    min_height: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    scale: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    collision: Option<CollisionConfigFile>,
    node: Option<NodeMetricsFile>,
    max_history: Option<usize>,
    render: Option<RenderConfigFile>,
}

/// Loads a camelCase JSON (or JSON5) override file on top of the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "modern" | "default" | "light" => config.theme = Theme::modern(),
            "dark" => config.theme = Theme::dark(),
            other => anyhow::bail!("unknown theme '{other}'"),
        }
        config.render.background = config.theme.background.clone();
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.background {
            config.render.background = v.clone();
            config.theme.background = v;
        }
        if let Some(v) = vars.node_fill {
            config.theme.node_fill = v;
        }
        if let Some(v) = vars.node_border {
            config.theme.node_border = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.request_color {
            config.theme.request_color = v;
        }
        if let Some(v) = vars.response_color {
            config.theme.response_color = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.node_spacing {
            config.layout.node_spacing = v;
        }
        if let Some(v) = layout.rank_spacing {
            config.layout.rank_spacing = v;
        }
        if let Some(v) = layout.margin_x {
            config.layout.margin_x = v;
        }
        if let Some(v) = layout.margin_y {
            config.layout.margin_y = v;
        }
        if let Some(v) = layout.order_passes {
            config.layout.order_passes = v;
        }
    }

    if let Some(collision) = parsed.collision {
        if let Some(v) = collision.padding {
            config.collision.padding = v;
        }
        if let Some(v) = collision.step {
            config.collision.step = v;
        }
        if let Some(v) = collision.max_iterations {
            config.collision.max_iterations = v;
        }
    }

    if let Some(node) = parsed.node {
        if let Some(v) = node.width {
            config.metrics.width = v;
        }
        if let Some(v) = node.base_height {
            config.metrics.base_height = v;
        }
        if let Some(v) = node.attribute_height {
            config.metrics.attribute_height = v;
        }
        if let Some(v) = node.padding {
            config.metrics.padding = v;
        }
        if let Some(v) = node.min_height {
            config.metrics.min_height = v;
        }
    }

    if let Some(max_history) = parsed.max_history {
        if max_history == 0 {
            anyhow::bail!("maxHistory must be at least 1");
        }
        config.history.max_entries = max_history;
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.scale {
            config.render.scale = v;
        }
    }

    Ok(config)
}
