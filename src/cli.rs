use crate::collision::node_rect;
use crate::config::{Config, load_config};
use crate::controller::DiagramController;
use crate::edge::is_broken;
use crate::format::html::to_html;
use crate::format::{Format, import, today};
use crate::layout::LayoutDirection;
use crate::model::Diagram;
use crate::render::{render_svg, write_output_svg};
#[cfg(feature = "png")]
use crate::render::write_output_png;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "archgraph",
    version,
    about = "Convert, lay out and render architecture diagrams"
)]
pub struct Args {
    /// Config JSON/JSON5 file (theme, layout, collision and node metrics)
    #[arg(short = 'c', long = "configFile", global = true)]
    pub config: Option<PathBuf>,

    /// Log engine events at debug level (RUST_LOG still wins)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Re-serialize a diagram as JSON or XML
    Convert {
        #[command(flatten)]
        io: IoArgs,

        /// Target format. Defaults to the output extension, then JSON.
        #[arg(short = 't', long = "to", value_enum)]
        to: Option<TextFormat>,
    },
    /// Auto-layout a diagram and write it back
    Layout {
        #[command(flatten)]
        io: IoArgs,

        /// TB, LR, RL or BT
        #[arg(short = 'd', long = "direction", default_value = "TB", value_parser = parse_direction)]
        direction: LayoutDirection,

        #[arg(short = 't', long = "to", value_enum)]
        to: Option<TextFormat>,
    },
    /// Render a diagram as SVG, PNG or a standalone HTML page
    Export {
        #[command(flatten)]
        io: IoArgs,

        #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
        format: OutputFormat,

        /// Page title for HTML output. Defaults to the diagram name.
        #[arg(long = "title")]
        title: Option<String>,
    },
    /// Report broken edges, duplicate ids and overlapping nodes
    Check {
        /// Input file (.json/.xml) or '-' for stdin
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
pub struct IoArgs {
    /// Input file (.json/.xml) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for text output.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Json,
    Xml,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Html,
}

fn parse_direction(token: &str) -> std::result::Result<LayoutDirection, String> {
    LayoutDirection::from_token(token)
        .ok_or_else(|| format!("unknown direction '{token}' (expected TB, LR, RL or BT)"))
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Convert { io, to } => {
            let mut controller = DiagramController::new(config);
            controller.load(&read_input(io.input.as_deref())?, Format::Auto)?;
            let text = serialize(&controller, resolve_text_format(to, io.output.as_deref()))?;
            write_text(&text, io.output.as_deref())
        }
        Command::Layout { io, direction, to } => {
            let mut controller = DiagramController::new(config);
            let input = read_input(io.input.as_deref())?;
            controller.load(&input, Format::Auto)?;
            controller.apply_layout(direction);
            let fallback = match to {
                Some(format) => Some(format),
                None if input.trim_start().starts_with('<') => Some(TextFormat::Xml),
                None => None,
            };
            let text = serialize(&controller, resolve_text_format(fallback, io.output.as_deref()))?;
            write_text(&text, io.output.as_deref())
        }
        Command::Export { io, format, title } => {
            let imported = import(&read_input(io.input.as_deref())?, Format::Auto)?;
            let title = title.unwrap_or(imported.metadata.name);
            export(&imported.diagram, &config, format, &title, io.output.as_deref())
        }
        Command::Check { input } => {
            let imported = import(&read_input(input.as_deref())?, Format::Auto)?;
            let problems = check(&imported.diagram, &config);
            println!(
                "{}: {} nodes, {} edges",
                imported.metadata.name,
                imported.diagram.nodes.len(),
                imported.diagram.edges.len()
            );
            for problem in &problems {
                println!("  - {problem}");
            }
            if problems.is_empty() {
                Ok(())
            } else {
                Err(anyhow::anyhow!("{} problem(s) found", problems.len()))
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => io::stdout().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn resolve_text_format(explicit: Option<TextFormat>, output: Option<&Path>) -> TextFormat {
    if let Some(format) = explicit {
        return format;
    }
    let ext = output
        .and_then(|path| path.extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xml") => TextFormat::Xml,
        _ => TextFormat::Json,
    }
}

fn serialize(controller: &DiagramController, format: TextFormat) -> Result<String> {
    Ok(match format {
        TextFormat::Json => controller.to_json()?,
        TextFormat::Xml => controller.to_xml()?,
    })
}

fn ensure_output(output: Option<&Path>, ext: &str) -> Result<PathBuf> {
    output
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("Output path required for {} output", ext))
}

fn export(
    diagram: &Diagram,
    config: &Config,
    format: OutputFormat,
    title: &str,
    output: Option<&Path>,
) -> Result<()> {
    match format {
        OutputFormat::Svg => {
            let svg = render_svg(diagram, &config.theme, &config.metrics);
            write_output_svg(&svg, output)
        }
        OutputFormat::Html => {
            let page = to_html(diagram, title, today(), &config.theme, &config.metrics)?;
            write_text(&page, output)
        }
        #[cfg(feature = "png")]
        OutputFormat::Png => {
            let output = ensure_output(output, "png")?;
            let svg = render_svg(diagram, &config.theme, &config.metrics);
            write_output_png(&svg, &output, &config.render)
        }
        #[cfg(not(feature = "png"))]
        OutputFormat::Png => {
            ensure_output(output, "png")?;
            Err(anyhow::anyhow!("PNG output requires the png feature"))
        }
    }
}

/// Human-readable findings; an empty list means the diagram is clean.
fn check(diagram: &Diagram, config: &Config) -> Vec<String> {
    let mut problems = Vec::new();

    let mut seen = HashSet::new();
    for node in &diagram.nodes {
        if !seen.insert(node.id.as_str()) {
            problems.push(format!("duplicate node id '{}'", node.id));
        }
    }
    let mut seen = HashSet::new();
    for edge in &diagram.edges {
        if !seen.insert(edge.id.as_str()) {
            problems.push(format!("duplicate edge id '{}'", edge.id));
        }
        if is_broken(edge) {
            problems.push(format!(
                "edge '{}' has mismatched handles ({} -> {})",
                edge.id,
                edge.source_handle.as_deref().unwrap_or("-"),
                edge.target_handle.as_deref().unwrap_or("-")
            ));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !diagram.contains_node(endpoint) {
                problems.push(format!("edge '{}' references missing node '{endpoint}'", edge.id));
            }
        }
    }

    let rects: Vec<_> = diagram
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), node_rect(node, &config.metrics)))
        .collect();
    for (idx, (id, rect)) in rects.iter().enumerate() {
        for (other_id, other) in &rects[idx + 1..] {
            if rect.overlaps(other, 0.0) {
                problems.push(format!("nodes '{id}' and '{other_id}' overlap"));
            }
        }
    }
    problems
}
