//! Standalone, read-only HTML page for sharing a diagram.
//!
//! The page carries the diagram twice: an inline SVG for viewing and the
//! `{nodes, edges}` JSON payload in a `<script type="application/json">`
//! block so the data can be recovered losslessly.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{escape_xml, json};
use crate::config::NodeMetrics;
use crate::error::{EngineError, Result};
use crate::model::Diagram;
use crate::render::render_svg;
use crate::theme::Theme;

pub const EMPTY_DIAGRAM_MESSAGE: &str = "Cannot export: No nodes in diagram";

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[^a-z0-9]").unwrap());
static PAYLOAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script id="diagram-data" type="application/json">(.*?)</script>"#).unwrap()
});

/// `<title-slug>-YYYY-MM-DD.html`; every character outside `[a-z0-9]`
/// becomes a dash.
pub fn html_file_name(title: &str, date: NaiveDate) -> String {
    let slug = SLUG_RE.replace_all(title, "-").to_lowercase();
    format!("{slug}-{}.html", date.format("%Y-%m-%d"))
}

pub fn to_html(
    diagram: &Diagram,
    title: &str,
    date: NaiveDate,
    theme: &Theme,
    metrics: &NodeMetrics,
) -> Result<String> {
    if diagram.nodes.is_empty() {
        return Err(EngineError::Export(EMPTY_DIAGRAM_MESSAGE.to_string()));
    }
    // `</` would end the script element early.
    let payload = json::to_payload(diagram)?.replace("</", "<\\/");
    let svg = render_svg(diagram, theme, metrics);
    let title = escape_xml(title);
    let stamp = date.format("%Y-%m-%d");
    let nodes = diagram.nodes.len();
    let edges = diagram.edges.len();

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title} - Diagram Viewer</title>
  <style>
    * {{ margin: 0; padding: 0; box-sizing: border-box; }}
    body {{ font-family: {font}; background: #f9fafb; }}
    .header {{ background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 1rem 1.5rem; }}
    .header h1 {{ font-size: 1.5rem; font-weight: 600; margin-bottom: 0.25rem; }}
    .header p {{ font-size: 0.875rem; opacity: 0.9; }}
    .viewer {{ padding: 1.5rem; overflow: auto; }}
    .viewer svg {{ max-width: 100%; height: auto; background: white; border-radius: 8px; }}
  </style>
</head>
<body>
  <div class="header">
    <h1>{title}</h1>
    <p>Exported {stamp} &middot; {nodes} platforms &middot; {edges} connections</p>
  </div>
  <div class="viewer">
{svg}
  </div>
  <script id="diagram-data" type="application/json">{payload}</script>
</body>
</html>
"#,
        font = theme.font_family,
    ))
}

/// Recovers the embedded diagram from a page written by [`to_html`].
pub fn extract_payload(html: &str) -> Result<Diagram> {
    let raw = PAYLOAD_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| EngineError::parse("HTML", "no embedded diagram data"))?
        .as_str()
        .replace("<\\/", "</");
    serde_json::from_str(&raw).map_err(|err| EngineError::parse("JSON", err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
    }

    #[test]
    fn slugs_title_for_file_name() {
        assert_eq!(
            html_file_name("Payments API (v2)", date()),
            "payments-api--v2--2025-01-31.html"
        );
    }

    #[test]
    fn refuses_empty_diagram() {
        let err = to_html(
            &Diagram::new(),
            "Empty",
            date(),
            &Theme::modern(),
            &NodeMetrics::default(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::Export(EMPTY_DIAGRAM_MESSAGE.to_string()));
    }

    #[test]
    fn embeds_lossless_payload() {
        let mut diagram = Diagram::sample();
        diagram.nodes[0].data.name = "</script><b>".to_string();
        let html = to_html(
            &diagram,
            "Sample & Co",
            date(),
            &Theme::modern(),
            &NodeMetrics::default(),
        )
        .unwrap();
        assert!(html.contains("<title>Sample &amp; Co - Diagram Viewer</title>"));
        assert!(html.contains("<svg"));
        assert_eq!(html.matches("</script>").count(), 1);
        assert_eq!(extract_payload(&html).unwrap(), diagram);
    }
}
