//! Text persistence for diagrams.
//!
//! JSON is the native document format and the payload embedded in HTML
//! exports; XML is a hand-written element schema kept for interchange. Both
//! readers fail closed with an [`EngineError`] and never hand back a partial
//! diagram.

pub mod html;
pub mod json;
pub mod xml;

use chrono::NaiveDate;

use crate::error::{EngineError, Result};
use crate::host::ImageFormat;
use crate::model::{Diagram, Metadata};

pub const FORMAT_VERSION: &str = "1.0";

/// Text format selector for import and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    Json,
    Xml,
    /// Decide from the first non-blank character on import. JSON on export.
    #[default]
    Auto,
}

impl Format {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json | Self::Auto => "json",
        }
    }
}

/// Everything the shell can ask to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Json,
    Xml,
    Html,
    Png,
    Jpeg,
    Svg,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 7] = [
        Self::Json,
        Self::Xml,
        Self::Html,
        Self::Png,
        Self::Jpeg,
        Self::Svg,
        Self::Pdf,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "html" | "htm" => Some(Self::Html),
            "png" => Some(Self::Png),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "svg" => Some(Self::Svg),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Html => "html",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }

    /// Formats produced by the rasterizer rather than by this crate.
    pub fn image(self) -> Option<ImageFormat> {
        match self {
            Self::Png => Some(ImageFormat::Png),
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Svg => Some(ImageFormat::Svg),
            Self::Pdf => Some(ImageFormat::Pdf),
            Self::Json | Self::Xml | Self::Html => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Imported {
    pub diagram: Diagram,
    pub metadata: Metadata,
}

pub fn detect_format(text: &str) -> Option<Format> {
    match text.trim_start().chars().next() {
        Some('<') => Some(Format::Xml),
        Some('{') => Some(Format::Json),
        _ => None,
    }
}

pub fn import(text: &str, format: Format) -> Result<Imported> {
    let format = match format {
        Format::Auto => detect_format(text).ok_or(EngineError::UnknownFormat)?,
        other => other,
    };
    match format {
        Format::Json => json::from_json(text),
        Format::Xml => xml::from_xml(text),
        Format::Auto => Err(EngineError::UnknownFormat),
    }
}

pub fn export(diagram: &Diagram, metadata: &Metadata, format: Format) -> Result<String> {
    match format {
        Format::Xml => xml::to_xml(diagram, metadata),
        Format::Json | Format::Auto => json::to_json(diagram, metadata),
    }
}

/// Gives every attribute with an empty id the stable id `attr-<node>-<index>`.
pub fn backfill_attribute_ids(diagram: &mut Diagram) {
    for node in &mut diagram.nodes {
        for (idx, attribute) in node.data.attributes.iter_mut().enumerate() {
            if attribute.id.is_empty() {
                attribute.id = format!("attr-{}-{idx}", node.id);
            }
        }
    }
}

/// `diagram-YYYY-MM-DD.<ext>`
pub fn default_file_name(extension: &str, date: NaiveDate) -> String {
    format!("diagram-{}.{extension}", date.format("%Y-%m-%d"))
}

/// Today's date in UTC, which is what saved file names are stamped with.
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Current instant as an ISO-8601 string with millisecond precision.
pub(crate) fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Fills in `created` when the caller has not.
pub(crate) fn stamped(metadata: &Metadata) -> Metadata {
    let mut metadata = metadata.clone();
    if metadata.created.is_none() {
        metadata.created = Some(now_iso());
    }
    metadata
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Attribute-safe escaping. Whitespace control characters become character
/// references so attribute-value normalisation cannot rewrite them.
pub fn escape_attr(input: &str) -> String {
    escape_xml(input)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, Node, Position};

    #[test]
    fn detects_format_from_leading_character() {
        assert_eq!(detect_format("  \n<diagram/>"), Some(Format::Xml));
        assert_eq!(detect_format("{\"nodes\":[]}"), Some(Format::Json));
        assert_eq!(detect_format("nodes: []"), None);
        assert_eq!(import("nodes: []", Format::Auto), Err(EngineError::UnknownFormat));
    }

    #[test]
    fn backfills_only_missing_ids() {
        let mut node = Node::platform("7", Position::default());
        node.data.attributes = vec![
            Attribute::new("", "a", "1"),
            Attribute::new("kept", "b", "2"),
            Attribute::new("", "c", "3"),
        ];
        let mut diagram = Diagram::from_parts(vec![node], Vec::new());
        backfill_attribute_ids(&mut diagram);
        let ids: Vec<&str> = diagram.nodes[0]
            .data
            .attributes
            .iter()
            .map(|attr| attr.id.as_str())
            .collect();
        assert_eq!(ids, vec!["attr-7-0", "kept", "attr-7-2"]);
    }

    #[test]
    fn file_names_carry_the_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(default_file_name("json", date), "diagram-2024-03-09.json");
    }

    #[test]
    fn escapes_markup_and_whitespace() {
        assert_eq!(escape_xml("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
        assert_eq!(escape_attr("x\n\"y\""), "x&#10;&quot;y&quot;");
    }

    #[test]
    fn parses_export_tokens() {
        assert_eq!(ExportFormat::from_token("JPG"), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::Jpeg.extension(), "jpg");
        assert_eq!(ExportFormat::Html.image(), None);
        assert_eq!(Format::from_token("xml"), Some(Format::Xml));
    }
}
