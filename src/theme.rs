use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub node_fill: String,
    pub node_border: String,
    pub header_text_color: String,
    pub text_color: String,
    pub muted_text_color: String,
    pub line_color: String,
    pub request_color: String,
    pub response_color: String,
    pub edge_label_background: String,
}

impl Theme {
    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            background: "#FFFFFF".to_string(),
            node_fill: "#FFFFFF".to_string(),
            node_border: "#C7D2E5".to_string(),
            header_text_color: "#FFFFFF".to_string(),
            text_color: "#1C2430".to_string(),
            muted_text_color: "#64748B".to_string(),
            line_color: "#7A8AA6".to_string(),
            request_color: "#3b82f6".to_string(),
            response_color: "#10b981".to_string(),
            edge_label_background: "#FFFFFF".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            background: "#0F172A".to_string(),
            node_fill: "#1E293B".to_string(),
            node_border: "#334155".to_string(),
            header_text_color: "#FFFFFF".to_string(),
            text_color: "#E2E8F0".to_string(),
            muted_text_color: "#94A3B8".to_string(),
            line_color: "#94A3B8".to_string(),
            request_color: "#60a5fa".to_string(),
            response_color: "#34d399".to_string(),
            edge_label_background: "#1E293B".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}
