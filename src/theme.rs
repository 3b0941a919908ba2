use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub node_fill: String,
    pub node_stroke: String,
    pub node_stroke_width: f32,
    pub node_text_color: String,
    pub alert_fill: String,
    pub alert_stroke: String,
    pub alert_stroke_width: f32,
    pub alert_text_color: String,
    pub line_color: String,
    pub alert_line_color: String,
    pub line_width: f32,
    pub alert_line_width: f32,
    pub muted_line_opacity: f32,
    pub edge_label_background: String,
    pub edge_label_text_color: String,
    pub background: String,
}

impl Theme {
    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_fill: "#F8FAFF".to_string(),
            node_stroke: "#C7D2E5".to_string(),
            node_stroke_width: 1.4,
            node_text_color: "#1C2430".to_string(),
            alert_fill: "#FFF1F0".to_string(),
            alert_stroke: "#E5484D".to_string(),
            alert_stroke_width: 2.6,
            alert_text_color: "#7A1F1F".to_string(),
            line_color: "#7A8AA6".to_string(),
            alert_line_color: "#E5484D".to_string(),
            line_width: 1.4,
            alert_line_width: 2.0,
            muted_line_opacity: 0.85,
            edge_label_background: "#FFFFFF".to_string(),
            edge_label_text_color: "#4A5568".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_fill: "#1F2633".to_string(),
            node_stroke: "#3B4658".to_string(),
            node_stroke_width: 1.4,
            node_text_color: "#E6EAF2".to_string(),
            alert_fill: "#3A1D21".to_string(),
            alert_stroke: "#FF6B6B".to_string(),
            alert_stroke_width: 2.6,
            alert_text_color: "#FFD6D6".to_string(),
            line_color: "#8893A8".to_string(),
            alert_line_color: "#FF6B6B".to_string(),
            line_width: 1.4,
            alert_line_width: 2.0,
            muted_line_opacity: 0.8,
            edge_label_background: "#141A24".to_string(),
            edge_label_text_color: "#C3CAD8".to_string(),
            background: "#0F141C".to_string(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "modern" | "light" | "default" => Some(Self::modern()),
            "dark" => Some(Self::dark()),
            _ => None,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}
