use crate::ir::Direction;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_EXPORT_FILE_NAME: &str = "code-flow.png";
/// Pixel density of exported images relative to layout units.
pub const EXPORT_SCALE: f32 = 2.0;

#[derive(Debug, Clone, Serialize)]
pub struct LayoutConfig {
    pub direction: Direction,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub node_padding_x: f32,
    pub node_padding_y: f32,
    pub min_node_width: f32,
    pub min_node_height: f32,
    pub label_line_height: f32,
    pub max_label_width_chars: usize,
    pub edge_label_font_scale: f32,
    pub order_passes: usize,
    pub position_passes: usize,
    pub margin: f32,
    pub self_loop_size: f32,
    pub fast_text_metrics: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: Direction::TopDown,
            node_spacing: 50.0,
            rank_spacing: 60.0,
            node_padding_x: 24.0,
            node_padding_y: 12.0,
            min_node_width: 120.0,
            min_node_height: 40.0,
            label_line_height: 1.4,
            max_label_width_chars: 28,
            edge_label_font_scale: 0.85,
            order_passes: 4,
            position_passes: 6,
            margin: 24.0,
            self_loop_size: 28.0,
            fast_text_metrics: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewConfig {
    pub width: f32,
    pub height: f32,
    pub fit_padding: f32,
    pub max_zoom: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 600.0,
            fit_padding: 20.0,
            max_zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportConfig {
    pub scale: f32,
    pub file_name: String,
    pub background: Option<String>,
    pub font_family: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: EXPORT_SCALE,
            file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            background: None,
            font_family: "Inter".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub view: ViewConfig,
    pub export: ExportConfig,
}

impl Config {
    /// Background painted under exported images.
    pub fn export_background(&self) -> &str {
        self.export
            .background
            .as_deref()
            .unwrap_or(self.theme.background.as_str())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    node_fill: Option<String>,
    node_stroke: Option<String>,
    node_text_color: Option<String>,
    alert_color: Option<String>,
    alert_fill: Option<String>,
    alert_stroke: Option<String>,
    alert_text_color: Option<String>,
    line_color: Option<String>,
    alert_line_color: Option<String>,
    edge_label_background: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    direction: Option<String>,
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    node_padding_x: Option<f32>,
    node_padding_y: Option<f32>,
    min_node_width: Option<f32>,
    max_label_width_chars: Option<usize>,
    order_passes: Option<usize>,
    position_passes: Option<usize>,
    margin: Option<f32>,
    fast_text_metrics: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ViewConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    fit_padding: Option<f32>,
    max_zoom: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ExportConfigFile {
    scale: Option<f32>,
    file_name: Option<String>,
    background: Option<String>,
    font_family: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    view: Option<ViewConfigFile>,
    export: Option<ExportConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = serde_json::from_str(contents)?;
    let mut config = Config::default();

    if let Some(name) = parsed.theme.as_deref() {
        config.theme = Theme::from_name(name)
            .ok_or_else(|| anyhow::anyhow!("unknown theme '{name}'"))?;
    }

    if let Some(vars) = parsed.theme_variables {
        apply_theme_variables(&mut config.theme, vars);
    }

    if let Some(layout) = parsed.layout {
        if let Some(token) = layout.direction.as_deref() {
            config.layout.direction = Direction::from_token(token)
                .ok_or_else(|| anyhow::anyhow!("unknown layout direction '{token}'"))?;
        }
        if let Some(v) = layout.node_spacing {
            config.layout.node_spacing = v.max(0.0);
        }
        if let Some(v) = layout.rank_spacing {
            config.layout.rank_spacing = v.max(0.0);
        }
        if let Some(v) = layout.node_padding_x {
            config.layout.node_padding_x = v.max(0.0);
        }
        if let Some(v) = layout.node_padding_y {
            config.layout.node_padding_y = v.max(0.0);
        }
        if let Some(v) = layout.min_node_width {
            config.layout.min_node_width = v.max(0.0);
        }
        if let Some(v) = layout.max_label_width_chars {
            config.layout.max_label_width_chars = v.max(1);
        }
        if let Some(v) = layout.order_passes {
            config.layout.order_passes = v;
        }
        if let Some(v) = layout.position_passes {
            config.layout.position_passes = v;
        }
        if let Some(v) = layout.margin {
            config.layout.margin = v.max(0.0);
        }
        if let Some(v) = layout.fast_text_metrics {
            config.layout.fast_text_metrics = v;
        }
    }

    if let Some(view) = parsed.view {
        if let Some(v) = view.width {
            config.view.width = v;
        }
        if let Some(v) = view.height {
            config.view.height = v;
        }
        if let Some(v) = view.fit_padding {
            config.view.fit_padding = v.max(0.0);
        }
        if let Some(v) = view.max_zoom {
            config.view.max_zoom = v;
        }
    }

    if let Some(export) = parsed.export {
        if let Some(v) = export.scale {
            if !(v.is_finite() && v > 0.0) {
                anyhow::bail!("export scale must be a positive number, got {v}");
            }
            config.export.scale = v;
        }
        if let Some(v) = export.file_name {
            config.export.file_name = v;
        }
        if let Some(v) = export.background {
            config.export.background = Some(v);
        }
        if let Some(v) = export.font_family {
            config.export.font_family = v;
        }
    }

    Ok(config)
}

fn apply_theme_variables(theme: &mut Theme, vars: ThemeVariables) {
    if let Some(v) = vars.font_family {
        theme.font_family = v;
    }
    if let Some(v) = vars.font_size {
        theme.font_size = v;
    }
    if let Some(v) = vars.node_fill {
        theme.node_fill = v;
    }
    if let Some(v) = vars.node_stroke {
        theme.node_stroke = v;
    }
    if let Some(v) = vars.node_text_color {
        theme.node_text_color = v;
    }
    // A single alert color drives both the node outline and highlighted edges
    // unless the more specific variables are also set.
    if let Some(v) = vars.alert_color {
        theme.alert_stroke = v.clone();
        theme.alert_line_color = v;
    }
    if let Some(v) = vars.alert_fill {
        theme.alert_fill = v;
    }
    if let Some(v) = vars.alert_stroke {
        theme.alert_stroke = v;
    }
    if let Some(v) = vars.alert_text_color {
        theme.alert_text_color = v;
    }
    if let Some(v) = vars.line_color {
        theme.line_color = v;
    }
    if let Some(v) = vars.alert_line_color {
        theme.alert_line_color = v;
    }
    if let Some(v) = vars.edge_label_background {
        theme.edge_label_background = v;
    }
    if let Some(v) = vars.background {
        theme.background = v;
    }
}
