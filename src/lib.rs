#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
#[cfg(feature = "png")]
pub mod export;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod normalize;
pub mod payload;
pub mod render;
pub mod style;
pub mod surface;
pub mod text_metrics;
pub mod theme;
pub mod viewport;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig};
pub use ir::{CanonicalEdge, CanonicalGraph, CanonicalNode, Direction};
pub use layout::{Layout, compute_layout};
pub use normalize::{normalize, normalize_value};
pub use payload::{WorkflowPayload, extract_workflow};
pub use render::render_svg;
pub use surface::{FullscreenError, GraphView, MountPoint, Surface};
pub use theme::Theme;

use anyhow::Result;
use serde_json::Value;

/// Theme and layout settings for one-shot rendering.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub theme: Theme,
    pub layout: LayoutConfig,
}

impl RenderOptions {
    pub fn modern() -> Self {
        Self {
            theme: Theme::modern(),
            layout: LayoutConfig::default(),
        }
    }

    pub fn dark() -> Self {
        Self {
            theme: Theme::dark(),
            layout: LayoutConfig::default(),
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }
}

impl From<&Config> for RenderOptions {
    fn from(config: &Config) -> Self {
        Self {
            theme: config.theme.clone(),
            layout: config.layout.clone(),
        }
    }
}

/// Normalizes a workflow value (bare or wrapped in `{"workflow": ...}`) and
/// renders it as a standalone SVG. `None` when there is nothing to draw.
pub fn render_workflow(value: &Value, options: &RenderOptions) -> Option<String> {
    let graph = normalize_value(extract_workflow(value)?);
    if graph.is_empty() {
        return None;
    }
    let layout = compute_layout(&graph, &options.theme, &options.layout);
    Some(render_svg(&layout, &graph, &options.theme))
}

/// Same as [`render_workflow`] but starting from JSON text.
pub fn render_with_options(json: &str, options: RenderOptions) -> Result<Option<String>> {
    let value: Value = serde_json::from_str(json)?;
    Ok(render_workflow(&value, &options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> RenderOptions {
        RenderOptions::modern().with_layout(LayoutConfig {
            fast_text_metrics: true,
            ..LayoutConfig::default()
        })
    }

    #[test]
    fn renders_wrapped_workflow() {
        let value = json!({
            "workflow": {
                "steps": [{"id": "a", "label": "Parse"}, {"id": "b", "label": "Emit"}],
                "dependencies": [{"from": "a", "to": "b"}]
            }
        });
        let svg = render_workflow(&value, &options()).expect("svg");
        assert!(svg.contains("Parse"));
        assert!(svg.contains("Emit"));
    }

    #[test]
    fn nothing_to_draw_yields_none() {
        assert!(render_workflow(&json!({"workflow": null}), &options()).is_none());
        assert!(render_workflow(&json!({"unrelated": true}), &options()).is_none());
        assert!(render_workflow(&json!({"nodes": []}), &options()).is_none());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(render_with_options("{not json", options()).is_err());
    }
}
