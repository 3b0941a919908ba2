use codeflow_graph::{Direction, RenderOptions, Theme, render_with_options};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    direction: Option<String>,
    fast_text: Option<bool>,
}

fn build_render_options(options: WorkflowRenderOptions) -> RenderOptions {
    let mut render_options = options
        .theme
        .as_deref()
        .and_then(Theme::from_name)
        .map(|theme| RenderOptions::modern().with_theme(theme))
        .unwrap_or_else(RenderOptions::modern);

    if let Some(font_family) = options.font_family {
        render_options.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        render_options.theme.font_size = font_size;
    }
    if let Some(direction) = options.direction.as_deref().and_then(Direction::from_token) {
        render_options.layout.direction = direction;
    }
    // No system fonts are reachable from wasm; the fallback table is all we have.
    render_options.layout.fast_text_metrics = options.fast_text.unwrap_or(true);

    render_options
}

/// Renders a workflow payload (bare, or wrapped in `{"workflow": ...}`) to SVG.
/// Returns an empty string when the payload has nothing to draw.
#[wasm_bindgen]
pub fn render_workflow_svg(
    payload_json: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<WorkflowRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        WorkflowRenderOptions::default()
    };

    let render_options = build_render_options(options);
    render_with_options(payload_json, render_options)
        .map(Option::unwrap_or_default)
        .map_err(|error| JsValue::from_str(&error.to_string()))
}
