use crate::ir::{CanonicalGraph, CanonicalNode};
use crate::layout::{EdgeLayout, Layout, NodeLayout, TextBlock};
use crate::style::{resolve_edge_style, resolve_node_style};
use crate::theme::Theme;
use crate::viewport::{ViewTransform, Viewport};
use anyhow::Result;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

const LABEL_PAD_X: f32 = 6.0;
const LABEL_PAD_Y: f32 = 4.0;
const NODE_RADIUS: f32 = 8.0;
const LINE_HEIGHT: f32 = 1.4;
const MARKER_NEUTRAL: &str = "flow-arrow";
const MARKER_ALERT: &str = "flow-arrow-alert";

/// Outer frame of an SVG document: its pixel size, the content viewBox, an
/// optional view transform and an optional opaque background.
#[derive(Debug, Clone)]
struct Frame<'a> {
    width: f32,
    height: f32,
    view_box: (f32, f32),
    transform: Option<ViewTransform>,
    background: Option<&'a str>,
}

/// Standalone document at natural size with the theme background.
pub fn render_svg(layout: &Layout, graph: &CanonicalGraph, theme: &Theme) -> String {
    let frame = Frame {
        width: layout.width,
        height: layout.height,
        view_box: (layout.width, layout.height),
        transform: None,
        background: Some(theme.background.as_str()),
    };
    write_document(layout, graph, theme, &frame)
}

/// Document sized to `viewport` with the content fitted by `view`. The
/// background is left transparent so the host page shows through.
pub fn render_svg_in_view(
    layout: &Layout,
    graph: &CanonicalGraph,
    theme: &Theme,
    viewport: Viewport,
    view: ViewTransform,
) -> String {
    let frame = Frame {
        width: viewport.width,
        height: viewport.height,
        view_box: (viewport.width, viewport.height),
        transform: Some(view),
        background: None,
    };
    write_document(layout, graph, theme, &frame)
}

/// Content at `scale` times its natural size, transparent, for rasterizing.
pub fn render_svg_scaled(layout: &Layout, graph: &CanonicalGraph, theme: &Theme, scale: f32) -> String {
    let frame = Frame {
        width: layout.width * scale,
        height: layout.height * scale,
        view_box: (layout.width, layout.height),
        transform: None,
        background: None,
    };
    write_document(layout, graph, theme, &frame)
}

fn write_document(layout: &Layout, graph: &CanonicalGraph, theme: &Theme, frame: &Frame<'_>) -> String {
    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.2}\" height=\"{:.2}\" viewBox=\"0 0 {:.2} {:.2}\" class=\"code-flow\">",
        frame.width, frame.height, frame.view_box.0, frame.view_box.1
    );
    if let Some(background) = frame.background {
        let _ = write!(
            svg,
            "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
            escape_xml(background)
        );
    }

    svg.push_str("<defs>");
    svg.push_str(&marker_def(MARKER_NEUTRAL, &theme.line_color));
    svg.push_str(&marker_def(MARKER_ALERT, &theme.alert_line_color));
    svg.push_str("</defs>");

    match frame.transform {
        Some(view) => {
            let _ = write!(svg, "<g class=\"viewport\" transform=\"{}\">", view.to_svg_attr());
        }
        None => svg.push_str("<g class=\"viewport\">"),
    }

    let by_key: HashMap<&str, &CanonicalNode> = graph
        .nodes()
        .iter()
        .map(|node| (node.key.as_str(), node))
        .collect();

    svg.push_str("<g class=\"edges\">");
    for (edge_layout, edge) in layout.edges.iter().zip(graph.edges()) {
        let from = by_key.get(edge.from.as_str()).copied();
        let to = by_key.get(edge.to.as_str()).copied();
        let style = resolve_edge_style(edge, from, to, theme);
        let marker = if style.highlighted { MARKER_ALERT } else { MARKER_NEUTRAL };
        let _ = write!(
            svg,
            "<g class=\"edge\" data-from=\"{}\" data-to=\"{}\" data-highlighted=\"{}\">",
            escape_xml(&edge.from),
            escape_xml(&edge.to),
            style.highlighted
        );
        let _ = write!(
            svg,
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{:.2}\" stroke-opacity=\"{:.2}\" marker-end=\"url(#{marker})\"/>",
            points_to_path(&edge_layout.points),
            escape_xml(&style.stroke),
            style.stroke_width,
            style.opacity
        );
        svg.push_str(&edge_label_svg(edge_layout, theme));
        svg.push_str("</g>");
    }
    svg.push_str("</g>");

    svg.push_str("<g class=\"nodes\">");
    for node_layout in &layout.nodes {
        let Some(node) = by_key.get(node_layout.key.as_str()) else {
            continue;
        };
        svg.push_str(&node_svg(node_layout, node, theme));
    }
    svg.push_str("</g>");

    svg.push_str("</g></svg>");
    svg
}

fn marker_def(id: &str, color: &str) -> String {
    format!(
        "<marker id=\"{id}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"7\" markerHeight=\"7\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        escape_xml(color)
    )
}

fn node_svg(layout: &NodeLayout, node: &CanonicalNode, theme: &Theme) -> String {
    let style = resolve_node_style(node, theme);
    let mut out = String::new();
    let _ = write!(
        out,
        "<g class=\"node\" data-key=\"{}\" data-kind=\"{}\" data-optimizable=\"{}\">",
        escape_xml(&node.key),
        escape_xml(&node.kind),
        node.is_optimizable
    );
    let _ = write!(out, "<title>{}</title>", escape_xml(&style.tooltip));
    let _ = write!(
        out,
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{NODE_RADIUS}\" ry=\"{NODE_RADIUS}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{:.2}\"/>",
        layout.x,
        layout.y,
        layout.width,
        layout.height,
        escape_xml(&style.fill),
        escape_xml(&style.stroke),
        style.stroke_width
    );
    let (cx, cy) = layout.center();
    out.push_str(&text_block_svg(
        cx,
        cy,
        &layout.label,
        theme.font_size,
        &style.text_color,
        theme,
    ));
    out.push_str("</g>");
    out
}

fn edge_label_svg(edge: &EdgeLayout, theme: &Theme) -> String {
    let (Some(label), Some((x, y))) = (&edge.label, edge.label_anchor) else {
        return String::new();
    };
    if label.is_blank() {
        return String::new();
    }
    let font_size = label_font_size(label, theme);
    let mut out = String::new();
    let _ = write!(
        out,
        "<rect class=\"edge-label\" x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\"/>",
        x - label.width / 2.0 - LABEL_PAD_X,
        y - label.height / 2.0 - LABEL_PAD_Y,
        label.width + LABEL_PAD_X * 2.0,
        label.height + LABEL_PAD_Y * 2.0,
        escape_xml(&theme.edge_label_background)
    );
    out.push_str(&text_block_svg(
        x,
        y,
        label,
        font_size,
        &theme.edge_label_text_color,
        theme,
    ));
    out
}

// Edge labels are measured at a reduced size; recover it from the block.
fn label_font_size(label: &TextBlock, theme: &Theme) -> f32 {
    let lines = label.lines.len().max(1) as f32;
    let measured = label.height / lines / LINE_HEIGHT;
    if measured.is_finite() && measured > 0.0 {
        measured.min(theme.font_size)
    } else {
        theme.font_size
    }
}

fn text_block_svg(x: f32, y: f32, label: &TextBlock, font_size: f32, fill: &str, theme: &Theme) -> String {
    let line_step = font_size * LINE_HEIGHT;
    let total_height = label.lines.len() as f32 * line_step;
    let start_y = y - total_height / 2.0 + line_step / 2.0;
    let mut text = String::new();
    let _ = write!(
        text,
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{:.2}\" fill=\"{}\">",
        escape_xml(&theme.font_family),
        font_size,
        escape_xml(fill)
    );
    for (idx, line) in label.lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_step };
        let _ = write!(
            text,
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(line)
        );
    }
    text.push_str("</text>");
    text
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    let Some((first, rest)) = points.split_first() else {
        return String::new();
    };
    let mut d = format!("M {:.2} {:.2}", first.0, first.1);
    for point in rest {
        let _ = write!(d, " L {:.2} {:.2}", point.0, point.1);
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, svg)?,
        None => print!("{svg}"),
    }
    Ok(())
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::CanonicalEdge;
    use crate::layout::compute_layout;

    fn sample() -> (CanonicalGraph, Layout, Theme) {
        let graph = CanonicalGraph::from_parts(
            vec![
                CanonicalNode::new("s1", "Load"),
                CanonicalNode::new("s2", "Transform <rows>").optimizable("vectorize loop"),
                CanonicalNode::new("s3", "Save"),
            ],
            vec![
                CanonicalEdge::new("s1", "s2").with_text("rows"),
                CanonicalEdge::new("s1", "s3"),
            ],
        );
        let theme = Theme::modern();
        let config = LayoutConfig {
            fast_text_metrics: true,
            ..LayoutConfig::default()
        };
        let layout = compute_layout(&graph, &theme, &config);
        (graph, layout, theme)
    }

    #[test]
    fn render_svg_basic() {
        let (graph, layout, theme) = sample();
        let svg = render_svg(&layout, &graph, &theme);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Load"));
        assert!(svg.contains("Transform &lt;rows&gt;"));
        assert!(svg.contains(&format!("fill=\"{}\"", theme.background)));
    }

    #[test]
    fn tooltips_follow_optimizability() {
        let (graph, layout, theme) = sample();
        let svg = render_svg(&layout, &graph, &theme);
        assert!(svg.contains("<title>vectorize loop</title>"));
        assert!(svg.contains("<title>Load</title>"));
        assert!(svg.contains("data-key=\"s2\" data-kind=\"default\" data-optimizable=\"true\""));
    }

    #[test]
    fn highlighted_edges_use_alert_marker() {
        let (graph, layout, theme) = sample();
        let svg = render_svg(&layout, &graph, &theme);
        assert!(svg.contains(&format!(
            "stroke=\"{}\" stroke-width=\"{:.2}\"",
            theme.alert_line_color, theme.alert_line_width
        )));
        assert!(svg.contains(&format!("url(#{MARKER_ALERT})")));
        assert!(svg.contains(&format!("url(#{MARKER_NEUTRAL})")));
    }

    #[test]
    fn viewport_document_is_transparent_and_transformed() {
        let (graph, layout, theme) = sample();
        let view = ViewTransform {
            scale: 0.5,
            translate_x: 10.0,
            translate_y: 20.0,
        };
        let svg = render_svg_in_view(&layout, &graph, &theme, Viewport::new(400.0, 300.0), view);
        assert!(svg.contains("width=\"400.00\" height=\"300.00\""));
        assert!(svg.contains("transform=\"translate(10.00 20.00) scale(0.5000)\""));
        assert!(!svg.contains("height=\"100%\""));
    }

    #[test]
    fn scaled_document_doubles_pixel_size() {
        let (graph, layout, theme) = sample();
        let svg = render_svg_scaled(&layout, &graph, &theme, 2.0);
        assert!(svg.contains(&format!(
            "width=\"{:.2}\" height=\"{:.2}\" viewBox=\"0 0 {:.2} {:.2}\"",
            layout.width * 2.0,
            layout.height * 2.0,
            layout.width,
            layout.height
        )));
    }

    #[test]
    fn points_to_path_handles_empty() {
        assert_eq!(points_to_path(&[]), "");
        assert_eq!(points_to_path(&[(1.0, 2.0), (3.0, 4.0)]), "M 1.00 2.00 L 3.00 4.00");
    }
}
