//! Presentation attributes derived from canonical node and edge state.
//!
//! Nothing here is cached on the model: the renderer calls these on every
//! pass, so an edge's color always follows the current flags of its endpoints.

use crate::ir::{CanonicalEdge, CanonicalNode};
use crate::theme::Theme;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStyle {
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f32,
    pub text_color: String,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStyle {
    pub stroke: String,
    pub stroke_width: f32,
    pub opacity: f32,
    pub highlighted: bool,
}

pub fn node_fill<'a>(node: &CanonicalNode, theme: &'a Theme) -> &'a str {
    if node.is_optimizable {
        &theme.alert_fill
    } else {
        &theme.node_fill
    }
}

pub fn node_stroke<'a>(node: &CanonicalNode, theme: &'a Theme) -> &'a str {
    if node.is_optimizable {
        &theme.alert_stroke
    } else {
        &theme.node_stroke
    }
}

pub fn node_stroke_width(node: &CanonicalNode, theme: &Theme) -> f32 {
    if node.is_optimizable {
        theme.alert_stroke_width
    } else {
        theme.node_stroke_width
    }
}

pub fn node_text_color<'a>(node: &CanonicalNode, theme: &'a Theme) -> &'a str {
    if node.is_optimizable {
        &theme.alert_text_color
    } else {
        &theme.node_text_color
    }
}

pub fn tooltip_text(node: &CanonicalNode) -> &str {
    if node.is_optimizable {
        &node.optimization_reason
    } else {
        &node.text
    }
}

/// An edge is highlighted when either endpoint is optimizable.
pub fn edge_is_highlighted(from: Option<&CanonicalNode>, to: Option<&CanonicalNode>) -> bool {
    from.is_some_and(|node| node.is_optimizable) || to.is_some_and(|node| node.is_optimizable)
}

pub fn link_color<'a>(
    _edge: &CanonicalEdge,
    from: Option<&CanonicalNode>,
    to: Option<&CanonicalNode>,
    theme: &'a Theme,
) -> &'a str {
    if edge_is_highlighted(from, to) {
        &theme.alert_line_color
    } else {
        &theme.line_color
    }
}

pub fn link_width(from: Option<&CanonicalNode>, to: Option<&CanonicalNode>, theme: &Theme) -> f32 {
    if edge_is_highlighted(from, to) {
        theme.alert_line_width
    } else {
        theme.line_width
    }
}

pub fn link_opacity(from: Option<&CanonicalNode>, to: Option<&CanonicalNode>, theme: &Theme) -> f32 {
    if edge_is_highlighted(from, to) {
        1.0
    } else {
        theme.muted_line_opacity.clamp(0.0, 1.0)
    }
}

pub fn resolve_node_style(node: &CanonicalNode, theme: &Theme) -> NodeStyle {
    NodeStyle {
        fill: node_fill(node, theme).to_string(),
        stroke: node_stroke(node, theme).to_string(),
        stroke_width: node_stroke_width(node, theme),
        text_color: node_text_color(node, theme).to_string(),
        tooltip: tooltip_text(node).to_string(),
    }
}

pub fn resolve_edge_style(
    edge: &CanonicalEdge,
    from: Option<&CanonicalNode>,
    to: Option<&CanonicalNode>,
    theme: &Theme,
) -> EdgeStyle {
    EdgeStyle {
        stroke: link_color(edge, from, to, theme).to_string(),
        stroke_width: link_width(from, to, theme),
        opacity: link_opacity(from, to, theme),
        highlighted: edge_is_highlighted(from, to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(key: &str) -> CanonicalNode {
        CanonicalNode::new(key, key.to_uppercase())
    }

    fn flagged(key: &str) -> CanonicalNode {
        plain(key).optimizable("hoist invariant")
    }

    #[test]
    fn optimizable_nodes_use_alert_palette() {
        let theme = Theme::modern();
        let style = resolve_node_style(&flagged("a"), &theme);
        assert_eq!(style.fill, theme.alert_fill);
        assert_eq!(style.stroke, theme.alert_stroke);
        assert!(style.stroke_width > theme.node_stroke_width);
        assert_eq!(style.tooltip, "hoist invariant");

        let style = resolve_node_style(&plain("b"), &theme);
        assert_eq!(style.fill, theme.node_fill);
        assert_eq!(style.tooltip, "B");
    }

    #[test]
    fn edge_color_follows_either_endpoint() {
        let theme = Theme::modern();
        let edge = CanonicalEdge::new("a", "b");
        let (a, b) = (flagged("a"), plain("b"));
        let one = link_color(&edge, Some(&a), Some(&b), &theme);
        let other = link_color(&edge, Some(&b), Some(&a), &theme);
        let both = link_color(&edge, Some(&a), Some(&flagged("b")), &theme);
        let neither = link_color(&edge, Some(&b), Some(&plain("c")), &theme);
        assert_eq!(one, theme.alert_line_color);
        assert_eq!(other, theme.alert_line_color);
        assert_eq!(one, both);
        assert_eq!(neither, theme.line_color);
    }

    #[test]
    fn muted_edges_are_dimmed() {
        let theme = Theme::modern();
        let edge = CanonicalEdge::new("a", "b");
        let style = resolve_edge_style(&edge, Some(&plain("a")), Some(&plain("b")), &theme);
        assert!(!style.highlighted);
        assert!(style.opacity < 1.0);
        let style = resolve_edge_style(&edge, Some(&flagged("a")), None, &theme);
        assert!(style.highlighted);
        assert_eq!(style.opacity, 1.0);
    }
}
