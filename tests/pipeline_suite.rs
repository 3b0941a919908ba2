use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use codeflow_graph::config::Config;
use codeflow_graph::normalize::GENERIC_OPTIMIZATION_REASON;
use codeflow_graph::style::{resolve_edge_style, resolve_node_style};
use codeflow_graph::viewport::Viewport;
use codeflow_graph::{
    CanonicalGraph, FullscreenError, GraphView, LayoutConfig, MountPoint, RenderOptions, Theme,
    WorkflowPayload, compute_layout, extract_workflow, normalize, normalize_value, render_svg,
    render_workflow,
};
use serde_json::{Value, json};

fn fixture(rel: &str) -> Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    let input = std::fs::read_to_string(&path).expect("fixture read failed");
    serde_json::from_str(&input).expect("fixture is not JSON")
}

fn graph_of(rel: &str) -> CanonicalGraph {
    let value = fixture(rel);
    extract_workflow(&value)
        .map(normalize_value)
        .unwrap_or_default()
}

fn fast_layout() -> LayoutConfig {
    LayoutConfig {
        fast_text_metrics: true,
        ..LayoutConfig::default()
    }
}

#[test]
fn optimizable_step_highlights_node_and_edge() {
    let graph = graph_of("graph_basic.json");
    let theme = Theme::modern();

    let s1 = graph.node("s1").expect("s1");
    let s2 = graph.node("s2").expect("s2");
    assert_eq!(s1.kind, "input");
    assert!(!s1.is_optimizable);
    assert!(s2.is_optimizable);
    assert_eq!(s2.optimization_reason, "vectorize loop");

    let edge = &graph.edges()[0];
    assert_eq!(edge.text, "rows");
    let style = resolve_edge_style(edge, Some(s1), Some(s2), &theme);
    assert_eq!(style.stroke, theme.alert_line_color);
    assert!(style.highlighted);

    assert_eq!(resolve_node_style(s2, &theme).tooltip, "vectorize loop");
    assert_eq!(resolve_node_style(s1, &theme).tooltip, "Load rows");

    let layout = compute_layout(&graph, &theme, &fast_layout());
    let svg = render_svg(&layout, &graph, &theme);
    assert!(svg.contains("<title>vectorize loop</title>"));
    assert!(svg.contains(&format!("stroke=\"{}\"", theme.alert_line_color)));
}

#[test]
fn both_wire_shapes_normalize_identically() {
    assert_eq!(graph_of("graph_basic.json"), graph_of("steps_basic.json"));
}

#[test]
fn graph_shape_takes_precedence() {
    let value = fixture("mixed_shapes.json");
    assert!(matches!(
        WorkflowPayload::detect(&value),
        Some(WorkflowPayload::Graph(_))
    ));
    let graph = normalize_value(&value);
    let keys: Vec<&str> = graph.nodes().iter().map(|node| node.key.as_str()).collect();
    assert_eq!(keys, ["a"]);
    assert!(graph.edges().is_empty());
}

#[test]
fn id_list_and_annotated_list_flag_the_same_nodes() {
    let base = json!({
        "nodes": [{"id": "s1", "label": "A"}, {"id": "s2", "label": "B"}],
        "edges": [{"id": "e", "source": "s1", "target": "s2"}]
    });
    let mut plain = base.clone();
    plain["optimizableSteps"] = json!(["s2"]);
    let mut annotated = base;
    annotated["optimizableSteps"] = json!([{"id": "s2"}]);

    let plain = normalize_value(&plain);
    let annotated = normalize_value(&annotated);
    assert_eq!(plain, annotated);
    let flagged = plain.node("s2").expect("s2");
    assert!(flagged.is_optimizable);
    assert_eq!(flagged.optimization_reason, GENERIC_OPTIMIZATION_REASON);
}

#[test]
fn analysis_response_is_unwrapped() {
    let graph = graph_of("analysis_response.json");
    let keys: Vec<&str> = graph.nodes().iter().map(|node| node.key.as_str()).collect();
    assert_eq!(keys, ["1", "2", "3", "4"]);
    assert_eq!(graph.edges().len(), 4);
    assert_eq!(graph.optimizable_count(), 2);
    assert_eq!(
        graph.node("2").map(|node| node.optimization_reason.as_str()),
        Some(GENERIC_OPTIMIZATION_REASON)
    );
    assert_eq!(
        graph.node("3").map(|node| node.optimization_reason.as_str()),
        Some("replace nested loop with a hash join")
    );
}

#[test]
fn missing_workflow_renders_nothing() {
    let value = fixture("no_workflow.json");
    assert!(extract_workflow(&value).is_none());
    let options = RenderOptions::modern().with_layout(fast_layout());
    assert!(render_workflow(&value, &options).is_none());
}

#[test]
fn malformed_entries_and_dangling_edges_are_dropped() {
    let graph = graph_of("dangling.json");
    let keys: Vec<&str> = graph.nodes().iter().map(|node| node.key.as_str()).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(graph.node("a").map(|node| node.text.as_str()), Some("Start"));
    assert_eq!(graph.edges().len(), 1);
    assert_eq!((graph.edges()[0].from.as_str(), graph.edges()[0].to.as_str()), ("a", "b"));
    assert_eq!(graph.optimizable_count(), 0);
}

#[test]
fn blank_reason_falls_back_to_generic() {
    let graph = graph_of("wide_fanout.json");
    let worker = graph.node("w3").expect("w3");
    assert!(worker.is_optimizable);
    assert_eq!(worker.optimization_reason, GENERIC_OPTIMIZATION_REASON);
}

#[test]
fn normalization_is_deterministic() {
    let value = fixture("cycles.json");
    let payload = WorkflowPayload::detect(&value).expect("recognized");
    assert_eq!(normalize(&payload), normalize(&payload));
}

#[derive(Default)]
struct HostState {
    document: Option<String>,
    attaches: usize,
    detaches: usize,
}

struct HostMount(Rc<RefCell<HostState>>);

impl MountPoint for HostMount {
    fn viewport(&self) -> Viewport {
        Viewport::new(640.0, 480.0)
    }

    fn attach(&mut self, svg: String) {
        let mut state = self.0.borrow_mut();
        state.document = Some(svg);
        state.attaches += 1;
    }

    fn detach(&mut self) {
        let mut state = self.0.borrow_mut();
        state.document = None;
        state.detaches += 1;
    }

    fn is_fullscreen(&self) -> bool {
        false
    }

    fn request_fullscreen(&mut self) -> Result<(), FullscreenError> {
        Err(FullscreenError::Rejected("not allowed in tests".to_string()))
    }

    fn exit_fullscreen(&mut self) -> Result<(), FullscreenError> {
        Ok(())
    }
}

#[test]
fn graph_view_follows_workflow_changes() {
    let state = Rc::new(RefCell::new(HostState::default()));
    let mut config = Config::default();
    config.layout.fast_text_metrics = true;
    {
        let mut view = GraphView::new(HostMount(state.clone()), config);
        let response = fixture("analysis_response.json");

        assert!(view.set_workflow(Some(&response)));
        assert!(!view.set_workflow(Some(&response)));
        // Same workflow, bare instead of wrapped.
        assert!(!view.set_workflow(response.get("workflow")));
        view.toggle_fullscreen();
        assert_eq!(view.render_count(), 1);

        assert!(view.set_workflow(Some(&fixture("graph_basic.json"))));
        assert_eq!(view.render_count(), 2);
        assert!(
            state
                .borrow()
                .document
                .as_deref()
                .is_some_and(|svg| svg.contains("vectorize loop"))
        );
    }
    let state = state.borrow();
    assert_eq!(state.attaches, 2);
    assert_eq!(state.detaches, 2);
    assert!(state.document.is_none());
}

#[cfg(feature = "png")]
#[test]
fn export_is_twice_the_content_bounds() {
    use codeflow_graph::export::{DownloadAnchor, DownloadSink, ExportError, export_as_image};
    use codeflow_graph::surface::Surface;

    struct Collect(Vec<DownloadAnchor>);

    impl DownloadSink for Collect {
        fn deliver(&mut self, anchor: &DownloadAnchor) -> Result<(), ExportError> {
            self.0.push(anchor.clone());
            Ok(())
        }
    }

    let mut config = Config::default();
    config.layout.fast_text_metrics = true;
    let surface = Surface::new(
        graph_of("wide_fanout.json"),
        config.theme.clone(),
        &config.layout,
        Viewport::new(320.0, 240.0),
        &config.view,
    );
    let mut sink = Collect(Vec::new());
    let image = tokio_test::block_on(export_as_image(&surface, &config, &mut sink))
        .expect("export succeeds");

    let bounds = surface.bounds();
    assert_eq!(image.width, (bounds.width * 2.0) as u32);
    assert_eq!(image.height, (bounds.height * 2.0) as u32);
    assert_eq!(sink.0.len(), 1);
    assert_eq!(sink.0[0].download, "code-flow.png");
    assert_eq!(sink.0[0].href, image.data_uri);
}
