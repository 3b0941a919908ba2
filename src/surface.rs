//! Mounted graph surface and the controller that owns it.
//!
//! A [`GraphView`] holds at most one [`Surface`] attached to its
//! [`MountPoint`]. The surface is rebuilt only when the normalized graph
//! actually changes, and the mount is always released before a replacement
//! and when the view is dropped.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, LayoutConfig, ViewConfig};
use crate::ir::CanonicalGraph;
use crate::layout::{Bounds, Layout, compute_layout};
use crate::normalize::normalize_value;
use crate::payload::extract_workflow;
use crate::render::{render_svg_in_view, render_svg_scaled};
use crate::theme::Theme;
use crate::viewport::{ViewTransform, Viewport};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FullscreenError {
    #[error("fullscreen is not supported by this host")]
    Unsupported,
    #[error("fullscreen request was rejected: {0}")]
    Rejected(String),
}

/// Host element a surface is attached to.
pub trait MountPoint {
    fn viewport(&self) -> Viewport;
    /// Replaces whatever the mount currently shows with `svg`.
    fn attach(&mut self, svg: String);
    fn detach(&mut self);
    fn is_fullscreen(&self) -> bool;
    fn request_fullscreen(&mut self) -> Result<(), FullscreenError>;
    fn exit_fullscreen(&mut self) -> Result<(), FullscreenError>;
}

/// A laid-out graph plus the transform that fits it to a viewport.
#[derive(Debug, Clone)]
pub struct Surface {
    graph: CanonicalGraph,
    layout: Layout,
    theme: Theme,
    viewport: Viewport,
    view: ViewTransform,
}

impl Surface {
    pub fn new(
        graph: CanonicalGraph,
        theme: Theme,
        layout_config: &LayoutConfig,
        viewport: Viewport,
        view_config: &ViewConfig,
    ) -> Self {
        let layout = compute_layout(&graph, &theme, layout_config);
        let view = viewport.fit(layout.bounds(), view_config);
        Self {
            graph,
            layout,
            theme,
            viewport,
            view,
        }
    }

    pub fn graph(&self) -> &CanonicalGraph {
        &self.graph
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Content bounds in layout units, independent of the current zoom.
    pub fn bounds(&self) -> Bounds {
        self.layout.bounds()
    }

    /// Refits the content to a new viewport. Returns whether the transform
    /// changed.
    pub fn refit(&mut self, viewport: Viewport, view_config: &ViewConfig) -> bool {
        let view = viewport.fit(self.bounds(), view_config);
        let changed = view != self.view || viewport != self.viewport;
        self.viewport = viewport;
        self.view = view;
        changed
    }

    /// SVG document as mounted: viewport-sized with the fit transform applied.
    pub fn document(&self) -> String {
        render_svg_in_view(
            &self.layout,
            &self.graph,
            &self.theme,
            self.viewport,
            self.view,
        )
    }

    /// Standalone SVG of the content at `scale` times its natural size.
    pub fn serialize(&self, scale: f32) -> String {
        render_svg_scaled(&self.layout, &self.graph, &self.theme, scale)
    }
}

/// Owns a mount point and keeps it in sync with the latest workflow.
pub struct GraphView<M: MountPoint> {
    mount: M,
    config: Config,
    surface: Option<Surface>,
    attached: bool,
    render_count: usize,
}

impl<M: MountPoint> GraphView<M> {
    pub fn new(mount: M, config: Config) -> Self {
        Self {
            mount,
            config,
            surface: None,
            attached: false,
            render_count: 0,
        }
    }

    /// Applies a new workflow value. Accepts a bare payload or an object
    /// carrying a `workflow` field. Returns `true` when the surface was
    /// rebuilt.
    pub fn set_workflow(&mut self, workflow: Option<&Value>) -> bool {
        let graph = workflow
            .and_then(extract_workflow)
            .map(normalize_value)
            .filter(|graph| !graph.is_empty());

        let Some(graph) = graph else {
            if self.surface.is_some() {
                debug!("workflow cleared, tearing down surface");
            }
            self.teardown();
            return false;
        };

        if self
            .surface
            .as_ref()
            .is_some_and(|surface| surface.graph() == &graph)
        {
            debug!("workflow unchanged, keeping current surface");
            return false;
        }

        self.teardown();
        let surface = Surface::new(
            graph,
            self.config.theme.clone(),
            &self.config.layout,
            self.mount.viewport(),
            &self.config.view,
        );
        info!(
            nodes = surface.graph().nodes().len(),
            edges = surface.graph().edges().len(),
            optimizable = surface.graph().optimizable_count(),
            "rendered code flow"
        );
        self.mount.attach(surface.document());
        self.attached = true;
        self.surface = Some(surface);
        self.render_count += 1;
        true
    }

    /// Refits the current surface after the mount changed size.
    pub fn resize(&mut self) {
        let viewport = self.mount.viewport();
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if surface.refit(viewport, &self.config.view) {
            self.mount.attach(surface.document());
            self.attached = true;
        }
    }

    /// Enters fullscreen, or leaves it when already fullscreen. Host failures
    /// are logged and otherwise ignored.
    pub fn toggle_fullscreen(&mut self) {
        let result = if self.mount.is_fullscreen() {
            self.mount.exit_fullscreen()
        } else {
            self.mount.request_fullscreen()
        };
        match result {
            Ok(()) => self.resize(),
            Err(err) => debug!(error = %err, "fullscreen toggle failed"),
        }
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn mount(&self) -> &M {
        &self.mount
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of times a new surface has been built.
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    fn teardown(&mut self) {
        if self.attached {
            self.mount.detach();
            self.attached = false;
        }
        self.surface = None;
    }
}

impl<M: MountPoint> Drop for GraphView<M> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub(crate) struct MountState {
        pub(crate) document: Option<String>,
        pub(crate) attaches: usize,
        pub(crate) detaches: usize,
        pub(crate) fullscreen: bool,
        pub(crate) fullscreen_supported: bool,
        pub(crate) size: (f32, f32),
    }

    /// Mount point backed by shared state so tests can observe it after the
    /// view has been dropped.
    #[derive(Debug, Clone)]
    pub(crate) struct MemoryMount(pub(crate) Rc<RefCell<MountState>>);

    impl MemoryMount {
        pub(crate) fn new(width: f32, height: f32) -> Self {
            Self(Rc::new(RefCell::new(MountState {
                fullscreen_supported: true,
                size: (width, height),
                ..MountState::default()
            })))
        }
    }

    impl MountPoint for MemoryMount {
        fn viewport(&self) -> Viewport {
            let (width, height) = self.0.borrow().size;
            Viewport::new(width, height)
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
            self.0.borrow().fullscreen
        }

        fn request_fullscreen(&mut self) -> Result<(), FullscreenError> {
            let mut state = self.0.borrow_mut();
            if !state.fullscreen_supported {
                return Err(FullscreenError::Unsupported);
            }
            state.fullscreen = true;
            state.size = (1920.0, 1080.0);
            Ok(())
        }

        fn exit_fullscreen(&mut self) -> Result<(), FullscreenError> {
            let mut state = self.0.borrow_mut();
            state.fullscreen = false;
            state.size = (960.0, 600.0);
            Ok(())
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.layout.fast_text_metrics = true;
        config
    }

    fn workflow() -> Value {
        json!({
            "nodes": [
                {"id": "s1", "label": "Load"},
                {"id": "s2", "label": "Transform"}
            ],
            "edges": [{"id": "e1", "source": "s1", "target": "s2"}],
            "optimizableSteps": [{"id": "s2", "reason": "vectorize loop"}]
        })
    }

    #[test]
    fn identical_workflow_renders_once() {
        let mount = MemoryMount::new(960.0, 600.0);
        let state = mount.0.clone();
        let mut view = GraphView::new(mount, test_config());

        assert!(view.set_workflow(Some(&workflow())));
        assert!(!view.set_workflow(Some(&workflow())));
        assert_eq!(view.render_count(), 1);
        assert_eq!(state.borrow().attaches, 1);
        assert!(state.borrow().document.as_deref().is_some_and(|svg| svg.contains("vectorize loop")));
    }

    #[test]
    fn changed_workflow_replaces_surface() {
        let mount = MemoryMount::new(960.0, 600.0);
        let state = mount.0.clone();
        let mut view = GraphView::new(mount, test_config());

        view.set_workflow(Some(&workflow()));
        let mut changed = workflow();
        changed["optimizableSteps"] = json!([]);
        assert!(view.set_workflow(Some(&changed)));

        assert_eq!(view.render_count(), 2);
        let state = state.borrow();
        assert_eq!(state.detaches, 1);
        assert_eq!(state.attaches, 2);
        assert!(state.document.as_deref().is_some_and(|svg| !svg.contains("vectorize loop")));
    }

    #[test]
    fn absent_workflow_tears_down() {
        let mount = MemoryMount::new(960.0, 600.0);
        let state = mount.0.clone();
        let mut view = GraphView::new(mount, test_config());

        view.set_workflow(Some(&workflow()));
        assert!(!view.set_workflow(None));
        assert!(view.surface().is_none());
        assert!(state.borrow().document.is_none());

        assert!(!view.set_workflow(Some(&json!({"workflow": null}))));
        assert_eq!(state.borrow().detaches, 1);
    }

    #[test]
    fn wrapped_workflow_is_accepted() {
        let mut view = GraphView::new(MemoryMount::new(960.0, 600.0), test_config());
        assert!(view.set_workflow(Some(&json!({"workflow": workflow()}))));
        assert_eq!(view.surface().map(|s| s.graph().nodes().len()), Some(2));
    }

    #[test]
    fn drop_detaches_mount() {
        let mount = MemoryMount::new(960.0, 600.0);
        let state = mount.0.clone();
        {
            let mut view = GraphView::new(mount, test_config());
            view.set_workflow(Some(&workflow()));
        }
        let state = state.borrow();
        assert_eq!(state.detaches, 1);
        assert!(state.document.is_none());
    }

    #[test]
    fn drop_without_surface_does_not_detach() {
        let mount = MemoryMount::new(960.0, 600.0);
        let state = mount.0.clone();
        drop(GraphView::new(mount, test_config()));
        assert_eq!(state.borrow().detaches, 0);
    }

    #[test]
    fn fullscreen_toggle_refits() {
        let mount = MemoryMount::new(960.0, 600.0);
        let state = mount.0.clone();
        let mut view = GraphView::new(mount, test_config());
        view.set_workflow(Some(&workflow()));
        let before = view.surface().map(Surface::view);

        view.toggle_fullscreen();
        assert!(state.borrow().fullscreen);
        let after = view.surface().map(Surface::view);
        assert_ne!(before, after);
        assert_eq!(view.render_count(), 1);

        view.toggle_fullscreen();
        assert!(!state.borrow().fullscreen);
    }

    #[test]
    fn fullscreen_failure_is_swallowed() {
        let mount = MemoryMount::new(960.0, 600.0);
        mount.0.borrow_mut().fullscreen_supported = false;
        let state = mount.0.clone();
        let mut view = GraphView::new(mount, test_config());
        view.set_workflow(Some(&workflow()));

        view.toggle_fullscreen();
        let state = state.borrow();
        assert!(!state.fullscreen);
        assert!(state.document.is_some());
    }

    #[test]
    fn resize_keeps_graph_and_refits() {
        let mount = MemoryMount::new(960.0, 600.0);
        let state = mount.0.clone();
        let mut view = GraphView::new(mount, test_config());
        view.set_workflow(Some(&workflow()));

        state.borrow_mut().size = (300.0, 200.0);
        view.resize();
        let surface = view.surface().map(|s| (s.viewport(), s.view().scale));
        assert_eq!(surface.map(|(viewport, _)| viewport), Some(Viewport::new(300.0, 200.0)));
        assert_eq!(view.render_count(), 1);
        assert!(state.borrow().document.as_deref().is_some_and(|svg| svg.contains("width=\"300.00\"")));
    }
}
