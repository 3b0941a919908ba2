use crate::config::ViewConfig;
use crate::layout::Bounds;

/// Scale and translation mapping content coordinates into the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale + self.translate_x,
            y * self.scale + self.translate_y,
        )
    }

    pub fn to_svg_attr(&self) -> String {
        format!(
            "translate({:.2} {:.2}) scale({:.4})",
            self.translate_x, self.translate_y, self.scale
        )
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn from_config(config: &ViewConfig) -> Self {
        Self::new(config.width, config.height)
    }

    /// Zoom-to-fit: the largest scale (capped at `config.max_zoom`) that shows
    /// all of `bounds` inside the padded viewport, with the content centered.
    /// There is no lower bound, so very large graphs still fit entirely.
    pub fn fit(&self, bounds: Bounds, config: &ViewConfig) -> ViewTransform {
        if bounds.is_empty() || self.width <= 0.0 || self.height <= 0.0 {
            return ViewTransform::IDENTITY;
        }
        let available_w = (self.width - config.fit_padding * 2.0).max(1.0);
        let available_h = (self.height - config.fit_padding * 2.0).max(1.0);
        let scale = (available_w / bounds.width)
            .min(available_h / bounds.height)
            .min(config.max_zoom)
            .max(f32::MIN_POSITIVE);
        let (cx, cy) = bounds.center();
        ViewTransform {
            scale,
            translate_x: self.width / 2.0 - cx * scale,
            translate_y: self.height / 2.0 - cy * scale,
        }
    }
}
