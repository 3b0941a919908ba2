//! Rasterizes a mounted surface to PNG and hands it to the host as a download.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use resvg::tiny_skia::{Color, Pixmap, Transform};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::Config;
pub use crate::config::EXPORT_SCALE;
use crate::surface::Surface;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("surface has no content to export")]
    EmptySurface,
    #[error("export scale must be a positive finite number, got {0}")]
    InvalidScale(f32),
    #[error("failed to decode serialized surface: {0}")]
    Decode(#[from] usvg::Error),
    #[error("failed to allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },
    #[error("unsupported background color '{0}'")]
    Background(String),
    #[error("failed to encode PNG: {0}")]
    Encode(String),
    #[error("download was not delivered: {0}")]
    Download(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
    pub data_uri: String,
}

/// Transient link pointing at the encoded image. It lives only for the
/// duration of a single [`DownloadSink::deliver`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadAnchor {
    pub href: String,
    pub download: String,
}

/// Host hook that turns an anchor into an actual download.
pub trait DownloadSink {
    fn deliver(&mut self, anchor: &DownloadAnchor) -> Result<(), ExportError>;
}

struct ExportJob {
    svg: String,
    width: u32,
    height: u32,
}

/// Exports `surface` as a PNG download. Any failure is logged and yields
/// `None`; nothing is delivered in that case.
pub async fn export_as_image<S: DownloadSink>(
    surface: &Surface,
    config: &Config,
    sink: &mut S,
) -> Option<ExportedImage> {
    let result = match render_image(surface, config).await {
        Ok(image) => deliver(&image, &config.export.file_name, sink).map(|()| image),
        Err(err) => Err(err),
    };
    match result {
        Ok(image) => {
            info!(
                width = image.width,
                height = image.height,
                file = %config.export.file_name,
                "exported code flow image"
            );
            Some(image)
        }
        Err(err) => {
            error!(error = %err, "code flow export failed");
            None
        }
    }
}

/// Synchronous counterpart of [`export_as_image`] without the download step.
pub fn rasterize(surface: &Surface, config: &Config) -> Result<ExportedImage, ExportError> {
    let job = serialize(surface, config.export.scale)?;
    let tree = parse_tree(&job.svg, &config.export.font_family)?;
    finish(&tree, &job, config.export_background())
}

async fn render_image(surface: &Surface, config: &Config) -> Result<ExportedImage, ExportError> {
    let job = serialize(surface, config.export.scale)?;
    let tree = decode_image(&job.svg, &config.export.font_family).await?;
    finish(&tree, &job, config.export_background())
}

fn serialize(surface: &Surface, scale: f32) -> Result<ExportJob, ExportError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ExportError::InvalidScale(scale));
    }
    let bounds = surface.bounds();
    if bounds.is_empty() {
        return Err(ExportError::EmptySurface);
    }
    let width = (bounds.width * scale).ceil();
    let height = (bounds.height * scale).ceil();
    if width > u32::MAX as f32 || height > u32::MAX as f32 {
        return Err(ExportError::InvalidScale(scale));
    }
    debug!(width, height, scale, "serializing surface for export");
    Ok(ExportJob {
        svg: surface.serialize(scale),
        width: width as u32,
        height: height as u32,
    })
}

/// Decodes serialized SVG into a render tree.
pub async fn decode_image(svg: &str, font_family: &str) -> Result<usvg::Tree, ExportError> {
    parse_tree(svg, font_family)
}

fn parse_tree(svg: &str, font_family: &str) -> Result<usvg::Tree, ExportError> {
    let mut options = usvg::Options::default();
    options.font_family = font_family.to_string();
    options.fontdb_mut().load_system_fonts();
    Ok(usvg::Tree::from_str(svg, &options)?)
}

fn finish(tree: &usvg::Tree, job: &ExportJob, background: &str) -> Result<ExportedImage, ExportError> {
    let pixmap = draw_to_canvas(tree, job.width, job.height, background)?;
    let (png, data_uri) = encode_png_data_uri(&pixmap)?;
    Ok(ExportedImage {
        width: job.width,
        height: job.height,
        png,
        data_uri,
    })
}

/// Paints `background` over the whole canvas, then draws the tree on top.
fn draw_to_canvas(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
    background: &str,
) -> Result<Pixmap, ExportError> {
    let color = parse_opaque_color(background)
        .ok_or_else(|| ExportError::Background(background.to_string()))?;
    let mut pixmap = Pixmap::new(width, height).ok_or(ExportError::Canvas { width, height })?;
    pixmap.fill(color);
    resvg::render(tree, Transform::default(), &mut pixmap.as_mut());
    Ok(pixmap)
}

fn encode_png_data_uri(pixmap: &Pixmap) -> Result<(Vec<u8>, String), ExportError> {
    let png = pixmap
        .encode_png()
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    let data_uri = format!("{PNG_DATA_URI_PREFIX}{}", BASE64_STANDARD.encode(&png));
    Ok((png, data_uri))
}

fn deliver<S: DownloadSink>(
    image: &ExportedImage,
    file_name: &str,
    sink: &mut S,
) -> Result<(), ExportError> {
    let anchor = DownloadAnchor {
        href: image.data_uri.clone(),
        download: file_name.to_string(),
    };
    sink.deliver(&anchor)
}

/// Splits a PNG data URI back into raw bytes.
pub fn decode_png_data_uri(data_uri: &str) -> Result<Vec<u8>, ExportError> {
    let payload = data_uri
        .strip_prefix(PNG_DATA_URI_PREFIX)
        .ok_or_else(|| ExportError::Download("not a PNG data URI".to_string()))?;
    BASE64_STANDARD
        .decode(payload)
        .map_err(|err| ExportError::Download(err.to_string()))
}

// Any CSS color; alpha is forced to opaque. Fully transparent is rejected.
fn parse_opaque_color(value: &str) -> Option<Color> {
    let color: svgtypes::Color = value.trim().parse().ok()?;
    if color.alpha == 0 {
        return None;
    }
    Some(Color::from_rgba8(color.red, color.green, color.blue, 255))
}
