//! Export of documents to image files.

use crate::raster::{self, DEFAULT_JPEG_QUALITY};
use crate::scene::{Scene, SceneOptions};
use crate::svg;
use linework_core::{AssetProvider, Document};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Resolution that corresponds to scale 1.0.
pub const BASE_DPI: f64 = 96.0;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export cancelled")]
    Cancelled,
    #[error("render failed: {0}")]
    Render(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Output file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Svg,
    Png,
    Jpeg,
    Bmp,
    /// Lossless WebP.
    WebP,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Svg,
        ExportFormat::Png,
        ExportFormat::Jpeg,
        ExportFormat::Bmp,
        ExportFormat::WebP,
    ];

    /// Preferred file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Svg => "svg",
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Bmp => "bmp",
            ExportFormat::WebP => "webp",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "svg" => Some(ExportFormat::Svg),
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "bmp" => Some(ExportFormat::Bmp),
            "webp" => Some(ExportFormat::WebP),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_raster(self) -> bool {
        self != ExportFormat::Svg
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Output pixels per document unit.
    pub scale: f64,
    /// 1 to 100, used for JPEG only.
    pub jpeg_quality: u8,
    pub scene: SceneOptions,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            scale: 1.0,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            scene: SceneOptions::default(),
        }
    }
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the scale from a resolution, 96 dpi being 1:1.
    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.scale = dpi / BASE_DPI;
        self
    }
}

/// Shared flag that stops an export between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), ExportError> {
        if self.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Render a document to encoded file contents.
pub fn render(
    doc: &Document,
    assets: &dyn AssetProvider,
    options: &ExportOptions,
    cancel: &CancelToken,
) -> Result<Vec<u8>, ExportError> {
    if !(options.scale.is_finite() && options.scale > 0.0) {
        return Err(ExportError::Render(format!("invalid scale {}", options.scale)));
    }
    let scene = Scene::build(doc, assets, &options.scene);
    cancel.check()?;

    if !options.format.is_raster() {
        return Ok(svg::write_svg_scaled(&scene, options.scale).into_bytes());
    }
    let image = raster::rasterize(&svg::write_svg(&scene), options.scale)?;
    cancel.check()?;
    raster::encode(&image, options.format, options.jpeg_quality)
}

/// Render a document and write it to `path`.
///
/// Output goes to a temporary file next to `path` that replaces it only
/// once complete, so failure or cancellation never leaves partial output.
/// Returns the number of bytes written.
pub fn export_to_path(
    doc: &Document,
    assets: &dyn AssetProvider,
    options: &ExportOptions,
    path: &Path,
    cancel: &CancelToken,
) -> Result<usize, ExportError> {
    let bytes = render(doc, assets, options, cancel)?;
    cancel.check()?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    // Dropping the temp file removes it
    cancel.check()?;
    tmp.persist(path).map_err(|e| ExportError::Io(e.error))?;

    log::info!(
        "Exported {} ({:?}, {}x) to {}",
        human_size(bytes.len()),
        options.format,
        options.scale,
        path.display()
    );
    Ok(bytes.len())
}

fn human_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ExportArea;
    use kurbo::Point;
    use linework_core::entities::{Colour, LineEntity, Style};
    use linework_core::{Command, MemoryAssetProvider};
    use tempfile::TempDir;

    fn thick_line_doc() -> Document {
        let mut style = Style::default();
        style.stroke_width = 6.0;
        style.stroke_colour = Colour::black();
        let line = LineEntity::new(Point::new(100.0, 100.0), Point::new(300.0, 100.0), style);
        let mut doc = Document::new();
        Command::add(vec![line.into()]).apply(&mut doc).unwrap();
        doc
    }

    fn no_grid(format: ExportFormat) -> ExportOptions {
        let mut options = ExportOptions::new(format);
        options.scene.grid = false;
        options
    }

    /// Endpoints parsed back out of the first polyline.
    fn polyline_points(svg: &str) -> Vec<Point> {
        let start = svg.find(r#"points=""#).unwrap() + 8;
        let end = start + svg[start..].find('"').unwrap();
        svg[start..end]
            .split(' ')
            .map(|pair| {
                let (x, y) = pair.split_once(',').unwrap();
                Point::new(x.parse().unwrap(), y.parse().unwrap())
            })
            .collect()
    }

    fn is_dark(p: [u8; 4]) -> bool {
        p[0] < 64 && p[1] < 64 && p[2] < 64 && p[3] > 192
    }

    fn is_light(p: [u8; 4]) -> bool {
        p[0] > 192 && p[1] > 192 && p[2] > 192
    }

    #[test]
    fn test_vector_and_raster_agree_at_2x() {
        let doc = thick_line_doc();
        let assets = MemoryAssetProvider::new();
        let cancel = CancelToken::new();
        let mut options = no_grid(ExportFormat::Svg).with_scale(2.0);
        options.scene.area = ExportArea::Content;

        let svg = String::from_utf8(render(&doc, &assets, &options, &cancel).unwrap()).unwrap();
        assert!(svg.contains(r#"width="480" height="80" viewBox="80 80 240 40""#));
        let points = polyline_points(&svg);
        assert_eq!(points, vec![Point::new(100.0, 100.0), Point::new(300.0, 100.0)]);

        options.format = ExportFormat::Png;
        let png = render(&doc, &assets, &options, &cancel).unwrap();
        let image = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (480, 80));

        // Map each endpoint through the page origin and scale into pixels
        let page_origin = Point::new(80.0, 80.0);
        let to_px = |p: Point| ((p.x - page_origin.x) * 2.0, (p.y - page_origin.y) * 2.0);
        let pixel = |x: f64, y: f64| image.get_pixel(x as u32, y as u32).0;
        let (sx, sy) = to_px(points[0]);
        let (ex, ey) = to_px(points[1]);
        assert_eq!((sx, sy, ex, ey), (40.0, 40.0, 440.0, 40.0));

        // Just inside both ends is ink
        assert!(is_dark(pixel(sx + 1.0, sy)));
        assert!(is_dark(pixel(ex - 2.0, ey)));
        assert!(is_dark(pixel((sx + ex) / 2.0, sy)));
        // Round caps reach 6px beyond the ends at 2x, not 12
        assert!(is_light(pixel(sx - 12.0, sy)));
        assert!(is_light(pixel(ex + 12.0, ey)));
        // Stroke is 12px thick at 2x
        assert!(is_light(pixel((sx + ex) / 2.0, sy - 12.0)));
        assert!(is_light(pixel((sx + ex) / 2.0, sy + 12.0)));
    }

    #[test]
    fn test_dpi_sets_scale() {
        let options = ExportOptions::new(ExportFormat::Png).with_dpi(192.0);
        assert_eq!(options.scale, 2.0);
    }

    #[test]
    fn test_export_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yard.png");
        let written = export_to_path(
            &thick_line_doc(),
            &MemoryAssetProvider::new(),
            &no_grid(ExportFormat::Png),
            &path,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, written);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_cancelled_export_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yard.png");
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = export_to_path(
            &thick_line_doc(),
            &MemoryAssetProvider::new(),
            &no_grid(ExportFormat::Png),
            &path,
            &cancel,
        );
        assert!(matches!(result, Err(ExportError::Cancelled)));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_export_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yard.png");
        std::fs::write(&path, b"old").unwrap();
        let options = no_grid(ExportFormat::Png).with_scale(-1.0);
        let result = export_to_path(
            &thick_line_doc(),
            &MemoryAssetProvider::new(),
            &options,
            &path,
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(ExportError::Render(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.JPEG")), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::from_path(Path::new("b.webp")), Some(ExportFormat::WebP));
        assert_eq!(ExportFormat::from_path(Path::new("b.tiff")), None);
        for format in ExportFormat::ALL {
            assert_eq!(ExportFormat::from_extension(format.extension()), Some(format));
        }
    }
}
