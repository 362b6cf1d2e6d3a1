//! Rasterization of exported SVG and image encoding.

use crate::export::{ExportError, ExportFormat};
use image::ImageEncoder;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;

/// Largest raster side in pixels.
pub const MAX_DIMENSION: u32 = 16384;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Straight-alpha RGBA pixels.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// 4 bytes per pixel, row-major.
    pub rgba: Vec<u8>,
}

impl RasterImage {
    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        self.rgba.get(i..i + 4).and_then(|p| p.try_into().ok())
    }

    /// Pixels composited over white, 3 bytes each.
    fn to_rgb_over_white(&self) -> Vec<u8> {
        self.rgba
            .chunks_exact(4)
            .flat_map(|p| {
                let a = u32::from(p[3]);
                let over = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
                [over(p[0]), over(p[1]), over(p[2])]
            })
            .collect()
    }
}

/// Render SVG text to pixels, scaling its natural size by `scale`.
pub fn rasterize(svg: &str, scale: f64) -> Result<RasterImage, ExportError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(ExportError::Render(format!("invalid scale {scale}")));
    }

    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| ExportError::Render(format!("failed to parse generated SVG: {e}")))?;

    let size = tree.size();
    let width = (f64::from(size.width()) * scale).ceil();
    let height = (f64::from(size.height()) * scale).ceil();
    if width < 1.0 || height < 1.0 || width > f64::from(MAX_DIMENSION) || height > f64::from(MAX_DIMENSION) {
        return Err(ExportError::Render(format!(
            "{width}x{height} px is outside the supported 1..={MAX_DIMENSION} px range; adjust the scale"
        )));
    }
    let (width, height) = (width as u32, height as u32);

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| ExportError::Render(format!("failed to allocate {width}x{height} surface")))?;
    let transform = Transform::from_scale(scale as f32, scale as f32);
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    log::debug!("Rasterized {width}x{height} px at {scale}x");

    let rgba = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Ok(RasterImage { width, height, rgba })
}

/// Encode pixels in a raster format.
pub fn encode(image: &RasterImage, format: ExportFormat, jpeg_quality: u8) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    let (w, h) = (image.width, image.height);
    match format {
        ExportFormat::Png => {
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().map_err(encode_error)?;
            writer.write_image_data(&image.rgba).map_err(encode_error)?;
            writer.finish().map_err(encode_error)?;
        }
        ExportFormat::Jpeg => {
            let quality = jpeg_quality.clamp(1, 100);
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality)
                .write_image(&image.to_rgb_over_white(), w, h, image::ExtendedColorType::Rgb8)
                .map_err(encode_error)?;
        }
        ExportFormat::Bmp => {
            image::codecs::bmp::BmpEncoder::new(&mut out)
                .write_image(&image.rgba, w, h, image::ExtendedColorType::Rgba8)
                .map_err(encode_error)?;
        }
        ExportFormat::WebP => {
            image::codecs::webp::WebPEncoder::new_lossless(&mut out)
                .write_image(&image.rgba, w, h, image::ExtendedColorType::Rgba8)
                .map_err(encode_error)?;
        }
        ExportFormat::Svg => {
            return Err(ExportError::Encode("SVG is not a raster format".into()));
        }
    }
    Ok(out)
}

fn encode_error(e: impl std::fmt::Display) -> ExportError {
    ExportError::Encode(e.to_string())
}
