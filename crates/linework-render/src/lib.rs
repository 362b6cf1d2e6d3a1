//! Linework Render Library
//!
//! Turns document snapshots into SVG, PNG, JPEG, BMP and WebP files.
//! Raster output is produced by rasterizing the same SVG the vector
//! exporter writes.

pub mod export;
pub mod raster;
pub mod scene;
pub mod svg;
pub mod worker;

pub use export::{BASE_DPI, CancelToken, ExportError, ExportFormat, ExportOptions, export_to_path, render};
pub use raster::{RasterImage, rasterize};
pub use scene::{ExportArea, Scene, SceneItem, SceneOptions};
pub use svg::{write_svg, write_svg_scaled};
pub use worker::{ExportEvent, ExportJob, ExportWorker};
