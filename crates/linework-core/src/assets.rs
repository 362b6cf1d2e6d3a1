//! Icon artwork resolution.
//!
//! Built-in icons resolve to vector primitives; picture icons are read from
//! the `assets/` directory next to the project file.

use crate::entities::IconRef;
use crate::icons::BuiltinIcon;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Name of the asset directory colocated with a project file.
pub const ASSETS_DIR: &str = "assets";

/// Asset errors.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    Missing(String),
    #[error("asset IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported picture format: {0}")]
    UnknownFormat(String),
}

/// Picture formats accepted for icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureFormat {
    Png,
    Jpeg,
    WebP,
    Bmp,
    Svg,
}

impl PictureFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            PictureFormat::Png => "image/png",
            PictureFormat::Jpeg => "image/jpeg",
            PictureFormat::WebP => "image/webp",
            PictureFormat::Bmp => "image/bmp",
            PictureFormat::Svg => "image/svg+xml",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(PictureFormat::Png),
            "jpg" | "jpeg" => Some(PictureFormat::Jpeg),
            "webp" => Some(PictureFormat::WebP),
            "bmp" => Some(PictureFormat::Bmp),
            "svg" => Some(PictureFormat::Svg),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect raster formats from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(PictureFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(PictureFormat::Jpeg);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(PictureFormat::WebP);
        }
        if data.starts_with(b"BM") {
            return Some(PictureFormat::Bmp);
        }
        None
    }
}

/// Resolved artwork for an icon.
#[derive(Debug, Clone, PartialEq)]
pub enum IconArt {
    Vector(BuiltinIcon),
    Picture { bytes: Vec<u8>, format: PictureFormat },
}

/// Resolves icon references to drawable artwork.
pub trait AssetProvider: Send + Sync {
    fn resolve(&self, icon: &IconRef) -> Result<IconArt, AssetError>;

    /// Whether a picture path can be resolved, without reading it.
    fn picture_exists(&self, path: &str) -> bool;
}

fn resolve_builtin(name: &str) -> Result<IconArt, AssetError> {
    BuiltinIcon::from_name(name)
        .map(IconArt::Vector)
        .ok_or_else(|| AssetError::Missing(format!("builtin icon '{name}'")))
}

fn picture_format(path: &str, bytes: &[u8]) -> Result<PictureFormat, AssetError> {
    PictureFormat::from_path(Path::new(path))
        .or_else(|| PictureFormat::from_magic_bytes(bytes))
        .ok_or_else(|| AssetError::UnknownFormat(path.to_string()))
}

/// Filesystem asset provider rooted at a project's asset directory.
#[derive(Debug, Clone)]
pub struct FsAssetProvider {
    root: PathBuf,
}

impl FsAssetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Provider for the `assets/` directory next to `project`.
    pub fn for_project(project: &Path) -> Self {
        let dir = project.parent().unwrap_or(Path::new("."));
        Self::new(dir.join(ASSETS_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a picture, or `None` if `rel` would leave the asset
    /// directory.
    fn picture_path(&self, rel: &str) -> Option<PathBuf> {
        let rel = Path::new(rel);
        let inside = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        (inside && rel.file_name().is_some()).then(|| self.root.join(rel))
    }

    /// Copy a picture into the asset directory under a collision-free name.
    ///
    /// Returns the path relative to the asset directory, as stored in
    /// [`IconRef::Picture`].
    pub fn import_picture(&self, source: &Path) -> Result<String, AssetError> {
        if PictureFormat::from_path(source).is_none() {
            return Err(AssetError::UnknownFormat(source.display().to_string()));
        }
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AssetError::Missing(source.display().to_string()))?;
        if !source.exists() {
            return Err(AssetError::Missing(source.display().to_string()));
        }
        std::fs::create_dir_all(&self.root)?;

        let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("picture");
        let ext = source.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let mut name = file_name.to_string();
        let mut n = 1;
        while self.root.join(&name).exists() {
            name = format!("{stem}_{n}.{ext}");
            n += 1;
        }
        std::fs::copy(source, self.root.join(&name))?;
        log::info!("Imported picture {} as {}", source.display(), name);
        Ok(name)
    }

    /// Pictures currently in the asset directory, sorted case-insensitively.
    pub fn list_pictures(&self) -> Result<Vec<String>, AssetError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && PictureFormat::from_path(p).is_some())
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        Ok(names)
    }
}

impl AssetProvider for FsAssetProvider {
    fn resolve(&self, icon: &IconRef) -> Result<IconArt, AssetError> {
        match icon {
            IconRef::Builtin { name } => resolve_builtin(name),
            IconRef::Picture { path } => {
                let full = self
                    .picture_path(path)
                    .ok_or_else(|| AssetError::Missing(path.clone()))?;
                let bytes = match std::fs::read(&full) {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(AssetError::Missing(path.clone()));
                    }
                    Err(e) => return Err(e.into()),
                };
                let format = picture_format(path, &bytes)?;
                Ok(IconArt::Picture { bytes, format })
            }
        }
    }

    fn picture_exists(&self, path: &str) -> bool {
        self.picture_path(path).is_some_and(|p| p.is_file())
    }
}

/// In-memory asset provider for tests and headless tools.
#[derive(Debug, Default)]
pub struct MemoryAssetProvider {
    pictures: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAssetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut pictures) = self.pictures.write() {
            pictures.insert(path.into(), bytes);
        }
    }
}

impl AssetProvider for MemoryAssetProvider {
    fn resolve(&self, icon: &IconRef) -> Result<IconArt, AssetError> {
        match icon {
            IconRef::Builtin { name } => resolve_builtin(name),
            IconRef::Picture { path } => {
                let bytes = self
                    .pictures
                    .read()
                    .ok()
                    .and_then(|p| p.get(path).cloned())
                    .ok_or_else(|| AssetError::Missing(path.clone()))?;
                let format = picture_format(path, &bytes)?;
                Ok(IconArt::Picture { bytes, format })
            }
        }
    }

    fn picture_exists(&self, path: &str) -> bool {
        self.pictures
            .read()
            .map(|p| p.contains_key(path))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_resolve_builtin() {
        let assets = MemoryAssetProvider::new();
        let art = assets.resolve(&IconRef::builtin("signal")).unwrap();
        assert_eq!(art, IconArt::Vector(BuiltinIcon::Signal));
        assert!(matches!(
            assets.resolve(&IconRef::builtin("nope")),
            Err(AssetError::Missing(_))
        ));
    }

    #[test]
    fn test_fs_missing_picture() {
        let dir = TempDir::new().unwrap();
        let assets = FsAssetProvider::for_project(&dir.path().join("yard.linework"));
        assert_eq!(assets.root(), dir.path().join(ASSETS_DIR));
        assert!(!assets.picture_exists("gone.png"));
        assert!(matches!(
            assets.resolve(&IconRef::picture("gone.png")),
            Err(AssetError::Missing(_))
        ));
    }

    #[test]
    fn test_fs_paths_stay_inside_assets() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("outside.png"), PNG_MAGIC).unwrap();
        std::fs::create_dir_all(dir.path().join(ASSETS_DIR).join("signals")).unwrap();
        std::fs::write(dir.path().join(ASSETS_DIR).join("signals").join("home.png"), PNG_MAGIC).unwrap();
        let assets = FsAssetProvider::for_project(&dir.path().join("yard.linework"));

        assert!(assets.picture_exists("signals/home.png"));
        assert!(!assets.picture_exists("../outside.png"));
        assert!(matches!(
            assets.resolve(&IconRef::picture("../outside.png")),
            Err(AssetError::Missing(_))
        ));
        let absolute = dir.path().join("outside.png").display().to_string();
        assert!(!assets.picture_exists(&absolute));
        assert!(matches!(
            assets.resolve(&IconRef::picture(absolute)),
            Err(AssetError::Missing(_))
        ));
    }

    #[test]
    fn test_import_picture_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("depot.png");
        std::fs::write(&source, PNG_MAGIC).unwrap();
        let assets = FsAssetProvider::new(dir.path().join(ASSETS_DIR));

        assert_eq!(assets.import_picture(&source).unwrap(), "depot.png");
        assert_eq!(assets.import_picture(&source).unwrap(), "depot_1.png");
        assert_eq!(assets.list_pictures().unwrap(), vec!["depot.png", "depot_1.png"]);

        let art = assets.resolve(&IconRef::picture("depot_1.png")).unwrap();
        assert!(matches!(art, IconArt::Picture { format: PictureFormat::Png, .. }));
    }

    #[test]
    fn test_import_rejects_unknown_format() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, b"hello").unwrap();
        let assets = FsAssetProvider::new(dir.path().join(ASSETS_DIR));
        assert!(matches!(
            assets.import_picture(&source),
            Err(AssetError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_magic_bytes() {
        assert_eq!(PictureFormat::from_magic_bytes(&PNG_MAGIC), Some(PictureFormat::Png));
        assert_eq!(PictureFormat::from_magic_bytes(b"BM\0\0"), Some(PictureFormat::Bmp));
        assert_eq!(PictureFormat::from_magic_bytes(b"??"), None);
    }
}
