//! The `.linework` project file format.
//!
//! A pretty-printed JSON object:
//!
//! ```json
//! { "version": 1, "app_version": "0.1.0", "grid": {..}, "canvas": {..},
//!   "entities": [ { "type": "line", "id": "..", .. }, .. ] }
//! ```
//!
//! Entities are listed in paint order. Unknown fields are ignored and
//! unknown entity types are skipped, so older builds can open newer files
//! that only add things.

use super::{Storage, StorageError, StorageResult};
use crate::assets::AssetProvider;
use crate::document::{self, CanvasConfig, Document, GridConfig};
use crate::entities::{Entity, EntityId, IconRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Format version written by this build.
pub const CURRENT_VERSION: u64 = 1;
/// Oldest format version this build reads.
pub const MIN_SUPPORTED_VERSION: u64 = 1;
/// Extension of project files.
pub const PROJECT_EXTENSION: &str = "linework";

/// Fatal load errors. The file is never modified.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported project version {found} (this build reads {min} to {max})")]
    UnsupportedVersion { found: u64, min: u64, max: u64 },
    #[error("malformed project file: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] StorageError),
}

impl LoadError {
    fn unsupported(found: u64) -> Self {
        LoadError::UnsupportedVersion {
            found,
            min: MIN_SUPPORTED_VERSION,
            max: CURRENT_VERSION,
        }
    }
}

/// Non-fatal problems found while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A picture icon's file is absent; it renders as a placeholder.
    MissingAsset { path: String },
    /// The file was written by a newer format version.
    NewerVersion { found: u64 },
    /// An entity type this build does not know was skipped.
    UnknownEntityKind { kind: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MissingAsset { path } => write!(f, "missing asset '{path}', showing a placeholder"),
            LoadWarning::NewerVersion { found } => write!(
                f,
                "file was written by format version {found}, newer than {CURRENT_VERSION}; some content may be lost on save"
            ),
            LoadWarning::UnknownEntityKind { kind } => write!(f, "skipped unknown entity type '{kind}'"),
        }
    }
}

/// A loaded project plus its warnings.
#[derive(Debug)]
pub struct LoadedProject {
    pub document: Document,
    pub warnings: Vec<LoadWarning>,
    /// Version of the application that wrote the file, when recorded.
    pub app_version: Option<String>,
}

#[derive(Serialize)]
struct ProjectOut<'a> {
    version: u64,
    app_version: &'static str,
    grid: &'a GridConfig,
    canvas: &'a CanvasConfig,
    entities: Vec<&'a Entity>,
}

#[derive(Deserialize)]
struct ProjectIn {
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    grid: GridConfig,
    #[serde(default)]
    canvas: CanvasConfig,
    #[serde(default)]
    entities: Vec<Value>,
}

/// Serialize a document to project JSON.
pub fn to_json(doc: &Document) -> StorageResult<String> {
    let out = ProjectOut {
        version: CURRENT_VERSION,
        app_version: env!("CARGO_PKG_VERSION"),
        grid: doc.grid(),
        canvas: doc.canvas(),
        entities: doc.all().collect(),
    };
    serde_json::to_string_pretty(&out).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Parse project JSON.
///
/// When `assets` is given, picture icons whose file it cannot find produce
/// [`LoadWarning::MissingAsset`].
pub fn from_json(text: &str, assets: Option<&dyn AssetProvider>) -> Result<LoadedProject, LoadError> {
    let root: Value = serde_json::from_str(text).map_err(|e| LoadError::Malformed(e.to_string()))?;
    let version = root
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| LoadError::Malformed("missing or invalid 'version'".into()))?;
    if version < MIN_SUPPORTED_VERSION {
        return Err(LoadError::unsupported(version));
    }
    let newer = version > CURRENT_VERSION;
    // Parse failures in a newer file mean its layout changed incompatibly.
    let reject = |msg: String| {
        if newer {
            LoadError::unsupported(version)
        } else {
            LoadError::Malformed(msg)
        }
    };

    let project: ProjectIn = serde_json::from_value(root).map_err(|e| reject(e.to_string()))?;
    let mut warnings = Vec::new();
    if newer {
        warnings.push(LoadWarning::NewerVersion { found: version });
    }

    let mut entities = Vec::with_capacity(project.entities.len());
    let mut skipped: Vec<EntityId> = Vec::new();
    for (index, value) in project.entities.into_iter().enumerate() {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| reject(format!("entity {index} has no 'type'")))?
            .to_string();
        if !Entity::KINDS.contains(&kind.as_str()) {
            log::warn!("Skipping unknown entity type '{kind}'");
            if let Some(id) = value.get("id").and_then(|v| serde_json::from_value(v.clone()).ok()) {
                skipped.push(id);
            }
            warnings.push(LoadWarning::UnknownEntityKind { kind });
            continue;
        }
        let entity: Entity =
            serde_json::from_value(value).map_err(|e| reject(format!("entity {index} ({kind}): {e}")))?;
        if !entity.is_well_formed() {
            return Err(reject(format!("{kind} {} has invalid geometry", entity.id())));
        }
        entities.push(entity);
    }

    // Members of skipped entities are pruned; anything else dangling is corrupt.
    for entity in &mut entities {
        if let Entity::Group(group) = entity {
            group.members.retain(|m| !skipped.contains(m));
        }
    }
    let ids: Vec<EntityId> = entities.iter().map(|e| e.id()).collect();
    for entity in &entities {
        if let Entity::Group(group) = entity {
            if let Some(missing) = group.members.iter().find(|m| !ids.contains(m)) {
                return Err(LoadError::Malformed(format!(
                    "group {} references missing entity {missing}",
                    group.meta.id
                )));
            }
        }
    }
    let groups: HashMap<_, _> = entities
        .iter()
        .filter_map(|e| match e {
            Entity::Group(g) => Some((g.meta.id, g.members.clone())),
            _ => None,
        })
        .collect();
    document::check_nesting(&groups).map_err(LoadError::Malformed)?;

    if let Some(assets) = assets {
        for entity in &entities {
            if let Entity::Icon(icon) = entity {
                if let IconRef::Picture { path } = &icon.icon {
                    if !assets.picture_exists(path) {
                        log::warn!("Missing asset {path} for icon {}", icon.meta.id);
                        warnings.push(LoadWarning::MissingAsset { path: path.clone() });
                    }
                }
            }
        }
    }

    let document = Document::from_parts(entities, project.grid, project.canvas)
        .map_err(|id| LoadError::Malformed(format!("duplicate entity id {id}")))?;
    Ok(LoadedProject {
        document,
        warnings,
        app_version: project.app_version,
    })
}

/// Write a document to `path` atomically.
pub fn save_project(storage: &dyn Storage, path: &Path, doc: &Document) -> StorageResult<()> {
    let json = to_json(doc)?;
    storage.write_atomic(path, json.as_bytes())?;
    log::info!("Saved {} entities to {}", doc.len(), path.display());
    Ok(())
}

/// Read and parse a project file.
pub fn load_project(
    storage: &dyn Storage,
    path: &Path,
    assets: Option<&dyn AssetProvider>,
) -> Result<LoadedProject, LoadError> {
    let text = storage.read(path).map_err(|e| match e {
        StorageError::Serialization(msg) => LoadError::Malformed(msg),
        other => LoadError::Io(other),
    })?;
    let loaded = from_json(&text, assets)?;
    log::info!(
        "Loaded {} entities from {} ({} warnings)",
        loaded.document.len(),
        path.display(),
        loaded.warnings.len()
    );
    Ok(loaded)
}
