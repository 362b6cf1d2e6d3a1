//! Per-user editor defaults.

use crate::document::{CanvasConfig, GridConfig};
use crate::entities::{
    Anchor, Colour, DEFAULT_FONT_SIZE, IconEntity, IconRef, LabelEntity, LineCap, LineEntity, LineJoin, Style,
};
use crate::hit_test::DEFAULT_HIT_TOLERANCE;
use crate::snap::SnapConfig;
use crate::storage::{DEFAULT_AUTOSAVE_ACTIONS, DEFAULT_AUTOSAVE_INTERVAL_SECS};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name of the settings file in the user's home directory.
pub const SETTINGS_FILE: &str = "linework.settings";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Defaults applied to newly created entities and documents.
///
/// Missing fields in the settings file take the built-in values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorDefaults {
    pub line_style: Style,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub label_font_size: f64,
    pub label_colour: Colour,
    pub label_anchor: Anchor,
    pub icon: IconRef,
    pub icon_scale: f64,
    pub grid: GridConfig,
    pub canvas: CanvasConfig,
    pub snap: SnapConfig,
    /// Pick tolerance in screen pixels.
    pub hit_tolerance: f64,
    /// Autosave after this many actions; zero disables the count trigger.
    pub autosave_actions: u32,
    pub autosave_interval_secs: u64,
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            line_style: Style::default(),
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            label_font_size: DEFAULT_FONT_SIZE,
            label_colour: Colour::black(),
            label_anchor: Anchor::default(),
            icon: IconRef::builtin("signal"),
            icon_scale: 1.0,
            grid: GridConfig::default(),
            canvas: CanvasConfig::default(),
            snap: SnapConfig::default(),
            hit_tolerance: DEFAULT_HIT_TOLERANCE,
            autosave_actions: DEFAULT_AUTOSAVE_ACTIONS,
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
        }
    }
}

impl EditorDefaults {
    /// `~/linework.settings`, when a home directory is known.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(SETTINGS_FILE))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let defaults: Self = serde_json::from_str(&text)?;
        Ok(defaults.sanitized())
    }

    /// Load settings, falling back to the built-in defaults.
    ///
    /// A missing file is normal on first start; any other failure is logged.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(defaults) => defaults,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("Ignoring settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::debug!("Wrote settings to {}", path.display());
        Ok(())
    }

    /// Replace out-of-range values with the built-in ones.
    pub fn sanitized(mut self) -> Self {
        let builtin = Self::default();
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.line_style.stroke_width) {
            self.line_style.stroke_width = builtin.line_style.stroke_width;
        }
        if !positive(self.label_font_size) {
            self.label_font_size = builtin.label_font_size;
        }
        if !positive(self.icon_scale) {
            self.icon_scale = builtin.icon_scale;
        }
        if !positive(self.grid.spacing) {
            self.grid.spacing = builtin.grid.spacing;
        }
        if !positive(self.canvas.width) || !positive(self.canvas.height) {
            self.canvas = builtin.canvas;
        }
        if !(self.hit_tolerance.is_finite() && self.hit_tolerance >= 0.0) {
            self.hit_tolerance = builtin.hit_tolerance;
        }
        if !(self.snap.endpoint_radius.is_finite() && self.snap.endpoint_radius >= 0.0) {
            self.snap.endpoint_radius = builtin.snap.endpoint_radius;
        }
        self
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn new_line(&self, start: Point, end: Point) -> LineEntity {
        let mut line = LineEntity::new(start, end, self.line_style.clone());
        line.cap = self.line_cap;
        line.join = self.line_join;
        line
    }

    pub fn new_label(&self, position: Point, text: impl Into<String>) -> LabelEntity {
        let mut label = LabelEntity::new(position, text);
        label.font_size = self.label_font_size;
        label.colour = self.label_colour;
        label.anchor = self.label_anchor;
        label
    }

    pub fn new_icon(&self, position: Point) -> IconEntity {
        let mut icon = IconEntity::new(self.icon.clone(), position);
        icon.scale = self.icon_scale;
        icon
    }
}
