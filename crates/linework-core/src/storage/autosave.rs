//! Auto-save functionality for document persistence.
//!
//! Snapshots go to a sibling of the project file (`yard.linework` autosaves
//! to `yard.linework.autosave`) so the project itself is only ever written
//! by an explicit save.

use super::format::{LoadError, LoadedProject, load_project, to_json};
use super::{Storage, StorageResult};
use crate::assets::AssetProvider;
use crate::document::Document;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of applied actions between auto-saves.
pub const DEFAULT_AUTOSAVE_ACTIONS: u32 = 10;

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

const AUTOSAVE_SUFFIX: &str = ".autosave";

/// Path of the autosave file belonging to `project`.
pub fn autosave_path(project: &Path) -> PathBuf {
    let mut name: OsString = project.as_os_str().to_owned();
    name.push(AUTOSAVE_SUFFIX);
    PathBuf::from(name)
}

/// Load the autosave snapshot for `project`, if one exists.
pub fn recover(
    storage: &dyn Storage,
    project: &Path,
    assets: Option<&dyn AssetProvider>,
) -> Result<Option<LoadedProject>, LoadError> {
    let path = autosave_path(project);
    if !storage.exists(&path) {
        return Ok(None);
    }
    log::info!("Recovering autosave {}", path.display());
    load_project(storage, &path, assets).map(Some)
}

/// Manages automatic document snapshots.
///
/// The manager counts actions and tracks time; whether the document is
/// dirty is supplied by the caller and never changed here.
pub struct AutoSaveManager<S: Storage + ?Sized> {
    /// Storage backend.
    storage: Arc<S>,
    /// Auto-save interval.
    interval: Duration,
    /// Save after this many actions.
    every_actions: u32,
    /// Actions applied since the last snapshot.
    actions_since: u32,
    /// Last snapshot, or when counting started.
    last_save: Instant,
    /// Project path the snapshots belong to.
    target: Option<PathBuf>,
}

impl<S: Storage + ?Sized> AutoSaveManager<S> {
    /// Create a new auto-save manager with the given storage backend.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            every_actions: DEFAULT_AUTOSAVE_ACTIONS,
            actions_since: 0,
            last_save: Instant::now(),
            target: None,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Save after every `actions` actions; zero disables the action trigger.
    pub fn set_every_actions(&mut self, actions: u32) {
        self.every_actions = actions;
    }

    pub fn every_actions(&self) -> u32 {
        self.every_actions
    }

    /// Project path snapshots are written next to. `None` disables autosave.
    pub fn set_target(&mut self, project: Option<PathBuf>) {
        self.target = project;
        self.actions_since = 0;
        self.last_save = Instant::now();
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Where the next snapshot will be written.
    pub fn path(&self) -> Option<PathBuf> {
        self.target.as_deref().map(autosave_path)
    }

    /// Count one applied action.
    pub fn note_action(&mut self) {
        self.actions_since = self.actions_since.saturating_add(1);
    }

    pub fn pending_actions(&self) -> u32 {
        self.actions_since
    }

    /// Check whether a snapshot is due.
    pub fn should_save(&self, dirty: bool, now: Instant) -> bool {
        if !dirty || self.target.is_none() || self.actions_since == 0 {
            return false;
        }
        let by_count = self.every_actions > 0 && self.actions_since >= self.every_actions;
        let by_time = now.saturating_duration_since(self.last_save) >= self.interval;
        by_count || by_time
    }

    /// Write a snapshot if one is due. Returns the path written.
    pub fn maybe_save(&mut self, document: &Document, dirty: bool, now: Instant) -> StorageResult<Option<PathBuf>> {
        if !self.should_save(dirty, now) {
            return Ok(None);
        }
        self.save(document, now)
    }

    /// Write a snapshot now.
    pub fn save(&mut self, document: &Document, now: Instant) -> StorageResult<Option<PathBuf>> {
        let Some(path) = self.path() else {
            return Ok(None);
        };
        let json = to_json(document)?;
        self.storage.write_atomic(&path, json.as_bytes())?;
        log::info!("Autosaved {} entities to {}", document.len(), path.display());
        self.actions_since = 0;
        self.last_save = now;
        Ok(Some(path))
    }

    /// Remove the snapshot, after a manual save made it redundant.
    pub fn discard(&mut self) -> StorageResult<()> {
        self.actions_since = 0;
        self.last_save = Instant::now();
        match self.path() {
            Some(path) => self.storage.remove(&path),
            None => Ok(()),
        }
    }
}
