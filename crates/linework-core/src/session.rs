//! Editor session: a document with its history, selection, view and files.

use crate::assets::{ASSETS_DIR, AssetProvider, FsAssetProvider};
use crate::command::{Command, CommandResult};
use crate::config::EditorDefaults;
use crate::document::Document;
use crate::entities::EntityId;
use crate::hit_test::{self, HandleHit};
use crate::history::History;
use crate::selection::Selection;
use crate::snap::{self, SnapContext, SnapResult};
use crate::storage::{
    AutoSaveManager, FileStorage, LoadError, LoadWarning, Storage, StorageError, autosave_path, load_project,
    recover, save_project,
};
use crate::viewport::Viewport;
use kurbo::{Point, Rect, Vec2};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Notifications for the UI, drained with [`Session::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    DocumentChanged,
    SelectionChanged,
    HistoryChanged,
    Saved(PathBuf),
    Autosaved(PathBuf),
    Warning(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the document has no file name yet")]
    NoPath,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// One open document and everything that edits it.
pub struct Session {
    document: Document,
    history: History,
    selection: Selection,
    viewport: Viewport,
    defaults: EditorDefaults,
    path: Option<PathBuf>,
    storage: Arc<dyn Storage>,
    autosave: AutoSaveManager<dyn Storage>,
    assets: Arc<dyn AssetProvider>,
    /// Re-root assets next to the project on open and save-as.
    assets_follow_project: bool,
    events: Vec<SessionEvent>,
}

impl Session {
    /// An untitled session on the filesystem.
    pub fn new(defaults: EditorDefaults) -> Self {
        let mut session = Self::with_backends(
            defaults,
            Arc::new(FileStorage::new()),
            Arc::new(FsAssetProvider::new(ASSETS_DIR)),
        );
        session.assets_follow_project = true;
        session
    }

    /// A session over explicit storage and assets.
    pub fn with_backends(defaults: EditorDefaults, storage: Arc<dyn Storage>, assets: Arc<dyn AssetProvider>) -> Self {
        let mut autosave = AutoSaveManager::new(storage.clone());
        autosave.set_every_actions(defaults.autosave_actions);
        autosave.set_interval(defaults.autosave_interval());
        Self {
            document: Document::with_settings(defaults.grid.clone(), defaults.canvas.clone()),
            history: History::new(),
            selection: Selection::new(),
            viewport: Viewport::new(),
            defaults,
            path: None,
            storage,
            autosave,
            assets,
            assets_follow_project: false,
            events: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn defaults(&self) -> &EditorDefaults {
        &self.defaults
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn assets(&self) -> Arc<dyn AssetProvider> {
        self.assets.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.history.is_dirty()
    }

    /// Drain pending notifications.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    fn set_path(&mut self, path: PathBuf) {
        if self.assets_follow_project {
            self.assets = Arc::new(FsAssetProvider::for_project(&path));
        }
        self.autosave.set_target(Some(path.clone()));
        self.path = Some(path);
    }

    fn replace_document(&mut self, document: Document, warnings: Vec<LoadWarning>) {
        self.document = document;
        self.history.clear();
        let selection_changed = self.selection.clear();
        self.emit(SessionEvent::DocumentChanged);
        if selection_changed {
            self.emit(SessionEvent::SelectionChanged);
        }
        self.emit(SessionEvent::HistoryChanged);
        for warning in warnings {
            self.emit(SessionEvent::Warning(warning.to_string()));
        }
    }

    // Files

    /// Open a project, replacing the current document.
    ///
    /// On error the session is unchanged.
    pub fn open(&mut self, path: &Path) -> Result<(), SessionError> {
        let assets: Arc<dyn AssetProvider> = if self.assets_follow_project {
            Arc::new(FsAssetProvider::for_project(path))
        } else {
            self.assets.clone()
        };
        let loaded = load_project(self.storage.as_ref(), path, Some(assets.as_ref()))?;
        self.set_path(path.to_path_buf());
        self.replace_document(loaded.document, loaded.warnings);
        if self.storage.exists(&autosave_path(path)) {
            self.emit(SessionEvent::Warning(format!(
                "{} has an autosave with unsaved changes",
                path.display()
            )));
        }
        Ok(())
    }

    /// Replace the document with the autosave of the current project.
    ///
    /// Returns false when there is none. The recovered document is unsaved.
    pub fn recover_autosave(&mut self) -> Result<bool, SessionError> {
        let Some(path) = self.path.clone() else {
            return Err(SessionError::NoPath);
        };
        let Some(loaded) = recover(self.storage.as_ref(), &path, Some(self.assets.as_ref()))? else {
            return Ok(false);
        };
        self.replace_document(loaded.document, loaded.warnings);
        self.history.forget_save_point();
        Ok(true)
    }

    /// Save to the current path.
    pub fn save(&mut self) -> Result<PathBuf, SessionError> {
        let path = self.path.clone().ok_or(SessionError::NoPath)?;
        save_project(self.storage.as_ref(), &path, &self.document)?;
        self.history.mark_saved();
        if let Err(e) = self.autosave.discard() {
            log::warn!("Could not remove autosave for {}: {e}", path.display());
        }
        self.emit(SessionEvent::Saved(path.clone()));
        self.emit(SessionEvent::HistoryChanged);
        Ok(path)
    }

    /// Save under a new path, which becomes the current one.
    pub fn save_as(&mut self, path: &Path) -> Result<PathBuf, SessionError> {
        save_project(self.storage.as_ref(), path, &self.document)?;
        if self.path.as_deref() != Some(path) {
            if let Err(e) = self.autosave.discard() {
                log::warn!("Could not remove old autosave: {e}");
            }
            self.set_path(path.to_path_buf());
        }
        self.history.mark_saved();
        if let Err(e) = self.autosave.discard() {
            log::warn!("Could not remove autosave for {}: {e}", path.display());
        }
        self.emit(SessionEvent::Saved(path.to_path_buf()));
        self.emit(SessionEvent::HistoryChanged);
        Ok(path.to_path_buf())
    }

    // Editing

    pub fn apply(&mut self, cmd: Command) -> CommandResult<()> {
        self.apply_at(cmd, Instant::now())
    }

    /// [`Session::apply`] with an explicit timestamp for coalescing and autosave.
    pub fn apply_at(&mut self, cmd: Command, now: Instant) -> CommandResult<()> {
        self.history.apply_at(&mut self.document, cmd, now)?;
        self.autosave.note_action();
        self.after_change();
        self.autosave_if_due(now);
        Ok(())
    }

    /// Start a drag; moves until [`Session::end_interaction`] form one undo step.
    pub fn begin_interaction(&mut self) {
        self.history.begin_interaction();
    }

    pub fn end_interaction(&mut self) {
        self.history.end_interaction();
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.undo(&mut self.document) {
            return false;
        }
        self.autosave.note_action();
        self.after_change();
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.redo(&mut self.document) {
            return false;
        }
        self.autosave.note_action();
        self.after_change();
        true
    }

    fn after_change(&mut self) {
        self.emit(SessionEvent::DocumentChanged);
        self.emit(SessionEvent::HistoryChanged);
        if self.selection.retain_existing(&self.document) {
            self.emit(SessionEvent::SelectionChanged);
        }
    }

    /// Write an autosave snapshot if one is due.
    pub fn autosave_if_due(&mut self, now: Instant) {
        match self.autosave.maybe_save(&self.document, self.history.is_dirty(), now) {
            Ok(Some(path)) => self.emit(SessionEvent::Autosaved(path)),
            Ok(None) => {}
            Err(e) => {
                log::warn!("Autosave failed: {e}");
                self.emit(SessionEvent::Warning(format!("autosave failed: {e}")));
            }
        }
    }

    /// Delete the selected entities.
    pub fn delete_selection(&mut self) -> CommandResult<()> {
        if self.selection.is_empty() {
            return Ok(());
        }
        self.apply(Command::delete(self.selection.ids().to_vec()))
    }

    /// Move the selected entities, with grouped members following their group.
    pub fn move_selection(&mut self, delta: Vec2) -> CommandResult<()> {
        let ids: Vec<EntityId> = self
            .selection
            .expand_groups(&self.document)
            .into_iter()
            .filter(|id| self.document.get(*id).is_some_and(|e| !e.is_group()))
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.apply(Command::move_by(ids, delta))
    }

    /// Group the selection; the new group becomes the selection.
    pub fn group_selection(&mut self) -> CommandResult<Option<EntityId>> {
        if self.selection.len() < 2 {
            return Ok(None);
        }
        let (cmd, group) = Command::group(self.selection.ids().to_vec());
        self.apply(cmd)?;
        self.select([group]);
        Ok(Some(group))
    }

    // Picking

    /// Topmost entity under a screen point.
    pub fn hit_test(&self, screen_point: Point) -> Option<EntityId> {
        let point = self.viewport.screen_to_world(screen_point);
        hit_test::hit_test(&self.document, point, self.tolerance())
    }

    /// Handle of a selected entity under a screen point.
    pub fn hit_test_handles(&self, screen_point: Point) -> Option<HandleHit> {
        let point = self.viewport.screen_to_world(screen_point);
        hit_test::hit_test_handles(&self.document, &self.selection, point, self.tolerance())
    }

    fn tolerance(&self) -> f64 {
        self.viewport.screen_to_world_distance(self.defaults.hit_tolerance)
    }

    /// Select what is under a screen point. Additive clicks toggle; a plain
    /// click on empty space clears the selection. A click on a handle of a
    /// selected entity returns that entity and keeps the selection.
    pub fn click(&mut self, screen_point: Point, additive: bool) -> Option<EntityId> {
        if let Some(handle) = self.hit_test_handles(screen_point) {
            return Some(handle.id);
        }
        let hit = self.hit_test(screen_point);
        let changed = match (hit, additive) {
            (Some(id), true) => self.selection.toggle(id),
            (Some(id), false) => self.selection.set([id]),
            (None, true) => false,
            (None, false) => self.selection.clear(),
        };
        if changed {
            self.emit(SessionEvent::SelectionChanged);
        }
        hit
    }

    /// Select the entities touched by a screen-space rectangle.
    pub fn marquee(&mut self, screen_rect: Rect, additive: bool) -> Vec<EntityId> {
        let rect = self.viewport.screen_rect_to_world(screen_rect);
        let hits = hit_test::marquee_test(&self.document, rect);
        let changed = if additive {
            hits.iter().fold(false, |changed, id| self.selection.add(*id) | changed)
        } else {
            self.selection.set(hits.iter().copied())
        };
        if changed {
            self.emit(SessionEvent::SelectionChanged);
        }
        hits
    }

    /// Snap a document point, optionally dragged from `anchor`, ignoring the
    /// entities in `exclude`. Handles of the other selected entities attract
    /// like endpoints. Results stay on the canvas.
    pub fn snap(&self, point: Point, anchor: Option<Point>, exclude: &[EntityId]) -> SnapResult {
        let handles = self
            .selection
            .ids()
            .iter()
            .filter(|id| !exclude.contains(id))
            .filter_map(|id| self.document.get(*id))
            .flat_map(|e| e.handles())
            .map(|h| h.position);
        let mut context = SnapContext::new()
            .excluding(exclude.iter().copied())
            .within(self.document.canvas().rect())
            .with_handles(handles);
        if let Some(anchor) = anchor {
            context = context.with_anchor(anchor);
        }
        let mut config = self.defaults.snap.clone();
        config.endpoint_radius = self.viewport.screen_to_world_distance(config.endpoint_radius);
        snap::snap(point, &self.document, &config, &context)
    }

    // Selection

    pub fn select(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        if self.selection.set(ids) {
            self.emit(SessionEvent::SelectionChanged);
        }
    }

    pub fn add_to_selection(&mut self, id: EntityId) {
        if self.selection.add(id) {
            self.emit(SessionEvent::SelectionChanged);
        }
    }

    pub fn toggle_selection(&mut self, id: EntityId) {
        if self.selection.toggle(id) {
            self.emit(SessionEvent::SelectionChanged);
        }
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.emit(SessionEvent::SelectionChanged);
        }
    }

    pub fn select_all(&mut self) {
        if self.selection.select_all(&self.document) {
            self.emit(SessionEvent::SelectionChanged);
        }
    }

    // Defaults

    /// Replace the editor defaults. Existing entities are not restyled.
    pub fn update_defaults(&mut self, defaults: EditorDefaults) {
        let defaults = defaults.sanitized();
        self.autosave.set_every_actions(defaults.autosave_actions);
        self.autosave.set_interval(defaults.autosave_interval());
        self.defaults = defaults;
    }

    /// Fit the view to the document content.
    pub fn fit_to_content(&mut self, size: kurbo::Size, padding: f64) {
        match self.document.content_bounds() {
            Some(bounds) => self.viewport.fit(bounds, size, padding),
            None => self.viewport.reset(),
        }
    }
}
