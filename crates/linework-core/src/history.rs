//! Undo/redo history built on command inverses.

use crate::command::{Command, CommandKind, CommandResult};
use crate::document::Document;
use crate::entities::EntityId;
use std::time::{Duration, Instant};

/// Default window in which consecutive drags merge into one entry.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(500);

/// Whether the document matches its last save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    Dirty,
}

/// One undoable step.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub forward: Command,
    pub inverse: Command,
    pub kind: CommandKind,
    pub ids: Vec<EntityId>,
    /// When the entry was last extended.
    pub at: Instant,
}

/// Undo and redo stacks with a save point.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Undo depth at which the document was last saved; `None` once that
    /// state can no longer be reached.
    save_point: Option<usize>,
    coalesce_window: Duration,
    interaction_open: bool,
    /// Blocks merging into the top entry.
    sealed: bool,
    max_depth: Option<usize>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            save_point: Some(0),
            coalesce_window: DEFAULT_COALESCE_WINDOW,
            interaction_open: false,
            sealed: true,
            max_depth: None,
        }
    }

    /// Keep at most `depth` undo entries, dropping the oldest.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.set_max_depth(Some(depth));
        self
    }

    pub fn set_max_depth(&mut self, depth: Option<usize>) {
        self.max_depth = depth;
        self.trim();
    }

    pub fn set_coalesce_window(&mut self, window: Duration) {
        self.coalesce_window = window;
    }

    pub fn coalesce_window(&self) -> Duration {
        self.coalesce_window
    }

    /// Apply a command and record it.
    pub fn apply(&mut self, doc: &mut Document, cmd: Command) -> CommandResult<()> {
        self.apply_at(doc, cmd, Instant::now())
    }

    /// [`History::apply`] with an explicit timestamp for coalescing.
    pub fn apply_at(&mut self, doc: &mut Document, cmd: Command, now: Instant) -> CommandResult<()> {
        let inverse = cmd.apply(doc)?;

        self.redo_stack.clear();
        if self.save_point.is_some_and(|sp| sp > self.undo_stack.len()) {
            self.save_point = None;
        }

        if self.try_merge(&cmd, now) {
            log::debug!("Coalesced {:?} into previous entry", cmd.kind());
            return Ok(());
        }

        self.undo_stack.push(HistoryEntry {
            kind: cmd.kind(),
            ids: cmd.ids(),
            forward: cmd,
            inverse,
            at: now,
        });
        self.sealed = false;
        self.trim();
        Ok(())
    }

    /// Fold `cmd` into the top entry. Drag inverses restore absolute values,
    /// so the top entry's inverse already undoes the whole drag; the forward
    /// command becomes the run of steps so redo repeats them exactly.
    fn try_merge(&mut self, cmd: &Command, now: Instant) -> bool {
        if self.sealed || self.save_point == Some(self.undo_stack.len()) {
            return false;
        }
        let interaction_open = self.interaction_open;
        let window = self.coalesce_window;
        let Some(top) = self.undo_stack.last_mut() else {
            return false;
        };
        let in_window = interaction_open || now.saturating_duration_since(top.at) <= window;
        if !in_window || top.kind != cmd.kind() {
            return false;
        }
        let Some(merged) = top.forward.merge(cmd) else {
            return false;
        };
        top.forward = merged;
        top.at = now;
        true
    }

    fn trim(&mut self) {
        let Some(max) = self.max_depth else {
            return;
        };
        while self.undo_stack.len() > max {
            self.undo_stack.remove(0);
            self.save_point = match self.save_point {
                Some(0) | None => None,
                Some(sp) => Some(sp - 1),
            };
        }
    }

    /// Start a continuous interaction (a drag): commands merge into one entry
    /// until [`History::end_interaction`], regardless of the time window.
    pub fn begin_interaction(&mut self) {
        self.sealed = true;
        self.interaction_open = true;
    }

    pub fn end_interaction(&mut self) {
        self.interaction_open = false;
        self.sealed = true;
    }

    pub fn in_interaction(&self) -> bool {
        self.interaction_open
    }

    /// Undo the last entry. Returns false when there is nothing to undo or
    /// the inverse could not be applied.
    pub fn undo(&mut self, doc: &mut Document) -> bool {
        let Some(entry) = self.undo_stack.pop() else {
            return false;
        };
        self.sealed = true;
        match entry.inverse.apply(doc) {
            Ok(_) => {
                self.redo_stack.push(entry);
                true
            }
            Err(e) => {
                log::error!("Undo of {:?} failed: {e}", entry.kind);
                self.undo_stack.push(entry);
                false
            }
        }
    }

    /// Redo the last undone entry.
    pub fn redo(&mut self, doc: &mut Document) -> bool {
        let Some(mut entry) = self.redo_stack.pop() else {
            return false;
        };
        self.sealed = true;
        match entry.forward.apply(doc) {
            Ok(inverse) => {
                entry.inverse = inverse;
                self.undo_stack.push(entry);
                true
            }
            Err(e) => {
                log::error!("Redo of {:?} failed: {e}", entry.kind);
                self.redo_stack.push(entry);
                false
            }
        }
    }

    /// Record the current state as saved.
    pub fn mark_saved(&mut self) {
        self.save_point = Some(self.undo_stack.len());
        self.sealed = true;
    }

    /// Treat the current state as unsaved, e.g. after recovering an autosave.
    pub fn forget_save_point(&mut self) {
        self.save_point = None;
    }

    pub fn state(&self) -> DirtyState {
        if self.save_point == Some(self.undo_stack.len()) {
            DirtyState::Clean
        } else {
            DirtyState::Dirty
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state() == DirtyState::Dirty
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Label of the entry [`History::undo`] would revert.
    pub fn undo_label(&self) -> Option<&'static str> {
        self.undo_stack.last().map(|e| e.kind.label())
    }

    pub fn redo_label(&self) -> Option<&'static str> {
        self.redo_stack.last().map(|e| e.kind.label())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.undo_stack
    }

    /// Forget everything; the current document becomes the saved state.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.save_point = Some(0);
        self.interaction_open = false;
        self.sealed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GridConfig;
    use crate::entities::{Entity, LabelEntity, LineEntity, Style};
    use crate::selection::{Corner, HandleKind};
    use kurbo::{Point, Vec2};

    fn setup() -> (Document, History, EntityId) {
        let mut doc = Document::new();
        let mut history = History::new();
        let line: Entity = LineEntity::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0), Style::default()).into();
        let id = line.id();
        history.apply(&mut doc, Command::add(vec![line])).unwrap();
        (doc, history, id)
    }

    fn start(doc: &Document, id: EntityId) -> Point {
        match doc.get(id) {
            Some(Entity::Line(l)) => l.start(),
            _ => panic!("line missing"),
        }
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let (mut doc, mut history, id) = setup();
        let after_add = doc.clone();
        history.apply(&mut doc, Command::move_by(vec![id], Vec2::new(10.0, 0.0))).unwrap();
        let after_move = doc.clone();

        assert!(history.undo(&mut doc));
        assert_eq!(doc, after_add);
        assert!(history.redo(&mut doc));
        assert_eq!(doc, after_move);

        assert!(history.undo(&mut doc));
        assert!(history.undo(&mut doc));
        assert!(doc.is_empty());
        assert!(!history.undo(&mut doc));
    }

    #[test]
    fn test_undo_clears_redo() {
        let (mut doc, mut history, id) = setup();
        history.apply(&mut doc, Command::move_by(vec![id], Vec2::new(10.0, 0.0))).unwrap();
        history.undo(&mut doc);
        assert!(history.can_redo());
        history.apply(&mut doc, Command::delete(vec![id])).unwrap();
        assert!(!history.can_redo());
        assert!(!history.redo(&mut doc));
    }

    #[test]
    fn test_failed_command_not_recorded() {
        let (mut doc, mut history, _) = setup();
        let ghost = uuid::Uuid::new_v4();
        assert!(history.apply(&mut doc, Command::delete(vec![ghost])).is_err());
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn test_five_moves_coalesce() {
        let (mut doc, mut history, id) = setup();
        let t0 = Instant::now();
        for i in 0..5 {
            let cmd = Command::move_by(vec![id], Vec2::new(2.0, 1.0));
            history.apply_at(&mut doc, cmd, t0 + Duration::from_millis(100 * i)).unwrap();
        }
        assert_eq!(history.undo_len(), 2);
        assert_eq!(start(&doc, id), Point::new(10.0, 5.0));
        assert!(history.undo(&mut doc));
        assert_eq!(start(&doc, id), Point::new(0.0, 0.0));
        assert!(history.redo(&mut doc));
        assert_eq!(start(&doc, id), Point::new(10.0, 5.0));
    }

    #[test]
    fn test_coalesced_moves_redo_exactly() {
        let mut doc = Document::new();
        let mut history = History::new();
        let line: Entity = LineEntity::new(Point::new(0.1, 0.0), Point::new(10.0, 0.0), Style::default()).into();
        let id = line.id();
        history.apply(&mut doc, Command::add(vec![line])).unwrap();
        let t0 = Instant::now();
        history.apply_at(&mut doc, Command::move_by(vec![id], Vec2::new(0.2, 0.0)), t0).unwrap();
        history
            .apply_at(&mut doc, Command::move_by(vec![id], Vec2::new(0.3, 0.0)), t0 + Duration::from_millis(50))
            .unwrap();
        assert_eq!(history.undo_len(), 2);
        let dragged = doc.clone();

        assert!(history.undo(&mut doc));
        assert_eq!(start(&doc, id), Point::new(0.1, 0.0));
        assert!(history.redo(&mut doc));
        assert_eq!(doc, dragged);
    }

    fn corner(doc: &Document, id: EntityId) -> (Point, Point) {
        let entity = doc.get(id).unwrap();
        let centre = entity.bounds().unwrap().center();
        let handle = entity
            .handles()
            .into_iter()
            .find(|h| h.kind == HandleKind::Corner(Corner::BottomRight))
            .unwrap();
        (centre, handle.position)
    }

    #[test]
    fn test_coalesced_label_resize_redo_exactly() {
        let mut doc = Document::new();
        let mut history = History::new();
        let label: Entity = LabelEntity::new(Point::new(40.0, 40.0), "abcd").into();
        let id = label.id();
        history.apply(&mut doc, Command::add(vec![label])).unwrap();
        let before = doc.clone();

        let t0 = Instant::now();
        let handle = HandleKind::Corner(Corner::BottomRight);
        let (c, h) = corner(&doc, id);
        history.apply_at(&mut doc, Command::resize(id, handle, c + (h - c) * 2.0), t0).unwrap();
        let (c, h) = corner(&doc, id);
        history
            .apply_at(&mut doc, Command::resize(id, handle, c + (h - c) * 1.5), t0 + Duration::from_millis(50))
            .unwrap();
        assert_eq!(history.undo_len(), 2);
        let resized = doc.clone();

        assert!(history.undo(&mut doc));
        assert_eq!(doc, before);
        assert!(history.redo(&mut doc));
        assert_eq!(doc, resized);
    }

    #[test]
    fn test_window_expiry_splits_entries() {
        let (mut doc, mut history, id) = setup();
        let t0 = Instant::now();
        history.apply_at(&mut doc, Command::move_by(vec![id], Vec2::new(1.0, 0.0)), t0).unwrap();
        history
            .apply_at(&mut doc, Command::move_by(vec![id], Vec2::new(1.0, 0.0)), t0 + Duration::from_secs(2))
            .unwrap();
        assert_eq!(history.undo_len(), 3);
    }

    #[test]
    fn test_interaction_coalesces_regardless_of_time() {
        let (mut doc, mut history, id) = setup();
        let t0 = Instant::now();
        history.begin_interaction();
        for i in 0..3u64 {
            let cmd = Command::resize(id, HandleKind::Vertex(1), Point::new(100.0 + i as f64, 10.0));
            history.apply_at(&mut doc, cmd, t0 + Duration::from_secs(10 * i)).unwrap();
        }
        history.end_interaction();
        assert_eq!(history.undo_len(), 2);
        // A new drag after the interaction starts a fresh entry
        history
            .apply_at(&mut doc, Command::resize(id, HandleKind::Vertex(1), Point::new(50.0, 0.0)), t0)
            .unwrap();
        assert_eq!(history.undo_len(), 3);
        history.undo(&mut doc);
        history.undo(&mut doc);
        match doc.get(id) {
            Some(Entity::Line(l)) => assert_eq!(l.end(), Point::new(100.0, 0.0)),
            _ => panic!("line missing"),
        }
    }

    #[test]
    fn test_different_kinds_do_not_merge() {
        let (mut doc, mut history, id) = setup();
        let t0 = Instant::now();
        history.apply_at(&mut doc, Command::move_by(vec![id], Vec2::new(1.0, 0.0)), t0).unwrap();
        history.apply_at(&mut doc, Command::bring_to_front(id), t0).unwrap();
        history.apply_at(&mut doc, Command::move_by(vec![id], Vec2::new(1.0, 0.0)), t0).unwrap();
        assert_eq!(history.undo_len(), 4);
    }

    #[test]
    fn test_save_point_and_dirty() {
        let (mut doc, mut history, id) = setup();
        assert!(history.is_dirty());
        history.mark_saved();
        assert_eq!(history.state(), DirtyState::Clean);

        let t0 = Instant::now();
        history.apply_at(&mut doc, Command::move_by(vec![id], Vec2::new(1.0, 0.0)), t0).unwrap();
        assert!(history.is_dirty());
        history.undo(&mut doc);
        assert!(!history.is_dirty());
        history.redo(&mut doc);
        history.mark_saved();
        // A move right after saving must not merge into the saved entry
        history.apply_at(&mut doc, Command::move_by(vec![id], Vec2::new(1.0, 0.0)), t0).unwrap();
        assert_eq!(history.undo_len(), 3);
        history.undo(&mut doc);
        assert!(!history.is_dirty());
    }

    #[test]
    fn test_save_point_lost_after_branching() {
        let (mut doc, mut history, id) = setup();
        history.apply(&mut doc, Command::move_by(vec![id], Vec2::new(1.0, 0.0))).unwrap();
        history.mark_saved();
        history.undo(&mut doc);
        history.apply(&mut doc, Command::SetGrid { grid: GridConfig { spacing: 5.0, ..GridConfig::default() } }).unwrap();
        history.undo(&mut doc);
        assert!(history.is_dirty());
    }

    #[test]
    fn test_max_depth_drops_oldest() {
        let mut doc = Document::new();
        let mut history = History::new().with_max_depth(2);
        for _ in 0..4 {
            let line: Entity = LineEntity::new(Point::ZERO, Point::new(1.0, 1.0), Style::default()).into();
            history.apply(&mut doc, Command::add(vec![line])).unwrap();
        }
        assert_eq!(history.undo_len(), 2);
        while history.undo(&mut doc) {}
        assert_eq!(doc.len(), 2);
        assert!(history.is_dirty());
    }
}
