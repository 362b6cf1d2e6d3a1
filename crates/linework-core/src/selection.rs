//! Selection and manipulation handle system.

use crate::document::Document;
use crate::entities::EntityId;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 10.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 8.0;

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    /// Line vertex by index.
    Vertex(usize),
    /// Corner of a label or icon box.
    Corner(Corner),
    /// Edge midpoint of a label or icon box.
    Edge(Edge),
}

/// Corner positions, before rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions, before rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// A selection handle with its position and type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    /// Position in document coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a point (in document coordinates) hits this handle.
    /// `tolerance` should be adjusted for viewport zoom.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// The set of selected entities.
///
/// Ids keep the order they were selected in. The primary entity is the one
/// the UI edits properties of; it is the most recently added id unless set
/// explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: Vec<EntityId>,
    primary: Option<EntityId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn primary(&self) -> Option<EntityId> {
        self.primary
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Replace the selection. Returns true if it changed.
    pub fn set(&mut self, ids: impl IntoIterator<Item = EntityId>) -> bool {
        let mut next = Vec::new();
        for id in ids {
            if !next.contains(&id) {
                next.push(id);
            }
        }
        let primary = next.last().copied();
        let changed = next != self.ids || primary != self.primary;
        self.ids = next;
        self.primary = primary;
        changed
    }

    /// Add an id and make it primary.
    pub fn add(&mut self, id: EntityId) -> bool {
        let changed = !self.contains(id) || self.primary != Some(id);
        if !self.contains(id) {
            self.ids.push(id);
        }
        self.primary = Some(id);
        changed
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|s| *s != id);
        if self.primary == Some(id) {
            self.primary = self.ids.last().copied();
        }
        before != self.ids.len()
    }

    /// Add the id if absent, remove it otherwise.
    pub fn toggle(&mut self, id: EntityId) -> bool {
        if self.contains(id) {
            self.remove(id)
        } else {
            self.add(id)
        }
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.ids.is_empty();
        self.ids.clear();
        self.primary = None;
        changed
    }

    /// Make an already-selected id primary.
    pub fn set_primary(&mut self, id: EntityId) -> bool {
        if self.contains(id) && self.primary != Some(id) {
            self.primary = Some(id);
            true
        } else {
            false
        }
    }

    /// Select every visible, unlocked entity with its own geometry.
    pub fn select_all(&mut self, doc: &Document) -> bool {
        let ids: Vec<_> = doc
            .all()
            .filter(|e| e.is_visible() && !e.is_locked() && !e.is_group())
            .map(|e| e.id())
            .collect();
        self.set(ids)
    }

    /// Selected ids with groups replaced by their (transitive) members,
    /// deduplicated, groups themselves included.
    pub fn expand_groups(&self, doc: &Document) -> Vec<EntityId> {
        let mut out = Vec::new();
        for id in &self.ids {
            for member in doc.expand_group(*id) {
                if !out.contains(&member) {
                    out.push(member);
                }
            }
        }
        out
    }

    /// Drop ids that no longer exist in `doc`. Returns true if any were dropped.
    pub fn retain_existing(&mut self, doc: &Document) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| doc.contains(*id));
        if self.primary.is_some_and(|p| !doc.contains(p)) {
            self.primary = self.ids.last().copied();
        }
        before != self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::entities::{Entity, GroupEntity, LineEntity, Style};
    use uuid::Uuid;

    fn line() -> Entity {
        LineEntity::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0), Style::default()).into()
    }

    #[test]
    fn test_handle_hit() {
        let handle = Handle::new(Point::new(10.0, 10.0), HandleKind::Vertex(0));
        assert!(handle.hit_test(Point::new(13.0, 14.0), 5.0));
        assert!(!handle.hit_test(Point::new(14.0, 14.0), 5.0));
    }

    #[test]
    fn test_add_toggle_primary() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut sel = Selection::new();
        assert!(sel.add(a));
        assert!(sel.add(b));
        assert_eq!(sel.primary(), Some(b));
        assert!(sel.toggle(b));
        assert_eq!(sel.ids(), &[a]);
        assert_eq!(sel.primary(), Some(a));
        assert!(!sel.set_primary(b));
        assert!(sel.clear());
        assert!(!sel.clear());
    }

    #[test]
    fn test_set_deduplicates() {
        let a = Uuid::new_v4();
        let mut sel = Selection::new();
        assert!(sel.set([a, a]));
        assert_eq!(sel.len(), 1);
        assert!(!sel.set([a]));
    }

    #[test]
    fn test_select_all_skips_locked_and_hidden() {
        let mut doc = Document::new();
        let visible = line();
        let mut locked = line();
        locked.meta_mut().locked = true;
        let mut hidden = line();
        hidden.meta_mut().visible = false;
        let id = visible.id();
        Command::add(vec![visible, locked, hidden]).apply(&mut doc).unwrap();

        let mut sel = Selection::new();
        sel.select_all(&doc);
        assert_eq!(sel.ids(), &[id]);
    }

    #[test]
    fn test_expand_groups_and_retain() {
        let mut doc = Document::new();
        let (a, b) = (line(), line());
        let (ida, idb) = (a.id(), b.id());
        let group: Entity = GroupEntity::new(vec![ida, idb]).into();
        let gid = group.id();
        Command::add(vec![a, b, group]).apply(&mut doc).unwrap();

        let mut sel = Selection::new();
        sel.set([gid]);
        assert_eq!(sel.expand_groups(&doc), vec![gid, ida, idb]);

        let stale = Uuid::new_v4();
        sel.add(stale);
        assert!(sel.retain_existing(&doc));
        assert_eq!(sel.ids(), &[gid]);
        assert_eq!(sel.primary(), Some(gid));
    }
}
