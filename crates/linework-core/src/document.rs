//! Document model: entities in paint order plus grid and canvas settings.

use crate::entities::{Colour, Entity, EntityId};
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Groups nested deeper than this are treated as empty when computing bounds.
const MAX_GROUP_DEPTH: usize = 32;

/// Grid settings stored with the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Distance between grid lines in document units.
    pub spacing: f64,
    pub visible: bool,
    pub snap_enabled: bool,
    pub colour: Colour,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: 40.0,
            visible: true,
            snap_enabled: true,
            colour: Colour::gray(),
        }
    }
}

impl GridConfig {
    /// Whether grid snapping can take effect.
    pub fn snaps(&self) -> bool {
        self.snap_enabled && self.spacing > 0.0 && self.spacing.is_finite()
    }
}

/// The page exported by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
    pub background: Colour,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 600.0,
            background: Colour::white(),
        }
    }
}

impl CanvasConfig {
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// A track diagram.
///
/// Reads are public; mutation goes through [`crate::command::Command`] so
/// every change has an inverse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entities: HashMap<EntityId, Entity>,
    /// Paint order, back to front.
    z_order: Vec<EntityId>,
    grid: GridConfig,
    canvas: CanvasConfig,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(grid: GridConfig, canvas: CanvasConfig) -> Self {
        Self {
            grid,
            canvas,
            ..Self::default()
        }
    }

    /// Build a document from entities already in paint order.
    ///
    /// Fails with the first duplicated id.
    pub(crate) fn from_parts(
        entities: Vec<Entity>,
        grid: GridConfig,
        canvas: CanvasConfig,
    ) -> Result<Self, EntityId> {
        let mut doc = Self::with_settings(grid, canvas);
        for entity in entities {
            let id = entity.id();
            if doc.contains(id) {
                return Err(id);
            }
            doc.insert(entity);
        }
        Ok(doc)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Entities in paint order (back to front).
    pub fn all(&self) -> impl DoubleEndedIterator<Item = &Entity> {
        self.z_order.iter().filter_map(|id| self.entities.get(id))
    }

    /// Ids in paint order.
    pub fn ids(&self) -> &[EntityId] {
        &self.z_order
    }

    /// Position in the paint order; 0 is painted first.
    pub fn rank(&self, id: EntityId) -> Option<usize> {
        self.z_order.iter().position(|z| *z == id)
    }

    pub fn len(&self) -> usize {
        self.z_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z_order.is_empty()
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    /// Bounds of an entity computed from its current geometry.
    ///
    /// A group's bounds are the union of its members' bounds; `None` for
    /// unknown ids and empty groups.
    pub fn bounds(&self, id: EntityId) -> Option<Rect> {
        self.bounds_visiting(id, 0, &mut HashSet::new())
    }

    fn bounds_visiting(&self, id: EntityId, depth: usize, seen: &mut HashSet<EntityId>) -> Option<Rect> {
        if !seen.insert(id) {
            return None;
        }
        match self.get(id)? {
            Entity::Group(group) if depth < MAX_GROUP_DEPTH => group
                .members
                .iter()
                .filter_map(|m| self.bounds_visiting(*m, depth + 1, seen))
                .reduce(|a, b| a.union(b)),
            Entity::Group(_) => None,
            other => other.bounds(),
        }
    }

    /// Member lists of every group, by group id.
    pub(crate) fn group_members(&self) -> HashMap<EntityId, Vec<EntityId>> {
        self.entities
            .values()
            .filter_map(|e| match e {
                Entity::Group(g) => Some((g.meta.id, g.members.clone())),
                _ => None,
            })
            .collect()
    }

    /// Union of the bounds of all visible entities.
    pub fn content_bounds(&self) -> Option<Rect> {
        self.all()
            .filter(|e| e.is_visible())
            .filter_map(|e| e.bounds())
            .reduce(|a, b| a.union(b))
    }

    /// Groups that list `id` as a member, in paint order.
    pub fn groups_containing(&self, id: EntityId) -> Vec<EntityId> {
        self.all()
            .filter_map(|e| match e {
                Entity::Group(g) if g.contains(id) => Some(g.meta.id),
                _ => None,
            })
            .collect()
    }

    /// All ids reachable through `id`'s group membership, including `id`.
    pub fn expand_group(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.collect_members(id, 0, &mut out);
        out
    }

    fn collect_members(&self, id: EntityId, depth: usize, out: &mut Vec<EntityId>) {
        if out.contains(&id) || depth > MAX_GROUP_DEPTH {
            return;
        }
        out.push(id);
        if let Some(Entity::Group(group)) = self.get(id) {
            for member in &group.members {
                self.collect_members(*member, depth + 1, out);
            }
        }
    }

    // Mutators used by the command layer.

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Append an entity on top of the paint order.
    pub(crate) fn insert(&mut self, entity: Entity) {
        let rank = self.z_order.len();
        self.insert_at(rank, entity);
    }

    /// Insert an entity at `rank` (clamped to the current length).
    pub(crate) fn insert_at(&mut self, rank: usize, entity: Entity) {
        let id = entity.id();
        if self.entities.insert(id, entity).is_some() {
            self.z_order.retain(|z| *z != id);
        }
        let rank = rank.min(self.z_order.len());
        self.z_order.insert(rank, id);
    }

    /// Remove an entity, returning its former rank and value.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<(usize, Entity)> {
        let entity = self.entities.remove(&id)?;
        let rank = self.rank(id).unwrap_or(self.z_order.len());
        self.z_order.retain(|z| *z != id);
        Some((rank, entity))
    }

    /// Swap in a new value for an existing entity, keeping its rank.
    pub(crate) fn replace(&mut self, entity: Entity) -> Option<Entity> {
        let slot = self.entities.get_mut(&entity.id())?;
        Some(std::mem::replace(slot, entity))
    }

    /// Move an entity to `to` in the paint order, returning its old rank.
    pub(crate) fn reorder(&mut self, id: EntityId, to: usize) -> Option<usize> {
        let from = self.rank(id)?;
        self.z_order.remove(from);
        let to = to.min(self.z_order.len());
        self.z_order.insert(to, id);
        Some(from)
    }

    pub(crate) fn set_grid(&mut self, grid: GridConfig) -> GridConfig {
        std::mem::replace(&mut self.grid, grid)
    }

    pub(crate) fn set_canvas(&mut self, canvas: CanvasConfig) -> CanvasConfig {
        std::mem::replace(&mut self.canvas, canvas)
    }
}

/// Check that group membership nests: no group lists a member twice or
/// contains itself, directly or through other groups.
pub(crate) fn check_nesting(groups: &HashMap<EntityId, Vec<EntityId>>) -> Result<(), String> {
    for (id, members) in groups {
        let mut distinct = HashSet::with_capacity(members.len());
        if let Some(dup) = members.iter().find(|m| !distinct.insert(**m)) {
            return Err(format!("group {id} lists {dup} more than once"));
        }
    }
    // Depth-first walk; a group met again while still on the path is a cycle.
    fn walk(
        id: EntityId,
        groups: &HashMap<EntityId, Vec<EntityId>>,
        path: &mut Vec<EntityId>,
        done: &mut HashSet<EntityId>,
    ) -> Result<(), String> {
        if done.contains(&id) {
            return Ok(());
        }
        if path.contains(&id) {
            return Err(format!("group {id} contains itself"));
        }
        if let Some(members) = groups.get(&id) {
            path.push(id);
            for member in members {
                walk(*member, groups, path, done)?;
            }
            path.pop();
        }
        done.insert(id);
        Ok(())
    }
    let mut done = HashSet::new();
    for id in groups.keys() {
        walk(*id, groups, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{GroupEntity, LabelEntity, LineEntity, Style};
    use kurbo::Point;

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Entity {
        LineEntity::new(Point::new(x0, y0), Point::new(x1, y1), Style::default()).into()
    }

    #[test]
    fn test_document_creation() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.grid().spacing, 40.0);
        assert_eq!(doc.canvas().rect(), Rect::new(0.0, 0.0, 600.0, 600.0));
    }

    #[test]
    fn test_insert_and_rank() {
        let mut doc = Document::new();
        let a = line(0.0, 0.0, 10.0, 0.0);
        let b = line(0.0, 5.0, 10.0, 5.0);
        let (ida, idb) = (a.id(), b.id());
        doc.insert(a);
        doc.insert_at(0, b);
        assert_eq!(doc.ids(), &[idb, ida]);
        assert_eq!(doc.rank(ida), Some(1));

        let (rank, _) = doc.remove(idb).unwrap();
        assert_eq!(rank, 0);
        assert!(!doc.contains(idb));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_reorder() {
        let mut doc = Document::new();
        let ids: Vec<_> = (0..3)
            .map(|i| {
                let e = line(0.0, i as f64, 1.0, i as f64);
                let id = e.id();
                doc.insert(e);
                id
            })
            .collect();
        assert_eq!(doc.reorder(ids[0], usize::MAX), Some(0));
        assert_eq!(doc.ids(), &[ids[1], ids[2], ids[0]]);
        assert_eq!(doc.reorder(ids[0], 0), Some(2));
        assert_eq!(doc.ids(), &ids[..]);
    }

    #[test]
    fn test_group_bounds_union_members() {
        let mut doc = Document::new();
        let a = line(0.0, 0.0, 10.0, 0.0);
        let b: Entity = LabelEntity::new(Point::new(50.0, 50.0), "x").into();
        let group: Entity = GroupEntity::new(vec![a.id(), b.id()]).into();
        let (ida, gid) = (a.id(), group.id());
        let label_bounds = b.bounds().unwrap();
        doc.insert(a);
        doc.insert(b);
        doc.insert(group);

        let bounds = doc.bounds(gid).unwrap();
        assert_eq!(bounds, Rect::new(0.0, 0.0, 10.0, 0.0).union(label_bounds));
        assert_eq!(doc.groups_containing(ida), vec![gid]);
        assert_eq!(doc.expand_group(gid).len(), 3);
    }

    #[test]
    fn test_content_bounds_skips_hidden() {
        let mut doc = Document::new();
        let mut hidden = line(500.0, 500.0, 600.0, 600.0);
        hidden.meta_mut().visible = false;
        doc.insert(line(0.0, 0.0, 10.0, 10.0));
        doc.insert(hidden);
        assert_eq!(doc.content_bounds(), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_self_containing_group_bounds_terminate() {
        let mut doc = Document::new();
        let a = line(0.0, 0.0, 10.0, 10.0);
        let ida = a.id();
        doc.insert(a);
        let gid = uuid::Uuid::new_v4();
        let group = GroupEntity::new(vec![gid, gid, ida]).with_id(gid);
        doc.insert(group.into());
        assert_eq!(doc.bounds(gid), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_check_nesting() {
        let (a, b, c) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        let ok = HashMap::from([(a, vec![b, c]), (b, vec![c])]);
        assert!(check_nesting(&ok).is_ok());
        assert!(check_nesting(&HashMap::from([(a, vec![a])])).is_err());
        assert!(check_nesting(&HashMap::from([(a, vec![c, c])])).is_err());
        assert!(check_nesting(&HashMap::from([(a, vec![b]), (b, vec![c]), (c, vec![a])])).is_err());
    }

    #[test]
    fn test_from_parts_rejects_duplicates() {
        let a = line(0.0, 0.0, 1.0, 1.0);
        let id = a.id();
        let result = Document::from_parts(vec![a.clone(), a], GridConfig::default(), CanvasConfig::default());
        assert_eq!(result.err(), Some(id));
    }
}
