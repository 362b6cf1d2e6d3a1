//! Group entity: a named set of member entities.

use super::{EntityId, EntityMeta};
use serde::{Deserialize, Serialize};

/// Groups have no geometry of their own; their bounds are the union of their
/// members' bounds and they are drawn through their members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub members: Vec<EntityId>,
}

impl GroupEntity {
    pub fn new(members: Vec<EntityId>) -> Self {
        Self {
            meta: EntityMeta::new(),
            members,
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.meta.id = id;
        self
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    /// Remove a member, returning its former index.
    pub fn remove_member(&mut self, id: EntityId) -> Option<usize> {
        let index = self.members.iter().position(|m| *m == id)?;
        self.members.remove(index);
        Some(index)
    }

    /// Put a member back at `index` (clamped to the current length).
    pub fn insert_member(&mut self, index: usize, id: EntityId) {
        if !self.contains(id) {
            let index = index.min(self.members.len());
            self.members.insert(index, id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
