//! Reversible document mutations.
//!
//! Applying a [`Command`] validates every reference first and only then
//! mutates the document, returning the command that undoes it.

use crate::document::{self, CanvasConfig, Document, GridConfig};
use crate::entities::{Anchor, Entity, EntityId, GroupEntity, IconRef, StyleDiff};
use crate::selection::HandleKind;
use kurbo::{Point, Vec2};
use thiserror::Error;

/// Command errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("command references missing entities: {ids:?}")]
    StaleReference { ids: Vec<EntityId> },
    #[error("invalid command: {0}")]
    Invalid(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// An entity with the paint rank it should be inserted at (`None` = on top).
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub rank: Option<usize>,
    pub entity: Entity,
}

/// A group membership to restore: `member` goes back into `group` at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub group: EntityId,
    pub member: EntityId,
    pub index: usize,
}

/// Coarse command category, used for history labels and coalescing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Add,
    Delete,
    Move,
    MoveHandle,
    SetStyle,
    SetFlags,
    EditLabel,
    EditIcon,
    Reorder,
    Replace,
    SetGrid,
    SetCanvas,
    Batch,
}

impl CommandKind {
    pub fn label(self) -> &'static str {
        match self {
            CommandKind::Add => "Add",
            CommandKind::Delete => "Delete",
            CommandKind::Move => "Move",
            CommandKind::MoveHandle => "Resize",
            CommandKind::SetStyle => "Change style",
            CommandKind::SetFlags => "Change visibility",
            CommandKind::EditLabel => "Edit label",
            CommandKind::EditIcon => "Edit icon",
            CommandKind::Reorder => "Reorder",
            CommandKind::Replace => "Edit",
            CommandKind::SetGrid => "Change grid",
            CommandKind::SetCanvas => "Change canvas",
            CommandKind::Batch => "Edit",
        }
    }
}

/// A reversible mutation of a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert entities, then restore group memberships in order.
    AddEntities {
        entities: Vec<Placed>,
        memberships: Vec<Membership>,
    },
    /// Remove entities, pruning them from groups. Groups left empty are
    /// removed as well.
    DeleteEntities { ids: Vec<EntityId> },
    /// Translate entities; groups move their members.
    MoveEntities { ids: Vec<EntityId>, delta: Vec2 },
    /// Drag one handle of an entity: a line vertex, or a box corner/edge
    /// which scales the label or icon about its centre.
    MoveHandle {
        id: EntityId,
        handle: HandleKind,
        to: Point,
    },
    SetStyle { changes: Vec<(EntityId, StyleDiff)> },
    SetFlags {
        ids: Vec<EntityId>,
        visible: Option<bool>,
        locked: Option<bool>,
    },
    EditLabel {
        id: EntityId,
        text: Option<String>,
        font_size: Option<f64>,
        rotation: Option<f64>,
        anchor: Option<Anchor>,
    },
    EditIcon {
        id: EntityId,
        icon: Option<IconRef>,
        rotation: Option<f64>,
        scale: Option<f64>,
    },
    /// Move an entity to rank `to` (clamped) in the paint order.
    Reorder { id: EntityId, to: usize },
    /// Swap in new values for existing entities, matched by id.
    ReplaceEntities { entities: Vec<Entity> },
    SetGrid { grid: GridConfig },
    SetCanvas { canvas: CanvasConfig },
    /// Apply all or nothing.
    Batch(Vec<Command>),
}

fn dedup(ids: &[EntityId]) -> Vec<EntityId> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

fn require(doc: &Document, ids: impl IntoIterator<Item = EntityId>) -> CommandResult<()> {
    let missing: Vec<_> = ids.into_iter().filter(|id| !doc.contains(*id)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CommandError::StaleReference { ids: dedup(&missing) })
    }
}

fn finite(v: f64, what: &str) -> CommandResult<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(CommandError::Invalid(format!("{what} must be finite")))
    }
}

impl Command {
    // Constructors

    /// Add entities on top of the paint order.
    pub fn add(entities: Vec<Entity>) -> Self {
        Command::AddEntities {
            entities: entities
                .into_iter()
                .map(|entity| Placed { rank: None, entity })
                .collect(),
            memberships: Vec::new(),
        }
    }

    pub fn delete(ids: Vec<EntityId>) -> Self {
        Command::DeleteEntities { ids }
    }

    pub fn move_by(ids: Vec<EntityId>, delta: Vec2) -> Self {
        Command::MoveEntities { ids, delta }
    }

    pub fn resize(id: EntityId, handle: HandleKind, to: Point) -> Self {
        Command::MoveHandle { id, handle, to }
    }

    /// Apply the same style diff to several entities.
    pub fn set_style(ids: &[EntityId], diff: StyleDiff) -> Self {
        Command::SetStyle {
            changes: dedup(ids).into_iter().map(|id| (id, diff.clone())).collect(),
        }
    }

    /// Group entities under a new group entity, which is returned alongside.
    pub fn group(ids: Vec<EntityId>) -> (Self, EntityId) {
        let group = GroupEntity::new(dedup(&ids));
        let id = group.meta.id;
        (Command::add(vec![group.into()]), id)
    }

    /// Dissolve a group, keeping its members.
    pub fn ungroup(group: EntityId) -> Self {
        Command::DeleteEntities { ids: vec![group] }
    }

    pub fn bring_to_front(id: EntityId) -> Self {
        Command::Reorder { id, to: usize::MAX }
    }

    pub fn send_to_back(id: EntityId) -> Self {
        Command::Reorder { id, to: 0 }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::AddEntities { .. } => CommandKind::Add,
            Command::DeleteEntities { .. } => CommandKind::Delete,
            Command::MoveEntities { .. } => CommandKind::Move,
            Command::MoveHandle { .. } => CommandKind::MoveHandle,
            Command::SetStyle { .. } => CommandKind::SetStyle,
            Command::SetFlags { .. } => CommandKind::SetFlags,
            Command::EditLabel { .. } => CommandKind::EditLabel,
            Command::EditIcon { .. } => CommandKind::EditIcon,
            Command::Reorder { .. } => CommandKind::Reorder,
            Command::ReplaceEntities { .. } => CommandKind::Replace,
            Command::SetGrid { .. } => CommandKind::SetGrid,
            Command::SetCanvas { .. } => CommandKind::SetCanvas,
            Command::Batch(_) => CommandKind::Batch,
        }
    }

    /// Entities this command touches directly.
    pub fn ids(&self) -> Vec<EntityId> {
        match self {
            Command::AddEntities { entities, .. } => entities.iter().map(|p| p.entity.id()).collect(),
            Command::DeleteEntities { ids } | Command::MoveEntities { ids, .. } | Command::SetFlags { ids, .. } => {
                ids.clone()
            }
            Command::MoveHandle { id, .. }
            | Command::EditLabel { id, .. }
            | Command::EditIcon { id, .. }
            | Command::Reorder { id, .. } => vec![*id],
            Command::SetStyle { changes } => changes.iter().map(|(id, _)| *id).collect(),
            Command::ReplaceEntities { entities } => entities.iter().map(|e| e.id()).collect(),
            Command::SetGrid { .. } | Command::SetCanvas { .. } => Vec::new(),
            Command::Batch(cmds) => {
                let all: Vec<_> = cmds.iter().flat_map(|c| c.ids()).collect();
                dedup(&all)
            }
        }
    }

    /// Apply to `doc`, returning the inverse command.
    ///
    /// Nothing is mutated when an error is returned.
    pub fn apply(&self, doc: &mut Document) -> CommandResult<Command> {
        log::debug!("Applying {:?} to {} entities", self.kind(), self.ids().len());
        match self {
            Command::AddEntities { entities, memberships } => apply_add(doc, entities, memberships),
            Command::DeleteEntities { ids } => apply_delete(doc, ids),
            Command::MoveEntities { ids, delta } => apply_move(doc, ids, *delta),
            Command::MoveHandle { id, handle, to } => apply_move_handle(doc, *id, *handle, *to),
            Command::SetStyle { changes } => apply_set_style(doc, changes),
            Command::SetFlags { ids, visible, locked } => apply_set_flags(doc, ids, *visible, *locked),
            Command::EditLabel {
                id,
                text,
                font_size,
                rotation,
                anchor,
            } => apply_edit_label(doc, *id, text.clone(), *font_size, *rotation, *anchor),
            Command::EditIcon {
                id,
                icon,
                rotation,
                scale,
            } => apply_edit_icon(doc, *id, icon.clone(), *rotation, *scale),
            Command::Reorder { id, to } => {
                require(doc, [*id])?;
                let from = doc
                    .reorder(*id, *to)
                    .ok_or(CommandError::StaleReference { ids: vec![*id] })?;
                Ok(Command::Reorder { id: *id, to: from })
            }
            Command::ReplaceEntities { entities } => apply_replace(doc, entities),
            Command::SetGrid { grid } => {
                finite(grid.spacing, "grid spacing")?;
                if grid.spacing < 0.0 {
                    return Err(CommandError::Invalid("grid spacing must not be negative".into()));
                }
                Ok(Command::SetGrid {
                    grid: doc.set_grid(grid.clone()),
                })
            }
            Command::SetCanvas { canvas } => {
                if !(canvas.width > 0.0 && canvas.height > 0.0) || !canvas.width.is_finite() || !canvas.height.is_finite() {
                    return Err(CommandError::Invalid("canvas size must be positive".into()));
                }
                Ok(Command::SetCanvas {
                    canvas: doc.set_canvas(canvas.clone()),
                })
            }
            Command::Batch(cmds) => apply_batch(doc, cmds),
        }
    }

    /// Extend a continuous drag: `self` (applied first, possibly already a
    /// run of steps) followed by `next`, as one forward command.
    ///
    /// The steps are kept rather than folded into one so that redo replays
    /// exactly the arithmetic the drag performed.
    pub fn merge(&self, next: &Command) -> Option<Command> {
        let steps: &[Command] = match self {
            Command::Batch(steps) => steps,
            single => std::slice::from_ref(single),
        };
        if !steps.last()?.continues_with(next) {
            return None;
        }
        let mut steps = steps.to_vec();
        steps.push(next.clone());
        Some(Command::Batch(steps))
    }

    /// Whether `next` drags the same thing as `self`.
    fn continues_with(&self, next: &Command) -> bool {
        match (self, next) {
            (Command::MoveEntities { ids: a, .. }, Command::MoveEntities { ids: b, .. }) => same_set(a, b),
            (
                Command::MoveHandle { id: a, handle: ha, .. },
                Command::MoveHandle { id: b, handle: hb, .. },
            ) => a == b && ha == hb,
            _ => false,
        }
    }
}

fn same_set(a: &[EntityId], b: &[EntityId]) -> bool {
    let (a, b) = (dedup(a), dedup(b));
    a.len() == b.len() && a.iter().all(|id| b.contains(id))
}

fn apply_add(doc: &mut Document, entities: &[Placed], memberships: &[Membership]) -> CommandResult<Command> {
    let mut new_ids = Vec::with_capacity(entities.len());
    for placed in entities {
        let id = placed.entity.id();
        if doc.contains(id) || new_ids.contains(&id) {
            return Err(CommandError::Invalid(format!("entity {id} already exists")));
        }
        if !placed.entity.is_well_formed() {
            return Err(CommandError::Invalid(format!(
                "{} {id} has invalid geometry",
                placed.entity.kind()
            )));
        }
        new_ids.push(id);
    }
    let known = |id: &EntityId| doc.contains(*id) || new_ids.contains(id);
    let mut missing: Vec<EntityId> = entities
        .iter()
        .filter_map(|p| match &p.entity {
            Entity::Group(g) => Some(g.members.iter().copied()),
            _ => None,
        })
        .flatten()
        .filter(|m| !known(m))
        .collect();
    for m in memberships {
        for id in [m.group, m.member] {
            if !known(&id) {
                missing.push(id);
            }
        }
    }
    if !missing.is_empty() {
        return Err(CommandError::StaleReference { ids: dedup(&missing) });
    }
    for m in memberships {
        let is_group = |e: &Entity| e.is_group();
        let group_ok = doc.get(m.group).map(is_group).unwrap_or_else(|| {
            entities
                .iter()
                .any(|p| p.entity.id() == m.group && p.entity.is_group())
        });
        if !group_ok {
            return Err(CommandError::Invalid(format!("{} is not a group", m.group)));
        }
    }
    let mut groups = doc.group_members();
    for placed in entities {
        if let Entity::Group(g) = &placed.entity {
            groups.insert(g.meta.id, g.members.clone());
        }
    }
    for m in memberships {
        if let Some(members) = groups.get_mut(&m.group) {
            members.push(m.member);
        }
    }
    document::check_nesting(&groups).map_err(CommandError::Invalid)?;

    for placed in entities {
        match placed.rank {
            Some(rank) => doc.insert_at(rank, placed.entity.clone()),
            None => doc.insert(placed.entity.clone()),
        }
    }
    for m in memberships {
        if let Some(Entity::Group(group)) = doc.get_mut(m.group) {
            group.insert_member(m.index, m.member);
        }
    }
    Ok(Command::DeleteEntities { ids: new_ids })
}

fn apply_delete(doc: &mut Document, ids: &[EntityId]) -> CommandResult<Command> {
    let ids = dedup(ids);
    require(doc, ids.iter().copied())?;

    let mut doomed = ids;
    let mut memberships = Vec::new();
    let mut i = 0;
    while i < doomed.len() {
        let id = doomed[i];
        for gid in doc.groups_containing(id) {
            if doomed.contains(&gid) {
                continue;
            }
            if let Some(Entity::Group(group)) = doc.get_mut(gid) {
                if let Some(index) = group.remove_member(id) {
                    memberships.push(Membership {
                        group: gid,
                        member: id,
                        index,
                    });
                    if group.is_empty() {
                        doomed.push(gid);
                    }
                }
            }
        }
        i += 1;
    }

    let mut removed: Vec<(usize, Entity)> = Vec::with_capacity(doomed.len());
    let mut by_rank: Vec<(usize, EntityId)> = doomed
        .iter()
        .filter_map(|id| doc.rank(*id).map(|r| (r, *id)))
        .collect();
    by_rank.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, id) in by_rank {
        if let Some(entry) = doc.remove(id) {
            removed.push(entry);
        }
    }
    removed.reverse();
    memberships.reverse();

    Ok(Command::AddEntities {
        entities: removed
            .into_iter()
            .map(|(rank, entity)| Placed {
                rank: Some(rank),
                entity,
            })
            .collect(),
        memberships,
    })
}

fn apply_move(doc: &mut Document, ids: &[EntityId], delta: Vec2) -> CommandResult<Command> {
    require(doc, ids.iter().copied())?;
    finite(delta.x, "move delta")?;
    finite(delta.y, "move delta")?;
    let mut targets = Vec::new();
    for id in ids {
        for member in doc.expand_group(*id) {
            if !targets.contains(&member) {
                targets.push(member);
            }
        }
    }
    // Undo restores the old values instead of subtracting the delta
    let mut before = Vec::with_capacity(targets.len());
    for id in targets {
        if let Some(entity) = doc.get_mut(id) {
            before.push(entity.clone());
            entity.translate(delta);
        }
    }
    Ok(Command::ReplaceEntities { entities: before })
}

fn apply_move_handle(doc: &mut Document, id: EntityId, handle: HandleKind, to: Point) -> CommandResult<Command> {
    require(doc, [id])?;
    finite(to.x, "handle position")?;
    finite(to.y, "handle position")?;
    let before = doc
        .get(id)
        .cloned()
        .ok_or(CommandError::StaleReference { ids: vec![id] })?;
    let old_vertex = match (&before, handle) {
        (Entity::Line(line), HandleKind::Vertex(i)) => line.points.get(i).copied(),
        _ => None,
    };
    let entity = doc
        .get_mut(id)
        .ok_or(CommandError::StaleReference { ids: vec![id] })?;
    if !entity.move_handle(handle, to) {
        return Err(CommandError::Invalid(format!(
            "{} {id} has no usable handle {handle:?}",
            before.kind()
        )));
    }
    Ok(match old_vertex {
        Some(from) => Command::MoveHandle { id, handle, to: from },
        None => Command::ReplaceEntities {
            entities: vec![before],
        },
    })
}

fn apply_set_style(doc: &mut Document, changes: &[(EntityId, StyleDiff)]) -> CommandResult<Command> {
    require(doc, changes.iter().map(|(id, _)| *id))?;
    if let Some((_, diff)) = changes.iter().find(|(_, d)| d.stroke_width.is_some_and(|w| w <= 0.0 || !w.is_finite())) {
        return Err(CommandError::Invalid(format!(
            "stroke width {:?} must be positive",
            diff.stroke_width
        )));
    }
    // Stage on copies so a rejected change leaves the document untouched.
    let mut staged = Vec::with_capacity(changes.len());
    let mut undo = Vec::with_capacity(changes.len());
    for (id, diff) in changes {
        let Some(mut entity) = doc.get(*id).cloned() else {
            return Err(CommandError::StaleReference { ids: vec![*id] });
        };
        let inverse = entity.apply_style(diff).ok_or_else(|| {
            CommandError::Invalid(format!("{} {id} cannot take this style", entity.kind()))
        })?;
        staged.push(entity);
        undo.push((*id, inverse));
    }
    for entity in staged {
        doc.replace(entity);
    }
    undo.reverse();
    Ok(Command::SetStyle { changes: undo })
}

fn apply_set_flags(doc: &mut Document, ids: &[EntityId], visible: Option<bool>, locked: Option<bool>) -> CommandResult<Command> {
    let ids = dedup(ids);
    require(doc, ids.iter().copied())?;
    let mut undo = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(entity) = doc.get_mut(id) {
            let meta = entity.meta_mut();
            undo.push(Command::SetFlags {
                ids: vec![id],
                visible: visible.map(|_| meta.visible),
                locked: locked.map(|_| meta.locked),
            });
            if let Some(v) = visible {
                meta.visible = v;
            }
            if let Some(l) = locked {
                meta.locked = l;
            }
        }
    }
    Ok(Command::Batch(undo))
}

fn apply_edit_label(
    doc: &mut Document,
    id: EntityId,
    text: Option<String>,
    font_size: Option<f64>,
    rotation: Option<f64>,
    anchor: Option<Anchor>,
) -> CommandResult<Command> {
    require(doc, [id])?;
    if let Some(size) = font_size {
        finite(size, "font size")?;
        if size <= 0.0 {
            return Err(CommandError::Invalid("font size must be positive".into()));
        }
    }
    if let Some(r) = rotation {
        finite(r, "rotation")?;
    }
    let Some(Entity::Label(label)) = doc.get_mut(id) else {
        return Err(CommandError::Invalid(format!("{id} is not a label")));
    };
    Ok(Command::EditLabel {
        id,
        text: text.map(|t| std::mem::replace(&mut label.text, t)),
        font_size: font_size.map(|s| std::mem::replace(&mut label.font_size, s)),
        rotation: rotation.map(|r| std::mem::replace(&mut label.rotation, r)),
        anchor: anchor.map(|a| std::mem::replace(&mut label.anchor, a)),
    })
}

fn apply_edit_icon(
    doc: &mut Document,
    id: EntityId,
    icon: Option<IconRef>,
    rotation: Option<f64>,
    scale: Option<f64>,
) -> CommandResult<Command> {
    require(doc, [id])?;
    if let Some(s) = scale {
        finite(s, "scale")?;
        if s <= 0.0 {
            return Err(CommandError::Invalid("scale must be positive".into()));
        }
    }
    if let Some(r) = rotation {
        finite(r, "rotation")?;
    }
    let Some(Entity::Icon(entity)) = doc.get_mut(id) else {
        return Err(CommandError::Invalid(format!("{id} is not an icon")));
    };
    Ok(Command::EditIcon {
        id,
        icon: icon.map(|i| std::mem::replace(&mut entity.icon, i)),
        rotation: rotation.map(|r| std::mem::replace(&mut entity.rotation, r)),
        scale: scale.map(|s| std::mem::replace(&mut entity.scale, s)),
    })
}

fn apply_replace(doc: &mut Document, entities: &[Entity]) -> CommandResult<Command> {
    require(doc, entities.iter().map(|e| e.id()))?;
    if let Some(bad) = entities.iter().find(|e| !e.is_well_formed()) {
        return Err(CommandError::Invalid(format!("{} {} has invalid geometry", bad.kind(), bad.id())));
    }
    let mut missing = Vec::new();
    for entity in entities {
        if let Entity::Group(g) = entity {
            missing.extend(g.members.iter().copied().filter(|m| !doc.contains(*m)));
        }
    }
    if !missing.is_empty() {
        return Err(CommandError::StaleReference { ids: dedup(&missing) });
    }
    let mut groups = doc.group_members();
    for entity in entities {
        match entity {
            Entity::Group(g) => groups.insert(g.meta.id, g.members.clone()),
            other => groups.remove(&other.id()),
        };
    }
    document::check_nesting(&groups).map_err(CommandError::Invalid)?;
    let mut old: Vec<Entity> = entities.iter().filter_map(|e| doc.replace(e.clone())).collect();
    old.reverse();
    Ok(Command::ReplaceEntities { entities: old })
}

fn apply_batch(doc: &mut Document, cmds: &[Command]) -> CommandResult<Command> {
    let mut inverses = Vec::with_capacity(cmds.len());
    for cmd in cmds {
        match cmd.apply(doc) {
            Ok(inverse) => inverses.push(inverse),
            Err(err) => {
                for inverse in inverses.iter().rev() {
                    if let Err(rollback) = inverse.apply(doc) {
                        log::error!("Batch rollback failed: {rollback}");
                    }
                }
                return Err(err);
            }
        }
    }
    inverses.reverse();
    Ok(Command::Batch(inverses))
}
