use std::fmt;

use crate::db::{DbAlbum, DbMarker, DbPhoto, RowOp};

/// Entity kinds stored in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Marker,
    Album,
    Photo,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Marker => write!(f, "marker"),
            EntityKind::Album => write!(f, "album"),
            EntityKind::Photo => write!(f, "photo"),
        }
    }
}

/// Durable reference to one entity
///
/// Entities are always referenced across contexts by kind + id, never by a
/// row borrowed from another context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn marker(id: &str) -> Self {
        Self {
            kind: EntityKind::Marker,
            id: id.to_string(),
        }
    }

    pub fn album(id: &str) -> Self {
        Self {
            kind: EntityKind::Album,
            id: id.to_string(),
        }
    }

    pub fn photo(id: &str) -> Self {
        Self {
            kind: EntityKind::Photo,
            id: id.to_string(),
        }
    }
}

/// The mutable fields of the entity graph
///
/// Markers are immutable after creation, so every field here belongs to an
/// album or a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    AlbumName,
    AlbumRemoteTotal,
    PhotoName,
    PhotoRemoteTotal,
}

/// A field value, typed just enough for conflict comparison
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Count(f64),
}

/// A freshly created row
#[derive(Debug, Clone)]
pub enum EntityRow {
    Marker(DbMarker),
    Album(DbAlbum),
    Photo(DbPhoto),
}

impl EntityRow {
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            EntityRow::Marker(m) => EntityRef::marker(&m.id),
            EntityRow::Album(a) => EntityRef::album(&a.id),
            EntityRow::Photo(p) => EntityRef::photo(&p.id),
        }
    }
}

/// One staged, not-yet-durable change
///
/// `Update` keeps the `base` value the field had when the edit was staged;
/// the store-wins merge direction compares it against the durable value to
/// detect that something else committed in between.
#[derive(Debug, Clone)]
pub enum PendingChange {
    Insert(EntityRow),
    Update {
        entity: EntityRef,
        field: FieldId,
        value: FieldValue,
        base: FieldValue,
    },
    Delete(EntityRef),
}

/// Ordered set of pending changes for one context
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<PendingChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.iter()
    }

    pub fn push(&mut self, change: PendingChange) {
        self.changes.push(change);
    }

    pub fn extend(&mut self, other: ChangeSet) {
        self.changes.extend(other.changes);
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    pub fn changes(&self) -> &[PendingChange] {
        &self.changes
    }

    /// Stage a field edit, folding repeated edits of the same field into one
    /// entry that keeps the original base value
    pub fn stage_update(
        &mut self,
        entity: EntityRef,
        field: FieldId,
        value: FieldValue,
        base: FieldValue,
    ) {
        for change in self.changes.iter_mut() {
            if let PendingChange::Update {
                entity: existing,
                field: existing_field,
                value: existing_value,
                ..
            } = change
            {
                if *existing == entity && *existing_field == field {
                    *existing_value = value;
                    return;
                }
            }
        }

        self.changes.push(PendingChange::Update {
            entity,
            field,
            value,
            base,
        });
    }

    pub fn has_update(&self, entity: &EntityRef, field: FieldId) -> bool {
        self.changes.iter().any(|c| {
            matches!(c, PendingChange::Update { entity: e, field: f, .. } if e == entity && *f == field)
        })
    }

    pub fn remove_update(&mut self, entity: &EntityRef, field: FieldId) {
        self.changes.retain(|c| {
            !matches!(c, PendingChange::Update { entity: e, field: f, .. } if e == entity && *f == field)
        });
    }

    /// Drop every pending change that targets the given entity
    pub fn drop_entity(&mut self, entity: &EntityRef) {
        self.changes.retain(|c| match c {
            PendingChange::Insert(row) => row.entity_ref() != *entity,
            PendingChange::Update { entity: e, .. } => e != entity,
            PendingChange::Delete(e) => e != entity,
        });
    }

    pub fn is_deleted(&self, entity: &EntityRef) -> bool {
        self.changes
            .iter()
            .any(|c| matches!(c, PendingChange::Delete(e) if e == entity))
    }

    pub fn inserted_marker(&self, id: &str) -> Option<&DbMarker> {
        self.changes.iter().find_map(|c| match c {
            PendingChange::Insert(EntityRow::Marker(m)) if m.id == id => Some(m),
            _ => None,
        })
    }

    pub fn inserted_album(&self, id: &str) -> Option<&DbAlbum> {
        self.changes.iter().find_map(|c| match c {
            PendingChange::Insert(EntityRow::Album(a)) if a.id == id => Some(a),
            _ => None,
        })
    }

    pub fn inserted_photo(&self, id: &str) -> Option<&DbPhoto> {
        self.changes.iter().find_map(|c| match c {
            PendingChange::Insert(EntityRow::Photo(p)) if p.id == id => Some(p),
            _ => None,
        })
    }

    /// Staged field edits targeting one entity, in staging order
    pub fn updates_for<'a>(
        &'a self,
        entity: &'a EntityRef,
    ) -> impl Iterator<Item = (&'a FieldId, &'a FieldValue)> + 'a {
        self.changes.iter().filter_map(move |c| match c {
            PendingChange::Update {
                entity: e,
                field,
                value,
                ..
            } if e == entity => Some((field, value)),
            _ => None,
        })
    }

    /// Entity kinds this change set touches
    pub fn kinds(&self) -> Vec<EntityKind> {
        let mut kinds = Vec::new();
        for change in &self.changes {
            let kind = match change {
                PendingChange::Insert(row) => row.entity_ref().kind,
                PendingChange::Update { entity, .. } => entity.kind,
                PendingChange::Delete(entity) => entity.kind,
            };
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Lower to row operations for one durable transaction
    pub fn to_row_ops(&self) -> Vec<RowOp> {
        self.changes
            .iter()
            .map(|change| match change {
                PendingChange::Insert(EntityRow::Marker(m)) => RowOp::InsertMarker(m.clone()),
                PendingChange::Insert(EntityRow::Album(a)) => RowOp::InsertAlbum(a.clone()),
                PendingChange::Insert(EntityRow::Photo(p)) => RowOp::InsertPhoto(p.clone()),
                PendingChange::Update {
                    entity,
                    field,
                    value,
                    ..
                } => update_op(entity, *field, value),
                PendingChange::Delete(entity) => match entity.kind {
                    EntityKind::Marker => RowOp::DeleteMarker {
                        id: entity.id.clone(),
                    },
                    EntityKind::Album => RowOp::DeleteAlbum {
                        id: entity.id.clone(),
                    },
                    EntityKind::Photo => RowOp::DeletePhoto {
                        id: entity.id.clone(),
                    },
                },
            })
            .collect()
    }
}

fn update_op(entity: &EntityRef, field: FieldId, value: &FieldValue) -> RowOp {
    match (field, value) {
        (FieldId::AlbumName, FieldValue::Text(name)) => RowOp::UpdateAlbumName {
            id: entity.id.clone(),
            name: name.clone(),
        },
        (FieldId::AlbumRemoteTotal, FieldValue::Count(total)) => RowOp::UpdateAlbumRemoteTotal {
            id: entity.id.clone(),
            remote_total_count: *total,
        },
        (FieldId::PhotoName, FieldValue::Text(name)) => RowOp::UpdatePhotoName {
            id: entity.id.clone(),
            name: name.clone(),
        },
        (FieldId::PhotoRemoteTotal, FieldValue::Count(total)) => RowOp::UpdatePhotoRemoteTotal {
            id: entity.id.clone(),
            remote_total_count: *total,
        },
        _ => unreachable!("field and value variants staged together are always compatible"),
    }
}

/// Apply a field value to an album row
pub(crate) fn apply_field_to_album(album: &mut DbAlbum, field: FieldId, value: &FieldValue) {
    match (field, value) {
        (FieldId::AlbumName, FieldValue::Text(name)) => album.name = name.clone(),
        (FieldId::AlbumRemoteTotal, FieldValue::Count(total)) => album.remote_total_count = *total,
        _ => {}
    }
}

/// Apply a field value to a photo row
pub(crate) fn apply_field_to_photo(photo: &mut DbPhoto, field: FieldId, value: &FieldValue) {
    match (field, value) {
        (FieldId::PhotoName, FieldValue::Text(name)) => photo.name = name.clone(),
        (FieldId::PhotoRemoteTotal, FieldValue::Count(total)) => photo.remote_total_count = *total,
        _ => {}
    }
}

/// Broadcast payload describing one committed batch
#[derive(Debug, Clone)]
pub struct CommitEvent {
    pub kinds: Vec<EntityKind>,
}

impl CommitEvent {
    pub fn touches(&self, kind: EntityKind) -> bool {
        self.kinds.contains(&kind)
    }
}
