use std::cmp::Ordering;
use std::collections::HashMap;

use crate::db::{DbAlbum, DbMarker, DbPhoto};
use crate::store::changes::{
    apply_field_to_album, apply_field_to_photo, EntityKind, EntityRef, EntityRow, FieldId,
    FieldValue, PendingChange,
};

/// A row plus its change counter
///
/// The revision bumps on every committed mutation of the row; observers use
/// it to distinguish an in-place update from an unchanged row.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub row: T,
    pub revision: u64,
}

/// In-memory snapshot of the whole entity graph for one context
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    markers: HashMap<String, Versioned<DbMarker>>,
    albums: HashMap<String, Versioned<DbAlbum>>,
    photos: HashMap<String, Versioned<DbPhoto>>,
}

impl EntityGraph {
    pub fn load(markers: Vec<DbMarker>, albums: Vec<DbAlbum>, photos: Vec<DbPhoto>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|m| (m.id.clone(), Versioned { row: m, revision: 0 }))
                .collect(),
            albums: albums
                .into_iter()
                .map(|a| (a.id.clone(), Versioned { row: a, revision: 0 }))
                .collect(),
            photos: photos
                .into_iter()
                .map(|p| (p.id.clone(), Versioned { row: p, revision: 0 }))
                .collect(),
        }
    }

    pub fn marker(&self, id: &str) -> Option<&DbMarker> {
        self.markers.get(id).map(|v| &v.row)
    }

    pub fn album(&self, id: &str) -> Option<&DbAlbum> {
        self.albums.get(id).map(|v| &v.row)
    }

    pub fn photo(&self, id: &str) -> Option<&DbPhoto> {
        self.photos.get(id).map(|v| &v.row)
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity.kind {
            EntityKind::Marker => self.markers.contains_key(&entity.id),
            EntityKind::Album => self.albums.contains_key(&entity.id),
            EntityKind::Photo => self.photos.contains_key(&entity.id),
        }
    }

    /// All markers in map-load order (latitude descending, then longitude)
    pub fn markers_sorted(&self) -> Vec<DbMarker> {
        let mut markers: Vec<DbMarker> = self.markers.values().map(|v| v.row.clone()).collect();
        markers.sort_by(compare_markers);
        markers
    }

    /// Albums under one marker, name ascending with newest-first tiebreak
    pub fn albums_for_marker(&self, marker_id: &str) -> Vec<DbAlbum> {
        let mut albums: Vec<DbAlbum> = self
            .albums
            .values()
            .filter(|v| v.row.marker_id == marker_id)
            .map(|v| v.row.clone())
            .collect();
        albums.sort_by(compare_albums);
        albums
    }

    /// Photos under one album, name descending
    pub fn photos_for_album(&self, album_id: &str) -> Vec<DbPhoto> {
        let mut photos: Vec<DbPhoto> = self
            .photos
            .values()
            .filter(|v| v.row.album_id == album_id)
            .map(|v| v.row.clone())
            .collect();
        photos.sort_by(compare_photos);
        photos
    }

    /// Ordered (id, revision) keys for the album scope, for diffing
    pub fn album_keys_for_marker(&self, marker_id: &str) -> Vec<(String, u64)> {
        self.albums_for_marker(marker_id)
            .into_iter()
            .map(|a| {
                let revision = self.albums[&a.id].revision;
                (a.id, revision)
            })
            .collect()
    }

    /// Ordered (id, revision) keys for the photo scope, for diffing
    pub fn photo_keys_for_album(&self, album_id: &str) -> Vec<(String, u64)> {
        self.photos_for_album(album_id)
            .into_iter()
            .map(|p| {
                let revision = self.photos[&p.id].revision;
                (p.id, revision)
            })
            .collect()
    }

    pub fn apply(&mut self, change: &PendingChange) {
        match change {
            PendingChange::Insert(row) => self.apply_insert(row),
            PendingChange::Update {
                entity,
                field,
                value,
                ..
            } => self.set_field(entity, *field, value, true),
            PendingChange::Delete(entity) => self.apply_delete(entity),
        }
    }

    pub fn apply_insert(&mut self, row: &EntityRow) {
        match row {
            EntityRow::Marker(m) => {
                self.markers.insert(
                    m.id.clone(),
                    Versioned {
                        row: m.clone(),
                        revision: 0,
                    },
                );
            }
            EntityRow::Album(a) => {
                self.albums.insert(
                    a.id.clone(),
                    Versioned {
                        row: a.clone(),
                        revision: 0,
                    },
                );
            }
            EntityRow::Photo(p) => {
                self.photos.insert(
                    p.id.clone(),
                    Versioned {
                        row: p.clone(),
                        revision: 0,
                    },
                );
            }
        }
    }

    pub fn apply_delete(&mut self, entity: &EntityRef) {
        match entity.kind {
            EntityKind::Marker => {
                self.markers.remove(&entity.id);
            }
            EntityKind::Album => {
                self.albums.remove(&entity.id);
            }
            EntityKind::Photo => {
                self.photos.remove(&entity.id);
            }
        }
    }

    /// Write one field; `bump_revision` is false for staged reader edits that
    /// only become observable once they commit
    pub fn set_field(
        &mut self,
        entity: &EntityRef,
        field: FieldId,
        value: &FieldValue,
        bump_revision: bool,
    ) {
        match entity.kind {
            EntityKind::Album => {
                if let Some(versioned) = self.albums.get_mut(&entity.id) {
                    apply_field_to_album(&mut versioned.row, field, value);
                    if bump_revision {
                        versioned.revision += 1;
                    }
                }
            }
            EntityKind::Photo => {
                if let Some(versioned) = self.photos.get_mut(&entity.id) {
                    apply_field_to_photo(&mut versioned.row, field, value);
                    if bump_revision {
                        versioned.revision += 1;
                    }
                }
            }
            EntityKind::Marker => {}
        }
    }

    /// Current value of one field, if the entity is present
    pub fn field_value(&self, entity: &EntityRef, field: FieldId) -> Option<FieldValue> {
        match (entity.kind, field) {
            (EntityKind::Album, FieldId::AlbumName) => self
                .album(&entity.id)
                .map(|a| FieldValue::Text(a.name.clone())),
            (EntityKind::Album, FieldId::AlbumRemoteTotal) => self
                .album(&entity.id)
                .map(|a| FieldValue::Count(a.remote_total_count)),
            (EntityKind::Photo, FieldId::PhotoName) => self
                .photo(&entity.id)
                .map(|p| FieldValue::Text(p.name.clone())),
            (EntityKind::Photo, FieldId::PhotoRemoteTotal) => self
                .photo(&entity.id)
                .map(|p| FieldValue::Count(p.remote_total_count)),
            _ => None,
        }
    }
}

fn compare_markers(a: &DbMarker, b: &DbMarker) -> Ordering {
    b.latitude
        .partial_cmp(&a.latitude)
        .unwrap_or(Ordering::Equal)
        .then(
            b.longitude
                .partial_cmp(&a.longitude)
                .unwrap_or(Ordering::Equal),
        )
}

fn compare_albums(a: &DbAlbum, b: &DbAlbum) -> Ordering {
    a.name
        .cmp(&b.name)
        .then(b.created_at.cmp(&a.created_at))
        .then(a.id.cmp(&b.id))
}

fn compare_photos(a: &DbPhoto, b: &DbPhoto) -> Ordering {
    b.name.cmp(&a.name).then(a.id.cmp(&b.id))
}
