use crate::db::{DbAlbum, DbMarker, DbPhoto};
use crate::store::changes::{
    ChangeSet, EntityKind, EntityRef, EntityRow, FieldId, FieldValue, PendingChange,
};
use crate::store::context::Context;
use crate::store::StoreError;

/// Mutation handle bound to the writer context
///
/// A mutation stages changes against a scratch change set; nothing touches
/// the writer context until the whole mutation returns Ok, so a failed
/// mutation leaves no partial writes behind. Entities are resolved by id
/// against the writer's current snapshot plus this transaction's own staging.
pub struct WriterTxn<'a> {
    base: &'a Context,
    staged: ChangeSet,
}

impl<'a> WriterTxn<'a> {
    pub(crate) fn new(base: &'a Context) -> Self {
        Self {
            base,
            staged: ChangeSet::new(),
        }
    }

    pub(crate) fn into_changes(self) -> ChangeSet {
        self.staged
    }

    pub fn insert_marker(&mut self, marker: DbMarker) -> Result<(), StoreError> {
        self.staged.push(PendingChange::Insert(EntityRow::Marker(marker)));
        Ok(())
    }

    pub fn insert_album(&mut self, album: DbAlbum) -> Result<(), StoreError> {
        if !self.marker_exists(&album.marker_id) {
            return Err(StoreError::NotFound {
                kind: EntityKind::Marker,
                id: album.marker_id,
            });
        }
        self.staged.push(PendingChange::Insert(EntityRow::Album(album)));
        Ok(())
    }

    pub fn insert_photo(&mut self, photo: DbPhoto) -> Result<(), StoreError> {
        if self.album(&photo.album_id).is_none() {
            return Err(StoreError::NotFound {
                kind: EntityKind::Album,
                id: photo.album_id,
            });
        }
        self.staged.push(PendingChange::Insert(EntityRow::Photo(photo)));
        Ok(())
    }

    pub fn set_album_name(&mut self, album_id: &str, name: &str) -> Result<(), StoreError> {
        let current = self.require_album(album_id)?;
        self.staged.stage_update(
            EntityRef::album(album_id),
            FieldId::AlbumName,
            FieldValue::Text(name.to_string()),
            FieldValue::Text(current.name),
        );
        Ok(())
    }

    pub fn set_album_remote_total(&mut self, album_id: &str, total: f64) -> Result<(), StoreError> {
        let current = self.require_album(album_id)?;
        self.staged.stage_update(
            EntityRef::album(album_id),
            FieldId::AlbumRemoteTotal,
            FieldValue::Count(total),
            FieldValue::Count(current.remote_total_count),
        );
        Ok(())
    }

    pub fn set_photo_name(&mut self, photo_id: &str, name: &str) -> Result<(), StoreError> {
        let current = self.require_photo(photo_id)?;
        self.staged.stage_update(
            EntityRef::photo(photo_id),
            FieldId::PhotoName,
            FieldValue::Text(name.to_string()),
            FieldValue::Text(current.name),
        );
        Ok(())
    }

    pub fn set_photo_remote_total(&mut self, photo_id: &str, total: f64) -> Result<(), StoreError> {
        let current = self.require_photo(photo_id)?;
        self.staged.stage_update(
            EntityRef::photo(photo_id),
            FieldId::PhotoRemoteTotal,
            FieldValue::Count(total),
            FieldValue::Count(current.remote_total_count),
        );
        Ok(())
    }

    /// Delete a marker and everything under it
    pub fn delete_marker(&mut self, marker_id: &str) -> Result<(), StoreError> {
        if !self.marker_exists(marker_id) {
            return Err(StoreError::NotFound {
                kind: EntityKind::Marker,
                id: marker_id.to_string(),
            });
        }

        for album in self.albums_for_marker(marker_id) {
            self.delete_album_rows(&album.id);
        }
        self.staged.push(PendingChange::Delete(EntityRef::marker(marker_id)));
        Ok(())
    }

    /// Delete an album and its photos
    pub fn delete_album(&mut self, album_id: &str) -> Result<(), StoreError> {
        if self.album(album_id).is_none() {
            return Err(StoreError::NotFound {
                kind: EntityKind::Album,
                id: album_id.to_string(),
            });
        }
        self.delete_album_rows(album_id);
        Ok(())
    }

    pub fn delete_photo(&mut self, photo_id: &str) -> Result<(), StoreError> {
        if self.photo(photo_id).is_none() {
            return Err(StoreError::NotFound {
                kind: EntityKind::Photo,
                id: photo_id.to_string(),
            });
        }
        self.staged.push(PendingChange::Delete(EntityRef::photo(photo_id)));
        Ok(())
    }

    /// Album as this transaction currently sees it
    pub fn album(&self, album_id: &str) -> Option<DbAlbum> {
        let entity = EntityRef::album(album_id);
        if self.staged.is_deleted(&entity) {
            return None;
        }

        let mut row = self
            .staged
            .inserted_album(album_id)
            .cloned()
            .or_else(|| self.base.graph.album(album_id).cloned())?;

        for (field, value) in self.staged.updates_for(&entity) {
            crate::store::changes::apply_field_to_album(&mut row, *field, value);
        }
        Some(row)
    }

    /// Photo as this transaction currently sees it
    pub fn photo(&self, photo_id: &str) -> Option<DbPhoto> {
        let entity = EntityRef::photo(photo_id);
        if self.staged.is_deleted(&entity) {
            return None;
        }

        let mut row = self
            .staged
            .inserted_photo(photo_id)
            .cloned()
            .or_else(|| self.base.graph.photo(photo_id).cloned())?;

        for (field, value) in self.staged.updates_for(&entity) {
            crate::store::changes::apply_field_to_photo(&mut row, *field, value);
        }
        Some(row)
    }

    /// Photos under an album as this transaction currently sees them
    pub fn photos_for_album(&self, album_id: &str) -> Vec<DbPhoto> {
        let mut photos: Vec<DbPhoto> = self
            .base
            .graph
            .photos_for_album(album_id)
            .into_iter()
            .filter(|p| !self.staged.is_deleted(&EntityRef::photo(&p.id)))
            .collect();

        for change in self.staged.iter() {
            if let PendingChange::Insert(EntityRow::Photo(p)) = change {
                if p.album_id == album_id && !self.staged.is_deleted(&EntityRef::photo(&p.id)) {
                    photos.push(p.clone());
                }
            }
        }
        photos
    }

    fn albums_for_marker(&self, marker_id: &str) -> Vec<DbAlbum> {
        let mut albums: Vec<DbAlbum> = self
            .base
            .graph
            .albums_for_marker(marker_id)
            .into_iter()
            .filter(|a| !self.staged.is_deleted(&EntityRef::album(&a.id)))
            .collect();

        for change in self.staged.iter() {
            if let PendingChange::Insert(EntityRow::Album(a)) = change {
                if a.marker_id == marker_id && !self.staged.is_deleted(&EntityRef::album(&a.id)) {
                    albums.push(a.clone());
                }
            }
        }
        albums
    }

    fn delete_album_rows(&mut self, album_id: &str) {
        for photo in self.photos_for_album(album_id) {
            self.staged.push(PendingChange::Delete(EntityRef::photo(&photo.id)));
        }
        self.staged.push(PendingChange::Delete(EntityRef::album(album_id)));
    }

    fn marker_exists(&self, marker_id: &str) -> bool {
        let entity = EntityRef::marker(marker_id);
        if self.staged.is_deleted(&entity) {
            return false;
        }
        self.staged.inserted_marker(marker_id).is_some()
            || self.base.graph.marker(marker_id).is_some()
    }

    fn require_album(&self, album_id: &str) -> Result<DbAlbum, StoreError> {
        self.album(album_id).ok_or_else(|| StoreError::NotFound {
            kind: EntityKind::Album,
            id: album_id.to_string(),
        })
    }

    fn require_photo(&self, photo_id: &str) -> Result<DbPhoto, StoreError> {
        self.photo(photo_id).ok_or_else(|| StoreError::NotFound {
            kind: EntityKind::Photo,
            id: photo_id.to_string(),
        })
    }
}

/// Edit handle for staging reader-side scratch edits
///
/// Reader edits are visible to local reads immediately but stay pending
/// until `save_reader`; they never cross into the writer context uncommitted.
pub struct ReaderTxn<'a> {
    ctx: &'a mut Context,
}

impl<'a> ReaderTxn<'a> {
    pub(crate) fn new(ctx: &'a mut Context) -> Self {
        Self { ctx }
    }

    pub fn set_album_name(&mut self, album_id: &str, name: &str) -> Result<(), StoreError> {
        self.stage(
            EntityRef::album(album_id),
            FieldId::AlbumName,
            FieldValue::Text(name.to_string()),
        )
    }

    pub fn set_album_remote_total(&mut self, album_id: &str, total: f64) -> Result<(), StoreError> {
        self.stage(
            EntityRef::album(album_id),
            FieldId::AlbumRemoteTotal,
            FieldValue::Count(total),
        )
    }

    pub fn set_photo_name(&mut self, photo_id: &str, name: &str) -> Result<(), StoreError> {
        self.stage(
            EntityRef::photo(photo_id),
            FieldId::PhotoName,
            FieldValue::Text(name.to_string()),
        )
    }

    fn stage(
        &mut self,
        entity: EntityRef,
        field: FieldId,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        let base = self
            .ctx
            .graph
            .field_value(&entity, field)
            .ok_or_else(|| StoreError::NotFound {
                kind: entity.kind,
                id: entity.id.clone(),
            })?;

        // Revision stays put until the edit commits
        self.ctx.graph.set_field(&entity, field, &value, false);
        self.ctx.pending.stage_update(entity, field, value, base);
        Ok(())
    }
}
