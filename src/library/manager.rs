use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::db::{DbAlbum, DbMarker, DbPhoto};
use crate::fetch::{FetchError, FetchEvent, FetchHandle, FetchRequest, FetchService};
use crate::flickr::{FlickrClient, GeoPoint};
use crate::pagination;
use crate::store::{CacheStore, StoreError};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Name of the album created automatically with every new marker
pub const DEFAULT_ALBUM_NAME: &str = "Album 1";

/// The main entry point for user-driven mutations
///
/// Owns the cache store handle and the fetch service handle. Every mutation
/// is one committed write; fetches triggered here report their outcome
/// through the fetch event channel, and the library adds no retry policy of
/// its own.
pub struct Library {
    store: Arc<CacheStore>,
    fetch: FetchHandle,
}

impl Library {
    pub fn new(store: Arc<CacheStore>, fetch: FetchHandle) -> Self {
        Self { store, fetch }
    }

    /// Wire up a store, a Flickr client and a fetch service from config
    ///
    /// Returns the library plus the fetch event channel the caller consumes
    /// for completion reports and retry prompts.
    pub async fn bootstrap(
        config: &Config,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FetchEvent>), LibraryError> {
        let store = Arc::new(CacheStore::open(config.database_path.to_str().unwrap()).await?);
        let source = Arc::new(FlickrClient::new(
            config.api_key.clone(),
            config.api_base.clone(),
        ));
        let (fetch, events_rx) = FetchService::start(Arc::clone(&store), source);
        Ok((Self::new(store, fetch), events_rx))
    }

    /// The underlying store, for reads and observers
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Drop a marker at the given coordinates
    ///
    /// The marker arrives with its default album, and the default album's
    /// initial fetch is triggered right away.
    pub async fn create_marker(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<DbMarker, LibraryError> {
        let marker = DbMarker::new(latitude, longitude);
        let album = DbAlbum::new(&marker.id, DEFAULT_ALBUM_NAME);

        let marker_row = marker.clone();
        let album_row = album.clone();
        self.store
            .commit(move |txn| {
                txn.insert_marker(marker_row)?;
                txn.insert_album(album_row)?;
                Ok(())
            })
            .await?;

        info!(
            "Created marker {} at ({}, {})",
            marker.id, latitude, longitude
        );

        self.request_fetch(&album).await?;
        Ok(marker)
    }

    /// Create a named album under a marker
    ///
    /// A new album has no cached photos, so its initial fetch is triggered
    /// immediately (unknown remote total maps to page 1).
    pub async fn create_album(
        &self,
        marker_id: &str,
        name: &str,
    ) -> Result<DbAlbum, LibraryError> {
        let album = DbAlbum::new(marker_id, name);

        let album_row = album.clone();
        self.store
            .commit(move |txn| txn.insert_album(album_row))
            .await?;

        info!("Created album {} ({}) under marker {}", album.id, name, marker_id);

        self.request_fetch(&album).await?;
        Ok(album)
    }

    /// Delete a single photo
    pub async fn delete_photo(&self, photo_id: &str) -> Result<(), LibraryError> {
        let photo_id = photo_id.to_string();
        self.store
            .commit(move |txn| txn.delete_photo(&photo_id))
            .await?;
        Ok(())
    }

    /// Delete an album and its photos
    pub async fn delete_album(&self, album_id: &str) -> Result<(), LibraryError> {
        let album_id = album_id.to_string();
        self.store
            .commit(move |txn| txn.delete_album(&album_id))
            .await?;
        Ok(())
    }

    /// Delete a marker, its albums and their photos
    pub async fn delete_marker(&self, marker_id: &str) -> Result<(), LibraryError> {
        let marker_id = marker_id.to_string();
        self.store
            .commit(move |txn| txn.delete_marker(&marker_id))
            .await?;
        Ok(())
    }

    /// Discard an album's photos and fetch a different remote page
    ///
    /// The last known remote total is carried forward from the deleted
    /// photos (falling back to the album's own value), never recomputed, so
    /// the new page is drawn from the same page range. Surfaces
    /// [`FetchError::InFlight`] unchanged when a fetch for this album is
    /// still running.
    pub async fn refresh_album(&self, album_id: &str) -> Result<(), LibraryError> {
        let album = self.require_album(album_id)?;
        let photos = self.store.photos_for_album(album_id);

        let carried_total = photos
            .first()
            .map(|p| p.remote_total_count)
            .filter(|t| *t > 0.0)
            .unwrap_or(album.remote_total_count);

        let photo_ids: Vec<String> = photos.into_iter().map(|p| p.id).collect();
        let album_id_owned = album_id.to_string();
        self.store
            .commit(move |txn| {
                for photo_id in &photo_ids {
                    txn.delete_photo(photo_id)?;
                }
                txn.set_album_remote_total(&album_id_owned, carried_total)?;
                Ok(())
            })
            .await?;

        info!(
            "Refreshing album {} (carried remote total {})",
            album_id, carried_total
        );

        // Re-read after the commit; the carried total decides the page range
        let refreshed = self.require_album(album_id)?;
        self.request_fetch(&refreshed).await?;
        Ok(())
    }

    /// All markers, in map-load order
    pub fn markers(&self) -> Vec<DbMarker> {
        self.store.markers()
    }

    /// Albums for one marker, in observer sort order
    pub fn albums_for_marker(&self, marker_id: &str) -> Vec<DbAlbum> {
        self.store.albums_for_marker(marker_id)
    }

    /// Photos for one album, in observer sort order
    pub fn photos_for_album(&self, album_id: &str) -> Vec<DbPhoto> {
        self.store.photos_for_album(album_id)
    }

    async fn request_fetch(&self, album: &DbAlbum) -> Result<(), LibraryError> {
        let marker = self
            .store
            .marker(&album.marker_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: crate::store::EntityKind::Marker,
                id: album.marker_id.clone(),
            })?;

        let page = pagination::next_page_thread_rng(album.remote_total_count);
        self.fetch
            .request(FetchRequest {
                album_id: album.id.clone(),
                center: GeoPoint {
                    latitude: marker.latitude,
                    longitude: marker.longitude,
                },
                page,
            })
            .await?;
        Ok(())
    }

    fn require_album(&self, album_id: &str) -> Result<DbAlbum, LibraryError> {
        self.store
            .album(album_id)
            .ok_or_else(|| {
                LibraryError::Store(StoreError::NotFound {
                    kind: crate::store::EntityKind::Album,
                    id: album_id.to_string(),
                })
            })
    }
}
