use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-placed geographic point
///
/// Markers are created by user action and never mutated afterwards.
/// Deleting a marker cascades to its albums and their photos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbMarker {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

impl DbMarker {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            latitude,
            longitude,
            created_at: Utc::now(),
        }
    }
}

/// A named photo album under one marker
///
/// `remote_total_count` is the last total result count the remote search
/// reported for this album's location query. It persists across refreshes so
/// the next page can be computed even after every cached photo is deleted.
/// A value of 0 means "never fetched", not "zero remote results".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbAlbum {
    pub id: String,
    pub marker_id: String,
    pub name: String,
    pub remote_total_count: f64,
    pub created_at: DateTime<Utc>,
}

impl DbAlbum {
    pub fn new(marker_id: &str, name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            marker_id: marker_id.to_string(),
            name: name.to_string(),
            remote_total_count: 0.0,
            created_at: Utc::now(),
        }
    }
}

/// One cached downloaded image
///
/// Photos are only ever created by the fetch pipeline's merge step.
/// `remote_total_count` is copied from the page total at fetch time so the
/// value survives even when the album row is read from a stale snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbPhoto {
    pub id: String,
    pub album_id: String,
    pub name: String,
    pub image_bytes: Vec<u8>,
    pub remote_total_count: f64,
}

impl DbPhoto {
    pub fn new(album_id: &str, name: &str, image_bytes: Vec<u8>, remote_total_count: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            album_id: album_id.to_string(),
            name: name.to_string(),
            image_bytes,
            remote_total_count,
        }
    }
}
