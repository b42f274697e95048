// # Fetch Module
//
// Turns "fetch a page of images for album A" into cached photo rows.
//
// - **pipeline**: one search + fan-out downloads, joined into a full page,
//   then merged into the cache store in a single commit
// - **service**: worker that guards against overlapping fetches per album
//   and reports completion or failure (with a retry token) over a channel

mod pipeline;
mod service;

pub use pipeline::{FetchPipeline, FetchedImage, PageResult};
pub use service::{FetchEvent, FetchHandle, FetchRequest, FetchService};

use thiserror::Error;

use crate::store::StoreError;

/// Everything that can go wrong fetching a page
///
/// Nothing in here retries; every failure travels to the caller alongside
/// enough context to re-issue the same request.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("a fetch for album {album_id} is already in flight")]
    InFlight { album_id: String },
    #[error("download task failed: {0}")]
    Join(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
