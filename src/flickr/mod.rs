// # Flickr Module
//
// Client for the Flickr photo search API, the crate's remote image source.
//
// - **models**: wire structs for the photos.search response
// - **client**: reqwest-backed implementation of `RemoteImageSource`

mod client;
mod models;

pub use client::{FlickrClient, RemoteImageSource};
pub use models::{FlickrPhoto, GeoPoint, SearchPage, SearchResponse};
