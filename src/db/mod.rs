// # Database Module
//
// Sqlite persistence for the marker → album → photo entity graph.
//
// - **models**: row structs shared across the crate
// - **client**: pool setup, schema creation, row mapping, commit batches

mod client;
mod models;

pub use client::{Database, RowOp};
pub use models::{DbAlbum, DbMarker, DbPhoto};
