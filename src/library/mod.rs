// # Library Module
//
// The coordinating facade over the cache store, the pagination policy and
// the fetch service. User actions (create marker, create album, delete,
// refresh) enter here as direct calls.

mod manager;

pub use manager::{Library, LibraryError, DEFAULT_ALBUM_NAME};
