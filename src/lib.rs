// waymark: a synchronized local cache of map markers, photo albums and
// remotely fetched photos. The crate is an embedded library core; map
// rendering and any other UI lives with the caller.

pub mod config;
pub mod db;
pub mod fetch;
pub mod flickr;
pub mod library;
pub mod observe;
pub mod pagination;
pub mod store;

pub use library::Library;
pub use store::CacheStore;
