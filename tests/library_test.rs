mod support;

use std::sync::Arc;

use support::{tracing_init, MockImageSource};
use waymark::fetch::{FetchEvent, FetchService};
use waymark::library::{Library, DEFAULT_ALBUM_NAME};
use waymark::store::CacheStore;

async fn library_with_source(
    total: f64,
) -> (
    Library,
    Arc<MockImageSource>,
    tokio::sync::mpsc::UnboundedReceiver<FetchEvent>,
) {
    let store = Arc::new(CacheStore::open_in_memory().await.unwrap());
    let source = Arc::new(MockImageSource::new(total));
    let (handle, events_rx) = FetchService::start(Arc::clone(&store), source.clone());
    (Library::new(store, handle), source, events_rx)
}

async fn expect_completed(events_rx: &mut tokio::sync::mpsc::UnboundedReceiver<FetchEvent>) {
    match events_rx.recv().await.unwrap() {
        FetchEvent::Completed { .. } => {}
        other => panic!("expected a completion event, got {:?}", other),
    }
}

#[tokio::test]
async fn new_marker_arrives_with_a_populated_default_album() {
    tracing_init();
    let (library, source, mut events_rx) = library_with_source(120.0).await;

    let marker = library.create_marker(52.52, 13.4).await.unwrap();

    let albums = library.albums_for_marker(&marker.id);
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].name, DEFAULT_ALBUM_NAME);

    expect_completed(&mut events_rx).await;

    let photos = library.photos_for_album(&albums[0].id);
    assert_eq!(photos.len(), 25);
    assert!(photos.iter().all(|p| p.remote_total_count == 120.0));

    let album = library.store().album(&albums[0].id).unwrap();
    assert_eq!(album.remote_total_count, 120.0);

    // Nothing fetched yet for this album, so the first page is always 1
    assert_eq!(source.requested_pages(), vec![1]);
}

#[tokio::test]
async fn new_album_triggers_its_own_initial_fetch() {
    tracing_init();
    let (library, _source, mut events_rx) = library_with_source(40.0).await;

    let marker = library.create_marker(41.9, 12.5).await.unwrap();
    expect_completed(&mut events_rx).await;

    let album = library.create_album(&marker.id, "forum").await.unwrap();
    expect_completed(&mut events_rx).await;

    assert_eq!(library.photos_for_album(&album.id).len(), 25);
    assert_eq!(library.albums_for_marker(&marker.id).len(), 2);
}

#[tokio::test]
async fn refresh_replaces_photos_and_keeps_the_remote_total() {
    tracing_init();
    let (library, source, mut events_rx) = library_with_source(120.0).await;

    let marker = library.create_marker(35.68, 139.69).await.unwrap();
    expect_completed(&mut events_rx).await;

    let album_id = library.albums_for_marker(&marker.id)[0].id.clone();
    let before: Vec<String> = library
        .photos_for_album(&album_id)
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(before.len(), 25);

    library.refresh_album(&album_id).await.unwrap();

    // The total survives the photo wipe even before the new page lands
    let album = library.store().album(&album_id).unwrap();
    assert_eq!(album.remote_total_count, 120.0);

    expect_completed(&mut events_rx).await;

    let after: Vec<String> = library
        .photos_for_album(&album_id)
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(after.len(), 25);
    assert!(after.iter().all(|id| !before.contains(id)));

    // 120 results at 25 per page: the refresh page is drawn from [0, 5)
    let pages = source.requested_pages();
    assert_eq!(pages[0], 1);
    assert!(pages[1] < 5, "refresh picked page {}", pages[1]);
}

#[tokio::test]
async fn refresh_of_an_emptied_album_still_knows_its_page_range() {
    tracing_init();
    let (library, source, mut events_rx) = library_with_source(120.0).await;

    let marker = library.create_marker(-33.86, 151.2).await.unwrap();
    expect_completed(&mut events_rx).await;

    let album_id = library.albums_for_marker(&marker.id)[0].id.clone();
    for photo in library.photos_for_album(&album_id) {
        library.delete_photo(&photo.id).await.unwrap();
    }
    assert!(library.photos_for_album(&album_id).is_empty());

    // No photos left to copy the total from; the album row still carries it
    library.refresh_album(&album_id).await.unwrap();
    expect_completed(&mut events_rx).await;

    let album = library.store().album(&album_id).unwrap();
    assert_eq!(album.remote_total_count, 120.0);
    assert!(*source.requested_pages().last().unwrap() < 5);
}

#[tokio::test]
async fn deleting_an_album_takes_its_photos_along() {
    tracing_init();
    let (library, _source, mut events_rx) = library_with_source(60.0).await;

    let marker = library.create_marker(59.33, 18.07).await.unwrap();
    expect_completed(&mut events_rx).await;

    let album_id = library.albums_for_marker(&marker.id)[0].id.clone();
    assert_eq!(library.photos_for_album(&album_id).len(), 25);

    library.delete_album(&album_id).await.unwrap();

    assert!(library.albums_for_marker(&marker.id).is_empty());
    assert!(library.photos_for_album(&album_id).is_empty());
}

#[tokio::test]
async fn deleting_a_marker_clears_the_whole_subtree() {
    tracing_init();
    let (library, _source, mut events_rx) = library_with_source(60.0).await;

    let marker = library.create_marker(55.75, 37.62).await.unwrap();
    expect_completed(&mut events_rx).await;

    let album_id = library.albums_for_marker(&marker.id)[0].id.clone();

    library.delete_marker(&marker.id).await.unwrap();

    assert!(library.markers().is_empty());
    assert!(library.albums_for_marker(&marker.id).is_empty());
    assert!(library.photos_for_album(&album_id).is_empty());
}
