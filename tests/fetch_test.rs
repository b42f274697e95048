mod support;

use std::sync::Arc;
use std::time::Duration;

use support::{tracing_init, MockImageSource};
use waymark::db::{DbAlbum, DbMarker};
use waymark::fetch::{FetchError, FetchEvent, FetchPipeline, FetchRequest, FetchService};
use waymark::flickr::GeoPoint;
use waymark::store::CacheStore;

const CENTER: GeoPoint = GeoPoint {
    latitude: 52.52,
    longitude: 13.4,
};

async fn store_with_album(store: &CacheStore) -> DbAlbum {
    let marker = DbMarker::new(CENTER.latitude, CENTER.longitude);
    let album = DbAlbum::new(&marker.id, "test album");

    let marker_row = marker.clone();
    let album_row = album.clone();
    store
        .commit(move |txn| {
            txn.insert_marker(marker_row)?;
            txn.insert_album(album_row)?;
            Ok(())
        })
        .await
        .expect("commit failed");

    album
}

fn request_for(album: &DbAlbum, page: u32) -> FetchRequest {
    FetchRequest {
        album_id: album.id.clone(),
        center: CENTER,
        page,
    }
}

#[tokio::test]
async fn full_page_merges_photos_with_one_shared_total() {
    tracing_init();
    let store = CacheStore::open_in_memory().await.unwrap();
    let album = store_with_album(&store).await;

    let source = Arc::new(MockImageSource::new(120.0));
    let pipeline = FetchPipeline::new(source);

    let page = pipeline.fetch_page(CENTER, 1).await.unwrap();
    assert_eq!(page.items.len(), 25);
    assert_eq!(page.total, 120.0);

    let merged = pipeline.merge_page(&store, &album.id, page).await.unwrap();
    assert_eq!(merged, 25);

    let photos = store.photos_for_album(&album.id);
    assert_eq!(photos.len(), 25);
    assert!(photos.iter().all(|p| p.remote_total_count == 120.0));
    assert_eq!(store.album(&album.id).unwrap().remote_total_count, 120.0);
}

#[tokio::test]
async fn sparse_page_completes_with_what_it_got() {
    tracing_init();
    let source = Arc::new(MockImageSource::with_page_size(3.0, 3));
    let pipeline = FetchPipeline::new(source);

    let page = pipeline.fetch_page(CENTER, 1).await.unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total, 3.0);
}

#[tokio::test]
async fn one_failed_download_fails_the_whole_page() {
    tracing_init();
    let store = CacheStore::open_in_memory().await.unwrap();
    let album = store_with_album(&store).await;

    let source = Arc::new(MockImageSource::new(120.0));
    source.fail_download(&MockImageSource::photo_id(7));
    let pipeline = FetchPipeline::new(source);

    let result = pipeline.fetch_page(CENTER, 1).await;
    assert!(matches!(result, Err(FetchError::Http { status: 500, .. })));

    // Nothing was merged
    assert!(store.photos_for_album(&album.id).is_empty());
    assert_eq!(store.album(&album.id).unwrap().remote_total_count, 0.0);
}

#[tokio::test]
async fn service_reports_failure_once_with_a_retry_token() {
    tracing_init();
    let store = Arc::new(CacheStore::open_in_memory().await.unwrap());
    let album = store_with_album(&store).await;

    let source = Arc::new(MockImageSource::new(120.0));
    source.fail_download(&MockImageSource::photo_id(3));
    let (handle, mut events_rx) = FetchService::start(Arc::clone(&store), source.clone());

    handle.request(request_for(&album, 1)).await.unwrap();

    let retry = match events_rx.recv().await.unwrap() {
        FetchEvent::Failed {
            album_id,
            error,
            retry,
        } => {
            assert_eq!(album_id, album.id);
            assert!(matches!(error, FetchError::Http { status: 500, .. }));
            retry
        }
        other => panic!("expected a failure event, got {:?}", other),
    };
    assert!(store.photos_for_album(&album.id).is_empty());

    // The caller decides to retry; this time every download succeeds
    source.clear_download_failures();
    handle.request(retry).await.unwrap();

    match events_rx.recv().await.unwrap() {
        FetchEvent::Completed {
            album_id,
            photos_added,
            remote_total,
        } => {
            assert_eq!(album_id, album.id);
            assert_eq!(photos_added, 25);
            assert_eq!(remote_total, 120.0);
        }
        other => panic!("expected a completion event, got {:?}", other),
    }
    assert_eq!(store.photos_for_album(&album.id).len(), 25);
}

#[tokio::test]
async fn search_failure_surfaces_the_http_error() {
    tracing_init();
    let store = Arc::new(CacheStore::open_in_memory().await.unwrap());
    let album = store_with_album(&store).await;

    let source = Arc::new(MockImageSource::new(120.0));
    source.fail_next_searches(true);
    let (handle, mut events_rx) = FetchService::start(Arc::clone(&store), source);

    handle.request(request_for(&album, 1)).await.unwrap();

    match events_rx.recv().await.unwrap() {
        FetchEvent::Failed { error, .. } => {
            assert!(matches!(error, FetchError::Http { status: 500, .. }));
        }
        other => panic!("expected a failure event, got {:?}", other),
    }
}

#[tokio::test]
async fn overlapping_fetch_for_the_same_album_is_rejected() {
    tracing_init();
    let store = Arc::new(CacheStore::open_in_memory().await.unwrap());
    let album = store_with_album(&store).await;

    let source =
        Arc::new(MockImageSource::new(120.0).with_download_delay(Duration::from_millis(100)));
    let (handle, mut events_rx) = FetchService::start(Arc::clone(&store), source);

    handle.request(request_for(&album, 1)).await.unwrap();

    let second = handle.request(request_for(&album, 2)).await;
    assert!(matches!(second, Err(FetchError::InFlight { .. })));

    // The first fetch still completes normally
    match events_rx.recv().await.unwrap() {
        FetchEvent::Completed { photos_added, .. } => assert_eq!(photos_added, 25),
        other => panic!("expected a completion event, got {:?}", other),
    }

    // Once it is done, the album accepts requests again
    handle.request(request_for(&album, 2)).await.unwrap();
    match events_rx.recv().await.unwrap() {
        FetchEvent::Completed { .. } => {}
        other => panic!("expected a completion event, got {:?}", other),
    }
}
