use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use crate::fetch::FetchError;
use crate::flickr::{GeoPoint, RemoteImageSource};
use crate::store::CacheStore;

/// One successfully downloaded image
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A fully downloaded page plus the remote total for the query
#[derive(Debug, Clone)]
pub struct PageResult {
    pub items: Vec<FetchedImage>,
    pub total: f64,
}

/// Resolves one page request into downloaded images
///
/// The page is all-or-nothing: a single failed download fails the whole page
/// and nothing is merged, but sibling downloads are left to finish rather
/// than cancelled mid-flight.
pub struct FetchPipeline {
    source: Arc<dyn RemoteImageSource>,
}

impl FetchPipeline {
    pub fn new(source: Arc<dyn RemoteImageSource>) -> Self {
        Self { source }
    }

    /// Fetch one page of images around the given center
    ///
    /// Issues the search, then downloads every descriptor concurrently and
    /// joins them all before returning. A page with fewer descriptors than
    /// the page size (sparse location) completes with what it got.
    pub async fn fetch_page(&self, center: GeoPoint, page: u32) -> Result<PageResult, FetchError> {
        let search_page = self.source.search(center, page).await?;
        let total = search_page.total;
        let descriptor_count = search_page.photo.len();

        debug!(
            "Page {} returned {} descriptors ({} total remote results)",
            page, descriptor_count, total
        );

        let mut downloads = FuturesUnordered::new();
        for (index, photo) in search_page.photo.into_iter().enumerate() {
            let source = Arc::clone(&self.source);
            downloads.push(tokio::spawn(async move {
                let bytes = source.download(&photo).await?;
                Ok::<(usize, FetchedImage), FetchError>((
                    index,
                    FetchedImage {
                        name: photo.title,
                        bytes,
                    },
                ))
            }));
        }

        // Join barrier: every download finishes before the page resolves,
        // and the first failure is kept without cancelling the rest
        let mut slots: Vec<Option<FetchedImage>> = Vec::new();
        slots.resize_with(descriptor_count, || None);
        let mut first_error: Option<FetchError> = None;

        while let Some(joined) = downloads.next().await {
            match joined {
                Ok(Ok((index, image))) => slots[index] = Some(image),
                Ok(Err(error)) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error = Some(FetchError::Join(join_error.to_string()));
                    }
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        Ok(PageResult {
            items: slots.into_iter().flatten().collect(),
            total,
        })
    }

    /// Merge a completed page into the cache under the target album
    ///
    /// One commit creates every photo (each carrying the page total) and
    /// writes the same total onto the album. This is the only path that
    /// creates photo rows.
    pub async fn merge_page(
        &self,
        store: &CacheStore,
        album_id: &str,
        page: PageResult,
    ) -> Result<usize, FetchError> {
        let count = page.items.len();
        let album_id = album_id.to_string();
        let total = page.total;

        store
            .commit(move |txn| {
                for item in page.items {
                    let photo = crate::db::DbPhoto::new(&album_id, &item.name, item.bytes, total);
                    txn.insert_photo(photo)?;
                }
                txn.set_album_remote_total(&album_id, total)?;
                Ok(())
            })
            .await?;

        info!("Merged {} photos (remote total {})", count, total);
        Ok(count)
    }
}
