use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use waymark::fetch::FetchError;
use waymark::flickr::{FlickrPhoto, GeoPoint, RemoteImageSource, SearchPage};
use waymark::pagination::{page_count, PAGE_SIZE};

/// In-memory remote image source
///
/// Serves a deterministic set of descriptors per page and byte payloads
/// derived from the descriptor id. Individual downloads or the search itself
/// can be made to fail, and every requested page number is recorded.
pub struct MockImageSource {
    total: f64,
    descriptors_per_page: usize,
    download_delay: Option<Duration>,
    fail_search: Mutex<bool>,
    fail_downloads: Mutex<HashSet<String>>,
    requested_pages: Mutex<Vec<u32>>,
}

impl MockImageSource {
    pub fn new(total: f64) -> Self {
        Self::with_page_size(total, PAGE_SIZE as usize)
    }

    pub fn with_page_size(total: f64, descriptors_per_page: usize) -> Self {
        Self {
            total,
            descriptors_per_page,
            download_delay: None,
            fail_search: Mutex::new(false),
            fail_downloads: Mutex::new(HashSet::new()),
            requested_pages: Mutex::new(Vec::new()),
        }
    }

    /// Slow every download down, to keep a fetch in flight during a test
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn fail_download(&self, photo_id: &str) {
        self.fail_downloads
            .lock()
            .unwrap()
            .insert(photo_id.to_string());
    }

    pub fn clear_download_failures(&self) {
        self.fail_downloads.lock().unwrap().clear();
    }

    pub fn fail_next_searches(&self, fail: bool) {
        *self.fail_search.lock().unwrap() = fail;
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested_pages.lock().unwrap().clone()
    }

    pub fn photo_id(index: usize) -> String {
        format!("photo-{:02}", index)
    }

    pub fn payload(index: usize) -> Vec<u8> {
        Self::photo_id(index).into_bytes()
    }
}

#[async_trait]
impl RemoteImageSource for MockImageSource {
    async fn search(&self, _center: GeoPoint, page: u32) -> Result<SearchPage, FetchError> {
        self.requested_pages.lock().unwrap().push(page);

        if *self.fail_search.lock().unwrap() {
            return Err(FetchError::Http {
                status: 500,
                message: "mock search failure".to_string(),
            });
        }

        let photo = (0..self.descriptors_per_page)
            .map(|i| FlickrPhoto {
                id: Self::photo_id(i),
                owner: "mock-owner".to_string(),
                secret: format!("secret-{}", i),
                server: "65535".to_string(),
                title: format!("title-{:02}", i),
            })
            .collect();

        Ok(SearchPage {
            page,
            pages: page_count(self.total),
            perpage: PAGE_SIZE,
            total: self.total,
            photo,
        })
    }

    async fn download(&self, photo: &FlickrPhoto) -> Result<Vec<u8>, FetchError> {
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_downloads.lock().unwrap().contains(&photo.id) {
            return Err(FetchError::Http {
                status: 500,
                message: "mock download failure".to_string(),
            });
        }

        Ok(photo.id.clone().into_bytes())
    }
}
