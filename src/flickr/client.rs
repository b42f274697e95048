use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

use crate::fetch::FetchError;
use crate::flickr::models::{FlickrPhoto, GeoPoint, SearchPage, SearchResponse};
use crate::pagination::{BBOX_HALF_WIDTH_DEG, PAGE_SIZE};

const DOWNLOAD_BASE: &str = "https://live.staticflickr.com";

/// Remote image source: location search plus per-item download
///
/// The trait seam exists so the fetch pipeline can run against a mock source
/// in tests; `FlickrClient` is the production implementation.
#[async_trait]
pub trait RemoteImageSource: Send + Sync {
    /// Search for photos around a bounding-box center, returning one page of
    /// descriptors and the total result count for the query
    async fn search(&self, center: GeoPoint, page: u32) -> Result<SearchPage, FetchError>;

    /// Download the raw image bytes for one descriptor
    async fn download(&self, photo: &FlickrPhoto) -> Result<Vec<u8>, FetchError>;
}

#[derive(Clone)]
pub struct FlickrClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FlickrClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    /// Download URL for a photo descriptor, per the Flickr URL scheme
    fn download_url(photo: &FlickrPhoto) -> String {
        format!(
            "{}/{}/{}_{}.jpg",
            DOWNLOAD_BASE, photo.server, photo.id, photo.secret
        )
    }

    /// Bounding box of ±5 degrees around the center, in Flickr's
    /// min_lon,min_lat,max_lon,max_lat order
    fn bbox(center: GeoPoint) -> String {
        format!(
            "{},{},{},{}",
            center.longitude - BBOX_HALF_WIDTH_DEG,
            center.latitude - BBOX_HALF_WIDTH_DEG,
            center.longitude + BBOX_HALF_WIDTH_DEG,
            center.latitude + BBOX_HALF_WIDTH_DEG
        )
    }
}

#[async_trait]
impl RemoteImageSource for FlickrClient {
    async fn search(&self, center: GeoPoint, page: u32) -> Result<SearchPage, FetchError> {
        let per_page = PAGE_SIZE.to_string();
        let page = page.to_string();
        let bbox = Self::bbox(center);

        let mut params = HashMap::new();
        params.insert("method", "flickr.photos.search");
        params.insert("format", "json");
        params.insert("nojsoncallback", "1");
        params.insert("per_page", &per_page);
        params.insert("accuracy", "8");
        params.insert("privacy_filter", "1");
        params.insert("page", &page);
        params.insert("bbox", &bbox);
        params.insert("api_key", &self.api_key);

        debug!("Searching photos around ({}, {})", center.latitude, center.longitude);

        let response = self.client.get(&self.base_url).query(&params).send().await?;

        let status = response.status().as_u16();
        if (200..400).contains(&status) {
            let body = response.text().await?;
            let decoded: SearchResponse = serde_json::from_str(&body)?;
            Ok(decoded.photos)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::Http {
                status,
                message: extract_error_message(&body, status),
            })
        }
    }

    async fn download(&self, photo: &FlickrPhoto) -> Result<Vec<u8>, FetchError> {
        let url = Self::download_url(photo);

        let response = self.client.get(&url).send().await?;

        let status = response.status().as_u16();
        if (200..400).contains(&status) {
            Ok(response.bytes().await?.to_vec())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::Http {
                status,
                message: extract_error_message(&body, status),
            })
        }
    }
}

/// Pull the `message` field out of an error body when the server sent JSON,
/// otherwise fall back to a templated message with the status code
fn extract_error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| format!("the server responded with status {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_url_follows_flickr_scheme() {
        let photo = FlickrPhoto {
            id: "53001".to_string(),
            owner: "1234@N01".to_string(),
            secret: "abcdef".to_string(),
            server: "65535".to_string(),
            title: "untitled".to_string(),
        };

        assert_eq!(
            FlickrClient::download_url(&photo),
            "https://live.staticflickr.com/65535/53001_abcdef.jpg"
        );
    }

    #[test]
    fn bbox_spans_five_degrees_around_center() {
        let center = GeoPoint {
            latitude: 52.0,
            longitude: 13.5,
        };

        assert_eq!(FlickrClient::bbox(center), "8.5,47,18.5,57");
    }

    #[test]
    fn error_message_prefers_json_body_field() {
        let body = r#"{"stat":"fail","code":100,"message":"Invalid API Key"}"#;
        assert_eq!(extract_error_message(body, 400), "Invalid API Key");
    }

    #[test]
    fn error_message_falls_back_to_status_template() {
        assert_eq!(
            extract_error_message("<html>nope</html>", 502),
            "the server responded with status 502"
        );
    }
}
