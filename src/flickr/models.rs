use serde::{Deserialize, Deserializer};

/// Geographic center of a bounding-box search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// One photo descriptor from a search result page
///
/// The download URL is derived from `server`, `id` and `secret`
/// (see https://www.flickr.com/services/api/misc.urls.html).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FlickrPhoto {
    pub id: String,
    pub owner: String,
    pub secret: String,
    pub server: String,
    pub title: String,
}

/// One page of search results
///
/// The legacy endpoint returns `pages` and `total` as JSON strings, newer
/// deployments as numbers; both forms are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    pub page: u32,
    #[serde(deserialize_with = "u32_from_string_or_number")]
    pub pages: u32,
    pub perpage: u32,
    #[serde(deserialize_with = "f64_from_string_or_number")]
    pub total: f64,
    pub photo: Vec<FlickrPhoto>,
}

/// Top-level photos.search response wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub photos: SearchPage,
    pub stat: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn f64_from_string_or_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn u32_from_string_or_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    f64_from_string_or_number(deserializer).map(|n| n as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_stringly_typed_page_fields() {
        let body = r#"
        {
            "photos": {
                "page": 1,
                "pages": "5",
                "perpage": 25,
                "total": "120",
                "photo": [
                    {
                        "id": "53001",
                        "owner": "1234@N01",
                        "secret": "abcdef",
                        "server": "65535",
                        "title": "harbour at dusk"
                    }
                ]
            },
            "stat": "ok"
        }
        "#;

        let decoded: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.stat, "ok");
        assert_eq!(decoded.photos.pages, 5);
        assert_eq!(decoded.photos.total, 120.0);
        assert_eq!(decoded.photos.photo.len(), 1);
        assert_eq!(decoded.photos.photo[0].title, "harbour at dusk");
    }

    #[test]
    fn decodes_numeric_page_fields() {
        let body = r#"
        {
            "photos": { "page": 2, "pages": 3, "perpage": 25, "total": 70, "photo": [] },
            "stat": "ok"
        }
        "#;

        let decoded: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.photos.pages, 3);
        assert_eq!(decoded.photos.total, 70.0);
    }
}
