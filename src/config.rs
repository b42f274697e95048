use std::path::PathBuf;

/// Application configuration
/// In debug builds: loads overrides from a .env file when one is present
#[derive(Clone, Debug)]
pub struct Config {
    /// API key for the remote image search service
    pub api_key: String,
    /// Base URL of the remote image search endpoint
    pub api_base: String,
    /// Path to the sqlite database file
    pub database_path: PathBuf,
}

const DEFAULT_API_BASE: &str = "https://www.flickr.com/services/rest/";

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        if dotenvy::dotenv().is_ok() {
            tracing::info!("Config: Dev mode activated - loaded .env file");
        }

        let api_key = std::env::var("WAYMARK_API_KEY").unwrap_or_default();

        let api_base =
            std::env::var("WAYMARK_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let database_path = std::env::var("WAYMARK_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_database_path());

        Self {
            api_key,
            api_base,
            database_path,
        }
    }

    /// Default database location under the platform data directory
    fn default_database_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("waymark")
            .join("waymark.db")
    }
}
