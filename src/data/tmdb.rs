//! TMDB API client
//!
//! Fetches raw detail JSON for a cache key. Decoding happens in the cache
//! layer so that the exact bytes can be written to disk.

use futures::future::BoxFuture;
use reqwest::Client;
use tracing::debug;

use crate::cache::{CacheKey, DetailFetcher, FetchError};

/// Base URL for the TMDB v3 API
const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Client for fetching detail JSON from TMDB
#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
    language: String,
}

impl TmdbClient {
    /// Create a new TmdbClient with default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    /// Create a new TmdbClient with a custom HTTP client
    pub fn with_client(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: TMDB_BASE_URL.to_string(),
            language: "en-US".to_string(),
        }
    }

    /// Point the client at another server, e.g. a local mock
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Builds the detail URL for `key`
    ///
    /// Movies and shows get their credits and recommendations appended,
    /// people get their combined credits.
    pub fn detail_url(&self, key: &CacheKey) -> String {
        let (path, append) = match key {
            CacheKey::Movie { id } => (format!("/movie/{}", id), Some("credits,recommendations")),
            CacheKey::Show { id } => (format!("/tv/{}", id), Some("credits,recommendations")),
            CacheKey::Season {
                tv_id,
                season_number,
            } => (format!("/tv/{}/season/{}", tv_id, season_number), None),
            CacheKey::Person { id } => (format!("/person/{}", id), Some("combined_credits")),
        };

        let mut url = format!(
            "{}{}?api_key={}&language={}",
            self.base_url, path, self.api_key, self.language
        );
        if let Some(append) = append {
            url.push_str("&append_to_response=");
            url.push_str(append);
        }
        url
    }

    /// Fetch the raw detail JSON for `key`
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - Response body of a successful request
    /// * `Err(FetchError)` - If the request failed or the server returned an error status
    pub async fn fetch_detail(&self, key: &CacheKey) -> Result<Vec<u8>, FetchError> {
        fetch_bytes(self.client.clone(), self.detail_url(key)).await
    }
}

async fn fetch_bytes(client: Client, url: String) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: redact_api_key(&url),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;
    debug!(url = %redact_api_key(&url), bytes = body.len(), "fetched detail");
    Ok(body.to_vec())
}

/// Strips the api_key value so URLs can be logged and shown in errors
fn redact_api_key(url: &str) -> String {
    let Some(start) = url.find("api_key=") else {
        return url.to_string();
    };
    let value_start = start + "api_key=".len();
    let value_end = url[value_start..]
        .find('&')
        .map(|i| value_start + i)
        .unwrap_or(url.len());
    format!("{}***{}", &url[..value_start], &url[value_end..])
}

impl DetailFetcher for TmdbClient {
    fn fetch(&self, key: CacheKey) -> BoxFuture<'static, Result<Vec<u8>, FetchError>> {
        Box::pin(fetch_bytes(self.client.clone(), self.detail_url(&key)))
    }
}
