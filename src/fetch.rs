//! Obtaining raw JSON documents from files, strings and HTTP URLs.
//!
//! The loader never reads external documents itself; it goes through a
//! [`DocumentFetcher`]. Only `http` and `https` URIs are ever fetched.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::location::cache_key;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of external schema documents.
pub trait DocumentFetcher: Send + Sync {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError>;
}

impl<F> DocumentFetcher for F
where
    F: Fn(&Url) -> Result<Value, FetchError> + Send + Sync,
{
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        self(uri)
    }
}

/// Fetches documents over HTTP(S) with a blocking client.
#[cfg(feature = "remote")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

#[cfg(feature = "remote")]
impl DocumentFetcher for HttpFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        load_document_url(uri.as_str())
    }
}

/// Serves documents from an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Value>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under `uri`. A trailing empty fragment is ignored.
    pub fn with_document(mut self, uri: &str, document: Value) -> Self {
        let key = Url::parse(uri)
            .map(|u| cache_key(&u))
            .unwrap_or_else(|_| uri.to_string());
        self.documents.insert(key, document);
        self
    }
}

impl DocumentFetcher for StaticFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        self.documents
            .get(&cache_key(uri))
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: uri.to_string(),
            })
    }
}

/// Refuses every fetch; for loaders that must stay offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl DocumentFetcher for NoFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        Err(FetchError::NotFound {
            url: uri.to_string(),
        })
    }
}

/// The fetcher a new loader starts with: HTTP when the `remote` feature is
/// enabled, otherwise none.
pub fn default_fetcher() -> Box<dyn DocumentFetcher> {
    #[cfg(feature = "remote")]
    {
        Box::new(HttpFetcher)
    }
    #[cfg(not(feature = "remote"))]
    {
        Box::new(NoFetcher)
    }
}

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `FetchError::FileNotFound` if the file doesn't exist,
/// or `FetchError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, FetchError> {
    if !path.exists() {
        return Err(FetchError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| FetchError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a JSON document from a string.
pub fn load_document_str(content: &str) -> Result<Value, FetchError> {
    serde_json::from_str(content).map_err(|source| FetchError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `FetchError::NetworkError` if the request fails or the status is
/// not a success, `FetchError::InvalidJson` if the body isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, FetchError> {
    debug!(url, "fetching document");
    let network = |source| FetchError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(network)?;

    let body = response.text().map_err(network)?;
    load_document_str(&body)
}

/// Load from a URL or a file path, depending on what `source` looks like.
pub fn load_document_auto(source: &str) -> Result<Value, FetchError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            return load_document_url(source);
        }
        #[cfg(not(feature = "remote"))]
        {
            return Err(FetchError::UnsupportedScheme {
                url: source.to_string(),
            });
        }
    }
    load_document(Path::new(source))
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Whether the loader may hand `uri` to a fetcher at all.
pub fn is_fetchable(uri: &Url) -> bool {
    matches!(uri.scheme(), "http" | "https")
}
