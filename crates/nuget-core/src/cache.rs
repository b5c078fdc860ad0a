use crate::error::{NugetError, Result};
use dashmap::DashMap;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Seven days: published registry documents are treated as immutable.
pub const DEFAULT_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Validates that a URL uses the HTTP or HTTPS protocol.
///
/// Private NuGet feeds are frequently served over plain HTTP inside
/// corporate networks, so both schemes are accepted.
#[inline]
fn ensure_http(url: &str) -> Result<()> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(NugetError::InvalidUrl(url.to_string()))
    }
}

/// Configuration for the HTTP response cache.
///
/// # Defaults
///
/// - `max_age_secs`: `604800` (7 days)
/// - `timeout_secs`: `30`
/// - `max_entries`: `10000`
///
/// # Examples
///
/// ```
/// use nuget_core::cache::CacheConfig;
///
/// let config: CacheConfig = serde_json::from_str(r#"{ "max_age_secs": 60 }"#).unwrap();
/// assert_eq!(config.max_age_secs, 60);
/// assert_eq!(config.timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age(),
            timeout_secs: default_timeout(),
            max_entries: default_max_entries(),
        }
    }
}

const fn default_max_age() -> u64 {
    DEFAULT_MAX_AGE_SECS
}

const fn default_timeout() -> u64 {
    30
}

const fn default_max_entries() -> usize {
    10_000
}

/// Cached HTTP response with validation headers.
///
/// The body is wrapped in `Arc` so that handing it to several consumers
/// never copies the buffer.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Arc<Vec<u8>>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub fetched_at: Instant,
}

impl CachedResponse {
    fn is_fresh(&self, max_age: Duration) -> bool {
        self.fetched_at.elapsed() < max_age
    }
}

/// HTTP cache with a fixed freshness window.
///
/// Registry documents describe published package versions, which never
/// change once pushed. Responses are therefore served from memory for
/// `max_age` regardless of the server's own `Cache-Control` directives.
/// Once an entry is older than that, it is revalidated with a conditional
/// request (`If-None-Match` / `If-Modified-Since`), and the stale body is
/// used if the network is unavailable.
///
/// # Examples
///
/// ```no_run
/// use nuget_core::cache::HttpCache;
///
/// # async fn example() -> nuget_core::error::Result<()> {
/// let cache = HttpCache::new();
///
/// let first = cache.get_cached("https://api.nuget.org/v3/index.json").await?;
/// // Served from memory: no request is sent within the freshness window.
/// let second = cache.get_cached("https://api.nuget.org/v3/index.json").await?;
///
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// # Ok(())
/// # }
/// ```
pub struct HttpCache {
    entries: DashMap<String, CachedResponse>,
    client: Client,
    max_age: Duration,
    max_entries: usize,
}

impl HttpCache {
    /// Creates a new HTTP cache with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default()).expect("failed to create HTTP client")
    }

    /// Creates a new HTTP cache from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `NugetError::CacheError` if the underlying HTTP client
    /// cannot be constructed (for example when no TLS backend is usable).
    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("nuget-graph/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NugetError::CacheError(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            entries: DashMap::new(),
            client,
            max_age: Duration::from_secs(config.max_age_secs),
            max_entries: config.max_entries.max(1),
        })
    }

    /// Retrieves data from URL, honoring the freshness window.
    ///
    /// # Errors
    ///
    /// Returns `NugetError::Http` if the initial fetch fails,
    /// `NugetError::HttpStatus` for non-success responses and
    /// `NugetError::EmptyBody` if the server returned nothing.
    pub async fn get_cached(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        if self.entries.len() >= self.max_entries {
            self.evict_entries();
        }

        let cached = self.entries.get(url).map(|entry| entry.value().clone());

        if let Some(cached) = cached {
            if cached.is_fresh(self.max_age) {
                tracing::trace!("cache hit: {}", url);
                return Ok(Arc::clone(&cached.body));
            }

            match self.conditional_request(url, &cached).await {
                Ok(Some(new_body)) => return Ok(new_body),
                Ok(None) => {
                    self.entries.insert(
                        url.to_string(),
                        CachedResponse {
                            fetched_at: Instant::now(),
                            ..cached.clone()
                        },
                    );
                    return Ok(Arc::clone(&cached.body));
                }
                Err(e) => {
                    tracing::warn!("revalidation failed, using stale cache: {}", e);
                    return Ok(Arc::clone(&cached.body));
                }
            }
        }

        self.fetch_and_store(url).await
    }

    /// Performs a conditional request using cached validation headers.
    ///
    /// Returns `Ok(None)` when the server answered 304 Not Modified.
    async fn conditional_request(
        &self,
        url: &str,
        cached: &CachedResponse,
    ) -> Result<Option<Arc<Vec<u8>>>> {
        ensure_http(url)?;
        let mut request = self.client.get(url);

        if let Some(etag) = &cached.etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &cached.last_modified {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().await.map_err(|e| NugetError::Http {
            url: url.to_string(),
            source: e,
        })?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }

        self.store_response(url, response).await.map(Some)
    }

    /// Fetches a fresh response from the network and stores it in the cache.
    pub(crate) async fn fetch_and_store(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        ensure_http(url)?;
        tracing::debug!("fetching fresh: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NugetError::Http {
                url: url.to_string(),
                source: e,
            })?;

        self.store_response(url, response).await
    }

    async fn store_response(&self, url: &str, response: reqwest::Response) -> Result<Arc<Vec<u8>>> {
        if !response.status().is_success() {
            return Err(NugetError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response.bytes().await.map_err(|e| NugetError::Http {
            url: url.to_string(),
            source: e,
        })?;

        if body.is_empty() {
            return Err(NugetError::EmptyBody {
                url: url.to_string(),
            });
        }

        let body_arc = Arc::new(body.to_vec());

        self.entries.insert(
            url.to_string(),
            CachedResponse {
                body: Arc::clone(&body_arc),
                etag,
                last_modified,
                fetched_at: Instant::now(),
            },
        );

        Ok(body_arc)
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache contains no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts roughly 10% of the entries, oldest first.
    fn evict_entries(&self) {
        let target_removals = (self.max_entries / 10).max(1);

        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().fetched_at))
            .collect();
        by_age.sort_by_key(|(_, time)| *time);

        let mut removed = 0;
        for (url, _) in by_age.iter().take(target_removals) {
            self.entries.remove(url);
            removed += 1;
        }

        tracing::debug!("evicted {} cache entries", removed);
    }
}

impl Default for HttpCache {
    fn default() -> Self {
        Self::new()
    }
}
