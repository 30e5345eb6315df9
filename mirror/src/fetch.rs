//! HTTP fetching with retries, deadlines and politeness caps.
//!
//! Transient failures (connection errors, 5xx, 429, interrupted bodies) are
//! retried with capped exponential backoff and jitter; 404/410/401/403 and
//! verification mismatches are not. Small index bodies are cached in memory
//! and revalidated with conditional requests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use futures::StreamExt;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::FetchError;
use crate::hasher::{PartWriter, WrittenFile};

const INDEX_CACHE_CAPACITY: usize = 64;
const PER_HOST_CONCURRENCY: usize = 8;
const RETRY_BUDGET: Duration = Duration::from_secs(300);

type FetchResult<T> = Result<T, FetchError>;
type Permits = (
    tokio::sync::OwnedSemaphorePermit,
    tokio::sync::OwnedSemaphorePermit,
);

/// Shared HTTP fetcher.
pub struct Fetcher {
    client: reqwest::Client,
    global: Arc<Semaphore>,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
    cache: Mutex<IndexCache>,
    throttle: Option<Mutex<Throttle>>,
    run_deadline: Option<Instant>,
    keep_part: bool,
}

impl Fetcher {
    /// Build a fetcher from the run configuration.
    pub fn new(config: &Config) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("debsnap-mirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transient {
                url: config.upstream.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            global: Arc::new(Semaphore::new(config.download_workers.max(1))),
            per_host: Mutex::new(HashMap::new()),
            cache: Mutex::new(IndexCache::new(INDEX_CACHE_CAPACITY)),
            throttle: config.rate_cap.map(|cap| Mutex::new(Throttle::new(cap))),
            run_deadline: None,
            keep_part: config.flags.no_clean_part_file,
        })
    }

    /// Bound the whole run; requests past the deadline fail without being
    /// sent.
    pub fn with_run_deadline(mut self, deadline: Instant) -> Self {
        self.run_deadline = Some(deadline);
        self
    }

    /// Fetch a small index file into memory, revalidating cached bodies
    /// with conditional requests.
    pub async fn fetch_index(&self, url: &Url) -> FetchResult<Arc<Vec<u8>>> {
        self.check_deadline(url)?;
        let _permits = self.acquire(url).await;
        let cached = self.cache.lock().await.lookup(url.as_str());

        let fetched = retry(url, || async {
            let mut request = self.client.get(url.clone());
            if let Some(entry) = &cached {
                request = match &entry.validator {
                    Validator::ETag(tag) => request.header(IF_NONE_MATCH, tag),
                    Validator::LastModified(date) => request.header(IF_MODIFIED_SINCE, date),
                };
            }
            let response = request.send().await.map_err(transient_reqwest)?;
            let response = check_status(url, response)?;
            if response.status() == StatusCode::NOT_MODIFIED {
                debug!(%url, "index served from cache");
                return Ok(None);
            }
            let validator = extract_validator(&response);
            let bytes = response.bytes().await.map_err(transient_reqwest)?;
            Ok(Some((validator, bytes.to_vec())))
        })
        .await?;

        match fetched {
            None => Ok(cached.expect("304 without cache entry").body),
            Some((validator, bytes)) => {
                let body = Arc::new(bytes);
                if let Some(validator) = validator {
                    self.cache
                        .lock()
                        .await
                        .insert(url.as_str(), validator, body.clone());
                }
                Ok(body)
            }
        }
    }

    /// Stream a payload to `dest` via a `.part` sibling, verifying the
    /// advertised hash and size. Interrupted bodies are retried from the
    /// start; a mismatch after a full read is fatal for the URL.
    pub async fn fetch_to_path(
        &self,
        url: &Url,
        dest: &Path,
        expected_sha256: Option<&str>,
        expected_size: Option<u64>,
    ) -> FetchResult<WrittenFile> {
        self.check_deadline(url)?;
        let _permits = self.acquire(url).await;

        retry(url, || async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(transient_reqwest)?;
            let response = check_status(url, response)?;
            let mut writer = PartWriter::create(dest, self.keep_part)
                .await
                .map_err(|e| permanent_io(url, e))?;

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        // body interruption: clean up, then retry from scratch
                        writer.abort().await;
                        return Err(backoff::Error::transient(FetchError::Transient {
                            url: url.to_string(),
                            reason: e.to_string(),
                        }));
                    }
                };
                if let Some(throttle) = &self.throttle {
                    throttle.lock().await.consume(chunk.len() as u64).await;
                }
                writer
                    .write(&chunk)
                    .await
                    .map_err(|e| permanent_io(url, e))?;
            }

            match writer
                .commit(expected_sha256, expected_size)
                .await
                .map_err(|e| permanent_io(url, e))?
            {
                Ok(written) => Ok(written),
                Err(observed) => {
                    let error = match expected_size {
                        Some(expected) if observed.size != expected => FetchError::SizeMismatch {
                            url: url.to_string(),
                            expected,
                            actual: observed.size,
                        },
                        _ => FetchError::HashMismatch {
                            url: url.to_string(),
                            expected: expected_sha256.unwrap_or_default().to_string(),
                            actual: observed.sha256,
                        },
                    };
                    Err(backoff::Error::permanent(error))
                }
            }
        })
        .await
    }

    async fn acquire(&self, url: &Url) -> Permits {
        let host = url.host_str().unwrap_or("").to_string();
        let host_semaphore = self
            .per_host
            .lock()
            .await
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(PER_HOST_CONCURRENCY)))
            .clone();
        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");
        let host = host_semaphore
            .acquire_owned()
            .await
            .expect("semaphore closed");
        (global, host)
    }

    fn check_deadline(&self, url: &Url) -> FetchResult<()> {
        match self.run_deadline {
            Some(deadline) if Instant::now() >= deadline => Err(FetchError::Transient {
                url: url.to_string(),
                reason: "run deadline exceeded".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Run fetch attempts under a capped exponential backoff with jitter.
async fn retry<T, F, Fut>(url: &Url, operation: F) -> FetchResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, backoff::Error<FetchError>>>,
{
    let schedule = ExponentialBackoff {
        max_elapsed_time: Some(RETRY_BUDGET),
        ..Default::default()
    };
    let result = backoff::future::retry(schedule, operation).await;
    if let Err(e) = &result {
        warn!(%url, error = %e, "fetch failed");
    }
    result
}

/// Classify a response status: retryable server trouble becomes a transient
/// backoff error, everything else is permanent.
fn check_status(
    url: &Url,
    response: reqwest::Response,
) -> Result<reqwest::Response, backoff::Error<FetchError>> {
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(backoff::Error::permanent(
            FetchError::NotFound(url.to_string()),
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(backoff::Error::permanent(FetchError::Denied {
                url: url.to_string(),
                status: status.as_u16(),
            }))
        }
        _ => {
            let error = FetchError::Transient {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            };
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(backoff::Error::transient(error))
            } else {
                Err(backoff::Error::permanent(error))
            }
        }
    }
}

fn transient_reqwest(error: reqwest::Error) -> backoff::Error<FetchError> {
    backoff::Error::transient(FetchError::Transient {
        url: error
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string()),
        reason: error.to_string(),
    })
}

fn permanent_io(url: &Url, source: std::io::Error) -> backoff::Error<FetchError> {
    backoff::Error::permanent(FetchError::Io {
        url: url.to_string(),
        source,
    })
}

#[derive(Clone)]
enum Validator {
    ETag(String),
    LastModified(String),
}

fn extract_validator(response: &reqwest::Response) -> Option<Validator> {
    if let Some(tag) = response.headers().get(ETAG) {
        return tag.to_str().ok().map(|t| Validator::ETag(t.to_string()));
    }
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|d| d.to_str().ok())
        .map(|d| Validator::LastModified(d.to_string()))
}

#[derive(Clone)]
struct CacheEntry {
    validator: Validator,
    body: Arc<Vec<u8>>,
}

/// Fixed-capacity LRU of recently fetched index bodies, keyed by URL and
/// revalidated via the stored ETag/Last-Modified.
struct IndexCache {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

impl IndexCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn lookup(&mut self, url: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(url).cloned()?;
        self.order.retain(|u| u != url);
        self.order.push_back(url.to_string());
        Some(entry)
    }

    fn insert(&mut self, url: &str, validator: Validator, body: Arc<Vec<u8>>) {
        self.order.retain(|u| u != url);
        self.order.push_back(url.to_string());
        self.entries
            .insert(url.to_string(), CacheEntry { validator, body });
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(evicted) => self.entries.remove(&evicted),
                None => break,
            };
        }
    }
}

/// Cooperative byte-rate cap over a sliding one-minute window.
struct Throttle {
    bytes_per_second: u64,
    window_start: Instant,
    consumed: u64,
}

impl Throttle {
    fn new(bytes_per_second: u64) -> Self {
        Self {
            bytes_per_second: bytes_per_second.max(1),
            window_start: Instant::now(),
            consumed: 0,
        }
    }

    async fn consume(&mut self, bytes: u64) {
        self.consumed += bytes;
        let elapsed = self.window_start.elapsed();
        let allowed = self
            .bytes_per_second
            .saturating_mul(elapsed.as_secs().max(1));
        if self.consumed > allowed {
            let excess = self.consumed - allowed;
            let pause = Duration::from_millis(excess.saturating_mul(1000) / self.bytes_per_second);
            tokio::time::sleep(pause).await;
        }
        if elapsed > Duration::from_secs(60) {
            self.window_start = Instant::now();
            self.consumed = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_cache_eviction() {
        let mut cache = IndexCache::new(2);
        let body = Arc::new(vec![1u8]);
        cache.insert("a", Validator::ETag("1".into()), body.clone());
        cache.insert("b", Validator::ETag("2".into()), body.clone());
        cache.insert("c", Validator::ETag("3".into()), body.clone());
        assert!(cache.lookup("a").is_none());
        assert!(cache.lookup("b").is_some());
        assert!(cache.lookup("c").is_some());
    }

    #[test]
    fn test_index_cache_lru_order() {
        let mut cache = IndexCache::new(2);
        let body = Arc::new(vec![1u8]);
        cache.insert("a", Validator::ETag("1".into()), body.clone());
        cache.insert("b", Validator::ETag("2".into()), body.clone());
        // touch "a" so "b" becomes the eviction candidate
        assert!(cache.lookup("a").is_some());
        cache.insert("c", Validator::ETag("3".into()), body);
        assert!(cache.lookup("a").is_some());
        assert!(cache.lookup("b").is_none());
    }

    #[test]
    fn test_reinsert_does_not_grow_cache() {
        let mut cache = IndexCache::new(2);
        let body = Arc::new(vec![1u8]);
        cache.insert("a", Validator::ETag("1".into()), body.clone());
        cache.insert("a", Validator::ETag("2".into()), body.clone());
        cache.insert("b", Validator::ETag("3".into()), body);
        assert!(cache.lookup("a").is_some());
        assert!(cache.lookup("b").is_some());
    }

    #[test]
    fn test_per_file_error_classification() {
        assert!(FetchError::NotFound("u".into()).is_per_file());
        assert!(FetchError::HashMismatch {
            url: "u".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .is_per_file());
        assert!(!FetchError::Transient {
            url: "u".into(),
            reason: "connection refused".into(),
        }
        .is_per_file());
        assert!(!FetchError::Denied {
            url: "u".into(),
            status: 403,
        }
        .is_per_file());
    }
}
