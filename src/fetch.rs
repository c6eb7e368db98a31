//! URL-keyed response cache and the throttled fetcher built on it

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::FetchError;
use crate::store::write_atomic;

/// Result of a header-only request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Network seam used by every stage that talks to the outside world
pub trait Transport {
    /// GET a URL and return its body; non-2xx statuses are errors
    fn get(&self, url: &str) -> Result<String, FetchError>;

    /// HEAD a URL, following redirects
    fn head(&self, url: &str) -> Result<HeadResponse, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }

    fn head(&self, url: &str) -> Result<HeadResponse, FetchError> {
        let response = self.client.head(url).send()?;
        let headers = response.headers();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        Ok(HeadResponse {
            status: response.status().as_u16(),
            content_type,
            content_length,
        })
    }
}

/// Flat URL -> body map persisted as one JSON document.
///
/// Keys are the exact request URL; nothing is normalized and nothing expires.
#[derive(Debug)]
pub struct UrlCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl UrlCache {
    /// Load the cache file, or start empty when it doesn't exist yet
    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        log::debug!("Loaded {} cached responses from {}", entries.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    pub fn get(&self, url: &str) -> Option<&str> {
        self.entries.get(url).map(|s| s.as_str())
    }

    pub fn insert(&mut self, url: &str, body: String) {
        self.entries.insert(url.to_string(), body);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the whole cache back to disk if anything changed
    pub fn flush(&mut self) -> Result<(), FetchError> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        write_atomic(&self.path, json.as_bytes())?;
        self.dirty = false;
        log::debug!("Saved {} cached responses to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}

/// Sequential fetcher: cache first, then the network followed by a fixed sleep
pub struct CachedFetcher<'t, T: Transport> {
    transport: &'t T,
    cache: UrlCache,
    delay: Duration,
}

impl<'t, T: Transport> CachedFetcher<'t, T> {
    pub fn new(transport: &'t T, cache: UrlCache, delay: Duration) -> Self {
        Self {
            transport,
            cache,
            delay,
        }
    }

    pub fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        if let Some(body) = self.cache.get(url) {
            log::debug!("[cache hit] {}", url);
            return Ok(body.to_string());
        }

        log::info!("[fetching] {}", url);
        let body = self.transport.get(url)?;
        self.cache.insert(url, body.clone());
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(body)
    }

    /// Persist the cache so an interrupted run can resume without refetching
    pub fn checkpoint(&mut self) -> Result<(), FetchError> {
        self.cache.flush()
    }

    pub fn cache(&self) -> &UrlCache {
        &self.cache
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory transport with canned responses and a request log
    #[derive(Default)]
    pub struct MockTransport {
        pub pages: HashMap<String, String>,
        pub heads: HashMap<String, HeadResponse>,
        pub requests: RefCell<Vec<String>>,
    }

    impl MockTransport {
        pub fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        pub fn with_head(mut self, url: &str, status: u16, content_type: &str) -> Self {
            self.heads.insert(
                url.to_string(),
                HeadResponse {
                    status,
                    content_type: Some(content_type.to_string()),
                    content_length: Some(1024),
                },
            );
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for MockTransport {
        fn get(&self, url: &str) -> Result<String, FetchError> {
            self.requests.borrow_mut().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }

        fn head(&self, url: &str) -> Result<HeadResponse, FetchError> {
            self.requests.borrow_mut().push(url.to_string());
            Ok(self.heads.get(url).cloned().unwrap_or(HeadResponse {
                status: 404,
                content_type: Some("text/html".to_string()),
                content_length: None,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_cache_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::default().with_page("https://a.test/page", "<html>a</html>");
        let cache = UrlCache::load(&dir.path().join("cache.json")).unwrap();
        let mut fetcher = CachedFetcher::new(&transport, cache, Duration::ZERO);

        assert_eq!(fetcher.fetch("https://a.test/page").unwrap(), "<html>a</html>");
        assert_eq!(fetcher.fetch("https://a.test/page").unwrap(), "<html>a</html>");
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_cache_key_is_exact_url() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::default()
            .with_page("https://a.test/?x=1&y=2", "first")
            .with_page("https://a.test/?y=2&x=1", "second");
        let cache = UrlCache::load(&dir.path().join("cache.json")).unwrap();
        let mut fetcher = CachedFetcher::new(&transport, cache, Duration::ZERO);

        assert_eq!(fetcher.fetch("https://a.test/?x=1&y=2").unwrap(), "first");
        assert_eq!(fetcher.fetch("https://a.test/?y=2&x=1").unwrap(), "second");
        assert_eq!(fetcher.cache().len(), 2);
    }

    #[test]
    fn test_error_status_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::default();
        let cache = UrlCache::load(&dir.path().join("cache.json")).unwrap();
        let mut fetcher = CachedFetcher::new(&transport, cache, Duration::ZERO);

        let err = fetcher.fetch("https://a.test/missing").unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(fetcher.cache().is_empty());
    }

    #[test]
    fn test_checkpoint_persists_for_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let transport = MockTransport::default().with_page("https://a.test/page", "body");

        let mut fetcher =
            CachedFetcher::new(&transport, UrlCache::load(&path).unwrap(), Duration::ZERO);
        fetcher.fetch("https://a.test/page").unwrap();
        fetcher.checkpoint().unwrap();

        // A fresh run with a transport that knows nothing still resolves from disk
        let offline = MockTransport::default();
        let mut resumed =
            CachedFetcher::new(&offline, UrlCache::load(&path).unwrap(), Duration::ZERO);
        assert_eq!(resumed.fetch("https://a.test/page").unwrap(), "body");
        assert_eq!(offline.request_count(), 0);
    }

    #[test]
    fn test_flush_without_changes_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = UrlCache::load(&path).unwrap();
        cache.flush().unwrap();
        assert!(!path.exists());
    }
}
