//! Price fetching from quote providers.
//!
//! [`FeedFetcher`] walks a [`FeedRegistry`] in priority order and returns the
//! first valid price. Each attempt is bounded by its own timeout; a failed
//! attempt is recorded and the next provider is tried, with no retry at this
//! layer. Attempts are strictly sequential.
//!
//! Network access goes through the [`HttpClient`] trait so responses can be
//! scripted in tests. [`ReqwestClient`] is the production implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, ProviderError, ProviderFailure, Result};
use crate::oracle::price::Price;
use crate::oracle::sources::{FeedDescriptor, FeedRegistry};
use crate::utils::constants::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_USER_AGENT};

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Capability to GET a JSON document
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch `url` and decode the body as JSON
    async fn get_json(&self, url: &str) -> std::result::Result<Value, ProviderError>;
}

/// Configuration for the HTTP client and fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpFetcherConfig {
    /// Timeout for a single provider attempt in milliseconds
    pub timeout_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpFetcherConfig {
    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// reqwest-backed [`HttpClient`]
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Create a new client
    pub fn new(config: &HttpFetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(&HttpFetcherConfig::default())
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_json(&self, url: &str) -> std::result::Result<Value, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEED FETCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// A successful fetch: the price and which feed produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedPrice {
    /// Validated price
    pub price: Price,
    /// Name of the feed that answered
    pub provider: String,
    /// Feeds that failed before this one answered
    pub failures: Vec<ProviderFailure>,
    /// Wall time spent across all attempts in milliseconds
    pub duration_ms: u64,
}

/// Tries feeds in priority order, first valid answer wins
pub struct FeedFetcher {
    client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl FeedFetcher {
    /// Create a fetcher over an injected client
    pub fn new(client: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Create a fetcher using reqwest
    pub fn with_reqwest(config: &HttpFetcherConfig) -> Result<Self> {
        let client = ReqwestClient::new(config)?;
        Ok(Self::new(Arc::new(client), config.timeout()))
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch and validate a single feed under the per-attempt timeout
    pub async fn fetch_feed(&self, feed: &FeedDescriptor) -> std::result::Result<Price, ProviderError> {
        let body = tokio::time::timeout(self.timeout, self.client.get_json(&feed.endpoint))
            .await
            .map_err(|_| ProviderError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            })??;

        feed.parser.parse(&body)
    }

    /// Walk the registry and return the first valid price
    ///
    /// Fails with [`Error::AllFeedsFailed`] carrying every provider's reason
    /// when the registry is exhausted.
    pub async fn fetch_best(&self, registry: &FeedRegistry) -> Result<FetchedPrice> {
        let start = Instant::now();
        let mut failures = Vec::new();

        for feed in registry.list() {
            debug!(provider = %feed.name, priority = feed.priority, "Fetching price");

            match self.fetch_feed(feed).await {
                Ok(price) => {
                    let duration_ms = start.elapsed().as_millis() as u64;
                    info!(
                        provider = %feed.name,
                        %price,
                        duration_ms,
                        "Fetched price from {}",
                        feed.name
                    );
                    return Ok(FetchedPrice {
                        price,
                        provider: feed.name.clone(),
                        failures,
                        duration_ms,
                    });
                }
                Err(error) => {
                    warn!(provider = %feed.name, %error, "Price feed failed");
                    failures.push(ProviderFailure::new(feed.name.clone(), error));
                }
            }
        }

        Err(Error::AllFeedsFailed { failures })
    }
}

impl std::fmt::Debug for FeedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedFetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::sources::PriceParser;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Reply {
        Json(Value),
        Fail(ProviderError),
        Hang,
    }

    #[derive(Default)]
    struct ScriptedClient {
        replies: HashMap<String, Reply>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn reply(mut self, url: &str, reply: Reply) -> Self {
            self.replies.insert(url.to_string(), reply);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn get_json(&self, url: &str) -> std::result::Result<Value, ProviderError> {
            self.calls.lock().unwrap().push(url.to_string());
            match self.replies.get(url) {
                Some(Reply::Json(v)) => Ok(v.clone()),
                Some(Reply::Fail(e)) => Err(e.clone()),
                Some(Reply::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                None => Err(ProviderError::HttpStatus(404)),
            }
        }
    }

    fn feed(name: &str, priority: u32) -> FeedDescriptor {
        FeedDescriptor::new(name, format!("https://{}.test", name), PriceParser::path("price"), priority)
    }

    fn registry() -> FeedRegistry {
        FeedRegistry::new(vec![feed("one", 1), feed("two", 2), feed("three", 3)])
    }

    #[test]
    fn test_http_fetcher_config_default() {
        let config = HttpFetcherConfig::default();
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_first_success_stops_iteration() {
        let client = Arc::new(
            ScriptedClient::default()
                .reply("https://one.test", Reply::Json(json!({"price": "100.5"})))
                .reply("https://two.test", Reply::Json(json!({"price": "200"}))),
        );
        let fetcher = FeedFetcher::new(client.clone(), Duration::from_secs(5));

        let fetched = fetcher.fetch_best(&registry()).await.unwrap();
        assert_eq!(fetched.price.value(), dec!(100.5));
        assert_eq!(fetched.provider, "one");
        assert_eq!(client.calls(), vec!["https://one.test"]);
    }

    #[tokio::test]
    async fn test_falls_through_to_lowest_priority() {
        let client = Arc::new(
            ScriptedClient::default()
                .reply("https://one.test", Reply::Fail(ProviderError::Request("refused".into())))
                .reply("https://two.test", Reply::Json(json!({"price": 0})))
                .reply("https://three.test", Reply::Json(json!({"price": 3000}))),
        );
        let fetcher = FeedFetcher::new(client.clone(), Duration::from_secs(5));

        let fetched = fetcher.fetch_best(&registry()).await.unwrap();
        assert_eq!(fetched.price.value(), dec!(3000));
        assert_eq!(fetched.provider, "three");
        assert_eq!(fetched.failures.len(), 2);
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_all_failed_carries_every_reason_in_order() {
        let client = Arc::new(
            ScriptedClient::default()
                .reply("https://one.test", Reply::Json(json!({"price": "-1"})))
                .reply("https://two.test", Reply::Json(json!({"nope": 1}))),
        );
        let fetcher = FeedFetcher::new(client, Duration::from_secs(5));

        let err = fetcher.fetch_best(&registry()).await.unwrap_err();
        match err {
            Error::AllFeedsFailed { failures } => {
                let names: Vec<_> = failures.iter().map(|f| f.provider.as_str()).collect();
                assert_eq!(names, vec!["one", "two", "three"]);
                assert!(matches!(failures[0].error, ProviderError::InvalidPrice(_)));
                assert_eq!(failures[1].error, ProviderError::MissingField("price".into()));
                assert_eq!(failures[2].error, ProviderError::HttpStatus(404));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_times_out_and_next_is_tried() {
        let client = Arc::new(
            ScriptedClient::default()
                .reply("https://one.test", Reply::Hang)
                .reply("https://two.test", Reply::Json(json!({"price": "42"}))),
        );
        let fetcher = FeedFetcher::new(client, Duration::from_secs(5));

        let fetched = fetcher.fetch_best(&registry()).await.unwrap();
        assert_eq!(fetched.provider, "two");
        assert_eq!(
            fetched.failures,
            vec![ProviderFailure::new("one", ProviderError::Timeout { after_ms: 5000 })]
        );
    }

    #[tokio::test]
    async fn test_empty_registry_fails() {
        let fetcher = FeedFetcher::new(Arc::new(ScriptedClient::default()), Duration::from_secs(1));
        let err = fetcher.fetch_best(&FeedRegistry::new(vec![])).await.unwrap_err();
        assert_eq!(err, Error::AllFeedsFailed { failures: vec![] });
    }

    /// Serve each canned HTTP response to one connection, in order
    async fn serve_raw(responses: Vec<&'static str>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        format!("http://{}/price", addr)
    }

    #[tokio::test]
    async fn test_reqwest_client_maps_status_and_body_errors() {
        let url = serve_raw(vec![
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 9\r\nconnection: close\r\n\r\nnot json!",
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 14\r\nconnection: close\r\n\r\n{\"price\":\"42\"}",
        ])
        .await;
        let client = ReqwestClient::with_defaults().unwrap();

        assert_eq!(client.get_json(&url).await, Err(ProviderError::HttpStatus(503)));
        assert!(matches!(client.get_json(&url).await, Err(ProviderError::Malformed(_))));
        assert_eq!(client.get_json(&url).await.unwrap(), json!({"price": "42"}));
    }

    #[tokio::test]
    async fn test_reqwest_client_connection_refused_is_request_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ReqwestClient::with_defaults().unwrap();
        let result = client.get_json(&format!("http://{}/price", addr)).await;
        assert!(matches!(result, Err(ProviderError::Request(_))));
    }
}
