//! HTTP venue client.
//!
//! reqwest-backed [`VenueApi`] binding with bounded retry and
//! exponential backoff. The wire envelope is normalized server-side by
//! a thin proxy, so one client serves every venue; only the base URL
//! and API key differ.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use super::types::{VenueEvent, VenueOrder};
use super::{EventsRequest, OrdersRequest, Venue, VenueApi, VenueError, VenuePage};

/// Configuration for one venue's HTTP client.
#[derive(Debug, Clone)]
pub struct VenueHttpConfig {
    /// Feed base URL, without trailing slash.
    pub base_url: String,
    /// Optional API key sent as `X-API-Key`.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retries per request.
    pub max_retries: u32,
    /// Initial retry backoff.
    pub initial_backoff: Duration,
    /// Maximum retry backoff.
    pub max_backoff: Duration,
    /// User agent header.
    pub user_agent: String,
}

impl VenueHttpConfig {
    /// Creates a configuration with defaults for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(15),
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            user_agent: concat!("curio-indexer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Exponential retry schedule.
///
/// A server-directed Retry-After wait replaces the next scheduled
/// delay instead of stacking on top of it.
#[derive(Debug)]
struct Backoff {
    next: Duration,
    max: Duration,
    skip_next: bool,
}

impl Backoff {
    const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial,
            max,
            skip_next: false,
        }
    }

    /// Delay before the next retry; None when an explicit wait already
    /// covered it.
    fn next_delay(&mut self) -> Option<Duration> {
        if self.skip_next {
            self.skip_next = false;
            return None;
        }
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        Some(delay)
    }

    fn explicit_wait_taken(&mut self) {
        self.skip_next = true;
    }
}

/// One page as the wire reports it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageResponse<T> {
    data: Vec<T>,
    next_cursor: Option<String>,
}

/// HTTP client for one venue's feeds.
#[derive(Debug, Clone)]
pub struct HttpVenueClient {
    venue: Venue,
    config: VenueHttpConfig,
    http: reqwest::Client,
}

impl HttpVenueClient {
    /// Creates a client for the given venue.
    ///
    /// # Errors
    ///
    /// Returns [`VenueError::Http`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(venue: Venue, config: VenueHttpConfig) -> Result<Self, VenueError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref api_key) = config.api_key {
            if let Ok(value) = HeaderValue::from_str(api_key) {
                headers.insert("X-API-Key", value);
            }
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| VenueError::Http(e.to_string()))?;

        Ok(Self {
            venue,
            config,
            http,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &VenueHttpConfig {
        &self.config
    }

    /// Makes a GET request with retry and backoff.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, VenueError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);
        let mut last_error = VenueError::Timeout;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                if let Some(delay) = backoff.next_delay() {
                    tokio::time::sleep(delay).await;
                }
            }

            let response = self.http.get(&url).query(query).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body = resp
                            .text()
                            .await
                            .map_err(|e| VenueError::Deserialization(e.to_string()))?;
                        return serde_json::from_str(&body)
                            .map_err(|e| VenueError::Deserialization(e.to_string()));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());
                        warn!(venue = self.venue.as_str(), ?retry_after, "rate limited");
                        if let Some(secs) = retry_after {
                            tokio::time::sleep(Duration::from_secs(secs)).await;
                            backoff.explicit_wait_taken();
                        }
                        last_error = VenueError::RateLimited { retry_after };
                        continue;
                    }

                    let message = resp.text().await.unwrap_or_default();
                    let err = VenueError::Api {
                        status: status.as_u16(),
                        message,
                    };
                    if status.is_server_error() {
                        last_error = err;
                        continue;
                    }
                    return Err(err);
                }
                Err(e) if e.is_timeout() => {
                    last_error = VenueError::Timeout;
                }
                Err(e) => {
                    last_error = VenueError::Http(e.to_string());
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl VenueApi for HttpVenueClient {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn list_orders(
        &self,
        request: &OrdersRequest,
    ) -> Result<VenuePage<VenueOrder>, VenueError> {
        let mut query: Vec<(&str, String)> = vec![(
            "first",
            request.pagination.first.to_string(),
        )];
        if let Some(cursor) = &request.pagination.cursor {
            query.push(("cursor", cursor.clone()));
        }
        if let Some(collection) = &request.collection {
            query.push(("collection", collection.clone()));
        }
        if let Some(token_id) = &request.token_id {
            query.push(("tokenId", token_id.clone()));
        }
        if let Some(side) = request.side {
            query.push((
                "side",
                match side {
                    super::types::OrderSide::Sell => "sell".to_string(),
                    super::types::OrderSide::Buy => "buy".to_string(),
                },
            ));
        }

        let page: PageResponse<VenueOrder> = self.get("/orders", &query).await?;
        Ok(VenuePage {
            data: page.data,
            next_cursor: page.next_cursor,
        })
    }

    async fn list_events(
        &self,
        request: &EventsRequest,
    ) -> Result<VenuePage<VenueEvent>, VenueError> {
        let mut query: Vec<(&str, String)> = vec![(
            "first",
            request.pagination.first.to_string(),
        )];
        if let Some(cursor) = &request.pagination.cursor {
            query.push(("cursor", cursor.clone()));
        }
        if let Some(kind) = request.kind {
            let value = serde_json::to_value(kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            query.push(("kind", value));
        }

        let page: PageResponse<VenueEvent> = self.get("/events", &query).await?;
        Ok(VenuePage {
            data: page.data,
            next_cursor: page.next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = VenueHttpConfig::new("https://feeds.example/looksrare");
        assert_eq!(config.max_retries, 3);
        assert!(config.api_key.is_none());
        assert!(config.user_agent.starts_with("curio-indexer/"));
    }

    #[test]
    fn test_client_construction() {
        let client = HttpVenueClient::new(
            Venue::Looksrare,
            VenueHttpConfig::new("https://feeds.example/looksrare"),
        )
        .expect("client");
        assert_eq!(client.venue(), Venue::Looksrare);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(200), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(500)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_explicit_wait_suppresses_next_backoff() {
        let mut backoff = Backoff::new(Duration::from_millis(200), Duration::from_secs(10));
        backoff.explicit_wait_taken();
        // A Retry-After wait already happened; no extra delay.
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_page_response_decodes() {
        let json = r#"{"data": [], "nextCursor": "abc"}"#;
        let page: PageResponse<VenueOrder> = serde_json::from_str(json).expect("decode");
        assert!(page.data.is_empty());
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }
}
