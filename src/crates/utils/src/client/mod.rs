//! HTTP client utilities and helpers.
//!
//! This module provides the JSON client used to talk to the task endpoints:
//! - Client configuration builder
//! - CSRF token propagation on mutating requests
//! - Collapsing of non-2xx and non-JSON answers into errors
//!
//! Requests are never retried here. A failed request is reported to the
//! caller, which decides whether the surrounding session survives.
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::client::{ClientConfig, HttpClient};
//!
//! let config = ClientConfig::new()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_csrf_token("token");
//!
//! let client = HttpClient::new(config)?;
//! let launched = client.post_json("https://host/audit/", &serde_json::json!({})).await?;
//! ```

pub mod csrf;

use crate::error::{Result, UtilsError};
use reqwest::{header, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// How much of an error body is kept in [`UtilsError::HttpStatus`].
const BODY_SNIPPET_LEN: usize = 512;

/// Configuration for HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: Option<String>,

    /// CSRF token sent on mutating requests. Takes precedence over the
    /// token found in `cookie_header`.
    #[serde(default)]
    pub csrf_token: Option<String>,

    /// Raw `Cookie` header forwarded with every request.
    #[serde(default)]
    pub cookie_header: Option<String>,

    /// Default headers to include in all requests.
    #[serde(skip)]
    pub default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// Create a new client configuration with defaults.
    pub fn new() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: None,
            csrf_token: None,
            cookie_header: None,
            default_headers: Vec::new(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a default header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((key.into(), value.into()));
        self
    }

    /// Set the CSRF token explicitly.
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Set the `Cookie` header forwarded with every request.
    pub fn with_cookie_header(mut self, cookies: impl Into<String>) -> Self {
        self.cookie_header = Some(cookies.into());
        self
    }

    /// Resolve the CSRF token: the explicit one, else the `csrftoken` cookie.
    pub fn resolved_csrf_token(&self) -> Option<String> {
        self.csrf_token.clone().or_else(|| {
            self.cookie_header
                .as_deref()
                .and_then(csrf::csrf_token_from_cookies)
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// JSON HTTP client with CSRF support.
pub struct HttpClient {
    config: ClientConfig,
    client: Client,
    csrf_token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        let client = builder
            .build()
            .map_err(|e| UtilsError::ClientError(e.to_string()))?;

        let csrf_token = config.resolved_csrf_token();
        if csrf_token.is_none() {
            debug!("No CSRF token configured, POST requests will be sent without one");
        }

        Ok(Self {
            config,
            client,
            csrf_token,
        })
    }

    /// Get the configuration the client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get a reference to the underlying reqwest client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Whether a CSRF token will be sent on mutating requests.
    pub fn has_csrf_token(&self) -> bool {
        self.csrf_token.is_some()
    }

    /// Send a GET request and decode the JSON answer.
    ///
    /// `query` pairs are appended to any query the URL already has.
    pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let mut req = self.client.get(url);
        if !query.is_empty() {
            req = req.query(query);
        }

        debug!(url, ?query, "GET");
        self.send_json(self.with_default_headers(req), url).await
    }

    /// Send a POST request with a JSON body and decode the JSON answer.
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Value> {
        let mut req = self.with_default_headers(self.client.post(url));

        if let Some(token) = &self.csrf_token {
            req = req.header(csrf::CSRF_HEADER, token);
        }

        debug!(url, csrf = self.csrf_token.is_some(), "POST");
        self.send_json(req.json(body), url).await
    }

    fn with_default_headers(&self, mut req: RequestBuilder) -> RequestBuilder {
        req = req
            .header(header::ACCEPT, "application/json")
            .header("X-Requested-With", "XMLHttpRequest");

        if let Some(cookies) = &self.config.cookie_header {
            req = req.header(header::COOKIE, cookies);
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        req
    }

    async fn send_json(&self, req: RequestBuilder, url: &str) -> Result<Value> {
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        debug!(url, status = status.as_u16(), bytes = text.len(), "Response received");

        if !status.is_success() {
            return Err(UtilsError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body: text.chars().take(BODY_SNIPPET_LEN).collect(),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Client Configuration Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("test-agent")
            .with_header("X-Custom", "value");

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, Some("test-agent".to_string()));
        assert_eq!(config.default_headers.len(), 1);
    }

    #[test]
    fn test_client_config_default_values() {
        let config = ClientConfig::default();

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.is_none());
        assert!(config.csrf_token.is_none());
        assert!(config.cookie_header.is_none());
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn test_csrf_token_from_cookie_header() {
        let config = ClientConfig::new().with_cookie_header("sessionid=s; csrftoken=from-cookie");
        assert_eq!(config.resolved_csrf_token(), Some("from-cookie".to_string()));
    }

    #[test]
    fn test_explicit_csrf_token_wins() {
        let config = ClientConfig::new()
            .with_cookie_header("csrftoken=from-cookie")
            .with_csrf_token("explicit");
        assert_eq!(config.resolved_csrf_token(), Some("explicit".to_string()));
    }

    #[test]
    fn test_no_csrf_token() {
        let config = ClientConfig::new().with_cookie_header("sessionid=s");
        assert_eq!(config.resolved_csrf_token(), None);
    }

    #[test]
    fn test_config_serialization() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(45))
            .with_csrf_token("tok");

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ClientConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.timeout, config.timeout);
        assert_eq!(deserialized.csrf_token, config.csrf_token);
    }

    // ------------------------------------------------------------------------
    // HTTP Client Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new(ClientConfig::new().with_user_agent("taskwatch/test"));
        assert!(client.is_ok());
        assert!(!client.unwrap().has_csrf_token());
    }

    #[test]
    fn test_http_client_picks_up_cookie_token() {
        let client =
            HttpClient::new(ClientConfig::new().with_cookie_header("csrftoken=abc")).unwrap();
        assert!(client.has_csrf_token());
    }

    #[tokio::test]
    async fn test_get_invalid_url_is_http_error() {
        let client = HttpClient::new(ClientConfig::new().with_timeout(Duration::from_secs(1)))
            .unwrap();

        let result = client.get_json("not-a-valid-url", &[("task_id", "1")]).await;

        assert!(matches!(result, Err(UtilsError::HttpError(_))));
    }

    #[tokio::test]
    async fn test_post_invalid_url_is_http_error() {
        let client = HttpClient::new(ClientConfig::new()).unwrap();

        let result = client
            .post_json("also-not-a-url", &serde_json::json!({}))
            .await;

        assert!(matches!(result, Err(UtilsError::HttpError(_))));
    }
}
