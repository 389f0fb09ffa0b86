//! Request seam between the monitor and the network.

use crate::error::{ConfigError, Result};
use crate::task::TaskHandle;
use async_trait::async_trait;
use serde_json::Value;
use utils::client::{ClientConfig, HttpClient};

/// Sends the two requests the monitor needs and returns the decoded JSON.
///
/// Any failure to obtain a JSON body (connection error, non-2xx, unparsable
/// body) is reported as a transport error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET url`, with `task_id` appended to the query when given.
    async fn get(&self, url: &str, task_id: Option<&TaskHandle>) -> Result<Value>;

    /// `POST url` with a JSON body.
    async fn post(&self, url: &str, body: &Value) -> Result<Value>;
}

/// [`Transport`] over HTTP.
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, task_id: Option<&TaskHandle>) -> Result<Value> {
        let value = match task_id {
            Some(id) => self.client.get_json(url, &[("task_id", id.as_str())]).await?,
            None => self.client.get_json(url, &[]).await?,
        };
        Ok(value)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        Ok(self.client.post_json(url, body).await?)
    }
}
