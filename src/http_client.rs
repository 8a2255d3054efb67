use crate::config::NetworkConfig;
use crate::error::ValidationError;
use futures::TryStreamExt;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Configuration for the schema download client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Cap on the exponential backoff delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Largest schema body accepted, in bytes
    pub max_body_bytes: u64,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            max_body_bytes: 16 * 1024 * 1024,
            user_agent: format!("validate-manifests/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&NetworkConfig> for HttpClientConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            timeout_seconds: network.timeout_seconds,
            retry_attempts: network.retry_attempts,
            retry_delay_ms: network.retry_delay_ms,
            ..Default::default()
        }
    }
}

/// Async HTTP client for downloading schema documents
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, ValidationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(ValidationError::from)?;

        Ok(Self { client, config })
    }

    /// Download a schema body, retrying transient failures with exponential backoff
    pub async fn download_schema(&self, url: &str) -> Result<Vec<u8>, ValidationError> {
        let response = self.get_response_with_retry(url).await?;
        self.read_body(url, response).await
    }

    /// Stream the body so oversized responses are rejected without buffering them whole
    async fn read_body(&self, url: &str, response: Response) -> Result<Vec<u8>, ValidationError> {
        let limit = self.config.max_body_bytes;
        if let Some(length) = response.content_length()
            && length > limit
        {
            return Err(oversized(url, limit));
        }

        let mut buffer = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = TryStreamExt::try_next(&mut stream)
            .await
            .map_err(ValidationError::from)?
        {
            if (buffer.len() + chunk.len()) as u64 > limit {
                return Err(oversized(url, limit));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer)
    }

    async fn get_response_with_retry(&self, url: &str) -> Result<Response, ValidationError> {
        let mut attempt = 0;

        loop {
            let error = match self.make_request(url).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let error = ValidationError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                        message: format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        ),
                    };
                    // 4xx means the schema is not there; only server errors are worth another try
                    if !status.is_server_error() {
                        return Err(error);
                    }
                    error
                }
                Err(error) if self.is_retryable_error(&error) => error,
                Err(error) => return Err(error),
            };

            if attempt >= self.config.retry_attempts {
                return Err(error);
            }
            debug!(url, attempt, %error, "retrying schema download");
            self.wait_before_retry(attempt).await;
            attempt += 1;
        }
    }

    async fn make_request(&self, url: &str) -> Result<Response, ValidationError> {
        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client.get(url).send(),
        )
        .await
        .map_err(|_| ValidationError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(ValidationError::from)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .config
            .retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))
    }

    async fn wait_before_retry(&self, attempt: u32) {
        sleep(self.backoff_delay(attempt)).await;
    }

    fn is_retryable_error(&self, error: &ValidationError) -> bool {
        match error {
            ValidationError::Http(reqwest_error) => {
                reqwest_error.is_timeout() || reqwest_error.is_connect() || reqwest_error.is_request()
            }
            ValidationError::Timeout { .. } => true,
            _ => false,
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

fn oversized(url: &str, limit: u64) -> ValidationError {
    ValidationError::SchemaParsing {
        reference: url.to_string(),
        details: format!("schema body exceeds {} bytes", limit),
    }
}
