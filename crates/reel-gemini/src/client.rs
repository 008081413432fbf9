//! Shared HTTP plumbing for the Gemini clients.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;
use url::Url;

use crate::config::GeminiConfig;
use crate::error::{GeminiError, GeminiResult};
use crate::metrics::record_request;

/// HTTP client bound to one API key and host.
///
/// Cheap to clone; the connection pool and config are shared.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    config: Arc<GeminiConfig>,
}

impl GeminiClient {
    /// Create a new client.
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("reel-gemini/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GeminiError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Authenticated URL for an API path such as `v1beta/files/abc`.
    pub(crate) fn endpoint(&self, path: &str) -> GeminiResult<Url> {
        self.authenticate(&format!(
            "{}/{}",
            self.config.base_url,
            path.trim_start_matches('/')
        ))
    }

    /// Append the API key to an absolute URL handed out by the service.
    ///
    /// Existing query pairs (upload ids, `alt=media`) are preserved.
    pub(crate) fn authenticate(&self, raw: &str) -> GeminiResult<Url> {
        let mut url = Url::parse(raw)
            .map_err(|e| GeminiError::config(format!("Invalid URL '{}': {}", raw, e)))?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    /// Send a request, recording latency and status.
    ///
    /// Transport failures are classified into [`GeminiError::Network`]. The
    /// response is returned whatever its status; callers decide what a failure
    /// status means for their phase.
    pub(crate) async fn execute(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> GeminiResult<Response> {
        let start = Instant::now();
        let result = request.send().await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                record_request(operation, status, latency_ms);
                debug!(operation = %operation, status, latency_ms, "Gemini request finished");
                Ok(response)
            }
            Err(e) => {
                record_request(operation, 0, latency_ms);
                Err(GeminiError::from(e))
            }
        }
    }
}

/// Read a failure body without masking the original status.
pub(crate) async fn error_body(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(GeminiConfig::new("secret").with_base_url("http://localhost:1/")).unwrap()
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = client();
        assert_eq!(
            client.endpoint("/v1beta/files/abc").unwrap().as_str(),
            "http://localhost:1/v1beta/files/abc?key=secret"
        );
        assert_eq!(
            client.endpoint("upload/v1beta/files").unwrap().path(),
            "/upload/v1beta/files"
        );
    }

    #[test]
    fn test_authenticate_keeps_existing_query() {
        let url = client()
            .authenticate("https://example.com/v1beta/files/x:download?alt=media")
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("alt".to_string(), "media".to_string()),
                ("key".to_string(), "secret".to_string())
            ]
        );
    }

    #[test]
    fn test_authenticate_rejects_relative_locator() {
        assert!(matches!(
            client().authenticate("files/x"),
            Err(GeminiError::Config(_))
        ));
    }
}
