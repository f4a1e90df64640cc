//! Minimal Elasticsearch client used to persist structured logs.
//!
//! Indexing is best-effort throughout the system: callers log failures at
//! warning level and carry on. The client is an explicitly injected
//! dependency built once from the environment at startup.

use std::env;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by Elasticsearch interactions.
#[derive(Debug, Error)]
pub enum ElasticError {
    #[error("Elasticsearch unreachable: {0}")]
    Transport(String),

    #[error("Elasticsearch rejected document ({code}): {detail}")]
    Rejected { code: u16, detail: String },
}

/// Connection settings for the observability index.
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl ElasticConfig {
    /// Reads the configuration from environment variables.
    ///
    /// Returns `None` when `ELASTICSEARCH_URL` is unset or empty, which
    /// disables indexing entirely. Also reads `ELASTICSEARCH_API_KEY`,
    /// `ELASTICSEARCH_USERNAME`, `ELASTICSEARCH_PASSWORD` and
    /// `ELASTICSEARCH_TIMEOUT_S` (default 10 seconds).
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("ELASTICSEARCH_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())?;

        let read = |key: &str| {
            env::var(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let timeout_s = env::var("ELASTICSEARCH_TIMEOUT_S")
            .ok()
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(10.0);

        Some(Self {
            base_url,
            api_key: read("ELASTICSEARCH_API_KEY"),
            username: read("ELASTICSEARCH_USERNAME"),
            password: read("ELASTICSEARCH_PASSWORD"),
            timeout: Duration::from_secs_f64(timeout_s),
        })
    }
}

/// Index names per record class.
#[derive(Debug, Clone)]
pub struct IndexNames {
    pub benchmarks: String,
    pub batch: String,
    pub router: String,
    pub runs: String,
    pub preprocess: String,
}

impl IndexNames {
    /// Reads index names from `ELASTICSEARCH_INDEX_*` with the standard
    /// defaults.
    pub fn from_env() -> Self {
        let read = |key: &str, default: &str| env::var(key).unwrap_or_else(|_| default.to_string());
        Self {
            benchmarks: read("ELASTICSEARCH_INDEX_BENCHMARKS", "benchmark-results"),
            batch: read("ELASTICSEARCH_INDEX_BATCH", "batch-events"),
            router: read("ELASTICSEARCH_INDEX_ROUTER", "router-decisions"),
            runs: read("ELASTICSEARCH_INDEX_RUNS", "pipeline-run-summary"),
            preprocess: read("ELASTICSEARCH_INDEX_PREPROCESS", "preprocess-records"),
        }
    }
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            benchmarks: "benchmark-results".to_string(),
            batch: "batch-events".to_string(),
            router: "router-decisions".to_string(),
            runs: "pipeline-run-summary".to_string(),
            preprocess: "preprocess-records".to_string(),
        }
    }
}

/// Async client POSTing documents to `<base>/<index>/_doc`.
pub struct ElasticClient {
    base_url: String,
    authorization: Option<String>,
    http_client: Client,
}

impl ElasticClient {
    /// Creates a client from explicit configuration. ApiKey authentication
    /// takes precedence over Basic credentials.
    pub fn new(config: ElasticConfig) -> Self {
        let authorization = if let Some(api_key) = &config.api_key {
            Some(format!("ApiKey {api_key}"))
        } else if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let token = BASE64.encode(format!("{username}:{password}"));
            Some(format!("Basic {token}"))
        } else {
            None
        };

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization,
            http_client: Client::builder()
                .timeout(config.timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates a client when the environment enables indexing.
    pub fn from_env() -> Option<Self> {
        ElasticConfig::from_env().map(Self::new)
    }

    /// Indexes one document. Non-2xx responses are errors; callers are
    /// expected to warn and swallow them.
    pub async fn index<T: Serialize>(&self, index: &str, document: &T) -> Result<(), ElasticError> {
        let url = format!("{}/{index}/_doc", self.base_url);
        let mut request = self.http_client.post(&url).json(document);
        if let Some(authorization) = &self.authorization {
            request = request.header("Authorization", authorization);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ElasticError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ElasticError::Rejected {
                code: status.as_u16(),
                detail,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_beats_basic_auth() {
        let client = ElasticClient::new(ElasticConfig {
            base_url: "http://localhost:9200/".to_string(),
            api_key: Some("key".to_string()),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(client.authorization.as_deref(), Some("ApiKey key"));
        assert_eq!(client.base_url, "http://localhost:9200");
    }

    #[test]
    fn test_basic_auth_is_base64_encoded() {
        let client = ElasticClient::new(ElasticConfig {
            base_url: "http://localhost:9200".to_string(),
            api_key: None,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(
            client.authorization.as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn test_no_credentials_means_no_header() {
        let client = ElasticClient::new(ElasticConfig {
            base_url: "http://localhost:9200".to_string(),
            api_key: None,
            username: None,
            password: None,
            timeout: Duration::from_secs(1),
        });
        assert!(client.authorization.is_none());
    }

    #[test]
    fn test_default_index_names() {
        let names = IndexNames::default();
        assert_eq!(names.benchmarks, "benchmark-results");
        assert_eq!(names.batch, "batch-events");
        assert_eq!(names.router, "router-decisions");
        assert_eq!(names.runs, "pipeline-run-summary");
        assert_eq!(names.preprocess, "preprocess-records");
    }
}
