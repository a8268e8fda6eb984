//! Low-level HTTP client — `AccountHttp`.
//!
//! Transport only: URL building, query encoding, status mapping, retries.
//! It knows nothing about sessions — the session connector decides which
//! query parameters (session key, launch key) each call carries and what the
//! decoded payload means.

use crate::error::HttpError;
use crate::http::retry::{RetryConfig, RetryPolicy};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Ordered query parameters, URL-encoded at build time.
pub type QueryPairs = Vec<(String, String)>;

/// Low-level HTTP client for the account REST API.
pub struct AccountHttp {
    base_url: String,
    client: Client,
}

impl AccountHttp {
    pub fn new(base_url: &str) -> Self {
        let builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: builder.build().expect("Failed to build HTTP client"),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL with URL-encoded query parameters.
    pub fn url(&self, path: &str, query: &QueryPairs) -> String {
        let mut url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect();
            url = format!("{}?{}", url, encoded.join("&"));
        }
        url
    }

    /// GET returning the raw JSON payload, for callers that must inspect an
    /// envelope before the full typed decode.
    pub async fn get_value(
        &self,
        path: &str,
        query: &QueryPairs,
        retry: RetryPolicy,
    ) -> Result<Value, HttpError> {
        let url = self.url(path, query);
        self.request_with_retry(reqwest::Method::GET, &url, None::<&()>, false, retry)
            .await
    }

    /// GET decoded straight into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &QueryPairs,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        let value = self.get_value(path, query, retry).await?;
        serde_json::from_value(value).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// POST with a JSON body, returning the raw payload.
    ///
    /// `accept_created` makes 201 a success — only the receipt-upload path
    /// responds that way.
    pub async fn post_value<B: Serialize>(
        &self,
        path: &str,
        query: &QueryPairs,
        body: &B,
        accept_created: bool,
    ) -> Result<Value, HttpError> {
        let url = self.url(path, query);
        self.request_with_retry(
            reqwest::Method::POST,
            &url,
            Some(body),
            accept_created,
            RetryPolicy::None,
        )
        .await
    }

    // ── Internal ─────────────────────────────────────────────────────────

    async fn request_with_retry<B: Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
        accept_created: bool,
        retry: RetryPolicy,
    ) -> Result<Value, HttpError> {
        let config = match &retry {
            RetryPolicy::None => {
                return self.do_request(&method, url, body, accept_created).await;
            }
            RetryPolicy::Idempotent => RetryConfig::idempotent(),
            RetryPolicy::Custom(c) => c.clone(),
        };

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match self.do_request(&method, url, body, accept_created).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let should_retry = match &e {
                        HttpError::Unknown { status, .. } => {
                            config.retryable_statuses.contains(status)
                        }
                        HttpError::Timeout => true,
                        HttpError::Reqwest(re) => {
                            re.is_connect() || re.is_timeout() || re.is_request()
                        }
                        _ => false,
                    };

                    if should_retry && attempt < config.max_retries {
                        let delay = config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max = config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying request to {}",
                            url
                        );
                        futures_timer::Delay::new(delay).await;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(HttpError::MaxRetriesExceeded {
            attempts: config.max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn do_request<B: Serialize>(
        &self,
        method: &reqwest::Method,
        url: &str,
        body: Option<&B>,
        accept_created: bool,
    ) -> Result<Value, HttpError> {
        let mut req = self.client.request(method.clone(), url);
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else {
                HttpError::Reqwest(e)
            }
        })?;

        let status = resp.status().as_u16();
        match status {
            200 => {}
            201 if accept_created => {}
            401 => return Err(HttpError::Unauthorized),
            403 => return Err(HttpError::Forbidden),
            _ => {
                let body_text = resp.text().await.unwrap_or_default();
                return Err(HttpError::Unknown {
                    status,
                    body: body_text,
                });
            }
        }

        resp.json::<Value>()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))
    }
}

impl Clone for AccountHttp {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_query_values() {
        let http = AccountHttp::new("https://api.example.com/");
        let url = http.url(
            "account/login",
            &vec![
                ("username".to_string(), "a b+c".to_string()),
                ("date".to_string(), "2025-01-01".to_string()),
            ],
        );
        assert_eq!(
            url,
            "https://api.example.com/account/login?username=a%20b%2Bc&date=2025-01-01"
        );
    }

    #[test]
    fn test_url_without_query() {
        let http = AccountHttp::new("https://api.example.com");
        assert_eq!(
            http.url("/account/balance", &Vec::new()),
            "https://api.example.com/account/balance"
        );
    }
}
