//! Session connector — typed requests with transparent login and
//! session-expiry recovery.
//!
//! Callers see a plain "endpoint in, typed result or error out" contract.
//! The one locally-recovered condition is the `NOT_LOGGED_IN` payload
//! sentinel: the cached token is cleared (credentials retained) and the
//! request is re-run after a fresh login — at most once per call, so a
//! server that keeps answering with the sentinel cannot recurse forever.

use crate::error::{HttpError, SdkError, SessionError};
use crate::http::{AccountHttp, QueryPairs, RetryPolicy};
use crate::session::{
    BalanceResponse, BetHistoryResponse, LoginResponse, OpenGameSessionResponse, PlaceBetResponse,
    SessionCredentials, SessionToken, StatusEnvelope, SupportResponse, STATUS_FAIL_QUICK_OPEN,
    STATUS_FAIL_TEMP_LOCK, STATUS_FAIL_UN_PW, STATUS_NOT_LOGGED_IN, STATUS_SUCCESS,
};
use crate::shared::serde_util::date_ymd;
use async_lock::RwLock;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

// ─── Endpoint description ────────────────────────────────────────────────────

/// One account-API call: path, parameters, and how to treat its transport.
#[derive(Debug, Clone)]
pub struct AccountEndpoint {
    path: &'static str,
    query: QueryPairs,
    requires_session: bool,
    accept_created: bool,
    body: Option<Value>,
    retry: RetryPolicy,
}

impl AccountEndpoint {
    pub fn balance() -> Self {
        Self {
            path: "account/balance",
            query: Vec::new(),
            requires_session: true,
            accept_created: false,
            body: None,
            retry: RetryPolicy::Idempotent,
        }
    }

    pub fn bet_history(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            path: "account/bets",
            query: vec![
                ("from".to_string(), from.format(date_ymd::FORMAT).to_string()),
                ("to".to_string(), to.format(date_ymd::FORMAT).to_string()),
            ],
            requires_session: true,
            accept_created: false,
            body: None,
            retry: RetryPolicy::Idempotent,
        }
    }

    pub fn place_bet(outcome_id: &str, stake: Decimal) -> Self {
        Self {
            path: "account/bets/place",
            query: vec![
                ("outcomeId".to_string(), outcome_id.to_string()),
                ("stake".to_string(), stake.to_string()),
            ],
            requires_session: true,
            accept_created: false,
            body: None,
            retry: RetryPolicy::None,
        }
    }

    /// The one upload-style endpoint; the server answers 201 on success.
    pub fn upload_receipt(bet_id: &str, content_base64: &str) -> Self {
        Self {
            path: "account/bets/receipt",
            query: vec![("betId".to_string(), bet_id.to_string())],
            requires_session: true,
            accept_created: true,
            body: Some(serde_json::json!({ "content": content_base64 })),
            retry: RetryPolicy::None,
        }
    }

    pub fn support_request(message: &str) -> Self {
        Self {
            path: "account/support",
            query: vec![("message".to_string(), message.to_string())],
            requires_session: true,
            accept_created: false,
            body: None,
            retry: RetryPolicy::None,
        }
    }

    pub fn requires_session(&self) -> bool {
        self.requires_session
    }
}

// ─── Connector ───────────────────────────────────────────────────────────────

/// Performs authenticated requests against the account API.
pub struct SessionConnector {
    http: AccountHttp,
    token: RwLock<Option<SessionToken>>,
    credentials: RwLock<Option<SessionCredentials>>,
}

impl SessionConnector {
    pub fn new(http: AccountHttp) -> Self {
        Self {
            http,
            token: RwLock::new(None),
            credentials: RwLock::new(None),
        }
    }

    /// Whether a session token is currently cached.
    pub async fn is_logged_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Current token, if any. The launch key appears once the chained
    /// open-game-session call has completed.
    pub async fn session_token(&self) -> Option<SessionToken> {
        self.token.read().await.clone()
    }

    /// Perform one typed request.
    ///
    /// Logs in on demand when the endpoint needs a session and credentials
    /// are retained; recovers from the not-logged-in sentinel at most once.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &AccountEndpoint,
    ) -> Result<T, SdkError> {
        let mut sentinel_retries = 0u8;

        loop {
            if endpoint.requires_session && self.token.read().await.is_none() {
                let credentials = self.credentials.read().await.clone();
                match credentials {
                    Some(creds) => {
                        self.login(&creds.username, &creds.password).await?;
                    }
                    None => return Err(SessionError::SessionNotFound.into()),
                }
            }

            let query = self.query_with_session(endpoint).await;
            let value = match &endpoint.body {
                Some(body) => {
                    self.http
                        .post_value(endpoint.path, &query, body, endpoint.accept_created)
                        .await?
                }
                None => {
                    self.http
                        .get_value(endpoint.path, &query, endpoint.retry.clone())
                        .await?
                }
            };

            if endpoint.requires_session && is_not_logged_in(&value) {
                // Payload-level expiry despite HTTP 200. Clear the token but
                // keep the credentials so the re-login is transparent.
                *self.token.write().await = None;
                if sentinel_retries >= 1 {
                    tracing::warn!(
                        path = endpoint.path,
                        "Session sentinel persisted after re-login"
                    );
                    return Err(SessionError::SessionNotFound.into());
                }
                sentinel_retries += 1;
                tracing::info!(path = endpoint.path, "Session expired — re-authenticating");
                continue;
            }

            return serde_json::from_value(value)
                .map_err(|e| HttpError::Decode(e.to_string()).into());
        }
    }

    /// Log in and cache the resulting session.
    ///
    /// On success the open-game-session call is chained and its launch key
    /// folded into the cached token; its failure does not fail the login.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionToken, SdkError> {
        let query = vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ];
        let resp: LoginResponse = self
            .http
            .get("account/login", &query, RetryPolicy::None)
            .await?;

        match resp.status.as_str() {
            STATUS_SUCCESS => {
                let session_key = resp.session_key.ok_or_else(|| {
                    HttpError::Decode("login success without sessionKey".to_string())
                })?;
                let token = SessionToken {
                    session_key,
                    launch_key: None,
                };
                *self.token.write().await = Some(token.clone());
                *self.credentials.write().await = Some(SessionCredentials {
                    username: username.to_string(),
                    password: password.to_string(),
                });

                match self.open_game_session(&token.session_key).await {
                    Ok(Some(launch_key)) => {
                        let mut guard = self.token.write().await;
                        if let Some(cached) = guard.as_mut() {
                            cached.launch_key = Some(launch_key);
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("Open game session returned no launch key");
                    }
                    Err(e) => {
                        tracing::warn!("Open game session failed: {e}");
                    }
                }

                Ok(self.token.read().await.clone().unwrap_or(token))
            }
            STATUS_FAIL_UN_PW => {
                *self.token.write().await = None;
                *self.credentials.write().await = None;
                Err(SessionError::InvalidEmailPassword.into())
            }
            STATUS_FAIL_QUICK_OPEN => Err(SessionError::QuickSignUpIncomplete.into()),
            STATUS_FAIL_TEMP_LOCK => {
                let until = resp.lock_until.ok_or_else(|| {
                    HttpError::Decode("temp lock without lockUntil date".to_string())
                })?;
                Err(SessionError::TempLock { until }.into())
            }
            _ => Err(SessionError::ErrorMessage(
                resp.message.unwrap_or(resp.status),
            )
            .into()),
        }
    }

    /// Explicit logout — clears the token AND the retained credentials.
    ///
    /// Distinct from sentinel-triggered clearing, which keeps credentials so
    /// in-flight requests can recover transparently.
    pub async fn logout(&self) -> Result<(), SdkError> {
        let token = self.token.read().await.clone();
        if let Some(token) = token {
            let query = vec![("sessionKey".to_string(), token.session_key)];
            if let Err(e) = self
                .http
                .get_value("account/logout", &query, RetryPolicy::None)
                .await
            {
                tracing::warn!("Server logout failed: {e}");
            }
        }

        *self.token.write().await = None;
        *self.credentials.write().await = None;
        Ok(())
    }

    // ── Typed conveniences ───────────────────────────────────────────────

    pub async fn balance(&self) -> Result<BalanceResponse, SdkError> {
        self.request(&AccountEndpoint::balance()).await
    }

    pub async fn bet_history(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BetHistoryResponse, SdkError> {
        self.request(&AccountEndpoint::bet_history(from, to)).await
    }

    pub async fn place_bet(
        &self,
        outcome_id: &str,
        stake: Decimal,
    ) -> Result<PlaceBetResponse, SdkError> {
        self.request(&AccountEndpoint::place_bet(outcome_id, stake))
            .await
    }

    pub async fn upload_receipt(
        &self,
        bet_id: &str,
        content_base64: &str,
    ) -> Result<SupportResponse, SdkError> {
        self.request(&AccountEndpoint::upload_receipt(bet_id, content_base64))
            .await
    }

    pub async fn support_request(&self, message: &str) -> Result<SupportResponse, SdkError> {
        self.request(&AccountEndpoint::support_request(message))
            .await
    }

    // ── Internal ─────────────────────────────────────────────────────────

    async fn query_with_session(&self, endpoint: &AccountEndpoint) -> QueryPairs {
        let mut query = endpoint.query.clone();
        if endpoint.requires_session {
            if let Some(token) = self.token.read().await.as_ref() {
                query.push(("sessionKey".to_string(), token.session_key.clone()));
                if let Some(launch_key) = &token.launch_key {
                    query.push(("launchKey".to_string(), launch_key.clone()));
                }
            }
        }
        query
    }

    async fn open_game_session(&self, session_key: &str) -> Result<Option<String>, SdkError> {
        let query = vec![("sessionKey".to_string(), session_key.to_string())];
        let resp: OpenGameSessionResponse = self
            .http
            .get("account/openGameSession", &query, RetryPolicy::None)
            .await?;

        if resp.status == STATUS_SUCCESS {
            Ok(resp.launch_key)
        } else {
            Ok(None)
        }
    }
}

fn is_not_logged_in(value: &Value) -> bool {
    serde_json::from_value::<StatusEnvelope>(value.clone())
        .ok()
        .and_then(|envelope| envelope.status)
        .as_deref()
        == Some(STATUS_NOT_LOGGED_IN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentinel_detection() {
        assert!(is_not_logged_in(&json!({"status": "NOT_LOGGED_IN"})));
        assert!(!is_not_logged_in(&json!({"status": "SUCCESS"})));
        assert!(!is_not_logged_in(&json!({"amount": "10.00"})));
        assert!(!is_not_logged_in(&json!([1, 2, 3])));
    }

    #[test]
    fn test_endpoint_dates_formatted_ymd() {
        let endpoint = AccountEndpoint::bet_history(
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
        );
        assert_eq!(endpoint.query[0], ("from".to_string(), "2025-01-02".to_string()));
        assert_eq!(endpoint.query[1], ("to".to_string(), "2025-02-03".to_string()));
        assert!(endpoint.requires_session());
    }

    #[test]
    fn test_upload_is_the_only_created_endpoint() {
        assert!(AccountEndpoint::upload_receipt("b1", "aGk=").accept_created);
        assert!(!AccountEndpoint::balance().accept_created);
        assert!(!AccountEndpoint::place_bet("o1", Decimal::ONE).accept_created);
    }
}
