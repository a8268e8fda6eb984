//! Account session layer — tokens, credentials, wire types, connector.
//!
//! ## Session model
//!
//! - The session key (and, once established, the launch key) travel as
//!   query parameters on every authenticated call — the backend does not
//!   use auth headers.
//! - The server can invalidate a session at any time; it signals this with a
//!   `NOT_LOGGED_IN` status inside an otherwise-200 payload. That sentinel
//!   is recovered locally (clear token, re-login with retained credentials,
//!   retry once) and is never surfaced to callers.
//! - Explicit [`SessionConnector::logout`] clears the retained credentials
//!   too, so a later sentinel cannot silently re-login an account the user
//!   chose to leave.

pub mod connector;

pub use connector::{AccountEndpoint, SessionConnector};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ─── Status constants ────────────────────────────────────────────────────────

pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_FAIL_UN_PW: &str = "FAIL_UN_PW";
pub const STATUS_FAIL_QUICK_OPEN: &str = "FAIL_QUICK_OPEN_STATUS";
pub const STATUS_FAIL_TEMP_LOCK: &str = "FAIL_TEMP_LOCK";

/// Payload-level sentinel for an invalidated session, inside an HTTP 200.
pub const STATUS_NOT_LOGGED_IN: &str = "NOT_LOGGED_IN";

// ─── Session state ───────────────────────────────────────────────────────────

/// The cached session token.
///
/// `launch_key` is added by the open-game-session call chained after login;
/// requests made in between carry only the session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub session_key: String,
    pub launch_key: Option<String>,
}

/// Credentials retained to support transparent re-login after a
/// sentinel-triggered expiry. Cleared only by explicit logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub username: String,
    pub password: String,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

/// Minimal envelope checked on every authenticated response before the full
/// typed decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub status: Option<String>,
}

/// Login response. `status` selects which of the optional fields are
/// meaningful.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub status: String,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default, with = "crate::shared::serde_util::date_ymd::option")]
    pub lock_until: Option<NaiveDate>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of the open-game-session call chained after login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenGameSessionResponse {
    pub status: String,
    #[serde(default)]
    pub launch_key: Option<String>,
}

/// Ancillary `{status, message?}` envelope used by support-style endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ─── Account wire types ──────────────────────────────────────────────────────

/// Account balance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub status: String,
    pub amount: Decimal,
    pub currency: String,
}

/// One settled or open bet in the account history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRecord {
    pub id: String,
    pub outcome_id: String,
    pub stake: Decimal,
    pub odds: Decimal,
    #[serde(with = "crate::shared::serde_util::date_ymd")]
    pub placed_on: NaiveDate,
    #[serde(default)]
    pub settled: bool,
    #[serde(default)]
    pub payout: Option<Decimal>,
}

/// Date-ranged bet history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetHistoryResponse {
    pub status: String,
    pub bets: Vec<BetRecord>,
}

/// Result of placing a bet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetResponse {
    pub status: String,
    #[serde(default)]
    pub bet_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
