//! Network URL constants for the Oddstream SDK.

/// Default account REST API base URL.
pub const DEFAULT_API_URL: &str = "https://account.oddstream.io";

/// Default push feed URL.
pub const DEFAULT_FEED_URL: &str = "wss://feed.oddstream.io/ws";
