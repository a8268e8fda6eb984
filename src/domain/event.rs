//! Event domain — matches, tournaments, event details, next-matches counters.

use crate::shared::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStatus {
    NotStarted,
    Live,
    Finished,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "notStarted",
            Self::Live => "live",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A match between two participants.
///
/// `score`, `status` and `start_time` are the fields the feed mutates via
/// sparse change records; everything else is stable for the match lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: EntityId,
    pub name: String,
    pub sport_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<EntityId>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away_team: Option<String>,
}

/// A tournament/competition within a sport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: EntityId,
    pub name: String,
    pub sport_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

/// Supplemental detail for one match (venue, round, attendance).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub id: EntityId,
    pub match_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<u32>,
}

/// Number of upcoming matches for a sport, as pushed by the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NextMatchesNumber {
    pub id: EntityId,
    pub sport_id: EntityId,
    pub number: u32,
}
