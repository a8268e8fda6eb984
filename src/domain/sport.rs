//! Sport taxonomy — sports, locations, event categories.

use crate::shared::EntityId;
use serde::{Deserialize, Serialize};

/// A sport (e.g. football, tennis).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sport {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
    /// Live match count shown in sport listings. Mutated by the feed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_matches: Option<u32>,
}

/// A geographic location (country or region) that tournaments belong to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

/// A category grouping events within a sport (e.g. "Cups", "Leagues").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventCategory {
    pub id: EntityId,
    pub name: String,
    pub sport_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}
