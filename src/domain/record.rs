//! The self-describing record layer — entity kinds, change records, and the
//! discriminator-first decoder.
//!
//! Feed records are heterogeneous JSON objects. A record carrying a
//! `changeType` field is a [`ChangeRecord`] no matter what else it contains
//! (a deleted entity arrives with a reduced field set that would fail a
//! strict entity schema). Otherwise the `_type`/`type` tag selects a typed
//! entity decoder; an unrecognized tag degrades to [`EntityRecord::Unknown`]
//! instead of failing the whole frame. A *recognized* tag with a malformed
//! payload is still a decode error.

use crate::domain::event::{EventInfo, Match, NextMatchesNumber, Tournament};
use crate::domain::market::{
    BettingOffer, MainMarket, Market, MarketInfo, MarketOutcomeRelation, Outcome,
};
use crate::domain::sport::{EventCategory, Location, Sport};
use crate::shared::EntityId;
use serde::de::Error as DeError;
use serde::ser::{Error as SerError, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ─── EntityKind ──────────────────────────────────────────────────────────────

/// The set of entity kinds the feed is known to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Sport,
    Match,
    Market,
    Outcome,
    BettingOffer,
    Location,
    EventCategory,
    MarketOutcomeRelation,
    MainMarket,
    MarketInfo,
    NextMatchesNumber,
    Tournament,
    EventInfo,
}

impl EntityKind {
    /// All kinds, in a stable order. Useful for iterating store contents.
    pub const ALL: [EntityKind; 13] = [
        Self::Sport,
        Self::Match,
        Self::Market,
        Self::Outcome,
        Self::BettingOffer,
        Self::Location,
        Self::EventCategory,
        Self::MarketOutcomeRelation,
        Self::MainMarket,
        Self::MarketInfo,
        Self::NextMatchesNumber,
        Self::Tournament,
        Self::EventInfo,
    ];

    /// The wire discriminator value for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sport => "sport",
            Self::Match => "match",
            Self::Market => "market",
            Self::Outcome => "outcome",
            Self::BettingOffer => "bettingOffer",
            Self::Location => "location",
            Self::EventCategory => "eventCategory",
            Self::MarketOutcomeRelation => "marketOutcomeRelation",
            Self::MainMarket => "mainMarket",
            Self::MarketInfo => "marketInfo",
            Self::NextMatchesNumber => "nextMatchesNumber",
            Self::Tournament => "tournament",
            Self::EventInfo => "eventInfo",
        }
    }

    /// Resolve a wire discriminator. `None` for tags this SDK doesn't know.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sport" => Some(Self::Sport),
            "match" => Some(Self::Match),
            "market" => Some(Self::Market),
            "outcome" => Some(Self::Outcome),
            "bettingOffer" => Some(Self::BettingOffer),
            "location" => Some(Self::Location),
            "eventCategory" => Some(Self::EventCategory),
            "marketOutcomeRelation" => Some(Self::MarketOutcomeRelation),
            "mainMarket" => Some(Self::MainMarket),
            "marketInfo" => Some(Self::MarketInfo),
            "nextMatchesNumber" => Some(Self::NextMatchesNumber),
            "tournament" => Some(Self::Tournament),
            "eventInfo" => Some(Self::EventInfo),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A fully typed entity — one variant per known kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Sport(Sport),
    Match(Match),
    Market(Market),
    Outcome(Outcome),
    BettingOffer(BettingOffer),
    Location(Location),
    EventCategory(EventCategory),
    MarketOutcomeRelation(MarketOutcomeRelation),
    MainMarket(MainMarket),
    MarketInfo(MarketInfo),
    NextMatchesNumber(NextMatchesNumber),
    Tournament(Tournament),
    EventInfo(EventInfo),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Sport(_) => EntityKind::Sport,
            Self::Match(_) => EntityKind::Match,
            Self::Market(_) => EntityKind::Market,
            Self::Outcome(_) => EntityKind::Outcome,
            Self::BettingOffer(_) => EntityKind::BettingOffer,
            Self::Location(_) => EntityKind::Location,
            Self::EventCategory(_) => EntityKind::EventCategory,
            Self::MarketOutcomeRelation(_) => EntityKind::MarketOutcomeRelation,
            Self::MainMarket(_) => EntityKind::MainMarket,
            Self::MarketInfo(_) => EntityKind::MarketInfo,
            Self::NextMatchesNumber(_) => EntityKind::NextMatchesNumber,
            Self::Tournament(_) => EntityKind::Tournament,
            Self::EventInfo(_) => EntityKind::EventInfo,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Self::Sport(e) => &e.id,
            Self::Match(e) => &e.id,
            Self::Market(e) => &e.id,
            Self::Outcome(e) => &e.id,
            Self::BettingOffer(e) => &e.id,
            Self::Location(e) => &e.id,
            Self::EventCategory(e) => &e.id,
            Self::MarketOutcomeRelation(e) => &e.id,
            Self::MainMarket(e) => &e.id,
            Self::MarketInfo(e) => &e.id,
            Self::NextMatchesNumber(e) => &e.id,
            Self::Tournament(e) => &e.id,
            Self::EventInfo(e) => &e.id,
        }
    }

    /// Decode a payload object through the typed decoder for `kind`.
    ///
    /// Strict: a malformed payload for a known kind is an error, only the
    /// tag dispatch above this is permissive.
    pub fn from_value(kind: EntityKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EntityKind::Sport => Self::Sport(serde_json::from_value(value)?),
            EntityKind::Match => Self::Match(serde_json::from_value(value)?),
            EntityKind::Market => Self::Market(serde_json::from_value(value)?),
            EntityKind::Outcome => Self::Outcome(serde_json::from_value(value)?),
            EntityKind::BettingOffer => Self::BettingOffer(serde_json::from_value(value)?),
            EntityKind::Location => Self::Location(serde_json::from_value(value)?),
            EntityKind::EventCategory => Self::EventCategory(serde_json::from_value(value)?),
            EntityKind::MarketOutcomeRelation => {
                Self::MarketOutcomeRelation(serde_json::from_value(value)?)
            }
            EntityKind::MainMarket => Self::MainMarket(serde_json::from_value(value)?),
            EntityKind::MarketInfo => Self::MarketInfo(serde_json::from_value(value)?),
            EntityKind::NextMatchesNumber => {
                Self::NextMatchesNumber(serde_json::from_value(value)?)
            }
            EntityKind::Tournament => Self::Tournament(serde_json::from_value(value)?),
            EntityKind::EventInfo => Self::EventInfo(serde_json::from_value(value)?),
        })
    }

    /// Project the entity back to its untagged wire object.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Sport(e) => serde_json::to_value(e),
            Self::Match(e) => serde_json::to_value(e),
            Self::Market(e) => serde_json::to_value(e),
            Self::Outcome(e) => serde_json::to_value(e),
            Self::BettingOffer(e) => serde_json::to_value(e),
            Self::Location(e) => serde_json::to_value(e),
            Self::EventCategory(e) => serde_json::to_value(e),
            Self::MarketOutcomeRelation(e) => serde_json::to_value(e),
            Self::MainMarket(e) => serde_json::to_value(e),
            Self::MarketInfo(e) => serde_json::to_value(e),
            Self::NextMatchesNumber(e) => serde_json::to_value(e),
            Self::Tournament(e) => serde_json::to_value(e),
            Self::EventInfo(e) => serde_json::to_value(e),
        }
    }
}

// ─── ChangeRecord ────────────────────────────────────────────────────────────

/// What a change record does to its target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

/// A Create/Update/Delete instruction targeting one entity by id.
///
/// `Create` carries a full `entity`; `Update` carries only
/// `changed_properties` (a sparse subset of mutable fields); `Delete`
/// carries neither and is identified by `entity_type` + `id` alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub change_type: ChangeType,
    pub entity_type: String,
    pub id: EntityId,
    /// Present on `Create`. `None` when `entity_type` is unrecognized — the
    /// payload cannot be decoded typed and the applier skips it.
    pub entity: Option<Entity>,
    /// Present on `Update`. Values are raw JSON — assignment-merged, never
    /// interpreted arithmetically.
    pub changed_properties: Option<Map<String, Value>>,
}

impl ChangeRecord {
    /// The typed kind of the target, when recognized.
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_tag(&self.entity_type)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeRecordWire {
    change_type: ChangeType,
    entity_type: String,
    id: EntityId,
    #[serde(default)]
    entity: Option<Value>,
    #[serde(default)]
    changed_properties: Option<Map<String, Value>>,
}

impl<'de> Deserialize<'de> for ChangeRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = ChangeRecordWire::deserialize(deserializer)?;
        let entity = match (&wire.entity, EntityKind::from_tag(&wire.entity_type)) {
            (Some(value), Some(kind)) => Some(
                Entity::from_value(kind, value.clone()).map_err(D::Error::custom)?,
            ),
            _ => None,
        };
        Ok(ChangeRecord {
            change_type: wire.change_type,
            entity_type: wire.entity_type,
            id: wire.id,
            entity,
            changed_properties: wire.changed_properties,
        })
    }
}

impl Serialize for ChangeRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut len = 3;
        if self.entity.is_some() {
            len += 1;
        }
        if self.changed_properties.is_some() {
            len += 1;
        }
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("changeType", &self.change_type)?;
        map.serialize_entry("entityType", &self.entity_type)?;
        map.serialize_entry("id", &self.id)?;
        if let Some(entity) = &self.entity {
            let value = entity.to_value().map_err(S::Error::custom)?;
            map.serialize_entry("entity", &value)?;
        }
        if let Some(props) = &self.changed_properties {
            map.serialize_entry("changedProperties", props)?;
        }
        map.end()
    }
}

// ─── EntityRecord ────────────────────────────────────────────────────────────

/// One decoded unit of the feed: a full entity snapshot, a change record,
/// or an unknown-tagged record this SDK version doesn't understand.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    Entity(Entity),
    Change(ChangeRecord),
    /// Carries only the unrecognized discriminator. Re-encoding is lossy by
    /// design: the payload content is not round-tripped.
    Unknown(String),
}

impl<'de> Deserialize<'de> for EntityRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        // changeType takes precedence over any entity-type tag: a removed or
        // updated entity carries a reduced field set that a strict entity
        // schema would reject.
        if value.get("changeType").is_some() {
            return ChangeRecord::deserialize(value)
                .map(EntityRecord::Change)
                .map_err(D::Error::custom);
        }

        let tag = value
            .get("_type")
            .or_else(|| value.get("type"))
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::custom("record has no type discriminator"))?
            .to_string();

        match EntityKind::from_tag(&tag) {
            Some(kind) => Entity::from_value(kind, value)
                .map(EntityRecord::Entity)
                .map_err(D::Error::custom),
            None => Ok(EntityRecord::Unknown(tag)),
        }
    }
}

impl Serialize for EntityRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            EntityRecord::Entity(entity) => {
                let value = entity.to_value().map_err(S::Error::custom)?;
                let mut object = match value {
                    Value::Object(object) => object,
                    _ => return Err(S::Error::custom("entity did not serialize to an object")),
                };
                object.insert(
                    "_type".to_string(),
                    Value::String(entity.kind().as_str().to_string()),
                );
                object.serialize(serializer)
            }
            EntityRecord::Change(change) => change.serialize(serializer),
            EntityRecord::Unknown(tag) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("_type", tag)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags_decode_to_matching_variant() {
        let cases = [
            (r#"{"_type":"sport","id":"s1","name":"Football"}"#, EntityKind::Sport),
            (
                r#"{"_type":"match","id":"m1","name":"A vs B","sportId":"s1","startTime":"2025-06-01T18:00:00Z"}"#,
                EntityKind::Match,
            ),
            (
                r#"{"_type":"bettingOffer","id":"bo1","outcomeId":"o1","odds":"1.85"}"#,
                EntityKind::BettingOffer,
            ),
            (r#"{"_type":"location","id":"l1","name":"England"}"#, EntityKind::Location),
            (
                r#"{"_type":"tournament","id":"t1","name":"Premier League","sportId":"s1"}"#,
                EntityKind::Tournament,
            ),
        ];
        for (json, kind) in cases {
            let record: EntityRecord = serde_json::from_str(json).unwrap();
            match record {
                EntityRecord::Entity(entity) => assert_eq!(entity.kind(), kind),
                other => panic!("expected entity of kind {kind}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_tag_degrades_without_error() {
        let json = r#"{"_type":"virtualRace","id":"v1","laps":3}"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, EntityRecord::Unknown("virtualRace".to_string()));
    }

    #[test]
    fn test_type_fallback_discriminator() {
        let json = r#"{"type":"sport","id":"s1","name":"Tennis"}"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        assert!(matches!(record, EntityRecord::Entity(Entity::Sport(_))));
    }

    #[test]
    fn test_change_type_takes_precedence_over_entity_tag() {
        // Both discriminators present — must decode as a change record.
        let json = r#"{"changeType":"delete","_type":"match","entityType":"match","id":"m1"}"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        match record {
            EntityRecord::Change(change) => {
                assert_eq!(change.change_type, ChangeType::Delete);
                assert_eq!(change.entity_type, "match");
                assert!(change.entity.is_none());
                assert!(change.changed_properties.is_none());
            }
            other => panic!("expected change record, got {other:?}"),
        }
    }

    #[test]
    fn test_recognized_tag_malformed_payload_is_an_error() {
        // "match" is a known tag but startTime is missing.
        let json = r#"{"_type":"match","id":"m1","name":"A vs B","sportId":"s1"}"#;
        let result: Result<EntityRecord, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_discriminator_is_an_error() {
        let result: Result<EntityRecord, _> = serde_json::from_str(r#"{"id":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_carries_full_entity() {
        let json = r#"{
            "changeType": "create",
            "entityType": "outcome",
            "id": "o9",
            "entity": {"id":"o9","marketId":"mk1","name":"Draw"}
        }"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        match record {
            EntityRecord::Change(change) => match change.entity {
                Some(Entity::Outcome(outcome)) => assert_eq!(outcome.name, "Draw"),
                other => panic!("expected outcome entity, got {other:?}"),
            },
            other => panic!("expected change record, got {other:?}"),
        }
    }

    #[test]
    fn test_create_with_unknown_entity_type_degrades_to_no_entity() {
        let json = r#"{
            "changeType": "create",
            "entityType": "virtualRace",
            "id": "v1",
            "entity": {"id":"v1","laps":3}
        }"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        match record {
            EntityRecord::Change(change) => {
                assert!(change.entity.is_none());
                assert!(change.kind().is_none());
            }
            other => panic!("expected change record, got {other:?}"),
        }
    }

    #[test]
    fn test_update_carries_sparse_properties() {
        let json = r#"{
            "changeType": "update",
            "entityType": "match",
            "id": "m1",
            "changedProperties": {"score": "1-0"}
        }"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        match record {
            EntityRecord::Change(change) => {
                let props = change.changed_properties.unwrap();
                assert_eq!(props.get("score"), Some(&Value::String("1-0".to_string())));
            }
            other => panic!("expected change record, got {other:?}"),
        }
    }

    #[test]
    fn test_entity_reencodes_with_tag() {
        let json = r#"{"_type":"sport","id":"s1","name":"Football"}"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["_type"], "sport");
        assert_eq!(out["id"], "s1");
        assert_eq!(out["name"], "Football");
    }

    #[test]
    fn test_unknown_reencodes_discriminator_only() {
        let record = EntityRecord::Unknown("virtualRace".to_string());
        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out, serde_json::json!({"_type": "virtualRace"}));
    }

    #[test]
    fn test_change_record_reencodes_wire_shape() {
        let json = r#"{
            "changeType": "update",
            "entityType": "match",
            "id": "m1",
            "changedProperties": {"score": "2-0"}
        }"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["changeType"], "update");
        assert_eq!(out["entityType"], "match");
        assert_eq!(out["changedProperties"]["score"], "2-0");
    }

    #[test]
    fn test_every_kind_tag_roundtrips() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_tag(kind.as_str()), Some(kind));
        }
    }
}
