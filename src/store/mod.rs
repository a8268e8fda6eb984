//! The authoritative in-memory store — applies feed dumps and diffs,
//! exposes the read API that consumers (view layers, bots) build on.
//!
//! Entries are attributed to the [`Scope`] of the subscription that
//! delivered them, so an initial dump's `clear` only discards the state the
//! same logical subscription produced earlier. Field merge is assignment,
//! not arithmetic: re-applying an identical update batch is a no-op.

mod pump;

pub use pump::sync_subscription;

use crate::domain::record::{ChangeRecord, ChangeType, Entity, EntityKind, EntityRecord};
use crate::error::SdkError;
use crate::shared::{EntityId, Scope};
use async_lock::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct StoredEntity {
    entity: Entity,
    scope: Scope,
}

type KindMap = HashMap<EntityId, StoredEntity>;

/// Per-kind keyed entity maps, safe to share across subscription tasks.
///
/// Concurrent application from disjoint scopes is fine; ordering within one
/// scope's stream is the caller's responsibility (the subscription pump
/// applies one event at a time, in delivery order).
#[derive(Debug, Default)]
pub struct EntityStore {
    maps: RwLock<HashMap<EntityKind, KindMap>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Write API ────────────────────────────────────────────────────────

    /// Apply an initial dump: an authoritative full replacement for `scope`.
    ///
    /// With `clear`, every entry previously attributed to `scope` is removed
    /// first — used to reset state when the subscription's parameters change
    /// (e.g. a different sport). Full-entity records and `Create` change
    /// records are inserted; anything else in a dump is skipped with a
    /// warning.
    pub async fn apply_initial_dump(
        &self,
        scope: &Scope,
        records: &[EntityRecord],
        clear: bool,
    ) -> Result<(), SdkError> {
        let mut maps = self.maps.write().await;

        if clear {
            for kind_map in maps.values_mut() {
                kind_map.retain(|_, stored| stored.scope != *scope);
            }
        }

        for record in records {
            match record {
                EntityRecord::Entity(entity) => {
                    insert(&mut maps, scope, entity.clone());
                }
                EntityRecord::Change(change) if change.change_type == ChangeType::Create => {
                    match &change.entity {
                        Some(entity) => insert(&mut maps, scope, entity.clone()),
                        None => {
                            tracing::warn!(
                                entity_type = %change.entity_type,
                                id = %change.id,
                                "Dropping create for unrecognized entity type"
                            );
                        }
                    }
                }
                EntityRecord::Change(change) => {
                    tracing::warn!(
                        change_type = ?change.change_type,
                        id = %change.id,
                        "Skipping non-create change record inside an initial dump"
                    );
                }
                EntityRecord::Unknown(tag) => {
                    tracing::debug!(tag = %tag, "Skipping unknown record in initial dump");
                }
            }
        }

        Ok(())
    }

    /// Apply an incremental update batch, in delivery order.
    ///
    /// `Create` inserts (last-write-wins on collision), `Update` merges only
    /// the fields present in `changed_properties` into the existing entity,
    /// `Delete` removes by id. An `Update` for an id never inserted is
    /// dropped with a warning — transient out-of-order delivery during
    /// subscription churn is expected, not fatal.
    pub async fn apply_update_batch(
        &self,
        scope: &Scope,
        records: &[EntityRecord],
    ) -> Result<(), SdkError> {
        let mut maps = self.maps.write().await;

        for record in records {
            match record {
                EntityRecord::Change(change) => {
                    apply_change(&mut maps, scope, change)?;
                }
                EntityRecord::Entity(entity) => {
                    // Full snapshot inside an update batch — upsert.
                    insert(&mut maps, scope, entity.clone());
                }
                EntityRecord::Unknown(tag) => {
                    tracing::debug!(tag = %tag, "Skipping unknown record in update batch");
                }
            }
        }

        Ok(())
    }

    /// Remove every entry attributed to `scope`.
    pub async fn clear_scope(&self, scope: &Scope) {
        let mut maps = self.maps.write().await;
        for kind_map in maps.values_mut() {
            kind_map.retain(|_, stored| stored.scope != *scope);
        }
    }

    // ── Read API ─────────────────────────────────────────────────────────

    pub async fn entity(&self, kind: EntityKind, id: &EntityId) -> Option<Entity> {
        let maps = self.maps.read().await;
        maps.get(&kind)
            .and_then(|m| m.get(id))
            .map(|stored| stored.entity.clone())
    }

    pub async fn entities_of(&self, kind: EntityKind) -> Vec<Entity> {
        let maps = self.maps.read().await;
        maps.get(&kind)
            .map(|m| m.values().map(|stored| stored.entity.clone()).collect())
            .unwrap_or_default()
    }

    /// Total entry count across all kinds.
    pub async fn len(&self) -> usize {
        let maps = self.maps.read().await;
        maps.values().map(HashMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // ── Typed conveniences ───────────────────────────────────────────────

    pub async fn sports(&self) -> Vec<crate::domain::sport::Sport> {
        self.entities_of(EntityKind::Sport)
            .await
            .into_iter()
            .filter_map(|e| match e {
                Entity::Sport(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub async fn matches(&self) -> Vec<crate::domain::event::Match> {
        self.entities_of(EntityKind::Match)
            .await
            .into_iter()
            .filter_map(|e| match e {
                Entity::Match(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub async fn match_by_id(&self, id: &EntityId) -> Option<crate::domain::event::Match> {
        match self.entity(EntityKind::Match, id).await {
            Some(Entity::Match(m)) => Some(m),
            _ => None,
        }
    }

    // ── Derived views ────────────────────────────────────────────────────
    //
    // Computed on demand from the base maps so there is no second copy of
    // state to drift out of sync.

    /// Matches grouped by tournament id. Matches without a tournament are
    /// omitted.
    pub async fn matches_by_tournament(
        &self,
    ) -> HashMap<EntityId, Vec<crate::domain::event::Match>> {
        let mut grouped: HashMap<EntityId, Vec<crate::domain::event::Match>> = HashMap::new();
        for m in self.matches().await {
            if let Some(tournament_id) = m.tournament_id.clone() {
                grouped.entry(tournament_id).or_default().push(m);
            }
        }
        for group in grouped.values_mut() {
            group.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        }
        grouped
    }

    /// Locations indexed by id.
    pub async fn locations_by_id(&self) -> HashMap<EntityId, crate::domain::sport::Location> {
        self.entities_of(EntityKind::Location)
            .await
            .into_iter()
            .filter_map(|e| match e {
                Entity::Location(l) => Some((l.id.clone(), l)),
                _ => None,
            })
            .collect()
    }
}

fn insert(maps: &mut HashMap<EntityKind, KindMap>, scope: &Scope, entity: Entity) {
    let kind = entity.kind();
    let id = entity.id().clone();
    maps.entry(kind).or_default().insert(
        id,
        StoredEntity {
            entity,
            scope: scope.clone(),
        },
    );
}

fn apply_change(
    maps: &mut HashMap<EntityKind, KindMap>,
    scope: &Scope,
    change: &ChangeRecord,
) -> Result<(), SdkError> {
    let Some(kind) = change.kind() else {
        tracing::warn!(
            entity_type = %change.entity_type,
            id = %change.id,
            "Dropping change for unrecognized entity type"
        );
        return Ok(());
    };

    match change.change_type {
        ChangeType::Create => match &change.entity {
            Some(entity) => insert(maps, scope, entity.clone()),
            None => {
                tracing::warn!(kind = %kind, id = %change.id, "Create without entity payload");
            }
        },
        ChangeType::Update => {
            let Some(props) = &change.changed_properties else {
                tracing::warn!(kind = %kind, id = %change.id, "Update without changed properties");
                return Ok(());
            };
            let Some(stored) = maps.get_mut(&kind).and_then(|m| m.get_mut(&change.id)) else {
                // The entity should have arrived via a prior dump or create;
                // during subscription churn it may simply be gone already.
                tracing::warn!(kind = %kind, id = %change.id, "Dropping update for unknown entity");
                return Ok(());
            };
            stored.entity = merge_changed_properties(&stored.entity, props)?;
        }
        ChangeType::Delete => {
            if let Some(kind_map) = maps.get_mut(&kind) {
                if kind_map.remove(&change.id).is_none() {
                    tracing::debug!(kind = %kind, id = %change.id, "Delete for absent entity");
                }
            }
        }
    }

    Ok(())
}

/// Assign each changed property over the entity's wire object and decode it
/// back through the typed decoder. Assignment merge — applying the same
/// properties twice yields the same entity.
fn merge_changed_properties(
    entity: &Entity,
    props: &Map<String, Value>,
) -> Result<Entity, SdkError> {
    let mut value = entity.to_value()?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| SdkError::Other("entity did not serialize to an object".to_string()))?;
    for (key, prop) in props {
        object.insert(key.clone(), prop.clone());
    }
    Entity::from_value(entity.kind(), value).map_err(SdkError::from)
}
