use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::domain::{Entity, EntityKind};

/// When a cached entry stops being trusted without an explicit invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Fresh for the window, then refetched on next use.
    Window(Duration),
    /// Never stale by time; only a targeted `invalidate` forces a refetch.
    UntilInvalidated,
}

/// What happens to an entry once the resolution that fetched it has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Keep,
    /// Removed by the next `sweep`, bounding memory growth from accumulating
    /// calculation outputs.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub staleness: Staleness,
    pub retention: Retention,
}

#[derive(Debug, Clone)]
pub struct CachePolicies {
    per_kind: HashMap<EntityKind, CachePolicy>,
}

impl CachePolicies {
    /// Policies and households are safe to reuse across navigations; reports
    /// and simulations carry calculation output that mutates out-of-band, so
    /// they are refreshed on invalidation only and swept after use.
    pub fn with_staleness(window: Duration) -> Self {
        let mut per_kind = HashMap::new();
        per_kind.insert(
            EntityKind::Policy,
            CachePolicy {
                staleness: Staleness::Window(window),
                retention: Retention::Keep,
            },
        );
        per_kind.insert(
            EntityKind::Household,
            CachePolicy {
                staleness: Staleness::Window(window),
                retention: Retention::Keep,
            },
        );
        per_kind.insert(
            EntityKind::Geography,
            CachePolicy {
                staleness: Staleness::Window(window),
                retention: Retention::Keep,
            },
        );
        per_kind.insert(
            EntityKind::Simulation,
            CachePolicy {
                staleness: Staleness::UntilInvalidated,
                retention: Retention::Drop,
            },
        );
        per_kind.insert(
            EntityKind::Report,
            CachePolicy {
                staleness: Staleness::UntilInvalidated,
                retention: Retention::Drop,
            },
        );
        Self { per_kind }
    }

    pub fn policy(&self, kind: EntityKind) -> CachePolicy {
        self.per_kind.get(&kind).copied().unwrap_or(CachePolicy {
            staleness: Staleness::UntilInvalidated,
            retention: Retention::Drop,
        })
    }
}

impl Default for CachePolicies {
    fn default() -> Self {
        Self::with_staleness(Duration::from_secs(300))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    entity: Entity,
    stored_at: Instant,
    invalidated: bool,
}

/// Process-wide normalized entity cache: at most one live entry per entity id,
/// shared by every reader through one injected instance. Writes are
/// whole-entity replacements keyed by `(kind, id)`.
#[derive(Debug)]
pub struct EntityCache {
    entries: RwLock<HashMap<(EntityKind, String), CacheEntry>>,
    policies: CachePolicies,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::with_policies(CachePolicies::default())
    }

    pub fn with_policies(policies: CachePolicies) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policies,
        }
    }

    /// Returns the cached entity whether or not it is still fresh. Staleness
    /// only matters to the fetch engine; a holder of an id always sees the
    /// latest write.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<Entity> {
        let entries = self.entries.read().expect("cache lock poisoned");
        entries
            .get(&(kind, id.to_string()))
            .map(|entry| entry.entity.clone())
    }

    /// Returns the cached entity only when the kind's staleness policy still
    /// trusts it. A miss here means the fetch engine must go to the network.
    pub fn get_fresh(&self, kind: EntityKind, id: &str) -> Option<Entity> {
        let entries = self.entries.read().expect("cache lock poisoned");
        let entry = entries.get(&(kind, id.to_string()))?;
        if entry.invalidated {
            return None;
        }
        match self.policies.policy(kind).staleness {
            Staleness::Window(window) if entry.stored_at.elapsed() >= window => None,
            _ => Some(entry.entity.clone()),
        }
    }

    pub fn get_all(&self, kind: EntityKind) -> Vec<Entity> {
        let entries = self.entries.read().expect("cache lock poisoned");
        entries
            .iter()
            .filter(|((entry_kind, _), _)| *entry_kind == kind)
            .map(|(_, entry)| entry.entity.clone())
            .collect()
    }

    /// Whole-entity replacement. Visible to every subsequent `get` for the
    /// same id, regardless of which fetch path populated it.
    pub fn set(&self, entity: Entity) {
        let key = (entity.kind(), entity.id().to_string());
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(
            key,
            CacheEntry {
                entity,
                stored_at: Instant::now(),
                invalidated: false,
            },
        );
    }

    /// Case-insensitive substring search over one serialized field. `id` and
    /// `label` are the common callers; any top-level string field works.
    pub fn search(&self, kind: EntityKind, field: &str, term: &str) -> Vec<Entity> {
        let needle = term.to_lowercase();
        let entries = self.entries.read().expect("cache lock poisoned");
        entries
            .iter()
            .filter(|((entry_kind, _), _)| *entry_kind == kind)
            .filter(|(_, entry)| {
                field_text(&entry.entity, field)
                    .map(|text| text.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .map(|(_, entry)| entry.entity.clone())
            .collect()
    }

    /// Targeted invalidation, issued by mutation-success handlers (e.g. a new
    /// calculation completing). The entry stays readable but the next
    /// `get_fresh` misses, forcing a refetch.
    pub fn invalidate(&self, kind: EntityKind, id: &str) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        if let Some(entry) = entries.get_mut(&(kind, id.to_string())) {
            entry.invalidated = true;
        }
    }

    /// Drops entries of zero-retention kinds. Called once a resolution has
    /// handed its graph to the caller and no longer references the entries.
    pub fn sweep(&self) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let policies = &self.policies;
        entries.retain(|(kind, _), _| policies.policy(*kind).retention == Retention::Keep);
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

fn field_text(entity: &Entity, field: &str) -> Option<String> {
    match field {
        "id" => Some(entity.id().to_string()),
        "label" => entity.label().map(str::to_string),
        other => {
            let value = serde_json::to_value(entity).ok()?;
            value.get(other).and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                v => Some(v.to_string()),
            })
        }
    }
}
