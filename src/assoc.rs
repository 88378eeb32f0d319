use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ResolvedConfig, StoreBackend};
use crate::domain::{CountryId, EntityKind};
use crate::error::PolisError;

/// A user-owned reference to a base entity, distinct from the entity itself.
/// The association id doubles as the share token for report associations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub id: String,
    pub user_id: String,
    pub entity_id: String,
    pub country_id: CountryId,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Association {
    pub fn new(user_id: &str, entity_id: &str, country_id: CountryId, label: Option<String>) -> Self {
        Self::with_id(
            &uuid::Uuid::new_v4().to_string(),
            user_id,
            entity_id,
            country_id,
            label,
        )
    }

    /// Caller-supplied id, used when re-saving under a stable share token.
    pub fn with_id(
        id: &str,
        user_id: &str,
        entity_id: &str,
        country_id: CountryId,
        label: Option<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            entity_id: entity_id.to_string(),
            country_id,
            label,
            created_at: Utc::now(),
        }
    }
}

/// Per-entity-kind CRUD over association records. Update and delete are
/// intentionally absent: associations are immutable once created, and save
/// semantics rely on create-only idempotence.
///
/// Absence is a representable result everywhere — `find_by_id` returns
/// `Ok(None)` and `find_by_user` an empty list, never an error.
pub trait AssociationStore: Send + Sync {
    /// Fails with `DuplicateAssociation` when a record for the same
    /// `(user_id, entity_id)` already exists within the kind.
    fn create(&self, kind: EntityKind, assoc: &Association) -> Result<Association, PolisError>;

    fn find_by_user(
        &self,
        kind: EntityKind,
        user_id: &str,
        country: Option<&CountryId>,
    ) -> Result<Vec<Association>, PolisError>;

    fn find_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Association>, PolisError>;
}

/// Backend selection is a construction-time configuration decision, never a
/// per-call one.
pub fn open_store(config: &ResolvedConfig) -> Result<Box<dyn AssociationStore>, PolisError> {
    match config.backend {
        StoreBackend::Remote => Ok(Box::new(crate::assoc_remote::RemoteAssociationStore::new(
            &config.api_base_url,
        )?)),
        StoreBackend::Local => Ok(Box::new(crate::assoc_local::LocalAssociationStore::new()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_distinct_ids() {
        let country: CountryId = "us".parse().unwrap();
        let a = Association::new("user-1", "rep-1", country.clone(), None);
        let b = Association::new("user-1", "rep-2", country, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn with_id_keeps_supplied_token() {
        let country: CountryId = "us".parse().unwrap();
        let assoc = Association::with_id("token-1", "user-1", "rep-1", country, None);
        assert_eq!(assoc.id, "token-1");
    }
}
