use std::fs;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::assoc::{Association, AssociationStore};
use crate::domain::{CountryId, EntityKind};
use crate::error::PolisError;

/// Device-local association backend: one serialized record collection per
/// entity kind under a fixed data directory. A corrupt or unparseable
/// collection degrades to an empty list rather than failing the read.
#[derive(Debug)]
pub struct LocalAssociationStore {
    root: Utf8PathBuf,
    // Creates are read-modify-write over a whole collection file; concurrent
    // batch saves must not interleave them.
    write_lock: Mutex<()>,
}

impl LocalAssociationStore {
    pub fn new() -> Result<Self, PolisError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir().join(".local/share/polis-rm"),
                )
                .ok()
            })
            .ok_or_else(|| PolisError::Filesystem("unable to resolve data directory".to_string()))?;
        Ok(Self::with_root(root))
    }

    pub fn with_root(root: Utf8PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn collection_path(&self, kind: EntityKind) -> Utf8PathBuf {
        self.root
            .join("associations")
            .join(format!("{}.json", kind.as_str()))
    }

    fn load(&self, kind: EntityKind) -> Vec<Association> {
        let path = self.collection_path(kind);
        let Ok(content) = fs::read_to_string(path.as_std_path()) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    fn persist(&self, kind: EntityKind, records: &[Association]) -> Result<(), PolisError> {
        let path = self.collection_path(kind);
        let parent = path
            .parent()
            .ok_or_else(|| PolisError::Filesystem("invalid collection path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| PolisError::Filesystem(err.to_string()))?;

        let content = serde_json::to_vec_pretty(records)
            .map_err(|err| PolisError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("polis-rm-assoc")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| PolisError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), &content).map_err(|err| PolisError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| PolisError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl AssociationStore for LocalAssociationStore {
    fn create(&self, kind: EntityKind, assoc: &Association) -> Result<Association, PolisError> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut records = self.load(kind);
        let duplicate = records.iter().any(|record| {
            record.user_id == assoc.user_id && record.entity_id == assoc.entity_id
        });
        if duplicate {
            return Err(PolisError::DuplicateAssociation {
                user_id: assoc.user_id.clone(),
                entity_id: assoc.entity_id.clone(),
            });
        }
        records.push(assoc.clone());
        self.persist(kind, &records)?;
        Ok(assoc.clone())
    }

    fn find_by_user(
        &self,
        kind: EntityKind,
        user_id: &str,
        country: Option<&CountryId>,
    ) -> Result<Vec<Association>, PolisError> {
        Ok(self
            .load(kind)
            .into_iter()
            .filter(|record| record.user_id == user_id)
            .filter(|record| country.is_none_or(|country| &record.country_id == country))
            .collect())
    }

    fn find_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Association>, PolisError> {
        Ok(self
            .load(kind)
            .into_iter()
            .find(|record| record.id == id))
    }
}
