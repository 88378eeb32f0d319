use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::assoc::{Association, AssociationStore};
use crate::domain::{CountryId, EntityKind};
use crate::error::PolisError;

/// Remote association backend. Uniqueness of `(user_id, entity_id)` is
/// enforced server-side; this client only maps the wire responses.
#[derive(Clone)]
pub struct RemoteAssociationStore {
    client: Client,
    base_url: String,
}

impl RemoteAssociationStore {
    pub fn new(base_url: &str) -> Result<Self, PolisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("polis-rm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PolisError::Storage(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PolisError::Storage(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/associations/{}", self.base_url, kind.as_str())
    }
}

impl AssociationStore for RemoteAssociationStore {
    fn create(&self, kind: EntityKind, assoc: &Association) -> Result<Association, PolisError> {
        let response = self
            .client
            .post(self.collection_url(kind))
            .json(assoc)
            .send()
            .map_err(|err| PolisError::Storage(err.to_string()))?;

        let status = response.status().as_u16();
        if status == 409 {
            return Err(PolisError::DuplicateAssociation {
                user_id: assoc.user_id.clone(),
                entity_id: assoc.entity_id.clone(),
            });
        }
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "association create failed".to_string());
            return Err(PolisError::StorageStatus { status, message });
        }

        response
            .json()
            .map_err(|err| PolisError::Storage(err.to_string()))
    }

    fn find_by_user(
        &self,
        kind: EntityKind,
        user_id: &str,
        country: Option<&CountryId>,
    ) -> Result<Vec<Association>, PolisError> {
        let mut request = self
            .client
            .get(self.collection_url(kind))
            .query(&[("user_id", user_id)]);
        if let Some(country) = country {
            request = request.query(&[("country_id", country.as_str())]);
        }

        let response = request
            .send()
            .map_err(|err| PolisError::Storage(err.to_string()))?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "association list failed".to_string());
            return Err(PolisError::StorageStatus { status, message });
        }

        response
            .json()
            .map_err(|err| PolisError::Storage(err.to_string()))
    }

    fn find_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Association>, PolisError> {
        let url = format!("{}/{}", self.collection_url(kind), id);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PolisError::Storage(err.to_string()))?;

        let status = response.status().as_u16();
        // Absence is a normal result, not a failure.
        if status == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "association lookup failed".to_string());
            return Err(PolisError::StorageStatus { status, message });
        }

        response
            .json()
            .map(Some)
            .map_err(|err| PolisError::Storage(err.to_string()))
    }
}
