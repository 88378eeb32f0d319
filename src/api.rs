use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::{CountryId, EntityKind};
use crate::error::PolisError;

/// Entity fetch boundary. Implementations return the raw wire record; the
/// adapters own its interpretation. Absence is an error here (`NotFound`), not
/// a `None` — unlike association stores, a dangling entity reference is never
/// a normal state.
pub trait ApiClient: Send + Sync {
    fn fetch_entity(
        &self,
        kind: EntityKind,
        country: &CountryId,
        id: &str,
    ) -> Result<serde_json::Value, PolisError>;
}

#[derive(Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(base_url: &str) -> Result<Self, PolisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("polis-rm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PolisError::ApiHttp(err.to_string()))?,
        );
        headers.insert("X-Client", HeaderValue::from_static("polis-rm"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PolisError::ApiHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn entity_url(&self, kind: EntityKind, country: &CountryId, id: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, country, kind.as_str(), id)
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, PolisError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, "retrying api request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(PolisError::ApiHttp(err.to_string()));
                }
            }
        }
    }
}

impl ApiClient for HttpApiClient {
    fn fetch_entity(
        &self,
        kind: EntityKind,
        country: &CountryId,
        id: &str,
    ) -> Result<serde_json::Value, PolisError> {
        let url = self.entity_url(kind, country, id);
        let response = self.send_with_retries(|| self.client.get(&url))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(PolisError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "api request failed".to_string());
            return Err(PolisError::ApiStatus { status, message });
        }

        let body: serde_json::Value = response
            .json()
            .map_err(|err| PolisError::ApiHttp(err.to_string()))?;
        // Some deployments wrap records in a result envelope.
        Ok(body.get("result").cloned().unwrap_or(body))
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
