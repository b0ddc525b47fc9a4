//! REST store adapter (blocking reqwest, no Tokio runtime required).
//!
//! Wire contract:
//! - `GET  {base}/health`                  → any 2xx means reachable
//! - `GET  {base}/me`                      → `{ "name", "role" }`; 401/404 means no actor
//! - `GET  {base}/{collection}?limit=N`    → array, or `{ "data": [...] }`
//! - `PUT  {base}/{collection}/{id}`       → JSON object of the normalized fields
//!
//! Records carry their key as `id` or `_id` (string or number). Every other
//! top-level field is kept as-is.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde_json::{Map, Value};

use rollbook_migrate::model::{Actor, NormalizedFields};
use rollbook_migrate::{EntitySource, EntityType, Preflight, Record, StoreError, Updater};

const USER_AGENT: &str = concat!("rollbook/", env!("CARGO_PKG_VERSION"));

pub struct HttpStore {
    http: Client,
    base: Url,
    token: Option<String>,
    page_size: u32,
}

impl HttpStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Network(format!("failed to build HTTP client: {e}")))?;
        let base = Url::parse(base_url)
            .map_err(|e| StoreError::Parse(format!("invalid base URL '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Parse(format!("invalid base URL '{base_url}'")));
        }

        Ok(Self {
            http,
            base,
            token,
            page_size: 10_000,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// `{base}/{segments...}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Always Ok: `new` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, StoreError> {
        self.authorized(req)
            .send()
            .map_err(|e| StoreError::Network(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

/// Pull a human-readable message out of an error body.
/// Shapes seen in the wild: `{"message": ".."}`, `{"error": ".."}`,
/// `{"error": {"message": ".."}}`.
fn extract_error_message(body: &Value, status: u16) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("request failed")
                .to_string()
        })
}

/// Map a non-2xx response to a `StoreError`. `id` is the record a write
/// targeted, if any; 404 on a write means the record is gone.
fn status_error(resp: Response, id: Option<&str>) -> StoreError {
    let status = resp.status().as_u16();
    let body: Value = resp.json().unwrap_or(Value::Null);
    let message = extract_error_message(&body, status);
    match (status, id) {
        (404, Some(id)) => StoreError::NotFound { id: id.to_string() },
        (400 | 422, _) => StoreError::Rejected(message),
        _ => StoreError::Http { status, message },
    }
}

fn record_from_value(value: Value) -> Result<Record, StoreError> {
    let Value::Object(mut object) = value else {
        return Err(StoreError::Parse("record is not a JSON object".into()));
    };
    let raw_id = object
        .remove("id")
        .or_else(|| object.remove("_id"))
        .ok_or_else(|| StoreError::Parse("record has no id".into()))?;
    object.remove("_id");
    let id = match raw_id {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => return Err(StoreError::Parse(format!("unsupported record id: {other}"))),
    };
    Ok(Record {
        id,
        fields: object,
    })
}

fn records_from_body(body: Value) -> Result<Vec<Record>, StoreError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Err(StoreError::Parse("expected an array or {\"data\": [...]}".into())),
        },
        _ => return Err(StoreError::Parse("expected an array or {\"data\": [...]}".into())),
    };
    items.into_iter().map(record_from_value).collect()
}

fn actor_from_body(body: &Value) -> Result<Actor, StoreError> {
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Parse("identity has no name".into()))?;
    let role = body.get("role").and_then(Value::as_str).unwrap_or_default();
    Ok(Actor {
        name: name.to_string(),
        role: role.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl EntitySource for HttpStore {
    fn fetch_all(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError> {
        let url = self.url(&[entity_type.collection()]);
        let resp = self.send(
            self.http
                .get(url)
                .query(&[("limit", self.page_size.to_string())]),
        )?;
        if !resp.status().is_success() {
            return Err(status_error(resp, None));
        }
        let body: Value = resp.json().map_err(|e| StoreError::Parse(e.to_string()))?;
        let records = records_from_body(body)?;
        tracing::debug!(collection = entity_type.collection(), count = records.len(), "fetched");
        Ok(records)
    }
}

impl Updater for HttpStore {
    fn apply(
        &self,
        entity_type: EntityType,
        id: &str,
        fields: &NormalizedFields,
    ) -> Result<(), StoreError> {
        let url = self.url(&[entity_type.collection(), id]);
        let body: Map<String, Value> = fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let resp = self.send(self.http.put(url).json(&body))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(status_error(resp, Some(id)))
        }
    }
}

impl Preflight for HttpStore {
    fn is_reachable(&self) -> bool {
        match self.send(self.http.get(self.url(&["health"]))) {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "health check failed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "health check failed");
                false
            }
        }
    }

    fn current_actor(&self) -> Result<Option<Actor>, StoreError> {
        let resp = self.send(self.http.get(self.url(&["me"])))?;
        match resp.status().as_u16() {
            401 | 404 => Ok(None),
            s if (200..300).contains(&s) => {
                let body: Value = resp.json().map_err(|e| StoreError::Parse(e.to_string()))?;
                actor_from_body(&body).map(Some)
            }
            _ => Err(status_error(resp, None)),
        }
    }
}
