//! REST client for the playground backend service.
//!
//! The service keeps the selected database in its session cookie:
//! `select_database/` must be posted before `get_database_info/` and the
//! entity reads. Answers come wrapped as
//! `{ "success": bool, "error": ..., ...payload }`.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

use super::{DatabaseEntry, GraphBackend};
use crate::persistence::settings::AppSettings;
use crate::session::catalog::{LabelEntities, SchemaListing, TypeEntities};

pub struct HttpBackend {
    client: Client,
    base: Url,
    // Database the cookie session currently points at. Held across a
    // select + read so fetches for different tabs cannot interleave.
    selected: Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct DatabasesBody {
    #[serde(default)]
    databases: Vec<DatabaseEntry>,
}

#[derive(Deserialize)]
struct NodeEntitiesBody {
    #[serde(rename = "nodeEntities")]
    node_entities: (Vec<String>, Vec<Value>),
}

#[derive(Deserialize)]
struct RelationshipEntitiesBody {
    #[serde(rename = "relationshipEntities")]
    relationship_entities: (Vec<(String, String)>, Vec<Value>),
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') { base_url.to_string() } else { format!("{}/", base_url) };
        let base = Url::parse(&normalized).with_context(|| format!("invalid backend url '{}'", base_url))?;
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| anyhow!("failed to build http client: {e}"))?;
        Ok(Self { client, base, selected: Mutex::new(None) })
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        Self::new(&settings.backend_base_url, Some(settings.request_timeout()))
    }

    pub fn base_url(&self) -> &Url { &self.base }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).with_context(|| format!("bad endpoint path '{}'", path))
    }

    pub(crate) fn unwrap_envelope<T: DeserializeOwned>(url: &Url, v: Value) -> Result<T> {
        let ok = v.get("success").and_then(Value::as_bool).unwrap_or(false);
        if !ok {
            let msg = v
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("backend reported failure without a message");
            return Err(anyhow!("{}: {}", url, msg));
        }
        serde_json::from_value(v).with_context(|| format!("unexpected response shape from {}", url))
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| anyhow!("failed to reach backend at {url}: {e}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {}", url, status));
        }
        let v: Value = resp.json().with_context(|| format!("invalid JSON from {}", url))?;
        Self::unwrap_envelope(&url, v)
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = self.endpoint(path)?;
        let resp = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .map_err(|e| anyhow!("failed to reach backend at {url}: {e}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {}", url, status));
        }
        let v: Value = resp.json().with_context(|| format!("invalid JSON from {}", url))?;
        Self::unwrap_envelope(&url, v)
    }
}

impl HttpBackend {
    // Run `read` with the cookie session pointed at `database`. `force`
    // re-selects even when it already is, which doubles as a reconnect.
    fn with_database<T>(&self, database: &str, force: bool, read: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut selected = self.selected.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if force || selected.as_deref() != Some(database) {
            *selected = None;
            let _: Value = self.post("select_database/", &json!({ "selectedUrl": database }))?;
            log::debug!("backend session now on {}", database);
            *selected = Some(database.to_string());
        }
        read()
    }
}

pub(crate) fn decode_node_entities(v: Value) -> Result<LabelEntities> {
    let body: NodeEntitiesBody = serde_json::from_value(v).context("malformed nodeEntities")?;
    let (summaries, details) = body.node_entities;
    Ok(LabelEntities { summaries, details })
}

pub(crate) fn decode_relationship_entities(v: Value) -> Result<TypeEntities> {
    let body: RelationshipEntitiesBody =
        serde_json::from_value(v).context("malformed relationshipEntities")?;
    let (summaries, details) = body.relationship_entities;
    Ok(TypeEntities { summaries, details })
}

impl GraphBackend for HttpBackend {
    fn list_databases(&self) -> Result<Vec<DatabaseEntry>> {
        let body: DatabasesBody = self.get("get_user_databases/")?;
        Ok(body.databases)
    }

    fn list_schema(&self, database: &str) -> Result<SchemaListing> {
        self.with_database(database, true, || self.get("get_database_info/"))
    }

    fn entities_for_label(&self, database: &str, label: &str) -> Result<LabelEntities> {
        self.with_database(database, false, || {
            decode_node_entities(self.post("get_nodeEntities/", &json!({ "label": label }))?)
        })
    }

    fn entities_for_type(&self, database: &str, rel_type: &str) -> Result<TypeEntities> {
        self.with_database(database, false, || {
            decode_relationship_entities(self.post("get_relationshipEntities/", &json!({ "type": rel_type }))?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://localhost:8000/get_nodeEntities/").unwrap()
    }

    #[test]
    fn envelope_failure_carries_backend_message() {
        let v = json!({ "success": false, "error": "no database selected" });
        let err = HttpBackend::unwrap_envelope::<Value>(&url(), v).unwrap_err();
        assert!(format!("{:#}", err).contains("no database selected"));

        let missing = HttpBackend::unwrap_envelope::<Value>(&url(), json!({ "labels": [] }));
        assert!(missing.is_err());
    }

    #[test]
    fn envelope_success_yields_payload() {
        let v = json!({ "success": true, "labels": ["Person"], "relationship_types": [], "property_keys": ["name"] });
        let schema: SchemaListing = HttpBackend::unwrap_envelope(&url(), v).unwrap();
        assert_eq!(schema.labels, vec!["Person"]);
        assert_eq!(schema.property_keys, vec!["name"]);
    }

    #[test]
    fn node_entities_decode_from_summary_detail_pair() {
        let v = json!({
            "success": true,
            "nodeEntities": [["Keanu", "Carrie"], [{ "id": 1 }, { "id": 2 }]]
        });
        let e = decode_node_entities(v).unwrap();
        assert_eq!(e.summaries, vec!["Keanu", "Carrie"]);
        assert_eq!(e.details[1], json!({ "id": 2 }));

        assert!(decode_node_entities(json!({ "nodeEntities": ["Keanu"] })).is_err());
    }

    #[test]
    fn relationship_entities_decode_endpoint_pairs() {
        let v = json!({
            "relationshipEntities": [[["Person", "Movie"]], [{ "startNode": 1, "endNode": 10 }]]
        });
        let e = decode_relationship_entities(v).unwrap();
        assert_eq!(e.summaries, vec![("Person".to_string(), "Movie".to_string())]);
        assert_eq!(e.details.len(), 1);
    }
}
