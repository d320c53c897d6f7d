use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

use crate::session::catalog::{LabelEntities, SchemaListing, TypeEntities};
use crate::session::record::SessionId;

pub mod http;

/// A connection target known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub url: String,
}

/// Read side of the graph-data service, per selected database.
pub trait GraphBackend: Send + Sync {
    fn list_databases(&self) -> anyhow::Result<Vec<DatabaseEntry>>;
    fn list_schema(&self, database: &str) -> anyhow::Result<SchemaListing>;
    fn entities_for_label(&self, database: &str, label: &str) -> anyhow::Result<LabelEntities>;
    fn entities_for_type(&self, database: &str, rel_type: &str) -> anyhow::Result<TypeEntities>;
}

/// A catalog load the session manager asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub session: SessionId,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchEventKind {
    Schema(SchemaListing),
    LabelEntities { label: String, entities: LabelEntities },
    TypeEntities { rel_type: String, entities: TypeEntities },
    SchemaFailed { reason: String },
    EntityFailed { key: String, reason: String },
    Finished,
}

/// One backend result, tagged with the tab and database it was fetched for.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchEvent {
    pub session: SessionId,
    pub database: String,
    pub kind: FetchEventKind,
}

// Called by the GUI/shell when starting up to create the event pair
pub fn fetch_channel() -> (Sender<FetchEvent>, Receiver<FetchEvent>) {
    std::sync::mpsc::channel()
}

/// Load schema, then every label's and every type's entities, emitting
/// each result as soon as it is known. `emit` returning false (receiver
/// gone) stops the run early.
///
/// A failed label/type fetch is reported and skipped; a failed schema
/// fetch ends the run since there is nothing to iterate.
pub fn run_catalog_fetch(
    backend: &dyn GraphBackend,
    request: &FetchRequest,
    mut emit: impl FnMut(FetchEvent) -> bool,
) {
    let mut event = |kind: FetchEventKind| {
        emit(FetchEvent { session: request.session, database: request.database.clone(), kind })
    };

    let schema = match backend.list_schema(&request.database) {
        Ok(s) => s,
        Err(e) => {
            log::error!("list_schema({}) failed: {:#}", request.database, e);
            event(FetchEventKind::SchemaFailed { reason: format!("{:#}", e) });
            return;
        }
    };
    let labels = schema.labels.clone();
    let types = schema.relationship_types.clone();
    if !event(FetchEventKind::Schema(schema)) { return; }

    for label in labels {
        let kind = match backend.entities_for_label(&request.database, &label) {
            Ok(entities) => FetchEventKind::LabelEntities { label, entities },
            Err(e) => {
                log::error!("entities_for_label({}) failed: {:#}", label, e);
                FetchEventKind::EntityFailed { key: label, reason: format!("{:#}", e) }
            }
        };
        if !event(kind) { return; }
    }
    for rel_type in types {
        let kind = match backend.entities_for_type(&request.database, &rel_type) {
            Ok(entities) => FetchEventKind::TypeEntities { rel_type, entities },
            Err(e) => {
                log::error!("entities_for_type({}) failed: {:#}", rel_type, e);
                FetchEventKind::EntityFailed { key: rel_type, reason: format!("{:#}", e) }
            }
        };
        if !event(kind) { return; }
    }
    event(FetchEventKind::Finished);
}

/// Same as `run_catalog_fetch`, on a background thread feeding `tx`.
pub fn spawn_catalog_fetch(
    backend: Arc<dyn GraphBackend>,
    request: FetchRequest,
    tx: Sender<FetchEvent>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("catalog-fetch-{}", request.session))
        .spawn(move || {
            log::debug!("fetching catalog for session {} from {}", request.session, request.database);
            run_catalog_fetch(backend.as_ref(), &request, |ev| tx.send(ev).is_ok());
        })
}
