use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;

use graph_playground::backend::{
    fetch_channel, run_catalog_fetch, spawn_catalog_fetch, DatabaseEntry, FetchEvent, FetchEventKind, FetchRequest,
    GraphBackend,
};
use graph_playground::session::catalog::{LabelEntities, SchemaListing, TypeEntities};
use graph_playground::session::{SessionError, SessionManager};

// In-memory backend: one database, optional failing keys.
struct Scripted {
    database: String,
    schema: SchemaListing,
    labels: HashMap<String, LabelEntities>,
    types: HashMap<String, TypeEntities>,
    failing: HashSet<String>,
    schema_down: bool,
}

impl Scripted {
    fn movies() -> Self {
        let mut labels = HashMap::new();
        labels.insert(
            "Person".to_string(),
            LabelEntities {
                summaries: vec!["Keanu".into(), "Carrie".into()],
                details: vec![json!({"id": 1}), json!({"id": 2})],
            },
        );
        labels.insert(
            "Movie".to_string(),
            LabelEntities { summaries: vec!["The Matrix".into()], details: vec![json!({"id": 10})] },
        );
        let mut types = HashMap::new();
        types.insert(
            "ACTED_IN".to_string(),
            TypeEntities {
                summaries: vec![("Person".into(), "Movie".into())],
                details: vec![json!({"startNode": 1, "endNode": 10})],
            },
        );
        Scripted {
            database: "bolt://movies".into(),
            schema: SchemaListing {
                labels: vec!["Person".into(), "Movie".into()],
                relationship_types: vec!["ACTED_IN".into()],
                property_keys: vec!["name".into(), "title".into()],
            },
            labels,
            types,
            failing: HashSet::new(),
            schema_down: false,
        }
    }
}

impl GraphBackend for Scripted {
    fn list_databases(&self) -> anyhow::Result<Vec<DatabaseEntry>> {
        Ok(vec![DatabaseEntry { url: self.database.clone() }])
    }

    fn list_schema(&self, database: &str) -> anyhow::Result<SchemaListing> {
        if self.schema_down || database != self.database {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.schema.clone())
    }

    fn entities_for_label(&self, _database: &str, label: &str) -> anyhow::Result<LabelEntities> {
        if self.failing.contains(label) {
            return Err(anyhow!("timed out"));
        }
        Ok(self.labels.get(label).cloned().unwrap_or_default())
    }

    fn entities_for_type(&self, _database: &str, rel_type: &str) -> anyhow::Result<TypeEntities> {
        if self.failing.contains(rel_type) {
            return Err(anyhow!("timed out"));
        }
        Ok(self.types.get(rel_type).cloned().unwrap_or_default())
    }
}

fn collect(backend: &Scripted, request: &FetchRequest) -> Vec<FetchEvent> {
    let mut events = Vec::new();
    run_catalog_fetch(backend, request, |ev| {
        events.push(ev);
        true
    });
    events
}

fn apply_all(manager: &mut SessionManager, events: Vec<FetchEvent>) -> Vec<SessionError> {
    events.into_iter().filter_map(|ev| manager.apply_fetch(ev).err()).collect()
}

#[test]
fn fetch_emits_schema_then_entities_then_finished() {
    let backend = Scripted::movies();
    let request = FetchRequest { session: 1, database: "bolt://movies".into() };
    let events = collect(&backend, &request);

    assert_eq!(events.len(), 5);
    assert!(events.iter().all(|e| e.session == 1 && e.database == "bolt://movies"));
    assert!(matches!(events[0].kind, FetchEventKind::Schema(_)));
    assert!(matches!(&events[1].kind, FetchEventKind::LabelEntities { label, .. } if label == "Person"));
    assert!(matches!(&events[2].kind, FetchEventKind::LabelEntities { label, .. } if label == "Movie"));
    assert!(matches!(&events[3].kind, FetchEventKind::TypeEntities { rel_type, .. } if rel_type == "ACTED_IN"));
    assert_eq!(events[4].kind, FetchEventKind::Finished);
}

#[test]
fn emit_returning_false_stops_the_run() {
    let backend = Scripted::movies();
    let request = FetchRequest { session: 1, database: "bolt://movies".into() };
    let mut seen = 0;
    run_catalog_fetch(&backend, &request, |_| {
        seen += 1;
        false
    });
    assert_eq!(seen, 1);
}

#[test]
fn select_database_then_fetch_fills_working_catalog() {
    let backend = Scripted::movies();
    let mut m = SessionManager::new();
    m.working_mut().set_search_query("matrix");
    let request = m.select_database("bolt://movies").expect("active tab");
    assert_eq!(request, FetchRequest { session: 1, database: "bolt://movies".into() });

    let errors = apply_all(&mut m, collect(&backend, &request));
    assert!(errors.is_empty());

    let catalog = m.working().catalog();
    assert_eq!(catalog.labels, vec!["Person", "Movie"]);
    assert!(catalog.is_label_loaded("Person") && catalog.is_type_loaded("ACTED_IN"));
    // the query typed before the fetch is re-evaluated as data lands
    assert_eq!(m.working().ui().search_results.node_matches.len(), 1);
    assert_eq!(m.sessions()[0].database.as_deref(), Some("bolt://movies"));
}

#[test]
fn merge_is_order_independent_and_idempotent() {
    let backend = Scripted::movies();

    let mut forward = SessionManager::new();
    let req = forward.select_database("bolt://movies").unwrap();
    let events = collect(&backend, &req);
    apply_all(&mut forward, events.clone());

    let mut shuffled = SessionManager::new();
    shuffled.select_database("bolt://movies").unwrap();
    // schema first, then entity results reversed and repeated
    let mut replay = vec![events[0].clone()];
    replay.extend(events[1..].iter().rev().cloned());
    replay.extend(events[1..].iter().cloned());
    apply_all(&mut shuffled, replay);

    assert_eq!(forward.working().catalog(), shuffled.working().catalog());
}

#[test]
fn results_for_an_inactive_tab_land_in_its_record() {
    let backend = Scripted::movies();
    let mut m = SessionManager::new();
    let request = m.select_database("bolt://movies").unwrap();
    let events = collect(&backend, &request);

    // user opens another tab while the fetch is in flight
    m.create_session();
    assert!(apply_all(&mut m, events).is_empty());

    assert!(m.working().catalog().is_empty());
    let stored = &m.record(1).expect("tab 1").catalog;
    assert_eq!(stored.node_entities.get("Person").map(Vec::len), Some(2));

    m.switch_to(1).unwrap();
    assert!(m.working().catalog().is_type_loaded("ACTED_IN"));
}

#[test]
fn results_for_closed_tab_or_replaced_database_are_dropped() {
    let backend = Scripted::movies();
    let mut m = SessionManager::new();
    let stale = collect(&backend, &m.select_database("bolt://movies").unwrap());

    // database changed before results arrived
    m.select_database("bolt://other").unwrap();
    assert!(apply_all(&mut m, stale.clone()).is_empty());
    assert!(m.working().catalog().is_empty());

    // tab closed before results arrived
    m.create_session();
    m.close_session(1).unwrap();
    assert!(apply_all(&mut m, stale).is_empty());
    assert!(m.working().catalog().is_empty());
    assert!(m.record(1).is_none());
}

#[test]
fn failed_entity_fetch_leaves_key_unloaded() {
    let mut backend = Scripted::movies();
    backend.failing.insert("Movie".into());
    let mut m = SessionManager::new();
    let request = m.select_database("bolt://movies").unwrap();

    let errors = apply_all(&mut m, collect(&backend, &request));
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], SessionError::EntityFetchFailed { session: 1, key, .. } if key == "Movie"));

    let catalog = m.working().catalog();
    assert!(catalog.has_label("Movie"));
    assert!(!catalog.is_label_loaded("Movie"));
    assert!(catalog.is_label_loaded("Person"));
    assert!(catalog.is_type_loaded("ACTED_IN"));
}

#[test]
fn failed_schema_fetch_keeps_selection_and_empty_catalog() {
    let mut backend = Scripted::movies();
    backend.schema_down = true;
    let mut m = SessionManager::new();
    let request = m.select_database("bolt://movies").unwrap();

    let events = collect(&backend, &request);
    assert_eq!(events.len(), 1);
    let errors = apply_all(&mut m, events);
    assert!(matches!(&errors[..], [SessionError::SchemaFetchFailed { session: 1, .. }]));
    assert!(m.working().catalog().is_empty());
    assert_eq!(m.working().connection().selected_database.as_deref(), Some("bolt://movies"));
}

#[test]
fn background_fetch_delivers_over_channel() {
    let backend: Arc<dyn GraphBackend> = Arc::new(Scripted::movies());
    let mut m = SessionManager::new();
    let request = m.select_database("bolt://movies").unwrap();

    let (tx, rx) = fetch_channel();
    let handle = spawn_catalog_fetch(backend, request, tx).expect("spawn");
    handle.join().expect("fetch thread");

    let events: Vec<FetchEvent> = rx.try_iter().collect();
    assert_eq!(events.last().map(|e| &e.kind), Some(&FetchEventKind::Finished));
    assert!(apply_all(&mut m, events).is_empty());
    assert_eq!(m.working().catalog().node_entities.len(), 2);
}
