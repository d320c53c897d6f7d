//! The live, mutable projection of the active session.
//!
//! Renderer, search box and filtering panel all read and write this one
//! aggregate. It is moved out wholesale into the session record on a
//! switch and rebuilt from the target record, so nothing in it survives a
//! switch boundary.

use serde::{Deserialize, Serialize};

use crate::graph_utils::dedupe::{self, Readiness, ReconcileOutcome};
use crate::graph_utils::graph::{GraphSelection, GraphSummary, Node, Relationship};
use super::catalog::{EntityCatalog, LabelEntities, SchemaListing, TypeEntities};
use super::error::SessionError;
use super::record::{ConnectionInfo, SessionRecord};
use super::search::{self, SearchResults};

/// Panel expansion flags and the search box.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    #[serde(default)]
    pub node_labels_open: bool,
    #[serde(default)]
    pub relationship_types_open: bool,
    #[serde(default)]
    pub property_keys_open: bool,
    #[serde(default)]
    pub expanded_label: Option<String>,
    #[serde(default)]
    pub expanded_type: Option<String>,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub search_results: SearchResults,
}

#[derive(Debug)]
pub struct WorkingState {
    connection: ConnectionInfo,
    graph: GraphSelection,
    catalog: EntityCatalog,
    ui: UiState,
    readiness: Readiness,
}

impl Default for WorkingState {
    fn default() -> Self {
        Self {
            connection: ConnectionInfo::default(),
            graph: GraphSelection::default(),
            catalog: EntityCatalog::default(),
            ui: UiState::default(),
            readiness: Readiness::Ready,
        }
    }
}

impl WorkingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> &ConnectionInfo { &self.connection }
    pub fn graph(&self) -> &GraphSelection { &self.graph }
    pub fn catalog(&self) -> &EntityCatalog { &self.catalog }
    pub fn ui(&self) -> &UiState { &self.ui }
    pub fn readiness(&self) -> Readiness { self.readiness }

    /// True when the state is indistinguishable from a freshly opened tab.
    pub fn is_pristine(&self) -> bool {
        self.connection == ConnectionInfo::default()
            && self.graph.is_empty()
            && self.catalog.is_empty()
            && self.ui == UiState::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Move everything into `record` and leave `self` reset.
    pub(crate) fn write_back(&mut self, record: &mut SessionRecord) {
        let taken = std::mem::take(self);
        record.connection = taken.connection;
        record.graph = taken.graph;
        record.catalog = taken.catalog;
        record.ui = taken.ui;
    }

    /// Copy every stored field of `record` in. Inconsistent sub-fields are
    /// replaced by their empty default and reported; the rest still loads.
    pub(crate) fn hydrate(&mut self, record: &SessionRecord) -> Vec<SessionError> {
        let mut malformed = Vec::new();
        self.connection = record.connection.clone();
        self.graph = record.graph.clone();
        self.catalog = record.catalog.clone();
        self.ui = record.ui.clone();

        let mut flag = |field: &'static str| {
            log::warn!("session {}: resetting malformed field `{}`", record.id, field);
            malformed.push(SessionError::MalformedRecord { session: record.id, field });
        };

        if self.connection.selected_database.as_deref().is_some_and(|db| db.trim().is_empty()) {
            self.connection.selected_database = None;
            flag("connection.selected_database");
        }
        if self.ui.expanded_label.as_deref().is_some_and(|l| !self.catalog.has_label(l)) {
            self.ui.expanded_label = None;
            flag("ui.expanded_label");
        }
        if self.ui.expanded_type.as_deref().is_some_and(|t| !self.catalog.has_type(t)) {
            self.ui.expanded_type = None;
            flag("ui.expanded_type");
        }
        if self.ui.search_query.trim().is_empty() && !self.ui.search_results.is_empty() {
            self.ui.search_results = SearchResults::default();
            flag("ui.search_results");
        }

        self.readiness = Readiness::NotReady;
        self.reconcile();
        malformed
    }

    // --- selection: renderer and filtering panel ---

    /// The selection, but only once it is known to be duplicate free.
    pub fn ready_selection(&self) -> Option<&GraphSelection> {
        self.readiness.is_ready().then_some(&self.graph)
    }

    /// Raw access for the filtering panel. Marks the selection not ready
    /// until the next `reconcile`.
    pub fn selection_mut(&mut self) -> &mut GraphSelection {
        self.readiness = Readiness::NotReady;
        &mut self.graph
    }

    pub fn reconcile(&mut self) -> ReconcileOutcome {
        let outcome = dedupe::reconcile(&mut self.graph);
        self.readiness = Readiness::Ready;
        outcome
    }

    pub fn add_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) -> ReconcileOutcome {
        self.selection_mut().nodes.extend(nodes);
        self.reconcile()
    }

    pub fn add_relationships(&mut self, rels: impl IntoIterator<Item = Relationship>) -> ReconcileOutcome {
        self.selection_mut().relationships.extend(rels);
        self.reconcile()
    }

    pub fn set_nodes(&mut self, nodes: Vec<Node>) -> ReconcileOutcome {
        self.selection_mut().nodes = nodes;
        self.reconcile()
    }

    pub fn set_relationships(&mut self, rels: Vec<Relationship>) -> ReconcileOutcome {
        self.selection_mut().relationships = rels;
        self.reconcile()
    }

    pub fn stage_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.graph.node_buffer.extend(nodes);
    }

    pub fn stage_relationships(&mut self, rels: impl IntoIterator<Item = Relationship>) {
        self.graph.relationship_buffer.extend(rels);
    }

    pub fn set_node_buffer(&mut self, nodes: Vec<Node>) {
        self.graph.node_buffer = nodes;
    }

    pub fn set_relationship_buffer(&mut self, rels: Vec<Relationship>) {
        self.graph.relationship_buffer = rels;
    }

    // Reconciles even with empty buffers: an earlier `selection_mut` may
    // have left the selection unsettled.
    pub fn commit_buffers(&mut self) -> ReconcileOutcome {
        if !self.graph.commit_buffers() {
            log::debug!("commit with empty buffers");
        }
        self.reconcile()
    }

    pub fn clear_selection(&mut self) {
        self.graph = GraphSelection::default();
        self.readiness = Readiness::Ready;
    }

    pub fn summary(&self) -> GraphSummary {
        self.graph.summary()
    }

    // --- connection + catalog ---

    pub fn set_connect_form(&mut self, protocol: impl Into<String>, connect_url: impl Into<String>) {
        self.connection.protocol = protocol.into();
        self.connection.connect_url = connect_url.into();
    }

    /// Point the session at a new database. The old catalog and anything
    /// derived from it is dropped; the query text survives and is
    /// re-evaluated as entities arrive.
    pub(crate) fn select_database(&mut self, url: &str) {
        self.connection.selected_database = Some(url.to_string());
        self.catalog = EntityCatalog::default();
        self.ui.expanded_label = None;
        self.ui.expanded_type = None;
        self.ui.search_results = SearchResults::default();
    }

    pub fn apply_schema(&mut self, schema: SchemaListing) {
        self.catalog.apply_schema(schema);
        if self.ui.expanded_label.as_deref().is_some_and(|l| !self.catalog.has_label(l)) {
            self.ui.expanded_label = None;
        }
        if self.ui.expanded_type.as_deref().is_some_and(|t| !self.catalog.has_type(t)) {
            self.ui.expanded_type = None;
        }
        self.refresh_search();
    }

    pub fn merge_label_entities(&mut self, label: &str, entities: LabelEntities) {
        self.catalog.merge_label_entities(label, entities);
        self.refresh_search();
    }

    pub fn merge_type_entities(&mut self, rel_type: &str, entities: TypeEntities) {
        self.catalog.merge_type_entities(rel_type, entities);
        self.refresh_search();
    }

    // --- panels + search ---

    pub fn toggle_node_labels(&mut self) {
        self.ui.node_labels_open = !self.ui.node_labels_open;
    }

    pub fn toggle_relationship_types(&mut self) {
        self.ui.relationship_types_open = !self.ui.relationship_types_open;
    }

    pub fn toggle_property_keys(&mut self) {
        self.ui.property_keys_open = !self.ui.property_keys_open;
    }

    // Clicking the expanded label collapses it; unknown labels are ignored.
    pub fn toggle_expanded_label(&mut self, label: &str) -> bool {
        if self.ui.expanded_label.as_deref() == Some(label) {
            self.ui.expanded_label = None;
            return true;
        }
        if !self.catalog.has_label(label) {
            return false;
        }
        self.ui.expanded_label = Some(label.to_string());
        true
    }

    pub fn toggle_expanded_type(&mut self, rel_type: &str) -> bool {
        if self.ui.expanded_type.as_deref() == Some(rel_type) {
            self.ui.expanded_type = None;
            return true;
        }
        if !self.catalog.has_type(rel_type) {
            return false;
        }
        self.ui.expanded_type = Some(rel_type.to_string());
        true
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) -> &SearchResults {
        self.ui.search_query = query.into();
        self.refresh_search();
        &self.ui.search_results
    }

    fn refresh_search(&mut self) {
        self.ui.search_results = search::search(&self.ui.search_query, &self.catalog);
    }
}
