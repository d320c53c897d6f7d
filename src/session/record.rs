use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph_utils::graph::GraphSelection;
use super::catalog::EntityCatalog;
use super::working::UiState;

pub type SessionId = u32;

pub const DEFAULT_PROTOCOL: &str = "bolt://";

/// Where a session points: the connect form values plus the database the
/// user picked for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default = "ConnectionInfo::default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub connect_url: String,
    #[serde(default)]
    pub selected_database: Option<String>,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            protocol: Self::default_protocol(),
            connect_url: String::new(),
            selected_database: None,
        }
    }
}

impl ConnectionInfo {
    pub(crate) fn default_protocol() -> String { DEFAULT_PROTOCOL.to_string() }

    pub fn full_url(&self) -> String {
        format!("{}{}", self.protocol, self.connect_url)
    }
}

/// Snapshot of one tab. While a tab is active its truth lives in the
/// working state; the record is only rewritten on write-back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub connection: ConnectionInfo,
    #[serde(default)]
    pub graph: GraphSelection,
    #[serde(default)]
    pub catalog: EntityCatalog,
    #[serde(default)]
    pub ui: UiState,
}

impl SessionRecord {
    pub fn empty(id: SessionId) -> Self {
        Self {
            id,
            title: format!("Tab {}", id),
            connection: ConnectionInfo::default(),
            graph: GraphSelection::default(),
            catalog: EntityCatalog::default(),
            ui: UiState::default(),
        }
    }
}

/// What the tab bar needs to draw one tab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionMeta {
    pub id: SessionId,
    pub title: String,
    pub active: bool,
    pub database: Option<String>,
}

/// Ordered records plus the active id. `active` is `None` only when there
/// are no records, otherwise it names one of them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionCollection {
    records: Vec<SessionRecord>,
    active: Option<SessionId>,
}

impl SessionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn active_id(&self) -> Option<SessionId> { self.active }
    pub fn records(&self) -> &[SessionRecord] { &self.records }

    pub fn get(&self, id: SessionId) -> Option<&SessionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut SessionRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_some()
    }

    // max(existing) + 1, or 1 for an empty collection. Past SessionId::MAX
    // the lowest unused id is handed out instead.
    pub fn next_id(&self) -> SessionId {
        match self.records.iter().map(|r| r.id).max() {
            None => 1,
            Some(max) => max.checked_add(1).unwrap_or_else(|| self.lowest_free_id()),
        }
    }

    fn lowest_free_id(&self) -> SessionId {
        let used: HashSet<SessionId> = self.records.iter().map(|r| r.id).collect();
        (1..=SessionId::MAX)
            .chain(std::iter::once(0))
            .find(|id| !used.contains(id))
            .unwrap_or_default()
    }

    pub fn first_id(&self) -> Option<SessionId> {
        self.records.first().map(|r| r.id)
    }

    pub(crate) fn push(&mut self, record: SessionRecord) {
        self.records.push(record);
    }

    pub(crate) fn remove(&mut self, id: SessionId) -> Option<SessionRecord> {
        let idx = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(idx))
    }

    // Only ids present in the collection (or None when empty) are accepted.
    pub(crate) fn set_active(&mut self, id: Option<SessionId>) -> bool {
        match id {
            Some(id) if !self.contains(id) => false,
            None if !self.records.is_empty() => false,
            _ => {
                self.active = id;
                true
            }
        }
    }
}
