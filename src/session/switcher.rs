//! Tab lifecycle: write-back, reset, hydrate.
//!
//! `SessionManager` owns the record collection and the single working
//! state. Every operation here runs to completion before returning, so a
//! caller driving it from one UI thread never observes a half-switched
//! state.

use crate::backend::{FetchEvent, FetchEventKind, FetchRequest};
use super::error::SessionError;
use super::record::{SessionCollection, SessionId, SessionMeta, SessionRecord, DEFAULT_PROTOCOL};
use super::search;
use super::working::WorkingState;

/// Where a tab operation left things.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SwitchOutcome {
    pub active: Option<SessionId>,
    /// Sub-fields that failed validation on hydrate and were reset.
    pub recovered: Vec<SessionError>,
}

#[derive(Debug)]
pub struct SessionManager {
    sessions: SessionCollection,
    working: WorkingState,
    // False after a failed switch: the working state was reset and no
    // longer mirrors the active record, so write-back must skip it.
    attached: bool,
    // Protocol preselected in the connect form of tabs minted here.
    default_protocol: String,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

enum Route {
    Working,
    Record,
}

impl SessionManager {
    /// One empty "Tab 1", active.
    pub fn new() -> Self {
        Self::with_protocol(DEFAULT_PROTOCOL)
    }

    /// Like `new`, with `protocol` preselected in every tab this manager
    /// creates.
    pub fn with_protocol(protocol: impl Into<String>) -> Self {
        let mut manager = Self::empty();
        manager.default_protocol = protocol.into();
        manager.open_fresh(1);
        manager
    }

    /// No tabs at all.
    pub fn empty() -> Self {
        Self {
            sessions: SessionCollection::new(),
            working: WorkingState::new(),
            attached: false,
            default_protocol: DEFAULT_PROTOCOL.to_string(),
        }
    }

    pub fn default_protocol(&self) -> &str { &self.default_protocol }

    /// Applies to tabs created from now on; existing records keep theirs.
    pub fn set_default_protocol(&mut self, protocol: impl Into<String>) {
        self.default_protocol = protocol.into();
    }

    // Append an empty record, make it active and mirror its connection in
    // the (already reset) working state.
    fn open_fresh(&mut self, id: SessionId) {
        let mut record = SessionRecord::empty(id);
        record.connection.protocol = self.default_protocol.clone();
        self.working.set_connect_form(record.connection.protocol.clone(), "");
        self.sessions.push(record);
        self.sessions.set_active(Some(id));
        self.attached = true;
    }

    /// Rebuild from previously captured records (e.g. deserialized JSON),
    /// activating the first. Records repeating an earlier id are skipped.
    pub fn from_records(records: impl IntoIterator<Item = SessionRecord>) -> (Self, SwitchOutcome) {
        let mut manager = Self::empty();
        for record in records {
            if manager.sessions.contains(record.id) {
                log::warn!("skipping duplicate session id {}", record.id);
                continue;
            }
            manager.sessions.push(record);
        }
        let outcome = match manager.sessions.first_id() {
            Some(first) => manager.hydrate(first).unwrap_or_default(),
            None => SwitchOutcome::default(),
        };
        (manager, outcome)
    }

    pub fn active_id(&self) -> Option<SessionId> { self.sessions.active_id() }
    pub fn len(&self) -> usize { self.sessions.len() }
    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }
    pub fn collection(&self) -> &SessionCollection { &self.sessions }
    pub fn working(&self) -> &WorkingState { &self.working }
    pub fn working_mut(&mut self) -> &mut WorkingState { &mut self.working }

    /// Stored snapshot. For the active session this is whatever was last
    /// written back; the live view is `working()`.
    pub fn record(&self, id: SessionId) -> Option<&SessionRecord> {
        self.sessions.get(id)
    }

    /// Tab bar entries in display order.
    pub fn sessions(&self) -> Vec<SessionMeta> {
        let active = self.sessions.active_id();
        self.sessions
            .records()
            .iter()
            .map(|r| {
                let is_active = Some(r.id) == active;
                let database = if is_active && self.attached {
                    self.working.connection().selected_database.clone()
                } else {
                    r.connection.selected_database.clone()
                };
                SessionMeta { id: r.id, title: r.title.clone(), active: is_active, database }
            })
            .collect()
    }

    // Step 1 + 2: move the working state into the active record, leaving
    // it reset. With nothing attached this is just the reset.
    fn write_back(&mut self) {
        if let Some(active) = self.sessions.active_id()
            && self.attached
            && let Some(record) = self.sessions.get_mut(active)
        {
            self.working.write_back(record);
        } else {
            self.working.reset();
        }
        self.attached = false;
    }

    // Step 3 + 4.
    fn hydrate(&mut self, id: SessionId) -> Result<SwitchOutcome, SessionError> {
        let Some(record) = self.sessions.get(id) else {
            log::warn!("switch aborted: session {} not found", id);
            return Err(SessionError::SessionNotFound(id));
        };
        let recovered = self.working.hydrate(record);
        self.sessions.set_active(Some(id));
        self.attached = true;
        Ok(SwitchOutcome { active: Some(id), recovered })
    }

    /// Save the active tab, then load `id` into the working state.
    ///
    /// If `id` does not exist the working state stays reset and the active
    /// id is unchanged; `switch_to(active)` restores it.
    pub fn switch_to(&mut self, id: SessionId) -> Result<SwitchOutcome, SessionError> {
        let from = self.sessions.active_id();
        self.write_back();
        let outcome = self.hydrate(id)?;
        log::info!("switched session {:?} -> {}", from, id);
        Ok(outcome)
    }

    /// Append a fresh tab and make it active. Returns its id.
    pub fn create_session(&mut self) -> SessionId {
        self.write_back();
        let id = self.sessions.next_id();
        self.open_fresh(id);
        log::info!("created session {}", id);
        id
    }

    pub fn close_session(&mut self, id: SessionId) -> Result<SwitchOutcome, SessionError> {
        if !self.sessions.contains(id) {
            log::warn!("close aborted: session {} not found", id);
            return Err(SessionError::SessionNotFound(id));
        }
        let was_active = self.sessions.active_id() == Some(id);
        if was_active {
            self.write_back();
        }
        self.sessions.remove(id);
        log::info!("closed session {}", id);

        if !was_active {
            return Ok(SwitchOutcome { active: self.sessions.active_id(), recovered: Vec::new() });
        }
        match self.sessions.first_id() {
            Some(next) => self.hydrate(next),
            None => {
                self.sessions.set_active(None);
                self.working.reset();
                Ok(SwitchOutcome::default())
            }
        }
    }

    /// Point the active tab at `url` and describe the fetch that should
    /// follow. `None` when no tab is active.
    pub fn select_database(&mut self, url: &str) -> Option<FetchRequest> {
        let session = self.sessions.active_id()?;
        if !self.attached {
            return None;
        }
        self.working.select_database(url);
        log::info!("session {} selected database {}", session, url);
        Some(FetchRequest { session, database: url.to_string() })
    }

    fn route(&self, session: SessionId, database: &str) -> Option<Route> {
        let is_active = self.sessions.active_id() == Some(session) && self.attached;
        let selected = if is_active {
            self.working.connection().selected_database.as_deref()
        } else {
            self.sessions.get(session)?.connection.selected_database.as_deref()
        };
        if selected != Some(database) {
            return None;
        }
        Some(if is_active { Route::Working } else { Route::Record })
    }

    /// Merge one backend result into whichever place currently owns the
    /// session's catalog. Results for closed tabs or for a database the tab
    /// has since moved away from are dropped.
    pub fn apply_fetch(&mut self, event: FetchEvent) -> Result<(), SessionError> {
        let FetchEvent { session, database, kind } = event;
        let Some(route) = self.route(session, &database) else {
            log::debug!("dropping stale fetch result for session {} ({})", session, database);
            return Ok(());
        };

        match kind {
            FetchEventKind::SchemaFailed { reason } => {
                log::warn!("schema fetch failed for session {}: {}", session, reason);
                return Err(SessionError::SchemaFetchFailed { session, database, reason });
            }
            FetchEventKind::EntityFailed { key, reason } => {
                log::warn!("entity fetch for `{}` failed in session {}: {}", key, session, reason);
                return Err(SessionError::EntityFetchFailed { session, key, reason });
            }
            FetchEventKind::Finished => {
                log::debug!("catalog fetch finished for session {}", session);
                return Ok(());
            }
            _ => {}
        }

        match route {
            Route::Working => {
                let w = &mut self.working;
                match kind {
                    FetchEventKind::Schema(listing) => w.apply_schema(listing),
                    FetchEventKind::LabelEntities { label, entities } => w.merge_label_entities(&label, entities),
                    FetchEventKind::TypeEntities { rel_type, entities } => w.merge_type_entities(&rel_type, entities),
                    _ => {}
                }
            }
            Route::Record => {
                let Some(record) = self.sessions.get_mut(session) else { return Ok(()) };
                match kind {
                    FetchEventKind::Schema(listing) => record.catalog.apply_schema(listing),
                    FetchEventKind::LabelEntities { label, entities } => record.catalog.merge_label_entities(&label, entities),
                    FetchEventKind::TypeEntities { rel_type, entities } => record.catalog.merge_type_entities(&rel_type, entities),
                    _ => {}
                }
                record.ui.search_results = search::search(&record.ui.search_query, &record.catalog);
            }
        }
        log::debug!("merged fetch result into session {}", session);
        Ok(())
    }
}
