use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Color32, Stroke};

use crate::backend::{self, DatabaseEntry, FetchEvent, FetchEventKind, GraphBackend};
use crate::persistence::settings::AppSettings;
use crate::session::{SessionId, SessionManager};

const MAX_EVENTS_PER_FRAME: usize = 64;

// Style for toast notifications
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NoticeStyle {
    Subtle,
    Prominent,
}

// Everything a frame can ask for; applied after drawing so panels only
// ever read the session state.
#[derive(Clone, Debug, PartialEq)]
enum UiAction {
    NewTab,
    SwitchTo(SessionId),
    Close(SessionId),
    RefreshDatabases,
    ToggleDatabaseMenu,
    SelectDatabase(String),
    ToggleNodeLabels,
    ToggleRelationshipTypes,
    TogglePropertyKeys,
    ExpandLabel(String),
    ExpandType(String),
    AddNode { label: String, index: usize },
    AddRelationship { rel_type: String, index: usize },
    StageNode { label: String, index: usize },
    CommitBuffers,
    ClearSelection,
    Search(String),
}

pub struct PlaygroundApp {
    manager: SessionManager,
    backend: Arc<dyn GraphBackend>,
    settings: AppSettings,
    fetch_tx: Sender<FetchEvent>,
    fetch_rx: Receiver<FetchEvent>,
    fetches_in_flight: usize,
    databases: Vec<DatabaseEntry>,
    databases_rx: Option<Receiver<anyhow::Result<Vec<DatabaseEntry>>>>,
    database_menu_open: bool,
    // Mirrors the active tab's query; re-synced on every tab change
    search_text: String,
    last_notice: Option<String>,
    last_notice_time: Option<Instant>,
    last_notice_style: NoticeStyle,
}

// Connect URLs are listed without their scheme
fn display_url(url: &str) -> &str {
    ["neo4j+s://", "bolt+s://", "neo4j://", "bolt://"]
        .iter()
        .find_map(|p| url.strip_prefix(*p))
        .unwrap_or(url)
}

fn stamp_now() -> String {
    let now = time::OffsetDateTime::now_utc();
    let fmt = time::macros::format_description!("[hour]:[minute]:[second]");
    now.format(&fmt).unwrap_or_default()
}

impl PlaygroundApp {
    pub fn new(backend: Arc<dyn GraphBackend>, settings: AppSettings) -> Self {
        let (fetch_tx, fetch_rx) = backend::fetch_channel();
        let mut app = Self {
            manager: SessionManager::with_protocol(settings.default_protocol.clone()),
            backend,
            settings,
            fetch_tx,
            fetch_rx,
            fetches_in_flight: 0,
            databases: Vec::new(),
            databases_rx: None,
            database_menu_open: false,
            search_text: String::new(),
            last_notice: None,
            last_notice_time: None,
            last_notice_style: NoticeStyle::Subtle,
        };
        app.refresh_databases();
        app
    }

    fn notify(&mut self, msg: impl Into<String>, style: NoticeStyle) {
        self.last_notice = Some(format!("[{}] {}", stamp_now(), msg.into()));
        self.last_notice_time = Some(Instant::now());
        self.last_notice_style = style;
    }

    fn sync_search_text(&mut self) {
        self.search_text = self.manager.working().ui().search_query.clone();
    }

    fn refresh_databases(&mut self) {
        let (tx, rx) = std::sync::mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let spawned = std::thread::Builder::new()
            .name("list-databases".into())
            .spawn(move || {
                let _ = tx.send(backend.list_databases());
            });
        match spawned {
            Ok(_) => self.databases_rx = Some(rx),
            Err(e) => self.notify(format!("Could not list databases: {}", e), NoticeStyle::Prominent),
        }
    }

    fn poll_background(&mut self) {
        if let Some(rx) = &self.databases_rx
            && let Ok(res) = rx.try_recv()
        {
            self.databases_rx = None;
            match res {
                Ok(dbs) => self.databases = dbs,
                Err(e) => {
                    log::error!("list_databases failed: {:#}", e);
                    self.notify(format!("Error fetching databases: {}", e), NoticeStyle::Prominent);
                }
            }
        }

        let mut processed = 0;
        while let Ok(ev) = self.fetch_rx.try_recv() {
            if matches!(ev.kind, FetchEventKind::Finished | FetchEventKind::SchemaFailed { .. }) {
                self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);
            }
            if let Err(e) = self.manager.apply_fetch(ev) {
                self.notify(e.to_string(), NoticeStyle::Prominent);
            }
            processed += 1;
            if processed >= MAX_EVENTS_PER_FRAME { break; }
        }
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::NewTab => {
                self.manager.create_session();
                self.sync_search_text();
            }
            UiAction::SwitchTo(id) => {
                match self.manager.switch_to(id) {
                    Ok(outcome) => {
                        for issue in outcome.recovered {
                            self.notify(issue.to_string(), NoticeStyle::Subtle);
                        }
                    }
                    Err(e) => {
                        self.notify(e.to_string(), NoticeStyle::Prominent);
                        // put the previous tab back on screen
                        if let Some(active) = self.manager.active_id() {
                            let _ = self.manager.switch_to(active);
                        }
                    }
                }
                self.sync_search_text();
            }
            UiAction::Close(id) => {
                if let Err(e) = self.manager.close_session(id) {
                    self.notify(e.to_string(), NoticeStyle::Prominent);
                }
                self.sync_search_text();
            }
            UiAction::RefreshDatabases => self.refresh_databases(),
            UiAction::ToggleDatabaseMenu => self.database_menu_open = !self.database_menu_open,
            UiAction::SelectDatabase(url) => {
                let Some(request) = self.manager.select_database(&url) else {
                    self.notify("Open a tab before selecting a database", NoticeStyle::Subtle);
                    return;
                };
                match backend::spawn_catalog_fetch(Arc::clone(&self.backend), request, self.fetch_tx.clone()) {
                    Ok(_) => self.fetches_in_flight += 1,
                    Err(e) => self.notify(format!("Could not start fetch: {}", e), NoticeStyle::Prominent),
                }
            }
            UiAction::ToggleNodeLabels => self.manager.working_mut().toggle_node_labels(),
            UiAction::ToggleRelationshipTypes => self.manager.working_mut().toggle_relationship_types(),
            UiAction::TogglePropertyKeys => self.manager.working_mut().toggle_property_keys(),
            UiAction::ExpandLabel(label) => { self.manager.working_mut().toggle_expanded_label(&label); }
            UiAction::ExpandType(rel_type) => { self.manager.working_mut().toggle_expanded_type(&rel_type); }
            UiAction::AddNode { label, index } => {
                match self.manager.working().catalog().node_at(&label, index) {
                    Some(node) => { self.manager.working_mut().add_nodes([node]); }
                    None => self.notify(format!("No usable detail for {} #{}", label, index), NoticeStyle::Subtle),
                }
            }
            UiAction::StageNode { label, index } => {
                if let Some(node) = self.manager.working().catalog().node_at(&label, index) {
                    self.manager.working_mut().stage_nodes([node]);
                }
            }
            UiAction::AddRelationship { rel_type, index } => {
                match self.manager.working().catalog().relationship_at(&rel_type, index) {
                    Some(rel) => { self.manager.working_mut().add_relationships([rel]); }
                    None => self.notify(format!("No usable detail for {} #{}", rel_type, index), NoticeStyle::Subtle),
                }
            }
            UiAction::CommitBuffers => { self.manager.working_mut().commit_buffers(); }
            UiAction::ClearSelection => self.manager.working_mut().clear_selection(),
            UiAction::Search(q) => { self.manager.working_mut().set_search_query(q); }
        }
    }

    fn draw_tab_bar(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Graph-Playground").strong());
            ui.separator();
            for meta in self.manager.sessions() {
                let title = match &meta.database {
                    Some(db) => format!("{} · {}", meta.title, display_url(db)),
                    None => meta.title.clone(),
                };
                if ui.selectable_label(meta.active, title).clicked() && !meta.active {
                    actions.push(UiAction::SwitchTo(meta.id));
                }
                if ui.small_button("×").on_hover_text("Close tab").clicked() {
                    actions.push(UiAction::Close(meta.id));
                }
            }
            if ui.button("+").on_hover_text("New tab").clicked() {
                actions.push(UiAction::NewTab);
            }
        });
    }

    fn draw_sidebar(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let has_tab = self.manager.active_id().is_some();
        let working = self.manager.working();
        let selected_db = working.connection().selected_database.clone();

        ui.horizontal(|ui| {
            let caret = if self.database_menu_open { "▾" } else { "▸" };
            if ui.button(format!("{} Use database", caret)).clicked() {
                actions.push(UiAction::ToggleDatabaseMenu);
            }
            if ui.small_button("⟳").on_hover_text("Reload database list").clicked() {
                actions.push(UiAction::RefreshDatabases);
            }
        });
        if self.database_menu_open {
            if self.databases.is_empty() {
                ui.weak(if self.databases_rx.is_some() { "Loading…" } else { "No databases" });
            }
            for db in &self.databases {
                let is_sel = selected_db.as_deref() == Some(db.url.as_str());
                ui.add_enabled_ui(has_tab, |ui| {
                    if ui.selectable_label(is_sel, display_url(&db.url)).clicked() {
                        actions.push(UiAction::SelectDatabase(db.url.clone()));
                    }
                });
            }
        }
        if self.fetches_in_flight > 0 {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.weak("Loading catalog…");
            });
        }
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("🔍");
            let resp = ui.add(egui::TextEdit::singleline(&mut self.search_text).hint_text("Search for..."));
            if resp.changed() {
                actions.push(UiAction::Search(self.search_text.clone()));
            }
        });
        ui.separator();

        let catalog = working.catalog();
        let ui_state = working.ui();
        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            let labels = egui::CollapsingHeader::new(format!("Node Labels ({})", catalog.labels.len()))
                .id_salt("node_labels")
                .open(Some(ui_state.node_labels_open))
                .show(ui, |ui| {
                    for label in &catalog.labels {
                        let expanded = ui_state.expanded_label.as_deref() == Some(label.as_str());
                        if ui.selectable_label(expanded, label.as_str()).clicked() {
                            actions.push(UiAction::ExpandLabel(label.clone()));
                        }
                        if !expanded { continue; }
                        ui.indent(("label_entities", label), |ui| {
                            match catalog.node_entities.get(label) {
                                None => { ui.weak("Loading…"); }
                                Some(list) if list.is_empty() => { ui.weak("(none)"); }
                                Some(list) => {
                                    for (index, summary) in list.iter().enumerate() {
                                        ui.horizontal(|ui| {
                                            if ui.small_button("+").on_hover_text("Add to graph").clicked() {
                                                actions.push(UiAction::AddNode { label: label.clone(), index });
                                            }
                                            if ui.small_button("⤓").on_hover_text("Stage for filtering").clicked() {
                                                actions.push(UiAction::StageNode { label: label.clone(), index });
                                            }
                                            ui.label(summary.as_str());
                                        });
                                    }
                                }
                            }
                        });
                    }
                });
            if labels.header_response.clicked() {
                actions.push(UiAction::ToggleNodeLabels);
            }

            let types = egui::CollapsingHeader::new(format!("Relationship Types ({})", catalog.relationship_types.len()))
                .id_salt("relationship_types")
                .open(Some(ui_state.relationship_types_open))
                .show(ui, |ui| {
                    for rel_type in &catalog.relationship_types {
                        let expanded = ui_state.expanded_type.as_deref() == Some(rel_type.as_str());
                        if ui.selectable_label(expanded, rel_type.as_str()).clicked() {
                            actions.push(UiAction::ExpandType(rel_type.clone()));
                        }
                        if !expanded { continue; }
                        ui.indent(("type_entities", rel_type), |ui| {
                            match catalog.relationship_entities.get(rel_type) {
                                None => { ui.weak("Loading…"); }
                                Some(list) if list.is_empty() => { ui.weak("(none)"); }
                                Some(list) => {
                                    for (index, (from, to)) in list.iter().enumerate() {
                                        ui.horizontal(|ui| {
                                            if ui.small_button("+").on_hover_text("Add to graph").clicked() {
                                                actions.push(UiAction::AddRelationship { rel_type: rel_type.clone(), index });
                                            }
                                            ui.label(format!("{} → {}", from, to));
                                        });
                                    }
                                }
                            }
                        });
                    }
                });
            if types.header_response.clicked() {
                actions.push(UiAction::ToggleRelationshipTypes);
            }

            let keys = egui::CollapsingHeader::new(format!("Property Keys ({})", catalog.property_keys.len()))
                .id_salt("property_keys")
                .open(Some(ui_state.property_keys_open))
                .show(ui, |ui| {
                    for key in &catalog.property_keys {
                        ui.label(key.as_str());
                    }
                });
            if keys.header_response.clicked() {
                actions.push(UiAction::TogglePropertyKeys);
            }
        });
    }

    fn draw_results(&self, ui: &mut egui::Ui) {
        let ui_state = self.manager.working().ui();
        if ui_state.search_query.trim().is_empty() {
            return;
        }
        let results = &ui_state.search_results;
        ui.heading(format!("Search results ({})", results.total()));
        if results.is_empty() {
            ui.weak("No matches");
        }
        if !results.node_matches.is_empty() {
            ui.collapsing(format!("Nodes ({})", results.node_matches.len()), |ui| {
                for hit in &results.node_matches {
                    ui.label(format!("{}  ·  {}", hit.value, hit.source_key.as_deref().unwrap_or("")));
                }
            });
        }
        if !results.relationship_matches.is_empty() {
            ui.collapsing(format!("Relationships ({})", results.relationship_matches.len()), |ui| {
                for hit in &results.relationship_matches {
                    let (from, to) = &hit.entity;
                    ui.label(format!("{} → {}  ·  {}", from, to, hit.source_key.as_deref().unwrap_or("")));
                }
            });
        }
        if !results.property_key_matches.is_empty() {
            ui.collapsing(format!("Property keys ({})", results.property_key_matches.len()), |ui| {
                for hit in &results.property_key_matches {
                    ui.label(hit.value.as_str());
                }
            });
        }
        ui.separator();
    }

    fn draw_selection(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let working = self.manager.working();
        let Some(selection) = working.ready_selection() else {
            ui.weak("Reconciling selection…");
            return;
        };
        let summary = selection.summary();
        ui.heading("Graph");
        ui.label(format!("{} node(s), {} relationship(s)", summary.node_count, summary.relationship_count));
        for (label, n) in &summary.nodes_by_label {
            ui.label(format!("  {}: {}", label, n));
        }
        for (rel_type, n) in &summary.relationships_by_type {
            ui.label(format!("  [{}]: {}", rel_type, n));
        }

        ui.horizontal(|ui| {
            let staged = selection.node_buffer.len() + selection.relationship_buffer.len();
            if ui.add_enabled(staged > 0, egui::Button::new(format!("Commit staged ({})", staged))).clicked() {
                actions.push(UiAction::CommitBuffers);
            }
            if ui.button("Clear").clicked() {
                actions.push(UiAction::ClearSelection);
            }
        });
        ui.separator();

        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            for node in &selection.nodes {
                let mut props: Vec<String> = node.properties.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                props.sort();
                ui.label(format!("({}:{}) {{{}}}", node.id, node.label, props.join(", ")));
            }
            for rel in &selection.relationships {
                ui.label(format!("({})-[:{}]->({})", rel.start_node, rel.rel_type, rel.end_node));
            }
        });
    }

    fn draw_toast(&self, ctx: &egui::Context) {
        let (Some(msg), Some(when)) = (&self.last_notice, self.last_notice_time) else { return };
        if Instant::now().duration_since(when) > self.settings.toast_duration() {
            return;
        }
        let margin = egui::vec2(12.0, 12.0);
        egui::Area::new("bottom_right_toast".into())
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-margin.x, -margin.y))
            .interactable(false)
            .show(ctx, |ui| {
                let (fill, stroke_col, stroke_w, text_col) = match self.last_notice_style {
                    NoticeStyle::Subtle => (
                        Color32::from_rgba_premultiplied(20, 20, 20, 170),
                        Color32::from_gray(60),
                        0.5,
                        Color32::from_gray(200),
                    ),
                    NoticeStyle::Prominent => (
                        Color32::from_rgba_premultiplied(30, 30, 30, 230),
                        Color32::from_gray(100),
                        1.5,
                        Color32::LIGHT_RED,
                    ),
                };
                egui::Frame::popup(ui.style())
                    .corner_radius(egui::CornerRadius::same(8))
                    .stroke(Stroke { width: stroke_w, color: stroke_col })
                    .fill(fill)
                    .inner_margin(egui::Margin::symmetric(10, 6))
                    .show(ui, |ui| {
                        ui.colored_label(text_col, msg.as_str());
                    });
            });
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

impl eframe::App for PlaygroundApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_background();
        if !self.manager.working().readiness().is_ready() {
            self.manager.working_mut().reconcile();
        }
        if self.fetches_in_flight > 0 || self.databases_rx.is_some() {
            ctx.request_repaint_after(Duration::from_millis(150));
        }

        let mut actions: Vec<UiAction> = Vec::new();

        egui::TopBottomPanel::top("tab_bar").show(ctx, |ui| {
            self.draw_tab_bar(ui, &mut actions);
        });

        egui::SidePanel::left("catalog_panel")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                self.draw_sidebar(ui, &mut actions);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.manager.active_id().is_none() {
                ui.centered_and_justified(|ui| {
                    ui.weak("No open tabs. Press + to start one.");
                });
                return;
            }
            self.draw_results(ui);
            self.draw_selection(ui, &mut actions);
        });

        self.draw_toast(ctx);

        for action in actions {
            self.apply(action);
        }
    }
}
