// gpsh: Graph-Playground Shell (optional CLI front-end)
// Build with: cargo build --features cli --bin gpsh

use clap::{Arg, ArgAction, Command};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use graph_playground::backend::http::HttpBackend;
use graph_playground::backend::{self, GraphBackend};
use graph_playground::persistence::settings::{set_settings_override, AppSettings};
use graph_playground::session::{SessionId, SessionManager};

const HELP: &str = "Commands:
  tabs                 List open tabs (* marks the active one)
  new                  Open a new tab and switch to it
  switch <id>          Switch to tab <id>
  close <id>           Close tab <id>
  dbs                  List databases known to the backend
  use <url>            Select a database for the active tab and load its catalog
  labels               Show labels, relationship types and property keys
  search <text>        Categorized search over the active tab's catalog
  add <label> <n>      Add the n-th entity listed under <label> to the graph
  link <type> <n>      Add the n-th relationship listed under <type> to the graph
  info                 Summarize the active tab's graph
  :help or ?           Show this help
  quit / exit          Leave gpsh";

struct Shell {
    manager: SessionManager,
    backend: HttpBackend,
}

impl Shell {
    fn run(&mut self, line: &str) -> anyhow::Result<bool> {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else { return Ok(true) };
        let rest: Vec<&str> = parts.collect();
        match cmd.to_ascii_lowercase().as_str() {
            "quit" | "exit" | ":quit" => return Ok(false),
            ":help" | "?" | "help" => println!("{}", HELP),
            "tabs" => {
                for meta in self.manager.sessions() {
                    let marker = if meta.active { "*" } else { " " };
                    let db = meta.database.as_deref().unwrap_or("-");
                    println!("{} {:>3}  {:<10} {}", marker, meta.id, meta.title, db);
                }
                if self.manager.is_empty() {
                    println!("(no tabs)");
                }
            }
            "new" => {
                let id = self.manager.create_session();
                println!("opened tab {}", id);
            }
            "switch" => {
                let id = parse_id(&rest)?;
                match self.manager.switch_to(id) {
                    Ok(outcome) => {
                        for issue in outcome.recovered {
                            eprintln!("warning: {}", issue);
                        }
                    }
                    Err(e) => {
                        eprintln!("{}", e);
                        if let Some(active) = self.manager.active_id() {
                            let _ = self.manager.switch_to(active);
                        }
                    }
                }
            }
            "close" => {
                let id = parse_id(&rest)?;
                let outcome = self.manager.close_session(id)?;
                match outcome.active {
                    Some(a) => println!("closed {}, active tab is {}", id, a),
                    None => println!("closed {}, no tabs left", id),
                }
            }
            "dbs" => {
                for db in self.backend.list_databases()? {
                    println!("  {}", db.url);
                }
            }
            "use" => {
                let url = rest.first().ok_or_else(|| anyhow::anyhow!("usage: use <url>"))?;
                let Some(request) = self.manager.select_database(url) else {
                    anyhow::bail!("no active tab; run `new` first");
                };
                let manager = &mut self.manager;
                backend::run_catalog_fetch(&self.backend, &request, |ev| {
                    if let Err(e) = manager.apply_fetch(ev) {
                        eprintln!("warning: {}", e);
                    }
                    true
                });
                let catalog = self.manager.working().catalog();
                println!(
                    "loaded {} label(s), {} relationship type(s), {} property key(s)",
                    catalog.labels.len(),
                    catalog.relationship_types.len(),
                    catalog.property_keys.len()
                );
            }
            "labels" => {
                let catalog = self.manager.working().catalog();
                for label in &catalog.labels {
                    let n = catalog.node_entities.get(label).map(|v| v.len().to_string());
                    println!("  ({})  {}", label, n.as_deref().unwrap_or("not loaded"));
                }
                for t in &catalog.relationship_types {
                    let n = catalog.relationship_entities.get(t).map(|v| v.len().to_string());
                    println!("  [{}]  {}", t, n.as_deref().unwrap_or("not loaded"));
                }
                if !catalog.property_keys.is_empty() {
                    println!("  keys: {}", catalog.property_keys.join(", "));
                }
            }
            "search" => {
                let query = line.trim_start()[cmd.len()..].trim_start();
                let results = self.manager.working_mut().set_search_query(query);
                if results.is_empty() {
                    println!("no matches");
                }
                for hit in &results.node_matches {
                    println!("  node  {:<24} ({} #{})", hit.value, hit.source_key.as_deref().unwrap_or(""), hit.index);
                }
                for hit in &results.relationship_matches {
                    println!("  rel   {:<24} [{} #{}]", hit.value, hit.source_key.as_deref().unwrap_or(""), hit.index);
                }
                for hit in &results.property_key_matches {
                    println!("  key   {}", hit.value);
                }
            }
            "add" => {
                let (label, index) = parse_key_index(&rest)?;
                let node = self
                    .manager
                    .working()
                    .catalog()
                    .node_at(label, index)
                    .ok_or_else(|| anyhow::anyhow!("no usable entity {} #{}", label, index))?;
                let outcome = self.manager.working_mut().add_nodes([node]);
                if outcome.removed_nodes > 0 {
                    println!("already in graph");
                }
            }
            "link" => {
                let (rel_type, index) = parse_key_index(&rest)?;
                let rel = self
                    .manager
                    .working()
                    .catalog()
                    .relationship_at(rel_type, index)
                    .ok_or_else(|| anyhow::anyhow!("no usable relationship {} #{}", rel_type, index))?;
                let outcome = self.manager.working_mut().add_relationships([rel]);
                if outcome.removed_relationships > 0 {
                    println!("already in graph");
                }
            }
            "info" => {
                let summary = self.manager.working().summary();
                println!("{} node(s), {} relationship(s)", summary.node_count, summary.relationship_count);
                for (label, n) in &summary.nodes_by_label {
                    println!("  ({}) x{}", label, n);
                }
                for (t, n) in &summary.relationships_by_type {
                    println!("  [{}] x{}", t, n);
                }
            }
            other => eprintln!("unknown command '{}'; try :help", other),
        }
        Ok(true)
    }
}

fn parse_id(args: &[&str]) -> anyhow::Result<SessionId> {
    let raw = args.first().ok_or_else(|| anyhow::anyhow!("missing tab id"))?;
    raw.parse::<SessionId>().map_err(|e| anyhow::anyhow!("invalid tab id '{}': {}", raw, e))
}

fn parse_key_index<'a>(args: &[&'a str]) -> anyhow::Result<(&'a str, usize)> {
    match args {
        [key, n, ..] => Ok((*key, n.parse().map_err(|e| anyhow::anyhow!("invalid index '{}': {}", n, e))?)),
        _ => Err(anyhow::anyhow!("expected <name> <index>")),
    }
}

fn main() {
    env_logger::init();

    let matches = Command::new("gpsh")
        .about("Graph-Playground Shell: browse a graph backend from tabbed sessions")
        .arg(Arg::new("backend").long("backend").value_name("URL").help("Backend base URL (overrides settings)"))
        .arg(Arg::new("timeout").long("timeout").value_name("SECS").value_parser(clap::value_parser!(u64)).help("Request timeout in seconds"))
        .arg(Arg::new("eval").short('e').long("eval").value_name("COMMANDS").help("Run ';'-separated commands and exit"))
        .arg(Arg::new("quiet").short('q').long("quiet").action(ArgAction::SetTrue).help("Suppress banner/help text"))
        .get_matches();

    let mut settings = AppSettings::current();
    if let Some(url) = matches.get_one::<String>("backend") {
        settings.backend_base_url = url.clone();
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        settings.request_timeout_secs = *secs;
    }
    set_settings_override(settings);
    let settings = AppSettings::current();

    let backend = match HttpBackend::from_settings(&settings) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };
    let mut shell = Shell { manager: SessionManager::with_protocol(settings.default_protocol.clone()), backend };

    // One-off eval mode
    if let Some(script) = matches.get_one::<String>("eval") {
        for line in script.split(';').map(str::trim).filter(|l| !l.is_empty()) {
            match shell.run(line) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    eprintln!("error: {:#}", e);
                    std::process::exit(3);
                }
            }
        }
        return;
    }

    // Interactive mode with history
    let mut rl: Editor<(), DefaultHistory> = match Editor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("failed to initialize editor: {}", e);
            std::process::exit(1);
        }
    };
    let mut hist_path = AppSettings::settings_dir();
    hist_path.push("gpsh_history.txt");
    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or_else(|| std::path::Path::new(".")));
    let _ = rl.load_history(&hist_path);

    if !matches.get_flag("quiet") {
        eprintln!(
            "Backend {}.\nType :help for commands. History saved at {}.\n",
            settings.backend_base_url,
            hist_path.display()
        );
    }

    loop {
        let prompt = match shell.manager.active_id() {
            Some(id) => format!("gpsh[{}]> ", id),
            None => "gpsh> ".to_string(),
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() { continue; }
                rl.add_history_entry(input).ok();
                match shell.run(input) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) => { // Ctrl-C
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => { // Ctrl-D
                break;
            }
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);
}
