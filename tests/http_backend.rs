use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use graph_playground::backend::http::HttpBackend;
use graph_playground::backend::GraphBackend;

// One request as the stand-in service saw it.
#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    cookie: Option<String>,
    body: Value,
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn selected_db(cookie: Option<&str>) -> Option<String> {
    cookie?
        .split(';')
        .find_map(|kv| kv.trim().strip_prefix("sessionid="))
        .map(str::to_string)
}

// Mimics the playground service: the database lives in the session cookie.
fn answer(seen: &Seen) -> (Value, Option<String>) {
    if seen.path == "/get_user_databases/" {
        return (json!({"success": true, "databases": [{"url": "bolt://movies"}, {"url": "bolt://music"}]}), None);
    }
    if seen.path == "/select_database/" {
        let url = seen.body.get("selectedUrl").and_then(Value::as_str).unwrap_or("");
        let name = url.rsplit('/').next().unwrap_or("");
        return (json!({"success": true}), Some(format!("sessionid={}; Path=/", name)));
    }
    let Some(db) = selected_db(seen.cookie.as_deref()) else {
        return (json!({"success": false, "error": "no database selected"}), None);
    };
    let payload = match seen.path.as_str() {
        "/get_database_info/" => json!({
            "success": true,
            "labels": [db],
            "relationship_types": ["LINK"],
            "property_keys": ["name"]
        }),
        "/get_nodeEntities/" => {
            let label = seen.body.get("label").and_then(Value::as_str).unwrap_or("");
            if label == "Missing" {
                json!({"success": false, "error": "no such label"})
            } else {
                json!({"success": true, "nodeEntities": [[format!("{}:{}", db, label)], [{"id": 1}]]})
            }
        }
        "/get_relationshipEntities/" => {
            let rel_type = seen.body.get("type").and_then(Value::as_str).unwrap_or("");
            json!({"success": true, "relationshipEntities": [[[db, rel_type]], [{"startNode": 1, "endNode": 2}]]})
        }
        _ => json!({"success": false, "error": "unknown endpoint"}),
    };
    (payload, None)
}

fn handle(stream: TcpStream, log: Log) {
    let Ok(read_half) = stream.try_clone() else { return };
    let mut reader = BufReader::new(read_half);
    let mut out = stream;
    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
            return;
        }
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("").to_string();
        let path = parts.next().unwrap_or("").to_string();

        let mut len = 0usize;
        let mut cookie = None;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                return;
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                match name.to_ascii_lowercase().as_str() {
                    "content-length" => len = value.trim().parse().unwrap_or(0),
                    "cookie" => cookie = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        let mut raw = vec![0u8; len];
        if reader.read_exact(&mut raw).is_err() {
            return;
        }
        let body = serde_json::from_slice(&raw).unwrap_or(Value::Null);

        let seen = Seen { method, path, cookie, body };
        let (payload, set_cookie) = answer(&seen);
        log.lock().unwrap().push(seen);

        let text = payload.to_string();
        let mut head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n",
            text.len()
        );
        if let Some(c) = set_cookie {
            head.push_str(&format!("Set-Cookie: {}\r\n", c));
        }
        head.push_str("\r\n");
        if out.write_all(head.as_bytes()).and_then(|_| out.write_all(text.as_bytes())).is_err() {
            return;
        }
    }
}

fn serve() -> (String, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::default();
    let accept_log = Arc::clone(&log);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let log = Arc::clone(&accept_log);
            thread::spawn(move || handle(stream, log));
        }
    });
    (format!("http://{}", addr), log)
}

fn calls(log: &Log) -> Vec<String> {
    log.lock().unwrap().iter().map(|s| format!("{} {}", s.method, s.path)).collect()
}

#[test]
fn schema_read_selects_database_first_and_uses_session_cookie() {
    let (base, log) = serve();
    let backend = HttpBackend::new(&base, Some(Duration::from_secs(5))).unwrap();

    let schema = backend.list_schema("bolt://movies").unwrap();
    assert_eq!(schema.labels, vec!["movies"]);
    assert_eq!(schema.relationship_types, vec!["LINK"]);

    assert_eq!(calls(&log), vec!["POST /select_database/", "GET /get_database_info/"]);
    let seen = log.lock().unwrap().clone();
    assert_eq!(seen[0].body, json!({"selectedUrl": "bolt://movies"}));
    assert!(seen[1].cookie.as_deref().unwrap_or("").contains("sessionid=movies"));
}

#[test]
fn entity_reads_reselect_only_when_database_changes() {
    let (base, log) = serve();
    let backend = HttpBackend::new(&base, Some(Duration::from_secs(5))).unwrap();

    backend.list_schema("bolt://movies").unwrap();
    let people = backend.entities_for_label("bolt://movies", "Person").unwrap();
    assert_eq!(people.summaries, vec!["movies:Person"]);
    let links = backend.entities_for_type("bolt://movies", "LINK").unwrap();
    assert_eq!(links.summaries, vec![("movies".to_string(), "LINK".to_string())]);

    // another tab's fetch on a different database
    let artists = backend.entities_for_label("bolt://music", "Artist").unwrap();
    assert_eq!(artists.summaries, vec!["music:Artist"]);

    assert_eq!(
        calls(&log),
        vec![
            "POST /select_database/",
            "GET /get_database_info/",
            "POST /get_nodeEntities/",
            "POST /get_relationshipEntities/",
            "POST /select_database/",
            "POST /get_nodeEntities/",
        ]
    );
}

#[test]
fn failure_envelope_becomes_error_with_backend_message() {
    let (base, _log) = serve();
    let backend = HttpBackend::new(&base, Some(Duration::from_secs(5))).unwrap();

    let err = backend.entities_for_label("bolt://movies", "Missing").unwrap_err();
    assert!(format!("{:#}", err).contains("no such label"));
}

#[test]
fn database_list_comes_from_envelope() {
    let (base, _log) = serve();
    let backend = HttpBackend::new(&base, None).unwrap();
    let urls: Vec<String> = backend.list_databases().unwrap().into_iter().map(|d| d.url).collect();
    assert_eq!(urls, vec!["bolt://movies", "bolt://music"]);
}
