//! Atlas client tests against a scripted HTTP responder
#![cfg(feature = "atlas-client")]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lineage_ingest::catalog::{
    AtlasClient, CatalogClient, CatalogCredentials, CatalogEntity, CatalogError, EntityRef,
    EntityResolver, RetryPolicy,
};

/// Request as seen by the responder
#[derive(Debug, Clone)]
struct Seen {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Seen {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serves one scripted response per connection, in order
fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<Seen>>>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    let handle = thread::spawn(move || {
        for (status, body) in responses {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((k, v)) = line.split_once(':') {
                    headers.push((k.trim().to_string(), v.trim().to_string()));
                }
            }
            let length = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0);
            let mut body_bytes = vec![0; length];
            reader.read_exact(&mut body_bytes).unwrap();

            log.lock().unwrap().push(Seen {
                request_line: request_line.trim_end().to_string(),
                headers,
                body: String::from_utf8_lossy(&body_bytes).to_string(),
            });

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
            .unwrap();
            stream.flush().unwrap();
        }
    });

    (endpoint, seen, handle)
}

fn client(endpoint: &str) -> AtlasClient {
    AtlasClient::new(
        endpoint,
        CatalogCredentials::new("admin", "admin"),
        Duration::from_secs(5),
    )
    .unwrap()
    .with_retry_policy(RetryPolicy::default().with_initial_backoff(Duration::from_millis(1)))
}

const NOT_FOUND: &str = r#"{"errorCode":"ATLAS-404-00-009","errorMessage":"Instance hive_db with unique attribute {qualifiedName:sales@duckdb} does not exist"}"#;

const FOUND: &str = r#"{
    "referredEntities": {},
    "entity": {"typeName": "hive_db", "guid": "g-1", "status": "ACTIVE",
        "attributes": {"qualifiedName": "sales@duckdb", "name": "sales"}}
}"#;

const FOUND_DELETED: &str = r#"{
    "entity": {"typeName": "hive_db", "guid": "g-0", "status": "DELETED",
        "attributes": {"qualifiedName": "sales@duckdb"}}
}"#;

const CREATED: &str = r#"{
    "mutatedEntities": {"CREATE": [{"typeName": "hive_db", "guid": "g-new",
        "attributes": {"qualifiedName": "sales@duckdb"}}]},
    "guidAssignments": {"-1": "g-new"}
}"#;

const UPDATED: &str = r#"{
    "mutatedEntities": {"UPDATE": [{"typeName": "hive_db", "guid": "g-1",
        "attributes": {"qualifiedName": "sales@duckdb"}}]}
}"#;

fn db_entity() -> CatalogEntity {
    CatalogEntity::new("hive_db", "sales@duckdb")
        .with_attribute("name", "sales")
        .with_attribute("clusterName", "duckdb")
}

#[test]
fn test_get_entity_exact_match_and_basic_auth() {
    let (endpoint, seen, handle) = serve(vec![(200, FOUND)]);

    let found = client(&endpoint)
        .get_entity("hive_db", "sales@duckdb")
        .unwrap()
        .unwrap();
    handle.join().unwrap();

    assert_eq!(found.guid.as_deref(), Some("g-1"));
    assert_eq!(found.qualified_name, "sales@duckdb");

    let seen = seen.lock().unwrap();
    assert!(
        seen[0]
            .request_line
            .starts_with("GET /api/atlas/v2/entity/uniqueAttribute/type/hive_db?")
    );
    assert!(
        seen[0]
            .request_line
            .contains("attr%3AqualifiedName=sales%40duckdb")
    );
    // admin:admin
    assert_eq!(seen[0].header("authorization"), Some("Basic YWRtaW46YWRtaW4="));
}

#[test]
fn test_get_entity_absent() {
    let (endpoint, seen, handle) = serve(vec![(404, NOT_FOUND)]);

    let found = client(&endpoint).get_entity("hive_db", "sales@duckdb").unwrap();
    handle.join().unwrap();

    assert!(found.is_none());
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_get_entity_ignores_deleted() {
    let (endpoint, _, handle) = serve(vec![(200, FOUND_DELETED)]);

    let found = client(&endpoint).get_entity("hive_db", "sales@duckdb").unwrap();
    handle.join().unwrap();

    assert!(found.is_none());
}

#[test]
fn test_server_errors_are_retried() {
    let (endpoint, seen, handle) = serve(vec![
        (503, "unavailable"),
        (502, "bad gateway"),
        (200, FOUND),
    ]);

    let found = client(&endpoint).get_entity("hive_db", "sales@duckdb").unwrap();
    handle.join().unwrap();

    assert_eq!(found.unwrap().guid.as_deref(), Some("g-1"));
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[test]
fn test_retries_give_up_after_max_attempts() {
    let (endpoint, seen, handle) = serve(vec![(500, "a"), (500, "b"), (500, "c")]);

    let err = client(&endpoint)
        .get_entity("hive_db", "sales@duckdb")
        .unwrap_err();
    handle.join().unwrap();

    assert_eq!(
        err,
        CatalogError::Request {
            status: 500,
            body: "c".to_string()
        }
    );
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[test]
fn test_client_errors_are_not_retried() {
    let (endpoint, seen, handle) = serve(vec![(401, "unauthorized")]);

    let err = client(&endpoint)
        .get_entity("hive_db", "sales@duckdb")
        .unwrap_err();
    handle.join().unwrap();

    assert!(matches!(err, CatalogError::Request { status: 401, .. }));
    assert!(err.user_message().contains("Hint:"));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_create_entity_payload_and_guid() {
    let (endpoint, seen, handle) = serve(vec![(200, CREATED)]);

    let table = CatalogEntity::new("Table", "orders@sales@duckdb")
        .with_relationship("db", EntityRef::new("hive_db", "sales@duckdb"));
    let created = client(&endpoint).create_entity(&table).unwrap();
    handle.join().unwrap();

    assert_eq!(created.guid.as_deref(), Some("g-new"));

    let seen = seen.lock().unwrap();
    assert!(seen[0].request_line.starts_with("POST /api/atlas/v2/entity "));
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["entity"]["typeName"], "Table");
    assert_eq!(
        body["entity"]["attributes"]["qualifiedName"],
        "orders@sales@duckdb"
    );
    assert_eq!(
        body["entity"]["relationshipAttributes"]["db"]["uniqueAttributes"]["qualifiedName"],
        "sales@duckdb"
    );
}

#[test]
fn test_create_conflicts() {
    let (endpoint, _, handle) = serve(vec![(409, "{}"), (200, UPDATED)]);
    let client = client(&endpoint);

    let first = client.create_entity(&db_entity()).unwrap_err();
    let second = client.create_entity(&db_entity()).unwrap_err();
    handle.join().unwrap();

    assert!(matches!(first, CatalogError::Conflict { .. }));
    assert!(matches!(second, CatalogError::Conflict { .. }));
}

#[test]
fn test_resolver_rereads_after_conflict() {
    let (endpoint, seen, handle) = serve(vec![
        (404, NOT_FOUND),
        (409, "{}"),
        (200, FOUND),
    ]);
    let client = client(&endpoint);

    let resolved = EntityResolver::new(&client)
        .resolve_or_create(&db_entity())
        .unwrap();
    handle.join().unwrap();

    assert!(!resolved.was_created());
    assert_eq!(resolved.entity().guid.as_deref(), Some("g-1"));
    assert_eq!(seen.lock().unwrap().len(), 3);
}
