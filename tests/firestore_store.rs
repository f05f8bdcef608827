//! Firestore REST contract tests.
//!
//! A wiremock server stands in for the Firestore endpoint so the exact
//! requests the registry sends (paths, update masks, preconditions, query
//! bodies) can be asserted without an emulator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hookgate::models::UserRecord;
use hookgate::store::{AccessTokenSource, FirestoreStore, StaticToken, StoreError, UserStore};

const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

fn store_with(server: &MockServer, auth: Option<Arc<dyn AccessTokenSource>>) -> FirestoreStore {
    FirestoreStore::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        "demo",
        "users",
        auth,
    )
    .unwrap()
}

fn store(server: &MockServer, access_token: Option<&str>) -> FirestoreStore {
    store_with(
        server,
        access_token.map(|t| Arc::new(StaticToken::new(t)) as Arc<dyn AccessTokenSource>),
    )
}

/// Hands out a new token on every call, like a provider crossing expiry.
struct RotatingToken {
    issued: AtomicUsize,
}

#[async_trait]
impl AccessTokenSource for RotatingToken {
    async fn access_token(&self) -> Result<String, StoreError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ya29.gen{}", n))
    }
}

/// Credentials that cannot be obtained at all.
struct NoCredentials;

#[async_trait]
impl AccessTokenSource for NoCredentials {
    async fn access_token(&self) -> Result<String, StoreError> {
        Err(StoreError::Auth("metadata server unreachable".into()))
    }
}

fn doc(token: &str, name: &str, admin: Option<bool>) -> serde_json::Value {
    let mut fields = json!({ "Name": { "stringValue": name } });
    if let Some(admin) = admin {
        fields["Admin"] = json!({ "booleanValue": admin });
    }
    json!({
        "name": format!("projects/demo/databases/(default)/documents/users/{}", token),
        "fields": fields,
    })
}

#[tokio::test]
async fn test_get_by_token_reads_the_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/abc123", DOCS)))
        .and(header("authorization", "Bearer ya29.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc("abc123", "alice", Some(true))))
        .expect(1)
        .mount(&server)
        .await;

    let record = store(&server, Some("ya29.test"))
        .get_by_token("abc123")
        .await
        .unwrap();
    assert_eq!(record, Some(UserRecord::admin("abc123", "alice")));
}

#[tokio::test]
async fn test_missing_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" }
        })))
        .mount(&server)
        .await;

    assert_eq!(store(&server, None).get_by_token("gone").await.unwrap(), None);
}

#[tokio::test]
async fn test_server_error_is_not_mistaken_for_absence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "backend unavailable", "status": "UNAVAILABLE" }
        })))
        .mount(&server)
        .await;

    let err = store(&server, None).get_by_token("abc123").await.unwrap_err();
    match err {
        StoreError::Status { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "backend unavailable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_or_replace_writes_both_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/users/tok1", DOCS)))
        .and(body_json(json!({
            "fields": {
                "Name": { "stringValue": "bob" },
                "Admin": { "booleanValue": false }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc("tok1", "bob", Some(false))))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, None)
        .create_or_replace(&UserRecord::new("tok1", "bob"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_find_all_by_name_runs_an_equality_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .and(body_json(json!({
            "structuredQuery": {
                "from": [{ "collectionId": "users" }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "Name" },
                        "op": "EQUAL",
                        "value": { "stringValue": "bob" }
                    }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "document": doc("t1", "bob", None), "readTime": "2024-01-01T00:00:00Z" },
            { "document": doc("t2", "bob", Some(true)), "readTime": "2024-01-01T00:00:00Z" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut records = store(&server, None).find_all_by_name("bob").await.unwrap();
    records.sort_by(|a, b| a.token.cmp(&b.token));
    assert_eq!(
        records,
        vec![UserRecord::new("t1", "bob"), UserRecord::admin("t2", "bob")]
    );
}

#[tokio::test]
async fn test_empty_query_result_has_only_read_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "readTime": "2024-01-01T00:00:00Z" }])),
        )
        .mount(&server)
        .await;

    assert!(store(&server, None)
        .find_all_by_name("nobody")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_promote_updates_only_the_admin_field() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/users/t1", DOCS)))
        .and(query_param("updateMask.fieldPaths", "Admin"))
        .and(query_param("currentDocument.exists", "true"))
        .and(body_json(json!({ "fields": { "Admin": { "booleanValue": true } } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc("t1", "bob", Some(true))))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store(&server, None).update_admin_flag("t1", true).await.unwrap());
}

#[tokio::test]
async fn test_promote_of_vanished_record_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(!store(&server, None).update_admin_flag("t1", true).await.unwrap());
}

#[tokio::test]
async fn test_delete_by_name_deletes_each_match() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "document": doc("t1", "bob", None) },
            { "document": doc("t2", "bob", None) }
        ])))
        .mount(&server)
        .await;
    for token in ["t1", "t2"] {
        Mock::given(method("DELETE"))
            .and(path(format!("{}/users/{}", DOCS, token)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
    }

    assert_eq!(store(&server, None).delete_by_name("bob").await.unwrap(), 2);
}

#[tokio::test]
async fn test_unaddressable_token_never_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let s = store(&server, None);
    assert_eq!(s.get_by_token("../users/other").await.unwrap(), None);
    assert_eq!(s.get_by_token("__name__").await.unwrap(), None);
}

#[tokio::test]
async fn test_each_request_carries_the_current_token() {
    let server = MockServer::start().await;
    for (n, name) in [(1, "alice"), (2, "bob")] {
        let token = format!("tok{}", n);
        Mock::given(method("GET"))
            .and(path(format!("{}/users/{}", DOCS, token)))
            .and(header("authorization", format!("Bearer ya29.gen{}", n).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(doc(&token, name, None)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let source = Arc::new(RotatingToken {
        issued: AtomicUsize::new(0),
    });
    let s = store_with(&server, Some(source.clone() as Arc<dyn AccessTokenSource>));
    assert_eq!(
        s.get_by_token("tok1").await.unwrap(),
        Some(UserRecord::new("tok1", "alice"))
    );
    assert_eq!(
        s.get_by_token("tok2").await.unwrap(),
        Some(UserRecord::new("tok2", "bob"))
    );
    assert_eq!(source.issued.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_credentials_fail_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = store_with(&server, Some(Arc::new(NoCredentials) as Arc<dyn AccessTokenSource>))
        .get_by_token("abc123")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Auth(_)));
}

#[tokio::test]
async fn test_emulator_requests_have_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc("abc123", "alice", None)))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, None).get_by_token("abc123").await.unwrap();
    let received = server.received_requests().await.unwrap();
    assert!(!received[0].headers.contains_key("authorization"));
}
