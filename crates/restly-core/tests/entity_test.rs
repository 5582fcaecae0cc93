#![allow(clippy::unwrap_used)]
// Integration tests for `Entity` synchronization using wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::Poll;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_test::{assert_pending, task};
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restly_core::{CoreError, DirtyState, Entity, EntityConfig, EntityStatus, SyncOutcome};

// ── Helpers ─────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("restly_core=debug,restly_api=debug")
        .with_test_writer()
        .try_init();
}

async fn setup(model: Option<Value>) -> (MockServer, Entity) {
    init_tracing();
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let entity = Entity::new(EntityConfig::default().with_base_url(base_url), model).unwrap();
    (server, entity)
}

fn status(updating: bool, loaded: bool, got: bool, error: bool) -> EntityStatus {
    EntityStatus {
        is_updating: updating,
        is_loaded: loaded,
        is_got: got,
        is_error: error,
    }
}

// ── Fetch ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_applies_body() {
    let (server, mut entity) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/people/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "name": "x" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = entity.fetch("people/1", None).await.unwrap();

    assert!(outcome.is_applied(), "got: {outcome:?}");
    assert_eq!(entity.to_value().unwrap(), json!({ "id": 1, "name": "x" }));
    assert_eq!(entity.status(), status(false, true, true, false));
    assert!(!entity.has_changed().unwrap());
}

#[tokio::test]
async fn test_fetch_keeps_tree_observable_and_root_stable() {
    let (server, mut entity) = setup(None).await;
    let root = entity.data().clone();
    let mut root_stream = root.stream();

    Mock::given(method("GET"))
        .and(path("/api/people/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "person": { "address": { "lines": ["a", "b"] } }
        })))
        .mount(&server)
        .await;

    entity.fetch("people/1", None).await.unwrap();

    assert!(entity.data().ptr_eq(&root));
    assert!(root_stream.changed().await.is_some());
    assert!(entity.cell_at("/person/address/lines").unwrap().is_some());
    assert!(restly_core::graph::is_fully_observable(
        &restly_core::Node::Observable(root)
    ));
}

#[tokio::test]
async fn test_fetch_not_found_raises_error_flag() {
    let (server, mut entity) = setup(Some(json!({ "name": "template" }))).await;
    entity.new_entity().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/people/9"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such person"))
        .mount(&server)
        .await;

    let outcome = entity.fetch("people/9", None).await.unwrap();

    assert!(
        matches!(
            outcome,
            SyncOutcome::Failed {
                error: CoreError::NotFound { .. }
            }
        ),
        "got: {outcome:?}"
    );
    assert_eq!(entity.to_value().unwrap(), json!({ "name": "template" }));
    assert_eq!(entity.status(), status(false, false, false, true));
}

#[tokio::test]
async fn test_fetch_not_modified_changes_nothing() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "id": 1 })).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/people/1"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;

    let outcome = entity.fetch("people/1", None).await.unwrap();

    assert!(matches!(outcome, SyncOutcome::NotModified), "got: {outcome:?}");
    assert_eq!(entity.to_value().unwrap(), json!({ "id": 1 }));
    assert_eq!(entity.status(), status(false, true, false, false));
}

#[tokio::test]
async fn test_fetch_ignores_unhandled_success_status() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "id": 1 })).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/people/1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 2 })))
        .mount(&server)
        .await;

    let outcome = entity.fetch("people/1", None).await.unwrap();

    assert!(
        matches!(outcome, SyncOutcome::Ignored { status } if status.as_u16() == 201),
        "got: {outcome:?}"
    );
    assert_eq!(entity.to_value().unwrap(), json!({ "id": 1 }));
    assert!(!entity.is_got().get());
}

#[tokio::test]
async fn test_fetch_invalid_body_raises_error_flag() {
    let (server, mut entity) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/people/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let outcome = entity.fetch("people/1", None).await.unwrap();

    assert!(
        matches!(outcome, SyncOutcome::Failed { error: CoreError::Api { .. } }),
        "got: {outcome:?}"
    );
    assert!(entity.is_error().get());
    assert!(!entity.is_got().get());
}

#[tokio::test]
async fn test_fetch_connection_refused_raises_error_flag() {
    let (_server, mut entity) = setup(None).await;

    let outcome = entity.fetch("http://127.0.0.1:1/gone", None).await.unwrap();

    assert!(outcome.is_failed(), "got: {outcome:?}");
    assert_eq!(entity.status(), status(false, false, false, true));
}

#[tokio::test]
async fn test_success_after_failure_clears_error_flag() {
    let (server, mut entity) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/people/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(&server)
        .await;

    assert!(entity.fetch("broken", None).await.unwrap().is_failed());
    assert!(entity.is_error().get());

    assert!(entity.fetch("people/1", None).await.unwrap().is_applied());
    assert_eq!(entity.status(), status(false, true, true, false));
}

// ── Create / replace ────────────────────────────────────────────────

#[tokio::test]
async fn test_create_posts_data_without_ignored_fields() {
    let (server, mut entity) = setup(None).await;
    entity
        .set_data(&json!({ "name": "y", "isUpdating": false, "isLoaded": true }))
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/people"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"name":"y"}"#))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "id": 5, "name": "y" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = entity.create("people", None).await.unwrap();

    assert!(outcome.is_applied(), "got: {outcome:?}");
    assert_eq!(entity.to_value().unwrap(), json!({ "id": 5, "name": "y" }));
    assert!(entity.is_got().get());
}

#[tokio::test]
async fn test_create_with_ok_status_is_ignored() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "name": "y" })).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/people"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5 })))
        .mount(&server)
        .await;

    let outcome = entity.create("people", None).await.unwrap();

    assert!(matches!(outcome, SyncOutcome::Ignored { .. }), "got: {outcome:?}");
    assert_eq!(entity.to_value().unwrap(), json!({ "name": "y" }));
    assert!(!entity.is_got().get());
}

#[tokio::test]
async fn test_replace_sends_edited_data_and_resets_baseline() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "id": 5, "name": "y" })).unwrap();
    assert_eq!(entity.set_at("/name", &json!("z")).unwrap(), DirtyState::Dirty);

    Mock::given(method("PUT"))
        .and(path("/api/people/5"))
        .and(body_string(r#"{"id":5,"name":"z"}"#))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "id": 5, "name": "z", "rev": 2 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = entity.replace("people/5", None).await.unwrap();

    assert!(outcome.is_applied(), "got: {outcome:?}");
    assert_eq!(entity.dirty_state().get(), DirtyState::Clean);
    assert!(!entity.has_changed().unwrap());
    assert_eq!(entity.value_at("/rev").unwrap(), Some(json!(2)));
}

#[tokio::test]
async fn test_replace_server_error_keeps_data() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "id": 5, "name": "y" })).unwrap();
    entity.set_at("/name", &json!("z")).unwrap();

    Mock::given(method("PUT"))
        .and(path("/api/people/5"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let outcome = entity.replace("people/5", None).await.unwrap();

    assert!(
        matches!(
            outcome,
            SyncOutcome::Failed {
                error: CoreError::Api {
                    status: Some(500),
                    ..
                }
            }
        ),
        "got: {outcome:?}"
    );
    assert_eq!(entity.to_value().unwrap(), json!({ "id": 5, "name": "z" }));
    assert!(entity.has_changed().unwrap());
    assert_eq!(entity.status(), status(false, true, false, true));

    // The local edit can still be rolled back.
    assert!(entity.undo().unwrap());
    assert_eq!(entity.to_value().unwrap(), json!({ "id": 5, "name": "y" }));
}

#[tokio::test]
async fn test_create_server_error_keeps_data() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "name": "y" })).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/people"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = entity.create("people", None).await.unwrap();

    assert!(
        matches!(
            outcome,
            SyncOutcome::Failed {
                error: CoreError::Api {
                    status: Some(500),
                    ..
                }
            }
        ),
        "got: {outcome:?}"
    );
    assert_eq!(entity.to_value().unwrap(), json!({ "name": "y" }));
    assert_eq!(entity.status(), status(false, true, false, true));
}

// ── Remove ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remove_server_error_keeps_data() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "id": 5 })).unwrap();

    Mock::given(method("DELETE"))
        .and(path("/api/people/5"))
        .respond_with(ResponseTemplate::new(409).set_body_string("still referenced"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = entity.remove("people/5", None).await.unwrap();

    assert!(
        matches!(
            outcome,
            SyncOutcome::Failed {
                error: CoreError::Api {
                    status: Some(409),
                    ..
                }
            }
        ),
        "got: {outcome:?}"
    );
    assert_eq!(entity.to_value().unwrap(), json!({ "id": 5 }));
    assert_eq!(entity.status(), status(false, true, false, true));
}

#[tokio::test]
async fn test_remove_no_content_empties_data() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "id": 5 })).unwrap();

    Mock::given(method("DELETE"))
        .and(path("/api/people/5"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = entity.remove("people/5", None).await.unwrap();

    assert!(
        matches!(outcome, SyncOutcome::Applied { status } if status.as_u16() == 204),
        "got: {outcome:?}"
    );
    assert_eq!(entity.to_value().unwrap(), json!({}));
    assert_eq!(entity.status(), status(false, true, true, false));
}

#[tokio::test]
async fn test_remove_ok_applies_body() {
    let (server, mut entity) = setup(None).await;

    Mock::given(method("DELETE"))
        .and(path("/api/people/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deleted": true })))
        .mount(&server)
        .await;

    entity.remove("people/5", None).await.unwrap();

    assert_eq!(entity.to_value().unwrap(), json!({ "deleted": true }));
}

// ── Callbacks ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_callback_runs_after_data_is_applied() {
    let (server, mut entity) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/people/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(&server)
        .await;

    let seen_got = Arc::new(AtomicBool::new(false));
    let seen_updating = Arc::new(AtomicBool::new(false));
    let got = entity.is_got().clone();
    let updating = entity.is_updating().clone();
    let (g, u) = (Arc::clone(&seen_got), Arc::clone(&seen_updating));

    entity
        .fetch(
            "people/1",
            Some(Box::new(move || {
                g.store(got.get(), Ordering::SeqCst);
                u.store(updating.get(), Ordering::SeqCst);
            })),
        )
        .await
        .unwrap();

    assert!(seen_got.load(Ordering::SeqCst));
    assert!(
        seen_updating.load(Ordering::SeqCst),
        "callback runs before the request is marked finished"
    );
    assert!(!entity.is_updating().get());
}

#[tokio::test]
async fn test_callback_skipped_on_failure() {
    let (server, mut entity) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/people/1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    entity
        .fetch(
            "people/1",
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ── In-flight state ─────────────────────────────────────────────────

#[tokio::test]
async fn test_updating_flag_raised_while_in_flight() {
    let (server, mut entity) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 1 }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let updating = entity.is_updating().clone();
    let mut rx = updating.subscribe();

    let mut request = task::spawn(entity.fetch("slow", None));
    assert_pending!(request.poll());
    assert!(updating.get());
    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();

    let outcome = loop {
        if let Poll::Ready(result) = request.poll() {
            break result.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    drop(request);
    assert!(outcome.is_applied());
    assert!(!updating.get());
    assert!(rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_cancelled_request_lowers_updating_flag() {
    let (server, mut entity) = setup(None).await;
    entity.set_data(&json!({ "id": 1 })).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 2 }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let result = tokio::time::timeout(Duration::from_millis(50), entity.fetch("slow", None)).await;

    assert!(result.is_err(), "request should have timed out");
    assert_eq!(entity.status(), status(false, true, false, false));
    assert_eq!(entity.to_value().unwrap(), json!({ "id": 1 }));
}

// ── Template + tracking ─────────────────────────────────────────────

#[tokio::test]
async fn test_template_edit_then_create() {
    let (server, mut entity) = setup(Some(json!({ "name": "", "tags": [] }))).await;
    entity.new_entity().unwrap();
    assert!(!entity.is_loaded().get());

    entity.set_at("/name", &json!("new")).unwrap();
    entity.set_at("/tags/-", &json!("a")).unwrap();
    assert_eq!(entity.dirty_state().get(), DirtyState::Dirty);

    Mock::given(method("POST"))
        .and(path("/api/people"))
        .and(body_string(r#"{"name":"new","tags":["a"]}"#))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "id": 7, "name": "new", "tags": ["a"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    entity.create("people", None).await.unwrap();

    assert_eq!(entity.status(), status(false, true, true, false));
    assert_eq!(entity.dirty_state().get(), DirtyState::Clean);
    assert_eq!(entity.value_at("/id").unwrap(), Some(json!(7)));
}
