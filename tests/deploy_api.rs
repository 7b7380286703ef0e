mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tower::ServiceExt;

use common::{CallbackServer, FakeGenerator, FakePublisher, SECRET};
use pagesmith::api::{router, AppState};
use pagesmith::task::{TaskCoordinator, TaskState};

fn app(coordinator: &Arc<TaskCoordinator>) -> Router {
    router(Arc::new(AppState {
        coordinator: Arc::clone(coordinator),
    }))
}

fn submission(task: &str, secret: &str, evaluation_url: &str) -> Value {
    json!({
        "email": "student@example.com",
        "secret": secret,
        "task": task,
        "round": 1,
        "nonce": "nonce-123",
        "brief": "Hello World page",
        "checks": ["has h1#greeting"],
        "attachments": [],
        "evaluation_url": evaluation_url,
    })
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    read(response).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_and_service_info() {
    let coordinator = common::coordinator(
        FakeGenerator::ok(),
        FakePublisher::new(),
        common::fast_delivery(),
    );
    let app = app(&coordinator);

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "pagesmith");
    assert_eq!(body["tasks"]["processing"], 0);
}

#[tokio::test]
async fn test_end_to_end_hello_world() {
    let callback = CallbackServer::start(StatusCode::OK).await;
    let generator = FakeGenerator::ok();
    let publisher = FakePublisher::new();
    let coordinator = common::coordinator(
        generator.clone(),
        publisher.clone(),
        common::fast_delivery(),
    );
    let app = app(&coordinator);

    let body = submission("t1", SECRET, &callback.url);
    let (status, body) = post_json(&app, "/api/deploy", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["task"], "t1");

    coordinator.shutdown().await;

    match coordinator.registry().get("t1").await {
        TaskState::Completed(result) => assert!(!result.pages_url.is_empty()),
        other => panic!("expected completed, got {:?}", other),
    }

    let bodies = callback.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["task"], "t1");
    assert_eq!(bodies[0]["nonce"], "nonce-123");
    assert_eq!(bodies[0]["email"], "student@example.com");
    assert_eq!(bodies[0]["round"], 1);
    assert_eq!(bodies[0]["pages_url"], "https://octo.github.io/t1/");
    assert_eq!(bodies[0]["commit_sha"], "0123456789abcdef");
    assert_eq!(generator.calls(), 1);
    assert_eq!(publisher.calls(), 1);

    let (status, record) = get(&app, "/api/task/t1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "completed");
    assert_eq!(record["repo_url"], "https://github.com/octo/t1");
    assert!(record["finished_at"].is_string());
}

#[tokio::test]
async fn test_completed_task_is_answered_from_registry() {
    let callback = CallbackServer::start(StatusCode::OK).await;
    let generator = FakeGenerator::ok();
    let publisher = FakePublisher::new();
    let coordinator = common::coordinator(
        generator.clone(),
        publisher.clone(),
        common::fast_delivery(),
    );

    coordinator
        .submit(submission("t2", SECRET, &callback.url))
        .await
        .unwrap();
    // Drain the first pipeline without closing the coordinator to new work.
    while coordinator.registry().get("t2").await == TaskState::Processing {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let app = app(&coordinator);
    let body = submission("t2", SECRET, &callback.url);
    let (status, body) = post_json(&app, "/api/deploy", &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["repo_url"], "https://github.com/octo/t2");
    assert_eq!(body["pages_url"], "https://octo.github.io/t2/");
    assert_eq!(generator.calls(), 1);
    assert_eq!(publisher.calls(), 1);
    assert_eq!(callback.bodies().len(), 1);
}

#[tokio::test]
async fn test_in_flight_duplicate_reports_processing() {
    let callback = CallbackServer::start(StatusCode::OK).await;
    let gate = Arc::new(Semaphore::new(0));
    let generator = FakeGenerator::gated(Arc::clone(&gate));
    let publisher = FakePublisher::new();
    let coordinator = common::coordinator(
        generator.clone(),
        publisher.clone(),
        common::fast_delivery(),
    );
    let app = app(&coordinator);

    let body = submission("t3", SECRET, &callback.url);
    let (_, first) = post_json(&app, "/api/deploy", &body).await;
    let (status, second) = post_json(&app, "/api/deploy", &body).await;

    assert_eq!(first["status"], "success");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "processing");
    assert_eq!(second["task"], "t3");

    gate.add_permits(1);
    coordinator.shutdown().await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(publisher.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_run_one_pipeline() {
    let callback = CallbackServer::start(StatusCode::OK).await;
    let generator = FakeGenerator::ok();
    let publisher = FakePublisher::new();
    let coordinator = common::coordinator(
        generator.clone(),
        publisher.clone(),
        common::fast_delivery(),
    );
    let app = app(&coordinator);

    let body = submission("race", SECRET, &callback.url);
    let requests = (0..16).map(|_| {
        let app = app.clone();
        let body = body.clone();
        tokio::spawn(async move { post_json(&app, "/api/deploy", &body).await })
    });
    let responses: Vec<_> = futures::future::join_all(requests)
        .await
        .into_iter()
        .map(|r| r.expect("join"))
        .collect();

    assert!(responses.iter().all(|(status, _)| *status == StatusCode::OK));
    coordinator.shutdown().await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(publisher.calls(), 1);
    assert_eq!(callback.bodies().len(), 1);
}

#[tokio::test]
async fn test_invalid_secret_is_rejected_without_state_change() {
    let coordinator = common::coordinator(
        FakeGenerator::ok(),
        FakePublisher::new(),
        common::fast_delivery(),
    );
    let app = app(&coordinator);

    let (status, body) = post_json(
        &app,
        "/api/deploy",
        &submission("t4", "wrong", "http://localhost:1/cb"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Invalid secret"}));

    // Shape errors do not mask the secret check.
    let garbage = json!({"secret": 42, "task": ["t4"], "checks": "nope"});
    let (status, _) = post_json(&app, "/api/deploy", &garbage).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(&app, "/api/deploy", &json!({"task": "t4"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    coordinator.shutdown().await;
    assert_eq!(coordinator.registry().get("t4").await, TaskState::Unknown);
}

#[tokio::test]
async fn test_validation_errors() {
    let coordinator = common::coordinator(
        FakeGenerator::ok(),
        FakePublisher::new(),
        common::fast_delivery(),
    );
    let app = app(&coordinator);

    let mut missing_brief = submission("t5", SECRET, "http://localhost:1/cb");
    missing_brief.as_object_mut().unwrap().remove("brief");
    let (status, body) = post_json(&app, "/api/deploy", &missing_brief).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: brief");

    let bad_url = submission("t5", SECRET, "not a url");
    let (status, _) = post_json(&app, "/api/deploy", &bad_url).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/deploy")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(coordinator.registry().get("t5").await, TaskState::Unknown);
}

#[tokio::test]
async fn test_generation_failure_is_recorded_and_reported() {
    let callback = CallbackServer::start(StatusCode::OK).await;
    let generator = FakeGenerator::failing();
    let publisher = FakePublisher::new();
    let coordinator = common::coordinator(
        generator.clone(),
        publisher.clone(),
        common::fast_delivery(),
    );

    coordinator
        .submit(submission("t6", SECRET, &callback.url))
        .await
        .unwrap();
    while coordinator.registry().get("t6").await == TaskState::Processing {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    match coordinator.registry().get("t6").await {
        TaskState::Failed { error } => assert!(error.contains("model overloaded")),
        other => panic!("expected failed, got {:?}", other),
    }
    assert_eq!(publisher.calls(), 0);
    assert!(callback.bodies().is_empty());

    let app = app(&coordinator);
    let body = submission("t6", SECRET, &callback.url);
    let (status, body) = post_json(&app, "/api/deploy", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["task"], "t6");
    assert_eq!(generator.calls(), 1);

    let (status, record) = get(&app, "/api/task/t6").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "failed");
}

#[tokio::test]
async fn test_panicking_generator_marks_task_failed() {
    let callback = CallbackServer::start(StatusCode::OK).await;
    let generator = FakeGenerator::panicking();
    let publisher = FakePublisher::new();
    let coordinator = common::coordinator(
        generator.clone(),
        publisher.clone(),
        common::fast_delivery(),
    );

    coordinator
        .submit(submission("p1", SECRET, &callback.url))
        .await
        .unwrap();
    coordinator.shutdown().await;

    match coordinator.registry().get("p1").await {
        TaskState::Failed { error } => {
            assert!(error.starts_with("pipeline panicked"));
            assert!(error.contains("renderer blew up"));
        }
        other => panic!("expected failed, got {:?}", other),
    }
    assert_eq!(publisher.calls(), 0);
    assert!(callback.bodies().is_empty());

    let app = app(&coordinator);
    let body = submission("p1", SECRET, &callback.url);
    let (status, body) = post_json(&app, "/api/deploy", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_unreachable_callback_does_not_fail_task() {
    let callback = CallbackServer::start(StatusCode::INTERNAL_SERVER_ERROR).await;
    let coordinator = common::coordinator(
        FakeGenerator::ok(),
        FakePublisher::new(),
        common::fast_delivery(),
    );

    coordinator
        .submit(submission("t7", SECRET, &callback.url))
        .await
        .unwrap();
    coordinator.shutdown().await;

    assert!(matches!(
        coordinator.registry().get("t7").await,
        TaskState::Completed(_)
    ));
    assert_eq!(callback.bodies().len(), 3);
}

#[tokio::test]
async fn test_unknown_task_status_is_not_found() {
    let coordinator = common::coordinator(
        FakeGenerator::ok(),
        FakePublisher::new(),
        common::fast_delivery(),
    );
    let (status, body) = get(&app(&coordinator), "/api/task/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Task nope not found");
}

#[tokio::test]
async fn test_submission_after_shutdown_is_an_internal_error() {
    let coordinator = common::coordinator(
        FakeGenerator::ok(),
        FakePublisher::new(),
        common::fast_delivery(),
    );
    coordinator.shutdown().await;

    let (status, body) = post_json(
        &app(&coordinator),
        "/api/deploy",
        &submission("t8", SECRET, "http://localhost:1/cb"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Service is shutting down");
}
