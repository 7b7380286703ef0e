//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use tokio::sync::Semaphore;

use pagesmith::config::DeliveryConfig;
use pagesmith::delivery::DeliveryClient;
use pagesmith::generator::{CodeGenerator, GenerationError};
use pagesmith::llm::LlmError;
use pagesmith::publish::{PublishError, Publisher};
use pagesmith::task::{PublishResult, TaskCoordinator, TaskRegistry};

pub const SECRET: &str = "manifest-2025";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Generator that counts calls and can be held at a gate.
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    behavior: Behavior,
    gate: Option<Arc<Semaphore>>,
}

impl FakeGenerator {
    fn with(behavior: Behavior, gate: Option<Arc<Semaphore>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior,
            gate,
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::with(Behavior::Succeed, None)
    }

    pub fn failing() -> Arc<Self> {
        Self::with(Behavior::Fail, None)
    }

    pub fn panicking() -> Arc<Self> {
        Self::with(Behavior::Panic, None)
    }

    /// Each call waits for one permit on `gate`.
    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Self::with(Behavior::Succeed, Some(gate))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeGenerator for FakeGenerator {
    async fn generate(
        &self,
        brief: &str,
        _checks: &[String],
        _attachments: &[Value],
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        match self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail => {
                return Err(GenerationError::Llm(LlmError::from_status(
                    503,
                    "model overloaded".to_string(),
                )));
            }
            Behavior::Panic => panic!("renderer blew up"),
        }
        Ok(format!("<html><body><h1 id=\"greeting\">{}</h1></body></html>", brief))
    }
}

/// Publisher that records what it was asked to publish.
#[derive(Default)]
pub struct FakePublisher {
    pub published: Mutex<Vec<(String, String)>>,
}

impl FakePublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(
        &self,
        task_id: &str,
        source: &str,
        _brief: &str,
    ) -> Result<PublishResult, PublishError> {
        self.published
            .lock()
            .unwrap()
            .push((task_id.to_string(), source.to_string()));
        Ok(PublishResult {
            repo_url: format!("https://github.com/octo/{}", task_id),
            commit_sha: "0123456789abcdef".to_string(),
            pages_url: format!("https://octo.github.io/{}/", task_id),
        })
    }
}

pub fn fast_delivery() -> DeliveryConfig {
    DeliveryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

pub fn coordinator(
    generator: Arc<FakeGenerator>,
    publisher: Arc<FakePublisher>,
    delivery: DeliveryConfig,
) -> Arc<TaskCoordinator> {
    Arc::new(TaskCoordinator::new(
        SECRET,
        Arc::new(TaskRegistry::new()),
        generator,
        publisher,
        Arc::new(DeliveryClient::new()),
        delivery,
    ))
}

/// In-process callback endpoint recording every POST body.
pub struct CallbackServer {
    pub url: String,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl CallbackServer {
    pub async fn start(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/cb", post(record))
            .with_state((Arc::clone(&received), status));

        let addr = spawn_server(app).await;
        Self {
            url: format!("http://{}/cb", addr),
            received,
        }
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

async fn record(
    State((received, status)): State<(Arc<Mutex<Vec<Value>>>, StatusCode)>,
    Json(body): Json<Value>,
) -> StatusCode {
    received.lock().unwrap().push(body);
    status
}

/// Serve `app` on an ephemeral local port.
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    addr
}
