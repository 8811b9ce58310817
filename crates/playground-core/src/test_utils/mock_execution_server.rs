// src/test_utils/mock_execution_server.rs
use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::strategies::remote::ExecuteRequest;

pub const EXECUTE_PATH: &str = "/api/v2/execute";

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: Value,
    pub delay: Duration,
}

impl MockReply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone)]
struct MockServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<ExecuteRequest>>>,
}

async fn execute_handler(
    axum::extract::State(state): axum::extract::State<MockServerState>,
    Json(payload): Json<ExecuteRequest>,
) -> (StatusCode, Json<Value>) {
    log::debug!("Mock execution server received {} request", payload.language);
    state.requests.lock().unwrap().push(payload);

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(reply) => {
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(reply.body))
        }
        None => {
            log::error!("Mock execution server ran out of replies!");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "message": "no reply configured" })),
            )
        }
    }
}

pub struct MockExecutionServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    pub recorded_requests: Arc<Mutex<Vec<ExecuteRequest>>>,
}

impl MockExecutionServer {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = MockServerState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let recorded_requests = state.requests.clone();

        let app = Router::new()
            .route(EXECUTE_PATH, post(execute_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock execution server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock execution server error: {}", e);
                });
        });

        MockExecutionServer {
            addr,
            shutdown_tx,
            recorded_requests,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}{}", self.addr, EXECUTE_PATH)
    }

    pub fn get_requests(&self) -> Vec<ExecuteRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock execution server shutdown signal already sent or receiver dropped.");
        }
    }
}
