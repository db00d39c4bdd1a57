//! In-process stand-in for the Groq chat completions endpoint.
//!
//! [`spawn_mock`] serves a [`MockGroq`] on a random local port and returns the
//! completions URL to point a [`GroqClient`] at.

#![allow(dead_code)]

use drbot::groq::GroqClient;
use drbot::ApiKey;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

#[derive(Clone)]
pub struct MockGroq {
    hits: Arc<AtomicUsize>,
    // Returned for the first requests, in order, before answering successfully.
    failures: Arc<Vec<StatusCode>>,
    captured: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    answer: &'static str,
}

impl MockGroq {
    pub fn new(failures: Vec<StatusCode>, answer: &'static str) -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(failures),
            captured: Arc::new(Mutex::new(Vec::new())),
            answer,
        }
    }

    pub fn answering(answer: &'static str) -> Self {
        Self::new(vec![], answer)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Authorization header and JSON body of the most recent request.
    pub fn last_request(&self) -> (Option<String>, Value) {
        self.captured.lock().unwrap().last().cloned().unwrap()
    }

    pub fn last_body(&self) -> Value {
        self.last_request().1
    }
}

async fn completions(
    State(mock): State<MockGroq>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let hit = mock.hits.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    mock.captured.lock().unwrap().push((auth, body));

    if let Some(status) = mock.failures.get(hit) {
        return (*status, "upstream unavailable").into_response();
    }

    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": mock.answer } }
        ]
    }))
    .into_response()
}

pub async fn spawn_mock(mock: MockGroq) -> String {
    let app = Router::new()
        .route("/openai/v1/chat/completions", post(completions))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/openai/v1/chat/completions")
}

pub fn client(url: String) -> GroqClient {
    GroqClient::new(
        url,
        ApiKey::new("gsk_integration"),
        TEST_MODEL,
        Duration::from_secs(5),
    )
    .unwrap()
    .with_max_retries(3)
    .with_initial_backoff(Duration::from_millis(5))
}
