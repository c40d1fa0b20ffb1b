#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::*;
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "sk-test-key";

/// Mock server utilities for testing the provider clients
pub struct LLMMockServer {
    server: MockServer,
}

impl LLMMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Mock a successful local generate call
    pub async fn mock_generate_success(&self, model: &str, answer: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": model,
                "stream": false,
                "options": { "num_ctx": 4096 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": model,
                "created_at": "2024-11-02T10:00:00Z",
                "response": answer,
                "done": true
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock a local generate call answering with an arbitrary JSON body
    pub async fn mock_generate_body(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mock a local generate call answering with non-JSON text
    pub async fn mock_generate_raw(&self, body: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Mock a local generate call that answers only after `delay`
    pub async fn mock_generate_delayed(&self, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": "too late", "done": true }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Mock a local generate error
    pub async fn mock_generate_error(&self, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "error": message })))
            .mount(&self.server)
            .await;
    }

    /// Mock the local model listing
    pub async fn mock_tags(&self, names: &[&str]) {
        let models: Vec<Value> = names
            .iter()
            .map(|name| json!({ "name": name, "size": 2019393189u64 }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": models })))
            .mount(&self.server)
            .await;
    }

    /// Mock a failing local model listing
    pub async fn mock_tags_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(status).set_body_string("internal error"))
            .mount(&self.server)
            .await;
    }

    /// Mock a successful remote chat completion
    pub async fn mock_chat_success(&self, model: &str, answer: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat/completions"))
            .and(header("authorization", format!("Bearer {}", TEST_API_KEY).as_str()))
            .and(body_partial_json(json!({
                "model": model,
                "temperature": 0.7,
                "max_tokens": 2000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-test123",
                "object": "chat.completion",
                "created": 1700000000,
                "model": model,
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": answer },
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": 20,
                    "total_tokens": 30
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock a remote chat completion answering with an arbitrary JSON body
    pub async fn mock_chat_body(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/api/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mock a remote chat completion error in the OpenAI error envelope
    pub async fn mock_chat_error(&self, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": { "message": message, "type": "invalid_request_error" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock the remote model listing
    pub async fn mock_models(&self, ids: &[&str]) {
        let data: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "id": id, "name": id, "object": "model" }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/api/models"))
            .and(header("authorization", format!("Bearer {}", TEST_API_KEY).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
            .mount(&self.server)
            .await;
    }

    /// Fail the test if any request at all reaches the server
    pub async fn expect_no_requests(&self) {
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    pub async fn received_request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// An address nothing listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
