//! Mock Transport Implementation
//!
//! Programmable transport for controller tests:
//! - `MockReply`: status, headers, body, optional delay, or no response at all
//! - per-route reply queues consumed in order, then a sticky reply
//! - every request is recorded for assertions
//!
//! Unknown routes answer 404.

use crate::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer
#[derive(Debug, Clone, PartialEq)]
pub struct MockReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub delay: Option<Duration>,
    /// Simulate a request that never gets a response
    pub unreachable: bool,
}

impl MockReply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: None,
            unreachable: false,
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::status(200).with_body(value.to_string())
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::status(200).with_body(body)
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::status(0)
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
struct MockRoute {
    queued: VecDeque<MockReply>,
    sticky: Option<MockReply>,
}

/// Mock transport with scripted replies and request recording
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<(Method, String), MockRoute>>>,
    history: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to this route with `reply` once the queue is drained
    pub fn on(&self, method: Method, path: &str, reply: MockReply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .sticky = Some(reply);
    }

    /// Answer the next request to this route with `reply`
    pub fn enqueue(&self, method: Method, path: &str, reply: MockReply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .queued
            .push_back(reply);
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ApiRequest> {
        self.history.lock().unwrap().clone()
    }

    /// Number of requests sent to one route
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Clear history
    pub fn reset_history(&self) {
        self.history.lock().unwrap().clear();
    }

    fn next_reply(&self, method: Method, path: &str) -> MockReply {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(method, path.to_string())) {
            Some(route) => route
                .queued
                .pop_front()
                .or_else(|| route.sticky.clone())
                .unwrap_or_else(|| MockReply::status(404)),
            None => MockReply::status(404),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        tracing::debug!(method = %request.method, path = %request.path, "Mock transport: request");

        let reply = self.next_reply(request.method, &request.path);
        self.history.lock().unwrap().push(request);

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }

        if reply.unreachable {
            return Err(TransportError::Unreachable(
                "mock: connection refused".to_string(),
            ));
        }

        Ok(ApiResponse {
            status: reply.status,
            headers: reply.headers.into_iter().collect(),
            body: reply.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> ApiRequest {
        ApiRequest {
            method: Method::Get,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    #[tokio::test]
    async fn test_queue_then_sticky() {
        let transport = MockTransport::new();
        transport.enqueue(Method::Get, "/user", MockReply::json(serde_json::json!([1])));
        transport.on(Method::Get, "/user", MockReply::json(serde_json::json!([])));

        let first = transport.send(get("/user")).await.unwrap();
        let second = transport.send(get("/user")).await.unwrap();
        let third = transport.send(get("/user")).await.unwrap();

        assert_eq!(first.body, "[1]");
        assert_eq!(second.body, "[]");
        assert_eq!(third.body, "[]");
        assert_eq!(transport.count(Method::Get, "/user"), 3);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let transport = MockTransport::new();
        let response = transport.send(get("/nowhere")).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_unreachable_reply() {
        let transport = MockTransport::new();
        transport.on(Method::Get, "/user", MockReply::unreachable());
        let result = transport.send(get("/user")).await;
        assert!(matches!(result, Err(TransportError::Unreachable(_))));
        assert_eq!(transport.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_headers_are_lowercased() {
        let transport = MockTransport::new();
        transport.on(
            Method::Get,
            "/user",
            MockReply::json(serde_json::json!([])).with_header("X-Cache", "MISS"),
        );
        let response = transport.send(get("/user")).await.unwrap();
        assert_eq!(response.header("x-cache"), Some("MISS"));
    }
}
