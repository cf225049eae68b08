//! Shelfdesk Request Gateway
//!
//! Every call to the lending backend goes through [`Gateway`]:
//! - attaches the stored credential as a bearer header when one exists
//! - classifies failures into [`RequestErrorKind`]
//! - surfaces the fixed notice for the classified kinds
//! - hands the original response back to the caller inside [`RequestError`]
//!
//! The gateway reads the credential store but never writes it and never
//! touches session state.

pub mod client;
pub mod mock;

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use shelfdesk_common::{ConsoleUi, CredentialStore, Notice};
use thiserror::Error;

/// HTTP methods used by the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// A request as handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the backend base URL, e.g. `/admin/info`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

/// A response as returned by the transport, whatever its status
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Body as a plain string; a JSON string literal is unquoted
    pub fn text(&self) -> String {
        match serde_json::from_str::<String>(&self.body) {
            Ok(unquoted) => unquoted,
            Err(_) => self.body.trim().to_string(),
        }
    }
}

/// No response was received at all
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("No response received: {0}")]
    Unreachable(String),
}

/// Sends requests to the backend
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Failure taxonomy, in classification priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// No response was received
    NetworkUnreachable,
    /// 404
    NotFound,
    /// 500
    ServerFault,
    /// Any other non-2xx status, or an undecodable success body
    Unclassified,
}

impl RequestErrorKind {
    /// Classify a failed exchange; `None` means no response was received
    pub fn classify(status: Option<u16>) -> Self {
        match status {
            None => Self::NetworkUnreachable,
            Some(404) => Self::NotFound,
            Some(500) => Self::ServerFault,
            Some(_) => Self::Unclassified,
        }
    }

    /// The one fixed notice for this kind
    pub fn notice(&self) -> Notice {
        match self {
            Self::NetworkUnreachable => Notice::error(
                "Network error",
                "The server cannot be reached or the network is down.",
            ),
            Self::NotFound => Notice::error(
                "Not found",
                "The server has no response for the requested URI.",
            ),
            Self::ServerFault => Notice::error("Server error", "Internal server error."),
            Self::Unclassified => Notice::error("Request failed", "An error occurred."),
        }
    }

    /// Whether the gateway raises the notice itself.
    ///
    /// Unclassified failures carry caller-specific meaning (bad credentials,
    /// an expired session, a business rule message), so the caller decides
    /// what to show and falls back to this kind's notice.
    pub fn gateway_notifies(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl std::fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkUnreachable => write!(f, "network unreachable"),
            Self::NotFound => write!(f, "not found"),
            Self::ServerFault => write!(f, "server fault"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// A failed gateway call, carrying the original response when there was one
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{method} {path} failed: {kind}{}{}", status_suffix(.response), detail_suffix(.detail))]
pub struct RequestError {
    pub kind: RequestErrorKind,
    pub method: Method,
    pub path: String,
    pub response: Option<ApiResponse>,
    pub detail: Option<String>,
}

fn status_suffix(response: &Option<ApiResponse>) -> String {
    response
        .as_ref()
        .map(|r| format!(" (status {})", r.status))
        .unwrap_or_default()
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message the server put in the error body, if any
    pub fn server_message(&self) -> Option<String> {
        let response = self.response.as_ref()?;
        if let Ok(serde_json::Value::Object(map)) =
            serde_json::from_str::<serde_json::Value>(&response.body)
        {
            return map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .filter(|m| !m.trim().is_empty());
        }
        Some(response.text()).filter(|m| !m.is_empty())
    }

    /// Server message verbatim, else the fixed notice text for this kind
    pub fn user_message(&self) -> String {
        self.server_message()
            .unwrap_or_else(|| self.kind.notice().text)
    }

    /// Notice the caller should raise, `None` when the gateway already raised one
    pub fn caller_notice(&self, title: &str) -> Option<Notice> {
        if self.kind.gateway_notifies() {
            None
        } else {
            Some(Notice::error(title, self.user_message()))
        }
    }
}

/// Authenticated request gateway
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    ui: Arc<dyn ConsoleUi>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        ui: Arc<dyn ConsoleUi>,
    ) -> Self {
        Self {
            transport,
            credentials,
            ui,
        }
    }

    /// Dispatch a request and return the successful response
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, RequestError> {
        let bearer = match self.credentials.get() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Credential store unreadable, sending unauthenticated");
                None
            }
        };

        let request = ApiRequest {
            method,
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            body,
            bearer,
        };

        tracing::debug!(
            method = %method,
            path = %path,
            authenticated = request.bearer.is_some(),
            "Dispatching request"
        );

        let outcome = self.transport.send(request).await;

        let error = match outcome {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) => RequestError {
                kind: RequestErrorKind::classify(Some(response.status)),
                method,
                path: path.to_string(),
                response: Some(response),
                detail: None,
            },
            Err(TransportError::Unreachable(cause)) => RequestError {
                kind: RequestErrorKind::NetworkUnreachable,
                method,
                path: path.to_string(),
                response: None,
                detail: Some(cause),
            },
        };

        tracing::warn!(
            method = %method,
            path = %path,
            kind = %error.kind,
            status = ?error.status(),
            "Request failed"
        );

        if error.kind.gateway_notifies() {
            self.ui.notify(error.kind.notice());
        }

        Err(error)
    }

    /// Dispatch with a JSON body
    pub async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, RequestError> {
        let body = serde_json::to_value(body).map_err(|e| RequestError {
            kind: RequestErrorKind::Unclassified,
            method,
            path: path.to_string(),
            response: None,
            detail: Some(format!("request body not serializable: {e}")),
        })?;
        self.request(method, path, &[], Some(body)).await
    }

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let response = self.request(Method::Get, path, query, None).await?;
        decode_body(Method::Get, path, &response)
    }
}

/// Decode a success body, mapping a malformed body to an unclassified failure
pub fn decode_body<T: DeserializeOwned>(
    method: Method,
    path: &str,
    response: &ApiResponse,
) -> Result<T, RequestError> {
    response.json().map_err(|e| RequestError {
        kind: RequestErrorKind::Unclassified,
        method,
        path: path.to_string(),
        response: Some(response.clone()),
        detail: Some(format!("invalid response body: {e}")),
    })
}
