//! HTTP transport
//!
//! One request, one response, served by axum. Routing is deliberately
//! flat:
//!
//! - `GET /health` answers `{"status":"ok"}`.
//! - Any other `GET` answers the plain text `OK`.
//! - Every other method has its body decoded as a JSON object and
//!   dispatched. A body that is not a JSON object is rejected with
//!   `400 Invalid JSON`.
//!
//! Dispatch failures map to status codes by error class: validation and
//! protocol errors are `400`, everything else is `500`. Error bodies are the
//! bare message text.
//!
//! [`Transport::send`] only appends to the receive queue; HTTP has no
//! channel for server-initiated messages.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, McpError, Result};
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::transport::{ListenConfig, MessageQueue, Transport};

const TARGET: &str = "mcphost::transport::http";

/// Request/response transport.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mcphost::mcp::dispatcher::Dispatcher;
/// use mcphost::mcp::transport::http::HttpTransport;
/// use mcphost::mcp::transport::{ListenConfig, Transport};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = Arc::new(HttpTransport::new(
///     Dispatcher::new(),
///     ListenConfig::new("127.0.0.1", 0),
/// ));
/// let addr = transport.bind().await?;
/// println!("listening on http://{}", addr);
/// transport.start().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    dispatcher: Dispatcher,
    listen: ListenConfig,
    listener: tokio::sync::Mutex<Option<TcpListener>>,
    local_addr: Mutex<Option<SocketAddr>>,
    queue: MessageQueue,
    cancel: Mutex<CancellationToken>,
    running: AtomicBool,
}

impl HttpTransport {
    /// Create a transport that will listen on `listen`
    pub fn new(dispatcher: Dispatcher, listen: ListenConfig) -> Self {
        Self {
            dispatcher,
            listen,
            listener: tokio::sync::Mutex::new(None),
            local_addr: Mutex::new(None),
            queue: MessageQueue::new(),
            cancel: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
        }
    }

    /// The axum router serving every request.
    ///
    /// Exposed so the routes can be exercised without a socket.
    pub fn router(&self) -> Router {
        router(self.dispatcher.clone())
    }

    /// Bind the listening socket ahead of [`Transport::start`].
    ///
    /// # Returns
    ///
    /// The bound address, which carries the real port when the configured
    /// port is `0`.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Transport`] if the address cannot be bound.
    pub async fn bind(&self) -> Result<SocketAddr> {
        let mut slot = self.listener.lock().await;
        if let Some(listener) = slot.as_ref() {
            return Ok(listener.local_addr()?);
        }

        let listener = TcpListener::bind(self.listen.address()).await.map_err(|e| {
            McpError::Transport(format!("failed to bind {}: {}", self.listen.address(), e))
        })?;
        let addr = listener.local_addr()?;
        *lock(&self.local_addr) = Some(addr);
        *slot = Some(listener);
        tracing::info!(target: TARGET, %addr, "http transport bound");
        Ok(addr)
    }

    /// Address the transport is bound to, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    /// Mark the run served by `token` as finished. A newer run that
    /// already installed a fresh token keeps its state.
    fn finish_run(&self, token: &CancellationToken) {
        token.cancel();
        let cancel = lock(&self.cancel);
        if cancel.is_cancelled() {
            self.running.store(false, Ordering::SeqCst);
            *lock(&self.local_addr) = None;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build the router for `dispatcher`
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new().fallback(handle_request).with_state(dispatcher)
}

async fn handle_request(
    State(dispatcher): State<Dispatcher>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    if method == Method::GET {
        if uri.path() == "/health" {
            return (StatusCode::OK, Json(json!({"status": "ok"}))).into_response();
        }
        return (StatusCode::OK, "OK").into_response();
    }

    let message = match serde_json::from_slice::<Value>(&body) {
        Ok(message @ Value::Object(_)) => message,
        _ => {
            tracing::debug!(target: TARGET, %method, path = %uri.path(), "rejecting non-object body");
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };

    match dispatcher.dispatch(&message) {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            let status = if ErrorKind::of(&e).is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::debug!(target: TARGET, %status, "dispatch failed: {}", e);
            (status, e.to_string()).into_response()
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    /// Serve requests until [`Transport::stop`].
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Transport`] when already running or when the
    /// socket cannot be bound, and I/O errors from the server itself.
    async fn start(&self) -> Result<()> {
        // `running` and the token only change under the cancel lock.
        let token = {
            let mut cancel = lock(&self.cancel);
            if self.running.swap(true, Ordering::SeqCst) {
                return Err(McpError::Transport("Transport already started".to_string()).into());
            }
            if cancel.is_cancelled() {
                *cancel = CancellationToken::new();
            }
            cancel.clone()
        };

        if let Err(e) = self.bind().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }
        let listener = self.listener.lock().await.take();
        let Some(listener) = listener else {
            self.running.store(false, Ordering::SeqCst);
            return Err(McpError::Transport("listener unavailable".to_string()).into());
        };

        if token.is_cancelled() {
            drop(listener);
            self.finish_run(&token);
            tracing::info!(target: TARGET, "http transport stopped before serving");
            return Ok(());
        }

        tracing::info!(target: TARGET, addr = ?self.local_addr(), "http transport started");
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(token.clone().cancelled_owned())
            .await;

        self.finish_run(&token);
        tracing::info!(target: TARGET, "http transport stopped");
        served.map_err(|e| anyhow::Error::from(McpError::Io(e)))
    }

    fn stop(&self) -> Result<()> {
        let cancel = lock(&self.cancel);
        cancel.cancel();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, message: Value) -> Result<()> {
        self.queue.push(message);
        Ok(())
    }

    fn receive(&self) -> Option<Value> {
        self.queue.pop()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let dispatcher = Dispatcher::new();
        {
            let mut registry = dispatcher.registry_mut();
            registry.add_tool(
                "greet",
                |_| Ok(json!({"status": "success", "message": "Hello, World!"})),
                None,
            );
            registry.add_tool("boom", |_| Err(anyhow::anyhow!("handler exploded")), None);
        }
        router(dispatcher)
    }

    async fn call(method: &str, path: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call("GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_other_get_is_plain_ok() {
        let (status, body) = call("GET", "/anything", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_post_dispatches_tool_call() {
        let (status, body) = call(
            "POST",
            "/",
            r#"{"type":"tool_call","name":"greet","arguments":{}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"status": "success", "message": "Hello, World!"})
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_400() {
        let (status, body) = call("POST", "/", "{nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid JSON");

        let (status, body) = call("PUT", "/", "[1,2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid JSON");
    }

    #[tokio::test]
    async fn test_field_type_errors_are_400() {
        let (status, body) = call("POST", "/", r#"{"type":"tool_call","name":5}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid name type");
    }

    #[tokio::test]
    async fn test_unknown_type_is_400() {
        let (status, body) = call("POST", "/", r#"{"type":"unknown_kind"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Unknown message type: unknown_kind");

        let (status, body) = call("POST", "/", r#"{}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Unknown message type: ");
    }

    #[tokio::test]
    async fn test_unknown_tool_and_handler_failure_are_500() {
        let (status, body) = call("POST", "/", r#"{"type":"tool_call","name":"nope"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Unknown tool: nope");

        let (status, body) = call("POST", "/", r#"{"type":"tool_call","name":"boom"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "handler exploded");
    }

    #[test]
    fn test_send_only_enqueues() {
        let transport = HttpTransport::new(Dispatcher::new(), ListenConfig::default());
        transport.send(json!({"type": "log"})).unwrap();
        assert_eq!(transport.receive(), Some(json!({"type": "log"})));
        assert!(transport.receive().is_none());
        assert!(!transport.is_running());
    }

    #[tokio::test]
    async fn test_stop_while_binding_ends_start() {
        let transport = Arc::new(HttpTransport::new(
            Dispatcher::new(),
            ListenConfig::new("127.0.0.1", 0),
        ));
        let parked = transport.listener.lock().await;
        let task = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.start().await })
        };
        while !transport.is_running() {
            tokio::task::yield_now().await;
        }

        transport.stop().unwrap();
        drop(parked);

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("start ignored the stop")
            .unwrap();
        assert!(result.is_ok());
        assert!(!transport.is_running());
        assert!(transport.local_addr().is_none());
        assert!(transport.listener.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_start_after_stop_serves_until_next_stop() {
        let transport = Arc::new(HttpTransport::new(
            Dispatcher::new(),
            ListenConfig::new("127.0.0.1", 0),
        ));
        transport.stop().unwrap();

        let task = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.start().await })
        };
        let addr = loop {
            if let Some(addr) = transport.local_addr() {
                break addr;
            }
            tokio::task::yield_now().await;
        };
        assert!(transport.is_running());
        assert!(tokio::net::TcpStream::connect(addr).await.is_ok());

        transport.stop().unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("run ignored the stop")
            .unwrap();
        assert!(result.is_ok());
        assert!(!transport.is_running());
    }
}
