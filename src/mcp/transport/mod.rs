//! Transport abstraction and implementations
//!
//! This module defines the [`Transport`] trait that every transport must
//! satisfy. Concrete implementations live in submodules:
//!
//! - [`stdio::StdioTransport`] -- newline-delimited JSON over one input and
//!   one output stream (process stdin/stdout by default).
//! - [`http::HttpTransport`] -- one request, one response, served by axum.
//! - [`websocket::WebSocketTransport`] -- persistent multi-connection
//!   server with broadcast `send`.
//! - `fake::FakeTransport` -- in-process recorder used in unit tests
//!   (cfg(test) only).
//!
//! # Design
//!
//! A transport owns its inbound loop and hands every decoded message to a
//! [`Dispatcher`]. Server-initiated messages (progress, logs, completion
//! requests) go out through [`Transport::send`], which also appends them to
//! an internal FIFO queue drained by [`Transport::receive`].

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::mcp::dispatcher::Dispatcher;

pub mod http;
pub mod stdio;
pub mod websocket;

#[cfg(test)]
pub mod fake;

/// Bidirectional message channel.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mcphost::mcp::dispatcher::Dispatcher;
/// use mcphost::mcp::transport::{create, ListenConfig, Transport, TransportKind};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport: Arc<dyn Transport> =
///     create(TransportKind::Http, Dispatcher::new(), ListenConfig::default());
/// transport.start().await?;
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Begin accepting input. Resolves once the transport has stopped.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport cannot bind or is already
    /// running.
    async fn start(&self) -> Result<()>;

    /// Stop accepting new work and release held connections. Idempotent.
    ///
    /// # Errors
    ///
    /// Implementations currently never fail; the signature leaves room for
    /// transports whose shutdown can.
    fn stop(&self) -> Result<()>;

    /// Deliver or enqueue exactly one message.
    ///
    /// # Errors
    ///
    /// Returns an error when the message cannot be encoded or the
    /// transport's output has gone away.
    fn send(&self, message: Value) -> Result<()>;

    /// Pop the oldest queued message, or `None` immediately.
    fn receive(&self) -> Option<Value>;

    /// Whether [`Transport::start`] is currently running
    fn is_running(&self) -> bool;
}

/// Number of messages a [`MessageQueue`] keeps before dropping the oldest
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Bounded FIFO of messages pushed by [`Transport::send`].
///
/// A running server may never call [`Transport::receive`], so once the
/// queue holds `capacity` messages each push evicts the oldest one.
#[derive(Debug)]
pub struct MessageQueue {
    inner: Mutex<VecDeque<Value>>,
    capacity: usize,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl MessageQueue {
    /// Create an empty queue holding at most [`DEFAULT_QUEUE_CAPACITY`]
    /// messages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue holding at most `capacity` messages (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append a message, evicting the oldest when the queue is full
    pub fn push(&self, message: Value) {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            tracing::debug!(
                target: "mcphost::transport",
                capacity = self.capacity,
                "receive queue full, dropped oldest message"
            );
        }
        queue.push_back(message);
    }

    /// Remove and return the oldest message
    pub fn pop(&self) -> Option<Value> {
        self.lock().pop_front()
    }

    /// Drop every queued message
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Value>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Available transport implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Line-delimited JSON over stdin/stdout
    #[default]
    Stdio,
    /// One-shot HTTP request/response
    Http,
    /// Persistent WebSocket connections
    #[serde(alias = "ws")]
    WebSocket,
}

impl TransportKind {
    /// Whether the transport listens on a network socket
    pub fn is_network(self) -> bool {
        !matches!(self, TransportKind::Stdio)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
            TransportKind::WebSocket => write!(f, "websocket"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = McpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "http" => Ok(TransportKind::Http),
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            other => Err(McpError::Config(format!(
                "Unknown transport type: {}",
                other
            ))),
        }
    }
}

/// Address a network transport binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind; `0` picks an ephemeral port
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ListenConfig {
    /// Create a listen address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form accepted by `TcpListener::bind`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Construct the transport for `kind`.
///
/// # Arguments
///
/// * `kind` - Which implementation to build
/// * `dispatcher` - Routes inbound messages
/// * `listen` - Bind address; ignored by stdio
pub fn create(kind: TransportKind, dispatcher: Dispatcher, listen: ListenConfig) -> Arc<dyn Transport> {
    match kind {
        TransportKind::Stdio => Arc::new(stdio::StdioTransport::new(dispatcher)),
        TransportKind::Http => Arc::new(http::HttpTransport::new(dispatcher, listen)),
        TransportKind::WebSocket => {
            Arc::new(websocket::WebSocketTransport::new(dispatcher, listen))
        }
    }
}

/// Build the `{"error": message}` reply used by streaming transports
pub(crate) fn error_reply(error: &anyhow::Error) -> Value {
    serde_json::json!({ "error": error.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queue_is_fifo() {
        let queue = MessageQueue::new();
        assert!(queue.pop().is_none());
        queue.push(json!(1));
        queue.push(json!(2));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(json!(1)));
        assert_eq!(queue.pop(), Some(json!(2)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_evicts_oldest_when_full() {
        let queue = MessageQueue::with_capacity(2);
        for n in 1..=5 {
            queue.push(serde_json::json!({"n": n}));
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(serde_json::json!({"n": 4})));
        assert_eq!(queue.pop(), Some(serde_json::json!({"n": 5})));
        assert!(queue.is_empty());
        assert_eq!(MessageQueue::with_capacity(0).capacity, 1);
    }

    #[test]
    fn test_queue_clear() {
        let queue = MessageQueue::new();
        queue.push(json!("a"));
        queue.clear();
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_transport_kind_parsing() {
        assert_eq!("stdio".parse::<TransportKind>().unwrap(), TransportKind::Stdio);
        assert_eq!("HTTP".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert_eq!("ws".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert_eq!(
            "websocket".parse::<TransportKind>().unwrap(),
            TransportKind::WebSocket
        );
        let err = "carrier-pigeon".parse::<TransportKind>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown transport type: carrier-pigeon"
        );
    }

    #[test]
    fn test_transport_kind_serde() {
        let kind: TransportKind = serde_json::from_value(json!("ws")).unwrap();
        assert_eq!(kind, TransportKind::WebSocket);
        assert_eq!(
            serde_json::to_value(TransportKind::WebSocket).unwrap(),
            json!("websocket")
        );
        assert!(TransportKind::Http.is_network());
        assert!(!TransportKind::Stdio.is_network());
    }

    #[test]
    fn test_listen_config_default_address() {
        assert_eq!(ListenConfig::default().address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_error_reply_shape() {
        let err = anyhow::Error::from(McpError::UnknownTool("x".into()));
        assert_eq!(error_reply(&err), json!({"error": "Unknown tool: x"}));
    }
}
