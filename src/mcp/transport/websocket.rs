//! WebSocket transport
//!
//! A persistent multi-connection server built on axum's WebSocket upgrade.
//!
//! - Each connection is registered under a fresh UUID v4 when it opens and
//!   deregistered when it closes or errors.
//! - Text frames are decoded, dispatched, and answered on the originating
//!   connection only.
//! - [`Transport::send`] broadcasts one encoded copy of the message to every
//!   connected client.
//!
//! Every connection has a dedicated writer task fed by an unbounded channel,
//! so each client observes messages in the order they were sent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{McpError, Result};
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::transport::{error_reply, ListenConfig, MessageQueue, Transport};

const TARGET: &str = "mcphost::transport::websocket";

type ClientSender = mpsc::UnboundedSender<Message>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State shared by the transport and every connection task
#[derive(Debug)]
struct Hub {
    dispatcher: Dispatcher,
    clients: Mutex<HashMap<Uuid, ClientSender>>,
    cancel: Mutex<CancellationToken>,
}

impl Hub {
    fn register(&self, id: Uuid, sender: ClientSender) {
        lock(&self.clients).insert(id, sender);
    }

    fn deregister(&self, id: &Uuid) {
        lock(&self.clients).remove(id);
    }

    fn token(&self) -> CancellationToken {
        lock(&self.cancel).clone()
    }

    /// Decode and dispatch one text frame, producing the reply frame body
    fn handle_text(&self, text: &str) -> String {
        let message: Value = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => return json!({ "error": format!("Invalid JSON: {}", e) }).to_string(),
        };

        match self.dispatcher.dispatch(&message) {
            Ok(result) => result.to_string(),
            Err(e) => {
                tracing::debug!(target: TARGET, "dispatch failed: {}", e);
                error_reply(&e).to_string()
            }
        }
    }
}

/// Persistent multi-client transport.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mcphost::mcp::dispatcher::Dispatcher;
/// use mcphost::mcp::transport::websocket::WebSocketTransport;
/// use mcphost::mcp::transport::{ListenConfig, Transport};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = Arc::new(WebSocketTransport::new(
///     Dispatcher::new(),
///     ListenConfig::new("127.0.0.1", 0),
/// ));
/// let addr = transport.bind().await?;
/// println!("listening on ws://{}", addr);
/// transport.start().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WebSocketTransport {
    hub: Arc<Hub>,
    listen: ListenConfig,
    listener: tokio::sync::Mutex<Option<TcpListener>>,
    local_addr: Mutex<Option<SocketAddr>>,
    queue: MessageQueue,
    running: AtomicBool,
}

impl WebSocketTransport {
    /// Create a transport that will listen on `listen`
    pub fn new(dispatcher: Dispatcher, listen: ListenConfig) -> Self {
        Self {
            hub: Arc::new(Hub {
                dispatcher,
                clients: Mutex::new(HashMap::new()),
                cancel: Mutex::new(CancellationToken::new()),
            }),
            listen,
            listener: tokio::sync::Mutex::new(None),
            local_addr: Mutex::new(None),
            queue: MessageQueue::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Bind the listening socket ahead of [`Transport::start`].
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
        tracing::info!(target: TARGET, %addr, "websocket transport bound");
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
        let cancel = lock(&self.hub.cancel);
        if cancel.is_cancelled() {
            self.running.store(false, Ordering::SeqCst);
            *lock(&self.local_addr) = None;
        }
    }

    /// Number of currently open connections
    pub fn client_count(&self) -> usize {
        lock(&self.hub.clients).len()
    }

    fn router(&self) -> Router {
        Router::new()
            .fallback(upgrade)
            .with_state(Arc::clone(&self.hub))
    }
}

async fn upgrade(State(hub): State<Arc<Hub>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_connection(hub, socket))
}

async fn serve_connection(hub: Arc<Hub>, socket: WebSocket) {
    let id = Uuid::new_v4();
    let token = hub.token();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    hub.register(id, tx.clone());
    tracing::debug!(target: TARGET, %id, "connection opened");

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let reply = hub.handle_text(&text);
                    if tx.send(Message::Text(reply)).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(target: TARGET, %id, "connection error: {}", e);
                    break;
                }
            },
        }
    }

    hub.deregister(&id);
    let _ = tx.send(Message::Close(None));
    drop(tx);
    let _ = writer.await;
    tracing::debug!(target: TARGET, %id, "connection closed");
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    /// Accept connections until [`Transport::stop`].
    ///
    /// # Errors
    ///
    /// Returns `"Transport already started"` when called on a running
    /// transport, and bind or server I/O failures.
    async fn start(&self) -> Result<()> {
        // `running` and the token only change under the cancel lock.
        let token = {
            let mut cancel = lock(&self.hub.cancel);
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
            tracing::info!(target: TARGET, "websocket transport stopped before serving");
            return Ok(());
        }

        tracing::info!(target: TARGET, addr = ?self.local_addr(), "websocket transport started");
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(token.clone().cancelled_owned())
            .await;

        self.finish_run(&token);
        tracing::info!(target: TARGET, "websocket transport stopped");
        served.map_err(|e| anyhow::Error::from(McpError::Io(e)))
    }

    /// Close every client and the listener; clear the client table and
    /// the queue.
    fn stop(&self) -> Result<()> {
        {
            let cancel = lock(&self.hub.cancel);
            cancel.cancel();
            self.running.store(false, Ordering::SeqCst);
        }
        let clients: Vec<ClientSender> = lock(&self.hub.clients).drain().map(|(_, tx)| tx).collect();
        for client in clients {
            let _ = client.send(Message::Close(None));
        }
        self.queue.clear();
        Ok(())
    }

    /// Broadcast `message` to every connected client.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Transport`] if the message cannot be encoded.
    fn send(&self, message: Value) -> Result<()> {
        let encoded = serde_json::to_string(&message)
            .map_err(|e| McpError::Transport(format!("Failed to encode message: {}", e)))?;
        self.queue.push(message);

        let clients: Vec<(Uuid, ClientSender)> = lock(&self.hub.clients)
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();
        for (id, client) in clients {
            if client.send(Message::Text(encoded.clone())).is_err() {
                tracing::debug!(target: TARGET, %id, "client went away during broadcast");
            }
        }
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
    use std::time::Duration;

    fn hub() -> Hub {
        let dispatcher = Dispatcher::new();
        dispatcher
            .registry_mut()
            .add_tool("greet", |_| Ok(json!({"message": "hi"})), None);
        Hub {
            dispatcher,
            clients: Mutex::new(HashMap::new()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    #[test]
    fn test_handle_text_dispatches() {
        let reply = hub().handle_text(r#"{"type":"tool_call","name":"greet"}"#);
        assert_eq!(
            serde_json::from_str::<Value>(&reply).unwrap(),
            json!({"message": "hi"})
        );
    }

    #[test]
    fn test_handle_text_invalid_json() {
        let reply: Value = serde_json::from_str(&hub().handle_text("{oops")).unwrap();
        assert!(reply["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON: "));
    }

    #[test]
    fn test_handle_text_dispatch_error() {
        let reply: Value =
            serde_json::from_str(&hub().handle_text(r#"{"type":"unknown_kind"}"#)).unwrap();
        assert_eq!(reply, json!({"error": "Unknown message type: unknown_kind"}));
    }

    #[test]
    fn test_send_broadcasts_to_registered_clients() {
        let transport = WebSocketTransport::new(Dispatcher::new(), ListenConfig::default());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        transport.hub.register(Uuid::new_v4(), tx_a);
        transport.hub.register(Uuid::new_v4(), tx_b);
        assert_eq!(transport.client_count(), 2);

        transport
            .send(json!({"type": "progress", "progress": 0.5}))
            .unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.try_recv().unwrap() {
                Message::Text(text) => assert_eq!(text, r#"{"type":"progress","progress":0.5}"#),
                other => panic!("unexpected frame: {:?}", other),
            }
            assert!(rx.try_recv().is_err());
        }
        assert_eq!(transport.receive(), Some(json!({"type": "progress", "progress": 0.5})));
    }

    #[test]
    fn test_stop_clears_clients_and_queue() {
        let transport = WebSocketTransport::new(Dispatcher::new(), ListenConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.hub.register(Uuid::new_v4(), tx);
        transport.send(json!({"n": 1})).unwrap();

        transport.stop().unwrap();
        transport.stop().unwrap();

        assert_eq!(transport.client_count(), 0);
        assert!(transport.receive().is_none());
        let _ = rx.try_recv();
        assert!(matches!(rx.try_recv(), Ok(Message::Close(None))));
    }

    #[tokio::test]
    async fn test_stop_while_binding_ends_start() {
        let transport = Arc::new(WebSocketTransport::new(
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
    async fn test_restart_after_stop_while_binding() {
        let transport = Arc::new(WebSocketTransport::new(
            Dispatcher::new(),
            ListenConfig::new("127.0.0.1", 0),
        ));
        let parked = transport.listener.lock().await;
        let first = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.start().await })
        };
        while !transport.is_running() {
            tokio::task::yield_now().await;
        }
        transport.stop().unwrap();
        drop(parked);
        first.await.unwrap().unwrap();

        let second = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.start().await })
        };
        while transport.local_addr().is_none() {
            tokio::task::yield_now().await;
        }
        assert!(transport.is_running());
        let err = transport.start().await.unwrap_err();
        assert!(err.to_string().contains("Transport already started"));

        transport.stop().unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), second)
            .await
            .expect("second run ignored the stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
