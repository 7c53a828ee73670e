//! In-process fake transport for unit tests
//!
//! [`FakeTransport`] records every message passed to [`Transport::send`]
//! and lets a test preload the receive queue, so server-side behaviour can
//! be checked without binding sockets or touching stdio.
//!
//! # Example
//!
//! ```ignore
//! let transport = FakeTransport::new();
//! transport.send(serde_json::json!({"type": "log"})).unwrap();
//! assert_eq!(transport.sent().len(), 1);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::mcp::transport::{MessageQueue, Transport};

/// Recording transport.
#[derive(Debug, Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<Value>>,
    queue: MessageQueue,
    cancel: CancellationToken,
    running: AtomicBool,
}

impl FakeTransport {
    /// Create an idle fake
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message sent so far, oldest first
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Make `message` the next value returned by `receive` once earlier
    /// entries are drained
    pub fn inject(&self, message: Value) {
        self.queue.push(message);
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    /// Marks the fake running and waits for `stop`.
    async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        self.cancel.cancelled().await;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.cancel.cancel();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, message: Value) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
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
