//! Stdio transport
//!
//! This module implements [`StdioTransport`], which reads newline-delimited
//! JSON from one input stream and writes newline-delimited JSON to one
//! output stream. By default these are the process's stdin and stdout.
//!
//! # Protocol
//!
//! - Each inbound line is decoded and routed through the [`Dispatcher`].
//! - Lines that are not valid JSON are dropped; they are logged via
//!   `tracing::debug!` and produce no output.
//! - A dispatch failure is answered with `{"error": "<message>"}`.
//! - Every outbound message (replies included) is written as one line and
//!   appended to the receive queue.
//!
//! # Lifecycle
//!
//! [`Transport::start`] runs a single cooperative loop that interleaves
//! reading input with flushing queued output, so a handler that blocks
//! stalls both. The loop ends on end of input or on [`Transport::stop`].
//! The streams are consumed by the first `start`; a stdio transport cannot
//! be restarted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{McpError, Result};
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::transport::{error_reply, MessageQueue, Transport};

const TARGET: &str = "mcphost::transport::stdio";

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Line-delimited JSON transport over a reader/writer pair.
///
/// # Examples
///
/// ```
/// use mcphost::mcp::dispatcher::Dispatcher;
/// use mcphost::mcp::transport::stdio::StdioTransport;
/// use mcphost::mcp::transport::Transport;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let input: &[u8] = b"{\"type\":\"tool_call\",\"name\":\"missing\"}\n";
/// let (output, _peer) = tokio::io::duplex(1024);
/// let transport = StdioTransport::with_streams(Dispatcher::new(), input, output);
///
/// transport.start().await?;
///
/// let reply = transport.receive().unwrap();
/// assert_eq!(reply["error"], "Unknown tool: missing");
/// # Ok(())
/// # }
/// ```
pub struct StdioTransport {
    dispatcher: Dispatcher,
    reader: Mutex<Option<BoxedReader>>,
    writer: Mutex<Option<BoxedWriter>>,
    out_tx: mpsc::UnboundedSender<String>,
    out_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    queue: MessageQueue,
    cancel: CancellationToken,
    running: AtomicBool,
}

impl StdioTransport {
    /// Create a transport bound to the process's stdin and stdout.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_streams(dispatcher, tokio::io::stdin(), tokio::io::stdout())
    }

    /// Create a transport bound to arbitrary streams.
    ///
    /// # Arguments
    ///
    /// * `dispatcher` - Routes decoded lines
    /// * `reader` - Source of newline-delimited JSON
    /// * `writer` - Sink for replies and server-initiated messages
    pub fn with_streams<R, W>(dispatcher: Dispatcher, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        Self {
            dispatcher,
            reader: Mutex::new(Some(Box::new(reader))),
            writer: Mutex::new(Some(Box::new(writer))),
            out_tx,
            out_rx: Mutex::new(Some(out_rx)),
            queue: MessageQueue::new(),
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Decode and dispatch one inbound line, sending the reply.
    ///
    /// Blank lines and lines that are not valid JSON produce no output.
    pub fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(target: TARGET, "dropping undecodable line: {}", e);
                return;
            }
        };

        let reply = match self.dispatcher.dispatch(&message) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(target: TARGET, "dispatch failed: {}", e);
                error_reply(&e)
            }
        };

        if let Err(e) = self.send(reply) {
            tracing::warn!(target: TARGET, "failed to send reply: {}", e);
        }
    }

    fn take_streams(
        &self,
    ) -> Option<(BoxedReader, BoxedWriter, mpsc::UnboundedReceiver<String>)> {
        let reader = take(&self.reader)?;
        let writer = take(&self.writer)?;
        let out_rx = take(&self.out_rx)?;
        Some((reader, writer, out_rx))
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

async fn write_line(writer: &mut BoxedWriter, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    /// Run the read/dispatch/write loop until end of input or `stop`.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Transport`] if the streams were already consumed
    /// by an earlier `start`, or [`McpError::Io`] if reading or writing
    /// fails.
    async fn start(&self) -> Result<()> {
        let (reader, mut writer, mut out_rx) = self
            .take_streams()
            .ok_or_else(|| McpError::Transport("Transport already started".to_string()))?;

        self.running.store(true, Ordering::SeqCst);
        tracing::info!(target: TARGET, "stdio transport started");

        let mut lines = BufReader::new(reader).lines();
        let result: Result<()> = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break Ok(()),
                Some(line) = out_rx.recv() => {
                    if let Err(e) = write_line(&mut writer, &line).await {
                        break Err(McpError::Io(e).into());
                    }
                }
                next = lines.next_line() => match next {
                    Ok(Some(line)) => self.handle_line(&line),
                    Ok(None) => {
                        tracing::debug!(target: TARGET, "end of input");
                        break Ok(());
                    }
                    Err(e) => break Err(McpError::Io(e).into()),
                },
            }
        };

        while let Ok(line) = out_rx.try_recv() {
            if let Err(e) = write_line(&mut writer, &line).await {
                tracing::warn!(target: TARGET, "failed to flush pending output: {}", e);
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!(target: TARGET, "stdio transport stopped");
        result
    }

    fn stop(&self) -> Result<()> {
        self.cancel.cancel();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Encode `message` as one line of output and append it to the queue.
    fn send(&self, message: Value) -> Result<()> {
        let line = serde_json::to_string(&message)
            .map_err(|e| McpError::Transport(format!("Failed to encode message: {}", e)))?;
        self.queue.push(message);
        self.out_tx
            .send(line)
            .map_err(|_| McpError::Transport("output channel closed".to_string()))?;
        Ok(())
    }

    fn receive(&self) -> Option<Value> {
        self.queue.pop()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioTransport")
            .field("running", &self.is_running())
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    fn dispatcher() -> Dispatcher {
        let dispatcher = Dispatcher::new();
        dispatcher.registry_mut().add_tool(
            "greet",
            |_| Ok(json!({"status": "success", "message": "Hello, World!"})),
            None,
        );
        dispatcher
    }

    /// Runs the transport to end of input; the writer is dropped when
    /// `start` returns, so the peer reads to EOF.
    async fn run(input: &'static [u8]) -> (StdioTransport, String) {
        let (output, mut peer) = tokio::io::duplex(64 * 1024);
        let transport = StdioTransport::with_streams(dispatcher(), input, output);
        transport.start().await.unwrap();

        let mut written = String::new();
        peer.read_to_string(&mut written).await.unwrap();
        (transport, written)
    }

    #[tokio::test]
    async fn test_dispatches_each_line() {
        let (_, written) = run(b"{\"type\":\"tool_call\",\"name\":\"greet\",\"arguments\":{}}\n\
                                 {\"type\":\"unknown_kind\"}\n")
        .await;
        let lines: Vec<Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({"status": "success", "message": "Hello, World!"}),
                json!({"error": "Unknown message type: unknown_kind"}),
            ]
        );
    }

    #[tokio::test]
    async fn test_undecodable_lines_produce_no_output() {
        let (transport, written) = run(b"not json\n\n{broken\n").await;
        assert!(transport.receive().is_none());
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_non_object_json_gets_protocol_error() {
        let (transport, _) = run(b"[1,2,3]\n").await;
        assert_eq!(
            transport.receive(),
            Some(json!({"error": "Message must be a JSON object"}))
        );
    }

    #[tokio::test]
    async fn test_replies_are_queued_in_order() {
        let (transport, _) =
            run(b"{\"type\":\"tool_call\",\"name\":\"missing\"}\n{\"type\":\"tool_call\",\"name\":\"greet\"}\n")
                .await;
        assert_eq!(
            transport.receive(),
            Some(json!({"error": "Unknown tool: missing"}))
        );
        assert_eq!(transport.receive().unwrap()["status"], "success");
        assert!(transport.receive().is_none());
    }

    #[tokio::test]
    async fn test_send_writes_line_and_queues() {
        let (output, mut peer) = tokio::io::duplex(1024);
        let transport = StdioTransport::with_streams(Dispatcher::new(), &b""[..], output);
        transport.send(json!({"type": "log", "data": "x"})).unwrap();
        transport.start().await.unwrap();

        let mut written = String::new();
        peer.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "{\"type\":\"log\",\"data\":\"x\"}\n");
        assert_eq!(transport.receive(), Some(json!({"type": "log", "data": "x"})));
    }

    #[tokio::test]
    async fn test_second_start_fails() {
        let (output, _peer) = tokio::io::duplex(1024);
        let transport = StdioTransport::with_streams(Dispatcher::new(), &b""[..], output);
        transport.start().await.unwrap();
        let err = transport.start().await.unwrap_err();
        assert!(err.to_string().contains("Transport already started"));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_ends_loop() {
        let (input, _keep_open) = tokio::io::duplex(1024);
        let (output, _peer) = tokio::io::duplex(1024);
        let transport = std::sync::Arc::new(StdioTransport::with_streams(
            Dispatcher::new(),
            input,
            output,
        ));

        let runner = {
            let transport = std::sync::Arc::clone(&transport);
            tokio::spawn(async move { transport.start().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(transport.is_running());

        transport.stop().unwrap();
        transport.stop().unwrap();
        runner.await.unwrap().unwrap();
        assert!(!transport.is_running());
    }
}
