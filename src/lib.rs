//! mcphost - protocol server library
//!
//! This library exposes tools, resources and prompts to an orchestrating
//! client through a uniform JSON message envelope, over line-delimited
//! stdio, one-shot HTTP or persistent WebSocket connections.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `mcp`: registry, dispatcher, transports, notifications and the server
//! - `config`: Configuration management and validation
//! - `demo`: Demonstration capabilities served by the binary
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use mcphost::mcp::{Server, TransportKind, ListenConfig};
//! use mcphost::Config;
//! use serde_json::json;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let mut server = Server::new(config.implementation());
//!     server.add_tool("ping", |_| Ok(json!({"pong": true})), None);
//!     server.create_transport(TransportKind::Stdio, ListenConfig::default());
//!     server.start()
//! }
//! ```

pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod mcp;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorKind, McpError, Result};
pub use mcp::Server;
