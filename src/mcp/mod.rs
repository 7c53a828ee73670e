//! Protocol server core
//!
//! This module exposes tools, resources and prompts to an external caller
//! through a uniform JSON envelope, delivered over interchangeable
//! transports.
//!
//! # Module Layout
//!
//! - `types`         -- Envelope decoding, identity, roots, logging levels
//! - `capabilities`  -- Tri-state capability descriptors
//! - `sampling`      -- Model sampling preferences
//! - `entities`      -- Tool, Resource, ResourceTemplate, Prompt and their
//!   executor traits
//! - `registry`      -- Keyed collections of every entity
//! - `dispatcher`    -- Envelope routing and result shaping
//! - `notifications` -- Progress and logging side channel
//! - `transport`     -- `Transport` trait with stdio, HTTP and WebSocket
//!   implementations
//! - `server`        -- Composition of all of the above

pub mod capabilities;
pub mod dispatcher;
pub mod entities;
pub mod notifications;
pub mod registry;
pub mod sampling;
pub mod server;
pub mod transport;
pub mod types;

pub use capabilities::{ClientCapabilities, ServerCapabilities, TriState};
pub use dispatcher::Dispatcher;
pub use entities::{
    Prompt, PromptProvider, Resource, ResourceProvider, ResourceTemplate, Tool, ToolExecutor,
};
pub use notifications::NotificationChannel;
pub use registry::Registry;
pub use sampling::ModelPreferences;
pub use server::Server;
pub use transport::{ListenConfig, Transport, TransportKind};
pub use types::{Implementation, LoggingLevel, ProgressToken, Root};
