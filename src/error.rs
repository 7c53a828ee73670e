//! Error types for mcphost
//!
//! This module defines the error taxonomy shared by the registry, the
//! dispatcher, the notification channel and every transport, using
//! `thiserror` for ergonomic error handling.
//!
//! Errors propagate as [`anyhow::Error`]; transports recover the taxonomy
//! with [`ErrorKind::of`] to decide how a failure is reported on the wire
//! (HTTP status code, `{"error": ...}` reply, or a silent drop).

use thiserror::Error;

/// Main error type for mcphost operations
///
/// Display strings are part of the wire contract: stdio and WebSocket
/// clients receive them inside `{"error": ...}` and HTTP clients receive them
/// as the bare response body. Do not add prefixes to the lookup variants.
#[derive(Error, Debug)]
pub enum McpError {
    /// An operation that needs a transport ran before one was attached
    #[error("Transport must be set before {0}")]
    TransportNotSet(&'static str),

    /// Configuration file or override is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// No tool registered under the requested name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// No resource registered under the requested URI
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// No prompt registered under the requested name
    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    /// `remove_resource` was called for a URI that is not registered
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Strict resource registration hit an existing URI
    #[error("Resource already exists: {0}")]
    ResourceExists(String),

    /// Invalid input value (progress total, logging level, template
    /// parameters, envelope field types, root URIs)
    #[error("{0}")]
    Validation(String),

    /// The message is not a routable envelope
    #[error("{0}")]
    Protocol(String),

    /// Transport-level failure (bind, encode, lifecycle misuse)
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a failure, used by transports to pick the
/// reporting channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required collaborator (transport, config) is missing or invalid
    Configuration,
    /// Unknown tool, resource or prompt
    NotFound,
    /// Invalid input values
    Validation,
    /// Unroutable or undecodable message
    Protocol,
    /// Anything else, including handler-defined failures
    Internal,
}

impl McpError {
    /// Returns the taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpError::TransportNotSet(_) | McpError::Config(_) => ErrorKind::Configuration,
            McpError::UnknownTool(_)
            | McpError::UnknownResource(_)
            | McpError::UnknownPrompt(_)
            | McpError::ResourceNotFound(_) => ErrorKind::NotFound,
            McpError::ResourceExists(_) | McpError::Validation(_) => ErrorKind::Validation,
            McpError::Protocol(_) => ErrorKind::Protocol,
            McpError::Transport(_) | McpError::Io(_) | McpError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl ErrorKind {
    /// Classify a propagated error.
    ///
    /// Errors that did not originate from [`McpError`] (for example a tool
    /// handler's own `anyhow!` failure) are [`ErrorKind::Internal`].
    ///
    /// # Examples
    ///
    /// ```
    /// use mcphost::error::{ErrorKind, McpError};
    ///
    /// let err = anyhow::Error::from(McpError::UnknownTool("missing".into()));
    /// assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
    ///
    /// let err = anyhow::anyhow!("handler exploded");
    /// assert_eq!(ErrorKind::of(&err), ErrorKind::Internal);
    /// ```
    pub fn of(error: &anyhow::Error) -> Self {
        error
            .downcast_ref::<McpError>()
            .map(McpError::kind)
            .unwrap_or(ErrorKind::Internal)
    }

    /// Whether the failure was caused by the caller's input
    pub fn is_client_error(self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::Protocol)
    }
}

/// Result type alias for mcphost operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing handler-defined errors to flow through the dispatcher unchanged.
pub type Result<T> = anyhow::Result<T>;
