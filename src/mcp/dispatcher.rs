//! Message dispatcher
//!
//! Resolves the entity named by a decoded envelope, invokes its handler and
//! shapes the result. Every transport routes inbound messages through
//! [`Dispatcher::dispatch`], so the routing and error wording are identical
//! whichever transport is in use.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::error::{McpError, Result};
use crate::mcp::registry::Registry;
use crate::mcp::types::{Envelope, MessageKind};

/// Cloneable handle over the shared registry.
///
/// The registry lock is held only while looking an entity up; handlers run
/// with no lock held.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    registry: Arc<RwLock<Registry>>,
}

impl Dispatcher {
    /// Create a dispatcher over an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher over an existing registry
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
        }
    }

    /// Shared read access to the registry
    pub fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Exclusive access to the registry, used during setup
    pub fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decode `message` and route it by its `type`.
    ///
    /// # Arguments
    ///
    /// * `message` - Raw inbound JSON value
    ///
    /// # Returns
    ///
    /// The shaped handler result
    ///
    /// # Errors
    ///
    /// - Protocol errors for non-object messages and missing or unknown
    ///   `type` values
    /// - Validation errors for mistyped envelope fields
    /// - Not-found errors for unknown names or URIs
    /// - Whatever the handler itself returns
    ///
    /// # Examples
    ///
    /// ```
    /// use mcphost::mcp::dispatcher::Dispatcher;
    /// use serde_json::json;
    ///
    /// let dispatcher = Dispatcher::new();
    /// dispatcher.registry_mut().add_tool(
    ///     "greet",
    ///     |_| Ok(json!({"status": "success", "message": "Hello, World!"})),
    ///     None,
    /// );
    ///
    /// let reply = dispatcher
    ///     .dispatch(&json!({"type": "tool_call", "name": "greet", "arguments": {}}))
    ///     .unwrap();
    /// assert_eq!(reply, json!({"status": "success", "message": "Hello, World!"}));
    /// ```
    pub fn dispatch(&self, message: &Value) -> Result<Value> {
        let envelope = Envelope::from_value(message)?;
        tracing::debug!(
            target: "mcphost::dispatch",
            kind = ?envelope.kind,
            name = %envelope.name,
            uri = %envelope.uri,
            "dispatching message"
        );

        match envelope.kind {
            MessageKind::ToolCall => self.handle_tool_call(&envelope.name, &envelope.arguments),
            MessageKind::ResourceRequest => self.handle_resource_request(&envelope.uri),
            MessageKind::PromptRequest => {
                self.handle_prompt_request(&envelope.name, &envelope.arguments)
            }
        }
    }

    /// Invoke the tool registered under `name`.
    ///
    /// A map result is returned unchanged; any other value is wrapped in a
    /// one-element list.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::UnknownTool`] when nothing is registered, or the
    /// handler's own error.
    pub fn handle_tool_call(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value> {
        let tool = self
            .registry()
            .tool(name)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?;

        match tool.execute(arguments)? {
            result @ Value::Object(_) => Ok(result),
            other => Ok(Value::Array(vec![other])),
        }
    }

    /// Read the resource registered at `uri`.
    ///
    /// A non-map result is wrapped as `{"content": value}`; a declared MIME
    /// type is added under `mime_type`.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::UnknownResource`] when nothing is registered, or
    /// the handler's own error.
    pub fn handle_resource_request(&self, uri: &str) -> Result<Value> {
        let resource = self
            .registry()
            .resource(uri)
            .ok_or_else(|| McpError::UnknownResource(uri.to_string()))?;

        let mut result = match resource.read()? {
            Value::Object(map) => map,
            other => {
                let mut wrapped = Map::new();
                wrapped.insert("content".to_string(), other);
                wrapped
            }
        };
        if let Some(mime_type) = resource.mime_type() {
            result.insert("mime_type".to_string(), Value::String(mime_type.to_string()));
        }

        Ok(Value::Object(result))
    }

    /// Render the prompt registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::UnknownPrompt`] when nothing is registered, or the
    /// handler's own error.
    pub fn handle_prompt_request(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Value> {
        let prompt = self
            .registry()
            .prompt(name)
            .ok_or_else(|| McpError::UnknownPrompt(name.to_string()))?;

        prompt.render(arguments)
    }
}
