//! Invocable entities: tools, resources, resource templates and prompts
//!
//! Each capability kind is a single-method executor trait
//! ([`ToolExecutor`], [`ResourceProvider`], [`PromptProvider`]). The
//! concrete [`Tool`], [`Resource`] and [`Prompt`] types implement them by
//! storing an owned boxed closure, so callers can register either a plain
//! closure or their own trait implementation.
//!
//! Handlers are synchronous. A handler that blocks stalls the transport
//! that invoked it until it returns.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{McpError, Result};

/// Boxed tool handler: arguments in, result out
pub type ToolHandler = Box<dyn Fn(&Map<String, Value>) -> Result<Value> + Send + Sync>;

/// Boxed resource handler producing the resource content
pub type ResourceHandler = Box<dyn Fn() -> Result<Value> + Send + Sync>;

/// Boxed prompt handler receiving the merged arguments
pub type PromptHandler = Box<dyn Fn(&Map<String, Value>) -> Result<Value> + Send + Sync>;

// ---------------------------------------------------------------------------
// Executor traits
// ---------------------------------------------------------------------------

/// A named callable capability.
///
/// # Examples
///
/// ```
/// use mcphost::error::Result;
/// use mcphost::mcp::entities::ToolExecutor;
/// use serde_json::{json, Map, Value};
///
/// struct Echo;
///
/// impl ToolExecutor for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn execute(&self, arguments: &Map<String, Value>) -> Result<Value> {
///         Ok(Value::Object(arguments.clone()))
///     }
/// }
///
/// let mut args = Map::new();
/// args.insert("text".into(), json!("hi"));
/// assert_eq!(Echo.execute(&args).unwrap(), json!({"text": "hi"}));
/// ```
pub trait ToolExecutor: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> Option<&str> {
        None
    }

    /// Parameter schema
    fn parameters(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Run the tool.
    ///
    /// # Arguments
    ///
    /// * `arguments` - Caller-supplied arguments
    ///
    /// # Errors
    ///
    /// Any handler-defined failure; it is reported to the caller verbatim.
    fn execute(&self, arguments: &Map<String, Value>) -> Result<Value>;
}

/// A URI-addressed piece of content.
pub trait ResourceProvider: Send + Sync {
    /// Registry key
    fn uri(&self) -> &str;

    /// Declared MIME type, merged into read results when present
    fn mime_type(&self) -> Option<&str> {
        None
    }

    /// Human-readable description
    fn description(&self) -> Option<&str> {
        None
    }

    /// Produce the current content
    fn read(&self) -> Result<Value>;
}

/// A named prompt renderer.
pub trait PromptProvider: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> Option<&str> {
        None
    }

    /// Ordered content list
    fn messages(&self) -> Vec<Value> {
        Vec::new()
    }

    /// Arguments applied underneath the caller's arguments
    fn default_arguments(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Render the prompt for the caller's arguments
    fn render(&self, arguments: &Map<String, Value>) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// Closure-backed tool.
pub struct Tool {
    name: String,
    description: Option<String>,
    parameters: Map<String, Value>,
    handler: ToolHandler,
}

impl Tool {
    /// Create a tool from a handler closure
    ///
    /// # Arguments
    ///
    /// * `name` - Registry key
    /// * `handler` - Function invoked with the call arguments
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            parameters: Map::new(),
            handler: Box::new(handler),
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a parameter schema
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Replace the parameter schema
    pub fn set_parameters(&mut self, parameters: Map<String, Value>) {
        self.parameters = parameters;
    }
}

impl ToolExecutor for Tool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn parameters(&self) -> Map<String, Value> {
        self.parameters.clone()
    }

    fn execute(&self, arguments: &Map<String, Value>) -> Result<Value> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// Closure-backed resource.
pub struct Resource {
    uri: String,
    mime_type: Option<String>,
    description: Option<String>,
    handler: ResourceHandler,
}

impl Resource {
    /// Create a resource whose content is produced on every read
    pub fn new<F>(uri: impl Into<String>, handler: F) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            uri: uri.into(),
            mime_type: None,
            description: None,
            handler: Box::new(handler),
        }
    }

    /// Create a resource that always returns `content`
    pub fn from_static(uri: impl Into<String>, content: Value) -> Self {
        Self::new(uri, move || Ok(content.clone()))
    }

    /// Attach a MIME type
    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    /// Attach a description
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

impl ResourceProvider for Resource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn read(&self) -> Result<Value> {
        (self.handler)()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("uri", &self.uri)
            .field("mime_type", &self.mime_type)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Resource templates
// ---------------------------------------------------------------------------

fn placeholder_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let compiled = Regex::new(r"\{([A-Za-z0-9_]+)\}")
        .map_err(|e| McpError::Validation(format!("Invalid placeholder pattern: {}", e)))?;
    Ok(PATTERN.get_or_init(|| compiled))
}

fn placeholder_value(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(McpError::Validation(format!(
            "Invalid value for template parameter: {}",
            key
        ))
        .into()),
    }
}

/// A parameterised URI pattern such as `/users/{id}/posts/{post_id}`.
///
/// # Examples
///
/// ```
/// use mcphost::mcp::entities::ResourceTemplate;
/// use serde_json::{json, Map};
///
/// let template = ResourceTemplate::new("user_posts", "/users/{id}/posts/{post_id}");
/// let mut params = Map::new();
/// params.insert("id".into(), json!("42"));
/// params.insert("post_id".into(), json!(7));
/// assert_eq!(template.expand_uri(&params).unwrap(), "/users/42/posts/7");
/// ```
#[derive(Debug, Clone)]
pub struct ResourceTemplate {
    name: String,
    uri_template: String,
    parameters: Map<String, Value>,
    mime_type: Option<String>,
    description: Option<String>,
    annotations: Map<String, Value>,
}

impl ResourceTemplate {
    /// Create a template with no default parameters
    pub fn new(name: impl Into<String>, uri_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri_template: uri_template.into(),
            parameters: Map::new(),
            mime_type: None,
            description: None,
            annotations: Map::new(),
        }
    }

    /// Set the default parameters used by [`ResourceTemplate::render`]
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the MIME type inherited by created resources
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the description inherited by created resources
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set free-form annotations
    pub fn with_annotations(mut self, annotations: Map<String, Value>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw pattern, placeholders intact
    pub fn uri_template(&self) -> &str {
        &self.uri_template
    }

    /// Default parameters
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// MIME type
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Annotations
    pub fn annotations(&self) -> &Map<String, Value> {
        &self.annotations
    }

    /// Substitute every `{placeholder}` with the matching entry of
    /// `parameters`. Template defaults are not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Validation`] when a placeholder has no value or
    /// the value is not a string, number or boolean.
    pub fn expand_uri(&self, parameters: &Map<String, Value>) -> Result<String> {
        let mut expanded = String::with_capacity(self.uri_template.len());
        let mut last = 0;

        for captures in placeholder_pattern()?.captures_iter(&self.uri_template) {
            let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let value = parameters.get(key.as_str()).ok_or_else(|| {
                McpError::Validation(format!("Missing template parameter: {}", key.as_str()))
            })?;

            expanded.push_str(&self.uri_template[last..whole.start()]);
            expanded.push_str(&placeholder_value(key.as_str(), value)?);
            last = whole.end();
        }
        expanded.push_str(&self.uri_template[last..]);

        Ok(expanded)
    }

    /// Expand with the template defaults overlaid by `parameters`
    ///
    /// # Errors
    ///
    /// Same as [`ResourceTemplate::expand_uri`].
    pub fn render(&self, parameters: &Map<String, Value>) -> Result<String> {
        let mut merged = self.parameters.clone();
        merged.extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.expand_uri(&merged)
    }

    /// Build a concrete resource at the expanded URI whose content is the
    /// arguments object. MIME type and description are inherited.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceTemplate::expand_uri`].
    pub fn create_resource(&self, arguments: &Map<String, Value>) -> Result<Resource> {
        let uri = self.expand_uri(arguments)?;
        Ok(Resource::from_static(uri, Value::Object(arguments.clone()))
            .with_mime_type(self.mime_type.clone())
            .with_description(self.description.clone()))
    }

    /// Resource registered alongside the template: reads render the URI
    /// from the defaults at call time.
    pub(crate) fn derived_resource(self: &Arc<Self>, uri: impl Into<String>) -> Resource {
        let template = Arc::clone(self);
        Resource::new(uri, move || {
            template.render(&Map::new()).map(Value::String)
        })
        .with_mime_type(self.mime_type.clone())
        .with_description(self.description.clone())
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Closure-backed prompt.
pub struct Prompt {
    name: String,
    description: Option<String>,
    messages: Vec<Value>,
    default_arguments: Map<String, Value>,
    handler: PromptHandler,
}

impl Prompt {
    /// Create a prompt from a handler closure. The handler receives the
    /// default arguments overlaid by the caller's arguments.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            messages: Vec::new(),
            default_arguments: Map::new(),
            handler: Box::new(handler),
        }
    }

    /// Create a prompt that renders `{"messages": [...]}` overlaid by the
    /// caller's arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use mcphost::mcp::entities::{Prompt, PromptProvider};
    /// use serde_json::{json, Map};
    ///
    /// let prompt = Prompt::from_messages("help", vec![json!("How can I help?")]);
    /// let mut args = Map::new();
    /// args.insert("topic".into(), json!("billing"));
    /// assert_eq!(
    ///     prompt.render(&args).unwrap(),
    ///     json!({"messages": ["How can I help?"], "topic": "billing"})
    /// );
    /// ```
    pub fn from_messages(name: impl Into<String>, messages: Vec<Value>) -> Self {
        let body = messages.clone();
        let mut prompt = Self::new(name, move |arguments| {
            let mut rendered = Map::new();
            rendered.insert("messages".to_string(), Value::Array(body.clone()));
            rendered.extend(arguments.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Value::Object(rendered))
        });
        prompt.messages = messages;
        prompt
    }

    /// Attach a description
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the default arguments
    pub fn with_default_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.default_arguments = arguments;
        self
    }

    /// Replace the message list
    pub fn set_messages(&mut self, messages: Vec<Value>) {
        self.messages = messages;
    }
}

impl PromptProvider for Prompt {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn messages(&self) -> Vec<Value> {
        self.messages.clone()
    }

    fn default_arguments(&self) -> Map<String, Value> {
        self.default_arguments.clone()
    }

    fn render(&self, arguments: &Map<String, Value>) -> Result<Value> {
        let mut merged = self.default_arguments.clone();
        merged.extend(arguments.iter().map(|(k, v)| (k.clone(), v.clone())));
        (self.handler)(&merged)
    }
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prompt")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("messages", &self.messages)
            .field("default_arguments", &self.default_arguments)
            .finish_non_exhaustive()
    }
}
