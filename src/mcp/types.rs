//! Wire types shared by the dispatcher, the notification channel and every
//! transport
//!
//! All types derive `Debug`, `Clone`, `Serialize`, and `Deserialize` unless
//! noted otherwise. `Option<>` fields omit their key from JSON when `None`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::McpError;

// ---------------------------------------------------------------------------
// Envelope discriminators
// ---------------------------------------------------------------------------

/// Envelope `type` for invoking a tool.
pub const TYPE_TOOL_CALL: &str = "tool_call";
/// Envelope `type` for reading a resource.
pub const TYPE_RESOURCE_REQUEST: &str = "resource_request";
/// Envelope `type` for rendering a prompt.
pub const TYPE_PROMPT_REQUEST: &str = "prompt_request";
/// Outbound body `type` for progress notifications.
pub const TYPE_PROGRESS: &str = "progress";
/// Outbound body `type` for log notifications.
pub const TYPE_LOG: &str = "log";
/// Outbound body `type` for completion requests.
pub const TYPE_COMPLETION: &str = "completion";

/// Protocol method of a progress notification.
pub const NOTIF_PROGRESS: &str = "notifications/progress";
/// Protocol method of a logging notification.
pub const NOTIF_MESSAGE: &str = "notifications/message";
/// Protocol method of a completion request.
pub const METHOD_COMPLETION_COMPLETE: &str = "completion/complete";

// ---------------------------------------------------------------------------
// Message envelope
// ---------------------------------------------------------------------------

/// The routable message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// `tool_call`
    ToolCall,
    /// `resource_request`
    ResourceRequest,
    /// `prompt_request`
    PromptRequest,
}

impl FromStr for MessageKind {
    type Err = McpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            TYPE_TOOL_CALL => Ok(MessageKind::ToolCall),
            TYPE_RESOURCE_REQUEST => Ok(MessageKind::ResourceRequest),
            TYPE_PROMPT_REQUEST => Ok(MessageKind::PromptRequest),
            other => Err(McpError::Protocol(format!("Unknown message type: {}", other))),
        }
    }
}

/// A decoded inbound message.
///
/// Absent `name`/`uri` decode to the empty string and absent `arguments` to
/// an empty map, so a `tool_call` without a name is reported as an unknown
/// tool rather than as a malformed envelope.
///
/// # Examples
///
/// ```
/// use mcphost::mcp::types::{Envelope, MessageKind};
///
/// let msg = serde_json::json!({"type": "tool_call", "name": "greet"});
/// let envelope = Envelope::from_value(&msg).unwrap();
/// assert_eq!(envelope.kind, MessageKind::ToolCall);
/// assert_eq!(envelope.name, "greet");
/// assert!(envelope.arguments.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Routing discriminator
    pub kind: MessageKind,
    /// Tool or prompt name
    pub name: String,
    /// Resource URI
    pub uri: String,
    /// Caller-supplied arguments
    pub arguments: Map<String, Value>,
}

impl Envelope {
    /// Decode and validate an envelope.
    ///
    /// # Errors
    ///
    /// - [`McpError::Protocol`] when the value is not an object or the
    ///   `type` discriminator is missing or unrecognized.
    /// - [`McpError::Validation`] when `name`, `uri` or `arguments` has the
    ///   wrong JSON type.
    pub fn from_value(value: &Value) -> std::result::Result<Self, McpError> {
        let object = value
            .as_object()
            .ok_or_else(|| McpError::Protocol("Message must be a JSON object".to_string()))?;

        let kind = match object.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            None | Some(Value::Null) => {
                return Err(McpError::Protocol("Unknown message type: ".to_string()))
            }
            Some(other) => {
                return Err(McpError::Protocol(format!("Unknown message type: {}", other)))
            }
        };

        let name = string_field(object, "name")?;
        let uri = string_field(object, "uri")?;
        let arguments = match object.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => return Err(McpError::Validation("Invalid arguments type".to_string())),
        };

        Ok(Self {
            kind: kind.parse()?,
            name,
            uri,
            arguments,
        })
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> std::result::Result<String, McpError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(McpError::Validation(format!("Invalid {} type", key))),
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifies the server implementation by name and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Human-readable implementation name
    pub name: String,
    /// Implementation version string
    pub version: String,
}

impl Implementation {
    /// Create a new implementation descriptor
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for Implementation {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}

// ---------------------------------------------------------------------------
// Roots
// ---------------------------------------------------------------------------

/// URI scheme every root must carry.
pub const FILE_SCHEME: &str = "file://";

/// A declared filesystem base path exposed to callers.
///
/// # Examples
///
/// ```
/// use mcphost::mcp::types::Root;
///
/// let root = Root::new("file:///srv/data", Some("data".into())).unwrap();
/// assert_eq!(root.path(), "/srv/data");
/// assert_eq!(root.resolve("/reports/q1.csv"), "/srv/data/reports/q1.csv");
/// assert!(Root::new("https://example.com", None).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Root {
    uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Root {
    /// Create a root.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Validation`] when `uri` does not start with
    /// `file://`.
    pub fn new(uri: impl Into<String>, name: Option<String>) -> std::result::Result<Self, McpError> {
        let uri = uri.into();
        if !uri.starts_with(FILE_SCHEME) {
            return Err(McpError::Validation(format!(
                "Root URI must start with {}",
                FILE_SCHEME
            )));
        }
        Ok(Self { uri, name })
    }

    /// The full `file://` URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Optional display name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Filesystem path with the scheme stripped; the registry key
    pub fn path(&self) -> &str {
        &self.uri[FILE_SCHEME.len()..]
    }

    /// Join `relative` under this root
    pub fn resolve(&self, relative: &str) -> String {
        let base = self.path().trim_end_matches(std::path::MAIN_SEPARATOR);
        format!(
            "{}{}{}",
            base,
            std::path::MAIN_SEPARATOR,
            relative.trim_start_matches(std::path::MAIN_SEPARATOR)
        )
    }
}

impl<'de> Deserialize<'de> for Root {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawRoot {
            uri: String,
            #[serde(default)]
            name: Option<String>,
        }

        let raw = RawRoot::deserialize(deserializer)?;
        Root::new(raw.uri, raw.name).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Logging levels
// ---------------------------------------------------------------------------

/// Severity of a log notification, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    /// `debug`
    Debug,
    /// `info`
    Info,
    /// `notice`
    Notice,
    /// `warning`
    Warning,
    /// `error`
    Error,
    /// `critical`
    Critical,
    /// `alert`
    Alert,
    /// `emergency`
    Emergency,
}

impl LoggingLevel {
    /// Wire name of the level
    pub fn as_str(self) -> &'static str {
        match self {
            LoggingLevel::Debug => "debug",
            LoggingLevel::Info => "info",
            LoggingLevel::Notice => "notice",
            LoggingLevel::Warning => "warning",
            LoggingLevel::Error => "error",
            LoggingLevel::Critical => "critical",
            LoggingLevel::Alert => "alert",
            LoggingLevel::Emergency => "emergency",
        }
    }
}

impl fmt::Display for LoggingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggingLevel {
    type Err = McpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LoggingLevel::Debug),
            "info" => Ok(LoggingLevel::Info),
            "notice" => Ok(LoggingLevel::Notice),
            "warning" => Ok(LoggingLevel::Warning),
            "error" => Ok(LoggingLevel::Error),
            "critical" => Ok(LoggingLevel::Critical),
            "alert" => Ok(LoggingLevel::Alert),
            "emergency" => Ok(LoggingLevel::Emergency),
            other => Err(McpError::Validation(format!(
                "Invalid logging level: {}",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress tokens
// ---------------------------------------------------------------------------

/// Opaque identifier correlating successive progress notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// String token
    String(String),
    /// Integer token
    Integer(i64),
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressToken::String(s) => write!(f, "{}", s),
            ProgressToken::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<String> for ProgressToken {
    fn from(s: String) -> Self {
        ProgressToken::String(s)
    }
}

impl From<&str> for ProgressToken {
    fn from(s: &str) -> Self {
        ProgressToken::String(s.to_string())
    }
}

impl From<i64> for ProgressToken {
    fn from(i: i64) -> Self {
        ProgressToken::Integer(i)
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Argument completion request forwarded to the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Argument being completed (`name`, partial `value`)
    pub argument: Map<String, Value>,
    /// Reference to the prompt or resource template owning the argument
    #[serde(rename = "ref")]
    pub reference: Map<String, Value>,
}

impl CompletionRequest {
    /// Create a completion request
    pub fn new(argument: Map<String, Value>, reference: Map<String, Value>) -> Self {
        Self {
            argument,
            reference,
        }
    }

    /// Protocol method name
    pub fn method(&self) -> &'static str {
        METHOD_COMPLETION_COMPLETE
    }

    /// The envelope sent through a transport
    pub fn to_message(&self) -> Value {
        serde_json::json!({
            "type": TYPE_COMPLETION,
            "argument": self.argument,
            "ref": self.reference,
        })
    }
}
