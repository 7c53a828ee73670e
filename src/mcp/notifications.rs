//! Progress and logging side channel
//!
//! [`NotificationChannel`] builds notification bodies and hands them to
//! whichever [`Transport`] is currently attached. The channel is cheap to
//! clone: a tool handler registered during setup can capture a clone and
//! report progress once the server is running.

use std::sync::{Arc, RwLock};

use serde_json::{json, Map, Value};

use crate::error::{McpError, Result};
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    LoggingLevel, ProgressToken, NOTIF_MESSAGE, NOTIF_PROGRESS, TYPE_LOG, TYPE_PROGRESS,
};

/// Progress update for a long-running operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressNotification {
    /// Work done so far
    pub progress: f64,
    /// Correlates successive updates
    pub progress_token: ProgressToken,
    /// Total amount of work, when known; always positive
    pub total: Option<f64>,
}

impl ProgressNotification {
    /// Create a progress notification.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Validation`] when `total` is present and not
    /// strictly positive (NaN included).
    pub fn new(progress: f64, progress_token: ProgressToken, total: Option<f64>) -> Result<Self> {
        if let Some(total) = total {
            if total.is_nan() || total <= 0.0 {
                return Err(
                    McpError::Validation("Total must be greater than zero".to_string()).into(),
                );
            }
        }
        Ok(Self {
            progress,
            progress_token,
            total,
        })
    }

    /// Protocol method name
    pub fn method(&self) -> &'static str {
        NOTIF_PROGRESS
    }

    /// Protocol params; `total` is omitted when unknown
    pub fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("progress".to_string(), json!(self.progress));
        params.insert("progressToken".to_string(), json!(self.progress_token));
        if let Some(total) = self.total {
            params.insert("total".to_string(), json!(total));
        }
        params
    }

    /// Body sent through a transport; `total` is `null` when unknown
    pub fn to_message(&self) -> Value {
        json!({
            "type": TYPE_PROGRESS,
            "progress": self.progress,
            "token": self.progress_token,
            "total": self.total,
        })
    }
}

/// Log record forwarded to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingMessageNotification {
    /// Free-form payload
    pub data: Value,
    /// Severity
    pub level: LoggingLevel,
    /// Originating logger name
    pub logger: Option<String>,
}

impl LoggingMessageNotification {
    /// Create a log notification
    pub fn new(data: Value, level: LoggingLevel, logger: Option<String>) -> Self {
        Self {
            data,
            level,
            logger,
        }
    }

    /// Protocol method name
    pub fn method(&self) -> &'static str {
        NOTIF_MESSAGE
    }

    /// Protocol params; `logger` is omitted when unset
    pub fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("level".to_string(), json!(self.level));
        if let Some(logger) = &self.logger {
            params.insert("logger".to_string(), json!(logger));
        }
        params.insert("data".to_string(), self.data.clone());
        params
    }

    /// Body sent through a transport; `logger` is `null` when unset
    pub fn to_message(&self) -> Value {
        json!({
            "type": TYPE_LOG,
            "data": self.data,
            "level": self.level,
            "logger": self.logger,
        })
    }
}

/// Cloneable handle that sends notifications through the attached
/// transport.
#[derive(Debug, Clone, Default)]
pub struct NotificationChannel {
    transport: Arc<RwLock<Option<Arc<dyn Transport>>>>,
}

impl NotificationChannel {
    /// Create a detached channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Route notifications through `transport` from now on. Every clone
    /// observes the change.
    pub fn attach(&self, transport: Arc<dyn Transport>) {
        *self
            .transport
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(transport);
    }

    /// Whether a transport is attached
    pub fn is_attached(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn require(&self, context: &'static str) -> Result<Arc<dyn Transport>> {
        self.current()
            .ok_or_else(|| McpError::TransportNotSet(context).into())
    }

    /// Send a progress update.
    ///
    /// # Arguments
    ///
    /// * `progress` - Work done so far
    /// * `token` - Correlation token
    /// * `total` - Total work, when known
    ///
    /// # Errors
    ///
    /// - [`McpError::TransportNotSet`] with no transport attached
    /// - [`McpError::Validation`] when `total` is zero, negative or NaN
    ///
    /// # Examples
    ///
    /// ```
    /// use mcphost::mcp::notifications::NotificationChannel;
    ///
    /// let channel = NotificationChannel::new();
    /// let err = channel.send_progress(0.5, "job".into(), Some(1.0)).unwrap_err();
    /// assert_eq!(err.to_string(), "Transport must be set before sending progress");
    /// ```
    pub fn send_progress(&self, progress: f64, token: ProgressToken, total: Option<f64>) -> Result<()> {
        let transport = self.require("sending progress")?;
        let notification = ProgressNotification::new(progress, token, total)?;
        transport.send(notification.to_message())
    }

    /// Send a log record.
    ///
    /// # Errors
    ///
    /// - [`McpError::TransportNotSet`] with no transport attached
    /// - [`McpError::Validation`] when `level` is not one of the eight
    ///   severities
    pub fn send_log(&self, data: Value, level: &str, logger: Option<&str>) -> Result<()> {
        let transport = self.require("sending logs")?;
        let level: LoggingLevel = level.parse()?;
        let notification =
            LoggingMessageNotification::new(data, level, logger.map(str::to_string));
        transport.send(notification.to_message())
    }
}
