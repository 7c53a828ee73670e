//! Model sampling preferences carried by the server

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sampling knobs offered to the caller's model.
///
/// Deserializing a partial object fills every absent field with its
/// default, so configuration files only need to mention what they change.
///
/// # Examples
///
/// ```
/// use mcphost::mcp::sampling::ModelPreferences;
///
/// let prefs: ModelPreferences =
///     serde_json::from_value(serde_json::json!({"temperature": 0.5})).unwrap();
/// assert_eq!(prefs.temperature, 0.5);
/// assert_eq!(prefs.top_p, 1.0);
/// assert!(prefs.max_tokens.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPreferences {
    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f64,
    /// Nucleus sampling threshold (0.0 to 1.0)
    pub top_p: f64,
    /// Token cap, `None` for no limit
    pub max_tokens: Option<u32>,
    /// Sequences that stop generation
    pub stop: Vec<String>,
    /// Penalty for frequent tokens (0.0 to 2.0)
    pub frequency_penalty: f64,
    /// Penalty for already-present tokens (0.0 to 2.0)
    pub presence_penalty: f64,
    /// Weight for cost optimisation (0.0 to 1.0)
    pub cost_priority: f64,
    /// Weight for intelligence optimisation (0.0 to 1.0)
    pub intelligence_priority: f64,
    /// Weight for speed optimisation (0.0 to 1.0)
    pub speed_priority: f64,
    /// Free-form model hints
    pub hints: Vec<Value>,
}

impl Default for ModelPreferences {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 1.0,
            max_tokens: None,
            stop: Vec::new(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            cost_priority: 0.0,
            intelligence_priority: 0.0,
            speed_priority: 0.0,
            hints: Vec::new(),
        }
    }
}

impl ModelPreferences {
    /// Replace the hint list
    pub fn set_hints(&mut self, hints: Vec<Value>) {
        self.hints = hints;
    }
}
