//! Capability descriptors exchanged during negotiation
//!
//! Every optional feature flag is a [`TriState`]: explicitly enabled,
//! explicitly disabled, or left unspecified. The sparse wire rule lives
//! entirely at the serde boundary in this module:
//!
//! - an unspecified flag (or an absent sub-capability) is never emitted;
//! - an absent key and an explicit `null` both deserialize to unspecified.
//!
//! Struct fields are `camelCase` on the wire.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Three-valued capability flag.
///
/// # Examples
///
/// ```
/// use mcphost::mcp::capabilities::TriState;
///
/// assert_eq!(TriState::from(Some(true)), TriState::Enabled);
/// assert_eq!(TriState::from(None), TriState::Unspecified);
/// assert_eq!(TriState::Disabled.as_bool(), Some(false));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// Feature explicitly supported
    Enabled,
    /// Feature explicitly unsupported
    Disabled,
    /// Nothing was declared
    #[default]
    Unspecified,
}

impl TriState {
    /// `true` when nothing was declared; used by `skip_serializing_if`.
    pub fn is_unspecified(&self) -> bool {
        matches!(self, TriState::Unspecified)
    }

    /// The declared value, if any
    pub fn as_bool(self) -> Option<bool> {
        match self {
            TriState::Enabled => Some(true),
            TriState::Disabled => Some(false),
            TriState::Unspecified => None,
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::Enabled,
            Some(false) => TriState::Disabled,
            None => TriState::Unspecified,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        TriState::from(Some(value))
    }
}

impl Serialize for TriState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.as_bool() {
            Some(flag) => serializer.serialize_bool(flag),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<bool>::deserialize(deserializer).map(TriState::from)
    }
}

/// Server-side tools capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// Whether the server emits tool list change notifications
    #[serde(default, skip_serializing_if = "TriState::is_unspecified")]
    pub list_changed: TriState,
}

/// Server-side prompts capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    /// Whether the server emits prompt list change notifications
    #[serde(default, skip_serializing_if = "TriState::is_unspecified")]
    pub list_changed: TriState,
}

/// Server-side resources capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    /// Whether clients may subscribe to resource updates
    #[serde(default, skip_serializing_if = "TriState::is_unspecified")]
    pub subscribe: TriState,
    /// Whether the server emits resource list change notifications
    #[serde(default, skip_serializing_if = "TriState::is_unspecified")]
    pub list_changed: TriState,
}

/// Client-side roots capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    /// Whether the client emits root list change notifications
    #[serde(default, skip_serializing_if = "TriState::is_unspecified")]
    pub list_changed: TriState,
}

/// Capabilities a client declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// Free-form experimental capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
    /// Roots support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    /// Sampling support (opaque settings object)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Map<String, Value>>,
}

/// Capabilities a server declares.
///
/// # Examples
///
/// ```
/// use mcphost::mcp::capabilities::{ServerCapabilities, ToolsCapability, TriState};
///
/// let caps = ServerCapabilities {
///     tools: Some(ToolsCapability { list_changed: TriState::Enabled }),
///     ..Default::default()
/// };
/// let wire = serde_json::to_value(&caps).unwrap();
/// assert_eq!(wire, serde_json::json!({"tools": {"listChanged": true}}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Free-form experimental capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
    /// Logging support (opaque settings object)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Value>,
    /// Prompts support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    /// Resources support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Tools support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unspecified_flags_are_omitted() {
        let caps = ResourcesCapability {
            subscribe: TriState::Enabled,
            list_changed: TriState::Unspecified,
        };
        assert_eq!(
            serde_json::to_value(caps).unwrap(),
            json!({"subscribe": true})
        );
        assert_eq!(
            serde_json::to_value(ToolsCapability::default()).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_disabled_flag_is_emitted_as_false() {
        let caps = PromptsCapability {
            list_changed: TriState::Disabled,
        };
        assert_eq!(
            serde_json::to_value(caps).unwrap(),
            json!({"listChanged": false})
        );
    }

    #[test]
    fn test_null_and_absent_both_deserialize_to_unspecified() {
        let from_null: ResourcesCapability =
            serde_json::from_value(json!({"subscribe": null, "listChanged": true})).unwrap();
        let from_absent: ResourcesCapability =
            serde_json::from_value(json!({"listChanged": true})).unwrap();
        assert_eq!(from_null, from_absent);
        assert_eq!(from_null.subscribe, TriState::Unspecified);
        assert_eq!(from_null.list_changed, TriState::Enabled);
    }

    #[test]
    fn test_mixed_resources_capability_round_trips() {
        for subscribe in [TriState::Enabled, TriState::Disabled, TriState::Unspecified] {
            let original = ResourcesCapability {
                subscribe,
                list_changed: TriState::Disabled,
            };
            let wire = serde_json::to_value(original).unwrap();
            let restored: ResourcesCapability = serde_json::from_value(wire).unwrap();
            assert_eq!(restored, original);
        }
    }

    #[test]
    fn test_server_capabilities_sparse_composite() {
        let caps = ServerCapabilities {
            experimental: None,
            logging: Some(json!({})),
            prompts: Some(PromptsCapability {
                list_changed: TriState::Enabled,
            }),
            resources: Some(ResourcesCapability::default()),
            tools: None,
        };
        let wire = serde_json::to_value(&caps).unwrap();
        assert_eq!(
            wire,
            json!({
                "logging": {},
                "prompts": {"listChanged": true},
                "resources": {}
            })
        );
        let restored: ServerCapabilities = serde_json::from_value(wire).unwrap();
        assert_eq!(restored, caps);
    }

    #[test]
    fn test_server_capabilities_null_sub_capability_is_unset() {
        let caps: ServerCapabilities =
            serde_json::from_value(json!({"tools": null, "prompts": {"listChanged": null}}))
                .unwrap();
        assert!(caps.tools.is_none());
        assert_eq!(caps.prompts, Some(PromptsCapability::default()));
        assert_eq!(
            serde_json::to_value(&caps).unwrap(),
            json!({"prompts": {}})
        );
    }

    #[test]
    fn test_client_capabilities_round_trip() {
        let data = json!({
            "experimental": {"streaming": true},
            "roots": {"listChanged": true}
        });
        let caps: ClientCapabilities = serde_json::from_value(data.clone()).unwrap();
        assert_eq!(
            caps.roots,
            Some(RootsCapability {
                list_changed: TriState::Enabled
            })
        );
        assert!(caps.sampling.is_none());
        assert_eq!(serde_json::to_value(&caps).unwrap(), data);
    }

    #[test]
    fn test_tri_state_rejects_non_boolean() {
        let result = serde_json::from_value::<ToolsCapability>(json!({"listChanged": "yes"}));
        assert!(result.is_err());
    }
}
