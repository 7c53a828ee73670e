//! Configuration management for mcphost
//!
//! This module handles loading, parsing, and validating configuration
//! from YAML files, environment variables, and command-line arguments,
//! applied in that order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::{Cli, Commands};
use crate::error::{McpError, Result};
use crate::mcp::capabilities::ServerCapabilities;
use crate::mcp::sampling::ModelPreferences;
use crate::mcp::transport::{ListenConfig, TransportKind};
use crate::mcp::types::{Implementation, Root, FILE_SCHEME};

/// Main configuration structure
///
/// # Examples
///
/// ```
/// use mcphost::config::Config;
///
/// let config: Config = serde_yaml::from_str("transport:\n  type: http\n  port: 9000\n").unwrap();
/// assert_eq!(config.transport.port, 9000);
/// assert_eq!(config.server.name, "mcphost");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server identity
    #[serde(default)]
    pub server: ServerConfig,

    /// Transport selection and bind address
    #[serde(default)]
    pub transport: TransportConfig,

    /// Capability descriptor announced by the server
    #[serde(default)]
    pub capabilities: ServerCapabilities,

    /// Filesystem roots exposed to callers
    #[serde(default)]
    pub roots: Vec<RootConfig>,

    /// Model sampling preferences
    #[serde(default)]
    pub preferences: ModelPreferences,
}

/// Server identity configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported to callers
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Server version reported to callers
    #[serde(default = "default_server_version")]
    pub version: String,
}

fn default_server_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_server_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            version: default_server_version(),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport implementation (stdio, http, websocket)
    #[serde(rename = "type", default)]
    pub kind: TransportKind,

    /// Bind host for network transports
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port for network transports
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    ListenConfig::default().host
}

fn default_port() -> u16 {
    ListenConfig::default().port
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl TransportConfig {
    /// Bind address for network transports
    pub fn listen(&self) -> ListenConfig {
        ListenConfig::new(self.host.clone(), self.port)
    }
}

/// A root declared in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    /// `file://` URI
    pub uri: String,

    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| McpError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| McpError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(kind) = std::env::var("MCPHOST_TRANSPORT") {
            match kind.parse() {
                Ok(kind) => {
                    self.transport.kind = kind;
                    tracing::debug!(transport = %kind, "Env override: MCPHOST_TRANSPORT");
                }
                Err(_) => tracing::warn!("Invalid MCPHOST_TRANSPORT: {}", kind),
            }
        }

        if let Ok(host) = std::env::var("MCPHOST_HOST") {
            tracing::debug!(host = %host, "Env override: MCPHOST_HOST");
            self.transport.host = host;
        }

        if let Ok(port) = std::env::var("MCPHOST_PORT") {
            match port.parse() {
                Ok(port) => {
                    self.transport.port = port;
                    tracing::debug!(port, "Env override: MCPHOST_PORT");
                }
                Err(_) => tracing::warn!("Invalid MCPHOST_PORT: {}", port),
            }
        }

        if let Ok(name) = std::env::var("MCPHOST_SERVER_NAME") {
            tracing::debug!(name = %name, "Env override: MCPHOST_SERVER_NAME");
            self.server.name = name;
        }

        if let Ok(version) = std::env::var("MCPHOST_SERVER_VERSION") {
            tracing::debug!(version = %version, "Env override: MCPHOST_SERVER_VERSION");
            self.server.version = version;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Commands::Serve {
            transport,
            host,
            port,
        } = &cli.command
        {
            if let Some(kind) = transport {
                self.transport.kind = *kind;
            }
            if let Some(host) = host {
                self.transport.host = host.clone();
            }
            if let Some(port) = port {
                self.transport.port = *port;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Returns
    ///
    /// Returns Ok if configuration is valid
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Config`] if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.name.trim().is_empty() {
            return Err(McpError::Config("Server name cannot be empty".to_string()).into());
        }

        if self.server.version.trim().is_empty() {
            return Err(McpError::Config("Server version cannot be empty".to_string()).into());
        }

        if self.transport.kind.is_network() {
            if self.transport.host.trim().is_empty() {
                return Err(McpError::Config("Transport host cannot be empty".to_string()).into());
            }
            if self.transport.port == 0 {
                return Err(McpError::Config(
                    "Transport port must be greater than 0".to_string(),
                )
                .into());
            }
        }

        for root in &self.roots {
            if !root.uri.starts_with(FILE_SCHEME) {
                return Err(McpError::Config(format!(
                    "Root URI must start with {}: {}",
                    FILE_SCHEME, root.uri
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Server identity built from the `server` section
    pub fn implementation(&self) -> Implementation {
        Implementation::new(self.server.name.clone(), self.server.version.clone())
    }

    /// Declared roots as validated [`Root`] values
    ///
    /// # Errors
    ///
    /// Returns a validation error for a root without the `file://` scheme
    pub fn roots(&self) -> Result<Vec<Root>> {
        self.roots
            .iter()
            .map(|root| Root::new(root.uri.clone(), root.name.clone()).map_err(Into::into))
            .collect()
    }
}
