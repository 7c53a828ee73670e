//! Command-line interface definition for mcphost
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to serve the bundled capabilities and to inspect the
//! configured capability descriptor.

use clap::{Parser, Subcommand};

use crate::mcp::transport::TransportKind;

/// mcphost - protocol server for tools, resources and prompts
///
/// Serve callable capabilities to an orchestrating client over stdio,
/// HTTP or WebSocket.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcphost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for mcphost
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the server on the configured transport
    Serve {
        /// Override the transport from config (stdio, http, websocket)
        #[arg(short, long)]
        transport: Option<TransportKind>,

        /// Override the bind host for network transports
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port for network transports
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the capability descriptor and registry flags as JSON
    Capabilities,
}

impl Cli {
    /// Parse command-line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            command: Commands::Serve {
                transport: None,
                host: None,
                port: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(!cli.json_logs);
        assert!(matches!(
            cli.command,
            Commands::Serve {
                transport: None,
                host: None,
                port: None
            }
        ));
    }

    #[test]
    fn test_cli_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from([
            "mcphost",
            "serve",
            "--transport",
            "ws",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
        ])
        .unwrap();
        if let Commands::Serve {
            transport,
            host,
            port,
        } = cli.command
        {
            assert_eq!(transport, Some(TransportKind::WebSocket));
            assert_eq!(host, Some("0.0.0.0".to_string()));
            assert_eq!(port, Some(9000));
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "mcphost",
            "--config",
            "custom.yaml",
            "--verbose",
            "--json-logs",
            "capabilities",
        ])
        .unwrap();
        assert_eq!(cli.config, Some("custom.yaml".to_string()));
        assert!(cli.verbose);
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Capabilities));
    }

    #[test]
    fn test_cli_rejects_unknown_transport() {
        let cli = Cli::try_parse_from(["mcphost", "serve", "--transport", "pigeon"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_port() {
        let cli = Cli::try_parse_from(["mcphost", "serve", "--port", "not-a-number"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["mcphost"]).is_err());
    }
}
