//! mcphost - protocol server for tools, resources and prompts
//!
#![doc = "mcphost - protocol server for tools, resources and prompts"]
#![doc = "Main entry point for the mcphost binary."]

use anyhow::Result;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcphost::cli::{Cli, Commands};
use mcphost::config::Config;
use mcphost::demo::register_demo_capabilities;
use mcphost::mcp::Server;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // stdout belongs to the stdio transport
    init_tracing(cli.verbose, cli.json_logs);

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    let mut server = build_server(&config)?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!(
                transport = %config.transport.kind,
                address = %config.transport.listen().address(),
                "Starting mcphost"
            );
            server.create_transport(config.transport.kind, config.transport.listen());
            server.initialize()?;
            server.start()?;
            tracing::info!("mcphost stopped");
            Ok(())
        }
        Commands::Capabilities => {
            let report = serde_json::json!({
                "server": server.info(),
                "capabilities": server.server_capabilities(),
                "registry": server.capabilities(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn build_server(config: &Config) -> Result<Server> {
    let mut server = Server::new(config.implementation())
        .with_capabilities(config.capabilities.clone());
    server.set_model_preferences(config.preferences.clone());

    for root in config.roots()? {
        tracing::debug!("Adding root {}", root.uri());
        server.add_root(root);
    }

    register_demo_capabilities(&mut server)?;
    Ok(server)
}

fn init_tracing(verbose: bool, json: bool) {
    let default_directive = if verbose { "mcphost=debug" } else { "mcphost=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let text_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .init();
}
