//! Server composition
//!
//! [`Server`] ties the registry, the dispatcher, the notification channel,
//! one active transport and the current model preferences together. Setup
//! methods delegate to the [`Registry`]; request handling delegates to the
//! [`Dispatcher`].
//!
//! # Reactor
//!
//! [`Server::start`] builds its own current-thread Tokio runtime, runs the
//! transport on it until the transport stops, and then shuts the runtime
//! down. Callers that already run inside a Tokio runtime use
//! [`Server::run`] instead.

use std::sync::{Arc, RwLockReadGuard};
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::error::{McpError, Result};
use crate::mcp::capabilities::ServerCapabilities;
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::entities::{PromptProvider, ResourceProvider, ResourceTemplate, ToolExecutor};
use crate::mcp::notifications::NotificationChannel;
use crate::mcp::registry::{Registry, RegistryCapabilities};
use crate::mcp::sampling::ModelPreferences;
use crate::mcp::transport::{self, ListenConfig, Transport, TransportKind};
use crate::mcp::types::{CompletionRequest, Implementation, ProgressToken, Root};

const TARGET: &str = "mcphost::server";

/// How long `start` waits for spawned tasks after the transport returns
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// A protocol server exposing tools, resources and prompts.
///
/// # Examples
///
/// ```
/// use mcphost::mcp::server::Server;
/// use mcphost::mcp::types::Implementation;
/// use serde_json::{json, Map};
///
/// let mut server = Server::new(Implementation::new("demo", "1.0.0"));
/// server.add_tool("greet", |_| Ok(json!({"message": "Hello, World!"})), None);
///
/// let reply = server.handle_tool_call("greet", &Map::new()).unwrap();
/// assert_eq!(reply["message"], "Hello, World!");
/// assert!(server.initialize().is_err());
/// ```
#[derive(Debug)]
pub struct Server {
    info: Implementation,
    capabilities: ServerCapabilities,
    dispatcher: Dispatcher,
    notifier: NotificationChannel,
    transport: Option<Arc<dyn Transport>>,
    preferences: ModelPreferences,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(Implementation::default())
    }
}

impl Server {
    /// Create a server with an empty registry and no transport
    pub fn new(info: Implementation) -> Self {
        Self {
            info,
            capabilities: ServerCapabilities::default(),
            dispatcher: Dispatcher::new(),
            notifier: NotificationChannel::new(),
            transport: None,
            preferences: ModelPreferences::default(),
        }
    }

    /// Set the capability descriptor announced by this server
    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Server identity
    pub fn info(&self) -> &Implementation {
        &self.info
    }

    /// Configured capability descriptor
    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// The dispatcher shared with every transport
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A handle to the notification channel, for capture by handlers
    pub fn notifier(&self) -> NotificationChannel {
        self.notifier.clone()
    }

    /// Read access to the registry
    pub fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.dispatcher.registry()
    }

    // -- transport ----------------------------------------------------------

    /// Attach `transport`; notifications are routed through it from now on.
    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.notifier.attach(Arc::clone(&transport));
        self.transport = Some(transport);
    }

    /// Build a transport of `kind` bound to this server's dispatcher and
    /// attach it.
    pub fn create_transport(&mut self, kind: TransportKind, listen: ListenConfig) -> Arc<dyn Transport> {
        let transport = transport::create(kind, self.dispatcher.clone(), listen);
        self.set_transport(Arc::clone(&transport));
        transport
    }

    /// The attached transport, if any
    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.as_ref()
    }

    fn require_transport(&self, context: &'static str) -> Result<Arc<dyn Transport>> {
        self.transport
            .clone()
            .ok_or_else(|| McpError::TransportNotSet(context).into())
    }

    // -- setup --------------------------------------------------------------

    /// See [`Registry::add_tool`]
    pub fn add_tool<F>(&mut self, name: impl Into<String>, handler: F, description: Option<String>)
    where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.dispatcher
            .registry_mut()
            .add_tool(name, handler, description);
    }

    /// See [`Registry::register_tool`]
    pub fn register_tool<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
        parameters: Map<String, Value>,
    ) where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.dispatcher
            .registry_mut()
            .register_tool(name, handler, parameters);
    }

    /// See [`Registry::add_tool_executor`]
    pub fn add_tool_executor(&mut self, tool: Arc<dyn ToolExecutor>) {
        self.dispatcher.registry_mut().add_tool_executor(tool);
    }

    /// See [`Registry::add_resource`]
    ///
    /// # Errors
    ///
    /// Fails when `uri` is already registered.
    pub fn add_resource(
        &mut self,
        uri: impl Into<String>,
        content: Value,
        mime_type: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        self.dispatcher
            .registry_mut()
            .add_resource(uri, content, mime_type, description)
    }

    /// See [`Registry::register_resource`]
    pub fn register_resource<F>(&mut self, uri: impl Into<String>, handler: F)
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        self.dispatcher.registry_mut().register_resource(uri, handler);
    }

    /// See [`Registry::add_resource_provider`]
    pub fn add_resource_provider(&mut self, resource: Arc<dyn ResourceProvider>) {
        self.dispatcher.registry_mut().add_resource_provider(resource);
    }

    /// See [`Registry::add_resource_template`]
    ///
    /// # Errors
    ///
    /// Fails when a resource is already registered at `uri`.
    pub fn add_resource_template(
        &mut self,
        uri: impl Into<String>,
        template: ResourceTemplate,
    ) -> Result<()> {
        self.dispatcher
            .registry_mut()
            .add_resource_template(uri, template)
    }

    /// See [`Registry::add_prompt`]
    pub fn add_prompt(
        &mut self,
        name: impl Into<String>,
        messages: Vec<Value>,
        description: Option<String>,
    ) {
        self.dispatcher
            .registry_mut()
            .add_prompt(name, messages, description);
    }

    /// See [`Registry::register_prompt`]
    pub fn register_prompt<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
        default_arguments: Map<String, Value>,
    ) where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.dispatcher
            .registry_mut()
            .register_prompt(name, handler, default_arguments);
    }

    /// See [`Registry::add_prompt_provider`]
    pub fn add_prompt_provider(&mut self, prompt: Arc<dyn PromptProvider>) {
        self.dispatcher.registry_mut().add_prompt_provider(prompt);
    }

    /// See [`Registry::add_root`]
    pub fn add_root(&mut self, root: Root) {
        self.dispatcher.registry_mut().add_root(root);
    }

    /// See [`Registry::has_resource`]
    pub fn has_resource(&self, uri: &str) -> bool {
        self.registry().has_resource(uri)
    }

    /// See [`Registry::remove_resource`]
    ///
    /// # Errors
    ///
    /// Fails when nothing is registered at `uri`.
    pub fn remove_resource(&mut self, uri: &str) -> Result<()> {
        self.dispatcher.registry_mut().remove_resource(uri)
    }

    /// Capability flags derived from the registry contents
    pub fn capabilities(&self) -> RegistryCapabilities {
        self.registry().capabilities()
    }

    // -- request handling ---------------------------------------------------

    /// See [`Dispatcher::handle_tool_call`]
    pub fn handle_tool_call(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value> {
        self.dispatcher.handle_tool_call(name, arguments)
    }

    /// See [`Dispatcher::handle_resource_request`]
    pub fn handle_resource_request(&self, uri: &str) -> Result<Value> {
        self.dispatcher.handle_resource_request(uri)
    }

    /// See [`Dispatcher::handle_prompt_request`]
    pub fn handle_prompt_request(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value> {
        self.dispatcher.handle_prompt_request(name, arguments)
    }

    /// Ask the peer to complete an argument.
    ///
    /// Sends `{"type":"completion", "argument", "ref"}` and returns the
    /// transport's next queued message, or `{}` when nothing is queued.
    ///
    /// # Errors
    ///
    /// Fails when no transport is attached or the send fails.
    pub fn handle_completion(
        &self,
        argument: Map<String, Value>,
        reference: Map<String, Value>,
    ) -> Result<Value> {
        let transport = self.require_transport("handling completion")?;
        transport.send(CompletionRequest::new(argument, reference).to_message())?;
        Ok(transport.receive().unwrap_or_else(|| json!({})))
    }

    // -- notifications ------------------------------------------------------

    /// See [`NotificationChannel::send_progress`]
    pub fn send_progress(&self, progress: f64, token: ProgressToken, total: Option<f64>) -> Result<()> {
        self.notifier.send_progress(progress, token, total)
    }

    /// See [`NotificationChannel::send_log`]
    pub fn send_log(&self, data: Value, level: &str, logger: Option<&str>) -> Result<()> {
        self.notifier.send_log(data, level, logger)
    }

    // -- preferences --------------------------------------------------------

    /// Current sampling preferences
    pub fn model_preferences(&self) -> &ModelPreferences {
        &self.preferences
    }

    /// Replace the sampling preferences
    pub fn set_model_preferences(&mut self, preferences: ModelPreferences) {
        self.preferences = preferences;
    }

    // -- lifecycle ----------------------------------------------------------

    /// Check that the server is ready to start.
    ///
    /// # Errors
    ///
    /// Fails when no transport is attached.
    pub fn initialize(&self) -> Result<()> {
        let transport = self.require_transport("initializing server")?;
        tracing::info!(
            target: TARGET,
            name = %self.info.name,
            version = %self.info.version,
            transport = ?transport,
            "server initialized"
        );
        Ok(())
    }

    /// Run the attached transport on a dedicated current-thread runtime,
    /// blocking until it stops. Ctrl-C stops the transport.
    ///
    /// Must not be called from within a Tokio runtime; use
    /// [`Server::run`] there.
    ///
    /// # Errors
    ///
    /// Fails when no transport is attached, when the runtime cannot be
    /// built, or with the transport's own error.
    pub fn start(&self) -> Result<()> {
        let transport = self.require_transport("starting the server")?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let result = runtime.block_on(serve(transport));
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        result
    }

    /// Run the attached transport on the caller's runtime until it stops.
    ///
    /// # Errors
    ///
    /// Fails when no transport is attached, or with the transport's own
    /// error.
    pub async fn run(&self) -> Result<()> {
        let transport = self.require_transport("starting the server")?;
        serve(transport).await
    }

    /// Stop the attached transport. In-flight handlers run to completion.
    ///
    /// # Errors
    ///
    /// Fails when no transport is attached.
    pub fn stop(&self) -> Result<()> {
        let transport = self.require_transport("stopping the server")?;
        tracing::info!(target: TARGET, "stopping server");
        transport.stop()
    }
}

async fn serve(transport: Arc<dyn Transport>) -> Result<()> {
    let watcher = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(target: TARGET, "interrupt received, stopping transport");
                if let Err(e) = transport.stop() {
                    tracing::warn!(target: TARGET, "failed to stop transport: {}", e);
                }
            }
        })
    };

    let result = transport.start().await;
    watcher.abort();
    result
}
