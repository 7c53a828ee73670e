//! Capability registry
//!
//! Owns every tool, resource, resource template, prompt and root. Tools and
//! prompts are keyed by name, resources and templates by URI, roots by their
//! filesystem path. Only [`Registry::add_resource`] and
//! [`Registry::add_resource_template`] enforce uniqueness; every other adder
//! overwrites silently.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{McpError, Result};
use crate::mcp::entities::{
    Prompt, PromptProvider, Resource, ResourceProvider, ResourceTemplate, Tool, ToolExecutor,
};
use crate::mcp::types::Root;

/// Flags describing what a registry currently offers.
///
/// `logging`, `progress` and `completion` are always `true`; the rest
/// report whether the matching collection is non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryCapabilities {
    /// Log notifications are supported
    pub logging: bool,
    /// Progress notifications are supported
    pub progress: bool,
    /// Completion round trips are supported
    pub completion: bool,
    /// At least one tool is registered
    pub tools: bool,
    /// At least one resource is registered
    pub resources: bool,
    /// At least one prompt is registered
    pub prompts: bool,
    /// At least one root is declared
    pub roots: bool,
}

/// Keyed collections of every invocable entity
#[derive(Default)]
pub struct Registry {
    tools: HashMap<String, Arc<dyn ToolExecutor>>,
    resources: HashMap<String, Arc<dyn ResourceProvider>>,
    resource_templates: HashMap<String, Arc<ResourceTemplate>>,
    prompts: HashMap<String, Arc<dyn PromptProvider>>,
    roots: HashMap<String, Root>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    // -- tools --------------------------------------------------------------

    /// Register a tool handler with an optional description. Overwrites.
    ///
    /// # Arguments
    ///
    /// * `name` - Tool name used by `tool_call` envelopes
    /// * `handler` - Function invoked with the call arguments
    /// * `description` - Optional human-readable description
    pub fn add_tool<F>(&mut self, name: impl Into<String>, handler: F, description: Option<String>)
    where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        let mut tool = Tool::new(name, handler);
        if let Some(description) = description {
            tool = tool.with_description(description);
        }
        self.add_tool_executor(Arc::new(tool));
    }

    /// Register a tool handler with a parameter schema. Overwrites.
    pub fn register_tool<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
        parameters: Map<String, Value>,
    ) where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        let tool = Tool::new(name, handler).with_parameters(parameters);
        self.add_tool_executor(Arc::new(tool));
    }

    /// Register any [`ToolExecutor`] under its own name. Overwrites.
    pub fn add_tool_executor(&mut self, tool: Arc<dyn ToolExecutor>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    // -- resources ----------------------------------------------------------

    /// Register static content at `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ResourceExists`] when `uri` is already registered.
    pub fn add_resource(
        &mut self,
        uri: impl Into<String>,
        content: Value,
        mime_type: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let uri = uri.into();
        if self.has_resource(&uri) {
            return Err(McpError::ResourceExists(uri).into());
        }
        let resource = Resource::from_static(uri, content)
            .with_mime_type(mime_type)
            .with_description(description);
        self.add_resource_provider(Arc::new(resource));
        Ok(())
    }

    /// Register a content handler at `uri`. Overwrites.
    pub fn register_resource<F>(&mut self, uri: impl Into<String>, handler: F)
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        self.add_resource_provider(Arc::new(Resource::new(uri, handler)));
    }

    /// Register any [`ResourceProvider`] under its own URI. Overwrites.
    pub fn add_resource_provider(&mut self, resource: Arc<dyn ResourceProvider>) {
        self.resources.insert(resource.uri().to_string(), resource);
    }

    /// Install `template` at `uri` together with a resource at the same URI
    /// whose reads render the template from its defaults.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ResourceExists`] when a resource is already
    /// registered at `uri`.
    pub fn add_resource_template(
        &mut self,
        uri: impl Into<String>,
        template: ResourceTemplate,
    ) -> Result<()> {
        let uri = uri.into();
        if self.has_resource(&uri) {
            return Err(McpError::ResourceExists(uri).into());
        }
        let template = Arc::new(template);
        let derived = template.derived_resource(uri.clone());
        self.resource_templates.insert(uri.clone(), template);
        self.resources.insert(uri, Arc::new(derived));
        Ok(())
    }

    /// Whether a resource is registered at `uri`
    pub fn has_resource(&self, uri: &str) -> bool {
        self.resources.contains_key(uri)
    }

    /// Remove the resource at `uri`. Templates are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ResourceNotFound`] when nothing is registered.
    pub fn remove_resource(&mut self, uri: &str) -> Result<()> {
        match self.resources.remove(uri) {
            Some(_) => Ok(()),
            None => Err(McpError::ResourceNotFound(uri.to_string()).into()),
        }
    }

    // -- prompts ------------------------------------------------------------

    /// Register a prompt that renders `{"messages": [...]}` overlaid by the
    /// caller's arguments. Overwrites.
    pub fn add_prompt(
        &mut self,
        name: impl Into<String>,
        messages: Vec<Value>,
        description: Option<String>,
    ) {
        let prompt = Prompt::from_messages(name, messages).with_description(description);
        self.add_prompt_provider(Arc::new(prompt));
    }

    /// Register a prompt handler with default arguments. Overwrites.
    pub fn register_prompt<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
        default_arguments: Map<String, Value>,
    ) where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        let prompt = Prompt::new(name, handler).with_default_arguments(default_arguments);
        self.add_prompt_provider(Arc::new(prompt));
    }

    /// Register any [`PromptProvider`] under its own name. Overwrites.
    pub fn add_prompt_provider(&mut self, prompt: Arc<dyn PromptProvider>) {
        self.prompts.insert(prompt.name().to_string(), prompt);
    }

    // -- roots --------------------------------------------------------------

    /// Declare a root, keyed by its filesystem path. Overwrites.
    pub fn add_root(&mut self, root: Root) {
        self.roots.insert(root.path().to_string(), root);
    }

    // -- lookups ------------------------------------------------------------

    /// Tool registered under `name`
    pub fn tool(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    /// Resource registered at `uri`
    pub fn resource(&self, uri: &str) -> Option<Arc<dyn ResourceProvider>> {
        self.resources.get(uri).cloned()
    }

    /// Template registered at `uri`
    pub fn resource_template(&self, uri: &str) -> Option<Arc<ResourceTemplate>> {
        self.resource_templates.get(uri).cloned()
    }

    /// Prompt registered under `name`
    pub fn prompt(&self, name: &str) -> Option<Arc<dyn PromptProvider>> {
        self.prompts.get(name).cloned()
    }

    /// All tools
    pub fn tools(&self) -> &HashMap<String, Arc<dyn ToolExecutor>> {
        &self.tools
    }

    /// All resources
    pub fn resources(&self) -> &HashMap<String, Arc<dyn ResourceProvider>> {
        &self.resources
    }

    /// All resource templates
    pub fn resource_templates(&self) -> &HashMap<String, Arc<ResourceTemplate>> {
        &self.resource_templates
    }

    /// All prompts
    pub fn prompts(&self) -> &HashMap<String, Arc<dyn PromptProvider>> {
        &self.prompts
    }

    /// All roots, keyed by path
    pub fn roots(&self) -> &HashMap<String, Root> {
        &self.roots
    }

    /// Capability flags derived from the current contents
    pub fn capabilities(&self) -> RegistryCapabilities {
        RegistryCapabilities {
            logging: true,
            progress: true,
            completion: true,
            tools: !self.tools.is_empty(),
            resources: !self.resources.is_empty(),
            prompts: !self.prompts.is_empty(),
            roots: !self.roots.is_empty(),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tools: Vec<_> = self.tools.keys().collect();
        let mut resources: Vec<_> = self.resources.keys().collect();
        let mut prompts: Vec<_> = self.prompts.keys().collect();
        tools.sort();
        resources.sort();
        prompts.sort();
        f.debug_struct("Registry")
            .field("tools", &tools)
            .field("resources", &resources)
            .field("prompts", &prompts)
            .field("roots", &self.roots.len())
            .finish()
    }
}
