use std::time::Duration;

use serde_json::{json, Map, Value};

use mcphost::mcp::dispatcher::Dispatcher;
use mcphost::mcp::entities::ResourceTemplate;
use mcphost::mcp::Transport;
use mcphost::McpError;

/// Dispatcher preloaded with the entities every transport test talks to
#[allow(dead_code)]
pub fn sample_dispatcher() -> Dispatcher {
    let dispatcher = Dispatcher::new();
    {
        let mut registry = dispatcher.registry_mut();
        registry.add_tool(
            "greet",
            |args| {
                let name = args.get("name").and_then(Value::as_str).unwrap_or("World");
                Ok(json!({"status": "success", "message": format!("Hello, {}!", name)}))
            },
            Some("Greets a person".to_string()),
        );
        registry.add_tool("answer", |_| Ok(json!(42)), None);
        registry.add_tool(
            "strict",
            |_| Err(McpError::Validation("bad input".to_string()).into()),
            None,
        );
        registry.add_tool("boom", |_| Err(anyhow::anyhow!("handler exploded")), None);
        registry
            .add_resource(
                "test://doc",
                json!("document body"),
                Some("text/plain".to_string()),
                None,
            )
            .expect("fresh registry");
        registry
            .add_resource_template(
                "test://user",
                ResourceTemplate::new("user", "users/{id}").with_parameters(params(json!({"id": 7}))),
            )
            .expect("fresh registry");
        registry.add_prompt("help", vec![json!("How can I help?")], None);
    }
    dispatcher
}

/// Object literal as an argument map
#[allow(dead_code)]
pub fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

/// Poll until `transport` reports running, panicking after five seconds
#[allow(dead_code)]
pub async fn wait_until_running<T: Transport + ?Sized>(transport: &T) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !transport.is_running() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "transport did not start in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
