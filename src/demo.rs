//! Demonstration capabilities served by the `mcphost` binary
//!
//! [`register_demo_capabilities`] installs a small, self-describing set of
//! tools, resources and prompts so that a freshly started server can be
//! exercised from any client:
//!
//! - `greet` and `calculate` tools
//! - `long_running_task`, which reports progress through the notification
//!   channel while it works
//! - a static `mcphost://server/info` resource and a greeting template
//! - a `help` prompt describing the message envelope

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::error::{McpError, Result};
use crate::mcp::entities::{ResourceTemplate, Tool};
use crate::mcp::notifications::NotificationChannel;
use crate::mcp::server::Server;
use crate::mcp::types::ProgressToken;

/// URI of the static server information resource
pub const SERVER_INFO_URI: &str = "mcphost://server/info";

/// URI of the greeting template resource
pub const GREETING_URI: &str = "mcphost://greeting";

const DEFAULT_STEPS: u64 = 5;
const MAX_STEPS: u64 = 100;
const DEFAULT_DELAY_MS: u64 = 100;
const MAX_DELAY_MS: u64 = 10_000;

/// Register every demonstration capability on `server`.
///
/// # Errors
///
/// Fails when one of the demo resource URIs is already registered.
///
/// # Examples
///
/// ```
/// use mcphost::demo::register_demo_capabilities;
/// use mcphost::mcp::server::Server;
/// use serde_json::{json, Map};
///
/// let mut server = Server::default();
/// register_demo_capabilities(&mut server).unwrap();
///
/// let mut args = Map::new();
/// args.insert("name".into(), json!("Ada"));
/// let reply = server.handle_tool_call("greet", &args).unwrap();
/// assert_eq!(reply["message"], "Hello, Ada!");
/// ```
pub fn register_demo_capabilities(server: &mut Server) -> Result<()> {
    server.add_tool_executor(Arc::new(greet_tool()));
    server.add_tool_executor(Arc::new(calculate_tool()));
    server.add_tool_executor(Arc::new(long_running_tool(server.notifier())));

    let info = server.info().clone();
    server.add_resource(
        SERVER_INFO_URI,
        json!({"name": info.name, "version": info.version}),
        Some("application/json".to_string()),
        Some("Server identity".to_string()),
    )?;

    let mut defaults = Map::new();
    defaults.insert("name".to_string(), json!("World"));
    server.add_resource_template(
        GREETING_URI,
        ResourceTemplate::new("greeting", "mcphost://greeting/{name}")
            .with_parameters(defaults)
            .with_mime_type("text/plain")
            .with_description("Personalised greeting location"),
    )?;

    server.add_prompt(
        "help",
        help_messages(),
        Some("Describes the available demo capabilities".to_string()),
    );

    let registry = server.registry();
    tracing::debug!(
        tools = registry.tools().len(),
        resources = registry.resources().len(),
        prompts = registry.prompts().len(),
        "Registered demo capabilities"
    );

    Ok(())
}

fn greet_tool() -> Tool {
    Tool::new("greet", |args| {
        let name = optional_str(args, "name")?.unwrap_or("World");
        Ok(json!({
            "status": "success",
            "message": format!("Hello, {}!", name),
        }))
    })
    .with_description("Greets a person by name")
    .with_parameters(schema(json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": "Who to greet"}
        }
    })))
}

fn calculate_tool() -> Tool {
    Tool::new("calculate", |args| {
        let num1 = number(args, "num1")?;
        let num2 = number(args, "num2")?;
        let operation = optional_str(args, "operation")?.unwrap_or("+");

        let result = match operation {
            "+" | "add" => num1 + num2,
            "-" | "subtract" => num1 - num2,
            "*" | "multiply" => num1 * num2,
            "/" | "divide" => {
                if num2 == 0.0 {
                    return Err(McpError::Validation("Cannot divide by zero".to_string()).into());
                }
                num1 / num2
            }
            other => {
                return Err(
                    McpError::Validation(format!("Unknown operation: {}", other)).into(),
                )
            }
        };

        Ok(json!({"status": "success", "result": result}))
    })
    .with_description("Performs basic arithmetic on two numbers")
    .with_parameters(schema(json!({
        "type": "object",
        "properties": {
            "num1": {"type": "number"},
            "num2": {"type": "number"},
            "operation": {
                "type": "string",
                "enum": ["+", "-", "*", "/", "add", "subtract", "multiply", "divide"]
            }
        },
        "required": ["num1", "num2"]
    })))
}

/// Blocks the transport for `steps * delay_ms`; handlers run on the reactor.
fn long_running_tool(notifier: NotificationChannel) -> Tool {
    Tool::new("long_running_task", move |args| {
        let steps = bounded(args, "steps", DEFAULT_STEPS, MAX_STEPS)?.max(1);
        let delay_ms = bounded(args, "delay_ms", DEFAULT_DELAY_MS, MAX_DELAY_MS)?;
        let delay = Duration::from_millis(delay_ms);
        let token = progress_token(args)?;

        for step in 1..=steps {
            std::thread::sleep(delay);
            let fraction = step as f64 / steps as f64;
            if let Err(e) = notifier.send_progress(fraction, token.clone(), Some(1.0)) {
                tracing::debug!("Progress not delivered: {}", e);
            }
        }

        Ok(json!({
            "status": "success",
            "steps": steps,
            "result": "Completed long_running_task",
        }))
    })
    .with_description("Simulates slow work and reports fractional progress after each step")
    .with_parameters(schema(json!({
        "type": "object",
        "properties": {
            "steps": {"type": "integer", "minimum": 1, "maximum": MAX_STEPS},
            "delay_ms": {"type": "integer", "minimum": 0, "maximum": MAX_DELAY_MS},
            "progress_token": {"type": ["string", "integer"]}
        }
    })))
}

fn help_messages() -> Vec<Value> {
    vec![
        json!({
            "role": "assistant",
            "content": "Send one JSON object per message with a \"type\" of tool_call, resource_request or prompt_request."
        }),
        json!({
            "role": "assistant",
            "content": "Tools: greet {name}, calculate {num1, num2, operation}, long_running_task {steps, delay_ms, progress_token}."
        }),
        json!({
            "role": "assistant",
            "content": format!("Resources: {} and {}.", SERVER_INFO_URI, GREETING_URI)
        }),
    ]
}

fn schema(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(McpError::Validation(format!("Argument {} must be a string", key)).into()),
    }
}

fn number(args: &Map<String, Value>, key: &str) -> Result<f64> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(value) => value.as_f64().ok_or_else(|| {
            McpError::Validation(format!("Argument {} must be a number", key)).into()
        }),
    }
}

fn bounded(args: &Map<String, Value>, key: &str, default: u64, max: u64) -> Result<u64> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|n| n.min(max))
            .ok_or_else(|| {
                McpError::Validation(format!("Argument {} must be a non-negative integer", key))
                    .into()
            }),
    }
}

fn progress_token(args: &Map<String, Value>) -> Result<ProgressToken> {
    match args.get("progress_token") {
        None | Some(Value::Null) => Ok(ProgressToken::from("long_running_task")),
        Some(Value::String(s)) => Ok(ProgressToken::from(s.as_str())),
        Some(Value::Number(n)) => n.as_i64().map(ProgressToken::Integer).ok_or_else(|| {
            McpError::Validation("Argument progress_token must be an integer".to_string()).into()
        }),
        Some(_) => Err(McpError::Validation(
            "Argument progress_token must be a string or integer".to_string(),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mcp::transport::fake::FakeTransport;
    use crate::mcp::types::Implementation;

    fn demo_server() -> Server {
        let mut server = Server::new(Implementation::new("demo", "1.2.3"));
        register_demo_capabilities(&mut server).unwrap();
        server
    }

    fn args(value: Value) -> Map<String, Value> {
        schema(value)
    }

    #[test]
    fn test_registers_all_capabilities() {
        let server = demo_server();
        let caps = server.capabilities();
        assert!(caps.tools && caps.resources && caps.prompts);
        assert!(!caps.roots);

        let registry = server.registry();
        for name in ["greet", "calculate", "long_running_task"] {
            assert!(registry.tool(name).is_some(), "missing tool {}", name);
        }
        assert!(registry.resource_template(GREETING_URI).is_some());
        assert_eq!(
            registry.tool("calculate").unwrap().description(),
            Some("Performs basic arithmetic on two numbers")
        );
    }

    #[test]
    fn test_registering_twice_fails() {
        let mut server = demo_server();
        let err = register_demo_capabilities(&mut server).unwrap_err();
        assert_eq!(err.to_string(), format!("Resource already exists: {}", SERVER_INFO_URI));
    }

    #[test]
    fn test_greet_defaults_to_world() {
        let server = demo_server();
        let reply = server.handle_tool_call("greet", &Map::new()).unwrap();
        assert_eq!(reply, json!({"status": "success", "message": "Hello, World!"}));
    }

    #[test]
    fn test_calculate_operations() {
        let server = demo_server();
        let cases = [("+", 12.0), ("-", 8.0), ("multiply", 20.0), ("/", 5.0)];
        for (operation, expected) in cases {
            let reply = server
                .handle_tool_call(
                    "calculate",
                    &args(json!({"num1": 10, "num2": 2, "operation": operation})),
                )
                .unwrap();
            assert_eq!(reply["result"], json!(expected), "operation {}", operation);
        }
    }

    #[test]
    fn test_calculate_rejects_bad_input() {
        let server = demo_server();

        let err = server
            .handle_tool_call("calculate", &args(json!({"num1": 1, "num2": 0, "operation": "/"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot divide by zero");
        assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);

        let err = server
            .handle_tool_call("calculate", &args(json!({"num1": "x"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Argument num1 must be a number");

        let err = server
            .handle_tool_call("calculate", &args(json!({"operation": "%"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: %");
    }

    #[test]
    fn test_long_running_task_reports_progress() {
        let fake = Arc::new(FakeTransport::new());
        let mut server = demo_server();
        server.set_transport(fake.clone());

        let reply = server
            .handle_tool_call(
                "long_running_task",
                &args(json!({"steps": 4, "delay_ms": 0, "progress_token": 42})),
            )
            .unwrap();
        assert_eq!(reply["steps"], 4);

        let sent = fake.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[1],
            json!({"type": "progress", "progress": 0.5, "token": 42, "total": 1.0})
        );
        assert_eq!(
            sent[3],
            json!({"type": "progress", "progress": 1.0, "token": 42, "total": 1.0})
        );
        let fractions: Vec<f64> = sent.iter().map(|m| m["progress"].as_f64().unwrap()).collect();
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_long_running_task_without_transport_still_completes() {
        let server = demo_server();
        let reply = server
            .handle_tool_call("long_running_task", &args(json!({"steps": 2, "delay_ms": 0})))
            .unwrap();
        assert_eq!(reply["status"], "success");
    }

    #[test]
    fn test_resources() {
        let server = demo_server();
        let info = server.handle_resource_request(SERVER_INFO_URI).unwrap();
        assert_eq!(
            info,
            json!({"name": "demo", "version": "1.2.3", "mime_type": "application/json"})
        );

        let greeting = server.handle_resource_request(GREETING_URI).unwrap();
        assert_eq!(
            greeting,
            json!({"content": "mcphost://greeting/World", "mime_type": "text/plain"})
        );
    }

    #[test]
    fn test_help_prompt() {
        let server = demo_server();
        let reply = server
            .handle_prompt_request("help", &args(json!({"topic": "tools"})))
            .unwrap();
        assert_eq!(reply["messages"].as_array().unwrap().len(), 3);
        assert_eq!(reply["topic"], "tools");
    }
}
