//! Model Context Protocol static resource providers
//!
//! Exposes server configuration, generated API documentation and usage examples
//! under fixed URIs. Register after tools and prompts: the config and docs
//! resources snapshot the registry as it stands at that point.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use crate::capability::{
    handler_fn, Domain, HandlerDescriptor, ListingMetadata, Outcome, RegistrationError, Registry,
};

pub const CONFIG_RESOURCE_URI: &str = "config://server.json";
pub const DOCS_RESOURCE_URI: &str = "docs://api.md";
pub const EXAMPLES_RESOURCE_URI: &str = "examples://usage.json";

const RESOURCE_URIS: [&str; 3] = [CONFIG_RESOURCE_URI, DOCS_RESOURCE_URI, EXAMPLES_RESOURCE_URI];

pub fn register_resources(
    registry: &mut Registry,
    started_at: DateTime<Utc>,
) -> Result<(), RegistrationError> {
    let tools = registry.list_all(Domain::Action);
    let prompts = registry.list_all(Domain::Generator);

    let config = render_config(&tools, &prompts, started_at);
    registry.register(
        Domain::Content,
        HandlerDescriptor::new(
            CONFIG_RESOURCE_URI,
            "Current configuration of the MCP server",
            handler_fn(move |_args| {
                let config = config.clone();
                async move { Ok(Outcome::text(config)) }
            }),
        )
        .with_title("Server configuration")
        .with_mime_type("application/json"),
    )?;

    let docs = render_docs(&tools, &prompts);
    registry.register(
        Domain::Content,
        HandlerDescriptor::new(
            DOCS_RESOURCE_URI,
            "Documentation of the server's tools, prompts and resources",
            handler_fn(move |_args| {
                let docs = docs.clone();
                async move { Ok(Outcome::text(docs)) }
            }),
        )
        .with_title("API documentation")
        .with_mime_type("text/markdown"),
    )?;

    registry.register(
        Domain::Content,
        HandlerDescriptor::new(
            EXAMPLES_RESOURCE_URI,
            "Examples of how to call the available tools and prompts",
            handler_fn(|_args| async { Ok(Outcome::text(render_examples())) }),
        )
        .with_title("Usage examples")
        .with_mime_type("application/json"),
    )?;

    Ok(())
}

fn names(items: &[ListingMetadata]) -> Vec<&str> {
    items.iter().map(|item| item.identifier.as_str()).collect()
}

fn render_config(
    tools: &[ListingMetadata],
    prompts: &[ListingMetadata],
    started_at: DateTime<Utc>,
) -> String {
    let config = json!({
        "server": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": ["tools", "prompts", "resources"],
        "tools": names(tools),
        "prompts": names(prompts),
        "resources": RESOURCE_URIS,
        "started_at": started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    });

    format!("{config:#}")
}

fn render_docs(tools: &[ListingMetadata], prompts: &[ListingMetadata]) -> String {
    let mut docs = format!("# {} API\n\n## Tools\n", env!("CARGO_PKG_NAME"));

    for tool in tools {
        docs.push_str(&format!("\n### {}\n{}\n", tool.identifier, tool.description));
        if !tool.parameter_docs.is_empty() {
            docs.push_str("\n**Parameters:**\n");
            for parameter in &tool.parameter_docs {
                let mut line = format!(
                    "- `{}` ({}, {})",
                    parameter.name,
                    parameter.kind,
                    if parameter.required { "required" } else { "optional" }
                );
                if let Some(allowed) = &parameter.allowed_values {
                    let allowed = allowed
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(" | ");
                    line.push_str(&format!(": {allowed}"));
                }
                if let Some(description) = &parameter.description {
                    line.push_str(&format!(" - {description}"));
                }
                docs.push_str(&line);
                docs.push('\n');
            }
        }
    }

    docs.push_str("\n## Prompts\n");
    for prompt in prompts {
        docs.push_str(&format!("\n### {}\n{}\n", prompt.identifier, prompt.description));
    }

    docs.push_str("\n## Resources\n\n");
    for uri in RESOURCE_URIS {
        docs.push_str(&format!("- `{uri}`\n"));
    }

    docs
}

fn render_examples() -> String {
    let examples = json!({
        "tools": {
            "get_current_time": [
                {
                    "description": "Current time in readable format",
                    "request": { "tool": "get_current_time", "arguments": { "format": "readable" } }
                },
                {
                    "description": "Current time in ISO format",
                    "request": { "tool": "get_current_time", "arguments": { "format": "iso" } }
                }
            ],
            "http_request": [
                {
                    "description": "Query the GitHub API",
                    "request": {
                        "tool": "http_request",
                        "arguments": { "url": "https://api.github.com/users/octocat", "method": "GET" }
                    }
                }
            ],
            "file_operations": [
                {
                    "description": "List files in a directory",
                    "request": { "tool": "file_operations", "arguments": { "operation": "list", "path": "." } }
                },
                {
                    "description": "Read a configuration file",
                    "request": {
                        "tool": "file_operations",
                        "arguments": { "operation": "read", "path": "Cargo.toml" }
                    }
                }
            ],
            "calculate": [
                {
                    "description": "Evaluate an arithmetic expression",
                    "request": { "tool": "calculate", "arguments": { "expression": "(2 + 3) * 4" } }
                }
            ]
        },
        "prompts": {
            "tech_interview": [
                {
                    "description": "Interview for a senior backend developer",
                    "request": {
                        "prompt": "tech_interview",
                        "arguments": { "role": "backend", "level": "senior", "technology": "Rust" }
                    }
                }
            ]
        }
    });

    format!("{examples:#}")
}
