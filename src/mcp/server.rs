//! The central Model Context Protocol engine
//!
//! Provides the primary MCP JSON-RPC decoding, capabilities negotiation
//! (`initialize`), and the translation of `tools/*`, `prompts/*` and `resources/*`
//! methods into dispatcher requests and back into MCP result shapes.

use rust_mcp_sdk::schema::{
    CallToolRequest, CallToolRequestParams, CallToolResult, ContentBlock as McpContentBlock,
    GetPromptRequest, GetPromptResult, Implementation, InitializeRequest, InitializeResult,
    JsonrpcMessage, JsonrpcRequest, ListPromptsRequest, ListPromptsResult, ListResourcesRequest,
    ListResourcesResult, ListToolsRequest, ListToolsResult, PingRequest, Prompt, PromptMessage,
    ProtocolVersion, ReadResourceContent, ReadResourceRequest, ReadResourceRequestParams,
    ReadResourceResult, Resource, Role, ServerCapabilities, ServerCapabilitiesPrompts,
    ServerCapabilitiesResources, ServerCapabilitiesTools, TextContent, TextResourceContents, Tool,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::capability::{Dispatcher, Domain, Envelope, ListingMetadata};
use crate::errors::AppError;
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
    protocol_error_to_json_rpc, request_id_to_value, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

/// Handles one decoded JSON-RPC payload, either a single message or a batch.
/// Returns `None` when nothing should be written back (notifications only).
pub async fn handle_json_rpc_payload(dispatcher: &Dispatcher, payload: Value) -> Option<Value> {
    let Some(batch) = payload.as_array() else {
        return handle_json_rpc_value(dispatcher, payload).await;
    };

    if batch.is_empty() {
        return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
    }

    let mut responses = Vec::new();
    for item in batch {
        if let Some(response) = handle_json_rpc_value(dispatcher, item.clone()).await {
            responses.push(response);
        }
    }

    if responses.is_empty() {
        None
    } else {
        Some(Value::Array(responses))
    }
}

pub async fn handle_json_rpc_text(dispatcher: &Dispatcher, text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(payload) => handle_json_rpc_payload(dispatcher, payload).await,
        Err(_) => Some(json_rpc_error(None, PARSE_ERROR, "Parse error")),
    }
}

pub async fn handle_json_rpc_value(dispatcher: &Dispatcher, payload: Value) -> Option<Value> {
    if !payload.is_object() {
        return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
    }

    let request_id = payload.get("id").cloned();
    let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
    };

    match parsed {
        JsonrpcMessage::Request(request) => {
            if let Err(error_response) = validate_request_shape(&request) {
                return Some(error_response);
            }

            let request_id = request_id_to_value(request.id);
            if request.method.trim().is_empty() {
                return Some(json_rpc_error(Some(request_id), INVALID_REQUEST, "Invalid Request"));
            }

            Some(
                handle_json_rpc_request(
                    dispatcher,
                    Some(request_id),
                    request.method,
                    request.params.map(Value::Object),
                )
                .await,
            )
        }
        JsonrpcMessage::Notification(notification) => {
            if notification.method.trim().is_empty() {
                return None;
            }

            let _ = handle_json_rpc_request(
                dispatcher,
                None,
                notification.method,
                notification.params.map(Value::Object),
            )
            .await;
            None
        }
        JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
            Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"))
        }
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let payload = serde_json::to_value(request).expect("jsonrpc request serialization");
    let request_id = Some(request_id_to_value(request.id.clone()));

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "prompts/get" => serde_json::from_value::<GetPromptRequest>(payload).is_ok(),
        "prompts/list" => serde_json::from_value::<ListPromptsRequest>(payload).is_ok(),
        "resources/read" => serde_json::from_value::<ReadResourceRequest>(payload).is_ok(),
        "resources/list" => serde_json::from_value::<ListResourcesRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(request_id, INVALID_PARAMS, "Invalid params"))
    }
}

pub async fn handle_json_rpc_request(
    dispatcher: &Dispatcher,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
) -> Value {
    let audit_params = redact_audit_params(params.as_ref());

    let response = match method.as_str() {
        "initialize" => {
            let protocol_version = match negotiate_protocol_version(params.as_ref()) {
                Ok(version) => version,
                Err(err) => return app_error_to_json_rpc(id, err),
            };

            let initialize_result = InitializeResult {
                server_info: Implementation {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: None,
                    description: None,
                    icons: vec![],
                    website_url: None,
                },
                capabilities: ServerCapabilities {
                    tools: Some(ServerCapabilitiesTools {
                        list_changed: Some(false),
                    }),
                    prompts: Some(ServerCapabilitiesPrompts {
                        list_changed: Some(false),
                    }),
                    resources: Some(ServerCapabilitiesResources {
                        subscribe: Some(false),
                        list_changed: Some(false),
                    }),
                    ..Default::default()
                },
                protocol_version: protocol_version.into(),
                instructions: None,
                meta: None,
            };

            json_rpc_result(
                id,
                serde_json::to_value(initialize_result).expect("initialize result serialization"),
            )
        }
        "ping" | "notifications/initialized" => json_rpc_result(id, json!({})),
        "tools/list" => match render_tools(&dispatcher.list(Domain::Action)) {
            Ok(tools) => json_rpc_result(
                id,
                serde_json::to_value(ListToolsResult {
                    meta: None,
                    next_cursor: None,
                    tools,
                })
                .expect("tools list result serialization"),
            ),
            Err(err) => listing_failure(id, Domain::Action, err),
        },
        "prompts/list" => match render_prompts(&dispatcher.list(Domain::Generator)) {
            Ok(prompts) => json_rpc_result(
                id,
                serde_json::to_value(ListPromptsResult {
                    meta: None,
                    next_cursor: None,
                    prompts,
                })
                .expect("prompts list result serialization"),
            ),
            Err(err) => listing_failure(id, Domain::Generator, err),
        },
        "resources/list" => json_rpc_result(
            id,
            serde_json::to_value(ListResourcesResult {
                meta: None,
                next_cursor: None,
                resources: render_resources(&dispatcher.list(Domain::Content)),
            })
            .expect("resources list result serialization"),
        ),
        "tools/call" => handle_tools_call(dispatcher, id, params).await,
        "prompts/get" => handle_prompts_get(dispatcher, id, params).await,
        "resources/read" => handle_resources_read(dispatcher, id, params).await,
        _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
    };

    info!(
        method = %method,
        params = %audit_params,
        outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
        "mcp action audited"
    );

    response
}

fn listing_failure(id: Option<Value>, domain: Domain, err: serde_json::Error) -> Value {
    error!(domain = %domain, error = %err, "listing does not fit the MCP schema");
    app_error_to_json_rpc(id, AppError::internal(err.to_string()))
}

async fn handle_tools_call(dispatcher: &Dispatcher, id: Option<Value>, params: Option<Value>) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let envelope = match dispatcher
        .invoke_envelope(
            Domain::Action,
            &tool_call.name,
            tool_call.arguments.map(Value::Object),
        )
        .await
    {
        Ok(envelope) => envelope,
        Err(err) => return protocol_error_to_json_rpc(id, &err),
    };

    json_rpc_result(
        id,
        serde_json::to_value(CallToolResult {
            content: envelope
                .content
                .iter()
                .map(|block| McpContentBlock::from(TextContent::new(block.as_text().to_string(), None, None)))
                .collect(),
            is_error: Some(envelope.is_error),
            meta: None,
            structured_content: None,
        })
        .expect("tool call result serialization"),
    )
}

async fn handle_prompts_get(dispatcher: &Dispatcher, id: Option<Value>, params: Option<Value>) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let prompt_get: GetPromptParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let envelope = match dispatcher
        .invoke_envelope(
            Domain::Generator,
            &prompt_get.name,
            prompt_get.arguments.map(Value::Object),
        )
        .await
    {
        Ok(envelope) => envelope,
        Err(err) => return protocol_error_to_json_rpc(id, &err),
    };

    let description = dispatcher
        .registry()
        .resolve(Domain::Generator, &prompt_get.name)
        .map(|descriptor| descriptor.metadata.description.clone());

    json_rpc_result(id, render_prompt_result(description, &envelope))
}

async fn handle_resources_read(
    dispatcher: &Dispatcher,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let envelope = match dispatcher
        .invoke_envelope(Domain::Content, &resource_read.uri, None)
        .await
    {
        Ok(envelope) => envelope,
        Err(err) => return protocol_error_to_json_rpc(id, &err),
    };

    let mime_type = if envelope.is_error {
        Some("text/plain".to_string())
    } else {
        dispatcher
            .registry()
            .resolve(Domain::Content, &resource_read.uri)
            .and_then(|descriptor| descriptor.metadata.mime_type.clone())
    };

    let mut result = serde_json::to_value(ReadResourceResult {
        contents: envelope
            .content
            .iter()
            .map(|block| {
                ReadResourceContent::from(TextResourceContents {
                    meta: None,
                    mime_type: mime_type.clone(),
                    text: block.as_text().to_string(),
                    uri: resource_read.uri.clone(),
                })
            })
            .collect(),
        meta: None,
    })
    .expect("read resource result serialization");

    if let Some(object) = result.as_object_mut() {
        object.insert("isError".to_string(), json!(envelope.is_error));
    }

    json_rpc_result(id, result)
}

pub fn render_tools(items: &[ListingMetadata]) -> Result<Vec<Tool>, serde_json::Error> {
    items
        .iter()
        .map(|item| {
            serde_json::from_value(json!({
                "name": item.identifier,
                "description": item.description,
                "inputSchema": item.input_schema,
            }))
        })
        .collect()
}

pub fn render_prompts(items: &[ListingMetadata]) -> Result<Vec<Prompt>, serde_json::Error> {
    items
        .iter()
        .map(|item| {
            let arguments = item
                .parameter_docs
                .iter()
                .map(|parameter| {
                    let mut argument = Map::new();
                    argument.insert("name".to_string(), json!(parameter.name));
                    if let Some(description) = &parameter.description {
                        argument.insert("description".to_string(), json!(description));
                    }
                    argument.insert("required".to_string(), json!(parameter.required));
                    Value::Object(argument)
                })
                .collect::<Vec<_>>();

            serde_json::from_value(json!({
                "name": item.identifier,
                "description": item.description,
                "arguments": arguments,
            }))
        })
        .collect()
}

pub fn render_resources(items: &[ListingMetadata]) -> Vec<Resource> {
    items
        .iter()
        .map(|item| Resource {
            annotations: None,
            description: Some(item.description.clone()),
            icons: vec![],
            meta: None,
            mime_type: item.mime_type.clone(),
            name: item.title.clone().unwrap_or_else(|| item.identifier.clone()),
            size: None,
            title: None,
            uri: item.identifier.clone(),
        })
        .collect()
}

pub fn render_prompt_result(description: Option<String>, envelope: &Envelope) -> Value {
    let mut result = serde_json::to_value(GetPromptResult {
        description,
        messages: envelope
            .content
            .iter()
            .map(|block| PromptMessage {
                content: McpContentBlock::from(TextContent::new(
                    block.as_text().to_string(),
                    None,
                    None,
                )),
                role: Role::User,
            })
            .collect(),
        meta: None,
    })
    .expect("get prompt result serialization");

    if let Some(object) = result.as_object_mut() {
        object.insert("isError".to_string(), json!(envelope.is_error));
    }

    result
}

pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<ProtocolVersion, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    if offered_version != SUPPORTED_PROTOCOL_VERSION {
        return Err(AppError::bad_request(
            "unsupported_protocol_version",
            "unsupported initialize protocolVersion",
        ));
    }

    Ok(ProtocolVersion::V2024_11_05)
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
