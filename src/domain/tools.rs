//! Invocable tools exposed via Model Context Protocol
//!
//! Each tool declares its input `Schema` and implements `Handler`; the dispatcher
//! validates arguments before any of these bodies run.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{Local, SecondsFormat, Utc};
use serde_json::json;

use crate::capability::{
    Arguments, Domain, FieldKind, FieldSpec, Handler, HandlerDescriptor, Outcome,
    RegistrationError, Registry, Schema, TypedValue,
};
use crate::domain::utils::{
    evaluate_expression, format_number, parse_meminfo, parse_uptime, resolve_sandboxed,
    truncate_chars, MAX_BODY_PREVIEW_CHARS,
};
use crate::errors::HandlerError;

pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ToolContext {
    pub file_root: PathBuf,
    pub started_at: Instant,
}

pub fn register_tools(
    registry: &mut Registry,
    context: &ToolContext,
) -> Result<(), RegistrationError> {
    registry.register(
        Domain::Action,
        HandlerDescriptor::new(
            "get_current_time",
            "Returns the current system date and time",
            Arc::new(CurrentTimeTool),
        )
        .with_schema(Schema::new().field(
            FieldSpec::new("format", FieldKind::String)
                .one_of(["iso", "readable"])
                .default_value(TypedValue::String("readable".to_string()))
                .describe("Output format of the date"),
        )),
    )?;

    registry.register(
        Domain::Action,
        HandlerDescriptor::new(
            "http_request",
            "Performs an outbound HTTP request",
            Arc::new(HttpRequestTool::new()),
        )
        .with_schema(
            Schema::new()
                .field(
                    FieldSpec::new("url", FieldKind::String)
                        .required()
                        .describe("Target URL"),
                )
                .field(
                    FieldSpec::new("method", FieldKind::String)
                        .one_of(["GET", "POST"])
                        .default_value(TypedValue::String("GET".to_string()))
                        .describe("HTTP method"),
                ),
        ),
    )?;

    registry.register(
        Domain::Action,
        HandlerDescriptor::new(
            "file_operations",
            "Basic file operations under the server's file root",
            Arc::new(FileOperationsTool {
                root: context.file_root.clone(),
            }),
        )
        .with_schema(
            Schema::new()
                .field(
                    FieldSpec::new("operation", FieldKind::String)
                        .required()
                        .one_of(["read", "write", "list"])
                        .describe("Kind of operation"),
                )
                .field(
                    FieldSpec::new("path", FieldKind::String)
                        .required()
                        .describe("File or directory path, relative to the file root"),
                )
                .field(
                    FieldSpec::new("content", FieldKind::String)
                        .describe("Content for write operations"),
                ),
        ),
    )?;

    registry.register(
        Domain::Action,
        HandlerDescriptor::new(
            "system_info",
            "Returns information about the host system",
            Arc::new(SystemInfoTool {
                started_at: context.started_at,
            }),
        ),
    )?;

    registry.register(
        Domain::Action,
        HandlerDescriptor::new(
            "calculate",
            "Evaluates a basic arithmetic expression",
            Arc::new(CalculateTool),
        )
        .with_schema(Schema::new().field(
            FieldSpec::new("expression", FieldKind::String)
                .required()
                .describe("Arithmetic expression using + - * / and parentheses"),
        )),
    )?;

    Ok(())
}

pub struct CurrentTimeTool;

#[async_trait]
impl Handler for CurrentTimeTool {
    async fn invoke(&self, args: Arguments) -> Result<Outcome, HandlerError> {
        let formatted = match args.str("format") {
            Some("iso") => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            _ => Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        Ok(Outcome::text(format!("Current date and time: {formatted}")))
    }
}

pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for HttpRequestTool {
    async fn invoke(&self, args: Arguments) -> Result<Outcome, HandlerError> {
        let raw_url = args
            .str("url")
            .ok_or_else(|| HandlerError::InvalidInput("url is required".to_string()))?;
        let url = reqwest::Url::parse(raw_url)
            .map_err(|err| HandlerError::InvalidInput(format!("invalid url {raw_url}: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HandlerError::InvalidInput(format!(
                "unsupported url scheme: {}",
                url.scheme()
            )));
        }

        let method = match args.str("method") {
            Some("POST") => reqwest::Method::POST,
            _ => reqwest::Method::GET,
        };

        let response = self
            .client
            .request(method, url)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect::<BTreeMap<_, _>>();
        let body = response.text().await?;
        let (preview, truncated) = truncate_chars(&body, MAX_BODY_PREVIEW_CHARS);

        Ok(Outcome::text(format!(
            "Status: {}\nHeaders: {}\nData: {}{}",
            status.as_u16(),
            serde_json::to_string_pretty(&headers)?,
            preview,
            if truncated { "..." } else { "" }
        )))
    }
}

pub struct FileOperationsTool {
    root: PathBuf,
}

#[async_trait]
impl Handler for FileOperationsTool {
    async fn invoke(&self, args: Arguments) -> Result<Outcome, HandlerError> {
        let requested = args
            .str("path")
            .ok_or_else(|| HandlerError::InvalidInput("path is required".to_string()))?;
        let path = resolve_sandboxed(&self.root, requested)?;

        match args.str("operation") {
            Some("read") => {
                let data = tokio::fs::read_to_string(&path).await?;
                Ok(Outcome::text(format!("Contents of {requested}:\n{data}")))
            }
            Some("write") => {
                let content = args.str("content").ok_or_else(|| {
                    HandlerError::InvalidInput("content is required for write".to_string())
                })?;
                tokio::fs::write(&path, content).await?;
                Ok(Outcome::text(format!("File written successfully: {requested}")))
            }
            Some("list") => {
                let mut entries = tokio::fs::read_dir(&path).await?;
                let mut names = Vec::new();
                while let Some(entry) = entries.next_entry().await? {
                    let mut name = entry.file_name().to_string_lossy().into_owned();
                    if entry.file_type().await?.is_dir() {
                        name.push('/');
                    }
                    names.push(name);
                }
                names.sort();
                Ok(Outcome::text(format!(
                    "Contents of {requested}:\n{}",
                    names.join("\n")
                )))
            }
            other => Err(HandlerError::InvalidInput(format!(
                "unsupported operation: {}",
                other.unwrap_or_default()
            ))),
        }
    }
}

pub struct SystemInfoTool {
    started_at: Instant,
}

#[async_trait]
impl Handler for SystemInfoTool {
    async fn invoke(&self, _args: Arguments) -> Result<Outcome, HandlerError> {
        let cpus = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        let uptime_secs = tokio::fs::read_to_string("/proc/uptime")
            .await
            .ok()
            .and_then(|text| parse_uptime(&text));
        let (memory_total, memory_available) = tokio::fs::read_to_string("/proc/meminfo")
            .await
            .map(|text| parse_meminfo(&text))
            .unwrap_or((None, None));

        let info = json!({
            "platform": std::env::consts::OS,
            "family": std::env::consts::FAMILY,
            "arch": std::env::consts::ARCH,
            "cpus": cpus,
            "server_version": env!("CARGO_PKG_VERSION"),
            "process_uptime_secs": self.started_at.elapsed().as_secs(),
            "uptime_secs": uptime_secs,
            "memory": {
                "total": memory_total,
                "available": memory_available,
            },
        });

        Ok(Outcome::text(format!(
            "System information:\n{}",
            serde_json::to_string_pretty(&info)?
        )))
    }
}

pub struct CalculateTool;

#[async_trait]
impl Handler for CalculateTool {
    async fn invoke(&self, args: Arguments) -> Result<Outcome, HandlerError> {
        let expression = args
            .str("expression")
            .ok_or_else(|| HandlerError::InvalidInput("expression is required".to_string()))?;
        let value = evaluate_expression(expression)?;
        Ok(Outcome::text(format!("Result: {}", format_number(value))))
    }
}
