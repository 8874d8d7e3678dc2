//! Newline-delimited JSON-RPC transport
//!
//! Every frame is a single line of UTF-8 JSON. Blank lines are skipped and
//! end of input ends the session. A frame that is not UTF-8 or not JSON is
//! answered with a parse error and the session carries on.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::{debug, info, warn};

use crate::capability::Dispatcher;
use crate::errors::AppError;
use crate::mcp::rpc::{json_rpc_error, PARSE_ERROR};
use crate::mcp::server::handle_json_rpc_text;

#[async_trait]
pub trait Transport: Send {
    /// Raw bytes of the next non-blank frame, or `None` once the peer has closed its side.
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, AppError>;

    async fn send(&mut self, message: &Value) -> Result<(), AppError>;
}

pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    line: Vec<u8>,
}

impl<R, W> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: Vec::new(),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

pub fn stdio() -> LineTransport<BufReader<Stdin>, Stdout> {
    LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
}

#[async_trait]
impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, AppError> {
        loop {
            self.line.clear();
            let bytes_read = self
                .reader
                .read_until(b'\n', &mut self.line)
                .await
                .map_err(|err| AppError::internal(format!("transport read failed: {err}")))?;

            if bytes_read == 0 {
                return Ok(None);
            }

            let trimmed = self.line.trim_ascii();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_vec()));
            }
        }
    }

    async fn send(&mut self, message: &Value) -> Result<(), AppError> {
        let mut frame = serde_json::to_string(message)
            .map_err(|err| AppError::internal(format!("frame serialization failed: {err}")))?;
        frame.push('\n');

        self.writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|err| AppError::internal(format!("transport write failed: {err}")))?;
        self.writer
            .flush()
            .await
            .map_err(|err| AppError::internal(format!("transport flush failed: {err}")))
    }
}

/// Drives one session: frames are handled in arrival order and every
/// response is written before the next frame is read.
pub async fn serve<T: Transport>(transport: &mut T, dispatcher: &Dispatcher) -> Result<(), AppError> {
    info!("stdio transport started");

    while let Some(frame) = transport.receive().await? {
        let response = match std::str::from_utf8(&frame) {
            Ok(text) => handle_json_rpc_text(dispatcher, text).await,
            Err(err) => {
                warn!(error = %err, "frame is not valid UTF-8");
                Some(json_rpc_error(None, PARSE_ERROR, "Parse error"))
            }
        };

        match response {
            Some(response) => transport.send(&response).await?,
            None => debug!("notification handled without response"),
        }
    }

    info!("end of input, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::capability::{handler_fn, Domain, HandlerDescriptor, Outcome, Registry, Schema};

    fn dispatcher() -> Dispatcher {
        let mut registry = Registry::new();
        registry
            .register(
                Domain::Action,
                HandlerDescriptor::new(
                    "echo",
                    "Echoes the message",
                    handler_fn(|args| async move {
                        Ok(Outcome::text(args.str("message").unwrap_or_default().to_string()))
                    }),
                )
                .with_schema(Schema::new().required_string("message")),
            )
            .expect("register echo");
        Dispatcher::new(Arc::new(registry))
    }

    async fn run_session(input: &[u8]) -> Vec<Value> {
        let mut transport = LineTransport::new(input, Vec::new());
        serve(&mut transport, &dispatcher()).await.expect("session");

        String::from_utf8(transport.into_writer())
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json frame"))
            .collect()
    }

    #[tokio::test]
    async fn answers_each_request_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"message":"hi"}}}"#,
            "\n",
        );

        let responses = run_session(input.as_bytes()).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"], json!({}));
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"]["content"][0]["text"], "hi");
        assert_eq!(responses[1]["result"]["isError"], false);
    }

    #[tokio::test]
    async fn malformed_frame_yields_parse_error_and_session_continues() {
        let input = concat!(
            "{not json\n",
            r#"{"jsonrpc":"2.0","id":"b","method":"tools/list"}"#,
            "\n",
        );

        let responses = run_session(input.as_bytes()).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert!(responses[0]["id"].is_null());
        assert_eq!(responses[1]["id"], "b");
        assert_eq!(responses[1]["result"]["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn non_utf8_frame_yields_parse_error_and_session_continues() {
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.push(b'\n');

        let responses = run_session(&input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert!(responses[0]["id"].is_null());
        assert_eq!(responses[1]["id"], 1);
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn notifications_produce_no_output() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
        );

        assert!(run_session(input.as_bytes()).await.is_empty());
    }

    #[tokio::test]
    async fn empty_input_ends_session_cleanly() {
        assert!(run_session(b"").await.is_empty());
    }
}
