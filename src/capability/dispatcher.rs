//! Request dispatcher
//!
//! Resolves a request against the registry, validates its payload, runs the handler
//! behind a catch-all boundary and normalizes the result. Only an unknown capability
//! produces a `ProtocolError`; everything else comes back as an `Envelope`.

use std::{any::Any, sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::capability::normalizer::{Envelope, Normalize, Outcome};
use crate::capability::registry::{Domain, HandlerDescriptor, ListingMetadata, Registry};
use crate::capability::schema::{validate, Arguments};

pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    List,
    Invoke {
        identifier: String,
        payload: Option<Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub domain: Domain,
    pub operation: Operation,
}

impl Request {
    pub fn list(domain: Domain) -> Self {
        Self {
            domain,
            operation: Operation::List,
        }
    }

    pub fn invoke(domain: Domain, identifier: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            domain,
            operation: Operation::Invoke {
                identifier: identifier.into(),
                payload,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Listing { items: Vec<ListingMetadata> },
    Envelope(Envelope),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown {domain}: {identifier}")]
    UnknownCapability { domain: Domain, identifier: String },
}

impl ProtocolError {
    pub fn code(&self) -> String {
        match self {
            Self::UnknownCapability { domain, .. } => format!("{domain}_not_found"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    handler_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    pub fn with_handler_timeout(mut self, handler_timeout: Duration) -> Self {
        self.handler_timeout = handler_timeout;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Listings skip validation and invocation and cannot fail.
    pub fn list(&self, domain: Domain) -> Vec<ListingMetadata> {
        self.registry.list_all(domain)
    }

    pub async fn handle(&self, request: Request) -> Result<Response, ProtocolError> {
        match request.operation {
            Operation::List => Ok(Response::Listing {
                items: self.list(request.domain),
            }),
            Operation::Invoke {
                identifier,
                payload,
            } => self
                .invoke_envelope(request.domain, &identifier, payload)
                .await
                .map(Response::Envelope),
        }
    }

    pub async fn invoke_envelope(
        &self,
        domain: Domain,
        identifier: &str,
        payload: Option<Value>,
    ) -> Result<Envelope, ProtocolError> {
        let Some(descriptor) = self.registry.resolve(domain, identifier) else {
            debug!(domain = %domain, identifier, "unknown capability requested");
            return Err(ProtocolError::UnknownCapability {
                domain,
                identifier: identifier.to_string(),
            });
        };

        let args = match validate(&descriptor.schema, payload.as_ref()) {
            Ok(args) => args,
            Err(err) => {
                debug!(domain = %domain, identifier, error = %err, "input rejected");
                return Ok(err.normalize());
            }
        };

        Ok(self.invoke(domain, descriptor, args).await.normalize())
    }

    async fn invoke(
        &self,
        domain: Domain,
        descriptor: &HandlerDescriptor,
        args: Arguments,
    ) -> Outcome {
        let identifier = descriptor.identifier.as_str();
        let handler = Arc::clone(&descriptor.handler);
        let mut task = tokio::spawn(async move { handler.invoke(args).await });

        match tokio::time::timeout(self.handler_timeout, &mut task).await {
            Ok(Ok(Ok(outcome))) => {
                if let Outcome::Failure(message) = &outcome {
                    warn!(
                        domain = %domain,
                        identifier,
                        error = %message,
                        "handler reported failure"
                    );
                }
                outcome
            }
            Ok(Ok(Err(err))) => {
                warn!(domain = %domain, identifier, error = %err, "handler failed");
                Outcome::from(err)
            }
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "task cancelled".to_string()
                };
                warn!(domain = %domain, identifier, reason = %reason, "handler aborted");
                Outcome::failure(format!("Error: {domain} {identifier} aborted: {reason}"))
            }
            Err(_elapsed) => {
                task.abort();
                warn!(
                    domain = %domain,
                    identifier,
                    timeout_ms = self.handler_timeout.as_millis(),
                    "handler timed out"
                );
                Outcome::failure(format!(
                    "Error: {domain} {identifier} timed out after {} ms",
                    self.handler_timeout.as_millis()
                ))
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "panic".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::normalizer::ContentBlock;
    use crate::capability::registry::{handler_fn, HandlerDescriptor};
    use crate::capability::schema::Schema;
    use crate::errors::HandlerError;
    use serde_json::json;

    fn echo_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                Domain::Action,
                HandlerDescriptor::new(
                    "echo",
                    "Echo a message",
                    handler_fn(|args| async move {
                        Ok(Outcome::text(args.str("msg").unwrap_or_default()))
                    }),
                )
                .with_schema(Schema::new().required_string("msg")),
            )
            .expect("register echo");
        registry
            .register(
                Domain::Action,
                HandlerDescriptor::new(
                    "fail",
                    "Always fails",
                    handler_fn(|_args| async {
                        Err(HandlerError::Io("disk unplugged".to_string()))
                    }),
                ),
            )
            .expect("register fail");
        registry
            .register(
                Domain::Action,
                HandlerDescriptor::new(
                    "refuse",
                    "Returns a failure outcome",
                    handler_fn(|_args| async { Ok(Outcome::failure("not today")) }),
                ),
            )
            .expect("register refuse");
        registry
            .register(
                Domain::Action,
                HandlerDescriptor::new(
                    "explode",
                    "Panics",
                    handler_fn(|_args| async {
                        if true {
                            panic!("kaboom");
                        }
                        Ok(Outcome::text("unreachable"))
                    }),
                ),
            )
            .expect("register explode");
        registry
            .register(
                Domain::Action,
                HandlerDescriptor::new(
                    "slow",
                    "Sleeps",
                    handler_fn(|_args| async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(Outcome::text("late"))
                    }),
                ),
            )
            .expect("register slow");
        registry
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(echo_registry()))
    }

    #[tokio::test]
    async fn echo_without_msg_reports_missing_field() {
        let envelope = dispatcher()
            .invoke_envelope(Domain::Action, "echo", Some(json!({})))
            .await
            .expect("known tool");

        assert_eq!(
            envelope,
            Envelope {
                content: vec![ContentBlock::text("Missing field: msg")],
                is_error: true,
            }
        );
    }

    #[tokio::test]
    async fn echo_with_msg_returns_content_unchanged() {
        let envelope = dispatcher()
            .invoke_envelope(Domain::Action, "echo", Some(json!({ "msg": "hi" })))
            .await
            .expect("known tool");

        assert_eq!(envelope, Envelope::success(vec![ContentBlock::text("hi")]));
    }

    #[tokio::test]
    async fn unknown_identifier_is_protocol_error() {
        let error = dispatcher()
            .handle(Request::invoke(Domain::Action, "nope", Some(json!({}))))
            .await
            .expect_err("nope is not registered");

        assert_eq!(
            error,
            ProtocolError::UnknownCapability {
                domain: Domain::Action,
                identifier: "nope".to_string(),
            }
        );
        assert!(error.to_string().contains("nope"));
        assert_eq!(error.code(), "tool_not_found");
    }

    #[tokio::test]
    async fn identifier_registered_in_other_domain_is_unknown() {
        let error = dispatcher()
            .handle(Request::invoke(Domain::Generator, "echo", None))
            .await
            .expect_err("echo is a tool, not a prompt");
        assert_eq!(error.code(), "prompt_not_found");
    }

    #[tokio::test]
    async fn handler_error_becomes_error_envelope() {
        let envelope = dispatcher()
            .invoke_envelope(Domain::Action, "fail", None)
            .await
            .expect("known tool");

        assert!(envelope.is_error);
        assert!(envelope.joined_text().contains("disk unplugged"));
    }

    #[tokio::test]
    async fn failure_outcome_is_normalized_like_handler_error() {
        let envelope = dispatcher()
            .invoke_envelope(Domain::Action, "refuse", None)
            .await
            .expect("known tool");

        assert_eq!(envelope, Envelope::error("not today"));
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let envelope = dispatcher()
            .invoke_envelope(Domain::Action, "explode", None)
            .await
            .expect("known tool");

        assert!(envelope.is_error);
        assert!(envelope.joined_text().contains("kaboom"));
    }

    #[tokio::test]
    async fn slow_handler_times_out_as_failure() {
        let dispatcher = dispatcher().with_handler_timeout(Duration::from_millis(50));
        let envelope = dispatcher
            .invoke_envelope(Domain::Action, "slow", None)
            .await
            .expect("known tool");

        assert!(envelope.is_error);
        assert!(envelope.joined_text().contains("timed out"));
    }

    #[tokio::test]
    async fn list_returns_registration_order_regardless_of_prior_invokes() {
        let dispatcher = dispatcher();
        let _ = dispatcher
            .invoke_envelope(Domain::Action, "refuse", None)
            .await;
        let _ = dispatcher
            .invoke_envelope(Domain::Action, "echo", Some(json!({ "msg": "x" })))
            .await;

        let Response::Listing { items } = dispatcher
            .handle(Request::list(Domain::Action))
            .await
            .expect("list never fails")
        else {
            panic!("expected listing");
        };

        let names = items
            .iter()
            .map(|item| item.identifier.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["echo", "fail", "refuse", "explode", "slow"]);
    }

    #[tokio::test]
    async fn list_shortcut_matches_list_request() {
        let dispatcher = dispatcher();

        let Response::Listing { items } = dispatcher
            .handle(Request::list(Domain::Action))
            .await
            .expect("list never fails")
        else {
            panic!("expected listing");
        };

        assert_eq!(dispatcher.list(Domain::Action), items);
        assert!(dispatcher.list(Domain::Generator).is_empty());
    }

    #[tokio::test]
    async fn list_of_empty_domain_is_empty() {
        let response = dispatcher()
            .handle(Request::list(Domain::Content))
            .await
            .expect("list never fails");

        assert_eq!(
            serde_json::to_value(response).expect("serialize"),
            json!({ "items": [] })
        );
    }
}
