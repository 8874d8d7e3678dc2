//! Capability registry
//!
//! Maps each capability domain to its handlers by identifier. Populated once during
//! start-up, then shared read-only behind an `Arc` for the rest of the process.

use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::capability::normalizer::Outcome;
use crate::capability::schema::{Arguments, Schema, TypedValue};
use crate::errors::HandlerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Action,
    Generator,
    Content,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Action, Domain::Generator, Domain::Content];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "tool",
            Self::Generator => "prompt",
            Self::Content => "resource",
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Action => 0,
            Self::Generator => 1,
            Self::Content => 2,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn invoke(&self, args: Arguments) -> Result<Outcome, HandlerError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Outcome, HandlerError>> + Send,
{
    async fn invoke(&self, args: Arguments) -> Result<Outcome, HandlerError> {
        (self.0)(args).await
    }
}

/// Wraps an async closure as a `Handler`.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: String,
    pub mime_type: Option<String>,
}

#[derive(Clone)]
pub struct HandlerDescriptor {
    pub identifier: String,
    pub schema: Schema,
    pub metadata: Metadata,
    pub handler: Arc<dyn Handler>,
}

impl HandlerDescriptor {
    pub fn new(
        identifier: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            schema: Schema::default(),
            metadata: Metadata {
                description: description.into(),
                ..Metadata::default()
            },
            handler,
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.metadata.mime_type = Some(mime_type.into());
        self
    }

    pub fn listing(&self) -> ListingMetadata {
        ListingMetadata {
            identifier: self.identifier.clone(),
            title: self.metadata.title.clone(),
            description: self.metadata.description.clone(),
            mime_type: self.metadata.mime_type.clone(),
            input_schema: self.schema.json_schema(),
            parameter_docs: self
                .schema
                .fields()
                .iter()
                .map(|field| ParameterDoc {
                    name: field.name.clone(),
                    kind: field.kind.as_str(),
                    required: field.required,
                    description: field.description.clone(),
                    allowed_values: field
                        .allowed_values
                        .as_ref()
                        .map(|values| values.iter().map(TypedValue::to_json).collect()),
                    default: field.default.as_ref().map(TypedValue::to_json),
                })
                .collect(),
        }
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("identifier", &self.identifier)
            .field("schema", &self.schema)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDoc {
    pub name: String,
    pub kind: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingMetadata {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip)]
    pub input_schema: Value,
    pub parameter_docs: Vec<ParameterDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("duplicate {domain} identifier: {identifier}")]
    DuplicateIdentifier { domain: Domain, identifier: String },
    #[error("{domain} identifier must not be empty")]
    EmptyIdentifier { domain: Domain },
}

#[derive(Default)]
struct DomainTable {
    entries: Vec<HandlerDescriptor>,
    index: HashMap<String, usize>,
}

#[derive(Default)]
pub struct Registry {
    tables: [DomainTable; 3],
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        domain: Domain,
        descriptor: HandlerDescriptor,
    ) -> Result<(), RegistrationError> {
        if descriptor.identifier.trim().is_empty() {
            return Err(RegistrationError::EmptyIdentifier { domain });
        }

        let table = &mut self.tables[domain.slot()];
        if table.index.contains_key(&descriptor.identifier) {
            return Err(RegistrationError::DuplicateIdentifier {
                domain,
                identifier: descriptor.identifier,
            });
        }

        table
            .index
            .insert(descriptor.identifier.clone(), table.entries.len());
        table.entries.push(descriptor);
        Ok(())
    }

    pub fn resolve(&self, domain: Domain, identifier: &str) -> Option<&HandlerDescriptor> {
        let table = &self.tables[domain.slot()];
        table
            .index
            .get(identifier)
            .map(|position| &table.entries[*position])
    }

    pub fn list_all(&self, domain: Domain) -> Vec<ListingMetadata> {
        self.tables[domain.slot()]
            .entries
            .iter()
            .map(HandlerDescriptor::listing)
            .collect()
    }

    pub fn identifiers(&self, domain: Domain) -> Vec<&str> {
        self.tables[domain.slot()]
            .entries
            .iter()
            .map(|descriptor| descriptor.identifier.as_str())
            .collect()
    }

    pub fn len(&self, domain: Domain) -> usize {
        self.tables[domain.slot()].entries.len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for domain in Domain::ALL {
            map.entry(&domain.as_str(), &self.identifiers(domain));
        }
        map.finish()
    }
}
