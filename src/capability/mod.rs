//! Capability dispatch core
//!
//! Schema validation, the capability registry, the request dispatcher and the
//! response normalizer. Transport-agnostic: the MCP layer translates JSON-RPC into
//! `Request` values and renders `Response` values back.

pub mod dispatcher;
pub mod normalizer;
pub mod registry;
pub mod schema;

pub use dispatcher::{Dispatcher, Operation, ProtocolError, Request, Response};
pub use normalizer::{ContentBlock, Envelope, Normalize, Outcome};
pub use registry::{
    handler_fn, Domain, Handler, HandlerDescriptor, ListingMetadata, RegistrationError, Registry,
};
pub use schema::{validate, Arguments, FieldKind, FieldSpec, Schema, TypedValue, ValidationError};
