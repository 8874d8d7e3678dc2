//! HTTP transport for the Model Context Protocol
//!
//! Serves the bearer-protected `/mcp` endpoint next to public health and discovery routes.

pub mod handlers;
