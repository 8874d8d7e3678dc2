//! Built-in capabilities
//!
//! Registers the server's tools, prompts and resources into a fresh registry.

pub mod prompts;
pub mod resources;
pub mod tools;
pub mod utils;

use std::{path::PathBuf, time::Instant};

use chrono::Utc;

use crate::capability::{RegistrationError, Registry};

pub fn build_registry(file_root: PathBuf) -> Result<Registry, RegistrationError> {
    let mut registry = Registry::new();
    tools::register_tools(
        &mut registry,
        &tools::ToolContext {
            file_root,
            started_at: Instant::now(),
        },
    )?;
    prompts::register_prompts(&mut registry)?;
    resources::register_resources(&mut registry, Utc::now())?;
    Ok(registry)
}
