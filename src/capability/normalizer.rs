//! Handler outcomes and the uniform response envelope
//!
//! Every terminal state of an invocation (handler success, handler failure, invalid
//! input) folds into an `Envelope` through `Normalize`.

use serde::{Deserialize, Serialize};

use crate::capability::schema::ValidationError;
use crate::errors::HandlerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

/// Raw handler result before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Vec<ContentBlock>),
    Failure(String),
}

impl Outcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Success(vec![ContentBlock::text(text)])
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }
}

impl From<HandlerError> for Outcome {
    fn from(err: HandlerError) -> Self {
        Self::Failure(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl Envelope {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }
}

#[cfg(test)]
impl Envelope {
    /// Concatenated text of all blocks, for assertions over multi-block envelopes.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub trait Normalize {
    fn normalize(self) -> Envelope;
}

impl Normalize for Envelope {
    fn normalize(self) -> Envelope {
        self
    }
}

impl Normalize for Outcome {
    fn normalize(self) -> Envelope {
        match self {
            Self::Success(content) => Envelope::success(content),
            Self::Failure(message) => Envelope::error(message),
        }
    }
}

impl Normalize for ValidationError {
    fn normalize(self) -> Envelope {
        Envelope::error(self.to_string())
    }
}
