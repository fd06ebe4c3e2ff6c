/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for scanning, attribute parsing and rendering.

use thiserror::Error;

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Attribute or function text was empty.
    #[error("attribute parse string is empty")]
    EmptyInput,

    /// Attribute text exceeded the parser's size limit.
    #[error("string of {len} bytes exceeds maximum limit of {max}")]
    InputTooLarge { len: usize, max: usize },

    /// Nothing preceded the `(` of a function call.
    #[error("function name not exists")]
    NoFunctionName,

    /// A function call carried no arguments.
    #[error("function args not exists")]
    NoArguments,

    /// The namespace is not alphanumeric.
    #[error("namespace '{namespace}' is invalid")]
    InvalidNamespace { namespace: String },

    /// Start and end delimiters are empty or identical.
    #[error("tag start '{start}' or tag end '{end}' is invalid")]
    InvalidDelimiters { start: String, end: String },

    /// The source is too short to contain a single tag.
    #[error("source of {len} characters is shorter than the minimum of {min}")]
    SourceTooShort { len: usize, min: usize },

    /// Structural mismatch: a close marker naming the wrong tag, or the
    /// source ending while a tag is still open.
    #[error("malformed template at character {offset}, tag '{tag}': {message}")]
    Malformed {
        offset: usize,
        tag: String,
        message: String,
    },

    /// A tag handler with this name is already registered.
    #[error("tag '{name}' exists")]
    HandlerExists { name: String },

    /// A post-processing function with this name is already registered.
    #[error("func '{name}' exists")]
    FunctionExists { name: String },

    /// A directory load matched no template files.
    #[error("template file not exists for pattern '{pattern}'")]
    NoTemplatesMatched { pattern: String },

    /// Invalid glob pattern.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// I/O error (e.g., reading a template file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TemplateError {
    /// Whether this error belongs to the fatal "malformed template" category.
    pub fn is_malformed(&self) -> bool {
        matches!(self, TemplateError::Malformed { .. })
    }

    pub(crate) fn malformed(
        offset: usize,
        tag: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TemplateError::Malformed {
            offset,
            tag: tag.into(),
            message: message.into(),
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_category() {
        let err = TemplateError::malformed(12, "range", "close tag 'other' does not match");
        assert!(err.is_malformed());
        assert_eq!(
            err.to_string(),
            "malformed template at character 12, tag 'range': close tag 'other' does not match"
        );
        assert!(!TemplateError::EmptyInput.is_malformed());
    }
}
