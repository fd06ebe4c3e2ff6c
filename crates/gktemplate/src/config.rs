/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Markup syntax and engine configuration.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{TemplateError, TemplateResult};

/// Default tag namespace.
pub const DEFAULT_NAMESPACE: &str = "gk";
/// Default start delimiter.
pub const DEFAULT_TAG_START: &str = "<{";
/// Default end delimiter.
pub const DEFAULT_TAG_END: &str = "}>";

/// Environment variable that selects the live-reload mode.
pub const ENV_VAR: &str = "GKENV";

static NAMESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());

/// The namespace and delimiters that make up the markup dialect.
///
/// With the defaults a self-closing tag reads `<{gk:field name="x"/}>` and a
/// container reads `<{gk:range name="items"}>...<{/gk:range}>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Syntax {
    pub namespace: String,
    pub tag_start: String,
    pub tag_end: String,
}

impl Syntax {
    pub fn new(
        namespace: impl Into<String>,
        tag_start: impl Into<String>,
        tag_end: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            tag_start: tag_start.into(),
            tag_end: tag_end.into(),
        }
    }

    /// Check the namespace pattern and that the delimiters are non-empty
    /// and distinct.
    pub fn validate(&self) -> TemplateResult<()> {
        if !NAMESPACE.is_match(&self.namespace) {
            return Err(TemplateError::InvalidNamespace {
                namespace: self.namespace.clone(),
            });
        }
        if self.tag_start.is_empty() || self.tag_end.is_empty() || self.tag_start == self.tag_end
        {
            return Err(TemplateError::InvalidDelimiters {
                start: self.tag_start.clone(),
                end: self.tag_end.clone(),
            });
        }
        Ok(())
    }

    /// Marker opening a tag, e.g. `<{gk:`.
    pub fn open_marker(&self) -> String {
        format!("{}{}:", self.tag_start, self.namespace)
    }

    /// Marker opening a container's closing tag, e.g. `<{/gk:`.
    pub fn close_marker(&self) -> String {
        format!("{}/{}:", self.tag_start, self.namespace)
    }
}

impl Default for Syntax {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, DEFAULT_TAG_START, DEFAULT_TAG_END)
    }
}

/// Settings used to build an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Markup dialect for templates rendered by the engine.
    pub syntax: Syntax,
    /// Lower-case tag names and attribute keys.
    pub case_fold: bool,
    /// Bypass all caches so every render reparses.
    pub live_reload: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            syntax: Syntax::default(),
            case_fold: true,
            live_reload: false,
        }
    }
}

impl EngineConfig {
    /// Defaults, with live reload turned on when `GKENV=dev`.
    pub fn from_env() -> Self {
        let live_reload = std::env::var(ENV_VAR).is_ok_and(|v| v == "dev");
        Self {
            live_reload,
            ..Self::default()
        }
    }

    pub fn with_syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_live_reload(mut self, live_reload: bool) -> Self {
        self.live_reload = live_reload;
        self
    }

    pub fn with_case_fold(mut self, case_fold: bool) -> Self {
        self.case_fold = case_fold;
        self
    }
}
