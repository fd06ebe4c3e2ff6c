/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tag substitution engine for dynamic documents.
//!
//! Documents are ordinary text (usually HTML) containing tags of a small
//! markup dialect:
//!
//! - Self-closing tags: `<{gk:field name="title"/}>`
//! - Container tags: `<{gk:range name="items"}>...<{/gk:range}>`
//! - Post-processing: `<{gk:field name="title" func="toUpper(@me)"/}>`
//!
//! The namespace (`gk`) and delimiters (`<{`, `}>`) are configurable through
//! [`Syntax`].
//!
//! # Architecture
//!
//! Text is scanned once by the [`Scanner`] into a [`Template`]: the source
//! plus an ordered list of [`Tag`]s with their parsed [`Attribute`]s. The
//! [`Engine`] resolves each tag through a [`Registry`] of handlers and
//! splices the results back into the untouched source text. Attributes and
//! templates are cached by content hash in [`Caches`], which can be switched
//! to pass-through for live reloading.
//!
//! # Example
//!
//! ```ignore
//! use gktemplate::{DataContext, Engine};
//!
//! let engine = Engine::default();
//! let data = DataContext::new().with("name", "World");
//! let output = engine.render_str("Hello, <{gk:field name=\"name\"/}>!", &data)?;
//! assert_eq!(output, "Hello, World!");
//! ```

pub mod args;
pub mod attribute;
pub mod builtins;
pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod loader;
pub mod registry;
pub mod scanner;
pub mod template;

// Re-export main types at crate root
pub use args::{Arg, FuncCall, parse_func};
pub use attribute::{Attribute, AttributeParser, parse_attribute};
pub use cache::{CacheStore, Caches, MemoryCache, ReloadSwitch};
pub use config::{EngineConfig, Syntax};
pub use context::{DataContext, Value};
pub use engine::{DELETE_SENTINEL, Engine, RenderContext, Resolution};
pub use error::{TemplateError, TemplateResult};
pub use registry::{Registry, TagFunction, TagHandler};
pub use scanner::Scanner;
pub use template::{Tag, Template};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
