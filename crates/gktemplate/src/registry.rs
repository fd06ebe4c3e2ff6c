/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tag handler and post-processing function registry.
//!
//! A registry is an ordinary value handed to an [`Engine`](crate::Engine),
//! so differently configured engines can live side by side. Names are
//! matched case-insensitively. Registering a name twice is an error; it is
//! meant to surface as a configuration problem at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::args::Arg;
use crate::builtins;
use crate::engine::RenderContext;
use crate::error::{TemplateError, TemplateResult};
use crate::template::Tag;

/// Resolves a tag to the text substituted for it.
pub trait TagHandler: Send + Sync {
    fn render(&self, tag: &Tag, cx: &RenderContext<'_>) -> String;
}

impl<F> TagHandler for F
where
    F: Fn(&Tag, &RenderContext<'_>) -> String + Send + Sync,
{
    fn render(&self, tag: &Tag, cx: &RenderContext<'_>) -> String {
        self(tag, cx)
    }
}

/// Transforms a handler's output, as named by a tag's `func` attribute.
///
/// `args` are the call's parsed arguments in order; by convention the first
/// one is a placeholder (e.g. `@me`) standing for `value`.
pub trait TagFunction: Send + Sync {
    fn apply(&self, value: &str, args: &[Arg]) -> String;
}

impl<F> TagFunction for F
where
    F: Fn(&str, &[Arg]) -> String + Send + Sync,
{
    fn apply(&self, value: &str, args: &[Arg]) -> String {
        self(value, args)
    }
}

/// Name to handler and name to function mappings.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn TagHandler>>,
    functions: HashMap<String, Arc<dyn TagFunction>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `field` and `range` handlers and the
    /// `toUpper` and `toLower` functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.handlers.insert("field".to_string(), Arc::new(builtins::field));
        registry.handlers.insert("range".to_string(), Arc::new(builtins::range));
        registry
            .functions
            .insert("toupper".to_string(), Arc::new(builtins::to_upper));
        registry
            .functions
            .insert("tolower".to_string(), Arc::new(builtins::to_lower));
        registry
    }

    /// Add a tag handler. Fails if the name is taken.
    pub fn register_handler(
        &mut self,
        name: &str,
        handler: impl TagHandler + 'static,
    ) -> TemplateResult<&mut Self> {
        self.insert_handler(name, Arc::new(handler))?;
        Ok(self)
    }

    /// Add a post-processing function. Fails if the name is taken.
    pub fn register_function(
        &mut self,
        name: &str,
        function: impl TagFunction + 'static,
    ) -> TemplateResult<&mut Self> {
        self.insert_function(name, Arc::new(function))?;
        Ok(self)
    }

    /// Add several handlers, stopping at the first name collision.
    pub fn extend_handlers<I>(&mut self, handlers: I) -> TemplateResult<()>
    where
        I: IntoIterator<Item = (String, Arc<dyn TagHandler>)>,
    {
        for (name, handler) in handlers {
            self.insert_handler(&name, handler)?;
        }
        Ok(())
    }

    /// Add several functions, stopping at the first name collision.
    pub fn extend_functions<I>(&mut self, functions: I) -> TemplateResult<()>
    where
        I: IntoIterator<Item = (String, Arc<dyn TagFunction>)>,
    {
        for (name, function) in functions {
            self.insert_function(&name, function)?;
        }
        Ok(())
    }

    pub fn handler(&self, name: &str) -> Option<&Arc<dyn TagHandler>> {
        self.handlers.get(&name.to_lowercase())
    }

    pub fn function(&self, name: &str) -> Option<&Arc<dyn TagFunction>> {
        self.functions.get(&name.to_lowercase())
    }

    fn insert_handler(&mut self, name: &str, handler: Arc<dyn TagHandler>) -> TemplateResult<()> {
        let key = name.to_lowercase();
        if self.handlers.contains_key(&key) {
            return Err(TemplateError::HandlerExists {
                name: name.to_string(),
            });
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    fn insert_function(
        &mut self,
        name: &str,
        function: Arc<dyn TagFunction>,
    ) -> TemplateResult<()> {
        let key = name.to_lowercase();
        if self.functions.contains_key(&key) {
            return Err(TemplateError::FunctionExists {
                name: name.to_string(),
            });
        }
        self.functions.insert(key, function);
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        let mut functions: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        handlers.sort_unstable();
        functions.sort_unstable();
        f.debug_struct("Registry")
            .field("handlers", &handlers)
            .field("functions", &functions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shout(_tag: &Tag, _cx: &RenderContext<'_>) -> String {
        "HEY".to_string()
    }

    #[test]
    fn test_builtins_present() {
        let registry = Registry::with_builtins();
        assert!(registry.handler("field").is_some());
        assert!(registry.handler("range").is_some());
        assert!(registry.function("toUpper").is_some());
        assert!(registry.function("ToLower").is_some());
        assert!(registry.handler("missing").is_none());
    }

    #[test]
    fn test_register_handler_collision() {
        let mut registry = Registry::with_builtins();
        registry.register_handler("shout", shout).unwrap();
        assert!(registry.handler("SHOUT").is_some());

        let err = registry.register_handler("Field", shout).unwrap_err();
        assert!(matches!(err, TemplateError::HandlerExists { name } if name == "Field"));
    }

    #[test]
    fn test_register_function_collision() {
        let mut registry = Registry::new();
        registry
            .register_function("trim", |v: &str, _args: &[Arg]| v.trim().to_string())
            .unwrap();
        assert_eq!(
            registry.function("trim").unwrap().apply("  x ", &[]),
            "x"
        );
        let err = registry
            .register_function("TRIM", |v: &str, _args: &[Arg]| v.to_string())
            .unwrap_err();
        assert!(matches!(err, TemplateError::FunctionExists { .. }));
    }

    #[test]
    fn test_extend_handlers_stops_at_collision() {
        let mut registry = Registry::with_builtins();
        let extra: Vec<(String, Arc<dyn TagHandler>)> = vec![
            ("shout".to_string(), Arc::new(shout) as Arc<dyn TagHandler>),
            ("range".to_string(), Arc::new(shout) as Arc<dyn TagHandler>),
        ];
        assert!(registry.extend_handlers(extra).is_err());
        assert!(registry.handler("shout").is_some());
    }

    #[test]
    fn test_registries_are_independent() {
        let mut a = Registry::new();
        let b = Registry::new();
        a.register_handler("shout", shout).unwrap();
        assert!(a.handler("shout").is_some());
        assert!(b.handler("shout").is_none());
    }
}
