/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Substitution engine.
//!
//! Rendering resolves every tag of a template through the registry, then
//! splices the results between the untouched source spans. Resolved values
//! are kept in a per-call vector indexed by tag id, so a cached template can
//! be rendered concurrently with different data.

use std::sync::Arc;

use crate::args::parse_func;
use crate::cache::{Caches, ReloadSwitch};
use crate::config::{EngineConfig, Syntax};
use crate::context::{DataContext, Value};
use crate::error::TemplateResult;
use crate::registry::Registry;
use crate::scanner::Scanner;
use crate::template::{Tag, Template};

/// A resolved value equal to this renders as nothing.
pub const DELETE_SENTINEL: &str = "#@Delete@#";

/// What a handler gives to tag handlers besides the tag itself.
pub struct RenderContext<'a> {
    data: &'a DataContext,
    scanner: &'a Scanner,
}

impl<'a> RenderContext<'a> {
    pub fn new(data: &'a DataContext, scanner: &'a Scanner) -> Self {
        Self { data, scanner }
    }

    pub fn data(&self) -> &'a DataContext {
        self.data
    }

    /// Shorthand for `data().get(key)`.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.data.get(key)
    }

    /// The engine's scanner, for handlers that scan their inner text.
    pub fn scanner(&self) -> &'a Scanner {
        self.scanner
    }
}

/// The outcome of resolving one tag during a render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Text substituted for the tag's span.
    pub value: String,
    /// Whether a handler was found for the tag.
    pub replaced: bool,
}

/// Scanner, caches and registry bundled for rendering.
#[derive(Debug)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) registry: Registry,
    pub(crate) caches: Caches,
    pub(crate) scanner: Scanner,
}

impl Engine {
    /// Create an engine with its own caches.
    pub fn new(config: EngineConfig, registry: Registry) -> Self {
        let caches = Caches::new(ReloadSwitch::new(config.live_reload));
        Self::with_caches(config, registry, caches)
    }

    /// Create an engine over existing caches. The caches' own reload switch
    /// is used; `config.live_reload` is ignored.
    pub fn with_caches(config: EngineConfig, registry: Registry, caches: Caches) -> Self {
        let scanner = Scanner::new(&caches, config.case_fold);
        Self {
            config,
            registry,
            caches,
            scanner,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Toggle live reload for every cache table of this engine.
    pub fn set_live_reload(&self, live: bool) {
        self.caches.reload().set_live(live);
    }

    /// Scan `source` with the configured syntax.
    pub fn parse(&self, source: &str) -> TemplateResult<Arc<Template>> {
        self.scanner.scan(source, &self.config.syntax)
    }

    /// Scan `source` with an explicit syntax and optional cache key.
    pub fn parse_with(
        &self,
        source: &str,
        syntax: &Syntax,
        cache_key: Option<&str>,
    ) -> TemplateResult<Arc<Template>> {
        self.scanner.scan_with_key(source, syntax, cache_key)
    }

    /// Resolve every tag of `template`, in id order.
    ///
    /// Tags without a handler resolve to an empty, unreplaced value, which
    /// removes their span from the output.
    pub fn resolve(&self, template: &Template, data: &DataContext) -> Vec<Resolution> {
        let cx = RenderContext::new(data, &self.scanner);
        template
            .tags()
            .iter()
            .map(|tag| self.resolve_tag(tag, &cx))
            .collect()
    }

    fn resolve_tag(&self, tag: &Tag, cx: &RenderContext<'_>) -> Resolution {
        let Some(handler) = self.registry.handler(tag.name()) else {
            tracing::trace!(tag = tag.name(), "no handler, removing tag");
            return Resolution::default();
        };

        let mut value = handler.render(tag, cx);

        let func = tag.attr("func");
        if !func.is_empty() {
            match parse_func(func) {
                Ok(call) => {
                    if let Some(function) = self.registry.function(&call.name) {
                        value = function.apply(&value, &call.args);
                    }
                }
                Err(err) => {
                    tracing::debug!(tag = tag.name(), func, error = %err, "ignoring func attribute");
                }
            }
        }

        if value == DELETE_SENTINEL {
            value.clear();
        }
        Resolution {
            value,
            replaced: true,
        }
    }

    /// Render `template` against `data`.
    pub fn render(&self, template: &Template, data: &DataContext) -> String {
        let resolutions = self.resolve(template, data);
        splice(template, &resolutions)
    }

    /// Scan and render `source` with the configured syntax.
    pub fn render_str(&self, source: &str, data: &DataContext) -> TemplateResult<String> {
        let template = self.parse(source)?;
        Ok(self.render(&template, data))
    }
}

impl Default for Engine {
    /// Built-in handlers, default syntax, live reload from `GKENV`.
    fn default() -> Self {
        Self::new(EngineConfig::from_env(), Registry::with_builtins())
    }
}

/// Interleave the source text between tags with the tags' resolved values.
pub fn splice(template: &Template, resolutions: &[Resolution]) -> String {
    let source = template.source();
    let mut out = String::with_capacity(source.len());
    let mut next = 0;
    for (tag, resolution) in template.tags().iter().zip(resolutions) {
        out.push_str(&source[next..tag.bytes.start]);
        out.push_str(&resolution.value);
        next = tag.bytes.end;
    }
    out.push_str(&source[next..]);
    out
}
