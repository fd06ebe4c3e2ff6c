/*
 * loader.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template files.
//!
//! File contents are cached under the SHA-1 of the file path, and the
//! scanned template is cached under the same hash, so a file is read and
//! scanned once per process unless live reload is on.

use std::path::Path;
use std::sync::Arc;

use crate::cache::content_hash;
use crate::context::DataContext;
use crate::engine::Engine;
use crate::error::{TemplateError, TemplateResult};
use crate::template::Template;

impl Engine {
    /// Read a template file through the file cache.
    ///
    /// Returns the contents and the path hash used as cache key.
    pub fn load_file(&self, path: &Path) -> TemplateResult<(Arc<String>, String)> {
        let key = content_hash(&[&*path.to_string_lossy()]);
        if let Some(text) = self.caches.files.get(&key) {
            return Ok((text, key));
        }

        let text = Arc::new(std::fs::read_to_string(path)?);
        tracing::info!(path = %path.display(), "load file");
        self.caches.files.set(key.clone(), Arc::clone(&text));
        Ok((text, key))
    }

    /// Load and scan a template file with the configured syntax.
    pub fn parse_file(&self, path: &Path) -> TemplateResult<Arc<Template>> {
        let (text, key) = self.load_file(path)?;
        self.scanner
            .scan_with_key(&text, &self.config.syntax, Some(&key))
    }

    /// Load, scan and render a template file.
    pub fn render_file(&self, path: &Path, data: &DataContext) -> TemplateResult<String> {
        let template = self.parse_file(path)?;
        Ok(self.render(&template, data))
    }

    /// Pre-load every file matching the glob `pattern`.
    ///
    /// Directories are skipped. Returns the number of files loaded; a
    /// pattern matching nothing is an error.
    pub fn load_dir(&self, pattern: &str) -> TemplateResult<usize> {
        let mut matched = false;
        let mut loaded = 0;
        for entry in glob::glob(pattern)? {
            let path = entry.map_err(|e| TemplateError::Io(e.into()))?;
            matched = true;
            if path.is_dir() {
                continue;
            }
            self.parse_file(&path)?;
            loaded += 1;
        }
        if !matched {
            return Err(TemplateError::NoTemplatesMatched {
                pattern: pattern.to_string(),
            });
        }
        tracing::debug!(pattern, loaded, "loaded template directory");
        Ok(loaded)
    }
}
