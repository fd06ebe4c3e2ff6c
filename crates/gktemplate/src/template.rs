/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Scanned template types.
//!
//! A [`Template`] is immutable once the scanner has built it, which lets a
//! cached template be rendered by many callers at once. Per-render results
//! live in the engine's resolution vector, never in the tags.

use std::ops::Range;
use std::sync::Arc;

use crate::attribute::Attribute;
use crate::config::Syntax;

/// One recognized tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Sequential id; equals the tag's position in document order.
    pub id: usize,
    /// Tag name as parsed from the header.
    pub name: String,
    /// Parsed header, shared with the attribute cache.
    pub attribute: Arc<Attribute>,
    /// Character offset of the first character of the open marker.
    pub start: usize,
    /// Character offset one past the tag's final end delimiter.
    pub end: usize,
    /// Byte range corresponding to `start..end`.
    pub bytes: Range<usize>,
    /// Raw text between the open and close markers; empty for
    /// self-closing tags.
    pub inner_text: String,
    /// Whether the tag was written as a container.
    pub container: bool,
}

impl Tag {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of attribute `key`, or `""` when absent.
    pub fn attr(&self, key: &str) -> &str {
        self.attribute.get(key)
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attribute.contains(key)
    }

    pub fn inner_text(&self) -> &str {
        &self.inner_text
    }

    /// Character span covered by the tag.
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A scanned document.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub(crate) syntax: Syntax,
    pub(crate) tags: Vec<Tag>,
    pub(crate) source: String,
    pub(crate) char_len: usize,
}

impl Template {
    pub fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    /// Tags in document order; `tags()[i].id == i`.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Length of the source in characters.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Source text for a character range.
    pub fn slice(&self, range: Range<usize>) -> String {
        self.source
            .chars()
            .skip(range.start)
            .take(range.end.saturating_sub(range.start))
            .collect()
    }
}
