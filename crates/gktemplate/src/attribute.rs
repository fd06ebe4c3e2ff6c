/*
 * attribute.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tag header parsing.
//!
//! A tag header is the text between the open marker and the end delimiter,
//! e.g. `field name="info" lang='en'`. The first word is the tag name; the
//! rest is a list of `key=value` pairs whose values may be quoted with
//! `'`, `"` or `` ` ``. Inside a quoted value a backslash directly before the
//! closing quote keeps the quote in the value; the backslash itself is kept
//! too.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cache::{CacheStore, content_hash};
use crate::error::{TemplateError, TemplateResult};

/// Maximum size in bytes of a tag header.
pub const SOURCE_MAX_SIZE: usize = 1024;

/// Key under which the tag name is stored alongside the attributes.
pub const TAG_NAME_KEY: &str = "tagname";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\n]+").unwrap());

/// Collapse runs of spaces, tabs and line breaks to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// The parsed header of one tag.
///
/// Lookups of a missing key and of a key holding an empty string both
/// return `""`; callers cannot tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attribute {
    items: IndexMap<String, String>,
    count: usize,
    case_folded: bool,
}

impl Attribute {
    /// The tag name (lower-cased when case folding is on).
    pub fn tag_name(&self) -> &str {
        self.get(TAG_NAME_KEY)
    }

    /// Value of attribute `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        if key.is_empty() {
            return "";
        }
        self.items
            .get(self.lookup_key(key).as_ref())
            .map_or("", String::as_str)
    }

    /// Whether attribute `key` holds a non-empty value.
    pub fn contains(&self, key: &str) -> bool {
        !self.get(key).is_empty()
    }

    /// Number of `key=value` pairs parsed, not counting the tag name.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Attributes in header order, without the tag name entry.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != TAG_NAME_KEY)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn lookup_key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        if self.case_folded {
            Cow::Owned(key.to_lowercase())
        } else {
            Cow::Borrowed(key)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    TagName,
    Key,
    ValueStart,
    Value { close: char },
}

/// Parse a tag header without consulting any cache.
pub fn parse_attribute(text: &str, case_fold: bool) -> TemplateResult<Attribute> {
    if text.is_empty() {
        return Err(TemplateError::EmptyInput);
    }
    if text.len() > SOURCE_MAX_SIZE {
        return Err(TemplateError::InputTooLarge {
            len: text.len(),
            max: SOURCE_MAX_SIZE,
        });
    }

    let fold = |s: &str| {
        if case_fold {
            s.trim().to_lowercase()
        } else {
            s.trim().to_string()
        }
    };

    let mut items = IndexMap::new();
    let mut count = 0;
    let mut state = State::TagName;
    let mut tag_name = String::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut prev: Option<char> = None;

    for c in normalize_whitespace(text).chars() {
        match state {
            State::TagName => {
                if c == ' ' {
                    items.insert(TAG_NAME_KEY.to_string(), fold(&tag_name));
                    state = State::Key;
                } else {
                    tag_name.push(c);
                }
            }
            State::Key => {
                if c == '=' {
                    key = fold(&key);
                    state = State::ValueStart;
                } else {
                    key.push(c);
                }
            }
            State::ValueStart => match c {
                ' ' => {}
                '\'' | '"' | '`' => state = State::Value { close: c },
                _ => {
                    // Unquoted values run until the next space
                    value.push(c);
                    state = State::Value { close: ' ' };
                }
            },
            State::Value { close } => {
                if c == close && prev != Some('\\') {
                    items.insert(std::mem::take(&mut key), std::mem::take(&mut value));
                    count += 1;
                    state = State::Key;
                } else {
                    value.push(c);
                }
            }
        }
        prev = Some(c);
    }

    if state == State::TagName {
        items.insert(TAG_NAME_KEY.to_string(), fold(&tag_name));
    }

    Ok(Attribute {
        items,
        count,
        case_folded: case_fold,
    })
}

/// Cached tag header parser.
///
/// Identical header text always yields the same shared [`Attribute`].
pub struct AttributeParser {
    cache: Arc<dyn CacheStore<Attribute>>,
    case_fold: bool,
    parses: AtomicUsize,
}

impl AttributeParser {
    pub fn new(cache: Arc<dyn CacheStore<Attribute>>, case_fold: bool) -> Self {
        Self {
            cache,
            case_fold,
            parses: AtomicUsize::new(0),
        }
    }

    pub fn case_fold(&self) -> bool {
        self.case_fold
    }

    /// Parse `text`, reusing a cached result for previously seen text.
    pub fn parse(&self, text: &str) -> TemplateResult<Arc<Attribute>> {
        if text.is_empty() {
            return Err(TemplateError::EmptyInput);
        }
        if text.len() > SOURCE_MAX_SIZE {
            return Err(TemplateError::InputTooLarge {
                len: text.len(),
                max: SOURCE_MAX_SIZE,
            });
        }

        let key = content_hash(&[if self.case_fold { "fold" } else { "keep" }, text]);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let attribute = Arc::new(parse_attribute(text, self.case_fold)?);
        self.parses.fetch_add(1, Ordering::Relaxed);
        self.cache.set(key, Arc::clone(&attribute));
        Ok(attribute)
    }

    /// How many times the state machine actually ran.
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AttributeParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeParser")
            .field("case_fold", &self.case_fold)
            .field("parses", &self.parse_count())
            .finish_non_exhaustive()
    }
}
