/*
 * scanner.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Single-pass tag scanner.
//!
//! The scanner walks the source character by character looking for three
//! markers built from the [`Syntax`]:
//!
//! - the open marker `<{gk:` starting a tag header,
//! - the end delimiter `}>` finishing a header (a header ending in `/` is a
//!   self-closing tag, anything else opens a container),
//! - the close marker `<{/gk:` ending the innermost open container.
//!
//! Containers may contain further tags. Those stay part of the container's
//! inner text; only top-level tags become [`Tag`]s of the template, so tag
//! spans never overlap. Nested containers are still tracked so that each
//! close marker is matched against the right open name.
//!
//! A close marker naming the wrong tag, or a source that ends while a
//! header or container is still open, aborts the scan with
//! [`TemplateError::Malformed`].

use std::iter;
use std::sync::Arc;

use crate::attribute::{Attribute, AttributeParser};
use crate::cache::{CacheStore, Caches, content_hash};
use crate::config::Syntax;
use crate::error::{TemplateError, TemplateResult};
use crate::template::{Tag, Template};

/// Maximum length of the tag name in a close marker.
pub const TAG_MAX_LEN: usize = 64;

/// Scanner with attribute and template caches.
pub struct Scanner {
    attributes: AttributeParser,
    templates: Arc<dyn CacheStore<Template>>,
}

impl Scanner {
    pub fn new(caches: &Caches, case_fold: bool) -> Self {
        Self {
            attributes: AttributeParser::new(Arc::clone(&caches.attributes), case_fold),
            templates: Arc::clone(&caches.templates),
        }
    }

    pub fn attributes(&self) -> &AttributeParser {
        &self.attributes
    }

    /// Scan `source`, reusing a cached template for identical content.
    pub fn scan(&self, source: &str, syntax: &Syntax) -> TemplateResult<Arc<Template>> {
        self.scan_with_key(source, syntax, None)
    }

    /// Scan `source`, caching under `cache_key` when given instead of a
    /// hash of the content.
    ///
    /// Callers supplying a key (e.g. a hash of a file path) are responsible
    /// for the key changing whenever the content does.
    pub fn scan_with_key(
        &self,
        source: &str,
        syntax: &Syntax,
        cache_key: Option<&str>,
    ) -> TemplateResult<Arc<Template>> {
        syntax.validate()?;

        let (kind, content) = match cache_key {
            Some(k) => ("key", k),
            None => ("src", source),
        };
        let fold = if self.attributes.case_fold() { "fold" } else { "keep" };
        let key = content_hash(&[
            syntax.namespace.as_str(),
            syntax.tag_start.as_str(),
            syntax.tag_end.as_str(),
            fold,
            kind,
            content,
        ]);
        if let Some(hit) = self.templates.get(&key) {
            return Ok(hit);
        }

        let template = Arc::new(scan_source(source, syntax, &self.attributes)?);
        tracing::debug!(
            namespace = %syntax.namespace,
            chars = template.char_len(),
            tags = template.tag_count(),
            "scanned template"
        );
        self.templates.set(key, Arc::clone(&template));
        Ok(template)
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// Where the scanner currently is.
enum Mode {
    /// Plain document text.
    Literal,
    /// Inside a tag header that began at `start`; header text begins at
    /// `text_from`.
    Header { start: usize, text_from: usize },
    /// Inside a container's inner text.
    Inner {
        start: usize,
        attribute: Arc<Attribute>,
        text_from: usize,
        /// Names of containers opened inside the inner text.
        nested: Vec<String>,
    },
}

struct Source<'a> {
    text: &'a str,
    chars: Vec<char>,
    /// Byte offset of every character, plus the total length.
    bytes: Vec<usize>,
}

impl<'a> Source<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.chars().collect(),
            bytes: text
                .char_indices()
                .map(|(b, _)| b)
                .chain(iter::once(text.len()))
                .collect(),
        }
    }

    fn len(&self) -> usize {
        self.chars.len()
    }

    fn matches_at(&self, pos: usize, pattern: &[char]) -> bool {
        self.chars
            .get(pos..pos + pattern.len())
            .is_some_and(|window| window == pattern)
    }

    fn slice(&self, from: usize, to: usize) -> &'a str {
        &self.text[self.bytes[from]..self.bytes[to]]
    }

    /// Position of the first `pattern` at or after `from`. Fails with the
    /// position where the search stopped if one of `stops` comes first or
    /// the text runs out.
    fn find_before(
        &self,
        from: usize,
        pattern: &[char],
        stops: &[&[char]],
    ) -> Result<usize, usize> {
        for pos in from..self.len() {
            if self.matches_at(pos, pattern) {
                return Ok(pos);
            }
            if stops.iter().any(|stop| self.matches_at(pos, stop)) {
                return Err(pos);
            }
        }
        Err(self.len())
    }
}

/// Whether a header ends in `/`, ignoring trailing whitespace. Returns the
/// header without the slash.
fn strip_self_closing(header: &str) -> Option<&str> {
    header.trim_end().strip_suffix('/')
}

fn fold_name(name: &str, case_fold: bool) -> String {
    if case_fold {
        name.to_lowercase()
    } else {
        name.to_string()
    }
}

/// Read the tag name of a close marker whose name starts at `from`.
///
/// Spaces and tabs are skipped. Returns the name and the position just past
/// the end delimiter.
fn read_close_name(
    src: &Source<'_>,
    marker_pos: usize,
    from: usize,
    end: &[char],
) -> TemplateResult<(String, usize)> {
    let mut name = String::new();
    let mut read = 0;
    let mut pos = from;
    loop {
        let Some(&c) = src.chars.get(pos) else {
            return Err(TemplateError::malformed(
                marker_pos,
                name,
                "close tag is missing its end delimiter",
            ));
        };
        if c == ' ' || c == '\t' {
            pos += 1;
            continue;
        }
        if src.matches_at(pos, end) {
            return Ok((name, pos + end.len()));
        }
        name.push(c);
        pos += 1;
        read += 1;
        if read > TAG_MAX_LEN {
            return Err(TemplateError::malformed(
                marker_pos,
                name,
                format!("close tag name exceeds {} characters", TAG_MAX_LEN),
            ));
        }
    }
}

/// Scan `text` without consulting the template cache.
pub fn scan_source(
    text: &str,
    syntax: &Syntax,
    attributes: &AttributeParser,
) -> TemplateResult<Template> {
    syntax.validate()?;

    let src = Source::new(text);
    let open: Vec<char> = syntax.open_marker().chars().collect();
    let close: Vec<char> = syntax.close_marker().chars().collect();
    let end: Vec<char> = syntax.tag_end.chars().collect();
    let case_fold = attributes.case_fold();

    let min = open.len() + 4;
    if src.len() < min {
        return Err(TemplateError::SourceTooShort {
            len: src.len(),
            min,
        });
    }

    let mut tags: Vec<Tag> = Vec::new();
    let mut mode = Mode::Literal;
    let mut pos = 0;

    while pos < src.len() {
        mode = match mode {
            Mode::Literal => {
                if src.matches_at(pos, &open) {
                    pos += open.len();
                    Mode::Header {
                        start: pos - open.len(),
                        text_from: pos,
                    }
                } else {
                    pos += 1;
                    Mode::Literal
                }
            }

            Mode::Header { start, text_from } => {
                if src.matches_at(pos, &open) {
                    // A new open marker abandons the unterminated header
                    tracing::debug!(offset = start, "tag header restarted");
                    pos += open.len();
                    Mode::Header {
                        start: pos - open.len(),
                        text_from: pos,
                    }
                } else if src.matches_at(pos, &close) {
                    return Err(TemplateError::malformed(
                        pos,
                        src.slice(text_from, pos).trim(),
                        "close tag inside an open tag header",
                    ));
                } else if src.matches_at(pos, &end) {
                    let header = src.slice(text_from, pos);
                    pos += end.len();
                    match strip_self_closing(header) {
                        Some(header) => {
                            let attribute = attributes.parse(header)?;
                            tags.push(Tag {
                                id: tags.len(),
                                name: attribute.tag_name().to_string(),
                                attribute,
                                start,
                                end: pos,
                                bytes: src.bytes[start]..src.bytes[pos],
                                inner_text: String::new(),
                                container: false,
                            });
                            Mode::Literal
                        }
                        None => Mode::Inner {
                            start,
                            attribute: attributes.parse(header)?,
                            text_from: pos,
                            nested: Vec::new(),
                        },
                    }
                } else {
                    pos += 1;
                    Mode::Header { start, text_from }
                }
            }

            Mode::Inner {
                start,
                attribute,
                text_from,
                mut nested,
            } => {
                if src.matches_at(pos, &close) {
                    let marker_pos = pos;
                    let (name, after) = read_close_name(&src, pos, pos + close.len(), &end)?;
                    let name = fold_name(&name, case_fold);
                    let expected = nested
                        .last()
                        .map_or(attribute.tag_name(), String::as_str);
                    if name != expected {
                        return Err(TemplateError::malformed(
                            marker_pos,
                            name.clone(),
                            format!(
                                "close tag '{}' does not match open tag '{}'",
                                name, expected
                            ),
                        ));
                    }
                    pos = after;
                    if nested.pop().is_some() {
                        Mode::Inner {
                            start,
                            attribute,
                            text_from,
                            nested,
                        }
                    } else {
                        tags.push(Tag {
                            id: tags.len(),
                            name: attribute.tag_name().to_string(),
                            attribute,
                            start,
                            end: pos,
                            bytes: src.bytes[start]..src.bytes[pos],
                            inner_text: src.slice(text_from, marker_pos).to_string(),
                            container: true,
                        });
                        Mode::Literal
                    }
                } else if src.matches_at(pos, &open) {
                    let header_from = pos + open.len();
                    let stops = [open.as_slice(), close.as_slice()];
                    let header_end = match src.find_before(header_from, &end, &stops) {
                        Ok(header_end) => header_end,
                        Err(stopped) => {
                            let rest = src.slice(header_from, stopped);
                            let name = rest.split_whitespace().next().unwrap_or_default();
                            return Err(TemplateError::malformed(
                                pos,
                                fold_name(name, case_fold),
                                "tag is missing its end delimiter",
                            ));
                        }
                    };
                    let header = src.slice(header_from, header_end);
                    if strip_self_closing(header).is_none() {
                        let name = header.split_whitespace().next().unwrap_or_default();
                        nested.push(fold_name(name, case_fold));
                    }
                    pos = header_end + end.len();
                    Mode::Inner {
                        start,
                        attribute,
                        text_from,
                        nested,
                    }
                } else {
                    pos += 1;
                    Mode::Inner {
                        start,
                        attribute,
                        text_from,
                        nested,
                    }
                }
            }
        };
    }

    match mode {
        Mode::Literal => {}
        Mode::Header { start, text_from } => {
            return Err(TemplateError::malformed(
                start,
                src.slice(text_from, src.len()).trim(),
                "tag is missing its end delimiter",
            ));
        }
        Mode::Inner {
            start,
            attribute,
            nested,
            ..
        } => {
            let name = nested
                .last()
                .map_or(attribute.tag_name(), String::as_str)
                .to_string();
            return Err(TemplateError::malformed(
                start,
                name,
                "container tag is never closed",
            ));
        }
    }

    Ok(Template {
        syntax: syntax.clone(),
        tags,
        source: text.to_string(),
        char_len: src.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scanner() -> Scanner {
        Scanner::new(&Caches::default(), true)
    }

    fn scan(source: &str) -> TemplateResult<Arc<Template>> {
        scanner().scan(source, &Syntax::default())
    }

    #[test]
    fn test_self_closing_alone() {
        let source = r#"<{gk:tag attr="1"/}>"#;
        let template = scan(source).unwrap();
        assert_eq!(template.tag_count(), 1);
        let tag = &template.tags()[0];
        assert_eq!(tag.name, "tag");
        assert_eq!(tag.attr("attr"), "1");
        assert_eq!(tag.inner_text, "");
        assert!(!tag.container);
        assert_eq!(tag.span(), 0..source.chars().count());
        assert_eq!(tag.bytes, 0..source.len());
    }

    #[test]
    fn test_self_closing_with_space_before_slash() {
        let template = scan(r#"<{gk:field name="a" /}>"#).unwrap();
        assert_eq!(template.tags()[0].attr("name"), "a");
    }

    #[test]
    fn test_container() {
        let source = "<{gk:tag}>inner<{/gk:tag}>";
        let template = scan(source).unwrap();
        assert_eq!(template.tag_count(), 1);
        let tag = &template.tags()[0];
        assert_eq!(tag.name, "tag");
        assert_eq!(tag.inner_text, "inner");
        assert!(tag.container);
        assert_eq!(tag.span(), 0..source.chars().count());
    }

    #[test]
    fn test_close_marker_with_spaces() {
        let template = scan("<{gk:tag}>x<{/gk: tag }>").unwrap();
        assert_eq!(template.tags()[0].inner_text, "x");
    }

    #[test]
    fn test_mismatched_close_is_malformed() {
        let err = scan("<{gk:tag}>inner<{/gk:other}>").unwrap_err();
        assert!(err.is_malformed());
        match err {
            TemplateError::Malformed { offset, tag, .. } => {
                assert_eq!(offset, 15);
                assert_eq!(tag, "other");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_unclosed_container_is_malformed() {
        let err = scan("<{gk:range name='x'}> never closed").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_unterminated_header_is_malformed() {
        let err = scan("text <{gk:field name='x' and no end").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_unterminated_close_marker_is_malformed() {
        let err = scan("<{gk:tag}>inner<{/gk:tag").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_offsets_and_order() {
        let source = "中文 <{gk:field name=\"a\"/}> mid <{gk:range name='b'}>[x]<{/gk:range}> end";
        let template = scan(source).unwrap();
        assert_eq!(template.tag_count(), 2);

        let first = &template.tags()[0];
        assert_eq!(first.id, 0);
        assert_eq!(first.start, 3);
        assert_eq!(template.slice(first.span()), "<{gk:field name=\"a\"/}>");
        assert_eq!(&source[first.bytes.clone()], "<{gk:field name=\"a\"/}>");

        let second = &template.tags()[1];
        assert_eq!(second.id, 1);
        assert!(second.start >= first.end);
        assert_eq!(second.inner_text, "[x]");
        assert_eq!(
            &source[second.bytes.clone()],
            "<{gk:range name='b'}>[x]<{/gk:range}>"
        );
    }

    #[test]
    fn test_nested_tags_stay_in_inner_text() {
        let source = "<{gk:outer}>a<{gk:field name='x'/}>b<{gk:inner}>c<{/gk:inner}>d<{/gk:outer}>";
        let template = scan(source).unwrap();
        assert_eq!(template.tag_count(), 1);
        assert_eq!(
            template.tags()[0].inner_text,
            "a<{gk:field name='x'/}>b<{gk:inner}>c<{/gk:inner}>d"
        );
    }

    #[test]
    fn test_nested_same_name_containers() {
        let source = "<{gk:if}>1<{gk:if}>2<{/gk:if}>3<{/gk:if}> tail";
        let template = scan(source).unwrap();
        assert_eq!(template.tag_count(), 1);
        assert_eq!(template.tags()[0].inner_text, "1<{gk:if}>2<{/gk:if}>3");
    }

    #[test]
    fn test_nested_mismatch_is_malformed() {
        let err = scan("<{gk:outer}><{gk:inner}>x<{/gk:outer}><{/gk:outer}>").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_nested_header_without_end_is_malformed() {
        let err = scan("<{gk:a}>x<{gk:b y<{/gk:a}>").unwrap_err();
        match err {
            TemplateError::Malformed {
                offset,
                tag,
                message,
            } => {
                assert_eq!(offset, 9);
                assert_eq!(tag, "b");
                assert_eq!(message, "tag is missing its end delimiter");
            }
            other => panic!("expected malformed error, got {:?}", other),
        }

        // The name ends where the stray marker begins
        let err = scan("<{gk:a}>x<{gk:b<{gk:c/}><{/gk:a}>").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { offset: 9, tag, .. } if tag == "b"));
    }

    #[test]
    fn test_close_marker_without_open_tag_is_literal() {
        let template = scan("plain <{/gk:range}> text").unwrap();
        assert_eq!(template.tag_count(), 0);
    }

    #[test]
    fn test_case_folded_close_name() {
        let template = scan("<{gk:Range}>x<{/gk:RANGE}>").unwrap();
        assert_eq!(template.tags()[0].name, "range");
    }

    #[test]
    fn test_custom_syntax() {
        let syntax = Syntax::new("field", "[", "]");
        let template = scanner()
            .scan("<li>[field:id/] - [field:name/]</li>", &syntax)
            .unwrap();
        let names: Vec<&str> = template.tags().iter().map(Tag::name).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn test_validation_before_scanning() {
        let err = scanner()
            .scan("<{x-y:tag/}> long enough", &Syntax::new("x-y", "<{", "}>"))
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidNamespace { .. }));

        let err = scanner()
            .scan("<{gk:tag/}> long enough", &Syntax::new("gk", "||", "||"))
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidDelimiters { .. }));
    }

    #[test]
    fn test_source_too_short() {
        let err = scan("<{gk:a}>").unwrap_err();
        assert!(matches!(
            err,
            TemplateError::SourceTooShort { len: 8, min: 9 }
        ));
    }

    #[test]
    fn test_empty_header_fails() {
        assert!(matches!(
            scan("text <{gk:/}> text"),
            Err(TemplateError::EmptyInput)
        ));
    }

    #[test]
    fn test_template_cache() {
        let scanner = scanner();
        let source = "hello <{gk:field name='x'/}>";
        let first = scanner.scan(source, &Syntax::default()).unwrap();
        let second = scanner.scan(source, &Syntax::default()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // Same text under another syntax is a different template
        let other = scanner
            .scan(source, &Syntax::new("other", "<{", "}>"))
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(other.tag_count(), 0);
    }

    #[test]
    fn test_shared_cache_respects_case_folding() {
        let caches = Caches::default();
        let folding = Scanner::new(&caches, true);
        let keeping = Scanner::new(&caches, false);
        let source = "x <{gk:Echo Name='v'/}> y";

        let folded = folding.scan(source, &Syntax::default()).unwrap();
        assert_eq!(folded.tags()[0].name, "echo");

        let kept = keeping.scan(source, &Syntax::default()).unwrap();
        assert!(!Arc::ptr_eq(&folded, &kept));
        assert_eq!(kept.tags()[0].name, "Echo");
        assert_eq!(kept.tags()[0].attr("Name"), "v");
        assert_eq!(kept.tags()[0].attr("name"), "");
    }

    #[test]
    fn test_explicit_cache_key() {
        let scanner = scanner();
        let first = scanner
            .scan_with_key("first <{gk:a/}>", &Syntax::default(), Some("file-key"))
            .unwrap();
        // The key wins over the content
        let second = scanner
            .scan_with_key("second <{gk:b/}>", &Syntax::default(), Some("file-key"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.tags()[0].name, "a");
    }

    #[test]
    fn test_attributes_shared_across_tags() {
        let scanner = scanner();
        let template = scanner
            .scan(
                "<{gk:field name='x'/}> and <{gk:field name='x'/}>",
                &Syntax::default(),
            )
            .unwrap();
        let tags = template.tags();
        assert!(Arc::ptr_eq(&tags[0].attribute, &tags[1].attribute));
        assert_eq!(scanner.attributes().parse_count(), 1);
    }
}
