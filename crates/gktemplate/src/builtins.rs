/*
 * builtins.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Built-in tag handlers and functions.

use crate::args::Arg;
use crate::config::Syntax;
use crate::context::Value;
use crate::engine::RenderContext;
use crate::template::Tag;

/// Syntax of the per-item fields inside a `range` container:
/// `[field:key/]`.
pub fn range_item_syntax() -> Syntax {
    Syntax::new("field", "[", "]")
}

/// `<{gk:field name="key"/}>`: the data value stored under `name`.
pub fn field(tag: &Tag, cx: &RenderContext<'_>) -> String {
    cx.get(tag.attr("name"))
        .map(Value::render)
        .unwrap_or_default()
}

/// `<{gk:range name="items"}>...<{/gk:range}>`: the inner text once per
/// item of the list `name`, with `[field:key/]` replaced by the item's
/// value for `key`.
///
/// Fields missing from an item are left as written. Items that are not
/// maps are skipped.
pub fn range(tag: &Tag, cx: &RenderContext<'_>) -> String {
    let Some(items) = cx.get(tag.attr("name")).and_then(Value::as_list) else {
        return String::new();
    };

    let inner = match cx.scanner().scan(tag.inner_text(), &range_item_syntax()) {
        Ok(inner) => inner,
        Err(err) => {
            tracing::warn!(tag = tag.name(), offset = tag.start, error = %err, "cannot scan range body");
            return String::new();
        }
    };

    let source = inner.source();
    let mut out = String::new();
    for item in items.iter().filter_map(Value::as_map) {
        let mut next = 0;
        for field in inner.tags() {
            if let Some(value) = item.get(field.name()) {
                out.push_str(&source[next..field.bytes.start]);
                out.push_str(&value.render());
                next = field.bytes.end;
            }
        }
        out.push_str(&source[next..]);
    }
    out
}

pub fn to_upper(value: &str, _args: &[Arg]) -> String {
    value.to_uppercase()
}

pub fn to_lower(value: &str, _args: &[Arg]) -> String {
    value.to_lowercase()
}
