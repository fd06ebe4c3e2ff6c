/*
 * args.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Parsing of `func` attribute values.
//!
//! A function call has the shape `name(arg1, arg2, ...)`. Arguments are
//! split on commas outside quotes and typed in a fixed order: boolean,
//! integer, float, quoted string, and finally the raw text. A quoted numeral
//! such as `"2"` fails the numeric parses because of its quotes, so it stays
//! a string.

use std::fmt;

use crate::attribute::normalize_whitespace;
use crate::error::{TemplateError, TemplateResult};

/// A typed positional argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Arg {
    /// Classify one trimmed argument.
    pub fn classify(text: &str) -> Arg {
        let lower = text.to_lowercase();
        if lower == "true" || lower == "false" {
            return Arg::Bool(lower == "true");
        }
        if let Ok(n) = text.parse::<i64>() {
            return Arg::Int(n);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Arg::Float(f);
        }
        Arg::Str(strip_quotes(text).unwrap_or(text).to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Int(n) => write!(f, "{}", n),
            Arg::Float(x) => write!(f, "{}", x),
            Arg::Str(s) => f.write_str(s),
        }
    }
}

/// A parsed function call.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<Arg>,
}

fn strip_quotes(text: &str) -> Option<&str> {
    ['"', '\'', '`'].into_iter().find_map(|q| {
        text.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}

/// Parse a function call such as `toUpper(@me, 1, "x")`.
pub fn parse_func(text: &str) -> TemplateResult<FuncCall> {
    let normalized = normalize_whitespace(text);

    let (name, rest) = match normalized.split_once('(') {
        Some((name, rest)) => (name.trim(), Some(rest)),
        None => (normalized.as_str(), None),
    };
    if name.is_empty() {
        return Err(TemplateError::NoFunctionName);
    }

    let mut args = Vec::new();
    if let Some(rest) = rest {
        let mut current = String::new();
        let mut quote: Option<char> = None;
        let mut closed = false;
        for c in rest.chars() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    current.push(c);
                }
                None => match c {
                    '"' | '\'' | '`' => {
                        quote = Some(c);
                        current.push(c);
                    }
                    ',' => {
                        args.push(Arg::classify(current.trim()));
                        current.clear();
                    }
                    ')' => {
                        closed = true;
                        break;
                    }
                    _ => current.push(c),
                },
            }
        }
        // `f()` has no arguments; `f(a,)` has an empty trailing one
        let last = current.trim();
        if !last.is_empty() || !args.is_empty() {
            args.push(Arg::classify(last));
        }
        if !closed {
            tracing::debug!(func = %normalized, "function call is missing ')'");
        }
    }

    if args.is_empty() {
        return Err(TemplateError::NoArguments);
    }

    Ok(FuncCall {
        name: name.to_string(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_typed_arguments() {
        let call = parse_func(r#"f(1, 2.5, true, "x")"#).unwrap();
        assert_eq!(call.name, "f");
        assert_eq!(
            call.args,
            vec![
                Arg::Int(1),
                Arg::Float(2.5),
                Arg::Bool(true),
                Arg::Str("x".to_string())
            ]
        );
    }

    #[test]
    fn test_mixed_arguments() {
        let call =
            parse_func("ToUpper(@me, 1, 2,    \"测试数据\", true, 1.321,'okkkk'    ,\"哦1121😯\")")
                .unwrap();
        assert_eq!(call.name, "ToUpper");
        assert_eq!(call.args.len(), 8);
        assert_eq!(call.args[0], Arg::Str("@me".to_string()));
        assert_eq!(call.args[3], Arg::Str("测试数据".to_string()));
        assert_eq!(call.args[5], Arg::Float(1.321));
        assert_eq!(call.args[6], Arg::Str("okkkk".to_string()));
        assert_eq!(call.args[7], Arg::Str("哦1121😯".to_string()));
    }

    #[test]
    fn test_quoted_numerals_stay_strings() {
        let call = parse_func(r#"f("2", '3.5', `true`)"#).unwrap();
        assert_eq!(
            call.args,
            vec![
                Arg::Str("2".to_string()),
                Arg::Str("3.5".to_string()),
                Arg::Str("true".to_string())
            ]
        );
    }

    #[test]
    fn test_boolean_case_insensitive() {
        let call = parse_func("f(TRUE, False)").unwrap();
        assert_eq!(call.args, vec![Arg::Bool(true), Arg::Bool(false)]);
    }

    #[test]
    fn test_comma_inside_quotes() {
        let call = parse_func(r#"join(", ", x)"#).unwrap();
        assert_eq!(
            call.args,
            vec![Arg::Str(", ".to_string()), Arg::Str("x".to_string())]
        );
    }

    #[test]
    fn test_whitespace_normalized() {
        let call = parse_func("  pad ( \n 3 ,\t x )  ").unwrap();
        assert_eq!(call.name, "pad");
        assert_eq!(call.args, vec![Arg::Int(3), Arg::Str("x".to_string())]);
    }

    #[test]
    fn test_no_function_name() {
        assert!(matches!(
            parse_func("(1, 2)"),
            Err(TemplateError::NoFunctionName)
        ));
        assert!(matches!(parse_func("   "), Err(TemplateError::NoFunctionName)));
    }

    #[test]
    fn test_no_arguments() {
        assert!(matches!(parse_func("f()"), Err(TemplateError::NoArguments)));
        assert!(matches!(parse_func("f"), Err(TemplateError::NoArguments)));
    }

    #[test]
    fn test_arg_display() {
        assert_eq!(Arg::Int(3).to_string(), "3");
        assert_eq!(Arg::Bool(false).to_string(), "false");
        assert_eq!(Arg::Str("s".to_string()).to_string(), "s");
    }
}
