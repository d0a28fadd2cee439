//! Tag parsing: `(type, kw=val, ...)>` immediately before the value it
//! decorates.

use super::State;
use crate::ast::{CollectionConstruct, NodeId, Node, TagNode};
use crate::error::{Error, Span};
use crate::grammar::lit;
use crate::value::Value;

const CONSTRUCT_WORDS: &[(&str, CollectionConstruct)] = &[
    ("init", CollectionConstruct::Init),
    ("deepinit", CollectionConstruct::DeepInit),
    ("default", CollectionConstruct::Default),
    ("deepdefault", CollectionConstruct::DeepDefault),
    ("recmerge", CollectionConstruct::RecMerge),
    ("deeprecmerge", CollectionConstruct::DeepRecMerge),
];

pub(crate) fn parse_tag(state: &mut State) -> Result<NodeId, Error> {
    let start = state.span_here();
    debug_assert_eq!(state.peek(), Some(lit::OPEN_TAG));
    state.advance(); // '('

    let mut tag = TagNode {
        span: start,
        type_name: None,
        label: None,
        newline: None,
        construct: None,
        extra: Vec::new(),
        parent: None,
    };

    loop {
        state.skip_inline_ws();
        if state.peek() == Some(lit::CLOSE_TAG) {
            state.advance();
            break;
        }
        let word_start = state.pos;
        while matches!(state.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            state.advance();
        }
        if state.pos == word_start {
            return Err(state.err_at(start, "malformed tag"));
        }
        let word: String = state.chars[word_start..state.pos].iter().collect();
        state.skip_inline_ws();

        if state.peek() == Some(lit::ASSIGN_KEY_VAL) {
            state.advance();
            state.skip_inline_ws();
            let value = parse_tag_value(state)?;
            assign_keyword(state, &mut tag, &word, value, start)?;
        } else if let Some((_, construct)) = CONSTRUCT_WORDS.iter().find(|(w, _)| *w == word) {
            if tag.construct.is_some() {
                return Err(state.err_at(start, "a tag may only specify one construct keyword"));
            }
            tag.construct = Some(*construct);
        } else if tag.type_name.is_none() && tag.extra.is_empty() && tag.label.is_none() {
            tag.type_name = Some(word);
        } else {
            return Err(state.err_at(start, format!("unexpected bare word \"{}\" in tag", word)));
        }

        state.skip_inline_ws();
        match state.peek() {
            Some(lit::INLINE_SEPARATOR) => {
                state.advance();
            }
            Some(lit::CLOSE_TAG) => {
                state.advance();
                break;
            }
            _ => return Err(state.err_at(start, "expected ',' or ')' in tag")),
        }
    }

    if state.peek() != Some(lit::END_TAG_SUFFIX) {
        return Err(state.err_at(start, "a tag must be closed with ')>'"));
    }
    state.advance(); // '>'

    let end = state.span_here();
    tag.span = Span {
        last_line: end.last_line,
        last_col: end.last_col,
        ..start
    };
    Ok(state.ast.push(Node::Tag(tag)))
}

fn assign_keyword(
    state: &mut State,
    tag: &mut TagNode,
    word: &str,
    value: Value,
    start: Span,
) -> Result<(), Error> {
    match word {
        "label" => {
            let s = value
                .as_str()
                .ok_or_else(|| state.err_at(start, "label= requires a string value"))?;
            tag.label = Some(s.to_string());
        }
        "newline" => {
            let s = value
                .as_str()
                .ok_or_else(|| state.err_at(start, "newline= requires a string value"))?;
            tag.newline = Some(s.to_string());
        }
        other => tag.extra.push((other.to_string(), value)),
    }
    Ok(())
}

/// Reads one tag keyword's value: a quoted string, or a bare run of
/// identifier/digit characters for type names, numbers and booleans.
fn parse_tag_value(state: &mut State) -> Result<Value, Error> {
    match state.peek() {
        Some(c) if c == lit::STRING_DELIM_SINGLE || c == lit::STRING_DELIM_DOUBLE || c == lit::STRING_DELIM_BACKTICK => {
            let id = super::scalars::parse_scalar(state, "")?;
            match state.ast.get(id) {
                Node::Scalar(s) => Ok(Value::Str(s.raw.clone())),
                _ => unreachable!(),
            }
        }
        _ => {
            let start = state.pos;
            while matches!(state.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-' || c == '+' || c == '.') {
                state.advance();
            }
            let raw: String = state.chars[start..state.pos].iter().collect();
            Ok(match raw.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "none" | "null" => Value::None,
                _ => raw
                    .parse::<i64>()
                    .map(Value::Int)
                    .or_else(|_| raw.parse::<f64>().map(Value::Float))
                    .unwrap_or(Value::Str(raw)),
            })
        }
    }
}
