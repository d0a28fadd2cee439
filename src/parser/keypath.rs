//! Key path parsing: dotted sequences of identifiers/quoted keys, with a
//! bare `*` segment meaning "open a new list element" at that point in
//! the path.

use super::State;
use crate::ast::{KeyPathElement, KeyPathNode, Node, NodeId};
use crate::error::{Error, Span};
use crate::grammar::lit;

/// True when the upcoming token looks like the start of a key path: an
/// identifier or quoted string immediately followed (after no
/// whitespace) by a `.`, or a bare leading `*`/`~`/`_` path element.
pub(crate) fn looks_like_key_path(state: &State) -> bool {
    match state.peek() {
        Some(c) if crate::grammar::is_identifier_start(c) => {}
        _ => return false,
    }
    let mut i = 1;
    while matches!(state.peek_at(i), Some(c) if crate::grammar::is_identifier_continue(c)) {
        i += 1;
    }
    state.peek_at(i) == Some(lit::PATH_SEPARATOR)
}

pub(crate) fn parse_key_path(state: &mut State) -> Result<NodeId, Error> {
    let start = state.span_here();
    let mut elements = Vec::new();
    loop {
        match state.peek() {
            Some(lit::OPEN_NONINLINE_LIST) => {
                state.advance();
                elements.push(KeyPathElement::ListOpen);
            }
            Some(c) if c == lit::STRING_DELIM_SINGLE || c == lit::STRING_DELIM_DOUBLE => {
                let id = super::scalars::parse_scalar(state, "")?;
                match state.ast.get(id) {
                    Node::Scalar(s) => elements.push(KeyPathElement::Key(s.raw.clone())),
                    _ => unreachable!(),
                }
            }
            Some(c) if crate::grammar::is_identifier_start(c) => {
                let word_start = state.pos;
                state.advance();
                while matches!(state.peek(), Some(c) if crate::grammar::is_identifier_continue(c)) {
                    state.advance();
                }
                let word: String = state.chars[word_start..state.pos].iter().collect();
                elements.push(KeyPathElement::Key(word));
            }
            _ => return Err(state.err_at(start, "expected a key path element")),
        }
        if state.peek() == Some(lit::PATH_SEPARATOR) {
            state.advance();
            continue;
        }
        break;
    }
    let end = state.span_here();
    let span = Span {
        last_line: end.last_line,
        last_col: end.last_col,
        ..start
    };
    Ok(state.ast.push(Node::KeyPath(KeyPathNode {
        span,
        elements,
        parent: None,
    })))
}
