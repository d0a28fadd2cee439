//! Scalar scanning: unquoted strings/numbers/reserved words, single- and
//! triple(-or-more)-delimiter quoted strings, and pipe-delimited block
//! strings.

use super::State;
use crate::ast::{Delim, ImplicitType, NodeId, Node, ScalarNode, TrailingNewline};
use crate::error::{Error, Span};
use crate::escape;
use crate::grammar::{self, lit};

/// Characters that end an unquoted scalar wherever it appears (inline or
/// block context); a run of interior single spaces is still permitted
/// (the "unquoted string" extension), but none of these.
fn terminates_unquoted(c: char) -> bool {
    grammar::is_line_terminator(c)
        || matches!(
            c,
            lit::ASSIGN_KEY_VAL
                | lit::INLINE_SEPARATOR
                | lit::INLINE_SEPARATOR_ALT
                | lit::CLOSE_INLINE_DICT
                | lit::CLOSE_INLINE_LIST
                | lit::OPEN_INLINE_DICT
                | lit::OPEN_INLINE_LIST
                | lit::COMMENT
                | lit::OPEN_TAG
                | lit::CLOSE_TAG
        )
}

pub(crate) fn parse_scalar(state: &mut State, external_indent: &str) -> Result<NodeId, Error> {
    match state.peek() {
        Some(c) if c == lit::STRING_DELIM_SINGLE || c == lit::STRING_DELIM_DOUBLE || c == lit::STRING_DELIM_BACKTICK => {
            parse_quoted(state, external_indent, c)
        }
        Some(lit::BLOCK_PREFIX) => parse_pipe_block(state, external_indent),
        _ => parse_unquoted(state, external_indent),
    }
}

fn count_run(state: &State, ch: char) -> usize {
    let mut n = 0;
    while state.peek_at(n) == Some(ch) {
        n += 1;
    }
    n
}

fn parse_quoted(state: &mut State, external_indent: &str, delim_ch: char) -> Result<NodeId, Error> {
    let start = state.span_here();
    let run_len = count_run(state, delim_ch);
    if run_len != 1 && (run_len < 3 || run_len % 3 != 0) {
        return Err(state.err(format!(
            "a quoted string delimiter must repeat 1 or a multiple of 3 times, found {}",
            run_len
        )));
    }
    if run_len > grammar::MAX_DELIM_LENGTH {
        return Err(state.err("quote delimiter exceeds the maximum allowed length"));
    }
    for _ in 0..run_len {
        state.advance();
    }
    let escape_aware = state.config.escaped_string_delim_chars.contains(&delim_ch);
    let block = run_len > 1;
    let mut raw = String::new();
    loop {
        if state.at_eof() {
            return Err(state.err_at(start, "unterminated quoted string"));
        }
        let c = state.peek().unwrap();
        if c == delim_ch {
            let here = count_run(state, delim_ch);
            if here == run_len {
                for _ in 0..run_len {
                    state.advance();
                }
                break;
            }
        }
        if !block && grammar::is_line_terminator(c) {
            return Err(state.err_at(start, "a singly-quoted string cannot contain a literal newline"));
        }
        if escape_aware && c == lit::BACKSLASH {
            raw.push(c);
            state.advance();
            if let Some(next) = state.peek() {
                raw.push(next);
                state.advance();
            }
            continue;
        }
        if grammar::is_invalid_literal(c) {
            return Err(state.invalid_literal_err(c));
        }
        raw.push(c);
        state.advance();
    }
    if state.only_ascii {
        for c in raw.chars() {
            if !c.is_ascii() && c != lit::BACKSLASH {
                return Err(state.err_at(start, format!("non-ASCII code point U+{:04X} with only_ascii enabled", c as u32)));
            }
        }
    }
    let value = if escape_aware {
        let opts = escape::UnescapeOptions::from_decoder_config(state.config);
        escape::unescape_unicode(&raw, &state.source_name, None, opts)?
    } else {
        raw.clone()
    };
    let end = state.span_here();
    let span = Span {
        last_line: end.last_line,
        last_col: end.last_col,
        ..start
    };
    let doc_comment = state.take_doc_comment();
    Ok(state.ast.push(Node::Scalar(ScalarNode {
        span,
        external_indent: external_indent.to_string(),
        raw: value,
        delim: Delim::Quote { ch: delim_ch, count: run_len as u16 },
        block,
        implicit_type: ImplicitType::Str,
        num_base: 10,
        continuation_indent: String::new(),
        trailing_newline: TrailingNewline::Keep,
        tag: None,
        doc_comment,
        parent: None,
        resolved: false,
        final_value: None,
    })))
}

/// `|===\n ... \n===|` / `|===\n ... \n===|/` pipe-delimited block
/// strings: content between a `|`+N`=`s opening marker and a matching
/// closing marker on its own (dedented) line, literal (no escape
/// processing). A trailing `/` after the closing marker keeps the final
/// newline; `//` strips it.
fn parse_pipe_block(state: &mut State, external_indent: &str) -> Result<NodeId, Error> {
    let start = state.span_here();
    state.advance(); // '|'
    let marker_len = count_run(state, '=');
    if marker_len > grammar::MAX_DELIM_LENGTH {
        return Err(state.err("pipe block marker exceeds the maximum allowed length"));
    }
    for _ in 0..marker_len {
        state.advance();
    }
    if !matches!(state.peek(), Some(c) if grammar::is_line_terminator(c)) {
        return Err(state.err_at(start, "a pipe block's opening marker must end the line"));
    }
    state.advance(); // newline

    let content_indent = state.peek_line_indent();
    let closing: String = format!("{}{}|", content_indent, "=".repeat(marker_len));

    let mut lines: Vec<String> = Vec::new();
    loop {
        if state.at_eof() {
            return Err(state.err_at(start, "unterminated pipe block string"));
        }
        let line_start = state.pos;
        let candidate: String = state.chars[line_start..]
            .iter()
            .take_while(|&&c| !grammar::is_line_terminator(c))
            .collect();
        if candidate == closing || candidate.starts_with(&format!("{}/", closing)) {
            let trailing_newline = if candidate.ends_with("//") {
                TrailingNewline::Strip
            } else {
                TrailingNewline::Keep
            };
            for _ in candidate.chars() {
                state.advance();
            }
            if matches!(state.peek(), Some(c) if grammar::is_line_terminator(c)) {
                state.advance();
            }
            let value = lines.join("\n");
            let end = state.span_here();
            let span = Span {
                last_line: end.last_line,
                last_col: end.last_col,
                ..start
            };
            let doc_comment = state.take_doc_comment();
            return Ok(state.ast.push(Node::Scalar(ScalarNode {
                span,
                external_indent: external_indent.to_string(),
                raw: value,
                delim: Delim::Pipe { marker_len: marker_len as u16 },
                block: true,
                implicit_type: ImplicitType::Str,
                num_base: 10,
                continuation_indent: content_indent.clone(),
                trailing_newline,
                tag: None,
                doc_comment,
                parent: None,
                resolved: false,
                final_value: None,
            })));
        }
        let stripped = candidate.strip_prefix(&content_indent).unwrap_or(&candidate).to_string();
        if let Some(bad) = stripped.chars().find(|&c| grammar::is_invalid_literal(c)) {
            return Err(state.invalid_literal_err(bad));
        }
        lines.push(stripped);
        for _ in candidate.chars() {
            state.advance();
        }
        if matches!(state.peek(), Some(c) if grammar::is_line_terminator(c)) {
            state.advance();
        }
    }
}

fn classify(raw: &str) -> (ImplicitType, u8) {
    if raw == "null" || raw == "none" {
        return (ImplicitType::None, 10);
    }
    if raw == "true" || raw == "false" {
        return (ImplicitType::Bool, 10);
    }
    if grammar::re_int_dec().is_match(raw) {
        return (ImplicitType::Int, 10);
    }
    if grammar::re_int_hex().is_match(raw) {
        return (ImplicitType::Int, 16);
    }
    if grammar::re_int_oct().is_match(raw) {
        return (ImplicitType::Int, 8);
    }
    if grammar::re_int_bin().is_match(raw) {
        return (ImplicitType::Int, 2);
    }
    if grammar::re_float_dec().is_match(raw) || raw == "inf" || raw == "-inf" || raw == "+inf" || raw == "nan" {
        return (ImplicitType::Float, 10);
    }
    if grammar::re_float_hex().is_match(raw) {
        return (ImplicitType::Float, 16);
    }
    (ImplicitType::Str, 10)
}

fn parse_unquoted(state: &mut State, external_indent: &str) -> Result<NodeId, Error> {
    if !state.unquoted_strings {
        return Err(state.err("unquoted strings are disabled by decoder configuration"));
    }
    let start = state.span_here();
    let mut raw = String::new();
    loop {
        match state.peek() {
            None => break,
            Some(c) if terminates_unquoted(c) => break,
            Some(' ') => {
                // A single interior space is part of an unquoted string;
                // two or more, or a space immediately before a
                // terminator, ends the token.
                if state.peek_at(1) == Some(' ') || raw.is_empty() {
                    break;
                }
                let mut lookahead = 1;
                while state.peek_at(lookahead) == Some(' ') {
                    lookahead += 1;
                }
                if let Some(next) = state.peek_at(lookahead) {
                    if terminates_unquoted(next) {
                        break;
                    }
                }
                raw.push(' ');
                state.advance();
            }
            Some(c) => {
                if !state.unquoted_unicode && !c.is_ascii() {
                    return Err(state.err("non-ASCII code point in unquoted string with unquoted_unicode disabled"));
                }
                if grammar::is_invalid_literal(c) {
                    return Err(state.invalid_literal_err(c));
                }
                raw.push(c);
                state.advance();
            }
        }
    }
    let raw = raw.trim_end().to_string();
    if raw.is_empty() {
        return Err(state.err_at(start, "expected a value"));
    }
    if let Some(canonical) = grammar::reserved_word_misspelling(&raw) {
        return Err(state.err_at(
            start,
            format!("\"{}\" looks like a misspelling of the reserved word \"{}\"", raw, canonical),
        ));
    }
    let (implicit_type, num_base) = classify(&raw);
    let end = state.span_here();
    let span = Span {
        last_line: end.last_line,
        last_col: end.last_col,
        ..start
    };
    let doc_comment = state.take_doc_comment();
    Ok(state.ast.push(Node::Scalar(ScalarNode {
        span,
        external_indent: external_indent.to_string(),
        raw,
        delim: Delim::None,
        block: false,
        implicit_type,
        num_base,
        continuation_indent: String::new(),
        trailing_newline: TrailingNewline::Keep,
        tag: None,
        doc_comment,
        parent: None,
        resolved: false,
        final_value: None,
    })))
}
