//! Collection parsing: non-inline (indentation-delimited) and inline
//! (`{...}`/`[...]`) lists and dicts, key paths used as dict keys, single
//! key-path-headed sections, and `$label` aliases.

use super::{scalars, tags, State};
use crate::ast::append::{self, AppendOp};
use crate::ast::{
    AliasNode, CopyDepth, DictNode, KeyPathElement, ListNode, Node, NodeId, SectionNode,
};
use crate::error::{Error, Span};
use crate::grammar::lit;

use super::keypath;

/// Parses the document body: a single value (list, dict, or scalar)
/// occupying the whole source, at the top-level (empty) indent.
pub(crate) fn parse_document_body(state: &mut State, indent: &str) -> Result<Option<NodeId>, Error> {
    let node = parse_block(state, indent)?;
    state.skip_trivia()?;
    if !state.at_eof() {
        return Err(state.err("unexpected trailing content after the document's top-level value"));
    }
    Ok(node)
}

/// Parses whichever construct starts at a line already known to be
/// indented by exactly `indent`: a non-inline list, a non-inline dict (or
/// sequence of sections), or a single scalar/inline value.
fn parse_block(state: &mut State, indent: &str) -> Result<Option<NodeId>, Error> {
    state.skip_trivia()?;
    if state.at_eof() {
        return Ok(None);
    }
    let line_indent = state.peek_line_indent();
    if line_indent != indent {
        return Ok(None);
    }
    let after_indent = state.peek_at(indent.len());
    let is_list_marker = after_indent == Some(lit::OPEN_NONINLINE_LIST)
        && matches!(
            state.peek_at(indent.len() + 1),
            None | Some(' ') | Some(c) if c == ' ' || crate::grammar::is_line_terminator(c)
        );
    if is_list_marker {
        return parse_list(state, indent).map(Some);
    }
    if looks_like_dict_key(state, indent) {
        return parse_dict(state, indent).map(Some);
    }
    for _ in 0..indent.len() {
        state.advance();
    }
    // Anything else occupying this slot — a tag, an alias, an inline
    // collection, or a plain scalar — is parsed by the same dispatcher a
    // key's or list marker's value slot uses (`parse_value_for_slot`'s
    // inline branch), so a document whose top-level value is `{...}` or
    // `[...]` parses the same way a dict/list *value* would.
    parse_inline_value(state, indent).map(Some)
}

/// Non-mutating lookahead: does the content at `indent` look like
/// `<key path or scalar key> =` (a dict entry), as opposed to a bare
/// scalar value?
fn looks_like_dict_key(state: &State, indent: &str) -> bool {
    let mut i = indent.len();
    match state.peek_at(i) {
        Some(c)
            if crate::grammar::is_identifier_start(c)
                || c == lit::STRING_DELIM_SINGLE
                || c == lit::STRING_DELIM_DOUBLE =>
        {
            if c == lit::STRING_DELIM_SINGLE || c == lit::STRING_DELIM_DOUBLE {
                i += 1;
                while let Some(ch) = state.peek_at(i) {
                    if ch == c {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            } else {
                while matches!(state.peek_at(i), Some(ch) if crate::grammar::is_identifier_continue(ch)) {
                    i += 1;
                }
            }
        }
        _ => return false,
    }
    while matches!(state.peek_at(i), Some(lit::PATH_SEPARATOR)) {
        i += 1;
        while matches!(state.peek_at(i), Some(ch) if crate::grammar::is_identifier_continue(ch)) {
            i += 1;
        }
    }
    while matches!(state.peek_at(i), Some(' ') | Some('\t')) {
        i += 1;
    }
    state.peek_at(i) == Some(lit::ASSIGN_KEY_VAL)
}

fn parse_list(state: &mut State, indent: &str) -> Result<NodeId, Error> {
    let start = state.span_here();
    let list_id = state.ast.push(Node::List(ListNode {
        span: start,
        external_indent: indent.to_string(),
        children: Vec::new(),
        inline: false,
        indent: indent.to_string(),
        internal_indent_first: None,
        internal_indent_subsequent: None,
        open: true,
        unresolved_dependency_count: 0,
        key_path_parent: None,
        key_path_traversable: true,
        section: None,
        tag: None,
        doc_comment: state.take_doc_comment(),
        parent: None,
        resolved: false,
        final_value: None,
    }));

    loop {
        state.skip_trivia()?;
        if state.at_eof() {
            break;
        }
        let line_indent = state.peek_line_indent();
        if line_indent != indent || state.peek_at(indent.len()) != Some(lit::OPEN_NONINLINE_LIST) {
            break;
        }
        for _ in 0..indent.len() {
            state.advance();
        }
        let marker_indent = format!("{}* ", indent);
        state.advance(); // '*'
        if state.peek() == Some(' ') {
            state.advance();
        }
        let child = parse_value_for_slot(state, &marker_indent)?;
        append::append(&mut state.ast, list_id, child, AppendOp::Collection, &state.source_name)?;
    }

    if let Node::List(l) = state.ast.get_mut(list_id) {
        l.open = false;
    }
    Ok(list_id)
}

fn parse_dict(state: &mut State, indent: &str) -> Result<NodeId, Error> {
    let start = state.span_here();
    let dict_id = state.ast.push(Node::Dict(DictNode {
        span: start,
        external_indent: indent.to_string(),
        entries: Vec::new(),
        inline: false,
        indent: indent.to_string(),
        internal_indent_first: None,
        internal_indent_subsequent: None,
        open: true,
        awaiting_val: false,
        next_key: None,
        unresolved_dependency_count: 0,
        key_path_parent: None,
        key_path_traversable: true,
        section: None,
        tag: None,
        doc_comment: state.take_doc_comment(),
        parent: None,
        resolved: false,
        final_value: None,
    }));

    loop {
        state.skip_trivia()?;
        if state.at_eof() {
            break;
        }
        let line_indent = state.peek_line_indent();
        if line_indent != indent {
            break;
        }
        if state.peek_at(indent.len()) == Some(lit::OPEN_NONINLINE_LIST) {
            return Err(state.err("a list marker cannot appear among a dict's entries at the same indent"));
        }
        if !looks_like_dict_key(state, indent) && !looks_like_section_header(state, indent) {
            break;
        }
        for _ in 0..indent.len() {
            state.advance();
        }

        if looks_like_section_header_here(state) {
            parse_section_into(state, dict_id)?;
            continue;
        }

        if keypath::looks_like_key_path(state) {
            let path_id = keypath::parse_key_path(state)?;
            state.skip_inline_ws();
            if state.peek() != Some(lit::ASSIGN_KEY_VAL) {
                return Err(state.err("expected '=' after a key path"));
            }
            state.advance();
            state.skip_inline_ws();
            let value_external_indent = format!("{}  ", indent);
            let value = parse_value_for_slot(state, &value_external_indent)?;
            apply_key_path(state, dict_id, path_id, value)?;
        } else {
            let key = scalars::parse_scalar(state, indent)?;
            append::append(&mut state.ast, dict_id, key, AppendOp::ScalarKey, &state.source_name)?;
            state.skip_inline_ws();
            if state.peek() != Some(lit::ASSIGN_KEY_VAL) {
                return Err(state.err("expected '=' after a dict key"));
            }
            state.advance();
            state.skip_inline_ws();
            let value_external_indent = format!("{}  ", indent);
            let value = parse_value_for_slot(state, &value_external_indent)?;
            append::append(&mut state.ast, dict_id, value, AppendOp::ScalarVal, &state.source_name)?;
        }
    }

    if let Node::Dict(d) = state.ast.get_mut(dict_id) {
        d.open = false;
    }
    Ok(dict_id)
}

/// Non-mutating check for `<key path>` alone on a line followed by a
/// `===` (3 or more `=`) delimiter line: a section header.
fn looks_like_section_header(state: &State, indent: &str) -> bool {
    looks_like_section_header_here_impl(state, indent.len())
}

fn looks_like_section_header_here(state: &State) -> bool {
    looks_like_section_header_here_impl(state, 0)
}

fn looks_like_section_header_here_impl(state: &State, skip: usize) -> bool {
    let mut i = skip;
    match state.peek_at(i) {
        Some(c) if crate::grammar::is_identifier_start(c) => {}
        _ => return false,
    }
    i += 1;
    while matches!(state.peek_at(i), Some(c) if crate::grammar::is_identifier_continue(c) || c == lit::PATH_SEPARATOR) {
        i += 1;
    }
    while matches!(state.peek_at(i), Some(' ') | Some('\t')) {
        i += 1;
    }
    match state.peek_at(i) {
        Some(c) if crate::grammar::is_line_terminator(c) => {}
        None => {}
        _ => return false,
    }
    // Scan forward past the newline for a run of 3+ '=' alone on the
    // following line. We can't consume state here, so re-derive the
    // absolute char index and scan the underlying buffer directly.
    let base = state.pos + i;
    let mut j = base;
    if state.chars.get(j).copied().map(crate::grammar::is_line_terminator) == Some(true) {
        j += 1;
    } else {
        return false;
    }
    let eq_start = j;
    while state.chars.get(j) == Some(&'=') {
        j += 1;
    }
    let eq_len = j - eq_start;
    eq_len >= 3
}

fn parse_section_into(state: &mut State, dict_id: NodeId) -> Result<(), Error> {
    let start = state.span_here();
    let path_id = keypath::parse_key_path(state)?;
    state.skip_inline_ws();
    if !matches!(state.peek(), None) && !crate::grammar::is_line_terminator(state.peek().unwrap()) {
        return Err(state.err("unexpected content after a section header's key path"));
    }
    if !state.at_eof() {
        state.advance(); // newline
    }
    while state.peek() == Some('=') {
        state.advance();
    }
    if matches!(state.peek(), Some(c) if crate::grammar::is_line_terminator(c)) {
        state.advance();
    }

    state.skip_trivia()?;
    let body_indent = if state.at_eof() {
        String::new()
    } else {
        state.peek_line_indent()
    };
    let body = parse_block(state, &body_indent)?
        .ok_or_else(|| state.err_at(start, "a section must be followed by an indented body"))?;

    let end = state.span_here();
    let section = state.ast.push(Node::Section(SectionNode {
        span: Span { last_line: end.last_line, last_col: end.last_col, ..start },
        path: path_id,
        parent: None,
    }));
    if let Node::KeyPath(p) = state.ast.get(path_id) {
        let _ = p;
    }
    match state.ast.get_mut(body) {
        Node::Dict(d) => d.section = Some(section),
        Node::List(l) => l.section = Some(section),
        _ => {}
    }
    apply_key_path(state, dict_id, path_id, body)
}

/// Navigates/creates intermediate dicts under `dict_id` per `path_id`'s
/// elements, placing `value` at the final element. A `ListOpen` element
/// appends a fresh dict as a new list element and continues the path
/// inside it.
fn apply_key_path(state: &mut State, dict_id: NodeId, path_id: NodeId, value: NodeId) -> Result<(), Error> {
    let elements = match state.ast.get(path_id) {
        Node::KeyPath(p) => p.elements.clone(),
        _ => return Err(state.bug("apply_key_path called with a non-key-path node")),
    };
    if elements.is_empty() {
        return Err(state.err("a key path must have at least one element"));
    }
    let mut current = dict_id;
    for element in &elements[..elements.len() - 1] {
        current = step_key_path(state, current, element)?;
    }
    match &elements[elements.len() - 1] {
        KeyPathElement::Key(name) => {
            let key_span = state.ast.get(path_id).span();
            let key_node = state.ast.push(Node::Scalar(crate::ast::ScalarNode {
                span: key_span,
                external_indent: String::new(),
                raw: name.clone(),
                delim: crate::ast::Delim::None,
                block: false,
                implicit_type: crate::ast::ImplicitType::Key,
                num_base: 10,
                continuation_indent: String::new(),
                trailing_newline: crate::ast::TrailingNewline::Keep,
                tag: None,
                doc_comment: None,
                parent: None,
                resolved: true,
                final_value: Some(crate::value::Value::Str(name.clone())),
            }));
            append::append(&mut state.ast, current, key_node, AppendOp::KeyPathScalarKey, &state.source_name)?;
            append::append(&mut state.ast, current, value, AppendOp::KeyPathScalarVal, &state.source_name)?;
        }
        KeyPathElement::ListOpen => {
            append::append(&mut state.ast, current, value, AppendOp::KeyPathCollection, &state.source_name)?;
        }
    }
    Ok(())
}

fn step_key_path(state: &mut State, current: NodeId, element: &KeyPathElement) -> Result<NodeId, Error> {
    match element {
        KeyPathElement::Key(name) => {
            if let Node::Dict(d) = state.ast.get(current) {
                for (k, v) in &d.entries {
                    if let Node::Scalar(s) = state.ast.get(*k) {
                        if s.raw == *name {
                            return Ok(*v);
                        }
                    }
                }
            }
            let key_node = state.ast.push(Node::Scalar(crate::ast::ScalarNode {
                span: state.span_here(),
                external_indent: String::new(),
                raw: name.clone(),
                delim: crate::ast::Delim::None,
                block: false,
                implicit_type: crate::ast::ImplicitType::Key,
                num_base: 10,
                continuation_indent: String::new(),
                trailing_newline: crate::ast::TrailingNewline::Keep,
                tag: None,
                doc_comment: None,
                parent: None,
                resolved: true,
                final_value: Some(crate::value::Value::Str(name.clone())),
            }));
            let nested = new_key_path_dict(state);
            append::append(&mut state.ast, current, key_node, AppendOp::KeyPathScalarKey, &state.source_name)?;
            append::append(&mut state.ast, current, nested, AppendOp::KeyPathScalarVal, &state.source_name)?;
            Ok(nested)
        }
        KeyPathElement::ListOpen => {
            let nested = new_key_path_dict(state);
            append::append(&mut state.ast, current, nested, AppendOp::KeyPathCollection, &state.source_name)?;
            Ok(nested)
        }
    }
}

fn new_key_path_dict(state: &mut State) -> NodeId {
    let span = state.span_here();
    state.ast.push(Node::Dict(DictNode {
        span,
        external_indent: String::new(),
        entries: Vec::new(),
        inline: false,
        indent: String::new(),
        internal_indent_first: None,
        internal_indent_subsequent: None,
        open: true,
        awaiting_val: false,
        next_key: None,
        unresolved_dependency_count: 0,
        key_path_parent: None,
        key_path_traversable: true,
        section: None,
        tag: None,
        doc_comment: None,
        parent: None,
        resolved: false,
        final_value: None,
    }))
}

/// Parses a value occupying a key's or list marker's slot: either inline
/// on the same line, or deferred to an indented block on following
/// lines.
fn parse_value_for_slot(state: &mut State, external_indent: &str) -> Result<NodeId, Error> {
    state.skip_inline_ws();
    if matches!(state.peek(), None) || matches!(state.peek(), Some(c) if crate::grammar::is_line_terminator(c)) || state.peek() == Some(lit::COMMENT) {
        state.skip_trivia()?;
        if state.at_eof() {
            return Err(state.err("expected a value"));
        }
        let child_indent = state.peek_line_indent();
        return parse_block(state, &child_indent)?.ok_or_else(|| state.err("expected a value"));
    }
    parse_inline_value(state, external_indent)
}

/// Parses a value that must be fully expressed on the current line (or,
/// for block scalars, whose own delimiters manage continuation): tags,
/// aliases, inline collections, and scalars.
fn parse_inline_value(state: &mut State, external_indent: &str) -> Result<NodeId, Error> {
    if state.peek() == Some(lit::OPEN_TAG) {
        let tag_id = tags::parse_tag(state)?;
        state.skip_inline_ws();
        let value = parse_inline_value(state, external_indent)?;
        attach_tag(state, value, tag_id)?;
        return Ok(value);
    }
    match state.peek() {
        Some(lit::ALIAS_PREFIX) => parse_alias(state),
        Some(lit::OPEN_INLINE_DICT) => parse_inline_dict(state, external_indent),
        Some(lit::OPEN_INLINE_LIST) => parse_inline_list(state, external_indent),
        _ => scalars::parse_scalar(state, external_indent),
    }
}

fn attach_tag(state: &mut State, node: NodeId, tag_id: NodeId) -> Result<(), Error> {
    if matches!(state.ast.get(node), Node::Alias(_)) {
        let depth = copy_depth_from_tag(state, tag_id);
        if depth.is_none() {
            return Err(state.err("a tag on an alias reference must be a bare \"copy\" or \"deepcopy\" keyword"));
        }
        if let Node::Alias(a) = state.ast.get_mut(node) {
            a.copy = depth;
        }
        return Ok(());
    }
    let basetype = state.ast.get(node).basetype();
    if let Node::Tag(t) = state.ast.get(tag_id) {
        if !t.allowed_basetypes().contains(&basetype) {
            return Err(state.err(format!(
                "a tag with these keywords cannot be applied to a {} node",
                basetype
            )));
        }
    }
    match state.ast.get_mut(node) {
        Node::Scalar(n) => n.tag = Some(tag_id),
        Node::List(n) => n.tag = Some(tag_id),
        Node::Dict(n) => n.tag = Some(tag_id),
        _ => return Err(state.bug("tag attached to a non-taggable node")),
    }
    Ok(())
}

fn parse_alias(state: &mut State) -> Result<NodeId, Error> {
    let start = state.span_here();
    state.advance(); // '$'
    let label_start = state.pos;
    while matches!(state.peek(), Some(c) if crate::grammar::is_identifier_continue(c)) {
        state.advance();
    }
    if state.pos == label_start {
        return Err(state.err_at(start, "expected a label name after '$'"));
    }
    let label: String = state.chars[label_start..state.pos].iter().collect();
    let end = state.span_here();
    let span = Span { last_line: end.last_line, last_col: end.last_col, ..start };
    Ok(state.ast.push(Node::Alias(AliasNode {
        span,
        label,
        copy: None,
        parent: None,
    })))
}

/// Derives the alias's copy depth from a tag's `copy`/`deepcopy` bare
/// keyword, stashed by [`tags::parse_tag`] as an `extra` entry.
pub(crate) fn copy_depth_from_tag(state: &State, tag_id: NodeId) -> Option<CopyDepth> {
    if let Node::Tag(t) = state.ast.get(tag_id) {
        for (k, _) in &t.extra {
            match k.as_str() {
                "copy" => return Some(CopyDepth::Shallow),
                "deepcopy" => return Some(CopyDepth::Deep),
                _ => {}
            }
        }
    }
    None
}

fn parse_inline_list(state: &mut State, external_indent: &str) -> Result<NodeId, Error> {
    let start = state.span_here();
    state.advance(); // '['
    state.enter_nesting()?;
    let list_id = state.ast.push(Node::List(ListNode {
        span: start,
        external_indent: external_indent.to_string(),
        children: Vec::new(),
        inline: true,
        indent: external_indent.to_string(),
        internal_indent_first: None,
        internal_indent_subsequent: None,
        open: true,
        unresolved_dependency_count: 0,
        key_path_parent: None,
        key_path_traversable: false,
        section: None,
        tag: None,
        doc_comment: None,
        parent: None,
        resolved: false,
        final_value: None,
    }));
    if let Node::List(l) = state.ast.get_mut(list_id) {
        l.open = true;
    }
    loop {
        skip_inline_collection_trivia(state)?;
        if state.peek() == Some(lit::CLOSE_INLINE_LIST) {
            state.advance();
            break;
        }
        let value = parse_inline_value(state, external_indent)?;
        if let Node::List(l) = state.ast.get_mut(list_id) {
            l.open = true;
        }
        append::append(&mut state.ast, list_id, value, AppendOp::Collection, &state.source_name)?;
        skip_inline_collection_trivia(state)?;
        match state.peek() {
            Some(lit::INLINE_SEPARATOR) | Some(lit::INLINE_SEPARATOR_ALT) => {
                state.advance();
            }
            Some(lit::CLOSE_INLINE_LIST) => {
                state.advance();
                break;
            }
            _ => return Err(state.err_at(start, "expected ',', ';', or ']' in an inline list")),
        }
    }
    state.exit_nesting();
    let end = state.span_here();
    if let Node::List(l) = state.ast.get_mut(list_id) {
        l.open = false;
        l.span = Span { last_line: end.last_line, last_col: end.last_col, ..start };
        l.doc_comment = state.take_doc_comment();
    }
    Ok(list_id)
}

fn parse_inline_dict(state: &mut State, external_indent: &str) -> Result<NodeId, Error> {
    let start = state.span_here();
    state.advance(); // '{'
    state.enter_nesting()?;
    let dict_id = state.ast.push(Node::Dict(DictNode {
        span: start,
        external_indent: external_indent.to_string(),
        entries: Vec::new(),
        inline: true,
        indent: external_indent.to_string(),
        internal_indent_first: None,
        internal_indent_subsequent: None,
        open: true,
        awaiting_val: false,
        next_key: None,
        unresolved_dependency_count: 0,
        key_path_parent: None,
        key_path_traversable: false,
        section: None,
        tag: None,
        doc_comment: None,
        parent: None,
        resolved: false,
        final_value: None,
    }));
    loop {
        skip_inline_collection_trivia(state)?;
        if state.peek() == Some(lit::CLOSE_INLINE_DICT) {
            state.advance();
            break;
        }
        let key = scalars::parse_scalar(state, external_indent)?;
        if let Node::Dict(d) = state.ast.get_mut(dict_id) {
            d.open = true;
        }
        append::append(&mut state.ast, dict_id, key, AppendOp::ScalarKey, &state.source_name)?;
        skip_inline_collection_trivia(state)?;
        // `:` is accepted alongside `=` here only, so that a JSON object
        // (whose keys are always quoted strings) decodes as-is; non-inline
        // dicts still require `=` (`looks_like_dict_key`/`parse_dict`).
        if !matches!(state.peek(), Some(lit::ASSIGN_KEY_VAL) | Some(lit::ASSIGN_KEY_VAL_ALT)) {
            return Err(state.err_at(start, "expected '=' or ':' in an inline dict entry"));
        }
        state.advance();
        skip_inline_collection_trivia(state)?;
        let value = parse_inline_value(state, external_indent)?;
        append::append(&mut state.ast, dict_id, value, AppendOp::ScalarVal, &state.source_name)?;
        skip_inline_collection_trivia(state)?;
        match state.peek() {
            Some(lit::INLINE_SEPARATOR) | Some(lit::INLINE_SEPARATOR_ALT) => {
                state.advance();
            }
            Some(lit::CLOSE_INLINE_DICT) => {
                state.advance();
                break;
            }
            _ => return Err(state.err_at(start, "expected ',', ';', or '}' in an inline dict")),
        }
    }
    state.exit_nesting();
    let end = state.span_here();
    if let Node::Dict(d) = state.ast.get_mut(dict_id) {
        d.open = false;
        d.span = Span { last_line: end.last_line, last_col: end.last_col, ..start };
        d.doc_comment = state.take_doc_comment();
    }
    Ok(dict_id)
}

/// Skips whitespace, newlines, and comments inside an inline collection,
/// where (unlike the top-level indentation grammar) a construct may span
/// multiple physical lines freely between its delimiters.
fn skip_inline_collection_trivia(state: &mut State) -> Result<(), Error> {
    loop {
        match state.peek() {
            Some(' ') | Some('\t') => {
                state.advance();
            }
            Some(c) if crate::grammar::is_line_terminator(c) => {
                state.advance();
            }
            Some(lit::COMMENT) => {
                while let Some(c) = state.peek() {
                    if crate::grammar::is_line_terminator(c) {
                        break;
                    }
                    state.advance();
                }
            }
            _ => break,
        }
    }
    Ok(())
}
