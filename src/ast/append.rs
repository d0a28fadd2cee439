//! The append contract (§4.5): the only legal transitions by which a
//! child node is attached to a List or Dict.
//!
//! Implemented as one free function dispatching on `(parent kind, child
//! kind, inline flag)`, per the Design Note in `spec.md` §9, rather than
//! per-variant trait methods — this keeps the invariant checks in a single
//! place that mirrors the original's five `check_append_*` methods without
//! requiring dynamic dispatch.

use super::{Ast, DictNode, ListNode, Node, NodeId};
use crate::error::{Error, Span, Traceback};

/// Which of the five append operations is being performed. The
/// `KeyPath*` variants bypass indentation checks, used only by the
/// key-path traversal driver (§4.4 "Key paths").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOp {
    ScalarKey,
    ScalarVal,
    Collection,
    KeyPathScalarKey,
    KeyPathScalarVal,
    KeyPathCollection,
}

impl AppendOp {
    fn bypasses_indentation(self) -> bool {
        matches!(
            self,
            AppendOp::KeyPathScalarKey | AppendOp::KeyPathScalarVal | AppendOp::KeyPathCollection
        )
    }

    fn is_key(self) -> bool {
        matches!(self, AppendOp::ScalarKey | AppendOp::KeyPathScalarKey)
    }
}

fn err(source_name: &str, span: Span, message: impl Into<String>) -> Error {
    Error::parse(
        Traceback {
            source_name: source_name.to_string(),
            span,
            related: vec![],
        },
        message,
    )
}

/// Appends `child` to `parent` (a List or Dict node id) under the given
/// operation, checking every invariant from §4.5.
pub fn append(
    ast: &mut Ast,
    parent_id: NodeId,
    child: NodeId,
    op: AppendOp,
    source_name: &str,
) -> Result<(), Error> {
    let child_span = ast.get(child).span();
    let child_external_indent = external_indent_of(ast, child);
    let child_unresolved = !ast.get(child).is_resolved();

    match ast.get_mut(parent_id) {
        Node::List(list) => append_to_list(list, child, op, &child_external_indent, child_span, child_unresolved, source_name),
        Node::Dict(dict) => append_to_dict(dict, child, op, &child_external_indent, child_span, child_unresolved, source_name),
        other => Err(err(
            source_name,
            other.span(),
            format!("cannot append a child to a {} node", other.basetype()),
        )),
    }
}

fn external_indent_of(ast: &Ast, id: NodeId) -> String {
    match ast.get(id) {
        Node::Scalar(s) => s.external_indent.clone(),
        Node::List(l) => l.external_indent.clone(),
        Node::Dict(d) => d.external_indent.clone(),
        _ => String::new(),
    }
}

fn check_indent(
    list_like_indent: &str,
    internal_first: &mut Option<String>,
    internal_subsequent: &Option<String>,
    inline: bool,
    child_external_indent: &str,
    child_span: Span,
    source_name: &str,
) -> Result<(), Error> {
    if inline {
        if !child_external_indent.starts_with(list_like_indent) {
            return Err(Error::Indentation {
                traceback: Traceback {
                    source_name: source_name.to_string(),
                    span: child_span,
                    related: vec![],
                },
            });
        }
        return Ok(());
    }
    if internal_first.is_none() {
        *internal_first = Some(child_external_indent.to_string());
        return Ok(());
    }
    let first = internal_first.as_deref().unwrap();
    let subsequent = internal_subsequent.as_deref().unwrap_or(first);
    if child_external_indent != first && child_external_indent != subsequent {
        return Err(Error::Indentation {
            traceback: Traceback {
                source_name: source_name.to_string(),
                span: child_span,
                related: vec![],
            },
        });
    }
    Ok(())
}

fn append_to_list(
    list: &mut ListNode,
    child: NodeId,
    op: AppendOp,
    child_external_indent: &str,
    child_span: Span,
    child_unresolved: bool,
    source_name: &str,
) -> Result<(), Error> {
    if op.is_key() {
        return Err(err(
            source_name,
            child_span,
            "a key-value pair cannot be added to a list".to_string(),
        ));
    }
    if !list.open {
        return Err(err(
            source_name,
            child_span,
            "list is not open for further elements".to_string(),
        ));
    }
    if !op.bypasses_indentation() {
        check_indent(
            &list.indent,
            &mut list.internal_indent_first,
            &list.internal_indent_subsequent,
            list.inline,
            child_external_indent,
            child_span,
            source_name,
        )?;
    }
    list.children.push(child);
    if child_unresolved {
        list.unresolved_dependency_count += 1;
    }
    let span = list.span;
    list.span = Span {
        last_line: child_span.last_line,
        last_col: child_span.last_col,
        ..span
    };
    if list.inline {
        list.open = false;
    }
    Ok(())
}

fn append_to_dict(
    dict: &mut DictNode,
    child: NodeId,
    op: AppendOp,
    child_external_indent: &str,
    child_span: Span,
    child_unresolved: bool,
    source_name: &str,
) -> Result<(), Error> {
    if !dict.open {
        return Err(err(
            source_name,
            child_span,
            "dict is not open for further entries".to_string(),
        ));
    }
    if op.is_key() {
        if dict.awaiting_val {
            return Err(err(
                source_name,
                child_span,
                "missing value for the previous key".to_string(),
            ));
        }
        if !op.bypasses_indentation() {
            check_indent(
                &dict.indent,
                &mut dict.internal_indent_first,
                &dict.internal_indent_subsequent,
                dict.inline,
                child_external_indent,
                child_span,
                source_name,
            )?;
        }
        dict.next_key = Some(child);
        dict.awaiting_val = true;
        let span = dict.span;
        dict.span = Span {
            last_line: child_span.last_line,
            last_col: child_span.last_col,
            ..span
        };
        return Ok(());
    }
    if !dict.awaiting_val {
        return Err(err(
            source_name,
            child_span,
            "a value cannot be appended to a dict without a pending key".to_string(),
        ));
    }
    let key = dict
        .next_key
        .take()
        .ok_or_else(|| err(source_name, child_span, "missing key for value".to_string()))?;
    dict.entries.push((key, child));
    dict.awaiting_val = false;
    if child_unresolved {
        dict.unresolved_dependency_count += 1;
    }
    let span = dict.span;
    dict.span = Span {
        last_line: child_span.last_line,
        last_col: child_span.last_col,
        ..span
    };
    if dict.inline {
        dict.open = false;
    }
    Ok(())
}
