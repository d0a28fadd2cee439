//! Resolver (C6): post-parse pass that applies tags, materializes
//! aliases/copies, verifies the reference graph, and converts raw scalars
//! into the typed [`Value`] tree described in `spec.md` §4.6.
//!
//! Three conceptual passes, per §4.6: (1) tag application + label-table
//! population, (2) alias/copy expansion with cycle detection, (3) value
//! materialization. Here (1)'s label collection runs as its own tree walk
//! first (so a forward-referencing alias can find its label), then (2) and
//! (3) run together in a single recursive descent: resolving a node's tag
//! and computing its final value happen in the same function, since both
//! need the same raw/child data and there is no benefit to a second walk.

use crate::ast::{Ast, CollectionConstruct, CopyDepth, Delim, Node, NodeId, TagNode, TrailingNewline};
use crate::config::DecoderConfig;
use crate::error::{Error, RelatedKind, Span, Traceback};
use crate::escape::{self, UnescapeOptions};
use crate::types::{BaseType, Registry};
use crate::value::{DictHandle, ListHandle, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Runs the full resolver over `ast`, starting from its `Source` node, and
/// returns the resolved value tree.
pub fn resolve(ast: &mut Ast, source: NodeId, config: &DecoderConfig) -> Result<Value, Error> {
    let (source_name, root) = match ast.get(source) {
        Node::Source(s) => (s.source_name.clone(), s.root),
        other => return Err(bug_at(&String::new(), other.span(), "resolve() requires a Source node")),
    };
    collect_labels(ast, root, &source_name)?;
    let registry = Registry::new();
    let mut resolver = Resolver {
        ast,
        config,
        registry: &registry,
        source_name,
        unescape_opts: UnescapeOptions::from_decoder_config(config),
    };
    resolver.resolve_root(root)
}

fn bug_at(source_name: &str, span: Span, message: impl Into<String>) -> Error {
    Error::bug(
        Traceback {
            source_name: source_name.to_string(),
            span,
            related: vec![],
        },
        message,
    )
}

/// Walks the whole tree once, registering every tagged `label=` into
/// `ast.labels` before any alias is resolved, so that aliases may reference
/// labels defined later in source order.
fn collect_labels(ast: &mut Ast, id: NodeId, source_name: &str) -> Result<(), Error> {
    let node = ast.get(id).clone();
    match node {
        Node::Root(r) => {
            register_label(ast, id, r.tag, source_name)?;
            if let Some(child) = r.child {
                collect_labels(ast, child, source_name)?;
            }
        }
        Node::Scalar(s) => {
            register_label(ast, id, s.tag, source_name)?;
        }
        Node::List(l) => {
            register_label(ast, id, l.tag, source_name)?;
            for child in l.children {
                collect_labels(ast, child, source_name)?;
            }
        }
        Node::Dict(d) => {
            register_label(ast, id, d.tag, source_name)?;
            for (k, v) in d.entries {
                collect_labels(ast, k, source_name)?;
                collect_labels(ast, v, source_name)?;
            }
        }
        Node::Alias(_) | Node::Tag(_) | Node::KeyPath(_) | Node::Section(_) | Node::Source(_) => {}
    }
    Ok(())
}

fn register_label(ast: &mut Ast, node_id: NodeId, tag_id: Option<NodeId>, source_name: &str) -> Result<(), Error> {
    let Some(tag_id) = tag_id else { return Ok(()) };
    let label = match ast.get(tag_id) {
        Node::Tag(t) => t.label.clone(),
        _ => None,
    };
    let Some(label) = label else { return Ok(()) };
    if let Some(existing) = ast.labels.get(&label) {
        let existing_span = ast.get(existing.node).span();
        let new_span = ast.get(node_id).span();
        return Err(Error::parse(
            Traceback {
                source_name: source_name.to_string(),
                span: new_span,
                related: vec![(RelatedKind::Object, existing_span)],
            },
            format!("duplicate label \"{}\"", label),
        ));
    }
    ast.labels.insert(label, crate::ast::LabelEntry { node: node_id });
    Ok(())
}

struct Resolver<'a> {
    ast: &'a mut Ast,
    config: &'a DecoderConfig,
    registry: &'a Registry,
    source_name: String,
    unescape_opts: UnescapeOptions,
}

impl<'a> Resolver<'a> {
    fn bug(&self, span: Span, message: impl Into<String>) -> Error {
        bug_at(&self.source_name, span, message)
    }

    fn err(&self, span: Span, related: Vec<(RelatedKind, Span)>, message: impl Into<String>) -> Error {
        Error::parse(
            Traceback {
                source_name: self.source_name.clone(),
                span,
                related,
            },
            message,
        )
    }

    fn resolve_node(&mut self, id: NodeId) -> Result<Value, Error> {
        let kind = self.ast.get(id).basetype();
        match kind {
            "scalar" => self.resolve_scalar(id),
            "list" => self.resolve_list(id),
            "dict" => self.resolve_dict(id),
            "alias" => self.resolve_alias(id),
            "root" => self.resolve_root(id),
            other => {
                let span = self.ast.get(id).span();
                Err(self.bug(span, format!("cannot resolve a {} node as a value", other)))
            }
        }
    }

    fn resolve_root(&mut self, id: NodeId) -> Result<Value, Error> {
        let child = match self.ast.get(id) {
            Node::Root(r) => r.child,
            other => return Err(self.bug(other.span(), "expected a Root node")),
        };
        match child {
            Some(child) => self.resolve_node(child),
            None => Ok(Value::None),
        }
    }

    /// Reads a node's tag (if any) into owned data, and checks it against
    /// the node's own structural basetype (§3 "Tag" compatibility set).
    fn tag_info(&self, tag_id: NodeId, basetype: &'static str, owner_span: Span) -> Result<TagNode, Error> {
        let tag = match self.ast.get(tag_id) {
            Node::Tag(t) => t.clone(),
            other => return Err(self.bug(other.span(), "tag slot does not point at a Tag node")),
        };
        if !tag.allowed_basetypes().contains(&basetype) {
            return Err(self.err(
                owner_span,
                vec![(RelatedKind::Tag, tag.span)],
                format!("tag is not compatible with a {} value", basetype),
            ));
        }
        Ok(tag)
    }

    fn resolve_scalar(&mut self, id: NodeId) -> Result<Value, Error> {
        let node = match self.ast.get(id).clone() {
            Node::Scalar(s) => s,
            other => return Err(self.bug(other.span(), "expected a Scalar node")),
        };
        if node.resolved {
            return Ok(node.final_value.clone().unwrap());
        }

        let tag = match node.tag {
            Some(tag_id) => Some(self.tag_info(tag_id, "scalar", node.span)?),
            None => None,
        };

        let mut value = match tag.as_ref().and_then(|t| t.type_name.as_deref()) {
            Some(type_name) => self.apply_scalar_type(type_name, &node.raw, node.span, &tag.as_ref().unwrap().span)?,
            None => self.implicit_value(node.implicit_type, &node.raw, node.span)?,
        };

        // A pipe block's lines are joined without a trailing newline; the
        // `/`/`//` suffix marker (recorded as `trailing_newline`) decides
        // whether one belongs at the end. Triple-quoted blocks carry their
        // newlines literally in `raw` already and don't need this.
        if let (Delim::Pipe { .. }, TrailingNewline::Keep, Value::Str(s)) = (node.delim, node.trailing_newline, &mut value) {
            s.push('\n');
        }

        if !self.config.integers {
            if let Value::Int(n) = &value {
                value = Value::Float(*n as f64);
            }
        }

        if let Some(newline) = tag.as_ref().and_then(|t| t.newline.as_deref()) {
            if let Value::Str(_) = &value {
                let replaced = escape::unescape_unicode(
                    &node.raw,
                    &self.source_name,
                    Some(escape::NewlineReplacement {
                        newline,
                        indent: &node.continuation_indent,
                    }),
                    self.unescape_opts,
                )?;
                value = Value::Str(replaced);
            }
        }

        if let Node::Scalar(s) = self.ast.get_mut(id) {
            s.resolved = true;
            s.final_value = Some(value.clone());
        }
        Ok(value)
    }

    fn apply_scalar_type(&self, type_name: &str, raw: &str, span: Span, tag_span: &Span) -> Result<Value, Error> {
        let desc = self.registry.get(type_name).ok_or_else(|| {
            self.err(
                span,
                vec![(RelatedKind::Tag, *tag_span)],
                format!("unknown type \"{}\"", type_name),
            )
        })?;
        if desc.basetype != BaseType::Scalar {
            return Err(self.err(
                span,
                vec![(RelatedKind::Tag, *tag_span)],
                format!("type \"{}\" is not a scalar type", type_name),
            ));
        }
        if desc.extended && !self.config.extended_types {
            return Err(self.err(
                span,
                vec![(RelatedKind::Tag, *tag_span)],
                format!("extended type \"{}\" used but extended_types is disabled", type_name),
            ));
        }
        (desc.parser)(raw).map_err(|e| match e {
            Error::Parse { message, .. } => self.err(span, vec![(RelatedKind::Tag, *tag_span)], message),
            other => other,
        })
    }

    fn implicit_value(&self, implicit_type: crate::ast::ImplicitType, raw: &str, span: Span) -> Result<Value, Error> {
        use crate::ast::ImplicitType as T;
        let name = match implicit_type {
            T::None => "none",
            T::Bool => "bool",
            T::Int => "int",
            T::Float => "float",
            T::Str | T::Key => "str",
        };
        (self.registry.get(name).unwrap().parser)(raw).map_err(|e| match e {
            Error::Parse { message, .. } => self.err(span, vec![], message),
            other => other,
        })
    }

    /// Validates a tag's explicit `type=` against a collection's actual
    /// structural shape (§4.3 "Built-ins"/"Extended").
    fn validate_collection_type(&self, type_name: &str, basetype: BaseType, span: Span, tag_span: Span) -> Result<(), Error> {
        let desc = self.registry.get(type_name).ok_or_else(|| {
            self.err(span, vec![(RelatedKind::Tag, tag_span)], format!("unknown type \"{}\"", type_name))
        })?;
        if desc.basetype != basetype {
            return Err(self.err(
                span,
                vec![(RelatedKind::Tag, tag_span)],
                format!("type \"{}\" does not match this collection's shape", type_name),
            ));
        }
        if desc.extended && !self.config.extended_types {
            return Err(self.err(
                span,
                vec![(RelatedKind::Tag, tag_span)],
                format!("extended type \"{}\" used but extended_types is disabled", type_name),
            ));
        }
        Ok(())
    }

    fn resolve_list(&mut self, id: NodeId) -> Result<Value, Error> {
        let node = match self.ast.get(id).clone() {
            Node::List(l) => l,
            other => return Err(self.bug(other.span(), "expected a List node")),
        };
        if node.resolved {
            return Ok(node.final_value.clone().unwrap());
        }
        if let Some(existing) = node.final_value.clone() {
            return self.reentrant_collection(existing, node.span);
        }

        let handle: ListHandle = Rc::new(RefCell::new(Vec::new()));
        let placeholder = Value::List(handle.clone());
        if let Node::List(l) = self.ast.get_mut(id) {
            l.final_value = Some(placeholder.clone());
        }

        let (type_name, construct) = match node.tag {
            Some(tag_id) => {
                let tag = self.tag_info(tag_id, "list", node.span)?;
                if let Some(ref type_name) = tag.type_name {
                    self.validate_collection_type(type_name, BaseType::List, node.span, tag.span)?;
                }
                (tag.type_name, tag.construct)
            }
            None => (None, None),
        };
        self.check_construct_keyword(construct, node.span)?;

        let mut items = Vec::with_capacity(node.children.len());
        for child in &node.children {
            items.push(self.resolve_node(*child)?);
        }
        if type_name.as_deref() == Some("set") {
            let mut deduped: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                if !deduped.iter().any(|existing| existing == &item) {
                    deduped.push(item);
                }
            }
            items = deduped;
        }
        *handle.borrow_mut() = items;

        if let Node::List(l) = self.ast.get_mut(id) {
            l.resolved = true;
        }
        Ok(placeholder)
    }

    fn resolve_dict(&mut self, id: NodeId) -> Result<Value, Error> {
        let node = match self.ast.get(id).clone() {
            Node::Dict(d) => d,
            other => return Err(self.bug(other.span(), "expected a Dict node")),
        };
        if node.resolved {
            return Ok(node.final_value.clone().unwrap());
        }
        if let Some(existing) = node.final_value.clone() {
            return self.reentrant_collection(existing, node.span);
        }

        let handle: DictHandle = Rc::new(RefCell::new(IndexMap::new()));
        let placeholder = Value::Dict(handle.clone());
        if let Node::Dict(d) = self.ast.get_mut(id) {
            d.final_value = Some(placeholder.clone());
        }

        let construct = match node.tag {
            Some(tag_id) => {
                let tag = self.tag_info(tag_id, "dict", node.span)?;
                if let Some(ref type_name) = tag.type_name {
                    self.validate_collection_type(type_name, BaseType::Dict, node.span, tag.span)?;
                }
                tag.construct
            }
            None => None,
        };
        self.check_construct_keyword(construct, node.span)?;

        let mut map: IndexMap<Value, Value> = IndexMap::new();
        let mut key_spans: HashMap<Value, Span> = HashMap::new();
        for (key_id, val_id) in &node.entries {
            let key_span = self.ast.get(*key_id).span();
            let key_value = self.resolve_node(*key_id)?;
            let val_value = self.resolve_node(*val_id)?;
            if let Some(first_span) = key_spans.get(&key_value) {
                return Err(self.err(
                    key_span,
                    vec![(RelatedKind::ScalarObject, *first_span)],
                    "duplicate key: two entries resolve to the same key value",
                ));
            }
            key_spans.insert(key_value.clone(), key_span);
            map.insert(key_value, val_value);
        }
        *handle.borrow_mut() = map;

        if let Node::Dict(d) = self.ast.get_mut(id) {
            d.resolved = true;
        }
        Ok(placeholder)
    }

    /// Handles a re-entrant visit to a List/Dict that is still mid-resolution
    /// (its `final_value` slot was filled in before resolving children, but
    /// `resolved` is still false) — the grey/black cycle check from §4.6,
    /// collapsed into the `final_value` slot itself rather than a separate
    /// visited-set, since the slot already carries exactly the information
    /// ("has this node started resolving") the check needs.
    fn reentrant_collection(&self, existing: Value, span: Span) -> Result<Value, Error> {
        if self.config.circular_references {
            Ok(existing)
        } else {
            Err(self.err(
                span,
                vec![],
                "circular alias/copy reference detected but circular_references is disabled",
            ))
        }
    }

    fn resolve_alias(&mut self, id: NodeId) -> Result<Value, Error> {
        let node = match self.ast.get(id).clone() {
            Node::Alias(a) => a,
            other => return Err(self.bug(other.span(), "expected an Alias node")),
        };
        if !self.config.aliases {
            return Err(self.err(node.span, vec![], format!("alias \"${}\" used but aliases are disabled", node.label)));
        }
        let target = self.ast.labels.get(&node.label).map(|e| e.node).ok_or_else(|| {
            self.err(node.span, vec![], format!("undefined label \"{}\"", node.label))
        })?;
        let value = self.resolve_node(target)?;
        Ok(match node.copy {
            None => value,
            Some(CopyDepth::Shallow) => shallow_copy(&value),
            Some(CopyDepth::Deep) => {
                let mut seen = HashMap::new();
                deep_copy(&value, &mut seen)
            }
        })
    }

    /// Applies a tag's collection-construction keyword (`init`/`deepinit`/
    /// `default`/`deepdefault`/`recmerge`/`deeprecmerge`, §3 Tag, §4.6 pass
    /// 1). A collection is resolved exactly once per node here (there is no
    /// facility in this resolver for re-assigning the same key path and
    /// threading a prior value through), so `init`/`deepinit`/`default`/
    /// `deepdefault` — "use this value only if nothing is there yet" /
    /// "use this value as the default" — are indistinguishable from a plain
    /// assignment in a single-assignment resolver and materialize as the
    /// node's own children, same as an untagged collection. `recmerge`/
    /// `deeprecmerge` name an operation this resolver genuinely cannot
    /// perform (merging into a prior value that does not exist here), so
    /// rather than silently treating them as a plain assignment too, they
    /// are rejected with an explicit error.
    fn check_construct_keyword(&self, construct: Option<CollectionConstruct>, span: Span) -> Result<(), Error> {
        match construct {
            None
            | Some(CollectionConstruct::Init)
            | Some(CollectionConstruct::DeepInit)
            | Some(CollectionConstruct::Default)
            | Some(CollectionConstruct::DeepDefault) => Ok(()),
            Some(CollectionConstruct::RecMerge) | Some(CollectionConstruct::DeepRecMerge) => Err(self.err(
                span,
                vec![],
                "recmerge/deeprecmerge require merging into a value already assigned at this key path, which this resolver does not support",
            )),
        }
    }
}

fn shallow_copy(v: &Value) -> Value {
    match v {
        Value::List(h) => Value::new_list(h.borrow().clone()),
        Value::Dict(h) => Value::new_dict(h.borrow().clone()),
        other => other.clone(),
    }
}

fn deep_copy(v: &Value, seen: &mut HashMap<usize, Value>) -> Value {
    match v {
        Value::List(h) => {
            let key = Rc::as_ptr(h) as usize;
            if let Some(existing) = seen.get(&key) {
                return existing.clone();
            }
            let new_handle: ListHandle = Rc::new(RefCell::new(Vec::new()));
            let placeholder = Value::List(new_handle.clone());
            seen.insert(key, placeholder.clone());
            let items: Vec<Value> = h.borrow().iter().map(|item| deep_copy(item, seen)).collect();
            *new_handle.borrow_mut() = items;
            placeholder
        }
        Value::Dict(h) => {
            let key = Rc::as_ptr(h) as usize;
            if let Some(existing) = seen.get(&key) {
                return existing.clone();
            }
            let new_handle: DictHandle = Rc::new(RefCell::new(IndexMap::new()));
            let placeholder = Value::Dict(new_handle.clone());
            seen.insert(key, placeholder.clone());
            let entries: IndexMap<Value, Value> = h
                .borrow()
                .iter()
                .map(|(k, v)| (deep_copy(k, seen), deep_copy(v, seen)))
                .collect();
            *new_handle.borrow_mut() = entries;
            placeholder
        }
        other => other.clone(),
    }
}
