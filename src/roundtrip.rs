//! Round-trip editor (C8): loads an AST with full source-span retention,
//! applies targeted `replace_val`/`replace_key` edits, and splices only the
//! changed spans back into the original text, per `spec.md` §4.8.
//!
//! Path navigation and base-type checks stay at the AST layer rather than
//! running a full [`crate::resolver`] pass: a round-trip edit only ever
//! needs to identify one target node and re-encode one replacement value,
//! not materialize the whole document, and re-resolving on every edit would
//! also defeat the "only the target span changes" minimality contract.

use crate::ast::{Ast, Delim, Node, NodeId, ScalarNode};
use crate::config::{DecoderConfig, EncoderConfig};
use crate::encoder;
use crate::error::{Error, Span, Traceback};
use crate::grammar;
use crate::parser;
use crate::value::Value;
use std::collections::HashMap;

/// One segment of a path into a resolved document: a dict key or a list
/// index, per `spec.md` §6 "Round-trip surface".
#[derive(Debug, Clone, PartialEq)]
pub enum PathElement {
    Key(Value),
    Index(usize),
}

fn err(message: impl Into<String>) -> Error {
    Error::parse(
        Traceback {
            source_name: "<roundtrip>".to_string(),
            span: Span::default(),
            related: vec![],
        },
        message,
    )
}

fn compute_line_starts(chars: &[char]) -> HashMap<u32, usize> {
    let mut map = HashMap::new();
    map.insert(1u32, 0usize);
    let mut line = 1u32;
    for (i, &c) in chars.iter().enumerate() {
        if grammar::is_line_terminator(c) {
            line += 1;
            map.insert(line, i + 1);
        }
    }
    map
}

fn offset_of(line_starts: &HashMap<u32, usize>, line: u32, col: u32) -> usize {
    line_starts.get(&line).copied().unwrap_or(0) + (col as usize).saturating_sub(1)
}

/// An AST loaded for round-trip editing, plus the original text it was
/// parsed from and any pending edits.
pub struct RoundtripAst {
    chars: Vec<char>,
    line_starts: HashMap<u32, usize>,
    ast: Ast,
    root: NodeId,
    encoder_config: EncoderConfig,
    /// Pending edits keyed by the target node, so replacing the same node
    /// twice overwrites rather than stacking overlapping splices.
    edits: HashMap<NodeId, (usize, usize, String)>,
}

/// Parses `text` with default decoder options, retaining spans for editing.
pub fn load_roundtrip_ast(text: &str) -> Result<RoundtripAst, Error> {
    load_roundtrip_ast_with(text, "<roundtrip>", &DecoderConfig::default())
}

pub fn load_roundtrip_ast_with(text: &str, source_name: &str, config: &DecoderConfig) -> Result<RoundtripAst, Error> {
    config.validate()?;
    let parsed = parser::parse(text, source_name, config)?;
    let stripped = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let chars: Vec<char> = stripped.chars().collect();
    let line_starts = compute_line_starts(&chars);
    let root = match parsed.ast.get(parsed.source) {
        Node::Source(s) => s.root,
        other => return Err(err(format!("expected a Source node, found a {} node", other.basetype()))),
    };
    Ok(RoundtripAst {
        chars,
        line_starts,
        ast: parsed.ast,
        root,
        encoder_config: EncoderConfig::default(),
        edits: HashMap::new(),
    })
}

impl RoundtripAst {
    /// Read-only access to the underlying AST, e.g. for inspecting tags or
    /// labels without going through a path.
    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn set_encoder_config(&mut self, config: EncoderConfig) {
        self.encoder_config = config;
    }

    /// Replaces the value at `path`. Refuses if the target is tagged, if
    /// the replacement changes base type, or if it would introduce a
    /// right-to-left shift of later tokens on the same line.
    pub fn replace_val(&mut self, path: &[PathElement], new_value: Value) -> Result<(), Error> {
        let target = self.navigate(path)?;
        self.apply_replacement(target, new_value)
    }

    /// Replaces the key at `path` (the path's last element selects the
    /// entry; the key node itself, not its value, is replaced).
    pub fn replace_key(&mut self, path: &[PathElement], new_key: Value) -> Result<(), Error> {
        let (parent, last) = self.navigate_parent(path)?;
        let key = match last {
            PathElement::Key(k) => k,
            PathElement::Index(_) => return Err(err("replace_key requires a dict-key path element, found a list index")),
        };
        let entries = match self.ast.get(parent) {
            Node::Dict(d) => d.entries.clone(),
            other => return Err(err(format!("path does not reach a dict (found a {} node)", other.basetype()))),
        };
        let key_id = entries
            .iter()
            .find(|(key_id, _)| scalar_match_value(&self.ast, *key_id) == k)
            .map(|(key_id, _)| *key_id)
            .ok_or_else(|| err("no entry matches the given key"))?;
        self.apply_replacement(key_id, new_key)
    }

    /// Splices all pending edits into the original source, in source order;
    /// unaffected bytes pass through verbatim.
    pub fn dumps(&self) -> String {
        let mut edits: Vec<&(usize, usize, String)> = self.edits.values().collect();
        edits.sort_by_key(|(start, _, _)| *start);
        let mut out = String::with_capacity(self.chars.len());
        let mut cursor = 0usize;
        for (start, end, text) in edits {
            if *start < cursor {
                continue; // overlapping edit; first-in-source-order wins.
            }
            out.extend(&self.chars[cursor..*start]);
            out.push_str(text);
            cursor = *end;
        }
        out.extend(&self.chars[cursor..]);
        out
    }

    fn navigate(&self, path: &[PathElement]) -> Result<NodeId, Error> {
        let mut current = match self.ast.get(self.root) {
            Node::Root(r) => r.child.ok_or_else(|| err("document is empty"))?,
            other => return Err(err(format!("expected a Root node, found a {} node", other.basetype()))),
        };
        for elem in path {
            current = self.step(current, elem)?;
        }
        Ok(current)
    }

    /// Navigates every path element except the last, returning the
    /// resulting container node and the unconsumed final element.
    fn navigate_parent(&self, path: &[PathElement]) -> Result<(NodeId, PathElement), Error> {
        let Some((last, rest)) = path.split_last() else {
            return Err(err("path must have at least one element"));
        };
        let mut current = match self.ast.get(self.root) {
            Node::Root(r) => r.child.ok_or_else(|| err("document is empty"))?,
            other => return Err(err(format!("expected a Root node, found a {} node", other.basetype()))),
        };
        for elem in rest {
            current = self.step(current, elem)?;
        }
        Ok((current, last.clone()))
    }

    fn step(&self, id: NodeId, elem: &PathElement) -> Result<NodeId, Error> {
        match (self.ast.get(id), elem) {
            (Node::Dict(d), PathElement::Key(k)) => d
                .entries
                .iter()
                .find(|(key_id, _)| scalar_match_value(&self.ast, *key_id) == *k)
                .map(|(_, val_id)| *val_id)
                .ok_or_else(|| err("no entry matches the given key")),
            (Node::List(l), PathElement::Index(i)) => {
                l.children.get(*i).copied().ok_or_else(|| err("list index out of range"))
            }
            (Node::Dict(_), PathElement::Index(_)) => Err(err("expected a dict key, found a list index")),
            (Node::List(_), PathElement::Key(_)) => Err(err("expected a list index, found a dict key")),
            (other, _) => Err(err(format!("cannot index into a {} node", other.basetype()))),
        }
    }

    fn apply_replacement(&mut self, node_id: NodeId, new_value: Value) -> Result<(), Error> {
        let node = self.ast.get(node_id).clone();
        if node.tag().is_some() {
            return Err(err("target node is tagged; tagged nodes may carry semantics beyond their scalar text, so replacement is refused"));
        }
        check_base_type(&node, &new_value)?;

        let span = node.span();
        let start = offset_of(&self.line_starts, span.first_line, span.first_col);
        let end = offset_of(&self.line_starts, span.last_line, span.last_col);
        let replacement = encode_replacement(&self.ast, node_id, &new_value, &self.encoder_config)?;

        let had_rtl = self.chars[start.min(self.chars.len())..end.min(self.chars.len())]
            .iter()
            .any(|&c| grammar::is_bidi_r_or_al(c));
        let introduces_rtl = !had_rtl && replacement.chars().any(grammar::is_bidi_r_or_al);
        if introduces_rtl {
            let line_end = self.line_starts.get(&(span.last_line + 1)).copied().unwrap_or(self.chars.len());
            let shifts_following = self.chars[end.min(self.chars.len())..line_end.min(self.chars.len())]
                .iter()
                .any(|&c| !grammar::is_line_terminator(c));
            if shifts_following {
                return Err(err(
                    "replacement introduces right-to-left content that would shift following tokens on this line",
                ));
            }
        }

        self.edits.insert(node_id, (start, end, replacement));
        Ok(())
    }
}

fn scalar_kind(node: &ScalarNode) -> &'static str {
    use crate::ast::ImplicitType as T;
    match node.implicit_type {
        T::None => "none",
        T::Bool => "bool",
        T::Int => "int",
        T::Float => "float",
        T::Str | T::Key => "str",
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::None => "none",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Str(_) => "str",
        Value::Bytes(_) => "bytes",
        Value::List(_) => "list",
        Value::Dict(_) => "dict",
        Value::Complex(_, _) => "complex",
        Value::Rational(_, _) => "rational",
    }
}

fn check_base_type(node: &Node, new_value: &Value) -> Result<(), Error> {
    match node {
        Node::List(_) => {
            if matches!(new_value, Value::List(_)) {
                Ok(())
            } else {
                Err(err("replacement must stay a list"))
            }
        }
        Node::Dict(_) => {
            if matches!(new_value, Value::Dict(_)) {
                Ok(())
            } else {
                Err(err("replacement must stay a dict"))
            }
        }
        Node::Scalar(s) => {
            let expected = scalar_kind(s);
            let actual = value_kind(new_value);
            if expected == actual {
                Ok(())
            } else {
                Err(err(format!("replacement changes scalar type from {} to {}", expected, actual)))
            }
        }
        other => Err(err(format!("a {} node is not a replaceable target", other.basetype()))),
    }
}

/// A best-effort scalar value for path matching: the implicit-type
/// conversion a plain (untagged) key would get from the resolver, without
/// running the full resolver pass. Round-trip path matching against a
/// tagged or extended-typed key is out of scope; such keys simply never
/// match any `PathElement::Key`.
fn scalar_match_value(ast: &Ast, id: NodeId) -> Value {
    let node = match ast.get(id) {
        Node::Scalar(s) => s,
        _ => return Value::None,
    };
    use crate::ast::ImplicitType as T;
    match node.implicit_type {
        T::None => Value::None,
        T::Bool => Value::Bool(node.raw == "true"),
        T::Int => node.raw.replace('_', "").parse::<i64>().map(Value::Int).unwrap_or(Value::Str(node.raw.clone())),
        T::Float => node.raw.replace('_', "").parse::<f64>().map(Value::Float).unwrap_or(Value::Str(node.raw.clone())),
        T::Str | T::Key => Value::Str(node.raw.clone()),
    }
}

/// Encodes `new_value` honoring the target node's recorded delimiter style,
/// block flag, numeric base, and continuation indent where that's still a
/// safe fit for the new content; otherwise falls back to the encoder's own
/// delimiter selection (`spec.md` §4.8).
fn encode_replacement(ast: &Ast, node_id: NodeId, new_value: &Value, config: &EncoderConfig) -> Result<String, Error> {
    let node = match ast.get(node_id) {
        Node::Scalar(s) => s,
        _ => return encoder::encode_element(new_value, "", config),
    };
    match new_value {
        Value::Str(s) => {
            if let Delim::Quote { ch, count } = node.delim {
                if let Some(text) = reuse_quote(s, ch, count, &node.continuation_indent) {
                    return Ok(text);
                }
            }
            encoder::encode_element(new_value, &node.continuation_indent, config)
        }
        Value::Int(n) if node.num_base != 10 && node.implicit_type == crate::ast::ImplicitType::Int => {
            Ok(format_int_base(*n, node.num_base))
        }
        _ => encoder::encode_element(new_value, &node.continuation_indent, config),
    }
}

fn reuse_quote(s: &str, ch: char, count: u16, continuation_indent: &str) -> Option<String> {
    if s.chars().any(grammar::is_invalid_literal) {
        return None;
    }
    let run: String = std::iter::repeat(ch).take(count as usize).collect();
    if count <= 1 {
        if s.contains(ch) || s.chars().any(grammar::is_line_terminator) {
            return None;
        }
        Some(format!("{0}{1}{0}", run, s))
    } else {
        if s.contains(&run) {
            return None;
        }
        Some(format!("{0}\n{1}{2}\n{1}{0}", run, continuation_indent, s))
    }
}

fn format_int_base(n: i64, base: u8) -> String {
    let (prefix, neg, mag) = (
        match base {
            16 => "0x",
            8 => "0o",
            2 => "0b",
            _ => "",
        },
        n < 0,
        n.unsigned_abs(),
    );
    let digits = match base {
        16 => format!("{:x}", mag),
        8 => format!("{:o}", mag),
        2 => format!("{:b}", mag),
        _ => format!("{}", mag),
    };
    format!("{}{}{}", if neg { "-" } else { "" }, prefix, digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_a_scalar_value_in_place() {
        let mut rt = load_roundtrip_ast("a = 1\nb = 2\n").unwrap();
        rt.replace_val(&[PathElement::Key(Value::Str("a".to_string()))], Value::Int(42)).unwrap();
        assert_eq!(rt.dumps(), "a = 42\nb = 2\n");
    }

    #[test]
    fn refuses_to_change_scalar_base_type() {
        let mut rt = load_roundtrip_ast("a = 1\n").unwrap();
        let result = rt.replace_val(&[PathElement::Key(Value::Str("a".to_string()))], Value::Str("x".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn replaces_a_nested_list_element() {
        let mut rt = load_roundtrip_ast("a = [1, 2, 3]\n").unwrap();
        rt.replace_val(
            &[PathElement::Key(Value::Str("a".to_string())), PathElement::Index(1)],
            Value::Int(99),
        )
        .unwrap();
        assert_eq!(rt.dumps(), "a = [1, 99, 3]\n");
    }

    #[test]
    fn refuses_to_replace_a_tagged_node() {
        let mut rt = load_roundtrip_ast("a = (type=int)>1\n").unwrap();
        let result = rt.replace_val(&[PathElement::Key(Value::Str("a".to_string()))], Value::Int(2));
        assert!(result.is_err());
    }
}
