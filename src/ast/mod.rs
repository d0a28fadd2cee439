//! AST model (C5): node variants with indentation, tag, and lifecycle
//! invariants, per `spec.md` §3/§4.5.
//!
//! The tree is a tagged sum type (`Node`) held in a flat arena (`Ast`)
//! indexed by [`NodeId`], per the Design Note in `spec.md` §9: "model the
//! AST as a tagged sum type ... append-rules are an operation table ...
//! not method overriding." Arena indices double as the stable identity
//! that the label table (§4.6) and the round-trip editor (§4.8) need.

pub mod append;

use crate::error::Span;
use crate::value::Value;
use indexmap::IndexMap;
use std::rc::Rc;

/// Stable index into an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A scalar's quoting/delimiter style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delim {
    /// Unquoted.
    None,
    /// `'...'`, `"..."`, or `` `...` ``, with a repeat count of 1, 3, or a
    /// multiple of 3 greater than 3.
    Quote { ch: char, count: u16 },
    /// `|===...===|/` pipe-delimited block string.
    Pipe { marker_len: u16 },
}

/// How a string scalar's trailing content/newline is controlled, from the
/// block-suffix markers (`/` keep trailing newline, `//` strip it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingNewline {
    #[default]
    Keep,
    Strip,
}

/// The parser's best guess at a scalar's implicit type, before the
/// resolver applies any explicit tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplicitType {
    None,
    Bool,
    Int,
    Float,
    Str,
    Key,
}

#[derive(Debug, Clone)]
pub struct ScalarNode {
    pub span: Span,
    pub external_indent: String,
    pub raw: String,
    pub delim: Delim,
    pub block: bool,
    pub implicit_type: ImplicitType,
    /// Numeric base (2/8/10/16), meaningful only when `implicit_type` is
    /// `Int`/`Float`.
    pub num_base: u8,
    pub continuation_indent: String,
    pub trailing_newline: TrailingNewline,
    pub tag: Option<NodeId>,
    pub doc_comment: Option<String>,
    pub parent: Option<NodeId>,
    pub resolved: bool,
    pub final_value: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ListNode {
    pub span: Span,
    pub external_indent: String,
    pub children: Vec<NodeId>,
    pub inline: bool,
    pub indent: String,
    pub internal_indent_first: Option<String>,
    pub internal_indent_subsequent: Option<String>,
    pub open: bool,
    pub unresolved_dependency_count: u32,
    pub key_path_parent: Option<NodeId>,
    pub key_path_traversable: bool,
    pub section: Option<NodeId>,
    pub tag: Option<NodeId>,
    pub doc_comment: Option<String>,
    pub parent: Option<NodeId>,
    pub resolved: bool,
    pub final_value: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct DictNode {
    pub span: Span,
    pub external_indent: String,
    /// Insertion-ordered key -> value child node pairs. Keys are scalar
    /// node ids (so duplicate-key equality can compare final values).
    pub entries: Vec<(NodeId, NodeId)>,
    pub inline: bool,
    pub indent: String,
    pub internal_indent_first: Option<String>,
    pub internal_indent_subsequent: Option<String>,
    pub open: bool,
    pub awaiting_val: bool,
    pub next_key: Option<NodeId>,
    pub unresolved_dependency_count: u32,
    pub key_path_parent: Option<NodeId>,
    pub key_path_traversable: bool,
    pub section: Option<NodeId>,
    pub tag: Option<NodeId>,
    pub doc_comment: Option<String>,
    pub parent: Option<NodeId>,
    pub resolved: bool,
    pub final_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionConstruct {
    Init,
    DeepInit,
    Default,
    DeepDefault,
    RecMerge,
    DeepRecMerge,
}

#[derive(Debug, Clone, Default)]
pub struct TagNode {
    pub span: Span,
    pub type_name: Option<String>,
    pub label: Option<String>,
    pub newline: Option<String>,
    pub construct: Option<CollectionConstruct>,
    /// Any other keyword arguments in source order, preserved for
    /// round-tripping and extended-type validation.
    pub extra: Vec<(String, Value)>,
    pub parent: Option<NodeId>,
}

impl TagNode {
    /// Compatibility set of allowed target base types, narrowing as
    /// keywords are added (§3 Tag entity).
    pub fn allowed_basetypes(&self) -> &'static [&'static str] {
        if self.newline.is_some() {
            &["scalar"]
        } else if self.construct.is_some() {
            &["dict", "list"]
        } else {
            &["scalar", "list", "dict"]
        }
    }
}

#[derive(Debug, Clone)]
pub enum KeyPathElement {
    Key(String),
    ListOpen,
}

#[derive(Debug, Clone)]
pub struct KeyPathNode {
    pub span: Span,
    pub elements: Vec<KeyPathElement>,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct SectionNode {
    pub span: Span,
    pub path: NodeId, // KeyPathNode
    pub parent: Option<NodeId>,
}

/// A `$name` reference to a labeled node (§3 "Relationships and
/// ownership"). Not one of `spec.md`'s named entities, but required as a
/// concrete pre-resolution placeholder for what §4.6 describes as "An
/// `alias` node is replaced by a reference to the labeled node".
#[derive(Debug, Clone)]
pub struct AliasNode {
    pub span: Span,
    pub label: String,
    /// Set when the alias is tagged with a `copy`/`deepcopy` keyword
    /// (§4.6, §9 Design Notes: Keypath "with a tag to represent alias,
    /// copy, and deepcopy"); `None` means a shared reference.
    pub copy: Option<CopyDepth>,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDepth {
    Shallow,
    Deep,
}

#[derive(Debug, Clone)]
pub struct RootNode {
    pub span: Span,
    pub child: Option<NodeId>,
    pub tag: Option<NodeId>,
    pub resolved: bool,
}

#[derive(Debug, Clone)]
pub struct SourceNode {
    pub span: Span,
    pub source_name: String,
    pub initial_indent: String,
    pub initial_nesting_depth: u32,
    pub root: NodeId,
}

#[derive(Debug, Clone)]
pub enum Node {
    Source(SourceNode),
    Root(RootNode),
    Scalar(ScalarNode),
    List(ListNode),
    Dict(DictNode),
    Tag(TagNode),
    KeyPath(KeyPathNode),
    Section(SectionNode),
    Alias(AliasNode),
}

impl Node {
    pub fn basetype(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::List(_) => "list",
            Node::Dict(_) => "dict",
            Node::Tag(_) => "tag",
            Node::KeyPath(_) => "key_path",
            Node::Section(_) => "section",
            Node::Root(_) => "root",
            Node::Source(_) => "source",
            Node::Alias(_) => "alias",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Source(n) => n.span,
            Node::Root(n) => n.span,
            Node::Scalar(n) => n.span,
            Node::List(n) => n.span,
            Node::Dict(n) => n.span,
            Node::Tag(n) => n.span,
            Node::KeyPath(n) => n.span,
            Node::Section(n) => n.span,
            Node::Alias(n) => n.span,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Source(_) => None,
            Node::Root(_) => None,
            Node::Scalar(n) => n.parent,
            Node::List(n) => n.parent,
            Node::Dict(n) => n.parent,
            Node::Tag(n) => n.parent,
            Node::KeyPath(n) => n.parent,
            Node::Section(n) => n.parent,
            Node::Alias(n) => n.parent,
        }
    }

    pub fn tag(&self) -> Option<NodeId> {
        match self {
            Node::Scalar(n) => n.tag,
            Node::List(n) => n.tag,
            Node::Dict(n) => n.tag,
            Node::Root(n) => n.tag,
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Node::Scalar(n) => n.resolved,
            Node::List(n) => n.resolved,
            Node::Dict(n) => n.resolved,
            Node::Root(n) => n.resolved,
            Node::Alias(_) => false,
            _ => true,
        }
    }

    pub fn final_value(&self) -> Option<&Value> {
        match self {
            Node::Scalar(n) => n.final_value.as_ref(),
            Node::List(n) => n.final_value.as_ref(),
            Node::Dict(n) => n.final_value.as_ref(),
            _ => None,
        }
    }
}

/// A label table entry: the labeled node plus whether it has been used by
/// an alias (used only for diagnostics).
#[derive(Debug, Clone)]
pub struct LabelEntry {
    pub node: NodeId,
}

/// Owns every node produced by a parse, plus the label table aliases
/// resolve against (§4.6).
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    pub labels: IndexMap<String, LabelEntry>,
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            labels: IndexMap::new(),
        }
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Shared handle to a completed parse's arena, cheap to clone for callers
/// that hold onto both the AST and a resolved [`Value`] tree built from it.
pub type SharedAst = Rc<Ast>;
