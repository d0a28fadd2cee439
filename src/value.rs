//! The resolved value tree that a full [`crate::decode`] produces: the
//! output of the C6 resolver's value-materialization pass.

use indexmap::IndexMap;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared, mutable backing storage for a resolved list. `RefCell` (rather
/// than a plain `Rc<Vec<_>>`) lets the resolver hand out a handle to a
/// collection *before* its children are resolved, so that a `circular_references`
/// alias pointing back into an ancestor collection (§4.6, §9 "Cyclic
/// graphs") can share the same handle and see it filled in once the
/// cycle unwinds, instead of requiring the cycle to be acyclic-by-copy.
pub type ListHandle = Rc<RefCell<Vec<Value>>>;
pub type DictHandle = Rc<RefCell<IndexMap<Value, Value>>>;

/// A fully resolved BespON value. Collections use `Rc` so that alias
/// targets (§3 "Relationships and ownership") can share the same backing
/// collection rather than being deep-copied.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(#[serde(serialize_with = "serialize_bytes_as_base16")] Vec<u8>),
    List(ListHandle),
    Dict(DictHandle),
    /// Extended `complex` type (`original_source/bespon/load_types.py`'s
    /// `EXTENDED_TYPES['complex']`, built on Python's `complex`): real and
    /// imaginary parts.
    Complex(f64, f64),
    /// Extended `rational` type (grounded on the same module's
    /// `fractions.Fraction` parser): numerator and denominator, always
    /// stored in lowest terms with a positive denominator.
    Rational(i64, i64),
}

fn serialize_bytes_as_base16<S: serde::Serializer>(b: &[u8], s: S) -> Result<S::Ok, S::Error> {
    let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
    s.serialize_str(&hex)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            // Pointer equality is checked first both as an identity
            // shortcut and to terminate recursion through genuine cycles
            // (a cyclic value always revisits the exact same `Rc`).
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Complex(ar, ai), Value::Complex(br, bi)) => ar.to_bits() == br.to_bits() && ai.to_bits() == bi.to_bits(),
            (Value::Rational(an, ad), Value::Rational(bn, bd)) => an == bn && ad == bd,
            _ => false,
        }
    }
}
impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::None => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            // Lists/dicts are not meant to be used as dict keys in
            // practice (the parser never produces them as such, since
            // `spec.md` §3 requires Scalar keys), but implement something
            // sane rather than panicking.
            Value::List(l) => (Rc::as_ptr(l) as usize).hash(state),
            Value::Dict(d) => (Rc::as_ptr(d) as usize).hash(state),
            Value::Complex(re, im) => {
                re.to_bits().hash(state);
                im.to_bits().hash(state);
            }
            Value::Rational(n, d) => {
                n.hash(state);
                d.hash(state);
            }
        }
    }
}

impl Value {
    pub fn new_list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn new_dict(entries: IndexMap<Value, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn basetype(&self) -> &'static str {
        match self {
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            _ => "scalar",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list_handle(&self) -> Option<&ListHandle> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict_handle(&self) -> Option<&DictHandle> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Same identity as `other`, for alias-materialization law S4/invariant 5
    /// ("y is x" when aliasing is enabled): pointer-equal backing storage
    /// for collections, ordinary equality for scalars.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}
