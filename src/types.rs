//! Type registry (C3): describes built-in and extended data types, their
//! base category, mutability, and value parsers.

use crate::error::Error;
use crate::value::Value;
use std::collections::HashMap;

/// Structural base type, independent of explicit tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Scalar,
    List,
    Dict,
}

/// A parser from a scalar's raw textual form to a resolved [`Value`].
pub type ScalarParser = fn(&str) -> Result<Value, Error>;

#[derive(Clone)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub basetype: BaseType,
    pub mutable: bool,
    /// Only meaningful for scalar types: whether the raw form is
    /// restricted to the ASCII-bytes subset (`bytes`, `base16`, `base64`).
    pub ascii_bytes: bool,
    /// Only meaningful for scalar types: whether this type applies only
    /// to unquoted strings matching the numeric regex.
    pub number: bool,
    /// Whether a node's explicit type may be set to this type via a tag
    /// at all (`false` only valid for scalar types, e.g. some extended
    /// numeric subtypes that must always appear quoted).
    pub typeable: bool,
    pub parser: ScalarParser,
    /// True for the five types in `spec.md` §4.3's "Extended" list
    /// (`complex`, `rational`, `odict`, `set`, `tuple`); a tag naming one
    /// of these is only honored when `DecoderConfig::extended_types` is set.
    pub extended: bool,
}

fn parse_none(_s: &str) -> Result<Value, Error> {
    Ok(Value::None)
}

fn parse_bool(s: &str) -> Result<Value, Error> {
    match s {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => Err(Error::parse(
            crate::error::Traceback {
                source_name: String::new(),
                span: Default::default(),
                related: vec![],
            },
            format!("invalid bool literal \"{}\"", s),
        )),
    }
}

fn parse_str(s: &str) -> Result<Value, Error> {
    Ok(Value::Str(s.to_string()))
}

fn parse_int(s: &str) -> Result<Value, Error> {
    let (radix, body, neg) = strip_base_prefix(s);
    let cleaned: String = body.chars().filter(|&c| c != '_').collect();
    i64::from_str_radix(&cleaned, radix)
        .map(|v| Value::Int(if neg { -v } else { v }))
        .map_err(|e| {
            Error::parse(
                crate::error::Traceback {
                    source_name: String::new(),
                    span: Default::default(),
                    related: vec![],
                },
                format!("invalid int literal \"{}\": {}", s, e),
            )
        })
}

fn parse_float(s: &str) -> Result<Value, Error> {
    let cleaned: String = s.chars().filter(|&c| c != '_').collect();
    cleaned.parse::<f64>().map(Value::Float).map_err(|e| {
        Error::parse(
            crate::error::Traceback {
                source_name: String::new(),
                span: Default::default(),
                related: vec![],
            },
            format!("invalid float literal \"{}\": {}", s, e),
        )
    })
}

/// Splits off a `0x`/`0o`/`0b` base prefix (after an optional sign),
/// returning (radix, remaining digits, was-negative).
fn strip_base_prefix(s: &str) -> (u32, &str, bool) {
    let (neg, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if let Some(body) = rest.strip_prefix("0x") {
        (16, body, neg)
    } else if let Some(body) = rest.strip_prefix("0o") {
        (8, body, neg)
    } else if let Some(body) = rest.strip_prefix("0b") {
        (2, body, neg)
    } else {
        (10, rest, neg)
    }
}

fn parse_bytes(s: &str) -> Result<Value, Error> {
    // Raw scalar text is taken as Latin-1 bytes, one byte per code point
    // below U+100; higher code points are a configuration error for this
    // type (ascii_bytes = true).
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        if (c as u32) > 0xFF {
            return Err(Error::BinaryStringEncode {
                message: format!("code point U+{:04X} is outside the Latin-1 range", c as u32),
            });
        }
        out.push(c as u8);
    }
    Ok(Value::Bytes(out))
}

fn parse_base16(s: &str) -> Result<Value, Error> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        return Err(Error::BinaryBase16Decode {
            message: "odd number of hex digits".to_string(),
        });
    }
    let mut out = Vec::with_capacity(cleaned.len() / 2);
    let bytes = cleaned.as_bytes();
    for chunk in bytes.chunks(2) {
        let hex = std::str::from_utf8(chunk).unwrap();
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::BinaryBase16Decode { message: e.to_string() })?;
        out.push(byte);
    }
    Ok(Value::Bytes(out))
}

const BASE64_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn parse_base64(s: &str) -> Result<Value, Error> {
    // RFC 3548/4648 whitespace rule (§6): whitespace only accepted at
    // 4-character group boundaries.
    let mut groups = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if c.is_whitespace() {
            if !current.is_empty() && current.len() != 4 {
                return Err(Error::BinaryBase64Decode {
                    message: "whitespace inside a base64 group".to_string(),
                });
            }
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    let joined: String = groups.concat();
    let stripped = joined.trim_end_matches('=');
    let pad = joined.len() - stripped.len();

    let mut bits: u32 = 0;
    let mut nbits = 0u32;
    let mut out = Vec::new();
    for c in stripped.chars() {
        let v = BASE64_ALPHABET
            .iter()
            .position(|&b| b as char == c)
            .ok_or_else(|| Error::BinaryBase64Decode {
                message: format!("invalid base64 character '{}'", c),
            })? as u32;
        bits = (bits << 6) | v;
        nbits += 6;
        if nbits >= 8 {
            nbits -= 8;
            out.push((bits >> nbits) as u8);
        }
    }
    let _ = pad;
    Ok(Value::Bytes(out))
}

/// `complex` (`original_source/bespon/load_types.py`'s `EXTENDED_TYPES['complex']`,
/// built on Python's `complex()`): `<real>[+-]<imag>j`, or a bare real or
/// imaginary part.
fn parse_complex(s: &str) -> Result<Value, Error> {
    let err = |message: String| {
        Error::parse(
            crate::error::Traceback {
                source_name: String::new(),
                span: Default::default(),
                related: vec![],
            },
            message,
        )
    };
    let trimmed = s.trim();
    match trimmed.strip_suffix(['j', 'J']) {
        Some(body) => {
            let chars: Vec<char> = body.chars().collect();
            let split = (1..chars.len()).rev().find(|&i| chars[i] == '+' || chars[i] == '-');
            let (real_str, imag_str): (String, String) = match split {
                Some(i) => (chars[..i].iter().collect(), chars[i..].iter().collect()),
                None => (String::new(), body.to_string()),
            };
            let real = if real_str.is_empty() {
                0.0
            } else {
                real_str
                    .parse::<f64>()
                    .map_err(|e| err(format!("invalid complex real part \"{}\": {}", real_str, e)))?
            };
            let imag = match imag_str.as_str() {
                "" | "+" => 1.0,
                "-" => -1.0,
                other => other
                    .parse::<f64>()
                    .map_err(|e| err(format!("invalid complex imaginary part \"{}\": {}", other, e)))?,
            };
            Ok(Value::Complex(real, imag))
        }
        None => {
            let real = trimmed
                .parse::<f64>()
                .map_err(|e| err(format!("invalid complex literal \"{}\": {}", trimmed, e)))?;
            Ok(Value::Complex(real, 0.0))
        }
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    if a == 0 {
        1
    } else {
        a
    }
}

/// `rational` (grounded on the same module's `fractions.Fraction` parser):
/// `<numerator>/<denominator>`, or a bare integer numerator with an
/// implicit denominator of 1. Always normalized to lowest terms with a
/// positive denominator.
fn parse_rational(s: &str) -> Result<Value, Error> {
    let err = |message: String| {
        Error::parse(
            crate::error::Traceback {
                source_name: String::new(),
                span: Default::default(),
                related: vec![],
            },
            message,
        )
    };
    let trimmed = s.trim();
    let (num_str, den_str) = trimmed.split_once('/').unwrap_or((trimmed, "1"));
    let num = num_str
        .trim()
        .parse::<i64>()
        .map_err(|e| err(format!("invalid rational numerator \"{}\": {}", num_str, e)))?;
    let den = den_str
        .trim()
        .parse::<i64>()
        .map_err(|e| err(format!("invalid rational denominator \"{}\": {}", den_str, e)))?;
    if den == 0 {
        return Err(err("rational denominator cannot be zero".to_string()));
    }
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let g = gcd(num, den);
    Ok(Value::Rational(num / g, den / g))
}

pub struct Registry {
    types: HashMap<&'static str, TypeDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        let mut types = HashMap::new();
        let mut register = |d: TypeDescriptor| {
            types.insert(d.name, d);
        };
        register(TypeDescriptor {
            name: "none",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: false,
            number: false,
            typeable: true,
            parser: parse_none,
            extended: false,
        });
        register(TypeDescriptor {
            name: "bool",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: false,
            number: false,
            typeable: true,
            parser: parse_bool,
            extended: false,
        });
        register(TypeDescriptor {
            name: "str",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: false,
            number: false,
            typeable: true,
            parser: parse_str,
            extended: false,
        });
        register(TypeDescriptor {
            name: "int",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: false,
            number: true,
            typeable: true,
            parser: parse_int,
            extended: false,
        });
        register(TypeDescriptor {
            name: "float",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: false,
            number: true,
            typeable: true,
            parser: parse_float,
            extended: false,
        });
        register(TypeDescriptor {
            name: "bytes",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: true,
            number: false,
            typeable: true,
            parser: parse_bytes,
            extended: false,
        });
        register(TypeDescriptor {
            name: "base16",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: true,
            number: false,
            typeable: true,
            parser: parse_base16,
            extended: false,
        });
        register(TypeDescriptor {
            name: "base64",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: true,
            number: false,
            typeable: true,
            parser: parse_base64,
            extended: false,
        });
        register(TypeDescriptor {
            name: "dict",
            basetype: BaseType::Dict,
            mutable: true,
            ascii_bytes: false,
            number: false,
            typeable: true,
            parser: parse_str, // unused for non-scalar basetypes
            extended: false,
        });
        register(TypeDescriptor {
            name: "list",
            basetype: BaseType::List,
            mutable: true,
            ascii_bytes: false,
            number: false,
            typeable: true,
            parser: parse_str, // unused for non-scalar basetypes
            extended: false,
        });
        register(TypeDescriptor {
            name: "complex",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: false,
            number: true,
            typeable: true,
            parser: parse_complex,
            extended: true,
        });
        register(TypeDescriptor {
            name: "rational",
            basetype: BaseType::Scalar,
            mutable: false,
            ascii_bytes: false,
            number: true,
            typeable: true,
            parser: parse_rational,
            extended: true,
        });
        register(TypeDescriptor {
            name: "odict",
            basetype: BaseType::Dict,
            mutable: true,
            ascii_bytes: false,
            number: false,
            typeable: true,
            parser: parse_str, // unused for non-scalar basetypes
            extended: true,
        });
        register(TypeDescriptor {
            name: "set",
            basetype: BaseType::List,
            mutable: true,
            ascii_bytes: false,
            number: false,
            typeable: true,
            parser: parse_str, // unused for non-scalar basetypes
            extended: true,
        });
        register(TypeDescriptor {
            name: "tuple",
            basetype: BaseType::List,
            mutable: false,
            ascii_bytes: false,
            number: false,
            typeable: true,
            parser: parse_str, // unused for non-scalar basetypes
            extended: true,
        });
        Self { types }
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    /// Registers an extended type descriptor, validating §4.3's
    /// constraints (`ascii_bytes`/`number`/`typeable=false` only for
    /// scalar types).
    pub fn register_extended(&mut self, mut d: TypeDescriptor) -> Result<(), Error> {
        if d.basetype != BaseType::Scalar && (d.ascii_bytes || d.number || !d.typeable) {
            return Err(Error::Config {
                message: format!(
                    "type \"{}\": ascii_bytes/number/typeable=false only apply to scalar types",
                    d.name
                ),
            });
        }
        d.extended = true;
        self.types.insert(d.name, d);
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
