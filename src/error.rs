//! Error taxonomy shared by the lexer/parser, resolver, escape engine and
//! round-trip editor.
//!
//! Every decoding error carries a [`Span`] (and sometimes a second, related
//! span) so that callers get the same "In "<source>" at line L:C..." style
//! traceback the original implementation produces.

use std::fmt;

/// A 1-based line/column span in some named source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub first_line: u32,
    pub first_col: u32,
    pub last_line: u32,
    pub last_col: u32,
}

impl Span {
    pub fn point(line: u32, col: u32) -> Self {
        Self {
            first_line: line,
            first_col: col,
            last_line: line,
            last_col: col,
        }
    }

    fn loc_str(&self) -> String {
        if self.first_line == self.last_line {
            if self.first_col == self.last_col {
                format!("{}:{}", self.first_line, self.first_col)
            } else {
                format!("{}:{}-{}", self.first_line, self.first_col, self.last_col)
            }
        } else {
            format!(
                "{}:{}-{}:{}",
                self.first_line, self.first_col, self.last_line, self.last_col
            )
        }
    }
}

/// What a second, "related" span refers to, for errors that reference two
/// locations (e.g. a duplicate key and its first occurrence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedKind {
    DocComment,
    Tag,
    ScalarObject,
    Object,
}

impl fmt::Display for RelatedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelatedKind::DocComment => write!(f, "doc comment"),
            RelatedKind::Tag => write!(f, "tag"),
            RelatedKind::ScalarObject => write!(f, "scalar object"),
            RelatedKind::Object => write!(f, "object"),
        }
    }
}

/// A traceback: the primary span, plus context about the related objects
/// (if any) and the source name the span belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traceback {
    pub source_name: String,
    pub span: Span,
    pub related: Vec<(RelatedKind, Span)>,
}

impl fmt::Display for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let related = match self.related.len() {
            0 => String::new(),
            1 => format!(
                ", in relation to {} at {}",
                self.related[0].0,
                self.related[0].1.loc_str()
            ),
            _ => {
                let mut parts: Vec<String> = self
                    .related
                    .iter()
                    .map(|(kind, span)| format!("{} at {}", kind, span.loc_str()))
                    .collect();
                let last = parts.pop().unwrap();
                format!(", in relation to {}, and {}", parts.join(", "), last)
            }
        };
        write!(
            f,
            "In \"{}\" at line {}{}:",
            self.source_name,
            self.span.loc_str(),
            related
        )
    }
}

/// The top-level error type for every fallible operation in the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A code point that is not allowed to appear literally has appeared.
    #[error("{traceback}\n    Invalid literal code point \"{escaped}\"{comment}")]
    InvalidLiteral {
        traceback: Traceback,
        escaped: String,
        comment: String,
    },

    /// A backslash escape sequence that is neither a short escape nor a
    /// recognized numeric escape.
    #[error("Unknown escape sequence: \"{escape}\"")]
    UnknownEscape { escape: String },

    /// A surrogate code point was produced by an escape, with surrogates
    /// disabled.
    #[error("{traceback}\n    Escaped surrogate code point is not allowed: \"{escaped}\"")]
    EscapedUnicodeSurrogate { traceback: Traceback, escaped: String },

    /// A lone (unpaired) surrogate appeared literally, with surrogates
    /// disabled.
    #[error("{traceback}\n    Unpaired surrogate code point is not allowed: \"{escaped}\"")]
    UnicodeSurrogate { traceback: Traceback, escaped: String },

    /// General structural parse error (delimiters, duplicate keys, nesting,
    /// tags on untaggable nodes, ...).
    #[error("{traceback}\n    {message}")]
    Parse { traceback: Traceback, message: String },

    /// Indentation mismatch, a distinguished kind of parse error.
    #[error("{traceback}\n    Inconsistent relative indentation")]
    Indentation { traceback: Traceback },

    /// Error while encoding/decoding a `bytes` scalar as text.
    #[error("Could not encode byte string: {message}")]
    BinaryStringEncode { message: String },

    /// Error while decoding a `base16` scalar.
    #[error("Invalid base16 (hex) data: {message}")]
    BinaryBase16Decode { message: String },

    /// Error while decoding a `base64` scalar.
    #[error("Invalid base64 data: {message}")]
    BinaryBase64Decode { message: String },

    /// Invalid decoder/encoder construction options.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Internal invariant violation; used as an explicit fallthrough so
    /// that unreachable branches still fail informatively rather than
    /// panicking.
    #[error("{traceback}\n    Internal error (this is a bug): {message}")]
    Bug { traceback: Traceback, message: String },
}

impl Error {
    pub fn parse(traceback: Traceback, message: impl Into<String>) -> Self {
        Error::Parse {
            traceback,
            message: message.into(),
        }
    }

    pub fn bug(traceback: Traceback, message: impl Into<String>) -> Self {
        Error::Bug {
            traceback,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
