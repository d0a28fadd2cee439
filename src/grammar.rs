//! Grammar tables (C1): literal tokens, regex fragments over code-point
//! classes, and the short backslash-escape pairs.
//!
//! Mirrors `original_source/bespon/grammar.py`'s dict-of-literals /
//! dict-of-regexes split, but expressed as Rust constants and lazily built
//! [`regex::Regex`] values instead of runtime dict construction.

use regex::Regex;
use std::sync::OnceLock;

/// Bound on repeated-delimiter length (single/triple/sextuple/...), to
/// reject adversarial delimiter runs. `3 * 30`, per the original's
/// `PARAMS['max_delim_length']`.
pub const MAX_DELIM_LENGTH: usize = 90;

pub mod lit {
    pub const COMMENT: char = '#';
    pub const ASSIGN_KEY_VAL: char = '=';
    pub const OPEN_NONINLINE_LIST: char = '*';
    pub const OPEN_INLINE_DICT: char = '{';
    pub const CLOSE_INLINE_DICT: char = '}';
    pub const OPEN_INLINE_LIST: char = '[';
    pub const CLOSE_INLINE_LIST: char = ']';
    pub const OPEN_TAG: char = '(';
    pub const END_TAG_SUFFIX: char = '>';
    pub const CLOSE_TAG: char = ')';
    pub const INLINE_SEPARATOR: char = ',';
    /// Alternate inline separator, accepted anywhere `INLINE_SEPARATOR` is
    /// (list/dict elements), so that a document can separate entries whose
    /// own unquoted text contains a literal comma (e.g. numbers grouped by
    /// `,`) without quoting them. Never produced by the encoder.
    pub const INLINE_SEPARATOR_ALT: char = ';';
    /// Alternate key/value separator inside an inline dict only, accepted
    /// for interoperability with plain JSON object syntax (`{"a":1}`).
    /// Never produced by the encoder; non-inline dicts still require `=`.
    pub const ASSIGN_KEY_VAL_ALT: char = ':';
    pub const BLOCK_PREFIX: char = '|';
    pub const BLOCK_SUFFIX: char = '/';
    pub const STRING_DELIM_SINGLE: char = '\'';
    pub const STRING_DELIM_DOUBLE: char = '"';
    pub const STRING_DELIM_BACKTICK: char = '`';
    pub const PATH_SEPARATOR: char = '.';
    pub const ALIAS_PREFIX: char = '$';
    pub const HOME_ALIAS: char = '~';
    pub const SELF_ALIAS: char = '_';
    pub const KEY_VAL_ASSIGN: char = '=';
    pub const BACKSLASH: char = '\\';

    /// Sentinel code point marking "line start without a preceding
    /// newline" inside an unescape substitution pipeline.
    pub const TERMINAL_SENTINEL: char = '\u{0}';
}

/// The reserved scalar keywords; anything structurally identical but
/// differently-cased is a reserved-word misspelling error, not a plain
/// unquoted string.
pub const RESERVED_WORDS: &[&str] = &["none", "true", "false", "inf", "nan"];

/// Case-insensitive/partial variants that are specifically rejected as
/// misspellings of a reserved word, rather than silently accepted as an
/// unquoted string.
pub fn reserved_word_misspelling(word: &str) -> Option<&'static str> {
    let lower = word.to_ascii_lowercase();
    for &canonical in RESERVED_WORDS {
        if lower == canonical && word != canonical {
            return Some(canonical);
        }
    }
    None
}

/// Short, two-character backslash escapes, in escape direction
/// (code point -> literal escape text).
pub const SHORT_BACKSLASH_ESCAPES: &[(char, &str)] = &[
    ('\\', "\\\\"),
    ('\'', "\\'"),
    ('"', "\\\""),
    ('\u{7}', "\\a"),
    ('\u{8}', "\\b"),
    ('\u{1B}', "\\e"),
    ('\u{C}', "\\f"),
    ('\n', "\\n"),
    ('\r', "\\r"),
    ('\t', "\\t"),
    ('\u{B}', "\\v"),
];

/// Short unescapes, in unescape direction. `\/` is accepted for legacy
/// JSON compatibility but never produced by the escaper.
pub const SHORT_BACKSLASH_UNESCAPES: &[(&str, char)] = &[
    ("\\\\", '\\'),
    ("\\'", '\''),
    ("\\\"", '"'),
    ("\\a", '\u{7}'),
    ("\\b", '\u{8}'),
    ("\\e", '\u{1B}'),
    ("\\f", '\u{C}'),
    ("\\n", '\n'),
    ("\\r", '\r'),
    ("\\t", '\t'),
    ("\\v", '\u{B}'),
    ("\\/", '/'),
];

pub fn short_escape_for(c: char) -> Option<&'static str> {
    SHORT_BACKSLASH_ESCAPES
        .iter()
        .find(|(k, _)| *k == c)
        .map(|(_, v)| *v)
}

pub fn short_unescape_for(s: &str) -> Option<char> {
    SHORT_BACKSLASH_UNESCAPES
        .iter()
        .find(|(k, _)| *k == s)
        .map(|(_, v)| *v)
}

/// Line terminators recognized by default; narrower sets can be selected
/// via decoder options (`spaces`/`literals`/`nonliterals` §6).
pub const LINE_TERMINATORS: &[char] =
    &['\n', '\r', '\u{B}', '\u{C}', '\u{85}', '\u{2028}', '\u{2029}'];

pub fn is_line_terminator(c: char) -> bool {
    LINE_TERMINATORS.contains(&c)
}

/// Unicode whitespace (not including line terminators) used by the
/// inline-string "unwrap" fold rule.
pub fn is_unicode_whitespace(c: char) -> bool {
    c.is_whitespace() && !is_line_terminator(c)
}

/// Bidi R/AL code points that can cause bidi-rendering ambiguity in
/// unquoted output; kept as an explicit small range table since no
/// reachable crate exposes exactly the Bidi_Class=R|AL derived property.
pub fn is_bidi_r_or_al(c: char) -> bool {
    matches!(c as u32,
        0x0590..=0x05FF // Hebrew
        | 0x07C0..=0x085F // NKo, Samaritan, Mandaic
        | 0xFB1D..=0xFB4F // Hebrew presentation forms
        | 0x0600..=0x07BF // Arabic, Syriac, Arabic Supplement, Thaana
        | 0xFB50..=0xFDFF // Arabic presentation forms A
        | 0xFE70..=0xFEFF // Arabic presentation forms B
        | 0x10800..=0x10FFF // Various right-to-left blocks
    )
}

/// Unicode noncharacters: the last two code points of each plane, plus
/// U+FDD0..=U+FDEF.
pub fn is_noncharacter(c: char) -> bool {
    let n = c as u32;
    if (0xFDD0..=0xFDEF).contains(&n) {
        return true;
    }
    (n & 0xFFFE) == 0xFFFE
}

/// Default-ignorable code points relevant to literal-validity checks
/// (variation selectors, zero-width formatting characters). Not
/// exhaustive of the full Unicode derived property; covers the commonly
/// encountered ranges, per `spec.md`'s note that this table may be treated
/// as an opaque, delegated character class.
pub fn is_default_ignorable(c: char) -> bool {
    matches!(c as u32,
        0x200B..=0x200F // zero width space/joiners, direction marks
        | 0x202A..=0x202E // directional embedding/override
        | 0x2060..=0x2064 // word joiner, invisible operators
        | 0x2066..=0x206F // directional isolates, deprecated format chars
        | 0xFE00..=0xFE0F // variation selectors
        | 0xFEFF // BOM / zero width no-break space
    )
}

/// The "always escaped" class from `spec.md` §4.2: Cc minus
/// `\t\n\r`, Bidi controls, BOM, noncharacters, surrogates.
pub fn is_invalid_literal(c: char) -> bool {
    let n = c as u32;
    let is_cc_minus_tab_nl_cr = c.is_control() && !matches!(c, '\t' | '\n' | '\r');
    let is_bidi_control = matches!(
        n,
        0x061C | 0x200E | 0x200F | 0x202A..=0x202E | 0x2066..=0x2069
    );
    let is_bom = n == 0xFEFF;
    is_cc_minus_tab_nl_cr || is_bidi_control || is_bom || is_noncharacter(c)
}

/// Hangul filler code points excluded from XID_Start/XID_Continue for the
/// purposes of this grammar (`spec.md` §4.1).
pub fn is_hangul_filler(c: char) -> bool {
    matches!(c as u32, 0x115F | 0x1160 | 0x3164 | 0xFFA0)
}

pub fn is_identifier_start(c: char) -> bool {
    (unicode_xid::UnicodeXID::is_xid_start(c) || c == '_') && !is_hangul_filler(c)
}

pub fn is_identifier_continue(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_continue(c) && !is_hangul_filler(c)
}

fn cached(cell: &OnceLock<Regex>, pattern: &str) -> &Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("grammar regex is well-formed"))
}

/// Integer literal, base 10, with `_` digit separators (never
/// leading/trailing/adjacent to sign).
pub fn re_int_dec() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(&CELL, r"^[+-]?(0|[1-9](_?[0-9])*)$")
}

/// Integer literal, base 16 (`0x` prefix).
pub fn re_int_hex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(&CELL, r"^[+-]?0x[0-9a-fA-F](_?[0-9a-fA-F])*$")
}

/// Integer literal, base 8 (`0o` prefix).
pub fn re_int_oct() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(&CELL, r"^[+-]?0o[0-7](_?[0-7])*$")
}

/// Integer literal, base 2 (`0b` prefix).
pub fn re_int_bin() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(&CELL, r"^[+-]?0b[01](_?[01])*$")
}

/// Float literal, base 10, optional exponent.
pub fn re_float_dec() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        &CELL,
        r"^[+-]?(0|[1-9](_?[0-9])*)\.[0-9](_?[0-9])*([eE][+-]?[0-9](_?[0-9])*)?$",
    )
}

/// Hex float literal (`0x1.8p3` style), used when `hex_floats` is enabled.
pub fn re_float_hex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        &CELL,
        r"^[+-]?0x[0-9a-fA-F](_?[0-9a-fA-F])*\.[0-9a-fA-F](_?[0-9a-fA-F])*[pP][+-]?[0-9]+$",
    )
}

/// Plain identifier (`XID_Start (_)? XID_Continue*`), used for unquoted
/// scalars and key path elements.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_identifier_start(c) => {}
        _ => return false,
    }
    chars.all(is_identifier_continue)
}

/// "Unquoted string" extension: identifier tokens separated by single
/// ASCII spaces (`spec.md` §4.4 "Unquoted strings").
pub fn is_unquoted_string(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.split(' ').all(|part| !part.is_empty() && is_identifier(part)) && !s.contains("  ")
}
