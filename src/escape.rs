//! Escape engine (C2): bidirectional escape/unescape for Unicode text and
//! byte strings.
//!
//! Grounded in `original_source/bespon/escape.py`'s `Escape`/`Unescape`
//! classes: the same context matrix (string-vs-doc-comment is handled by
//! the caller passing the right delimiter info; inline-vs-block and
//! single-vs-multiple delimiter occurrence are explicit parameters here),
//! the same sentinel-based newline/indent substitution trick, and the same
//! short-escape-before-numeric preference.

use crate::error::{Error, Span, Traceback};
use crate::grammar::{self, lit};

/// The four escape-form configurations from `spec.md` §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeForm {
    /// `\xHH` for code points < 256, braced `\u{H..H}` otherwise (default).
    XHexUBrace,
    /// `\xHH`, `\uHHHH`, `\UHHHHHHHH` by magnitude.
    XHexUHexUHex,
    /// Braced `\u{H..H}` only, regardless of magnitude.
    UBraceOnly,
    /// `\uHHHH` / `\UHHHHHHHH`, no `\x` form.
    UHexUHexOnly,
}

impl Default for EscapeForm {
    fn default() -> Self {
        EscapeForm::XHexUBrace
    }
}

/// Delimiter character a scalar is (or will be) quoted with; only `'`
/// and `"` participate in context-sensitive escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimChar {
    Single,
    Double,
}

impl DelimChar {
    fn ch(self) -> char {
        match self {
            DelimChar::Single => '\'',
            DelimChar::Double => '"',
        }
    }
}

fn numeric_escape(c: char, form: EscapeForm) -> String {
    let n = c as u32;
    match form {
        EscapeForm::XHexUBrace => {
            if n < 256 {
                format!("\\x{:02x}", n)
            } else {
                format!("\\u{{{:x}}}", n)
            }
        }
        EscapeForm::XHexUHexUHex => {
            if n < 256 {
                format!("\\x{:02x}", n)
            } else if n < 0x1_0000 {
                format!("\\u{:04x}", n)
            } else {
                format!("\\U{:08x}", n)
            }
        }
        EscapeForm::UBraceOnly => format!("\\u{{{:x}}}", n),
        EscapeForm::UHexUHexOnly => {
            if n < 0x1_0000 {
                format!("\\u{:04x}", n)
            } else {
                format!("\\U{:08x}", n)
            }
        }
    }
}

fn escape_one(c: char, form: EscapeForm, short_escapes: bool) -> String {
    if short_escapes {
        if let Some(s) = grammar::short_escape_for(c) {
            return s.to_string();
        }
    }
    numeric_escape(c, form)
}

/// Escapes a Unicode string for the requested context.
///
/// `multidelim` is true when the string will be wrapped in a run of more
/// than one identical delimiter (so a lone delimiter char need not be
/// escaped unless it appears in a run as long as the opening delimiter).
/// `inline` additionally escapes every line terminator. `all` forces every
/// code point through the escape table (used for the encoder's final
/// escaped-fallback delimiter tier, where every code point must round-trip
/// through an escape regardless of whether it strictly needs one). `ascii_only`
/// additionally escapes every non-ASCII code point (`only_ascii_source`/
/// `only_ascii_unquoted`), independent of `all`.
pub fn escape_unicode(
    s: &str,
    delim: DelimChar,
    multidelim: bool,
    all: bool,
    inline: bool,
    ascii_only: bool,
    form: EscapeForm,
    short_escapes: bool,
) -> String {
    if all {
        return s.chars().map(|c| escape_one(c, form, short_escapes)).collect();
    }
    let delim_ch = delim.ch();
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let needs_escape = c == lit::BACKSLASH
            || grammar::is_invalid_literal(c)
            || (ascii_only && !c.is_ascii())
            || (inline && grammar::is_line_terminator(c))
            || (c == delim_ch
                && if multidelim {
                    // Only escape a delimiter char when it's part of a run
                    // as long as the opening delimiter, or at end of string.
                    i + 1 == chars.len() || chars[i + 1] == delim_ch
                } else {
                    true
                });
        if needs_escape {
            out.push_str(&escape_one(c, form, short_escapes));
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

/// Escapes a byte string (Latin-1 range), `\xHH` numeric form only.
pub fn escape_bytes(
    b: &[u8],
    delim: DelimChar,
    multidelim: bool,
    inline: bool,
) -> Vec<u8> {
    let delim_ch = delim.ch() as u8;
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        let byte = b[i];
        let c = byte as char;
        let needs_escape = byte == b'\\'
            || grammar::is_invalid_literal(c)
            || (inline && grammar::is_line_terminator(c))
            || (byte == delim_ch
                && if multidelim {
                    i + 1 == b.len() || b[i + 1] == delim_ch
                } else {
                    true
                });
        if needs_escape {
            if let Some(short) = grammar::short_escape_for(c) {
                out.extend_from_slice(short.as_bytes());
            } else {
                out.extend_from_slice(format!("\\x{:02x}", byte).as_bytes());
            }
        } else {
            out.push(byte);
        }
        i += 1;
    }
    out
}

/// Replacement newline/indent configuration for `unescape_unicode`'s
/// `newline` tag-argument mode: every literal line terminator in the input
/// becomes `newline` (plus `indent` for subsequent lines); the leading
/// U+0000 sentinel marks "first line, no preceding newline" so it resolves
/// to `newline` alone.
#[derive(Debug, Clone)]
pub struct NewlineReplacement<'a> {
    pub newline: &'a str,
    pub indent: &'a str,
}

/// Which escape forms `scan_escape` accepts, mirroring
/// `DecoderConfig::short_escapes`/`short_unescapes`/`x_escapes`/`brace_escapes`.
/// A form turned off here is reported as `UnknownEscape` rather than silently
/// passed through, so a document exercising a disabled form fails loudly.
#[derive(Debug, Clone, Copy)]
pub struct UnescapeOptions {
    pub short_escapes: bool,
    pub short_unescapes: bool,
    pub x_escapes: bool,
    pub brace_escapes: bool,
}

impl Default for UnescapeOptions {
    fn default() -> Self {
        UnescapeOptions {
            short_escapes: true,
            short_unescapes: true,
            x_escapes: true,
            brace_escapes: true,
        }
    }
}

impl UnescapeOptions {
    pub fn from_decoder_config(cfg: &crate::config::DecoderConfig) -> Self {
        UnescapeOptions {
            short_escapes: cfg.short_escapes,
            short_unescapes: cfg.short_unescapes,
            x_escapes: cfg.x_escapes,
            brace_escapes: cfg.brace_escapes,
        }
    }
}

fn location_of(s: &str, byte_offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, c) in s.char_indices() {
        if i >= byte_offset {
            break;
        }
        if grammar::is_line_terminator(c) {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Unescapes a Unicode string. When `replacement` is `Some`, every literal
/// line terminator is itself replaced by `newline` (+ `indent` except for
/// a line beginning right after the sentinel), implementing the `newline`
/// tag argument for block strings.
pub fn unescape_unicode(
    s: &str,
    source_name: &str,
    replacement: Option<NewlineReplacement<'_>>,
    opts: UnescapeOptions,
) -> Result<String, Error> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == lit::TERMINAL_SENTINEL {
            // Consumed only as part of a newline+sentinel pair below; a
            // bare sentinel elsewhere resolves to nothing.
            i += 1;
            continue;
        }
        if c == lit::BACKSLASH {
            let (escape_text, consumed) = scan_escape(&chars, i, s, source_name, opts)?;
            match escape_text {
                Some(text) => out.push_str(&text),
                None => {} // line continuation, yields empty
            }
            i += consumed;
            continue;
        }
        if grammar::is_line_terminator(c) {
            if let Some(ref repl) = replacement {
                out.push_str(repl.newline);
                let next_is_sentinel = chars.get(i + 1).copied() == Some(lit::TERMINAL_SENTINEL);
                if !next_is_sentinel {
                    out.push_str(repl.indent);
                }
                i += if next_is_sentinel { 2 } else { 1 };
                continue;
            }
            out.push(c);
            i += 1;
            continue;
        }
        out.push(c);
        i += 1;
    }
    Ok(out)
}

/// Scans one backslash escape starting at `chars[pos]` (which must be
/// `\`). Returns the replacement text (`None` for a line-continuation,
/// which yields nothing) and the number of `chars` consumed.
fn scan_escape(
    chars: &[char],
    pos: usize,
    full_source: &str,
    source_name: &str,
    opts: UnescapeOptions,
) -> Result<(Option<String>, usize), Error> {
    debug_assert_eq!(chars[pos], lit::BACKSLASH);
    if pos + 1 >= chars.len() {
        return Err(unknown_escape_error("\\", full_source, pos, source_name));
    }
    let next = chars[pos + 1];

    // Short escapes, e.g. \n \t \\ (and the legacy unescape-only \/ form).
    let two_char: String = [lit::BACKSLASH, next].iter().collect();
    if let Some(c) = grammar::short_unescape_for(&two_char) {
        let is_legacy = two_char == "\\/";
        let accepted = if is_legacy {
            opts.short_unescapes
        } else {
            opts.short_escapes
        };
        if accepted {
            return Ok((Some(c.to_string()), 2));
        }
        return Err(unknown_escape_error(&two_char, full_source, pos, source_name));
    }

    // \<spaces><line-terminator>: line continuation, yields empty.
    if next == ' ' || next == '\t' || grammar::is_line_terminator(next) {
        let mut j = pos + 1;
        while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
            j += 1;
        }
        if j < chars.len() && grammar::is_line_terminator(chars[j]) {
            return Ok((None, j + 1 - pos));
        }
    }

    // Numeric escapes: \xHH, \uHHHH, \UHHHHHHHH, \u{H..H}
    let (prefix_len, hex_len, braced) = match next {
        'x' if opts.x_escapes => (2, 2, false),
        'u' if chars.get(pos + 2) == Some(&'{') => {
            if !opts.brace_escapes {
                return Err(unknown_escape_error(&two_char, full_source, pos, source_name));
            }
            (3, usize::MAX, true)
        }
        'u' => (2, 4, false),
        'U' => (2, 8, false),
        _ => {
            return Err(unknown_escape_error(&two_char, full_source, pos, source_name));
        }
    };

    if braced {
        let start = pos + prefix_len;
        let end = chars[start..]
            .iter()
            .position(|&c| c == '}')
            .map(|p| start + p);
        let end = match end {
            Some(e) => e,
            None => return Err(unknown_escape_error(&two_char, full_source, pos, source_name)),
        };
        let hex: String = chars[start..end].iter().collect();
        let code = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| unknown_escape_error(&two_char, full_source, pos, source_name))?;
        return Ok((Some(code.to_string()), end + 1 - pos));
    }

    let start = pos + prefix_len;
    let end = start + hex_len;
    if end > chars.len() {
        return Err(unknown_escape_error(&two_char, full_source, pos, source_name));
    }
    let hex: String = chars[start..end].iter().collect();
    let code = u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| unknown_escape_error(&two_char, full_source, pos, source_name))?;
    Ok((Some(code.to_string()), end - pos))
}

fn unknown_escape_error(raw: &str, full_source: &str, char_pos: usize, source_name: &str) -> Error {
    // Translate the char index back into a byte offset for location
    // tracking, as §4.2 prescribes (count line terminators from start).
    let byte_offset = full_source
        .char_indices()
        .nth(char_pos)
        .map(|(b, _)| b)
        .unwrap_or(full_source.len());
    let (line, col) = location_of(full_source, byte_offset);
    Error::UnknownEscape {
        escape: format!(
            "{} [{}]",
            raw,
            Traceback {
                source_name: source_name.to_string(),
                span: Span::point(line, col),
                related: vec![],
            }
        ),
    }
}

/// Unescapes a byte string (`\xHH` numeric form, plus short escapes and
/// line continuation; no `\u`/`\U` forms are valid for bytes).
pub fn unescape_bytes(b: &[u8], source_name: &str, opts: UnescapeOptions) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        let byte = b[i];
        if byte != b'\\' {
            out.push(byte);
            i += 1;
            continue;
        }
        if i + 1 >= b.len() {
            return Err(Error::UnknownEscape {
                escape: "\\".to_string(),
            });
        }
        let next = b[i + 1] as char;
        let two_char: String = ['\\', next].iter().collect();
        if let Some(c) = grammar::short_unescape_for(&two_char) {
            let is_legacy = two_char == "\\/";
            let accepted = if is_legacy { opts.short_unescapes } else { opts.short_escapes };
            if !accepted {
                return Err(Error::UnknownEscape { escape: two_char });
            }
            out.push(c as u8);
            i += 2;
            continue;
        }
        if next == 'x' && opts.x_escapes {
            if i + 4 > b.len() {
                return Err(Error::UnknownEscape { escape: two_char });
            }
            let hex = std::str::from_utf8(&b[i + 2..i + 4])
                .map_err(|_| Error::UnknownEscape { escape: two_char.clone() })?;
            let byte_val = u8::from_str_radix(hex, 16)
                .map_err(|_| Error::UnknownEscape { escape: two_char.clone() })?;
            out.push(byte_val);
            i += 4;
            continue;
        }
        // \<spaces><newline> continuation
        let mut j = i + 1;
        while j < b.len() && (b[j] == b' ' || b[j] == b'\t') {
            j += 1;
        }
        if j < b.len() && grammar::is_line_terminator(b[j] as char) {
            i = j + 1;
            continue;
        }
        let _ = source_name;
        return Err(Error::UnknownEscape { escape: two_char });
    }
    Ok(out)
}
