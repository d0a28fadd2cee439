//! Encoder (C7): serializes a resolved [`Value`] tree back to BespON text.
//!
//! Grounded in `spec.md` §4.7 and, for the delimiter-escalation and
//! alias-back-filling mechanics, on `original_source/bespon/encoding.py`'s
//! `BespONEncoder`. Two public entry points mirror the two operations named
//! there: [`encode`] serializes a whole document (and always ends in a
//! trailing newline), while [`encode_element`] renders a single value at an
//! explicit continuation indent and returns a bare fragment, for use by
//! [`crate::roundtrip`] when splicing a replacement into existing source.

use crate::config::EncoderConfig;
use crate::error::{Error, Span, Traceback};
use crate::grammar::{self, lit};
use crate::value::{DictHandle, ListHandle, Value};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Exponent letter for the hex-float form (`0x1.8p3`), named per the
/// Design Note in `spec.md` §9 rather than inlined at each call site.
pub const HEX_EXPONENT_LETTER: char = 'p';

fn encode_err(message: impl Into<String>) -> Error {
    Error::parse(
        Traceback {
            source_name: "<value>".to_string(),
            span: Span::default(),
            related: vec![],
        },
        message,
    )
}

struct EncodeCtx<'a> {
    config: &'a EncoderConfig,
    /// Reference count per collection identity (`Rc::as_ptr` address),
    /// precomputed by [`count_shared`] before the main render pass so that a
    /// node's first visit already knows whether it needs a label, instead of
    /// reserving a slot and patching it in after the fact.
    shared_counts: HashMap<usize, u32>,
    labels: HashMap<usize, String>,
    label_counter: u32,
    /// Collections currently being rendered, by identity; a hit here during
    /// rendering (as opposed to a hit in `labels` for an already-finished
    /// sibling) means a genuine cycle.
    open_stack: Vec<usize>,
}

impl<'a> EncodeCtx<'a> {
    fn next_label(&mut self) -> String {
        self.label_counter += 1;
        format!("ref{}", self.label_counter)
    }
}

/// Walks `value` once, counting how many times each distinct collection
/// identity is reached. Cycle-safe: a collection already on `on_stack` is
/// counted but not re-descended into, so a genuine cycle terminates here
/// instead of recursing forever.
fn count_shared(value: &Value, counts: &mut HashMap<usize, u32>, on_stack: &mut HashSet<usize>) {
    match value {
        Value::List(h) => {
            let ptr = Rc::as_ptr(h) as usize;
            *counts.entry(ptr).or_insert(0) += 1;
            if !on_stack.insert(ptr) {
                return;
            }
            for item in h.borrow().iter() {
                count_shared(item, counts, on_stack);
            }
            on_stack.remove(&ptr);
        }
        Value::Dict(h) => {
            let ptr = Rc::as_ptr(h) as usize;
            *counts.entry(ptr).or_insert(0) += 1;
            if !on_stack.insert(ptr) {
                return;
            }
            for (k, v) in h.borrow().iter() {
                count_shared(k, counts, on_stack);
                count_shared(v, counts, on_stack);
            }
            on_stack.remove(&ptr);
        }
        _ => {}
    }
}

/// Serializes `value` to a complete document: always ends with exactly one
/// trailing newline.
pub fn encode(value: &Value, config: &EncoderConfig) -> Result<String, Error> {
    config.validate()?;
    let mut ctx = new_ctx(value, config);
    let mut text = render(value, "", 0, &mut ctx)?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// Serializes a single value at `continuation_indent`, with no forced
/// trailing newline — the fragment form the round-trip editor splices in
/// place of a replaced node.
pub fn encode_element(value: &Value, continuation_indent: &str, config: &EncoderConfig) -> Result<String, Error> {
    config.validate()?;
    let mut ctx = new_ctx(value, config);
    render(value, continuation_indent, 0, &mut ctx)
}

fn new_ctx<'a>(value: &Value, config: &'a EncoderConfig) -> EncodeCtx<'a> {
    let mut shared_counts = HashMap::new();
    if config.aliases {
        count_shared(value, &mut shared_counts, &mut HashSet::new());
    }
    EncodeCtx {
        config,
        shared_counts,
        labels: HashMap::new(),
        label_counter: 0,
        open_stack: Vec::new(),
    }
}

fn render(value: &Value, indent: &str, depth: u32, ctx: &mut EncodeCtx) -> Result<String, Error> {
    if depth > ctx.config.max_nesting_depth {
        return Err(encode_err("max_nesting_depth exceeded while encoding"));
    }
    match value {
        Value::None => Ok("none".to_string()),
        Value::Bool(b) => Ok(if *b { "true".to_string() } else { "false".to_string() }),
        Value::Int(n) => Ok(encode_int(*n, ctx.config)),
        Value::Float(f) => Ok(format_float(*f, ctx.config)),
        Value::Str(s) => Ok(encode_string_value(s, indent, ctx.config)),
        Value::Bytes(b) => Ok(encode_bytes(b)),
        Value::Complex(re, im) => {
            if !ctx.config.extended_types {
                return Err(encode_err("value contains a complex number but extended_types is disabled"));
            }
            Ok(encode_complex(*re, *im, ctx.config))
        }
        Value::Rational(n, d) => {
            if !ctx.config.extended_types {
                return Err(encode_err("value contains a rational number but extended_types is disabled"));
            }
            Ok(format!("(type=rational)>\"{}/{}\"", n, d))
        }
        Value::List(h) => encode_list(h, indent, depth, ctx),
        Value::Dict(h) => encode_dict(h, indent, depth, ctx),
    }
}

fn encode_int(n: i64, config: &EncoderConfig) -> String {
    if config.integers {
        n.to_string()
    } else {
        format_float(n as f64, config)
    }
}

fn format_float(f: f64, config: &EncoderConfig) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if config.hex_floats {
        return format_hex_float(f);
    }
    let s = format!("{}", f);
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{}.0", s)
    }
}

/// `0x1.8p3`-style hex float, per IEEE 754 bit layout. Subnormals are
/// rendered with a leading `0` digit rather than `1`, since they have no
/// implicit leading bit.
fn format_hex_float(f: f64) -> String {
    if f == 0.0 {
        let sign = if f.is_sign_negative() { "-" } else { "" };
        return format!("{}0x0.0{}0", sign, HEX_EXPONENT_LETTER);
    }
    let neg = f.is_sign_negative();
    let bits = f.abs().to_bits();
    let raw_exp = ((bits >> 52) & 0x7ff) as i64;
    let frac_bits = bits & 0x000f_ffff_ffff_ffff;
    let (lead, exp) = if raw_exp == 0 { (0u64, -1022i64) } else { (1u64, raw_exp - 1023) };
    let hex_frac = format!("{:013x}", frac_bits);
    let trimmed = hex_frac.trim_end_matches('0');
    let frac_str = if trimmed.is_empty() { "0" } else { trimmed };
    format!(
        "{}0x{}.{}{}{}{}",
        if neg { "-" } else { "" },
        lead,
        frac_str,
        HEX_EXPONENT_LETTER,
        if exp >= 0 { "+" } else { "" },
        exp
    )
}

fn encode_bytes(b: &[u8]) -> String {
    let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
    format!("(type=base16)>\"{}\"", hex)
}

fn encode_complex(re: f64, im: f64, config: &EncoderConfig) -> String {
    let re_s = format_float(re, config);
    let im_s = format_float(im, config);
    let sign = if im_s.starts_with('-') { "" } else { "+" };
    format!("(type=complex)>\"{}{}{}j\"", re_s, sign, im_s)
}

fn looks_numeric_or_reserved(s: &str) -> bool {
    matches!(s, "none" | "null" | "true" | "false" | "inf" | "nan")
        || grammar::re_int_dec().is_match(s)
        || grammar::re_int_hex().is_match(s)
        || grammar::re_int_oct().is_match(s)
        || grammar::re_int_bin().is_match(s)
        || grammar::re_float_dec().is_match(s)
        || grammar::re_float_hex().is_match(s)
        || grammar::reserved_word_misspelling(s).is_some()
}

fn can_unquote(s: &str, config: &EncoderConfig) -> bool {
    if s.is_empty() || looks_numeric_or_reserved(s) {
        return false;
    }
    if !grammar::is_unquoted_string(s) {
        return false;
    }
    if config.only_ascii_unquoted && !s.is_ascii() {
        return false;
    }
    if s.chars().any(grammar::is_bidi_r_or_al) {
        return false;
    }
    true
}

/// True when `s` contains a code point that can never appear literally
/// (regardless of delimiter) and so forces the escaped delimiter form.
fn needs_escape_aware(s: &str, config: &EncoderConfig) -> bool {
    s.chars().any(|c| grammar::is_invalid_literal(c) || (config.only_ascii_source && !c.is_ascii()))
}

fn encode_string_value(s: &str, indent: &str, config: &EncoderConfig) -> String {
    let has_line_term = s.chars().any(grammar::is_line_terminator);
    if !has_line_term && can_unquote(s, config) {
        return s.to_string();
    }
    if needs_escape_aware(s, config) {
        return quote_escaped(s, has_line_term, indent, config, false);
    }

    let candidates = [lit::STRING_DELIM_SINGLE, lit::STRING_DELIM_DOUBLE, lit::STRING_DELIM_BACKTICK];
    let mut mult = 1usize;
    loop {
        for &ch in &candidates {
            if mult == 1 && has_line_term {
                // a singly-quoted string cannot hold a literal newline.
                continue;
            }
            let run: String = std::iter::repeat(ch).take(mult).collect();
            if !s.contains(&run) {
                return quote_literal(s, ch, mult, indent);
            }
        }
        mult = if mult == 1 { 3 } else { mult + 3 };
        if mult > grammar::MAX_DELIM_LENGTH {
            return quote_escaped(s, has_line_term, indent, config, true);
        }
    }
}

fn quote_literal(s: &str, ch: char, count: usize, indent: &str) -> String {
    let delim: String = std::iter::repeat(ch).take(count).collect();
    if count == 1 {
        format!("{}{}{}", delim, s, delim)
    } else {
        block_wrap(s, &delim, indent)
    }
}

/// Wraps already-literal, possibly multi-line `body` in a block delimiter.
/// Per `parser::scalars::parse_quoted`, a block-quoted string's content is
/// taken verbatim with no indentation stripped on decode, so continuation
/// lines are not re-indented here either.
fn block_wrap(body: &str, delim: &str, indent: &str) -> String {
    format!("{}\n{}{}\n{}{}", delim, indent, body, indent, delim)
}

fn quote_escaped(s: &str, has_line_term: bool, indent: &str, config: &EncoderConfig, force_all: bool) -> String {
    use crate::escape::{escape_unicode, DelimChar, EscapeForm};
    let count = if has_line_term { 3 } else { 1 };
    let escaped = escape_unicode(
        s,
        DelimChar::Double,
        count > 1,
        force_all,
        !has_line_term,
        config.only_ascii_source,
        EscapeForm::default(),
        true,
    );
    let delim: String = std::iter::repeat(lit::STRING_DELIM_DOUBLE).take(count).collect();
    if count == 1 {
        format!("{}{}{}", delim, escaped, delim)
    } else {
        block_wrap(&escaped, &delim, indent)
    }
}

fn encode_list(handle: &ListHandle, indent: &str, depth: u32, ctx: &mut EncodeCtx) -> Result<String, Error> {
    let ptr = Rc::as_ptr(handle) as usize;
    if let Some(label) = ctx.labels.get(&ptr).cloned() {
        check_reference(ctx, ptr)?;
        return Ok(format!("${}", label));
    }
    let label = reserve_label(ctx, ptr);
    ctx.open_stack.push(ptr);
    let body = encode_list_body(handle, indent, depth, ctx);
    ctx.open_stack.pop();
    let body = body?;
    Ok(match label {
        Some(l) => format!("(label={})>{}", l, body),
        None => body,
    })
}

fn encode_dict(handle: &DictHandle, indent: &str, depth: u32, ctx: &mut EncodeCtx) -> Result<String, Error> {
    let ptr = Rc::as_ptr(handle) as usize;
    if let Some(label) = ctx.labels.get(&ptr).cloned() {
        check_reference(ctx, ptr)?;
        return Ok(format!("${}", label));
    }
    let label = reserve_label(ctx, ptr);
    ctx.open_stack.push(ptr);
    let body = encode_dict_body(handle, indent, depth, ctx);
    ctx.open_stack.pop();
    let body = body?;
    Ok(match label {
        Some(l) => format!("(label={})>{}", l, body),
        None => body,
    })
}

fn reserve_label(ctx: &mut EncodeCtx, ptr: usize) -> Option<String> {
    let count = ctx.shared_counts.get(&ptr).copied().unwrap_or(1);
    if count > 1 {
        let label = ctx.next_label();
        ctx.labels.insert(ptr, label.clone());
        Some(label)
    } else {
        None
    }
}

fn check_reference(ctx: &EncodeCtx, ptr: usize) -> Result<(), Error> {
    if !ctx.config.aliases {
        return Err(encode_err("value graph has a shared or circular reference but aliases is disabled"));
    }
    if ctx.open_stack.contains(&ptr) && !ctx.config.circular_references {
        return Err(encode_err("circular reference detected but circular_references is disabled"));
    }
    Ok(())
}

fn force_inline(config: &EncoderConfig, depth: u32) -> bool {
    config.compact_inline || depth >= config.inline_depth
}

fn encode_list_body(handle: &ListHandle, indent: &str, depth: u32, ctx: &mut EncodeCtx) -> Result<String, Error> {
    let items = handle.borrow();
    if items.is_empty() {
        return Ok("[]".to_string());
    }
    if force_inline(ctx.config, depth) {
        let mut parts = Vec::with_capacity(items.len());
        for item in items.iter() {
            parts.push(render(item, indent, depth + 1, ctx)?);
        }
        let sep = format!("{} ", lit::INLINE_SEPARATOR);
        let mut body = parts.join(&sep);
        if ctx.config.trailing_commas {
            body.push(lit::INLINE_SEPARATOR);
        }
        Ok(format!("[{}]", body))
    } else {
        encode_list_block(&items[..], indent, depth, ctx)
    }
}

fn encode_list_block(items: &[Value], indent: &str, depth: u32, ctx: &mut EncodeCtx) -> Result<String, Error> {
    let nested_indent = format!("{}{}", indent, ctx.config.nesting_indent);
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let encoded = render(item, &nested_indent, depth + 1, ctx)?;
        let is_block_collection = matches!(item, Value::List(_) | Value::Dict(_)) && encoded.contains('\n');
        if is_block_collection {
            lines.push(format!("{}{}\n{}", indent, ctx.config.flush_start_list_item, encoded));
        } else {
            lines.push(format!("{}{}{}", indent, ctx.config.start_list_item, encoded));
        }
    }
    Ok(lines.join("\n"))
}

fn encode_dict_body(handle: &DictHandle, indent: &str, depth: u32, ctx: &mut EncodeCtx) -> Result<String, Error> {
    let map = handle.borrow();
    if map.is_empty() {
        return Ok("{}".to_string());
    }
    if force_inline(ctx.config, depth) {
        let mut parts = Vec::with_capacity(map.len());
        for (k, v) in map.iter() {
            let key_s = render(k, indent, depth + 1, ctx)?;
            let val_s = render(v, indent, depth + 1, ctx)?;
            parts.push(format!("{}{}{}", key_s, lit::ASSIGN_KEY_VAL, val_s));
        }
        let sep = format!("{} ", lit::INLINE_SEPARATOR);
        let mut body = parts.join(&sep);
        if ctx.config.trailing_commas {
            body.push(lit::INLINE_SEPARATOR);
        }
        Ok(format!("{{{}}}", body))
    } else {
        encode_dict_block(&map, indent, depth, ctx)
    }
}

fn encode_dict_block(entries: &IndexMap<Value, Value>, indent: &str, depth: u32, ctx: &mut EncodeCtx) -> Result<String, Error> {
    let nested_indent = format!("{}{}", indent, ctx.config.nesting_indent);
    let mut lines = Vec::with_capacity(entries.len());
    for (k, v) in entries.iter() {
        let key_s = render(k, indent, depth + 1, ctx)?;
        let val_s = render(v, &nested_indent, depth + 1, ctx)?;
        let is_block_collection = matches!(v, Value::List(_) | Value::Dict(_)) && val_s.contains('\n');
        if is_block_collection {
            lines.push(format!("{}{} =\n{}", indent, key_s, val_s));
        } else {
            lines.push(format!("{}{} {} {}", indent, key_s, lit::ASSIGN_KEY_VAL, val_s));
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn encodes_scalars() {
        let config = EncoderConfig::default();
        assert_eq!(encode(&Value::Int(42), &config).unwrap(), "42\n");
        assert_eq!(encode(&Value::Bool(true), &config).unwrap(), "true\n");
        assert_eq!(encode(&Value::None, &config).unwrap(), "none\n");
        assert_eq!(encode(&Value::Str("hello".to_string()), &config).unwrap(), "hello\n");
    }

    #[test]
    fn quotes_strings_that_collide_with_reserved_words() {
        let config = EncoderConfig::default();
        assert_eq!(encode(&Value::Str("true".to_string()), &config).unwrap(), "\"true\"\n");
    }

    #[test]
    fn encodes_an_inline_dict() {
        let config = EncoderConfig { compact_inline: true, ..EncoderConfig::default() };
        let mut map = IndexMap::new();
        map.insert(Value::Str("a".to_string()), Value::Int(1));
        let text = encode(&Value::new_dict(map), &config).unwrap();
        assert_eq!(text, "{a=1}\n");
    }

    #[test]
    fn encodes_a_block_dict_with_nested_list() {
        let config = EncoderConfig::default();
        let mut inner = IndexMap::new();
        inner.insert(Value::Str("city".to_string()), Value::Str("New York".to_string()));
        let mut outer = IndexMap::new();
        outer.insert(Value::Str("address".to_string()), Value::new_dict(inner));
        let text = encode(&Value::new_dict(outer), &config).unwrap();
        assert_eq!(text, "address =\n    city = New York\n");
    }

    #[test]
    fn rejects_circular_reference_without_circular_references_enabled() {
        let config = EncoderConfig::default();
        let list = Rc::new(std::cell::RefCell::new(Vec::new()));
        let value = Value::List(list.clone());
        list.borrow_mut().push(value.clone());
        assert!(encode(&value, &config).is_err());
    }
}
