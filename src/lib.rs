//! BespON: a human-editable configuration and data-interchange format that
//! augments the broad shape of JSON/YAML with explicit typing via tags,
//! labels/aliases with copy semantics, key paths and sections, multiple
//! quoting styles, doc comments, and round-trip editing.
//!
//! The pipeline mirrors the component breakdown: [`grammar`] (C1) and
//! [`escape`] (C2) underlie the [`parser`] (C4), which builds an [`ast`]
//! (C5) directly; [`resolver`] (C6) turns that AST into a [`value`] tree
//! using [`types`] (C3); [`encoder`] (C7) serializes a value tree back to
//! text; [`roundtrip`] (C8) edits an AST in place and splices only the
//! changed spans back into the original source.

pub mod ast;
pub mod config;
pub mod encoder;
pub mod error;
pub mod escape;
pub mod grammar;
pub mod parser;
pub mod resolver;
pub mod roundtrip;
pub mod types;
pub mod value;

pub use config::{DecoderConfig, EncoderConfig};
pub use error::Error;
pub use value::Value;

/// Parses `text` and resolves it straight to a [`Value`] tree, using
/// default decoder options.
pub fn decode(text: &str) -> Result<Value, Error> {
    decode_with(text, "<string>", &DecoderConfig::default())
}

/// Parses `text` under an explicit [`DecoderConfig`], naming the source
/// `source_name` for error tracebacks.
pub fn decode_with(text: &str, source_name: &str, config: &DecoderConfig) -> Result<Value, Error> {
    config.validate()?;
    let mut parsed = parser::parse(text, source_name, config)?;
    resolver::resolve(&mut parsed.ast, parsed.source, config)
}

/// Parses `text` into its full AST, with source spans retained, without
/// resolving it to a value tree. Used by callers that want tags, labels, or
/// positions, or as the input to [`roundtrip`].
pub fn decode_to_ast(text: &str) -> Result<ast::Ast, Error> {
    decode_to_ast_with(text, "<string>", &DecoderConfig::default())
}

pub fn decode_to_ast_with(text: &str, source_name: &str, config: &DecoderConfig) -> Result<ast::Ast, Error> {
    config.validate()?;
    Ok(parser::parse(text, source_name, config)?.ast)
}

/// Serializes `value` to BespON text under default encoder options.
pub fn encode(value: &Value) -> Result<String, Error> {
    encoder::encode(value, &EncoderConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_json_superset_document() {
        let value = decode(r#"{a=1, b=[true, null, "x"]}"#).unwrap();
        let dict = value.as_dict_handle().unwrap().borrow();
        assert_eq!(dict.get(&Value::Str("a".to_string())), Some(&Value::Int(1)));
        let b = dict.get(&Value::Str("b".to_string())).unwrap().as_list_handle().unwrap().borrow();
        assert_eq!(*b, vec![Value::Bool(true), Value::None, Value::Str("x".to_string())]);
    }

    #[test]
    fn decodes_indented_key_value_pairs() {
        let text = "firstName = John\naddress =\n    city = New York\n    postalCode = 10021-3100\n";
        let value = decode(text).unwrap();
        let dict = value.as_dict_handle().unwrap().borrow();
        assert_eq!(dict.get(&Value::Str("firstName".to_string())), Some(&Value::Str("John".to_string())));
        let address = dict.get(&Value::Str("address".to_string())).unwrap();
        let address = address.as_dict_handle().unwrap().borrow();
        assert_eq!(address.get(&Value::Str("city".to_string())), Some(&Value::Str("New York".to_string())));
    }

    #[test]
    fn decodes_a_key_path() {
        let value = decode("a.b.c = 1\n").unwrap();
        let a = value.as_dict_handle().unwrap().borrow();
        let b = a.get(&Value::Str("a".to_string())).unwrap().as_dict_handle().unwrap().borrow();
        let c = b.get(&Value::Str("b".to_string())).unwrap().as_dict_handle().unwrap().borrow();
        assert_eq!(c.get(&Value::Str("c".to_string())), Some(&Value::Int(1)));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = decode("{a=1, a=2}").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
