//! Concrete decoding scenarios (S1-S6) and the invariants tied directly to
//! a single decode call.

use bespon::{decode, Error};
use rstest::rstest;

// =============================================================================
// S1 - JSON superset
// =============================================================================

#[test]
fn s1_json_superset() {
    let value = decode(r#"{"a":1,"b":[true,null,"x"]}"#).unwrap();
    let dict = value.as_dict_handle().unwrap().borrow();
    assert_eq!(dict.get(&bespon::Value::Str("a".into())), Some(&bespon::Value::Int(1)));
    let b = dict.get(&bespon::Value::Str("b".into())).unwrap().as_list_handle().unwrap().borrow();
    assert_eq!(
        *b,
        vec![bespon::Value::Bool(true), bespon::Value::None, bespon::Value::Str("x".into())]
    );
}

// =============================================================================
// S2 - Indented key-value
// =============================================================================

#[test]
fn s2_indented_key_value() {
    let text = "firstName = John\naddress =\n    city = New York\n    postalCode = 10021-3100\n";
    let value = decode(text).unwrap();
    let dict = value.as_dict_handle().unwrap().borrow();
    assert_eq!(dict.get(&bespon::Value::Str("firstName".into())), Some(&bespon::Value::Str("John".into())));
    let address = dict.get(&bespon::Value::Str("address".into())).unwrap().as_dict_handle().unwrap().borrow();
    assert_eq!(address.get(&bespon::Value::Str("city".into())), Some(&bespon::Value::Str("New York".into())));
    assert_eq!(
        address.get(&bespon::Value::Str("postalCode".into())),
        Some(&bespon::Value::Str("10021-3100".into()))
    );
}

// =============================================================================
// S3 - Block string with trailing-newline control
// =============================================================================

#[rstest]
#[case("x = |===\nline1\nline2\n===|/\n", "line1\nline2\n")]
#[case("x = |===\nline1\nline2\n===|//\n", "line1\nline2")]
fn s3_block_string_trailing_newline(#[case] input: &str, #[case] expected: &str) {
    let value = decode(input).unwrap();
    let dict = value.as_dict_handle().unwrap().borrow();
    assert_eq!(dict.get(&bespon::Value::Str("x".into())), Some(&bespon::Value::Str(expected.into())));
}

// =============================================================================
// S4 - Tag + label + alias
// =============================================================================

#[test]
fn s4_tag_label_alias() {
    let value = decode("x = (list, label=items)> [1; 2; 3]\ny = $items\n").unwrap();
    let dict = value.as_dict_handle().unwrap().borrow();
    let x = dict.get(&bespon::Value::Str("x".into())).unwrap();
    let y = dict.get(&bespon::Value::Str("y".into())).unwrap();
    let x_items: Vec<bespon::Value> = x.as_list_handle().unwrap().borrow().clone();
    assert_eq!(x_items, vec![bespon::Value::Int(1), bespon::Value::Int(2), bespon::Value::Int(3)]);
    assert!(x.is_identical(y), "y = $items should reference the same collection as x");
}

// =============================================================================
// S5 - Key path
// =============================================================================

#[test]
fn s5_key_path() {
    let value = decode("a.b.c = 1\n").unwrap();
    let a = value.as_dict_handle().unwrap().borrow();
    let b = a.get(&bespon::Value::Str("a".into())).unwrap().as_dict_handle().unwrap().borrow();
    let c = b.get(&bespon::Value::Str("b".into())).unwrap().as_dict_handle().unwrap().borrow();
    assert_eq!(c.get(&bespon::Value::Str("c".into())), Some(&bespon::Value::Int(1)));
}

// =============================================================================
// S6 / invariant 4 - duplicate-key rejection
// =============================================================================

#[rstest]
#[case("{a=1; a=2}")]
#[case("a = 1\na = 2\n")]
fn s6_duplicate_key_rejection(#[case] input: &str) {
    let err = decode(input).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }), "expected a Parse error, got {:?}", err);
}

// =============================================================================
// Invariant 7 - invalid-literal detection
// =============================================================================

#[test]
fn invariant7_invalid_literal_is_reported_with_its_location() {
    // U+0001 (SOH) is a C0 control character outside the permitted set and
    // is never valid unescaped in source text.
    let input = "a = b\u{0001}c\n";
    let err = decode(input).unwrap_err();
    match err {
        Error::InvalidLiteral { traceback, .. } => {
            assert_eq!(traceback.span.first_line, 1);
        }
        other => panic!("expected InvalidLiteral, got {:?}", other),
    }
}
