//! Round-trip editor (C8) scenarios: invariant 6 (minimality) and the
//! refusal contracts from `spec.md` §4.8.

use bespon::roundtrip::{load_roundtrip_ast, PathElement};
use bespon::Value;

#[test]
fn invariant6_replace_val_changes_only_the_target_span() {
    let original = "a = 1\nb = 2\nc = 3\n";
    let mut rt = load_roundtrip_ast(original).unwrap();
    rt.replace_val(&[PathElement::Key(Value::Str("b".into()))], Value::Int(99)).unwrap();
    let dumped = rt.dumps();
    assert_eq!(dumped, "a = 1\nb = 99\nc = 3\n");

    // Every byte outside line 2 is untouched.
    let original_lines: Vec<&str> = original.lines().collect();
    let dumped_lines: Vec<&str> = dumped.lines().collect();
    assert_eq!(original_lines[0], dumped_lines[0]);
    assert_eq!(original_lines[2], dumped_lines[2]);
}

#[test]
fn replace_val_on_a_list_element() {
    let mut rt = load_roundtrip_ast("a = [1, 2, 3]\n").unwrap();
    rt.replace_val(
        &[PathElement::Key(Value::Str("a".into())), PathElement::Index(2)],
        Value::Int(7),
    )
    .unwrap();
    assert_eq!(rt.dumps(), "a = [1, 2, 7]\n");
}

#[test]
fn replace_val_reuses_the_original_quote_style_when_it_still_fits() {
    let mut rt = load_roundtrip_ast("a = 'hello'\n").unwrap();
    rt.replace_val(&[PathElement::Key(Value::Str("a".into()))], Value::Str("world".into())).unwrap();
    assert_eq!(rt.dumps(), "a = 'world'\n");
}

#[test]
fn replace_val_refuses_to_change_scalar_base_type() {
    let mut rt = load_roundtrip_ast("a = 1\n").unwrap();
    let err = rt.replace_val(&[PathElement::Key(Value::Str("a".into()))], Value::Str("x".into()));
    assert!(err.is_err());
}

#[test]
fn replace_val_refuses_a_tagged_node() {
    let mut rt = load_roundtrip_ast("a = (type=int)> 1\n").unwrap();
    let err = rt.replace_val(&[PathElement::Key(Value::Str("a".into()))], Value::Int(2));
    assert!(err.is_err());
}

#[test]
fn replace_key_renames_a_dict_entry() {
    let mut rt = load_roundtrip_ast("a = 1\nb = 2\n").unwrap();
    rt.replace_key(&[PathElement::Key(Value::Str("a".into()))], Value::Str("renamed".into())).unwrap();
    assert_eq!(rt.dumps(), "renamed = 1\nb = 2\n");
}

#[test]
fn multiple_edits_splice_independently_in_source_order() {
    let mut rt = load_roundtrip_ast("a = 1\nb = 2\nc = 3\n").unwrap();
    rt.replace_val(&[PathElement::Key(Value::Str("c".into()))], Value::Int(30)).unwrap();
    rt.replace_val(&[PathElement::Key(Value::Str("a".into()))], Value::Int(10)).unwrap();
    assert_eq!(rt.dumps(), "a = 10\nb = 2\nc = 30\n");
}

#[test]
fn replacing_the_same_path_twice_uses_the_latest_value() {
    let mut rt = load_roundtrip_ast("a = 1\n").unwrap();
    rt.replace_val(&[PathElement::Key(Value::Str("a".into()))], Value::Int(2)).unwrap();
    rt.replace_val(&[PathElement::Key(Value::Str("a".into()))], Value::Int(3)).unwrap();
    assert_eq!(rt.dumps(), "a = 3\n");
}

#[test]
fn unknown_path_is_an_error_not_a_panic() {
    let mut rt = load_roundtrip_ast("a = 1\n").unwrap();
    let err = rt.replace_val(&[PathElement::Key(Value::Str("missing".into()))], Value::Int(1));
    assert!(err.is_err());
}
