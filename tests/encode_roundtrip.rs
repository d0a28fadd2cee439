//! Invariant 2 (decode/encode round-trip for canonical values) and
//! invariant 5 (alias materialization survives an encode/decode cycle).

use bespon::{decode, encode, Value};
use indexmap::IndexMap;
use proptest::prelude::*;
use rstest::rstest;

fn leaf_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::None),
        any::<bool>().prop_map(Value::Bool),
        any::<i16>().prop_map(|n| Value::Int(n as i64)),
        (-2000i32..2000i32).prop_map(|n| Value::Float(n as f64 * 0.5)),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::Str),
    ]
}

fn value_tree() -> impl Strategy<Value = Value> {
    leaf_value().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::new_list),
            prop::collection::vec(("[a-z][a-z0-9]{0,6}", inner.clone()), 0..4).prop_map(|pairs| {
                let mut map = IndexMap::new();
                for (k, v) in pairs {
                    map.insert(Value::Str(k), v);
                }
                Value::new_dict(map)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn invariant2_decode_of_encode_is_identity(value in value_tree()) {
        let text = encode(&value).expect("encoding a canonical value never fails");
        let round_tripped = decode(&text).expect("encoder output must always be valid BespON");
        prop_assert_eq!(round_tripped, value);
    }
}

// =============================================================================
// Invariant 5 - alias materialization
// =============================================================================

#[rstest]
#[case("x = (list, label=items)> [1; 2; 3]\ny = $items\n", true)]
#[case("x = (list, label=items)> [1; 2; 3]\ny = (copy)> $items\n", false)]
fn invariant5_alias_materialization(#[case] input: &str, #[case] expect_identical: bool) {
    let value = decode(input).unwrap();
    let dict = value.as_dict_handle().unwrap().borrow();
    let x = dict.get(&Value::Str("x".into())).unwrap();
    let y = dict.get(&Value::Str("y".into())).unwrap();
    assert_eq!(x, y, "a copy must still be structurally equal");
    assert_eq!(x.is_identical(y), expect_identical);
}

#[test]
fn encode_round_trips_a_shared_alias_by_default() {
    let value = decode("x = (list, label=items)> [1; 2; 3]\ny = $items\n").unwrap();
    let text = encode(&value).unwrap();
    let round_tripped = decode(&text).unwrap();
    let dict = round_tripped.as_dict_handle().unwrap().borrow();
    let x = dict.get(&Value::Str("x".into())).unwrap();
    let y = dict.get(&Value::Str("y".into())).unwrap();
    assert!(x.is_identical(y), "encoder must emit an alias, not a duplicated copy, for a shared collection");
}
