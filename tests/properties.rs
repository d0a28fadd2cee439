//! Property-based tests for invariants 1 and 3 (`spec.md` §8).

use bespon::escape::{escape_unicode, unescape_unicode, DelimChar, EscapeForm, UnescapeOptions};
use bespon::{decode, encode};
use proptest::prelude::*;
use rstest::rstest;

// =============================================================================
// Invariant 1 - escape round trip
// =============================================================================

proptest! {
    #[test]
    fn invariant1_escape_round_trip(s in "[ -~]{0,40}", inline in any::<bool>()) {
        for delim in [DelimChar::Single, DelimChar::Double] {
            let escaped = escape_unicode(&s, delim, false, false, inline, false, EscapeForm::default(), true);
            let unescaped = unescape_unicode(&escaped, "<test>", None, UnescapeOptions::default())
                .expect("escaped output must always be valid to unescape");
            prop_assert_eq!(unescaped, s.clone());
        }
    }

    #[test]
    fn invariant1_escape_round_trip_all_fallback_tier(s in "[ -~]{0,40}") {
        // `all = true` is the encoder's final escaped-delimiter fallback:
        // every code point goes through the escape table regardless of
        // whether it strictly needs one, so it must still round-trip.
        let escaped = escape_unicode(&s, DelimChar::Double, true, true, false, false, EscapeForm::default(), true);
        let unescaped = unescape_unicode(&escaped, "<test>", None, UnescapeOptions::default()).unwrap();
        prop_assert_eq!(unescaped, s);
    }
}

// =============================================================================
// Invariant 3 - indentation idempotence
// =============================================================================

#[rstest]
#[case(r#"{"a":1,"b":[true,null,"x"]}"#)]
#[case("firstName = John\naddress =\n    city = New York\n    postalCode = 10021-3100\n")]
#[case("a.b.c = 1\n")]
#[case("nested = [[1, 2], [3, [4, 5]]]\n")]
#[case("deep =\n    a =\n        b =\n            c = 1\n")]
fn invariant3_indentation_idempotence(#[case] input: &str) {
    let value = decode(input).unwrap();
    let pretty = encode(&value).unwrap();
    let reparsed = decode(&pretty).unwrap();
    assert_eq!(reparsed, value, "re-parsing the pretty-printed form must yield the same value tree");

    // Encoding the re-parsed tree again must produce byte-identical text:
    // the pretty-printer has reached a fixed point.
    let pretty_again = encode(&reparsed).unwrap();
    assert_eq!(pretty, pretty_again);
}
