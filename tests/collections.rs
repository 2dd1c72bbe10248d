use std::collections::{BTreeMap, HashMap};

use facet::Facet;
use facet_form::{Decoder, FormValues, WarningKind};
use facet_testhelpers::test;

// ============================================================================
// Maps
// ============================================================================

#[test]
fn map_int_bool() {
    let values = FormValues::from([("1", ["True"]), ("0", ["False"])]);
    let decoded = facet_form::from_values::<HashMap<i32, bool>>(&values).unwrap();
    assert!(decoded.warnings.is_empty());
    assert_eq!(decoded.value.len(), 2);
    assert_eq!(decoded.value.get(&0), Some(&false));
    assert_eq!(decoded.value.get(&1), Some(&true));
}

#[test]
fn map_of_structs() {
    #[derive(Facet, Debug, PartialEq)]
    struct Contact {
        email: String,
        age: u8,
    }

    let values = FormValues::from([
        ("ada.email", ["ada@example.com"]),
        ("ada.age", ["36"]),
        ("alan.email", ["alan@example.com"]),
    ]);
    let contacts = facet_form::from_values::<BTreeMap<String, Contact>>(&values)
        .unwrap()
        .value;
    assert_eq!(contacts.len(), 2);
    assert_eq!(contacts["ada"].age, 36);
    assert_eq!(contacts["alan"].email, "alan@example.com");
    assert_eq!(contacts["alan"].age, 0);
}

#[test]
fn bad_map_keys_are_skipped() {
    let values = FormValues::from([("1", ["a"]), ("one", ["b"])]);
    let decoded = facet_form::from_values::<HashMap<u8, String>>(&values).unwrap();
    assert_eq!(decoded.value.len(), 1);
    assert_eq!(decoded.value[&1], "a");

    assert_eq!(decoded.warnings.len(), 1);
    assert_eq!(decoded.warnings[0].key(), "one");
    assert!(matches!(
        decoded.warnings[0].kind(),
        WarningKind::MapKey { token, .. } if token == "one"
    ));
}

// ============================================================================
// Lists
// ============================================================================

#[test]
fn sparse_list_container() {
    let values = FormValues::from([("0", ["42"]), ("1", ["42"]), ("3", ["42"]), ("4", ["42"])]);
    let decoded = facet_form::from_values::<Vec<i32>>(&values).unwrap();
    assert!(decoded.warnings.is_empty());
    assert_eq!(decoded.value, [42, 42, 0, 42, 42]);
}

#[test]
fn list_value() {
    #[derive(Facet, Debug)]
    struct Container {
        list: Vec<i32>,
    }

    let values = FormValues::from([("list", ["2", "4", "6"])]);
    let decoded = facet_form::from_values::<Container>(&values).unwrap();
    assert!(decoded.warnings.is_empty());
    assert_eq!(decoded.value.list, [2, 4, 6]);
}

#[test]
fn failed_elements_keep_their_position() {
    #[derive(Facet, Debug)]
    struct Container {
        list: Vec<i32>,
        optional: Vec<Option<i32>>,
    }

    let values = FormValues::from([("list", vec!["1", "x", "3"]), ("optional", vec!["", "5"])]);
    let decoded = facet_form::from_values::<Container>(&values).unwrap();
    assert_eq!(decoded.value.list, [1, 0, 3]);
    assert_eq!(decoded.value.optional, [None, Some(5)]);

    assert_eq!(decoded.warnings.len(), 2);
    assert!(matches!(
        decoded.warnings[0].kind(),
        WarningKind::ElementConversion { index: 1, value, .. } if value == "x"
    ));
    assert!(matches!(
        decoded.warnings[1].kind(),
        WarningKind::ElementConversion { index: 0, .. }
    ));
}

#[test]
fn list_of_structs() {
    #[derive(Facet, Debug, PartialEq)]
    struct Line {
        sku: String,
        qty: u32,
    }

    let values = FormValues::from([
        ("lines.1.sku", ["b"]),
        ("lines.0.sku", ["a"]),
        ("lines.1.qty", ["2"]),
    ]);

    #[derive(Facet, Debug)]
    struct Order {
        lines: Vec<Line>,
    }

    let order = facet_form::from_values::<Order>(&values).unwrap().value;
    assert_eq!(
        order.lines,
        [
            Line {
                sku: "a".to_string(),
                qty: 0,
            },
            Line {
                sku: "b".to_string(),
                qty: 2,
            },
        ]
    );
}

#[test]
fn bad_indices_are_reported() {
    let values = FormValues::from([("0", ["1"]), ("first", ["2"]), ("-3", ["3"])]);
    let decoded = facet_form::from_values::<Vec<u8>>(&values).unwrap();
    assert_eq!(decoded.value, [1]);

    let kinds: Vec<_> = decoded.warnings.iter().map(|w| w.kind()).collect();
    assert!(matches!(kinds[0], WarningKind::BadIndex(token) if token == "first"));
    assert!(matches!(
        kinds[1],
        WarningKind::IndexOutOfBounds { len: None, .. }
    ));
}

#[test]
fn indexed_keys_replace_list_values() {
    #[derive(Facet, Debug)]
    struct Container {
        list: Vec<u8>,
    }

    let values = FormValues::from([("list", vec!["1", "2", "3"]), ("list.1", vec!["9"])]);
    let container = facet_form::from_values::<Container>(&values).unwrap().value;
    assert_eq!(container.list, [0, 9]);
}

// ============================================================================
// Fixed arrays
// ============================================================================

#[test]
fn array_container() {
    let values = FormValues::from([("0", ["42"]), ("1", ["42"]), ("3", ["42"]), ("4", ["42"])]);
    let decoded = facet_form::from_values::<[i32; 5]>(&values).unwrap();
    assert!(decoded.warnings.is_empty());
    assert_eq!(decoded.value, [42, 42, 0, 42, 42]);
}

#[test]
fn array_value() {
    #[derive(Facet, Debug)]
    struct Container {
        array: [i32; 3],
        boxed: Option<Box<[i32; 3]>>,
    }

    let values = FormValues::from([("array", ["2", "4", "6"]), ("boxed", ["8", "10", "12"])]);
    let decoded = facet_form::from_values::<Container>(&values).unwrap();
    assert!(decoded.warnings.is_empty());
    assert_eq!(decoded.value.array, [2, 4, 6]);
    assert_eq!(decoded.value.boxed.as_deref(), Some(&[8, 10, 12]));
}

#[test]
fn array_index_out_of_bounds() {
    #[derive(Facet, Debug)]
    struct Container {
        array: [u8; 3],
        name: String,
    }

    let values = FormValues::from([("array.5", ["1"]), ("name", ["n"])]);
    let decoded = facet_form::from_values::<Container>(&values).unwrap();
    assert_eq!(decoded.value.array, [0, 0, 0]);
    assert_eq!(decoded.warnings.len(), 1);
    assert_eq!(decoded.warnings[0].key(), "array.5");
    assert!(matches!(
        decoded.warnings[0].kind(),
        WarningKind::IndexOutOfBounds { len: Some(3), .. }
    ));
    assert_eq!(
        decoded.warnings[0].to_string(),
        "\"array.5\": index out of bounds: \"5\" (length 3)"
    );
}

#[test]
fn array_values_and_indexed_keys_merge() {
    let values = FormValues::from([("fixed", vec!["1", "2", "3", "4"]), ("fixed.0", vec!["9"])]);

    #[derive(Facet, Debug)]
    struct Container {
        fixed: [u8; 3],
    }

    let decoded = facet_form::from_values::<Container>(&values).unwrap();
    assert_eq!(decoded.value.fixed, [9, 2, 3]);
    assert_eq!(decoded.warnings.len(), 1);
    assert!(matches!(
        decoded.warnings[0].kind(),
        WarningKind::IndexOutOfBounds { len: Some(3), .. }
    ));
}

// ============================================================================
// Tokens naming the same slot
// ============================================================================

#[derive(Facet, Debug, PartialEq)]
struct Rec {
    a: String,
    b: String,
}

#[test]
fn equal_map_keys_share_one_entry() {
    let values = FormValues::from([("1.a", ["x"]), ("01.b", ["y"]), ("2.a", ["z"])]);
    let decoded = facet_form::from_values::<HashMap<i32, Box<Rec>>>(&values).unwrap();
    assert!(decoded.warnings.is_empty());
    assert_eq!(decoded.value.len(), 2);
    assert_eq!(
        *decoded.value[&1],
        Rec {
            a: "x".to_string(),
            b: "y".to_string(),
        }
    );
    assert_eq!(decoded.value[&2].a, "z");
}

#[test]
fn later_equal_map_key_overwrites_shared_fields() {
    let values = FormValues::from([("1.a", ["x"]), ("+1.a", ["w"]), ("01.b", ["y"])]);
    let decoded = facet_form::from_values::<BTreeMap<u8, Rec>>(&values).unwrap();
    assert_eq!(
        decoded.value[&1],
        Rec {
            a: "w".to_string(),
            b: "y".to_string(),
        }
    );
}

#[test]
fn equal_indices_share_one_slot() {
    #[derive(Facet, Debug)]
    struct Container {
        fixed: [Rec; 2],
        list: Vec<Rec>,
    }

    let values = FormValues::from([
        ("fixed.1.a", ["x"]),
        ("fixed.01.b", ["y"]),
        ("list.0.a", ["p"]),
        ("list.00.b", ["q"]),
    ]);
    let decoded = facet_form::from_values::<Container>(&values).unwrap();
    assert!(decoded.warnings.is_empty());
    assert_eq!(
        decoded.value.fixed[1],
        Rec {
            a: "x".to_string(),
            b: "y".to_string(),
        }
    );
    assert_eq!(decoded.value.fixed[0].a, "");
    assert_eq!(
        decoded.value.list,
        [Rec {
            a: "p".to_string(),
            b: "q".to_string(),
        }]
    );
}

// ============================================================================
// Index limits
// ============================================================================

#[derive(Facet, Debug)]
struct Items {
    items: Vec<u8>,
    name: String,
}

#[test]
fn huge_list_index_is_rejected() {
    let values = FormValues::from([
        ("items.4000000000", ["1"]),
        ("items.1", ["2"]),
        ("name", ["n"]),
    ]);
    let decoded = facet_form::from_values::<Items>(&values).unwrap();
    assert_eq!(decoded.value.items, [0, 2]);
    assert_eq!(decoded.warnings.len(), 1);
    assert_eq!(decoded.warnings[0].key(), "items.4000000000");
    assert!(matches!(
        decoded.warnings[0].kind(),
        WarningKind::IndexOutOfBounds { len: None, .. }
    ));
}

#[test]
fn max_index_is_configurable() {
    let decoder = Decoder::new().with_max_index(3);
    assert_eq!(decoder.max_index(), 3);

    let values = FormValues::from([("items.3", ["1"]), ("items.4", ["2"]), ("name", ["n"])]);
    let decoded = decoder.decode::<Items>(&values).unwrap();
    assert_eq!(decoded.value.items, [0, 0, 0, 1]);
    assert_eq!(decoded.warnings.len(), 1);
    assert_eq!(
        decoded.warnings[0].to_string(),
        "\"items.4\": index out of bounds: \"4\""
    );

    let at_default = FormValues::from([(
        format!("items.{}", Decoder::DEFAULT_MAX_INDEX),
        ["1"],
    )]);
    let decoded = facet_form::from_values::<Items>(&at_default).unwrap();
    assert_eq!(decoded.value.items.len(), Decoder::DEFAULT_MAX_INDEX + 1);
}
