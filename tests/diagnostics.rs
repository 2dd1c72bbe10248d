use std::collections::HashMap;

use facet::Facet;
use facet_form::{ConvertError, Converters, Decoder, FormErrorKind, FormValues, WarningKind};
use facet_testhelpers::test;

#[derive(Facet, Debug, PartialEq)]
struct Form {
    name: String,
    age: u8,
}

#[test]
fn empty_input_maps_nothing() {
    let empty = FormValues::new();

    let error = facet_form::from_values::<Form>(&empty).unwrap_err();
    assert!(matches!(error.kind(), FormErrorKind::NoValuesMapped));
    assert!(error.warnings().is_empty());

    assert!(facet_form::from_values::<Vec<u8>>(&empty).is_err());
    assert!(facet_form::from_values::<HashMap<String, u8>>(&empty).is_err());
    assert!(facet_form::from_values::<[u8; 2]>(&empty).is_err());
}

#[test]
fn invalid_destinations() {
    let values = FormValues::from([("a", ["1"])]);

    for error in [
        facet_form::from_values::<u32>(&values).unwrap_err(),
        facet_form::from_values::<String>(&values).unwrap_err(),
        facet_form::from_values::<Option<Box<bool>>>(&values).unwrap_err(),
    ] {
        assert!(matches!(error.kind(), FormErrorKind::InvalidDestination(_)));
        assert!(error.warnings().is_empty());
    }
}

#[test]
fn every_key_failing_is_fatal() {
    let values = FormValues::from([("nope", ["1"]), ("age", ["old"]), ("name", [""])]);
    let error = facet_form::from_values::<Form>(&values).unwrap_err();
    assert!(matches!(error.kind(), FormErrorKind::NoValuesMapped));
    assert_eq!(
        error.to_string(),
        "no valid mappings found (source empty if this is the only error) (3 warnings)"
    );

    let warnings = error.into_warnings();
    assert_eq!(warnings[0].to_string(), "\"nope\": path is invalid");
    assert!(matches!(
        warnings[1].kind(),
        WarningKind::Conversion { value, source: ConvertError::Invalid(_), .. } if value == "old"
    ));
    assert!(matches!(
        warnings[2].kind(),
        WarningKind::Conversion {
            source: ConvertError::EmptyInput,
            ..
        }
    ));
}

#[test]
fn warnings_accompany_a_value() {
    let values = FormValues::from([("name", ["ada"]), ("age", ["300"]), ("name.first", ["x"])]);
    let decoded = facet_form::from_values::<Form>(&values).unwrap();
    assert_eq!(
        decoded.value,
        Form {
            name: "ada".to_string(),
            age: 0,
        }
    );
    assert_eq!(decoded.warnings.len(), 2);
    assert_eq!(decoded.warnings[0].key(), "age");
    assert_eq!(decoded.warnings[1].key(), "name.first");
}

#[test]
fn missing_converters_are_warnings() {
    #[derive(Facet, Debug)]
    struct Form {
        name: String,
        ratio: f32,
        by_flag: HashMap<bool, u8>,
    }

    let mut converters = Converters::empty();
    converters.register(|value: &str| Ok::<_, ConvertError>(value.to_string()));
    converters.register(|value: &str| value.parse::<u8>());
    let decoder = Decoder::new().with_converters(converters);

    let values = FormValues::from([("name", ["n"]), ("ratio", ["0.5"]), ("by_flag.true", ["1"])]);
    let decoded = decoder.decode::<Form>(&values).unwrap();
    assert_eq!(decoded.value.name, "n");
    assert_eq!(decoded.value.ratio, 0.0);
    assert!(decoded.value.by_flag.is_empty());

    assert_eq!(decoded.warnings.len(), 2);
    assert!(matches!(
        decoded.warnings[0].kind(),
        WarningKind::NoConverter(shape) if shape.is_type::<f32>()
    ));
    assert_eq!(decoded.warnings[1].key(), "by_flag");
    assert!(matches!(
        decoded.warnings[1].kind(),
        WarningKind::NoConverter(shape) if shape.is_type::<bool>()
    ));
}
