//! Integration tests for instance validation.

use schema_graph::{SchemaLoader, ValidationError, ValidationErrorKind, Validator};
use serde_json::{json, Value};

fn validator(schema: Value) -> Validator {
    SchemaLoader::new()
        .load(&schema)
        .unwrap()
        .validator()
        .unwrap()
}

fn errors(schema: Value, instance: Value) -> ValidationError {
    validator(schema).validate(&instance).unwrap_err()
}

// === Scenarios ===

mod scenarios {
    use super::*;

    #[test]
    fn bounded_integer() {
        let v = validator(json!({"type": "integer", "minimum": 0, "maximum": 10}));
        assert!(v.is_valid(&json!(5)));
        assert!(v.is_valid(&json!(10.0)));

        let err = v.validate(&json!(-1)).unwrap_err();
        assert_eq!(err.violation_count(), 1);
        assert_eq!(err.keyword.as_deref(), Some("minimum"));
        assert_eq!(err.pointer_to_violation.to_uri_fragment(), "#");
    }

    #[test]
    fn required_and_property_type() {
        let schema = json!({
            "type": "object",
            "required": ["a"],
            "properties": {"a": {"type": "string"}}
        });

        let err = errors(schema.clone(), json!({}));
        assert_eq!(err.keyword.as_deref(), Some("required"));
        assert_eq!(err.message, "required key [a] not found");

        let err = errors(schema, json!({"a": 1}));
        assert_eq!(err.keyword.as_deref(), Some("type"));
        assert_eq!(err.pointer_to_violation.to_uri_fragment(), "#/a");
    }

    #[test]
    fn self_reference_by_alias() {
        let v = validator(json!({"$id": "#root", "properties": {"x": {"$ref": "#root"}}}));
        assert!(v.is_valid(&json!({"x": {"x": {}}})));

        let typed = validator(json!({
            "$id": "#node",
            "type": "object",
            "properties": {"x": {"$ref": "#node"}}
        }));
        assert!(typed.is_valid(&json!({"x": {"x": {"x": {}}}})));
        let err = typed.validate(&json!({"x": {"x": 1}})).unwrap_err();
        assert_eq!(err.pointer_to_violation.to_uri_fragment(), "#/x/x");
    }

    #[test]
    fn one_of_counts_matches() {
        let v = validator(json!({"oneOf": [{"type": "string"}, {"type": "number"}]}));
        assert!(v.is_valid(&json!("a")));

        let err = v.validate(&json!(true)).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::OneOfFailure);
        assert!(err.message.contains("0 subschemas matched"));
        assert_eq!(err.causes.len(), 2);
    }

    #[test]
    fn tuple_with_additional_items_forbidden() {
        let v = validator(json!({"items": [{"type": "string"}], "additionalItems": false}));
        assert!(v.is_valid(&json!(["a"])));

        let err = v.validate(&json!(["a", "b"])).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::AdditionalItems);
        assert_eq!(err.pointer_to_violation.to_uri_fragment(), "#/1");
    }
}

// === Combinators ===

mod combinators {
    use super::*;

    fn branches(mask: u32, n: u32) -> Vec<Value> {
        (0..n).map(|i| json!(mask & (1 << i) != 0)).collect()
    }

    #[test]
    fn laws_hold_for_two_and_three_branches() {
        for n in [2u32, 3] {
            for mask in 0..(1u32 << n) {
                let passing = mask.count_ones();
                let instance = json!({"any": "value"});

                let all_of = validator(json!({"allOf": branches(mask, n)}));
                assert_eq!(all_of.is_valid(&instance), passing == n, "allOf n={n} mask={mask:b}");

                let any_of = validator(json!({"anyOf": branches(mask, n)}));
                assert_eq!(any_of.is_valid(&instance), passing >= 1, "anyOf n={n} mask={mask:b}");

                let one_of = validator(json!({"oneOf": branches(mask, n)}));
                assert_eq!(one_of.is_valid(&instance), passing == 1, "oneOf n={n} mask={mask:b}");
            }
        }
    }

    #[test]
    fn all_of_reports_each_failed_branch() {
        let err = errors(
            json!({"allOf": [{"minimum": 10}, {"multipleOf": 3}, {"type": "number"}]}),
            json!(4),
        );
        assert_eq!(err.kind, ValidationErrorKind::AllOfFailure);
        assert_eq!(err.message, "2 of 3 subschemas failed to match");
        assert_eq!(err.causes.len(), 2);
    }

    #[test]
    fn one_of_with_several_matches() {
        let err = errors(json!({"oneOf": [{"type": "integer"}, {"minimum": 0}]}), json!(3));
        assert_eq!(err.message, "2 subschemas matched instead of one");
    }

    #[test]
    fn not_inverts() {
        let v = validator(json!({"not": {"type": "string"}}));
        assert!(v.is_valid(&json!(1)));
        let err = v.validate(&json!("s")).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Not);
        assert_eq!(err.message, "subject must not be valid against schema");
    }

    #[test]
    fn dependencies_both_forms() {
        let v = validator(json!({
            "dependencies": {
                "card": ["billing"],
                "name": {"required": ["first"]}
            }
        }));
        assert!(v.is_valid(&json!({"card": 1, "billing": 2})));
        assert!(!v.is_valid(&json!({"card": 1})));
        assert!(!v.is_valid(&json!({"name": "x"})));
        assert!(v.is_valid(&json!({"name": "x", "first": "y"})));
        assert!(v.is_valid(&json!({"other": true})));
    }

    #[test]
    fn contains_needs_one_match() {
        let v = validator(json!({"contains": {"type": "string"}}));
        assert!(v.is_valid(&json!([1, "a"])));
        assert!(!v.is_valid(&json!([1, 2])));
        assert!(!v.is_valid(&json!([])));
    }
}

// === Keywords ===

mod keywords {
    use super::*;

    #[test]
    fn multiple_of_is_exact() {
        let v = validator(json!({"multipleOf": 0.01}));
        assert!(v.is_valid(&json!(0.3)));
        assert!(v.is_valid(&json!(19.99)));
        assert!(!v.is_valid(&json!(0.001)));

        let v = validator(json!({"multipleOf": 0.1}));
        assert!(v.is_valid(&json!(1e308)));
        assert!(!v.is_valid(&json!(1e-300)));
    }

    #[test]
    fn exclusive_bounds_in_each_draft() {
        let v4 = validator(json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "minimum": 0,
            "exclusiveMinimum": true
        }));
        assert!(!v4.is_valid(&json!(0)));
        assert!(v4.is_valid(&json!(0.5)));

        let v6 = validator(json!({"exclusiveMaximum": 5, "maximum": 10}));
        assert!(!v6.is_valid(&json!(5)));
        assert!(v6.is_valid(&json!(4.99)));
    }

    #[test]
    fn lengths_count_code_points() {
        let v = validator(json!({"maxLength": 2, "minLength": 2}));
        assert!(v.is_valid(&json!("日本")));
        assert!(v.is_valid(&json!("👍👍")));
        assert!(!v.is_valid(&json!("👍")));
    }

    #[test]
    fn enum_and_unique_items_compare_numbers_by_value() {
        let v = validator(json!({"enum": [1, "one", [1.0]]}));
        assert!(v.is_valid(&json!(1.0)));
        assert!(v.is_valid(&json!([1])));
        assert!(!v.is_valid(&json!("1")));

        let v = validator(json!({"uniqueItems": true}));
        assert!(!v.is_valid(&json!([1, 1.0])));
        assert!(v.is_valid(&json!([{"a": 1}, {"a": 2}])));
    }

    #[test]
    fn additional_properties_against_patterns() {
        let v = validator(json!({
            "properties": {"id": {}},
            "patternProperties": {"^x-": {"type": "string"}},
            "additionalProperties": false
        }));
        assert!(v.is_valid(&json!({"id": 1, "x-note": "ok"})));

        let err = v.validate(&json!({"id": 1, "x-note": 2, "other": 3})).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::MultipleFailures);
        let messages = err.all_messages();
        assert!(messages.iter().any(|m| m.contains("extraneous key [other] is not permitted")));
        assert!(messages.iter().any(|m| m.contains("#/x-note")));
    }

    #[test]
    fn additional_properties_schema() {
        let v = validator(json!({"additionalProperties": {"type": "integer"}}));
        assert!(v.is_valid(&json!({"a": 1})));
        let err = v.validate(&json!({"a": "x"})).unwrap_err();
        assert_eq!(err.pointer_to_violation.to_uri_fragment(), "#/a");
    }

    #[test]
    fn property_names() {
        let v = validator(json!({"propertyNames": {"maxLength": 3}}));
        assert!(v.is_valid(&json!({"abc": 1})));
        let err = v.validate(&json!({"abcd": 1})).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::PropertyNames);
    }

    #[test]
    fn const_keyword() {
        let v = validator(json!({"const": {"a": [1, 2]}}));
        assert!(v.is_valid(&json!({"a": [1.0, 2]})));
        assert!(!v.is_valid(&json!({"a": [2, 1]})));
    }

    #[test]
    fn formats() {
        let v = validator(json!({
            "properties": {
                "when": {"format": "date-time"},
                "host": {"format": "hostname"},
                "mail": {"format": "email"}
            }
        }));
        assert!(v.is_valid(&json!({
            "when": "2024-01-15T10:30:00Z",
            "host": "example.com",
            "mail": "a@example.com"
        })));
        let err = v.validate(&json!({"when": "yesterday"})).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Format);
        assert_eq!(err.keyword.as_deref(), Some("format"));
    }
}

// === Draft 3 ===

mod draft3 {
    use super::*;

    const DRAFT3: &str = "http://json-schema.org/draft-03/schema#";

    #[test]
    fn property_level_required() {
        let v = validator(json!({
            "$schema": DRAFT3,
            "properties": {
                "a": {"type": "string", "required": true},
                "b": {"type": "string"}
            }
        }));
        assert!(v.is_valid(&json!({"a": "x"})));
        let err = v.validate(&json!({"b": "x"})).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Required);
    }

    #[test]
    fn type_union_with_schemas() {
        let v = validator(json!({
            "$schema": DRAFT3,
            "type": ["string", {"type": "integer", "minimum": 10}]
        }));
        assert!(v.is_valid(&json!("s")));
        assert!(v.is_valid(&json!(11)));
        assert!(!v.is_valid(&json!(5)));
    }

    #[test]
    fn disallow_and_divisible_by() {
        let v = validator(json!({"$schema": DRAFT3, "disallow": ["string"], "divisibleBy": 2}));
        assert!(v.is_valid(&json!(4)));
        assert!(!v.is_valid(&json!(3)));
        let err = v.validate(&json!("s")).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Disallow);
    }

    #[test]
    fn extends_applies_parent() {
        let v = validator(json!({"$schema": DRAFT3, "extends": {"minimum": 3}}));
        assert!(v.is_valid(&json!(3)));
        assert!(!v.is_valid(&json!(2)));
    }
}

// === Sharing ===

#[test]
fn validator_is_shareable_across_threads() {
    let v = validator(json!({"type": "array", "items": {"type": "integer"}}));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let v = v.clone();
            std::thread::spawn(move || v.is_valid(&json!([i, i + 1])))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
