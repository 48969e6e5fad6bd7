//! Scope/Code Normalizer.
//!
//! Converts caller-side callables into values the server can execute. The
//! conversion happens once, where a builder reads the caller's input; command
//! assembly only ever sees already-normalized values.

use crate::{Document, Value};

/// Normalizes a value that may hold executable snippets.
///
/// - A callable becomes a [`Code`](crate::Code) value with no scope.
/// - A document has its *direct* callable entries converted; nested
///   documents and all other entries pass through unchanged.
/// - Anything else is returned unchanged.
///
/// Arrays are never descended into. Applying this function to its own
/// output returns the same value.
pub fn normalize_code(value: Value) -> Value {
    match value {
        Value::Function(f) => Value::Code(f.to_code()),
        Value::Document(doc) => Value::Document(normalize_scope(doc)),
        other => other,
    }
}

/// Converts the callable entries of a scope mapping to code values.
///
/// Takes the mapping by value, so a caller that wants to keep its original
/// passes a clone; the caller's structure is never rewritten in place.
pub fn normalize_scope(scope: Document) -> Document {
    scope
        .into_iter()
        .map(|(key, value)| match value {
            Value::Function(f) => (key, Value::Code(f.to_code())),
            other => (key, other),
        })
        .collect()
}

/// Replaces a callable with its source text; other values are unchanged.
///
/// Used for the `map`, `reduce` and `finalize` fields of a map/reduce command
/// and the `finalize` field of a group command, which the server accepts as
/// plain source text.
pub fn function_source(value: Value) -> Value {
    match value {
        Value::Function(f) => Value::String(f.source().to_owned()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Code, Function};
    use proptest::prelude::*;

    #[test]
    fn callables_become_code_without_scope() {
        let value = normalize_code(Value::Function(Function::new("function() { return 1; }")));
        assert_eq!(value, Value::Code(Code::new("function() { return 1; }")));
    }

    #[test]
    fn only_direct_scope_entries_are_converted() {
        let mut nested = Document::new();
        nested.insert("inner", Function::new("function() {}"));

        let mut scope = Document::new();
        scope.insert("helper", Function::new("function(x) { return x; }"));
        scope.insert("limit", 10);
        scope.insert("nested", nested.clone());
        scope.insert("list", vec![Value::Function(Function::new("function() {}"))]);

        let Value::Document(normalized) = normalize_code(Value::Document(scope)) else {
            panic!("expected a document");
        };
        assert_eq!(
            normalized.get("helper"),
            Some(&Value::Code(Code::new("function(x) { return x; }")))
        );
        assert_eq!(normalized.get("limit"), Some(&Value::Int(10)));
        assert_eq!(normalized.get("nested"), Some(&Value::Document(nested)));
        assert!(matches!(
            normalized.get("list").and_then(Value::as_array),
            Some([Value::Function(_)])
        ));
    }

    #[test]
    fn scope_field_order_is_preserved() {
        let scope: Document = [
            ("b", Value::Function(Function::new("b"))),
            ("a", Value::Int(1)),
        ]
        .into_iter()
        .collect();
        let normalized = normalize_scope(scope);
        assert_eq!(normalized.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn existing_code_and_plain_values_pass_through() {
        let code = Value::Code(Code::with_scope("f", Document::new()));
        assert_eq!(normalize_code(code.clone()), code);
        assert_eq!(normalize_code(Value::from("text")), Value::from("text"));
    }

    #[test]
    fn function_source_extracts_text() {
        assert_eq!(
            function_source(Value::Function(Function::new("function() {}"))),
            Value::from("function() {}")
        );
        let code = Value::Code(Code::new("f"));
        assert_eq!(function_source(code.clone()), code);
    }

    fn arb_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            "[a-z]{0,8}".prop_map(Value::String),
            "[a-z ]{0,16}".prop_map(|s| Value::Function(Function::new(s))),
            "[a-z ]{0,16}".prop_map(|s| Value::Code(Code::new(s))),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        arb_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(("[a-z]{1,4}", inner), 0..4)
                    .prop_map(|entries| Value::Document(entries.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(value in arb_value()) {
            let once = normalize_code(value);
            let twice = normalize_code(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn function_source_is_idempotent(value in arb_value()) {
            let once = function_source(value);
            let twice = function_source(once.clone());
            prop_assert!(!once.is_function());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalized_top_level_is_never_callable(value in arb_value()) {
            let normalized = normalize_code(value);
            prop_assert!(!normalized.is_function());
            if let Value::Document(doc) = normalized {
                prop_assert!(doc.iter().all(|(_, v)| !v.is_function()));
            }
        }
    }
}
