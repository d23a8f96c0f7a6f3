//! Structural comparison of posted vs. observed JSON.

use serde_json::Value;

/// True when every non-null field of `expected` is present in `actual`
/// with an equal value. Extra fields in `actual` are ignored; arrays must
/// match element for element.
pub fn is_subset(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .filter(|(_, v)| !v.is_null())
            .all(|(k, v)| have.get(k).is_some_and(|h| is_subset(v, h))),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| is_subset(w, h))
        }
        (Value::Number(want), Value::Number(have)) => want.as_f64() == have.as_f64(),
        (want, have) => want == have,
    }
}
