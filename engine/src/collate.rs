//! Total ordering of JSON values for index keys.
//!
//! null < false < true < numbers < strings < arrays < objects.
//! Arrays compare element-wise, objects compare as sorted (key, value) lists.

use serde_json::Value;
use std::cmp::Ordering;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

fn as_integer(n: &serde_json::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Exact comparison of an integer with a finite float.
fn compare_integer_float(int: i128, float: f64) -> Ordering {
    let whole = float.trunc();
    // Saturates outside i128, which lies far beyond any JSON integer.
    match int.cmp(&(whole as i128)) {
        Ordering::Equal if float > whole => Ordering::Less,
        Ordering::Equal if float < whole => Ordering::Greater,
        other => other,
    }
}

fn compare_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Ordering {
    match (as_integer(a), as_integer(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(x), None) => compare_integer_float(x, b.as_f64().unwrap_or(0.0)),
        (None, Some(y)) => compare_integer_float(y, a.as_f64().unwrap_or(0.0)).reverse(),
        (None, None) => {
            let x = a.as_f64().unwrap_or(0.0);
            let y = b.as_f64().unwrap_or(0.0);
            // JSON has no NaN; -0.0 and 0.0 are the same number.
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

/// Compare two JSON values under index collation.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                match collate(left, right) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                match lk.cmp(rk).then_with(|| collate(lv, rv)) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// A JSON value ordered by [`collate`].
#[derive(Debug, Clone)]
pub struct CollatedValue(pub Value);

impl PartialEq for CollatedValue {
    fn eq(&self, other: &Self) -> bool {
        collate(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for CollatedValue {}

impl Ord for CollatedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        collate(&self.0, &other.0)
    }
}

impl PartialOrd for CollatedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_order() {
        let ordered = [
            json!(null),
            json!(false),
            json!(true),
            json!(-5),
            json!(2.5),
            json!(10),
            json!(""),
            json!("a"),
            json!("b"),
            json!([]),
            json!([1]),
            json!({}),
            json!({"a": 1}),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(collate(&pair[0], &pair[1]), Ordering::Less, "{:?}", pair);
        }
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert_eq!(collate(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(collate(&json!(2), &json!(1.5)), Ordering::Greater);
        assert_eq!(
            collate(&json!(i64::MAX), &json!(i64::MAX - 1)),
            Ordering::Greater
        );
    }

    #[test]
    fn mixed_numbers_order_transitively() {
        let big = json!(9007199254740993u64);
        let float = json!(9007199254740992.0);
        let small = json!(9007199254740992u64);
        assert_eq!(collate(&big, &float), Ordering::Greater);
        assert_eq!(collate(&float, &small), Ordering::Equal);
        assert_eq!(collate(&big, &small), Ordering::Greater);

        assert_eq!(collate(&json!(-3), &json!(-2.5)), Ordering::Less);
        assert_eq!(collate(&json!(-2.5), &json!(-3)), Ordering::Greater);
        assert_eq!(collate(&json!(0), &json!(-0.0)), Ordering::Equal);
        assert_eq!(collate(&json!(0.0), &json!(-0.0)), Ordering::Equal);
        assert_eq!(collate(&json!(u64::MAX), &json!(1e300)), Ordering::Less);
    }

    #[test]
    fn arrays_compare_elementwise() {
        assert_eq!(collate(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(collate(&json!([1, 2]), &json!([1])), Ordering::Greater);
    }

    #[test]
    fn collated_value_equality_follows_collation() {
        assert_eq!(CollatedValue(json!(3)), CollatedValue(json!(3.0)));
        assert!(CollatedValue(json!("x")) > CollatedValue(json!(100)));
    }
}
