//! Best-effort conversion of raw JSON values into typed fields
//!
//! Every function here returns `None` instead of failing. A `None` from a
//! non-null input means the raw value has to be kept verbatim by the caller.

use serde_json::Value;

/// Numeric coercion: JSON numbers and trimmed numeric strings
///
/// NaN, infinities, booleans and empty strings are absent.
pub fn to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Integer coercion: integral JSON numbers and integer-valued strings
pub fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

fn integral_f64(v: f64) -> Option<i64> {
    // Range check against 2^63 so the cast below cannot saturate
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 9.223_372_036_854_776e18).then(|| v as i64)
}

/// Display-string coercion: strings as-is, scalars rendered
///
/// Arrays and objects are not text.
pub fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce user-supplied filter/pagination input that may be a number or a
/// numeric string. Blank strings are treated as "not given".
pub fn input_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        other => to_f64(other),
    }
}

/// Integer flavour of [`input_f64`]
pub fn input_i64(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        other => to_i64(other),
    }
}
