//! JSON text for inline `<script>` embedding
//!
//! The page evaluates embedded data as a JavaScript literal, where every
//! number is an IEEE double. Integers outside the safe-integer range would be
//! silently rounded, so they are emitted as decimal strings instead, wherever
//! they sit in the document.

use serde::Serialize;
use serde_json::{Number, Value};

/// Largest integer JavaScript represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Serialize any value into script-safe JSON text.
pub fn to_script_literal<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    Ok(to_script_json(&value))
}

/// Render a JSON document as script-safe text.
pub fn to_script_json(value: &Value) -> String {
    let mut value = value.clone();
    let converted = stringify_extended_integers(&mut value);
    if converted > 0 {
        tracing::debug!("Emitted {} extended-precision integers as strings", converted);
    }
    escape_for_script(&value.to_string())
}

/// A JavaScript string literal for `s`, safe inside `<script>`.
pub fn js_string(s: &str) -> String {
    escape_for_script(&Value::String(s.to_string()).to_string())
}

/// Replace every extended-precision integer with its decimal string, at any
/// depth. Returns how many values were replaced.
pub fn stringify_extended_integers(value: &mut Value) -> usize {
    match value {
        Value::Number(n) if is_extended_integer(n) => {
            *value = Value::String(n.to_string());
            1
        }
        Value::Array(items) => items.iter_mut().map(stringify_extended_integers).sum(),
        Value::Object(map) => map.values_mut().map(stringify_extended_integers).sum(),
        _ => 0,
    }
}

/// Whether `n` is an integer JavaScript cannot hold exactly.
pub fn is_extended_integer(n: &Number) -> bool {
    if let Some(v) = n.as_i64() {
        return v.unsigned_abs() > MAX_SAFE_INTEGER;
    }
    if n.as_u64().is_some() {
        return true;
    }
    // Beyond 64 bits only the textual form survives; floats carry '.' or an exponent.
    let text = n.to_string();
    let digits = text.strip_prefix('-').unwrap_or(&text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `<` would let a string close the script element early; U+2028/U+2029 are
/// line terminators for older JavaScript parsers.
fn escape_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_huge_integers_at_any_depth_become_strings() {
        let value = parse(
            r#"{
                "top": 123456789012345678901234567890,
                "nested": { "deeper": [ 1, { "p": -98765432109876543210987 } ] }
            }"#,
        );

        let text = to_script_json(&value);
        assert!(text.contains(r#""top":"123456789012345678901234567890""#), "{}", text);
        assert!(text.contains(r#""p":"-98765432109876543210987""#), "{}", text);
        assert!(text.contains("[1,"), "{}", text);
    }

    #[test]
    fn test_safe_boundary() {
        let mut safe = json!({ "a": 9_007_199_254_740_991u64, "b": -9_007_199_254_740_991i64 });
        assert_eq!(stringify_extended_integers(&mut safe), 0);

        let mut unsafe_ = json!({ "a": 9_007_199_254_740_992u64, "b": u64::MAX, "c": i64::MIN });
        assert_eq!(stringify_extended_integers(&mut unsafe_), 3);
        assert_eq!(unsafe_["a"], "9007199254740992");
        assert_eq!(unsafe_["b"], "18446744073709551615");
        assert_eq!(unsafe_["c"], "-9223372036854775808");
    }

    #[test]
    fn test_floats_are_left_alone() {
        let mut value = parse(r#"[ 0.5, 1e300, 12345678901234567890.5 ]"#);
        assert_eq!(stringify_extended_integers(&mut value), 0);
    }

    #[test]
    fn test_script_breakout_is_escaped() {
        let text = to_script_json(&json!({ "name": "</script><script>alert(1)</script>" }));
        assert!(!text.contains("</script>"));
        assert!(text.contains("\\u003c/script>"));
    }

    #[test]
    fn test_js_string_quotes_and_escapes() {
        assert_eq!(js_string("adder.svg"), "\"adder.svg\"");
        assert_eq!(js_string("a\"b\\c"), r#""a\"b\\c""#);
        assert_eq!(js_string("x\u{2028}y"), "\"x\\u2028y\"");
    }
}
